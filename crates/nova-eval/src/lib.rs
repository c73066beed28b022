//! Nova expression evaluation engine.
//!
//! This crate answers the questions a debugger front end asks while the
//! debuggee is suspended: which locals, parameters and members are visible,
//! what they currently hold, how a value is shown, and what calling a method
//! or converting a value yields. All target data is reached through
//! [`nova_remote::DebuggeeClient`].
//!
//! [`EvalAdaptor`] is the entry point; the modules below are usable on their
//! own for callers that need finer control.

mod adaptor;
mod coerce;
mod context;
mod error;
mod format;

pub mod closures;
pub mod config;
pub mod display;
pub mod hierarchy;
pub mod invoke;
pub mod members;
pub mod overload;
pub mod type_names;
pub mod value_ref;

pub use crate::adaptor::EvalAdaptor;
pub use crate::closures::{ClosureReconstructor, FieldRole, GeneratedKind, NamingConventions};
pub use crate::coerce::{convert_primitive, try_cast, try_convert};
pub use crate::config::{init_tracing, CompilerConventions, ConfigError, EvalConfig, LoggingConfig};
pub use crate::context::{EvalOptions, EvaluationContext, StackVersion};
pub use crate::display::{BrowsableState, DisplayData};
pub use crate::error::{EvalError, EvalResult};
pub use crate::format::ellipsize;
pub use crate::invoke::{InvocationState, MethodCall, ShutdownSignal};
pub use crate::members::BindingFlags;
pub use crate::overload::{resolve_overload, MethodCache, OverloadQuery};
pub use crate::value_ref::{FieldTarget, ReferenceKind, ValueReference};
