//! Remote object model and transport boundary for Nova's evaluation engine.
//!
//! `nova-eval` consumes this crate to talk to a suspended debuggee. All target
//! data (types, members, instances, custom attribute metadata) lives in the
//! target process; the engine only ever sees the opaque handles and immutable
//! snapshots defined here.
//!
//! The [`DebuggeeClient`] trait is the narrow, reflection-like surface a
//! transport has to implement. [`MockDebuggee`] is a deterministic in-memory
//! implementation used by unit and integration tests.

mod mock;
mod poison;
mod types;
mod value;

use thiserror::Error;

pub use crossbeam_channel::Receiver;
pub use mock::{MethodBehavior, MockCalls, MockDebuggee, MockFrame, RecordedInvoke};
pub use types::{
    AttributeArgument, CustomAttribute, FieldInfo, LocalInfo, MethodInfo, ParameterInfo,
    PropertyInfo, RemoteType, TypeFlags, TypeInfo, Visibility,
};
pub use value::{PrimitiveValue, RemoteValue, StructValue};

macro_rules! remote_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u64);

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}#{}", stringify!($name), self.0)
                }
            }
        )*
    };
}

remote_id!(
    /// Identity of a loaded type.
    TypeId,
    /// Identity of an object (class instance, string or array) in the target heap.
    ObjectId,
    MethodId,
    FieldId,
    PropertyId,
    ThreadId,
    /// Stack frame handle; only valid while the owning thread stays suspended.
    FrameId,
    ModuleId,
    /// Handle of an outstanding begin-invoke.
    InvokeId,
);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("debuggee is not connected")]
    NotConnected,
    /// The target has no debug information for the requested frame/method.
    #[error("debug information is absent")]
    AbsentInformation,
    #[error("invalid object {0}")]
    InvalidObject(ObjectId),
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    #[error("operation not supported by the debuggee: {0}")]
    NotSupported(String),
    #[error("invocation was aborted")]
    Aborted,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{0}")]
    Other(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// The receiver of a method call.
#[derive(Clone, Debug, PartialEq)]
pub enum InvokeTarget {
    /// Static methods and constructors.
    Type(TypeId),
    Object(ObjectId),
    Struct(StructValue),
}

impl InvokeTarget {
    pub fn is_static(&self) -> bool {
        matches!(self, InvokeTarget::Type(_))
    }
}

/// Options passed along with every begin-invoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvokeOptions {
    pub disable_breakpoints: bool,
    pub single_threaded: bool,
}

impl InvokeOptions {
    /// The options the evaluation engine always uses: no breakpoints fire and
    /// only the invoking thread runs while the call is in flight.
    pub const EVALUATION: InvokeOptions = InvokeOptions {
        disable_breakpoints: true,
        single_threaded: true,
    };
}

/// A begin-invoke that has been accepted by the target.
///
/// `completed` receives exactly one message (or disconnects) once the call has
/// finished, successfully or not. The result is then fetched with
/// [`DebuggeeClient::end_invoke`].
#[derive(Debug)]
pub struct PendingInvoke {
    pub id: InvokeId,
    pub completed: Receiver<()>,
}

/// What a finished call produced in the target.
#[derive(Clone, Debug, PartialEq)]
pub enum InvokeOutcome {
    Returned(RemoteValue),
    /// The target raised an exception; the value is the exception object.
    Thrown(RemoteValue),
}

/// Narrow reflection-like interface to a suspended debuggee.
///
/// Every method is a protocol round trip. Implementations must be usable from
/// several threads at once: stack walks may run on one thread while an
/// invocation is pending on another, and [`DebuggeeClient::abort_invoke`] may be
/// called from a third.
pub trait DebuggeeClient: Send + Sync {
    /// Every type currently loaded in the target.
    fn all_types(&self) -> ClientResult<Vec<RemoteType>>;

    fn type_info(&self, id: TypeId) -> ClientResult<RemoteType>;

    /// Looks a type up in the session's global type index by its full
    /// (possibly generic-instantiated) name.
    fn find_type(&self, full_name: &str) -> ClientResult<Option<RemoteType>>;

    fn modules(&self) -> ClientResult<Vec<ModuleId>>;

    fn module_find_type(&self, module: ModuleId, full_name: &str)
        -> ClientResult<Option<RemoteType>>;

    /// Asks the target to load `full_name` if it is not loaded yet.
    fn force_load_type(&self, full_name: &str) -> ClientResult<Option<RemoteType>>;

    /// Interfaces `ty` itself declares, not those inherited from its bases.
    fn interfaces(&self, ty: TypeId) -> ClientResult<Vec<RemoteType>>;

    fn fields(&self, ty: TypeId) -> ClientResult<Vec<FieldInfo>>;
    fn properties(&self, ty: TypeId) -> ClientResult<Vec<PropertyInfo>>;

    /// Methods declared on `ty` (not its bases) named `name`.
    fn methods_by_name(
        &self,
        ty: TypeId,
        name: &str,
        ignore_case: bool,
    ) -> ClientResult<Vec<MethodInfo>>;

    fn nested_types(&self, ty: TypeId) -> ClientResult<Vec<RemoteType>>;
    fn custom_attributes(&self, ty: TypeId) -> ClientResult<Vec<CustomAttribute>>;

    /// Whether `ty` is outside user code.
    fn is_external(&self, ty: TypeId) -> ClientResult<bool>;

    fn static_field(&self, ty: TypeId, field: FieldId, thread: ThreadId)
        -> ClientResult<RemoteValue>;
    fn set_static_field(&self, ty: TypeId, field: FieldId, value: RemoteValue)
        -> ClientResult<()>;
    fn instance_field(&self, object: ObjectId, field: FieldId) -> ClientResult<RemoteValue>;
    fn set_instance_field(&self, object: ObjectId, field: FieldId, value: RemoteValue)
        -> ClientResult<()>;

    fn string_value(&self, object: ObjectId) -> ClientResult<String>;
    fn create_string(&self, value: &str) -> ClientResult<RemoteValue>;

    fn array_length(&self, array: ObjectId) -> ClientResult<usize>;
    fn array_get(&self, array: ObjectId, index: usize) -> ClientResult<RemoteValue>;
    fn array_set(&self, array: ObjectId, index: usize, value: RemoteValue) -> ClientResult<()>;

    /// The method executing in `frame`.
    fn frame_method(&self, frame: FrameId) -> ClientResult<MethodInfo>;

    /// `this` of the frame. Fails with [`ClientError::AbsentInformation`] when
    /// the target cannot tell.
    fn frame_this(&self, thread: ThreadId, frame: FrameId) -> ClientResult<RemoteValue>;

    /// Locals and arguments visible in `frame`. May fail with
    /// [`ClientError::AbsentInformation`].
    fn frame_locals(&self, frame: FrameId) -> ClientResult<Vec<LocalInfo>>;
    fn local_value(&self, frame: FrameId, local: &LocalInfo) -> ClientResult<RemoteValue>;
    fn set_local_value(&self, frame: FrameId, local: &LocalInfo, value: RemoteValue)
        -> ClientResult<()>;

    /// The exception currently being thrown on `thread`, if any.
    fn current_exception(&self, thread: ThreadId) -> ClientResult<Option<RemoteValue>>;

    fn begin_invoke(
        &self,
        thread: ThreadId,
        target: &InvokeTarget,
        method: MethodId,
        args: &[RemoteValue],
        options: InvokeOptions,
    ) -> ClientResult<PendingInvoke>;

    fn end_invoke(&self, id: InvokeId) -> ClientResult<InvokeOutcome>;

    /// Requests the pending call to be aborted. Does not wait for the abort
    /// to take effect; completion is still signalled on the pending handle.
    fn abort_invoke(&self, id: InvokeId) -> ClientResult<()>;
}
