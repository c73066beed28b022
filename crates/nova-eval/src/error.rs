use nova_remote::ClientError;
use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("debuggee: {0}")]
    Client(#[from] ClientError),
    #[error("member `{0}` not found")]
    MemberNotFound(String),
    #[error("method `{method}` not found in type `{type_name}`")]
    MethodNotFound { type_name: String, method: String },
    #[error("no applicable overload of `{method}` in type `{type_name}`")]
    NoApplicableOverload { type_name: String, method: String },
    #[error("invalid arguments for method `{method}` in type `{type_name}`")]
    InvalidArguments { type_name: String, method: String },
    #[error("type `{0}` not found")]
    TypeNotFound(String),
    #[error("{type_name}: {message}")]
    TargetException { type_name: String, message: String },
    #[error("invocation of `{type_name}.{method}` failed: {message}")]
    InvocationFailed {
        type_name: String,
        method: String,
        message: String,
    },
    #[error("evaluation aborted")]
    Aborted,
    #[error("evaluation timed out")]
    Timeout,
    #[error("evaluation cancelled because the session is shutting down")]
    Cancelled,
    #[error("evaluation requires invoking code in the debuggee, which is disabled")]
    InvocationDisabled,
    #[error("index {index} is out of range (length {length})")]
    IndexOutOfRange { index: usize, length: usize },
    #[error("`{0}` is read-only")]
    ReadOnly(String),
    #[error("{0}")]
    NotSupported(String),
}

impl EvalError {
    /// Whether the error came from code running in the debuggee rather than
    /// from the engine or the transport.
    pub fn is_target_exception(&self) -> bool {
        matches!(self, EvalError::TargetException { .. })
    }
}
