use std::sync::Arc;

use nova_eval::{EvalAdaptor, EvalConfig, EvaluationContext};
use nova_remote::{FrameId, LocalInfo, MockDebuggee, RemoteType, ThreadId};

pub const THREAD: ThreadId = ThreadId(1);

/// A mock debuggee and an engine attached to it.
pub struct Session {
    pub mock: Arc<MockDebuggee>,
    pub eval: EvalAdaptor,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        let mock = Arc::new(MockDebuggee::new());
        let eval = EvalAdaptor::new(mock.clone(), config);
        Self { mock, eval }
    }

    /// Context for evaluations that do not touch a stack frame.
    pub fn ctx(&self) -> EvaluationContext {
        self.eval.context(THREAD, FrameId(0))
    }

    pub fn core(&self, full_name: &str) -> RemoteType {
        self.mock
            .type_named(full_name)
            .unwrap_or_else(|| panic!("core type {full_name} is not registered"))
    }
}

pub fn local(index: u32, name: &str, ty: &RemoteType) -> LocalInfo {
    LocalInfo {
        index,
        name: Some(name.to_string()),
        ty: ty.id(),
        is_argument: false,
    }
}

pub fn names(references: &[nova_eval::ValueReference]) -> Vec<&str> {
    references.iter().map(|r| r.name()).collect()
}
