use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use nova_remote::{FrameId, ThreadId};

use crate::config::EvalConfig;

/// Per-evaluation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    pub case_sensitive: bool,
    /// Whether code may be run in the debuggee (property getters, `ToString`,
    /// user-defined conversions, explicit calls).
    pub allow_target_invoke: bool,
    pub allow_to_string_calls: bool,
    pub ellipsize_strings: bool,
}

impl EvalOptions {
    pub fn from_config(config: &EvalConfig) -> Self {
        Self {
            case_sensitive: config.case_sensitive,
            allow_target_invoke: config.allow_target_invoke,
            allow_to_string_calls: config.allow_to_string_calls,
            ellipsize_strings: config.ellipsize_strings,
        }
    }

    /// Options for hover/watch style evaluations that must not run code.
    pub fn side_effect_free(self) -> Self {
        Self {
            allow_target_invoke: false,
            allow_to_string_calls: false,
            ..self
        }
    }
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self::from_config(&EvalConfig::default())
    }
}

/// Counter bumped whenever code ran in the debuggee.
///
/// Frame and variable handles fetched under an older version may be stale.
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct StackVersion(Arc<AtomicU64>);

impl StackVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_stale(&self, observed: u64) -> bool {
        self.current() != observed
    }
}

/// State of one evaluation: where in the debuggee we are and what we may do.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub thread: ThreadId,
    pub frame: FrameId,
    pub options: EvalOptions,
    /// Whether the frame's method has source/debug information; governs how
    /// unnamed locals are exposed.
    pub source_available: bool,
    pub stack_version: StackVersion,
}

impl EvaluationContext {
    pub fn new(thread: ThreadId, frame: FrameId, options: EvalOptions) -> Self {
        Self {
            thread,
            frame,
            options,
            source_available: true,
            stack_version: StackVersion::new(),
        }
    }

    pub fn with_stack_version(mut self, version: StackVersion) -> Self {
        self.stack_version = version;
        self
    }

    pub fn with_source_available(mut self, available: bool) -> Self {
        self.source_available = available;
        self
    }

    /// A context for another frame of the same thread sharing this context's
    /// stack version.
    pub fn for_frame(&self, frame: FrameId) -> Self {
        Self {
            frame,
            ..self.clone()
        }
    }

    pub fn names_match(&self, a: &str, b: &str) -> bool {
        if self.options.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }
}
