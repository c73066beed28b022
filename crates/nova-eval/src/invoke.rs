//! A single call into the debuggee as a cancellable unit of work.
//!
//! ```text
//! Created --invoke--> Invoking --+--> Completed
//!                                +--> Faulted
//!                                +--> Aborted
//! ```
//!
//! The call is started synchronously; its completion is awaited by racing
//! the transport's completion signal against the session's
//! [`ShutdownSignal`].

use std::{sync::Arc, time::Duration};

use crossbeam_channel as channel;
use nova_remote::{
    ClientError, DebuggeeClient, InvokeId, InvokeOptions, InvokeOutcome, InvokeTarget, MethodInfo,
    Receiver, RemoteValue, ThreadId,
};
use parking_lot::Mutex;

use crate::{hierarchy::base_chain, EvalError, EvalResult, StackVersion};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvocationState {
    Created,
    Invoking,
    Completed,
    /// The call finished by throwing, or the transport failed.
    Faulted,
    Aborted,
}

/// Session-wide shutdown notification.
///
/// Triggering disconnects the underlying channel, which wakes every waiter at
/// once; clones observe the same signal.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    sender: Arc<Mutex<Option<channel::Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: rx,
        }
    }

    pub fn trigger(&self) {
        self.sender.lock().take();
    }

    pub fn is_triggered(&self) -> bool {
        matches!(
            self.receiver.try_recv(),
            Err(channel::TryRecvError::Disconnected)
        )
    }

    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

#[derive(Debug)]
struct CallState {
    phase: InvocationState,
    pending: Option<InvokeId>,
    completed: Option<Receiver<()>>,
    /// Set once the end call has been claimed, so it is made only once.
    ending: bool,
    abort_requested: bool,
    result: Option<EvalResult<RemoteValue>>,
    /// Dropped once the call reaches a final state, waking every waiter.
    finished: Option<channel::Sender<()>>,
}

/// One method or constructor call.
pub struct MethodCall {
    client: Arc<dyn DebuggeeClient>,
    thread: ThreadId,
    target: InvokeTarget,
    method: MethodInfo,
    type_name: String,
    args: Vec<RemoteValue>,
    stack_version: StackVersion,
    shutdown: ShutdownSignal,
    finished: Receiver<()>,
    state: Mutex<CallState>,
}

impl std::fmt::Debug for MethodCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodCall")
            .field("method", &self.method.name)
            .field("type_name", &self.type_name)
            .field("target", &self.target)
            .field("state", &self.state.lock().phase)
            .finish()
    }
}

impl MethodCall {
    pub fn new(
        client: Arc<dyn DebuggeeClient>,
        thread: ThreadId,
        target: InvokeTarget,
        method: MethodInfo,
        args: Vec<RemoteValue>,
        stack_version: StackVersion,
        shutdown: ShutdownSignal,
    ) -> Self {
        let type_name = client
            .type_info(method.declaring_type)
            .map(|t| t.full_name.clone())
            .unwrap_or_else(|_| method.declaring_type.to_string());
        let (finished_tx, finished) = channel::bounded(0);
        Self {
            client,
            thread,
            target,
            method,
            type_name,
            args,
            stack_version,
            shutdown,
            finished,
            state: Mutex::new(CallState {
                phase: InvocationState::Created,
                pending: None,
                completed: None,
                ending: false,
                abort_requested: false,
                result: None,
                finished: Some(finished_tx),
            }),
        }
    }

    pub fn method(&self) -> &MethodInfo {
        &self.method
    }

    pub fn target(&self) -> &InvokeTarget {
        &self.target
    }

    pub fn state(&self) -> InvocationState {
        self.state.lock().phase
    }

    pub fn pending_id(&self) -> Option<InvokeId> {
        self.state.lock().pending
    }

    /// Starts the call with breakpoints disabled and only the invoking thread
    /// running.
    pub fn invoke(&self) -> EvalResult<()> {
        let mut state = self.state.lock();
        assert_eq!(
            state.phase,
            InvocationState::Created,
            "a method call can only be started once"
        );
        match self.client.begin_invoke(
            self.thread,
            &self.target,
            self.method.id,
            &self.args,
            InvokeOptions::EVALUATION,
        ) {
            Ok(pending) => {
                tracing::trace!(
                    target: "nova.eval",
                    method = %self.method.name,
                    type_name = %self.type_name,
                    invoke = %pending.id,
                    "invocation started"
                );
                state.phase = InvocationState::Invoking;
                state.pending = Some(pending.id);
                state.completed = Some(pending.completed);
                Ok(())
            }
            Err(err) => {
                self.log_failure(&err.to_string());
                let err = self.machinery_error(&err);
                state.phase = InvocationState::Faulted;
                state.result = Some(Err(err.clone()));
                state.finished = None;
                Err(err)
            }
        }
    }

    /// Waits up to `timeout` for the call to finish.
    ///
    /// Returns `true` when the call finished (its result is then available
    /// from [`MethodCall::take_result`]) or when the session started shutting
    /// down first. In the shutdown case the call is left pending and no end
    /// call is made; [`MethodCall::poll_completed`] reconciles it later.
    ///
    /// Several threads may wait at once. The debuggee signals completion a
    /// single time, so whichever waiter receives it ends the call and the
    /// others wake when the call reaches its final state.
    pub fn wait_for_completed(&self, timeout: Duration) -> bool {
        let completed = {
            let state = self.state.lock();
            match state.phase {
                InvocationState::Created => return false,
                InvocationState::Invoking => state.completed.clone(),
                _ => return true,
            }
        };
        let Some(completed) = completed else {
            return true;
        };

        channel::select! {
            recv(completed) -> _ => {
                self.finish();
                true
            },
            recv(self.finished) -> _ => true,
            recv(self.shutdown.receiver()) -> _ => {
                tracing::debug!(
                    target: "nova.eval",
                    method = %self.method.name,
                    type_name = %self.type_name,
                    "session shutting down; leaving invocation pending"
                );
                true
            },
            recv(channel::after(timeout)) -> _ => false,
        }
    }

    /// Finishes the call if the debuggee already signalled completion.
    /// Returns whether the call is finished.
    pub fn poll_completed(&self) -> bool {
        let completed = {
            let state = self.state.lock();
            match state.phase {
                InvocationState::Created => return false,
                InvocationState::Invoking => state.completed.clone(),
                _ => return true,
            }
        };
        let ready = completed.is_some_and(|rx| {
            !matches!(rx.try_recv(), Err(channel::TryRecvError::Empty))
        });
        if ready {
            self.finish();
        }
        self.state() != InvocationState::Invoking
    }

    /// Requests the pending call to be aborted without waiting for it.
    ///
    /// # Panics
    ///
    /// Panics if no call is pending.
    pub fn abort(&self) -> EvalResult<()> {
        let id = {
            let mut state = self.state.lock();
            match (state.phase, state.pending) {
                (InvocationState::Invoking, Some(id)) => {
                    state.abort_requested = true;
                    id
                }
                (phase, _) => panic!(
                    "abort of `{}.{}` requested with no call pending (state {phase:?})",
                    self.type_name, self.method.name
                ),
            }
        };
        tracing::debug!(
            target: "nova.eval",
            method = %self.method.name,
            type_name = %self.type_name,
            invoke = %id,
            "aborting invocation"
        );
        self.client.abort_invoke(id).map_err(|err| {
            self.log_failure(&err.to_string());
            EvalError::from(err)
        })
    }

    /// The call's outcome, once it finished. Can be taken once.
    pub fn take_result(&self) -> Option<EvalResult<RemoteValue>> {
        self.state.lock().result.take()
    }

    fn finish(&self) {
        let id = {
            let mut state = self.state.lock();
            if state.phase != InvocationState::Invoking || state.ending {
                return;
            }
            let Some(id) = state.pending else {
                return;
            };
            state.ending = true;
            id
        };

        let outcome = self.client.end_invoke(id);
        self.stack_version.bump();

        let abort_requested = self.state.lock().abort_requested;
        let (phase, result) = match outcome {
            Ok(InvokeOutcome::Returned(value)) => (InvocationState::Completed, Ok(value)),
            Ok(InvokeOutcome::Thrown(exception)) => {
                let err = self.target_exception(&exception);
                self.log_failure(&err.to_string());
                (InvocationState::Faulted, Err(err))
            }
            Err(ClientError::Aborted) => {
                if !abort_requested {
                    self.log_failure("aborted by the debuggee");
                }
                (InvocationState::Aborted, Err(EvalError::Aborted))
            }
            Err(err) => {
                self.log_failure(&err.to_string());
                (InvocationState::Faulted, Err(self.machinery_error(&err)))
            }
        };

        let mut state = self.state.lock();
        state.phase = phase;
        state.pending = None;
        state.completed = None;
        state.result = Some(result);
        state.finished = None;
    }

    fn machinery_error(&self, err: &ClientError) -> EvalError {
        EvalError::InvocationFailed {
            type_name: self.type_name.clone(),
            method: self.method.name.clone(),
            message: err.to_string(),
        }
    }

    fn target_exception(&self, exception: &RemoteValue) -> EvalError {
        let type_name = exception
            .remote_type()
            .map(|t| t.full_name.clone())
            .unwrap_or_else(|| "System.Exception".to_string());
        let message = exception_message(self.client.as_ref(), exception)
            .unwrap_or_else(|| format!("exception of type `{type_name}` was thrown"));
        EvalError::TargetException { type_name, message }
    }

    fn log_failure(&self, error: &str) {
        tracing::warn!(
            target: "nova.eval",
            method = %self.method.name,
            type_name = %self.type_name,
            object = ?self.target,
            error,
            "invocation failed"
        );
    }
}

/// Reads an exception's message from its backing field. Runs no code in the
/// debuggee, so it cannot fault again.
pub(crate) fn exception_message(
    client: &dyn DebuggeeClient,
    exception: &RemoteValue,
) -> Option<String> {
    let object = exception.object_id()?;
    let ty = exception.remote_type()?;
    for level in base_chain(client, ty).ok()? {
        let fields = client.fields(level.id()).ok()?;
        let Some(field) = fields
            .iter()
            .find(|f| !f.is_static && (f.name == "_message" || f.name == "message"))
        else {
            continue;
        };
        return match client.instance_field(object, field.id).ok()? {
            RemoteValue::String { object, .. } => client.string_value(object).ok(),
            _ => None,
        };
    }
    None
}
