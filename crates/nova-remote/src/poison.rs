use std::panic::Location;
use std::sync::{Mutex, MutexGuard};

#[track_caller]
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, context: &'static str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(err) => {
            let loc = Location::caller();
            tracing::error!(
              target: "nova.remote",
              context,
              file = loc.file(),
              line = loc.line(),
              error = %err,
              "mock debuggee state poisoned; continuing with recovered guard"
            );
            err.into_inner()
        }
    }
}
