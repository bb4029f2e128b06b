use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Run one caller-supplied callback, logging and swallowing a panic so the
/// surrounding loop can move on to the next item.
pub(crate) fn isolate<R>(stage: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => Some(r),
        Err(payload) => {
            error!(stage, error = panic_message(payload.as_ref()), "Scope callback failed");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
