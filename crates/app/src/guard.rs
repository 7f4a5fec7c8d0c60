//! Isolation of user callbacks.
//!
//! Trigger, scheduler and worker callbacks are third-party code. A panic in
//! one of them is caught here and reported instead of tearing down the
//! timer task or worker thread that invoked it.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Run `f`, turning a panic into its message.
///
/// # Errors
///
/// Returns the panic message when `f` panics.
pub fn call_guarded<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_value_when_callback_succeeds() {
        assert_eq!(call_guarded(|| 40 + 2), Ok(42));
    }

    #[test]
    fn should_capture_static_panic_message() {
        let result: Result<(), _> = call_guarded(|| panic!("boom"));
        assert_eq!(result, Err("boom".to_string()));
    }

    #[test]
    fn should_capture_formatted_panic_message() {
        let value = 7;
        let result: Result<(), _> = call_guarded(|| panic!("bad value {value}"));
        assert_eq!(result, Err("bad value 7".to_string()));
    }
}
