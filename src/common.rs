// src/common.rs
//
// Shared utilities for the codec boundary.

use crate::error::{ImagemillError, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a codec closure under the global panic policy: panics escaping
/// third-party decoders/encoders are confined here and surfaced as
/// internal errors instead of unwinding through the caller.
pub fn run_with_panic_policy<T>(stage: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(ImagemillError::internal_panic(format!(
                "panic in {stage}: {message}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_passthrough() {
        let result = run_with_panic_policy("test", || Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_error_passthrough() {
        let result: Result<()> =
            run_with_panic_policy("test", || Err(ImagemillError::decode_failed("boom")));
        assert!(matches!(
            result.unwrap_err(),
            ImagemillError::DecodeFailed { .. }
        ));
    }

    #[test]
    fn test_panic_confined() {
        let result: Result<()> = run_with_panic_policy("test", || panic!("kaboom"));
        match result.unwrap_err() {
            ImagemillError::InternalPanic { message } => {
                assert!(message.contains("kaboom"));
                assert!(message.contains("test"));
            }
            other => panic!("expected InternalPanic, got {other:?}"),
        }
    }
}
