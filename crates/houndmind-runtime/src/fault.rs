//! Fault boundary around module hooks.
//!
//! Every `start`, `tick` and `stop` call goes through [`contain`], which
//! turns both an `Err` return and a panic into a [`ModuleError`].  Nothing a
//! module does can unwind into the scheduler loop.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use houndmind_types::ModuleError;

/// Run `hook`, converting a panic into [`ModuleError::Panicked`].
pub(crate) fn contain<F>(hook: F) -> Result<(), ModuleError>
where
    F: FnOnce() -> Result<(), ModuleError>,
{
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(ModuleError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_ok_and_err() {
        assert!(contain(|| Ok(())).is_ok());
        assert_eq!(
            contain(|| Err(ModuleError::failed("bad read"))),
            Err(ModuleError::failed("bad read"))
        );
    }

    #[test]
    fn converts_str_panic() {
        let result = contain(|| panic!("servo bus fault"));
        assert_eq!(
            result,
            Err(ModuleError::Panicked("servo bus fault".to_string()))
        );
    }

    #[test]
    fn converts_formatted_panic() {
        let channel = 3;
        let result = contain(|| panic!("adc channel {channel} stuck"));
        assert_eq!(
            result,
            Err(ModuleError::Panicked("adc channel 3 stuck".to_string()))
        );
    }

    #[test]
    fn converts_opaque_panic() {
        let result = contain(|| std::panic::panic_any(42_u8));
        assert!(matches!(result, Err(ModuleError::Panicked(msg)) if msg.contains("non-string")));
    }
}
