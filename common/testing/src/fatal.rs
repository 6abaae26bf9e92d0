// Licensed under the Apache-2.0 license

use secmon_boot::FatalErrorHandler;
use secmon_error::SecmonError;
use std::panic::{self, AssertUnwindSafe};

/// Panic payload carried out of [`PanickingFatalHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Halted {
    pub error: SecmonError,
    pub message: String,
}

/// Fatal error sink that unwinds instead of halting, so tests can observe
/// the failure.
#[derive(Default)]
pub struct PanickingFatalHandler;

impl FatalErrorHandler for PanickingFatalHandler {
    fn fatal_error(&mut self, error: SecmonError, message: &str) -> ! {
        panic::panic_any(Halted {
            error,
            message: message.to_string(),
        })
    }
}

/// Runs `f`, which must end in a fatal error, and returns that error.
pub fn expect_fatal<F: FnOnce()>(f: F) -> Halted {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => panic!("boot flow completed without a fatal error"),
        Err(payload) => match payload.downcast::<Halted>() {
            Ok(halted) => *halted,
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}
