/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Secure monitor boot flow: boot config validation and package2
    authentication, decryption and loading.

--*/

#![cfg_attr(not(test), no_std)]

mod boot_config;
pub use boot_config::*;
mod boot_env;
pub use boot_env::*;
pub mod boot_status;
pub use boot_status::*;
#[cfg(feature = "rustcrypto")]
mod crypto;
#[cfg(feature = "rustcrypto")]
pub use crypto::*;
mod load_flow;
pub use load_flow::*;
pub mod package2;
pub mod payload;
mod trust_anchor;
pub use trust_anchor::*;

pub use secmon_error::{ErrorKind, SecmonError, SecmonResult};

/// Terminal sink for fatal boot failures.
///
/// Implementations record the error for field diagnosis and then stop the
/// processor. There is no return path.
pub trait FatalErrorHandler {
    fn fatal_error(&mut self, error: SecmonError, message: &str) -> !;
}

/// Halts through `handler` unless `verify_result` holds.
#[inline(never)]
pub fn check_verify_result(
    handler: &mut dyn FatalErrorHandler,
    verify_result: bool,
    error: SecmonError,
    message: &str,
) {
    if !verify_result {
        handler.fatal_error(error, message);
    }
}
