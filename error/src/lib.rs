/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Error codes reported by the secure monitor boot flow.

--*/

#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::num::NonZeroU32;

/// Classification of a fatal boot failure.
///
/// Every code carries exactly one kind; the kind is what a field diagnosis
/// uses to tell a rollback attempt apart from a corrupted image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    SignatureInvalid,
    StructureInvalid,
    VersionRejected,
    PrimitiveFault,
}

/// Secure monitor error code.
///
/// The upper half-word selects the component, the lower half-word the
/// specific failure.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct SecmonError(pub NonZeroU32);

pub type SecmonResult<T> = Result<T, SecmonError>;

const COMPONENT_PACKAGE2: u32 = 0x0002_0000;

impl SecmonError {
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("SecmonError cannot be 0"),
        }
    }

    pub const BOOT_PACKAGE2_INVALID_SIGNATURE: SecmonError =
        SecmonError::new_const(COMPONENT_PACKAGE2 | 0x0001);
    pub const BOOT_PACKAGE2_INVALID_META: SecmonError =
        SecmonError::new_const(COMPONENT_PACKAGE2 | 0x0002);
    pub const BOOT_PACKAGE2_INVALID_VERSION: SecmonError =
        SecmonError::new_const(COMPONENT_PACKAGE2 | 0x0003);
    pub const BOOT_PACKAGE2_INVALID_KEY_GENERATION: SecmonError =
        SecmonError::new_const(COMPONENT_PACKAGE2 | 0x0004);
    pub const BOOT_PACKAGE2_IMAGE_TRUNCATED: SecmonError =
        SecmonError::new_const(COMPONENT_PACKAGE2 | 0x0005);
    pub const BOOT_PACKAGE2_DECRYPT_FAILURE: SecmonError =
        SecmonError::new_const(COMPONENT_PACKAGE2 | 0x0006);
    pub const BOOT_PACKAGE2_PAYLOAD_OUT_OF_BOUNDS: SecmonError =
        SecmonError::new_const(COMPONENT_PACKAGE2 | 0x0007);

    pub fn kind(&self) -> ErrorKind {
        if *self == Self::BOOT_PACKAGE2_INVALID_SIGNATURE {
            ErrorKind::SignatureInvalid
        } else if *self == Self::BOOT_PACKAGE2_INVALID_META
            || *self == Self::BOOT_PACKAGE2_INVALID_KEY_GENERATION
            || *self == Self::BOOT_PACKAGE2_IMAGE_TRUNCATED
        {
            ErrorKind::StructureInvalid
        } else if *self == Self::BOOT_PACKAGE2_INVALID_VERSION {
            ErrorKind::VersionRejected
        } else {
            ErrorKind::PrimitiveFault
        }
    }
}

impl From<SecmonError> for u32 {
    fn from(err: SecmonError) -> u32 {
        err.0.get()
    }
}

impl From<SecmonError> for NonZeroU32 {
    fn from(err: SecmonError) -> NonZeroU32 {
        err.0
    }
}

impl fmt::Debug for SecmonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecmonError(0x{:08x}, {:?})", self.0.get(), self.kind())
    }
}
