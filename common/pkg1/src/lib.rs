// Licensed under the Apache-2.0 license

//! Layouts shared between the first-stage bootloader and the secure monitor.

#![cfg_attr(not(test), no_std)]

use core::mem::size_of;

use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const BOOT_CONFIG_SIZE: usize = 0x400;
pub const BOOT_CONFIG_DATA_SIZE: usize = 0x200;
pub const BOOT_CONFIG_SIGNATURE_SIZE: usize = 0x100;
pub const BOOT_CONFIG_SIGNED_DATA_SIZE: usize = 0x100;
pub const ECID_SIZE: usize = 0x10;

const FLAGS0_PACKAGE2_DECRYPTED: u8 = 1 << 0;
const FLAGS1_PACKAGE2_ENCRYPTION_DISABLED: u8 = 1 << 0;
const FLAGS1_PACKAGE2_SIGNATURE_VERIFICATION_DISABLED: u8 = 1 << 1;

/// Unsigned portion of the boot config.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BootConfigData {
    pub version: U32<LittleEndian>,
    pub reserved_04: U32<LittleEndian>,
    pub reserved_08: U32<LittleEndian>,
    pub reserved_0c: U32<LittleEndian>,
    pub flags1: [u8; 0x10],
    pub flags0: [u8; 0x10],
    pub initial_tsc_value: U64<LittleEndian>,
    pub padding_38: [u8; BOOT_CONFIG_DATA_SIZE - 0x38],
}

/// Signed, device-bound portion of the boot config.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BootConfigSignedData {
    pub version: U32<LittleEndian>,
    pub reserved_04: U32<LittleEndian>,
    pub flags0: u8,
    pub reserved_09: [u8; 0x07],
    pub ecid: [u8; ECID_SIZE],
    pub flags1: [u8; 0x10],
    pub key: [u8; 0x10],
    pub padding_40: [u8; BOOT_CONFIG_SIGNED_DATA_SIZE - 0x40],
}

impl BootConfigSignedData {
    pub fn is_package2_decrypted(&self) -> bool {
        self.flags0 & FLAGS0_PACKAGE2_DECRYPTED != 0
    }

    pub fn set_package2_decrypted(&mut self, decrypted: bool) {
        if decrypted {
            self.flags0 |= FLAGS0_PACKAGE2_DECRYPTED;
        } else {
            self.flags0 &= !FLAGS0_PACKAGE2_DECRYPTED;
        }
    }

    /// An image that arrived already decrypted is never run through the cipher.
    pub fn is_package2_encryption_disabled(&self) -> bool {
        (self.flags1[0] & FLAGS1_PACKAGE2_ENCRYPTION_DISABLED) != 0 || self.is_package2_decrypted()
    }

    pub fn is_package2_signature_verification_disabled(&self) -> bool {
        (self.flags1[0] & FLAGS1_PACKAGE2_SIGNATURE_VERIFICATION_DISABLED) != 0
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BootConfig {
    pub data: BootConfigData,
    pub signature: [u8; BOOT_CONFIG_SIGNATURE_SIZE],
    pub signed_data: BootConfigSignedData,
}

const _: () = assert!(size_of::<BootConfigData>() == BOOT_CONFIG_DATA_SIZE);
const _: () = assert!(size_of::<BootConfigSignedData>() == BOOT_CONFIG_SIGNED_DATA_SIZE);
const _: () = assert!(size_of::<BootConfig>() == BOOT_CONFIG_SIZE);

/// Progress of the first-stage bootloader, as published to the monitor.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootloaderState {
    Start = 0,
    LoadedBootConfig = 1,
    InitializedDram = 2,
    LoadedPackage2 = 3,
    Done = 4,
}
