// Licensed under the Apache-2.0 license

#![cfg_attr(not(test), no_std)]

/// Largest package2 image (header plus payloads) the loader region can hold.
pub const PACKAGE2_SIZE_MAX: u32 = 8 * 1024 * 1024 - 16 * 1024;

/// Size of the destination region the package2 payloads are placed into.
pub const PACKAGE2_PAYLOAD_REGION_SIZE: u32 = 8 * 1024 * 1024 - 16 * 1024;

/// Trust policy applied to a package2 image.
/// These are the defaults that can be overridden by a platform build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Package2Policy {
    /// Anti-downgrade floor: any package2 older than this is rejected.
    pub minimum_package2_version: u8,
    /// Newest bootloader generation this monitor knows how to hand off to.
    pub current_bootloader_version: u8,
    pub package2_size_max: u32,
    pub payload_region_size: u32,
}

impl Default for Package2Policy {
    fn default() -> Self {
        Package2Policy {
            minimum_package2_version: 0,
            current_bootloader_version: 0x10,
            package2_size_max: PACKAGE2_SIZE_MAX,
            payload_region_size: PACKAGE2_PAYLOAD_REGION_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SecmonConfig {
    pub package2: Package2Policy,
}

impl SecmonConfig {
    pub const fn new(package2: Package2Policy) -> Self {
        SecmonConfig { package2 }
    }
}
