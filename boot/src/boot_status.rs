// Licensed under the Apache-2.0 license

/// Checkpoints reported to the platform as the boot flow progresses.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecmonBootStatus {
    BootConfigLoaded = 0x0001,
    BootConfigValidated = 0x0002,
    Package2Available = 0x0010,
    Package2HeaderLoaded = 0x0011,
    Package2SignatureVerified = 0x0012,
    Package2MetaDecrypted = 0x0013,
    Package2MetaVerified = 0x0014,
    Package2PayloadsLoaded = 0x0015,
}

impl From<SecmonBootStatus> for u16 {
    fn from(status: SecmonBootStatus) -> u16 {
        status as u16
    }
}
