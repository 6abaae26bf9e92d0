/*++

Licensed under the Apache-2.0 license.

File Name:

    boot_config.rs

Abstract:

    Boot config storage: loads the development boot config handed over by
    the bootloader and neutralizes it unless it is signed and bound to this
    device.

--*/

use constant_time_eq::constant_time_eq;
use secmon_pkg1::{BootConfig, BOOT_CONFIG_SIZE};
use secmon_pkg2::Package2Header;
use zerocopy::{FromZeros, IntoBytes};
use zeroize::Zeroize;

use crate::package2::is_package2_decrypted;
use crate::TrustAnchor;

/// Outcome of checking a development boot config. Never leaves this module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BootConfigVerdict {
    Valid,
    DeviceBindingFailure,
}

/// The monitor's single copy of the boot config.
///
/// Created once at startup by [`BootConfigStorage::load`], validated in place
/// once, and read by later stages after that. On production units it is
/// always zero apart from the package2 decrypted flag.
pub struct BootConfigStorage {
    config: BootConfig,
}

impl BootConfigStorage {
    /// Copies the bootloader-provided boot config into monitor storage.
    ///
    /// Production units ignore `src` entirely.
    pub fn load(trust: &dyn TrustAnchor, src: &[u8; BOOT_CONFIG_SIZE]) -> Self {
        let mut config = BootConfig::new_zeroed();
        if !trust.is_production() {
            montime::coherent_copy(config.as_mut_bytes(), src);
        }
        BootConfigStorage { config }
    }

    /// Clears the signed data unless it is correctly signed and issued for
    /// this device.
    ///
    /// A rejected boot config is silently degraded to the all-zero default.
    /// It is never reported: the outcome must not be observable.
    pub fn verify_or_clear(&mut self, trust: &dyn TrustAnchor) {
        // On production hardware, the boot config is already cleared.
        if trust.is_production() {
            return;
        }

        if self.verdict(trust) != BootConfigVerdict::Valid {
            self.config.signed_data.as_mut_bytes().zeroize();
        }
    }

    fn verdict(&self, trust: &dyn TrustAnchor) -> BootConfigVerdict {
        let valid_signature = trust.verify_signature(
            &self.config.signature,
            self.config.signed_data.as_bytes(),
            trust.boot_config_modulus(),
        );
        if !valid_signature {
            return BootConfigVerdict::DeviceBindingFailure;
        }

        let device_id = trust.device_unique_id();
        if constant_time_eq(&self.config.signed_data.ecid, &device_id) {
            BootConfigVerdict::Valid
        } else {
            BootConfigVerdict::DeviceBindingFailure
        }
    }

    /// Records whether the package2 image arrived already decrypted.
    pub fn update_for_package2_header(&mut self, header: &Package2Header) {
        self.config
            .signed_data
            .set_package2_decrypted(is_package2_decrypted(header));
    }

    pub fn boot_config(&self) -> &BootConfig {
        &self.config
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::XorAnchor;
    use secmon_pkg2::MAGIC;

    fn candidate(ecid: [u8; 16]) -> [u8; BOOT_CONFIG_SIZE] {
        let mut bc = BootConfig::new_zeroed();
        bc.data.version.set(1);
        bc.signature = [0x42; 0x100];
        bc.signed_data.version.set(1);
        bc.signed_data.ecid = ecid;
        bc.signed_data.flags1[0] = 0x03;
        bc.signed_data.key = [0x99; 0x10];
        let mut bytes = [0u8; BOOT_CONFIG_SIZE];
        bytes.copy_from_slice(bc.as_bytes());
        bytes
    }

    #[test]
    fn test_production_ignores_source() {
        let mut anchor = XorAnchor::new();
        anchor.production = true;
        let src = candidate(anchor.ecid);

        let mut storage = BootConfigStorage::load(&anchor, &src);
        storage.verify_or_clear(&anchor);
        assert!(storage.boot_config().as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_development_keeps_valid_config() {
        let anchor = XorAnchor::new();
        let src = candidate(anchor.ecid);

        let mut storage = BootConfigStorage::load(&anchor, &src);
        storage.verify_or_clear(&anchor);
        assert_eq!(storage.boot_config().as_bytes(), &src[..]);
        assert!(storage
            .boot_config()
            .signed_data
            .is_package2_signature_verification_disabled());
    }

    #[test]
    fn test_development_clears_bad_signature() {
        let mut anchor = XorAnchor::new();
        anchor.signature_valid = false;
        let src = candidate(anchor.ecid);

        let mut storage = BootConfigStorage::load(&anchor, &src);
        storage.verify_or_clear(&anchor);
        let bc = storage.boot_config();
        assert!(bc.signed_data.as_bytes().iter().all(|&b| b == 0));
        // Only the signed region is neutralized.
        assert_eq!(bc.signature, [0x42; 0x100]);
        assert_eq!(bc.data.version.get(), 1);
    }

    #[test]
    fn test_development_clears_foreign_device() {
        let anchor = XorAnchor::new();
        let src = candidate([0x22; 16]);

        let mut storage = BootConfigStorage::load(&anchor, &src);
        storage.verify_or_clear(&anchor);
        assert!(storage
            .boot_config()
            .signed_data
            .as_bytes()
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_package2_decrypted_flag() {
        let anchor = XorAnchor::new();
        let mut storage = BootConfigStorage::load(&anchor, &[0u8; BOOT_CONFIG_SIZE]);
        storage.verify_or_clear(&anchor);

        let mut header = Package2Header::new_zeroed();
        header.meta.magic = MAGIC;
        storage.update_for_package2_header(&header);
        assert!(storage.boot_config().signed_data.is_package2_decrypted());

        header.signature[7] = 1;
        storage.update_for_package2_header(&header);
        assert!(!storage.boot_config().signed_data.is_package2_decrypted());
    }
}
