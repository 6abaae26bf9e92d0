/*++

Licensed under the Apache-2.0 license.

File Name:

    boot_env.rs

Abstract:

    Secure monitor boot environment: the capabilities and state shared by
    every boot stage.

--*/

use core::fmt::Write;

use secmon_config::SecmonConfig;
use secmon_pkg1::{BootloaderState, BOOT_CONFIG_SIZE};

use crate::{BootConfigStorage, FatalErrorHandler, SecmonBootStatus, TrustAnchor};

/// Platform hooks used while booting.
pub trait BootPlatform {
    /// Blocks until the first-stage bootloader has reached at least `state`.
    fn wait_for_bootloader(&mut self, state: BootloaderState);

    /// Publishes a boot progress checkpoint.
    fn set_boot_checkpoint(&mut self, checkpoint: u16);

    /// Makes `buf`, written by another bus master, visible to the monitor.
    ///
    /// Cleans and invalidates its cache lines, then issues an inner-shareable
    /// barrier. Must be called before the first read of `buf`.
    fn make_coherent(&mut self, buf: &[u8]) {
        montime::flush_data_cache(buf);
        montime::data_synchronization_barrier_inner_shareable();
    }
}

/// Secure monitor environment containing the trust anchor, platform hooks
/// and the validated boot config.
pub struct SecmonEnv<'a> {
    pub trust: &'a dyn TrustAnchor,
    pub platform: &'a mut dyn BootPlatform,
    pub fatal: &'a mut dyn FatalErrorHandler,
    pub config: SecmonConfig,
    pub boot_config: BootConfigStorage,
}

impl<'a> SecmonEnv<'a> {
    /// Waits for the bootloader to publish its boot config, then loads and
    /// validates it.
    pub fn new(
        trust: &'a dyn TrustAnchor,
        platform: &'a mut dyn BootPlatform,
        fatal: &'a mut dyn FatalErrorHandler,
        config: SecmonConfig,
        boot_config_src: &[u8; BOOT_CONFIG_SIZE],
    ) -> Self {
        montime::println!("[secmon] Loading boot config");
        platform.wait_for_bootloader(BootloaderState::LoadedBootConfig);

        let mut boot_config = BootConfigStorage::load(trust, boot_config_src);
        platform.set_boot_checkpoint(SecmonBootStatus::BootConfigLoaded.into());

        boot_config.verify_or_clear(trust);
        platform.set_boot_checkpoint(SecmonBootStatus::BootConfigValidated.into());

        Self {
            trust,
            platform,
            fatal,
            config,
            boot_config,
        }
    }
}
