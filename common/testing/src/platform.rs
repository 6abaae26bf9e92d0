// Licensed under the Apache-2.0 license

use secmon_boot::{BootPlatform, SecmonBootStatus};
use secmon_pkg1::BootloaderState;

/// A source range the flow made coherent, and the checkpoint reached just
/// before it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoherentRange {
    pub addr: usize,
    pub len: usize,
    pub last_checkpoint: Option<u16>,
}

/// Platform that records every wait, checkpoint and coherence request.
#[derive(Default)]
pub struct RecordingPlatform {
    pub waits: Vec<BootloaderState>,
    pub checkpoints: Vec<u16>,
    pub coherent: Vec<CoherentRange>,
}

impl RecordingPlatform {
    pub fn reached(&self, status: SecmonBootStatus) -> bool {
        self.checkpoints.contains(&status.into())
    }
}

impl BootPlatform for RecordingPlatform {
    fn wait_for_bootloader(&mut self, state: BootloaderState) {
        self.waits.push(state);
    }

    fn set_boot_checkpoint(&mut self, checkpoint: u16) {
        self.checkpoints.push(checkpoint);
    }

    fn make_coherent(&mut self, buf: &[u8]) {
        self.coherent.push(CoherentRange {
            addr: buf.as_ptr() as usize,
            len: buf.len(),
            last_checkpoint: self.checkpoints.last().copied(),
        });
        montime::flush_data_cache(buf);
        montime::data_synchronization_barrier_inner_shareable();
    }
}
