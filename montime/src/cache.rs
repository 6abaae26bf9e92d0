// Licensed under the Apache-2.0 license

//! Data cache maintenance for buffers shared with other bus masters.
//!
//! A buffer written by an earlier boot stage or a DMA engine must be flushed
//! and followed by an inner-shareable barrier before the monitor reads it.

/// Data cache line size in bytes.
pub const DATA_CACHE_LINE_SIZE: usize = 64;

/// Cleans and invalidates every data cache line covering `buf`.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn flush_data_cache(buf: &[u8]) {
    let start = (buf.as_ptr() as usize) & !(DATA_CACHE_LINE_SIZE - 1);
    let end = buf.as_ptr() as usize + buf.len();
    let mut line = start;
    while line < end {
        // Safety: `dc civac` only performs cache maintenance on a mapped address.
        unsafe {
            core::arch::asm!("dc civac, {0}", in(reg) line, options(nostack, preserves_flags));
        }
        line += DATA_CACHE_LINE_SIZE;
    }
}

#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn flush_data_cache(_buf: &[u8]) {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn data_synchronization_barrier_inner_shareable() {
    // Safety: a barrier has no memory side effects beyond ordering.
    unsafe {
        core::arch::asm!("dsb ish", options(nostack, preserves_flags));
    }
}

#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn data_synchronization_barrier_inner_shareable() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// Makes `src` coherent for this context and copies it into `dst`.
///
/// `dst` and `src` must be the same length.
pub fn coherent_copy(dst: &mut [u8], src: &[u8]) {
    flush_data_cache(src);
    data_synchronization_barrier_inner_shareable();
    dst.copy_from_slice(src);
}
