// src/accel/mod.rs
//! Accelerator capability
//!
//! The search kernel itself is a black box: it receives a fixed
//! argument buffer, iterates the hash over a nonce range, and reports
//! qualifying nonce pairs through a fixed result buffer. This module
//! pins down that contract and exposes it behind the [`Accelerator`]
//! trait so the worker and its tests never depend on a real device.
//!
//! The OpenCL-backed implementation lives in [`opencl`] behind the
//! `gpu` cargo feature.

use crate::utils::error::MinerError;
use std::path::Path;

/// OpenCL device dispatch, behind the `gpu` feature
#[cfg(feature = "gpu")]
#[allow(unsafe_code)]
pub mod opencl;

/// Number of 32-bit words in the dispatch argument buffer:
/// `[iterations, base_offset, hash_state(8), suffix(13)]`
pub const ARG_WORDS: usize = 23;

/// Number of 32-bit words in the dispatch result buffer
pub const RESULT_WORDS: usize = 2048;

/// Value result slots are pre-filled with; a slot still holding it
/// after a dispatch reported no candidate there
pub const RESULT_SENTINEL: u32 = 0xffff_ffff;

/// Kernel source files expected in the kernel directory, concatenated
/// in this order into one program
pub const KERNEL_FILES: [&str; 2] = ["sha256.cl", "hash_solver.cl"];

/// A compute device that can run the search kernels
///
/// One worker owns one accelerator exclusively, so dispatch takes
/// `&mut self` and the trait only requires `Send`.
pub trait Accelerator: Send {
    /// Stable identity of the device, used as the benchmark record key
    fn device_id(&self) -> &str;

    /// Names of the kernels compiled into this device's program
    fn kernel_names(&self) -> &[String];

    /// Thread count the device defaults to when none is configured
    fn default_threads(&self) -> usize;

    /// Runs one kernel dispatch to completion
    ///
    /// # Arguments
    /// * `kernel` - Name of the kernel to run
    /// * `threads` - Global work size of the dispatch
    /// * `args` - The fixed argument buffer
    ///
    /// # Returns
    /// The result buffer; slots not holding [`RESULT_SENTINEL`] form
    /// adjacent word pairs describing found candidates
    ///
    /// # Errors
    /// Returns `MinerError` if the dispatch fails
    fn dispatch(
        &mut self,
        kernel: &str,
        threads: usize,
        args: &[u32; ARG_WORDS],
    ) -> Result<Vec<u32>, MinerError>;
}

/// Loads and concatenates the kernel source files
///
/// # Arguments
/// * `dir` - Directory holding the `.cl` files
///
/// # Errors
/// Returns `MinerError` if any source file cannot be read
pub fn load_kernel_source(dir: &Path) -> Result<String, MinerError> {
    let mut source = String::new();
    for file in KERNEL_FILES {
        let path = dir.join(file);
        let part = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!("failed to read kernel {}: {}", path.display(), e))
        })?;
        source.push_str(&part);
        source.push('\n');
    }
    Ok(source)
}
