// src/accel/opencl.rs
//! OpenCL-backed accelerator
//!
//! Wraps device selection, program build, and kernel dispatch through
//! `opencl3`. Dispatch uses a blocking result read rather than polling
//! the completion event, so a worker thread sleeps inside the driver
//! instead of spinning.

use crate::accel::{ARG_WORDS, Accelerator, RESULT_SENTINEL, RESULT_WORDS};
use crate::utils::error::MinerError;
use log::debug;
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_GPU, Device};
use opencl3::kernel::{ExecuteKernel, Kernel, create_program_kernels};
use opencl3::memory::{Buffer, CL_MEM_COPY_HOST_PTR, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY};
use opencl3::platform::get_platforms;
use opencl3::program::Program;
use opencl3::types::{CL_TRUE, cl_uint};
use std::ptr;

/// A selected device, cheap to move into the worker thread that will
/// open it
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    /// Index of the platform the device belongs to
    pub platform_index: usize,
    /// Index of the device within its platform
    pub device_index: usize,
    /// Human-readable identity, also the benchmark record key
    pub id: String,
    device: Device,
    compute_units: u32,
    work_group_size: usize,
    is_gpu: bool,
}

impl DeviceSpec {
    fn new(platform_index: usize, device_index: usize, device: Device) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown Device".into());
        let compute_units = device.max_compute_units().unwrap_or(1);
        let work_group_size = device.max_work_group_size().unwrap_or(64);
        let is_gpu = device
            .dev_type()
            .map(|t| t & CL_DEVICE_TYPE_GPU != 0)
            .unwrap_or(false);
        DeviceSpec {
            platform_index,
            device_index,
            id: format!("{} [{}.{}]", name, platform_index, device_index),
            device,
            compute_units,
            work_group_size,
            is_gpu,
        }
    }

    /// Default global work size for this device
    ///
    /// GPU-type devices saturate with one work item per lane across all
    /// compute units; anything else gets a single work group.
    pub fn default_threads(&self) -> usize {
        if self.is_gpu {
            self.compute_units as usize * self.work_group_size
        } else {
            self.work_group_size
        }
    }
}

/// Enumerates devices, optionally narrowed by platform/device index
///
/// # Arguments
/// * `platform` - Restrict to one platform index
/// * `device` - Restrict to one device index per remaining platform
///
/// # Errors
/// Returns a descriptive `MinerError::DeviceError` for an out-of-range
/// index or an unusable OpenCL installation; these are fatal at startup.
pub fn select_devices(
    platform: Option<usize>,
    device: Option<usize>,
) -> Result<Vec<DeviceSpec>, MinerError> {
    let platforms = get_platforms()
        .map_err(|e| MinerError::DeviceError(format!("failed to get OpenCL platforms: {}", e)))?;

    let selected: Vec<usize> = match platform {
        Some(index) if index < platforms.len() => vec![index],
        Some(index) => {
            return Err(MinerError::DeviceError(format!(
                "wrong platform ID: {}",
                index
            )));
        }
        None => (0..platforms.len()).collect(),
    };

    let mut specs = Vec::new();
    for platform_index in selected {
        let ids = platforms[platform_index]
            .get_devices(CL_DEVICE_TYPE_ALL)
            .map_err(|e| MinerError::DeviceError(format!("failed to list devices: {}", e)))?;
        match device {
            Some(index) => {
                let id = *ids
                    .get(index)
                    .ok_or_else(|| MinerError::DeviceError(format!("wrong device ID: {}", index)))?;
                specs.push(DeviceSpec::new(platform_index, index, Device::new(id)));
            }
            None => {
                for (device_index, id) in ids.into_iter().enumerate() {
                    specs.push(DeviceSpec::new(platform_index, device_index, Device::new(id)));
                }
            }
        }
    }
    Ok(specs)
}

/// Lists platform/device identities for the `info` subcommand
///
/// # Errors
/// Returns `MinerError` if platform enumeration fails
pub fn list_devices() -> Result<Vec<String>, MinerError> {
    let mut lines = Vec::new();
    let platforms = get_platforms()
        .map_err(|e| MinerError::DeviceError(format!("failed to get OpenCL platforms: {}", e)))?;
    for (i, platform) in platforms.iter().enumerate() {
        lines.push(format!("Platform {}:", i));
        let ids = platform
            .get_devices(CL_DEVICE_TYPE_ALL)
            .map_err(|e| MinerError::DeviceError(format!("failed to list devices: {}", e)))?;
        for (j, id) in ids.into_iter().enumerate() {
            let spec = DeviceSpec::new(i, j, Device::new(id));
            lines.push(format!("    Device {}: {}", j, spec.id));
        }
    }
    Ok(lines)
}

/// OpenCL accelerator bound to one device
pub struct OpenClAccelerator {
    id: String,
    default_threads: usize,
    context: Context,
    queue: CommandQueue,
    kernels: Vec<(String, Kernel)>,
    names: Vec<String>,
}

/// Opens a device: creates its context and queue and builds the search
/// program
///
/// # Arguments
/// * `spec` - The selected device
/// * `source` - Concatenated kernel source
///
/// # Errors
/// Returns `MinerError::DeviceError` if context/queue creation or the
/// program build fails; a build failure is fatal at startup.
pub fn open_device(spec: &DeviceSpec, source: &str) -> Result<OpenClAccelerator, MinerError> {
    let context = Context::from_device(&spec.device)
        .map_err(|e| MinerError::DeviceError(format!("failed to create context: {}", e)))?;
    let queue = CommandQueue::create_default(&context, 0)
        .map_err(|e| MinerError::DeviceError(format!("failed to create command queue: {}", e)))?;

    let mut program = Program::create_from_source(&context, source)
        .map_err(|e| MinerError::DeviceError(format!("failed to create program: {}", e)))?;
    if let Err(e) = program.build(context.devices(), "") {
        let log = context
            .devices()
            .first()
            .and_then(|d| program.get_build_log(*d).ok())
            .unwrap_or_default();
        return Err(MinerError::DeviceError(format!(
            "program build failed on {}: {} {}",
            spec.id, e, log
        )));
    }

    let kernels = create_program_kernels(&program)
        .map_err(|e| MinerError::DeviceError(format!("failed to create kernels: {}", e)))?;
    let mut named = Vec::new();
    let mut names = Vec::new();
    for kernel in kernels {
        let name = kernel
            .function_name()
            .map_err(|e| MinerError::DeviceError(format!("failed to read kernel name: {}", e)))?;
        names.push(name.clone());
        named.push((name, kernel));
    }
    if named.is_empty() {
        return Err(MinerError::DeviceError(format!(
            "program for {} contains no kernels",
            spec.id
        )));
    }

    debug!("opened {} with kernels {:?}", spec.id, names);
    Ok(OpenClAccelerator {
        id: spec.id.clone(),
        default_threads: spec.default_threads(),
        context,
        queue,
        kernels: named,
        names,
    })
}

impl OpenClAccelerator {
    fn kernel(&self, name: &str) -> Result<&Kernel, MinerError> {
        self.kernels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, k)| k)
            .ok_or_else(|| MinerError::DeviceError(format!("unknown kernel: {}", name)))
    }
}

impl Accelerator for OpenClAccelerator {
    fn device_id(&self) -> &str {
        &self.id
    }

    fn kernel_names(&self) -> &[String] {
        &self.names
    }

    fn default_threads(&self) -> usize {
        self.default_threads
    }

    fn dispatch(
        &mut self,
        kernel: &str,
        threads: usize,
        args: &[u32; ARG_WORDS],
    ) -> Result<Vec<u32>, MinerError> {
        let kernel = self.kernel(kernel)?;

        let mut args_buf = unsafe {
            Buffer::<cl_uint>::create(
                &self.context,
                CL_MEM_READ_ONLY,
                ARG_WORDS,
                ptr::null_mut(),
            )
            .map_err(|e| MinerError::DeviceError(format!("failed to create args buffer: {}", e)))?
        };
        unsafe {
            self.queue
                .enqueue_write_buffer(&mut args_buf, CL_TRUE, 0, &args[..], &[])
                .map_err(|e| MinerError::DeviceError(format!("failed to write args: {}", e)))?;
        }

        let sentinel = vec![RESULT_SENTINEL; RESULT_WORDS];
        let results_buf = unsafe {
            Buffer::<cl_uint>::create(
                &self.context,
                CL_MEM_WRITE_ONLY | CL_MEM_COPY_HOST_PTR,
                RESULT_WORDS,
                sentinel.as_ptr() as *mut std::ffi::c_void,
            )
            .map_err(|e| {
                MinerError::DeviceError(format!("failed to create result buffer: {}", e))
            })?
        };

        unsafe {
            ExecuteKernel::new(kernel)
                .set_arg(&args_buf)
                .set_arg(&results_buf)
                .set_global_work_size(threads)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| MinerError::DeviceError(format!("failed to execute kernel: {}", e)))?;
        }

        // blocking read doubles as the completion wait
        let mut results = vec![0u32; RESULT_WORDS];
        unsafe {
            self.queue
                .enqueue_read_buffer(&results_buf, CL_TRUE, 0, &mut results, &[])
                .map_err(|e| MinerError::DeviceError(format!("failed to read results: {}", e)))?;
        }

        Ok(results)
    }
}
