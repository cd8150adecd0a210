//! Picks how many loader worker threads a device deserves.

use anyhow::{bail, Context, Result};
use tch::Device;
use tracing::info;

/// Worker threads to use for data loading on `device`.
///
/// Zero on the CPU, where the loading threads would compete with the model
/// for the same cores. On an accelerator, half of the logical CPUs, at least one.
pub fn num_workers(device: Device) -> usize {
    let workers = num_workers_for(device, num_cpus::get());
    info!(?device, workers, "selected data loader worker count");
    workers
}

/// Same policy as [`num_workers`] with an explicit CPU count.
pub fn num_workers_for(device: Device, cpu_count: usize) -> usize {
    match device {
        Device::Cpu => 0,
        _ => (cpu_count / 2).max(1),
    }
}

/// Parses `cpu`, `cuda`, `cuda:N`, `mps` or `vulkan` (case-insensitive).
pub fn parse_device(name: &str) -> Result<Device> {
    let name = name.trim().to_ascii_lowercase();
    let device = match name.as_str() {
        "cpu" => Device::Cpu,
        "cuda" => Device::Cuda(0),
        "mps" => Device::Mps,
        "vulkan" => Device::Vulkan,
        other => match other.strip_prefix("cuda:") {
            Some(ordinal) => Device::Cuda(
                ordinal
                    .parse()
                    .with_context(|| format!("Invalid CUDA ordinal in device '{}'", name))?,
            ),
            None => bail!(
                "Unknown device '{}' (expected cpu, cuda, cuda:N, mps or vulkan)",
                name
            ),
        },
    };
    Ok(device)
}
