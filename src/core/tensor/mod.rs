use crate::core::{PortError, Result};
use std::fmt;
use std::str::FromStr;

/// Compute target a port runs on. Fixed once the model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
    Metal,
}

impl Device {
    pub fn to_candle(&self) -> Result<candle_core::Device> {
        let device = match self {
            Device::Cpu => candle_core::Device::Cpu,
            Device::Cuda(ordinal) => candle_core::Device::new_cuda(*ordinal).map_err(PortError::load)?,
            Device::Metal => candle_core::Device::new_metal(0).map_err(PortError::load)?,
        };
        Ok(device)
    }

    pub fn from_candle(device: &candle_core::Device) -> Self {
        match device.location() {
            candle_core::DeviceLocation::Cpu => Device::Cpu,
            candle_core::DeviceLocation::Cuda { gpu_id } => Device::Cuda(gpu_id),
            candle_core::DeviceLocation::Metal { .. } => Device::Metal,
        }
    }

    /// Best accelerator compiled in and present, falling back to the CPU.
    pub fn best_available() -> Self {
        if candle_core::utils::cuda_is_available() {
            Device::Cuda(0)
        } else if candle_core::utils::metal_is_available() {
            Device::Metal
        } else {
            Device::Cpu
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            Device::Metal => write!(f, "metal"),
        }
    }
}

impl FromStr for Device {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            "metal" | "mps" => Ok(Device::Metal),
            other => {
                if let Some(ordinal) = other.strip_prefix("cuda:") {
                    let ordinal = ordinal.parse().map_err(|_| {
                        PortError::Config(format!("invalid cuda ordinal in device `{}`", s))
                    })?;
                    return Ok(Device::Cuda(ordinal));
                }
                Err(PortError::Config(format!("unknown device `{}`", s)))
            }
        }
    }
}
