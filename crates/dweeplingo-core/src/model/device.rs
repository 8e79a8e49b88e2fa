//! Compute device and weight precision selection

use candle_core::{DType, Device};
use std::fmt;
use tracing::info;

use crate::config::DevicePreference;
use crate::error::Result;

/// Device plus weight dtype, resolved once at startup.
///
/// CUDA runs in half precision, CPU in full precision.
#[derive(Debug, Clone)]
pub struct ComputeStrategy {
    pub device: Device,
    pub dtype: DType,
}

impl ComputeStrategy {
    pub fn resolve(preference: DevicePreference) -> Result<Self> {
        let device = match preference {
            DevicePreference::Cpu => Device::Cpu,
            DevicePreference::Cuda => Device::new_cuda(0)?,
            DevicePreference::Auto => Device::cuda_if_available(0)?,
        };
        let strategy = Self::for_device(device);
        info!("Compute strategy: {}", strategy);
        Ok(strategy)
    }

    pub fn cpu() -> Self {
        Self::for_device(Device::Cpu)
    }

    fn for_device(device: Device) -> Self {
        let dtype = if device.is_cuda() {
            DType::F16
        } else {
            DType::F32
        };
        Self { device, dtype }
    }

    pub fn is_gpu(&self) -> bool {
        self.device.is_cuda()
    }
}

impl fmt::Display for ComputeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_gpu() {
            write!(f, "GPU - FP16")
        } else {
            write!(f, "CPU")
        }
    }
}
