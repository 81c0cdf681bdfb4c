// Location: src/gpu/device.rs

use std::fmt;

use candle_core::{DType, Device, Tensor};

/// Kind of compute device the models run on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accelerator {
    Cpu,
    Cuda { ordinal: usize },
    Metal { ordinal: usize },
}

/// Detected device plus the reduced-precision formats it can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareProfile {
    pub accelerator: Accelerator,
    pub supports_bf16: bool,
    pub supports_f16: bool,
}

impl HardwareProfile {
    /// Plain CPU execution; reduced precision is never selected here.
    pub fn cpu() -> Self {
        Self {
            accelerator: Accelerator::Cpu,
            supports_bf16: false,
            supports_f16: false,
        }
    }

    /// Detect the hardware available to this process.
    ///
    /// `preference` mirrors the `CUDA_AVAILABLE` flag: `Some(false)` forbids
    /// accelerators, `Some(true)` requires one (falling back to CPU with a
    /// warning when none can be opened) and `None` auto-detects.
    pub fn detect(preference: Option<bool>) -> Self {
        if preference == Some(false) {
            return Self::cpu();
        }

        let wanted = preference == Some(true);
        let candidates: Vec<Accelerator> = {
            let mut c = Vec::new();
            if wanted || candle_core::utils::cuda_is_available() {
                c.push(Accelerator::Cuda { ordinal: 0 });
            }
            if candle_core::utils::metal_is_available() {
                c.push(Accelerator::Metal { ordinal: 0 });
            }
            c
        };

        for accelerator in candidates {
            let probe = Self {
                accelerator,
                supports_bf16: false,
                supports_f16: false,
            };
            match probe.device() {
                Ok(device) => {
                    return Self {
                        accelerator,
                        supports_bf16: supports_dtype(&device, DType::BF16),
                        supports_f16: supports_dtype(&device, DType::F16),
                    };
                }
                Err(e) => {
                    tracing::debug!(?accelerator, error = %e, "Accelerator probe failed");
                }
            }
        }

        if wanted {
            tracing::warn!("Accelerator requested but none could be opened; using CPU");
        }
        Self::cpu()
    }

    /// Open the candle device this profile describes
    pub fn device(&self) -> candle_core::Result<Device> {
        match self.accelerator {
            Accelerator::Cpu => Ok(Device::Cpu),
            Accelerator::Cuda { ordinal } => Device::new_cuda(ordinal),
            Accelerator::Metal { ordinal } => Device::new_metal(ordinal),
        }
    }

    pub fn is_accelerated(&self) -> bool {
        !matches!(self.accelerator, Accelerator::Cpu)
    }
}

/// A dtype counts as supported when a small matmul in it succeeds on `device`.
fn supports_dtype(device: &Device, dtype: DType) -> bool {
    Tensor::ones((2, 2), dtype, device)
        .and_then(|t| t.matmul(&t))
        .and_then(|t| t.to_dtype(DType::F32))
        .is_ok()
}

impl fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.accelerator {
            Accelerator::Cpu => write!(f, "cpu")?,
            Accelerator::Cuda { ordinal } => write!(f, "cuda:{}", ordinal)?,
            Accelerator::Metal { ordinal } => write!(f, "metal:{}", ordinal)?,
        }
        if self.is_accelerated() {
            write!(f, " (bf16: {}, f16: {})", self.supports_bf16, self.supports_f16)?;
        }
        Ok(())
    }
}
