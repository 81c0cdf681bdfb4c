use std::fmt;

use candle_core::DType;
use serde::{Deserialize, Serialize};

use super::HardwareProfile;

/// Numeric precision model weights are loaded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F32,
    F16,
    BF16,
}

pub const SUPPORTED_PRECISIONS: [Precision; 3] = [Precision::F32, Precision::F16, Precision::BF16];

impl Precision {
    pub fn dtype(self) -> DType {
        match self {
            Precision::F32 => DType::F32,
            Precision::F16 => DType::F16,
            Precision::BF16 => DType::BF16,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Precision::F32 => "f32",
            Precision::F16 => "f16",
            Precision::BF16 => "bf16",
        })
    }
}

/// Pick the cheapest precision `profile` can execute.
///
/// Accelerators prefer bf16, then f16; anything else runs in f32.
pub fn resolve_dtype_for(profile: &HardwareProfile) -> Precision {
    if !profile.is_accelerated() {
        return Precision::F32;
    }
    if profile.supports_bf16 {
        Precision::BF16
    } else if profile.supports_f16 {
        Precision::F16
    } else {
        Precision::F32
    }
}

/// Precision for the hardware detected in this process
pub fn resolve_dtype() -> Precision {
    resolve_dtype_for(&HardwareProfile::detect(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::Accelerator;

    fn cuda(bf16: bool, f16: bool) -> HardwareProfile {
        HardwareProfile {
            accelerator: Accelerator::Cuda { ordinal: 0 },
            supports_bf16: bf16,
            supports_f16: f16,
        }
    }

    #[test]
    fn test_resolve_dtype_is_supported() {
        let precision = resolve_dtype();
        assert!(SUPPORTED_PRECISIONS.contains(&precision));
    }

    #[test]
    fn test_resolution_table() {
        assert_eq!(resolve_dtype_for(&HardwareProfile::cpu()), Precision::F32);
        assert_eq!(resolve_dtype_for(&cuda(true, true)), Precision::BF16);
        assert_eq!(resolve_dtype_for(&cuda(false, true)), Precision::F16);
        assert_eq!(resolve_dtype_for(&cuda(false, false)), Precision::F32);

        let cpu_claiming_bf16 = HardwareProfile {
            accelerator: Accelerator::Cpu,
            supports_bf16: true,
            supports_f16: true,
        };
        assert_eq!(resolve_dtype_for(&cpu_claiming_bf16), Precision::F32);
    }

    #[test]
    fn test_dtype_mapping() {
        assert_eq!(Precision::BF16.dtype(), DType::BF16);
        assert_eq!(Precision::F16.to_string(), "f16");
    }
}
