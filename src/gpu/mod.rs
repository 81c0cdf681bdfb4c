//! Compute device detection and numeric precision selection

mod device;
mod precision;

pub use device::{Accelerator, HardwareProfile};
pub use precision::{resolve_dtype, resolve_dtype_for, Precision, SUPPORTED_PRECISIONS};
