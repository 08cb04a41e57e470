//! Compile-time backend selection for the binaries.

use burn::backend::Autodiff;

#[cfg(feature = "wgpu")]
pub type Backend = burn::backend::Wgpu;
#[cfg(not(feature = "wgpu"))]
pub type Backend = burn::backend::NdArray<f32>;

/// Backend used for training.
pub type TrainingBackend = Autodiff<Backend>;

pub fn select_device() -> <Backend as burn::tensor::backend::Backend>::Device {
    #[cfg(feature = "wgpu")]
    return burn::backend::wgpu::WgpuDevice::default();

    #[cfg(not(feature = "wgpu"))]
    return burn::backend::ndarray::NdArrayDevice::Cpu;
}
