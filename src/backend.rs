//! Backend Selector
//!
//! Selects the Burn backend from feature flags. CUDA wins over WGPU,
//! anything else falls back to NdArray on the CPU.

use burn::backend::Autodiff;

// ============ CUDA BACKEND ============
#[cfg(feature = "cuda")]
mod backend_impl {
    pub use burn::backend::cuda_jit::{Cuda, CudaDevice};
    pub type MyBackend = Cuda;

    pub fn get_device() -> CudaDevice {
        CudaDevice::new(0)
    }
}

// ============ WGPU BACKEND ============
#[cfg(all(feature = "gpu", not(feature = "cuda")))]
mod backend_impl {
    pub use burn::backend::wgpu::{Wgpu, WgpuDevice};
    pub type MyBackend = Wgpu<f32, i32>;

    pub fn get_device() -> WgpuDevice {
        WgpuDevice::BestAvailable
    }
}

// ============ CPU (NDARRAY) BACKEND ============
#[cfg(not(any(feature = "cuda", feature = "gpu")))]
mod backend_impl {
    pub use burn::backend::ndarray::{NdArray, NdArrayDevice};
    pub type MyBackend = NdArray;

    pub fn get_device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

// ============ PUBLIC EXPORTS ============
pub use backend_impl::{get_device, MyBackend};

/// Backend with autodiff for training
pub type TrainBackend = Autodiff<MyBackend>;
