//! Compile-time backend selection, through the `ndarray`, `wgpu`, `cuda`,
//! `tch-cpu` and `tch-gpu` cargo features.

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::AutodiffBackend;

#[cfg(feature = "f16")]
pub type Element = burn::tensor::f16;
#[cfg(not(feature = "f16"))]
pub type Element = f32;

/// Recorder for weights and optimizer states.
pub type RecorderTy = NamedMpkFileRecorder<FullPrecisionSettings>;

#[cfg(feature = "cuda")]
pub type MainBackend = burn::backend::Cuda<Element, i32>;
#[cfg(all(feature = "wgpu", not(feature = "cuda")))]
pub type MainBackend = burn::backend::Wgpu<Element, i32>;
#[cfg(all(
    any(feature = "tch-cpu", feature = "tch-gpu"),
    not(any(feature = "wgpu", feature = "cuda"))
))]
pub type MainBackend = burn::backend::LibTorch<Element>;
#[cfg(all(
    feature = "ndarray",
    not(any(
        feature = "wgpu",
        feature = "cuda",
        feature = "tch-cpu",
        feature = "tch-gpu"
    ))
))]
pub type MainBackend = burn::backend::NdArray<Element, i32>;

pub type MainAutoBackend = burn::backend::Autodiff<MainBackend>;

pub trait MainDevice: Backend {
    fn main_device() -> <Self as Backend>::Device {
        Default::default()
    }
}

#[cfg(not(all(feature = "tch-gpu", not(any(feature = "wgpu", feature = "cuda")))))]
impl MainDevice for MainBackend {}
#[cfg(all(
    feature = "tch-gpu",
    not(any(feature = "wgpu", feature = "cuda")),
    not(target_os = "macos")
))]
impl MainDevice for MainBackend {
    fn main_device() -> <Self as Backend>::Device {
        burn::backend::libtorch::LibTorchDevice::Cuda(0)
    }
}
#[cfg(all(
    feature = "tch-gpu",
    not(any(feature = "wgpu", feature = "cuda")),
    target_os = "macos"
))]
impl MainDevice for MainBackend {
    fn main_device() -> <Self as Backend>::Device {
        burn::backend::libtorch::LibTorchDevice::Mps
    }
}

impl MainDevice for MainAutoBackend {
    fn main_device() -> <Self as Backend>::Device {
        <<Self as AutodiffBackend>::InnerBackend as MainDevice>::main_device()
    }
}

#[cfg(not(feature = "_has-backend"))]
mod err {
    use super::*;
    std::compile_error!(
        "No backend selected. Enable one of the ndarray, wgpu, cuda, tch-cpu or tch-gpu features."
    );

    // pretend to fallback to ndarray (to avoid too many other unrelated errors)
    pub type MainBackend = burn::backend::NdArray<Element, i32>;
}
#[cfg(not(feature = "_has-backend"))]
pub use err::*;
