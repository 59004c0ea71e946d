//! Removal backend implementations
//!
//! The ONNX Runtime backend is feature-gated; the mock backends are always
//! compiled so the pipeline can be exercised without model files.

#[cfg(feature = "onnx")]
pub mod onnx;
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;
pub use test_utils::{MockBackendFactory, MockRemovalBackend};
