//! Modeling-kernel boundary

mod facet;
mod traits;

pub use facet::FacetKernel;
pub use traits::{KernelError, KernelResult, ModelKernel, NullKernel};

/// Get the default modeling kernel
pub fn default_kernel() -> std::sync::Arc<dyn ModelKernel> {
    std::sync::Arc::new(FacetKernel::new())
}
