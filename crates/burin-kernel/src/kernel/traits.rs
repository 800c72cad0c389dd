//! Kernel trait definitions
//!
//! The editor treats the modeling kernel as an opaque collaborator: it
//! hands over a source solid plus modifier parameters and receives a new
//! solid, or a descriptive error. Implementations must not mutate their
//! inputs.

use glam::Vec3;
use thiserror::Error;

use crate::model::{BooleanType, Curve3, EdgeInfo, FaceInfo, Solid};
use crate::modifier::Modifier;

/// Error type for kernel operations
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error("Kernel not available: {0}")]
    NotAvailable(String),

    #[error("Modifier computation failed: {0}")]
    ModifierFailed(String),

    #[error("Boolean operation failed: {0}")]
    BooleanFailed(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// The modeling kernel boundary
///
/// Implementations provide the actual geometry computations behind
/// modifier stacks and curve-crossing queries.
pub trait ModelKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Check if the kernel is available
    fn is_available(&self) -> bool;

    /// Compute the derived solid for one modifier step
    fn apply_modifier(&self, solid: &Solid, modifier: &Modifier) -> KernelResult<Solid>;

    /// Perform a boolean operation on two solids
    fn boolean(&self, a: &Solid, b: &Solid, op: BooleanType) -> KernelResult<Solid>;

    /// Get the face records of a solid
    fn faces(&self, solid: &Solid) -> KernelResult<Vec<FaceInfo>>;

    /// Get the edge records of a solid
    fn edges(&self, solid: &Solid) -> KernelResult<Vec<EdgeInfo>>;

    /// Find the crossing points of two curves
    fn curve_crossings(&self, a: &Curve3, b: &Curve3) -> KernelResult<Vec<Vec3>>;
}

/// A kernel that always returns errors (used when no backend is compiled in)
#[derive(Debug, Default)]
pub struct NullKernel;

impl NullKernel {
    fn unavailable<T>(&self) -> KernelResult<T> {
        Err(KernelError::NotAvailable("no modeling kernel available".into()))
    }
}

impl ModelKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn apply_modifier(&self, _solid: &Solid, _modifier: &Modifier) -> KernelResult<Solid> {
        self.unavailable()
    }

    fn boolean(&self, _a: &Solid, _b: &Solid, _op: BooleanType) -> KernelResult<Solid> {
        self.unavailable()
    }

    fn faces(&self, _solid: &Solid) -> KernelResult<Vec<FaceInfo>> {
        self.unavailable()
    }

    fn edges(&self, _solid: &Solid) -> KernelResult<Vec<EdgeInfo>> {
        self.unavailable()
    }

    fn curve_crossings(&self, _a: &Curve3, _b: &Curve3) -> KernelResult<Vec<Vec3>> {
        self.unavailable()
    }
}
