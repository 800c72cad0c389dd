//! Model-side geometry and the modeling-kernel boundary
//!
//! This crate provides:
//! - Serializable model values (solids, curves, the flat model container)
//! - Sub-item records for faces and edges
//! - The modifier descriptor enum (symmetry, thicken)
//! - The `ModelKernel` trait hiding the actual geometry backend
//! - `NullKernel` (always unavailable) and `FacetKernel` (mesh-level)

pub mod kernel;
pub mod model;
pub mod modifier;

// Re-exports for convenience
pub use kernel::{FacetKernel, KernelError, KernelResult, ModelKernel, NullKernel, default_kernel};
pub use model::{BooleanType, Curve3, EdgeInfo, FaceInfo, Model, ModelItem, Plane3, Solid, SubItem, TriMesh};
pub use modifier::{Modifier, SymmetryParams, ThickenParams};
