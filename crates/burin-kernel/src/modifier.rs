//! Modifier descriptors
//!
//! A modifier is one derivation step in a modifier stack: a serializable
//! parameter record, not the transient computed state. The set of kinds is
//! a closed enum so snapshot and persistence code dispatch statically.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::model::Plane3;

/// Parameters for a symmetry (mirror) modifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetryParams {
    /// Mirror plane
    pub plane: Plane3,
    /// Discard source geometry on the negative side before mirroring
    pub should_cut: bool,
    /// Merge the mirrored half back into one body
    pub should_union: bool,
}

impl SymmetryParams {
    /// Mirror across a plane, cutting and re-uniting (the editor default)
    pub fn across(plane: Plane3) -> Self {
        Self {
            plane,
            should_cut: true,
            should_union: true,
        }
    }
}

impl Default for SymmetryParams {
    fn default() -> Self {
        Self::across(Plane3::new(Vec3::ZERO, Vec3::X))
    }
}

/// Parameters for a thicken (shell offset) modifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThickenParams {
    /// Offset distance along vertex normals
    pub offset: f32,
}

/// One derivation step applied by a modifier stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Modifier {
    /// Mirror the body across a plane
    Symmetry(SymmetryParams),
    /// Offset the boundary outward
    Thicken(ThickenParams),
}

impl Modifier {
    /// Human-readable kind name, for labels and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Modifier::Symmetry(_) => "Symmetry",
            Modifier::Thicken(_) => "Thicken",
        }
    }
}
