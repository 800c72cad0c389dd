//! Per-viewport camera state
//!
//! Each pane owns a camera pose, an orbit target, an X-ray flag and a
//! construction plane. Viewports participate in persistence (their state
//! goes into the save buffer, one frame per pane) but not in undo: camera
//! movement is not an edit.

use burin_kernel::Plane3;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memento::{invariant, InvariantViolation, MementoOriginator};

/// Projection mode of a viewport camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraMode {
    Perspective,
    Orthographic,
}

/// A viewport camera pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub mode: CameraMode,
    pub position: Vec3,
    pub quaternion: Quat,
    pub zoom: f32,
    pub offset_width: f32,
    pub offset_height: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            mode: CameraMode::Perspective,
            position: Vec3::new(5.0, 5.0, 5.0),
            quaternion: Quat::IDENTITY,
            zoom: 1.0,
            offset_width: 1.0,
            offset_height: 1.0,
        }
    }
}

/// Snapshot of one viewport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportMemento {
    pub camera: Camera,
    pub target: Vec3,
    pub is_xray: bool,
    pub construction_plane: Plane3,
}

/// One viewport pane
#[derive(Debug, Clone)]
pub struct Viewport {
    pub camera: Camera,
    pub target: Vec3,
    pub is_xray: bool,
    pub construction_plane: Plane3,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            target: Vec3::ZERO,
            is_xray: false,
            construction_plane: Plane3::xy(),
        }
    }
}

impl Viewport {
    /// Create a viewport with the default camera
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode the viewport state as payload bytes
    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.save_to_memento())
    }

    /// Decode payload bytes into a staged memento
    pub fn deserialize(data: &[u8]) -> Result<ViewportMemento, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Check the pose is well-formed
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        invariant(self.camera.quaternion.is_normalized(), || {
            "camera quaternion is not normalized".to_string()
        })?;
        invariant(self.camera.zoom > 0.0, || {
            format!("camera zoom must be positive, was {}", self.camera.zoom)
        })?;
        invariant(
            (self.construction_plane.normal.length() - 1.0).abs() < 1e-4,
            || "construction plane normal is not unit length".to_string(),
        )
    }

    /// Log the pose
    pub fn debug(&self) {
        debug!(
            mode = ?self.camera.mode,
            position = ?self.camera.position,
            zoom = self.camera.zoom,
            is_xray = self.is_xray,
            "viewport"
        );
    }
}

impl MementoOriginator for Viewport {
    type Memento = ViewportMemento;

    fn save_to_memento(&self) -> ViewportMemento {
        ViewportMemento {
            camera: self.camera,
            target: self.target,
            is_xray: self.is_xray,
            construction_plane: self.construction_plane,
        }
    }

    fn restore_from_memento(&mut self, memento: &ViewportMemento) {
        self.camera = memento.camera;
        self.target = memento.target;
        self.is_xray = memento.is_xray;
        self.construction_plane = memento.construction_plane;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn serialize_round_trips_the_pose() {
        let mut viewport = Viewport::new();
        viewport.camera.mode = CameraMode::Orthographic;
        viewport.camera.zoom = 2.5;
        viewport.target = Vec3::new(1.0, 2.0, 3.0);
        viewport.is_xray = true;
        viewport.construction_plane = Plane3::xz();

        let bytes = viewport.serialize().unwrap();
        let memento = Viewport::deserialize(&bytes).unwrap();

        let mut restored = Viewport::new();
        restored.restore_from_memento(&memento);
        assert_eq!(restored.camera.mode, CameraMode::Orthographic);
        assert_relative_eq!(restored.camera.zoom, 2.5);
        assert!(restored.is_xray);
        assert_relative_eq!(restored.target.y, 2.0);
        restored.validate().unwrap();
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(Viewport::deserialize(b"not json").is_err());
    }

    #[test]
    fn degenerate_zoom_fails_validation() {
        let mut viewport = Viewport::new();
        viewport.camera.zoom = 0.0;
        assert!(viewport.validate().is_err());
    }
}
