//! Model-side geometry values
//!
//! These are the values the editor database stores and the persistence
//! protocol writes: triangle-mesh solids, polyline curves, and the flat
//! model container. They carry no editor identity; identities are assigned
//! and tracked by the geometry database.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A triangle mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriMesh {
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Triangle indices (3 per triangle)
    pub indices: Vec<u32>,
}

impl TriMesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the mesh has no triangles
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate over triangles as vertex triples
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.vertices[tri[0] as usize],
                self.vertices[tri[1] as usize],
                self.vertices[tri[2] as usize],
            ]
        })
    }

    /// Axis-aligned bounds, or None for an empty mesh
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut verts = self.vertices.iter();
        let first = *verts.next()?;
        let mut min = first;
        let mut max = first;
        for v in verts {
            min = min.min(*v);
            max = max.max(*v);
        }
        Some((min, max))
    }
}

/// A 3D solid body represented by its boundary mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    /// Boundary triangle mesh
    pub mesh: TriMesh,
}

impl Solid {
    /// Create a solid from a mesh
    pub fn new(mesh: TriMesh) -> Self {
        Self { mesh }
    }

    /// Axis-aligned box solid (12 triangles)
    pub fn cuboid(center: Vec3, size: Vec3) -> Self {
        let h = size * 0.5;
        let v = |x: f32, y: f32, z: f32| center + Vec3::new(x * h.x, y * h.y, z * h.z);
        let vertices = vec![
            v(-1.0, -1.0, -1.0),
            v(1.0, -1.0, -1.0),
            v(1.0, 1.0, -1.0),
            v(-1.0, 1.0, -1.0),
            v(-1.0, -1.0, 1.0),
            v(1.0, -1.0, 1.0),
            v(1.0, 1.0, 1.0),
            v(-1.0, 1.0, 1.0),
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 7, 6, 3, 6, 2, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];
        Self {
            mesh: TriMesh { vertices, indices },
        }
    }
}

/// A 3D polyline curve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve3 {
    /// Points in order
    pub points: Vec<Vec3>,
    /// Whether the last point connects back to the first
    pub closed: bool,
}

impl Curve3 {
    /// Create a curve from points
    pub fn new(points: Vec<Vec3>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Number of segments
    pub fn segment_count(&self) -> usize {
        match self.points.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }

    /// Iterate over segments as point pairs
    pub fn segments(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        let n = self.segment_count();
        (0..n).map(|i| {
            let a = self.points[i];
            let b = self.points[(i + 1) % self.points.len()];
            (a, b)
        })
    }

    /// Best-fit placement plane via Newell's method, or None when the
    /// curve is degenerate (fewer than three points or collinear)
    pub fn placement(&self) -> Option<Plane3> {
        if self.points.len() < 3 {
            return None;
        }
        let mut normal = Vec3::ZERO;
        let mut centroid = Vec3::ZERO;
        let n = self.points.len();
        for i in 0..n {
            let current = self.points[i];
            let next = self.points[(i + 1) % n];
            normal.x += (current.y - next.y) * (current.z + next.z);
            normal.y += (current.z - next.z) * (current.x + next.x);
            normal.z += (current.x - next.x) * (current.y + next.y);
            centroid += current;
        }
        if normal.length_squared() < 1e-12 {
            return None;
        }
        Some(Plane3::new(centroid / n as f32, normal))
    }
}

/// An oriented plane defined by origin and unit normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane3 {
    /// A point on the plane
    pub origin: Vec3,
    /// Unit normal
    pub normal: Vec3,
}

impl Plane3 {
    /// Create a plane from origin and normal (normalized)
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        Self {
            origin,
            normal: normal.normalize(),
        }
    }

    /// XY plane at origin
    pub fn xy() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z)
    }

    /// XZ plane at origin
    pub fn xz() -> Self {
        Self::new(Vec3::ZERO, Vec3::Y)
    }

    /// YZ plane at origin
    pub fn yz() -> Self {
        Self::new(Vec3::ZERO, Vec3::X)
    }

    /// Signed distance from a point to the plane
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        (p - self.origin).dot(self.normal)
    }

    /// Mirror a point across the plane
    pub fn mirror(&self, p: Vec3) -> Vec3 {
        p - 2.0 * self.signed_distance(p) * self.normal
    }
}

impl Default for Plane3 {
    fn default() -> Self {
        Self::xy()
    }
}

/// A model item stored in the geometry database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ModelItem {
    /// Solid body
    Solid(Solid),
    /// Space curve
    Curve(Curve3),
}

impl ModelItem {
    /// Get the solid payload, if any
    pub fn as_solid(&self) -> Option<&Solid> {
        match self {
            ModelItem::Solid(solid) => Some(solid),
            _ => None,
        }
    }

    /// Get the curve payload, if any
    pub fn as_curve(&self) -> Option<&Curve3> {
        match self {
            ModelItem::Curve(curve) => Some(curve),
            _ => None,
        }
    }
}

/// The flat persistable model container
///
/// Ordered (identity, item) pairs; this is the shape the geometry payload
/// of a save file takes. Ordering is preserved across the wire so loads
/// are deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    items: Vec<(uuid::Uuid, ModelItem)>,
}

impl Model {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item under an identity
    pub fn add_item(&mut self, id: uuid::Uuid, item: ModelItem) {
        self.items.push((id, item));
    }

    /// Number of contained items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the container is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over (identity, item) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &(uuid::Uuid, ModelItem)> {
        self.items.iter()
    }
}

/// Information about a face of a solid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceInfo {
    /// Center point of the face
    pub center: Vec3,
    /// Unit normal of the face
    pub normal: Vec3,
    /// Total area of the face
    pub area: f32,
}

/// Information about an edge of a solid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeInfo {
    /// Start point
    pub start: Vec3,
    /// End point
    pub end: Vec3,
}

impl EdgeInfo {
    /// Midpoint of the edge
    pub fn midpoint(&self) -> Vec3 {
        (self.start + self.end) * 0.5
    }

    /// Length of the edge
    pub fn length(&self) -> f32 {
        (self.end - self.start).length()
    }
}

/// A model sub-item: the kernel-side record behind a topology identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SubItem {
    /// Face record
    Face(FaceInfo),
    /// Edge record
    Edge(EdgeInfo),
}

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanType {
    /// Union (add)
    Union,
    /// Subtraction (cut)
    Subtract,
    /// Intersection (common)
    Intersect,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cuboid_has_twelve_triangles() {
        let solid = Solid::cuboid(Vec3::ZERO, Vec3::splat(2.0));
        assert_eq!(solid.mesh.triangle_count(), 12);
        let (min, max) = solid.mesh.bounds().unwrap();
        assert_relative_eq!(min.x, -1.0);
        assert_relative_eq!(max.z, 1.0);
    }

    #[test]
    fn plane_mirror_is_involutive() {
        let plane = Plane3::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let p = Vec3::new(0.5, 3.0, -2.0);
        let mirrored = plane.mirror(p);
        assert_relative_eq!(mirrored.y, -1.0);
        let back = plane.mirror(mirrored);
        assert_relative_eq!(back.x, p.x);
        assert_relative_eq!(back.y, p.y);
        assert_relative_eq!(back.z, p.z);
    }

    #[test]
    fn closed_square_has_planar_placement() {
        let curve = Curve3::new(
            vec![
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
            ],
            true,
        );
        let placement = curve.placement().unwrap();
        assert_relative_eq!(placement.normal.z.abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_curve_has_no_placement() {
        let curve = Curve3::new(vec![Vec3::ZERO, Vec3::X], false);
        assert!(curve.placement().is_none());
    }
}
