//! Facet-level kernel
//!
//! A deterministic, dependency-free backend that operates directly on
//! boundary meshes and polyline curves. Good enough for headless use and
//! tests; a B-rep backend would slot in behind the same trait.

use std::collections::HashMap;

use glam::Vec3;
use tracing::debug;

use crate::model::{BooleanType, Curve3, EdgeInfo, FaceInfo, Solid, TriMesh};
use crate::modifier::{Modifier, SymmetryParams, ThickenParams};

use super::traits::{KernelError, KernelResult, ModelKernel};

/// Quantization step for grouping triangle normals into faces
const NORMAL_QUANTUM: f32 = 1e-3;

/// Mesh-level modeling kernel
#[derive(Debug, Clone)]
pub struct FacetKernel {
    tolerance: f32,
}

impl FacetKernel {
    /// Create a kernel with the default tolerance
    pub fn new() -> Self {
        Self { tolerance: 1e-5 }
    }

    /// Create a kernel with a custom distance tolerance
    pub fn with_tolerance(tolerance: f32) -> Self {
        Self { tolerance }
    }

    fn symmetry(&self, solid: &Solid, params: &SymmetryParams) -> KernelResult<Solid> {
        let plane = params.plane;
        let source = if params.should_cut {
            let kept = filter_triangles(&solid.mesh, |centroid| {
                plane.signed_distance(centroid) >= -self.tolerance
            });
            if kept.is_empty() {
                return Err(KernelError::ModifierFailed(
                    "symmetry cut discarded the entire body".into(),
                ));
            }
            kept
        } else {
            solid.mesh.clone()
        };

        let mut mirrored = TriMesh {
            vertices: source.vertices.iter().map(|v| plane.mirror(*v)).collect(),
            indices: source.indices.clone(),
        };
        flip_winding(&mut mirrored);

        let mesh = if params.should_union {
            concat(&source, &mirrored)
        } else {
            mirrored
        };
        Ok(Solid::new(mesh))
    }

    fn thicken(&self, solid: &Solid, params: &ThickenParams) -> KernelResult<Solid> {
        if solid.mesh.is_empty() {
            return Err(KernelError::DegenerateGeometry("thicken of empty mesh".into()));
        }
        let normals = vertex_normals(&solid.mesh);
        let mut shell = TriMesh {
            vertices: solid
                .mesh
                .vertices
                .iter()
                .zip(&normals)
                .map(|(v, n)| *v + *n * params.offset)
                .collect(),
            indices: solid.mesh.indices.clone(),
        };
        flip_winding(&mut shell);
        Ok(Solid::new(concat(&solid.mesh, &shell)))
    }
}

impl Default for FacetKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelKernel for FacetKernel {
    fn name(&self) -> &str {
        "facet"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn apply_modifier(&self, solid: &Solid, modifier: &Modifier) -> KernelResult<Solid> {
        if solid.mesh.is_empty() {
            return Err(KernelError::DegenerateGeometry(format!(
                "{} applied to empty mesh",
                modifier.kind()
            )));
        }
        match modifier {
            Modifier::Symmetry(params) => self.symmetry(solid, params),
            Modifier::Thicken(params) => self.thicken(solid, params),
        }
    }

    fn boolean(&self, a: &Solid, b: &Solid, op: BooleanType) -> KernelResult<Solid> {
        match op {
            BooleanType::Union => Ok(Solid::new(concat(&a.mesh, &b.mesh))),
            BooleanType::Subtract | BooleanType::Intersect => {
                // Facet-level approximation: classify triangles of `a` by
                // whether their centroid falls inside b's bounds.
                let Some((min, max)) = b.mesh.bounds() else {
                    return Err(KernelError::BooleanFailed("empty tool body".into()));
                };
                let inside = |c: Vec3| c.cmpge(min).all() && c.cmple(max).all();
                let mesh = filter_triangles(&a.mesh, |c| match op {
                    BooleanType::Subtract => !inside(c),
                    _ => inside(c),
                });
                if mesh.is_empty() {
                    debug!(?op, "boolean produced an empty result");
                }
                Ok(Solid::new(mesh))
            }
        }
    }

    fn faces(&self, solid: &Solid) -> KernelResult<Vec<FaceInfo>> {
        let groups = normal_groups(&solid.mesh);
        let mut faces: Vec<FaceInfo> = Vec::with_capacity(groups.len());
        for tris in groups.values() {
            let mut area = 0.0;
            let mut center = Vec3::ZERO;
            let mut normal = Vec3::ZERO;
            for &t in tris {
                let [a, b, c] = triangle(&solid.mesh, t);
                let cross = (b - a).cross(c - a);
                let tri_area = cross.length() * 0.5;
                area += tri_area;
                center += (a + b + c) / 3.0 * tri_area;
                normal += cross;
            }
            if area <= self.tolerance * self.tolerance {
                continue;
            }
            faces.push(FaceInfo {
                center: center / area,
                normal: normal.normalize(),
                area,
            });
        }
        faces.sort_by(|a, b| {
            a.center
                .to_array()
                .partial_cmp(&b.center.to_array())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(faces)
    }

    fn edges(&self, solid: &Solid) -> KernelResult<Vec<EdgeInfo>> {
        let groups = normal_groups(&solid.mesh);
        let mut group_of = HashMap::new();
        for (key, tris) in &groups {
            for &t in tris {
                group_of.insert(t, *key);
            }
        }

        // edge -> normal groups of the triangles sharing it
        let mut shared: HashMap<(u32, u32), Vec<(i32, i32, i32)>> = HashMap::new();
        for (t, tri) in solid.mesh.indices.chunks_exact(3).enumerate() {
            for i in 0..3 {
                let a = tri[i];
                let b = tri[(i + 1) % 3];
                let key = (a.min(b), a.max(b));
                shared.entry(key).or_default().push(group_of[&t]);
            }
        }

        let mut edges = Vec::new();
        for ((a, b), groups) in shared {
            let feature = groups.len() == 1 || groups.windows(2).any(|w| w[0] != w[1]);
            if feature {
                edges.push(EdgeInfo {
                    start: solid.mesh.vertices[a as usize],
                    end: solid.mesh.vertices[b as usize],
                });
            }
        }
        edges.sort_by(|a, b| {
            (a.start.to_array(), a.end.to_array())
                .partial_cmp(&(b.start.to_array(), b.end.to_array()))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(edges)
    }

    fn curve_crossings(&self, a: &Curve3, b: &Curve3) -> KernelResult<Vec<Vec3>> {
        let mut crossings: Vec<Vec3> = Vec::new();
        for (p1, p2) in a.segments() {
            for (q1, q2) in b.segments() {
                if let Some(point) = segment_crossing(p1, p2, q1, q2, self.tolerance) {
                    let duplicate = crossings
                        .iter()
                        .any(|c| (*c - point).length_squared() < self.tolerance);
                    if !duplicate {
                        crossings.push(point);
                    }
                }
            }
        }
        Ok(crossings)
    }
}

fn triangle(mesh: &TriMesh, index: usize) -> [Vec3; 3] {
    let tri = &mesh.indices[index * 3..index * 3 + 3];
    [
        mesh.vertices[tri[0] as usize],
        mesh.vertices[tri[1] as usize],
        mesh.vertices[tri[2] as usize],
    ]
}

fn quantize(n: Vec3) -> (i32, i32, i32) {
    (
        (n.x / NORMAL_QUANTUM).round() as i32,
        (n.y / NORMAL_QUANTUM).round() as i32,
        (n.z / NORMAL_QUANTUM).round() as i32,
    )
}

/// Group triangle indices by quantized unit normal
fn normal_groups(mesh: &TriMesh) -> HashMap<(i32, i32, i32), Vec<usize>> {
    let mut groups: HashMap<(i32, i32, i32), Vec<usize>> = HashMap::new();
    for t in 0..mesh.triangle_count() {
        let [a, b, c] = triangle(mesh, t);
        let cross = (b - a).cross(c - a);
        if cross.length_squared() < f32::EPSILON {
            continue;
        }
        groups.entry(quantize(cross.normalize())).or_default().push(t);
    }
    groups
}

/// Keep triangles whose centroid satisfies the predicate, compacting vertices
fn filter_triangles(mesh: &TriMesh, keep: impl Fn(Vec3) -> bool) -> TriMesh {
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut out = TriMesh::new();
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [
            mesh.vertices[tri[0] as usize],
            mesh.vertices[tri[1] as usize],
            mesh.vertices[tri[2] as usize],
        ];
        if !keep((a + b + c) / 3.0) {
            continue;
        }
        for &i in tri {
            let next = remap.len() as u32;
            let mapped = *remap.entry(i).or_insert_with(|| {
                out.vertices.push(mesh.vertices[i as usize]);
                next
            });
            out.indices.push(mapped);
        }
    }
    out
}

fn flip_winding(mesh: &mut TriMesh) {
    for tri in mesh.indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
}

fn concat(a: &TriMesh, b: &TriMesh) -> TriMesh {
    let offset = a.vertices.len() as u32;
    let mut out = a.clone();
    out.vertices.extend_from_slice(&b.vertices);
    out.indices.extend(b.indices.iter().map(|i| i + offset));
    out
}

/// Area-weighted vertex normals
fn vertex_normals(mesh: &TriMesh) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; mesh.vertices.len()];
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [
            mesh.vertices[tri[0] as usize],
            mesh.vertices[tri[1] as usize],
            mesh.vertices[tri[2] as usize],
        ];
        let cross = (b - a).cross(c - a);
        for &i in tri {
            normals[i as usize] += cross;
        }
    }
    for n in &mut normals {
        *n = n.normalize_or_zero();
    }
    normals
}

/// Closest-approach crossing of two segments, within tolerance
fn segment_crossing(p1: Vec3, p2: Vec3, q1: Vec3, q2: Vec3, tolerance: f32) -> Option<Vec3> {
    let d1 = p2 - p1;
    let d2 = q2 - q1;
    let r = p1 - q1;
    let a = d1.dot(d1);
    let e = d2.dot(d2);
    let f = d2.dot(r);

    let (s, t) = if a <= f32::EPSILON && e <= f32::EPSILON {
        (0.0, 0.0)
    } else if a <= f32::EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= f32::EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let s = if denom > f32::EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t = ((b * s + f) / e).clamp(0.0, 1.0);
            let s = ((b * t - c) / a).clamp(0.0, 1.0);
            (s, t)
        }
    };

    let on_p = p1 + d1 * s;
    let on_q = q1 + d2 * t;
    if (on_p - on_q).length_squared() <= tolerance {
        Some((on_p + on_q) * 0.5)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Plane3;
    use approx::assert_relative_eq;

    fn half_cube() -> Solid {
        Solid::cuboid(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0))
    }

    #[test]
    fn symmetry_doubles_a_half_body() {
        let kernel = FacetKernel::new();
        let source = half_cube();
        let modifier = Modifier::Symmetry(SymmetryParams::across(Plane3::yz()));
        let derived = kernel.apply_modifier(&source, &modifier).unwrap();
        // Nothing sits on the negative side of the plane, so the cut keeps
        // everything and the union doubles the triangle count.
        assert_eq!(derived.mesh.triangle_count(), 24);
        let (min, max) = derived.mesh.bounds().unwrap();
        assert_relative_eq!(min.x, -2.0);
        assert_relative_eq!(max.x, 2.0);
    }

    #[test]
    fn symmetry_is_deterministic() {
        let kernel = FacetKernel::new();
        let source = half_cube();
        let modifier = Modifier::Symmetry(SymmetryParams::across(Plane3::yz()));
        let first = kernel.apply_modifier(&source, &modifier).unwrap();
        let second = kernel.apply_modifier(&source, &modifier).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn symmetry_cut_of_fully_negative_body_fails() {
        let kernel = FacetKernel::new();
        let source = Solid::cuboid(Vec3::new(-5.0, 0.0, 0.0), Vec3::ONE);
        let modifier = Modifier::Symmetry(SymmetryParams::across(Plane3::yz()));
        assert!(kernel.apply_modifier(&source, &modifier).is_err());
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let kernel = FacetKernel::new();
        let modifier = Modifier::Thicken(ThickenParams { offset: 0.1 });
        assert!(kernel.apply_modifier(&Solid::default(), &modifier).is_err());
    }

    #[test]
    fn cuboid_has_six_faces_and_twelve_feature_edges() {
        let kernel = FacetKernel::new();
        let solid = Solid::cuboid(Vec3::ZERO, Vec3::splat(2.0));
        let faces = kernel.faces(&solid).unwrap();
        assert_eq!(faces.len(), 6);
        for face in &faces {
            assert_relative_eq!(face.area, 4.0, epsilon = 1e-4);
        }
        let edges = kernel.edges(&solid).unwrap();
        assert_eq!(edges.len(), 12);
    }

    #[test]
    fn perpendicular_lines_cross_once() {
        let kernel = FacetKernel::new();
        let a = Curve3::new(vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)], false);
        let b = Curve3::new(vec![Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)], false);
        let crossings = kernel.curve_crossings(&a, &b).unwrap();
        assert_eq!(crossings.len(), 1);
        assert_relative_eq!(crossings[0].length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn parallel_lines_do_not_cross() {
        let kernel = FacetKernel::new();
        let a = Curve3::new(vec![Vec3::ZERO, Vec3::X], false);
        let b = Curve3::new(vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)], false);
        assert!(kernel.curve_crossings(&a, &b).unwrap().is_empty());
    }
}
