//! Cross-point database
//!
//! Caches curve-curve intersection points. Every registered curve is
//! intersected against every other at registration time; the cache is
//! indexed per curve and as one global set, plus a symmetric "which curves
//! touch which" map used to invalidate on removal.

use std::hash::{Hash, Hasher};

use burin_kernel::{Curve3, KernelResult, ModelKernel};
use glam::Vec3;
use tracing::debug;
use uuid::Uuid;

use crate::memento::{invariant, InvariantViolation, MementoOriginator};

/// An intersection of two registered curves
#[derive(Debug, Clone, Copy)]
pub struct CrossPoint {
    pub position: Vec3,
    /// The two curves meeting here, in registration order
    pub on: (Uuid, Uuid),
}

impl CrossPoint {
    /// Create a cross point between two curves
    pub fn new(position: Vec3, a: Uuid, b: Uuid) -> Self {
        Self { position, on: (a, b) }
    }

    /// Check whether a curve participates in this crossing
    pub fn involves(&self, id: Uuid) -> bool {
        self.on.0 == id || self.on.1 == id
    }

    fn bits(&self) -> [u32; 3] {
        self.position.to_array().map(f32::to_bits)
    }
}

impl PartialEq for CrossPoint {
    fn eq(&self, other: &Self) -> bool {
        self.on == other.on && self.bits() == other.bits()
    }
}

impl Eq for CrossPoint {}

impl Hash for CrossPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.on.hash(state);
        self.bits().hash(state);
    }
}

/// Snapshot of the cross-point database
#[derive(Debug, Clone)]
pub struct CrossPointMemento {
    pub curve2touched: im::HashMap<Uuid, im::HashSet<Uuid>>,
    pub id2cross: im::HashMap<Uuid, im::HashSet<CrossPoint>>,
    pub id2curve: im::HashMap<Uuid, Curve3>,
    pub crosses: im::HashSet<CrossPoint>,
}

/// The cross-point cache
#[derive(Debug, Default)]
pub struct CrossPointDatabase {
    curve2touched: im::HashMap<Uuid, im::HashSet<Uuid>>,
    id2cross: im::HashMap<Uuid, im::HashSet<CrossPoint>>,
    id2curve: im::HashMap<Uuid, Curve3>,
    crosses: im::HashSet<CrossPoint>,
}

impl CrossPointDatabase {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a curve, intersecting it against every registered curve
    ///
    /// All kernel computation happens before any index mutation, so a
    /// kernel failure leaves the cache untouched.
    pub fn add_curve(
        &mut self,
        id: Uuid,
        curve: Curve3,
        kernel: &dyn ModelKernel,
    ) -> KernelResult<()> {
        let mut found: Vec<(Uuid, Vec<Vec3>)> = Vec::new();
        for (other, other_curve) in &self.id2curve {
            let points = kernel.curve_crossings(&curve, other_curve)?;
            if !points.is_empty() {
                found.push((*other, points));
            }
        }

        self.id2curve.insert(id, curve);
        self.curve2touched.entry(id).or_default();
        self.id2cross.entry(id).or_default();
        for (other, points) in found {
            self.curve2touched.entry(id).or_default().insert(other);
            self.curve2touched.entry(other).or_default().insert(id);
            for position in points {
                let cross = CrossPoint::new(position, id, other);
                self.crosses.insert(cross);
                self.id2cross.entry(id).or_default().insert(cross);
                self.id2cross.entry(other).or_default().insert(cross);
            }
        }
        Ok(())
    }

    /// Unregister a curve and drop every crossing touching it
    pub fn remove_curve(&mut self, id: Uuid) {
        let touched = self.curve2touched.remove(&id).unwrap_or_default();
        for other in touched {
            if let Some(set) = self.curve2touched.get_mut(&other) {
                set.remove(&id);
            }
            if let Some(set) = self.id2cross.get_mut(&other) {
                *set = set.iter().filter(|c| !c.involves(id)).copied().collect();
            }
        }
        self.id2cross.remove(&id);
        self.id2curve.remove(&id);
        self.crosses = self.crosses.iter().filter(|c| !c.involves(id)).copied().collect();
    }

    /// Every known crossing
    pub fn crosses(&self) -> &im::HashSet<CrossPoint> {
        &self.crosses
    }

    /// Crossings on one curve
    pub fn crosses_for(&self, id: Uuid) -> Option<&im::HashSet<CrossPoint>> {
        self.id2cross.get(&id)
    }

    /// Check whether a curve is registered
    pub fn contains(&self, id: Uuid) -> bool {
        self.id2curve.contains_key(&id)
    }

    /// Check that every crossing references live curves and is indexed
    /// under both of them
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for cross in &self.crosses {
            let (a, b) = cross.on;
            for id in [a, b] {
                invariant(self.id2curve.contains_key(&id), || {
                    format!("cross point references unregistered curve {id}")
                })?;
                invariant(
                    self.id2cross.get(&id).is_some_and(|set| set.contains(cross)),
                    || format!("cross point not indexed under curve {id}"),
                )?;
            }
        }
        for (id, touched) in &self.curve2touched {
            for other in touched {
                invariant(
                    self.curve2touched.get(other).is_some_and(|set| set.contains(id)),
                    || format!("touch relation between {id} and {other} is one-sided"),
                )?;
            }
        }
        Ok(())
    }

    /// Log a summary of the cache
    pub fn debug(&self) {
        debug!(
            curves = self.id2curve.len(),
            crosses = self.crosses.len(),
            "cross-point database"
        );
    }
}

impl MementoOriginator for CrossPointDatabase {
    type Memento = CrossPointMemento;

    fn save_to_memento(&self) -> CrossPointMemento {
        CrossPointMemento {
            curve2touched: self.curve2touched.clone(),
            id2cross: self.id2cross.clone(),
            id2curve: self.id2curve.clone(),
            crosses: self.crosses.clone(),
        }
    }

    fn restore_from_memento(&mut self, memento: &CrossPointMemento) {
        self.curve2touched = memento.curve2touched.clone();
        self.id2cross = memento.id2cross.clone();
        self.id2curve = memento.id2curve.clone();
        self.crosses = memento.crosses.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burin_kernel::default_kernel;

    fn x_axis() -> Curve3 {
        Curve3::new(vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)], false)
    }

    fn y_axis() -> Curve3 {
        Curve3::new(vec![Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)], false)
    }

    #[test]
    fn crossing_curves_are_indexed_under_both() {
        let kernel = default_kernel();
        let mut crosses = CrossPointDatabase::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        crosses.add_curve(a, x_axis(), kernel.as_ref()).unwrap();
        crosses.add_curve(b, y_axis(), kernel.as_ref()).unwrap();

        assert_eq!(crosses.crosses().len(), 1);
        assert_eq!(crosses.crosses_for(a).unwrap().len(), 1);
        assert_eq!(crosses.crosses_for(b).unwrap().len(), 1);
        crosses.validate().unwrap();
    }

    #[test]
    fn removing_a_curve_drops_its_crossings_everywhere() {
        let kernel = default_kernel();
        let mut crosses = CrossPointDatabase::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        crosses.add_curve(a, x_axis(), kernel.as_ref()).unwrap();
        crosses.add_curve(b, y_axis(), kernel.as_ref()).unwrap();

        crosses.remove_curve(b);
        assert!(crosses.crosses().is_empty());
        assert!(crosses.crosses_for(a).unwrap().is_empty());
        assert!(!crosses.contains(b));
        crosses.validate().unwrap();
    }

    #[test]
    fn parallel_curves_register_without_crossings() {
        let kernel = default_kernel();
        let mut crosses = CrossPointDatabase::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        crosses.add_curve(a, x_axis(), kernel.as_ref()).unwrap();
        let shifted = Curve3::new(
            vec![Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)],
            false,
        );
        crosses.add_curve(b, shifted, kernel.as_ref()).unwrap();
        assert!(crosses.crosses().is_empty());
        crosses.validate().unwrap();
    }

    #[test]
    fn memento_round_trip() {
        let kernel = default_kernel();
        let mut crosses = CrossPointDatabase::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        crosses.add_curve(a, x_axis(), kernel.as_ref()).unwrap();
        crosses.add_curve(b, y_axis(), kernel.as_ref()).unwrap();
        let memento = crosses.save_to_memento();

        crosses.remove_curve(a);
        crosses.remove_curve(b);
        assert!(crosses.crosses().is_empty());

        crosses.restore_from_memento(&memento);
        assert_eq!(crosses.crosses().len(), 1);
        crosses.validate().unwrap();
    }
}
