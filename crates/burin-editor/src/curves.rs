//! Planar-curve cache
//!
//! Per-curve derived info: the best-fit placement plane and the polyline
//! itself. The cache is incrementally maintained during editing and
//! rebuilt wholesale after a restore or load, strictly after geometry and
//! modifier state have both been applied.

use burin_kernel::{Curve3, Plane3};
use tracing::debug;
use uuid::Uuid;

use crate::database::GeometryDatabase;
use crate::memento::{invariant, InvariantViolation, MementoOriginator};
use crate::modifier::{ModifierTracker, StackState};

/// Cached derived info for one curve
#[derive(Debug, Clone, PartialEq)]
pub struct CurveInfo {
    /// Best-fit plane, if the curve is planar enough to have one
    pub placement: Option<Plane3>,
    pub polyline: Curve3,
}

/// Snapshot of the curve cache
#[derive(Debug, Clone)]
pub struct CurveMemento {
    pub curve2info: im::HashMap<Uuid, CurveInfo>,
}

/// The planar-curve cache
#[derive(Debug, Default)]
pub struct PlanarCurveDatabase {
    curve2info: im::HashMap<Uuid, CurveInfo>,
}

impl PlanarCurveDatabase {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute and store info for a curve
    pub fn update(&mut self, id: Uuid, curve: &Curve3) {
        self.curve2info.insert(
            id,
            CurveInfo {
                placement: curve.placement(),
                polyline: curve.clone(),
            },
        );
    }

    /// Drop the cached info for a curve
    pub fn remove(&mut self, id: Uuid) {
        self.curve2info.remove(&id);
    }

    /// Cached info for a curve
    pub fn info(&self, id: Uuid) -> Option<&CurveInfo> {
        self.curve2info.get(&id)
    }

    /// Number of cached curves
    pub fn len(&self) -> usize {
        self.curve2info.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.curve2info.is_empty()
    }

    /// Recompute the whole cache from the live database
    ///
    /// Must run after both the geometry store and the modifier tracker
    /// have been fully applied: classification of modifier-derived items
    /// reads from both.
    pub fn rebuild(&mut self, db: &GeometryDatabase, modifiers: &ModifierTracker) {
        self.curve2info.clear();
        for (id, entry) in db.find_all(true) {
            if modifiers.state_of(id) == StackState::Modified {
                continue;
            }
            if let Some(curve) = entry.model.as_curve() {
                self.update(id, curve);
            }
        }
    }

    /// Check that every cached id resolves to a live curve item
    pub fn validate(&self, db: &GeometryDatabase) -> Result<(), InvariantViolation> {
        for (id, info) in &self.curve2info {
            let Some(entry) = db.lookup_item(*id) else {
                return Err(InvariantViolation(format!(
                    "curve info cached for missing item {id}"
                )));
            };
            invariant(entry.model.as_curve().is_some(), || {
                format!("curve info cached for non-curve item {id}")
            })?;
            invariant(!info.polyline.points.is_empty(), || {
                format!("curve info for {id} has an empty polyline")
            })?;
        }
        Ok(())
    }

    /// Log a summary of the cache
    pub fn debug(&self) {
        debug!(curves = self.curve2info.len(), "planar-curve cache");
    }
}

impl MementoOriginator for PlanarCurveDatabase {
    type Memento = CurveMemento;

    fn save_to_memento(&self) -> CurveMemento {
        CurveMemento {
            curve2info: self.curve2info.clone(),
        }
    }

    fn restore_from_memento(&mut self, memento: &CurveMemento) {
        self.curve2info = memento.curve2info.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burin_kernel::{default_kernel, ModelItem};
    use glam::Vec3;

    fn square() -> Curve3 {
        Curve3::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            true,
        )
    }

    #[test]
    fn update_computes_a_placement_for_planar_curves() {
        let mut curves = PlanarCurveDatabase::new();
        let id = Uuid::new_v4();
        curves.update(id, &square());
        let info = curves.info(id).unwrap();
        assert!(info.placement.is_some());
    }

    #[test]
    fn rebuild_reflects_the_live_database() {
        let mut db = GeometryDatabase::new(default_kernel());
        let kept = db.add_item(ModelItem::Curve(square()));
        let removed = db.add_item(ModelItem::Curve(square()));

        let mut curves = PlanarCurveDatabase::new();
        let modifiers = ModifierTracker::new(default_kernel());
        curves.rebuild(&db, &modifiers);
        assert_eq!(curves.len(), 2);

        db.remove_item(removed).unwrap();
        curves.rebuild(&db, &modifiers);
        assert_eq!(curves.len(), 1);
        assert!(curves.info(kept).is_some());
        curves.validate(&db).unwrap();
    }

    #[test]
    fn memento_round_trip() {
        let mut curves = PlanarCurveDatabase::new();
        let id = Uuid::new_v4();
        curves.update(id, &square());
        let memento = curves.save_to_memento();
        curves.remove(id);
        assert!(curves.is_empty());
        curves.restore_from_memento(&memento);
        assert!(curves.info(id).is_some());
    }
}
