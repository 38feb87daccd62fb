//! Entity store: owns the sketch primitives and their pin state.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::SketchError;
use crate::types::{EntityId, EntityKind, SketchEntity};
use crate::variables::Field;

/// Whether an entity takes part in solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinState {
    Free,
    Pinned,
}

#[derive(Debug, Clone)]
struct EntityRecord {
    entity: SketchEntity,
    /// Created with `fixed = true`; never changes afterwards.
    created_fixed: bool,
    /// Number of FIXED constraints currently targeting this entity.
    pins: u32,
    /// DOF credited on creation, returned on removal.
    intrinsic_dof: i64,
}

impl EntityRecord {
    fn pin_state(&self) -> PinState {
        if self.created_fixed || self.pins > 0 {
            PinState::Pinned
        } else {
            PinState::Free
        }
    }

    fn sync_fixed_flag(&mut self) {
        let pinned = self.pin_state() == PinState::Pinned;
        match &mut self.entity {
            SketchEntity::Point { fixed, .. } | SketchEntity::Circle { fixed, .. } => {
                *fixed = pinned;
            }
            SketchEntity::Line { .. } | SketchEntity::Arc { .. } => {}
        }
    }
}

/// Numeric state of every entity, for caller-side rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    values: Vec<(EntityId, [f64; 3])>,
}

/// Owns all entities in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    records: Vec<EntityRecord>,
    index: HashMap<EntityId, usize>,
    intrinsic_dof: i64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of intrinsic DOF over all entities.
    pub fn intrinsic_dof(&self) -> i64 {
        self.intrinsic_dof
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&SketchEntity> {
        self.index.get(&id).map(|&slot| &self.records[slot].entity)
    }

    pub fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.get(id).map(SketchEntity::kind)
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SketchEntity> {
        self.records.iter().map(|r| &r.entity)
    }

    pub fn pin_state(&self, id: EntityId) -> Option<PinState> {
        self.index
            .get(&id)
            .map(|&slot| self.records[slot].pin_state())
    }

    pub fn is_fixed(&self, id: EntityId) -> bool {
        self.pin_state(id) == Some(PinState::Pinned)
    }

    // ── Construction ────────────────────────────────────────────────────────

    pub fn add_point(
        &mut self,
        id: EntityId,
        x: f64,
        y: f64,
        z: f64,
        fixed: bool,
    ) -> Result<EntityId, SketchError> {
        self.ensure_unused(id)?;
        self.insert(SketchEntity::Point { id, x, y, z, fixed })
    }

    pub fn add_line(
        &mut self,
        id: EntityId,
        start_id: EntityId,
        end_id: EntityId,
    ) -> Result<EntityId, SketchError> {
        self.ensure_unused(id)?;
        self.expect_point(start_id)?;
        self.expect_point(end_id)?;
        self.insert(SketchEntity::Line {
            id,
            start_id,
            end_id,
        })
    }

    pub fn add_circle(
        &mut self,
        id: EntityId,
        center_id: EntityId,
        radius: f64,
        fixed: bool,
    ) -> Result<EntityId, SketchError> {
        self.ensure_unused(id)?;
        self.expect_point(center_id)?;
        self.insert(SketchEntity::Circle {
            id,
            center_id,
            radius,
            fixed,
        })
    }

    pub fn add_arc(
        &mut self,
        id: EntityId,
        center_id: EntityId,
        start_id: EntityId,
        end_id: EntityId,
        radius: f64,
    ) -> Result<EntityId, SketchError> {
        self.ensure_unused(id)?;
        self.expect_point(center_id)?;
        self.expect_point(start_id)?;
        self.expect_point(end_id)?;
        self.insert(SketchEntity::Arc {
            id,
            center_id,
            start_id,
            end_id,
            radius,
        })
    }

    /// Remove an entity that nothing else is built from.
    ///
    /// Constraint references are checked by the caller, which owns the
    /// constraint store.
    pub fn remove(&mut self, id: EntityId) -> Result<SketchEntity, SketchError> {
        let slot = *self
            .index
            .get(&id)
            .ok_or(SketchError::MissingEntity { id })?;
        if let Some(user) = self.iter().find(|e| e.references().contains(&id)) {
            return Err(SketchError::EntityInUse {
                id,
                by: format!("entity {}", user.id()),
            });
        }
        let record = self.records.remove(slot);
        self.intrinsic_dof -= record.intrinsic_dof;
        self.reindex();
        debug!(%id, "removed entity");
        Ok(record.entity)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
        self.intrinsic_dof = 0;
    }

    fn insert(&mut self, entity: SketchEntity) -> Result<EntityId, SketchError> {
        let id = entity.id();
        let intrinsic_dof = entity.intrinsic_dof();
        let created_fixed = entity.is_fixed();
        self.index.insert(id, self.records.len());
        self.records.push(EntityRecord {
            entity,
            created_fixed,
            pins: 0,
            intrinsic_dof,
        });
        self.intrinsic_dof += intrinsic_dof;
        debug!(%id, intrinsic_dof, "added entity");
        Ok(id)
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(slot, r)| (r.entity.id(), slot))
            .collect();
    }

    fn ensure_unused(&self, id: EntityId) -> Result<(), SketchError> {
        if self.contains(id) {
            return Err(SketchError::DuplicateEntity { id });
        }
        Ok(())
    }

    fn expect_point(&self, id: EntityId) -> Result<(), SketchError> {
        match self.kind(id) {
            Some(EntityKind::Point) => Ok(()),
            Some(kind) => Err(SketchError::NotAPoint { id, kind }),
            None => Err(SketchError::MissingEntity { id }),
        }
    }

    // ── Free ⇄ Pinned ───────────────────────────────────────────────────────

    /// Entities whose pin state follows a FIXED constraint on `id`.
    ///
    /// Fixing a point pins the point. Fixing a circle pins its radius and
    /// center. Fixing a line or arc pins its defining points.
    pub fn pin_targets(&self, id: EntityId) -> Vec<EntityId> {
        match self.get(id) {
            Some(SketchEntity::Point { .. }) => vec![id],
            Some(SketchEntity::Circle { center_id, .. }) => vec![id, *center_id],
            Some(other) => other.references(),
            None => Vec::new(),
        }
    }

    pub(crate) fn pin(&mut self, id: EntityId) {
        for target in self.pin_targets(id) {
            if let Some(&slot) = self.index.get(&target) {
                let record = &mut self.records[slot];
                record.pins += 1;
                record.sync_fixed_flag();
            }
        }
    }

    pub(crate) fn unpin(&mut self, id: EntityId) {
        for target in self.pin_targets(id) {
            if let Some(&slot) = self.index.get(&target) {
                let record = &mut self.records[slot];
                record.pins = record.pins.saturating_sub(1);
                record.sync_fixed_flag();
            }
        }
    }

    // ── Geometry access ─────────────────────────────────────────────────────

    pub fn point(&self, id: EntityId) -> Option<Vector2<f64>> {
        match self.get(id)? {
            SketchEntity::Point { x, y, .. } => Some(Vector2::new(*x, *y)),
            _ => None,
        }
    }

    /// Location of a point, or the center of a circle/arc.
    pub fn anchor(&self, id: EntityId) -> Option<Vector2<f64>> {
        match self.get(id)? {
            SketchEntity::Point { x, y, .. } => Some(Vector2::new(*x, *y)),
            SketchEntity::Circle { center_id, .. } | SketchEntity::Arc { center_id, .. } => {
                self.point(*center_id)
            }
            SketchEntity::Line { .. } => None,
        }
    }

    /// Start and end of a line.
    pub fn segment(&self, id: EntityId) -> Option<(Vector2<f64>, Vector2<f64>)> {
        match self.get(id)? {
            SketchEntity::Line {
                start_id, end_id, ..
            } => Some((self.point(*start_id)?, self.point(*end_id)?)),
            _ => None,
        }
    }

    /// Center and radius of a circle or arc.
    ///
    /// An arc's radius is measured from its center to its start point, so it
    /// follows the solved endpoint positions.
    pub fn round(&self, id: EntityId) -> Option<(Vector2<f64>, f64)> {
        match self.get(id)? {
            SketchEntity::Circle {
                center_id, radius, ..
            } => Some((self.point(*center_id)?, *radius)),
            SketchEntity::Arc {
                center_id,
                start_id,
                ..
            } => {
                let center = self.point(*center_id)?;
                let start = self.point(*start_id)?;
                Some((center, (start - center).norm()))
            }
            _ => None,
        }
    }

    // ── Numeric edits ───────────────────────────────────────────────────────

    pub fn set_point(&mut self, id: EntityId, new_x: f64, new_y: f64) -> Result<(), SketchError> {
        let kind = self.kind(id).ok_or(SketchError::MissingEntity { id })?;
        if kind != EntityKind::Point {
            return Err(SketchError::NotAPoint { id, kind });
        }
        let slot = self.index[&id];
        self.write_field(slot, Field::X, new_x);
        self.write_field(slot, Field::Y, new_y);
        Ok(())
    }

    /// Set a circle's or arc's stored radius. Returns false for other kinds.
    pub fn set_radius(&mut self, id: EntityId, new_radius: f64) -> Result<bool, SketchError> {
        let slot = *self
            .index
            .get(&id)
            .ok_or(SketchError::MissingEntity { id })?;
        match &mut self.records[slot].entity {
            SketchEntity::Circle { radius, .. } | SketchEntity::Arc { radius, .. } => {
                *radius = new_radius;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub(crate) fn slot(&self, id: EntityId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub(crate) fn read_field(&self, slot: usize, field: Field) -> f64 {
        match (&self.records[slot].entity, field) {
            (SketchEntity::Point { x, .. }, Field::X) => *x,
            (SketchEntity::Point { y, .. }, Field::Y) => *y,
            (SketchEntity::Circle { radius, .. }, Field::Radius) => *radius,
            _ => 0.0,
        }
    }

    pub(crate) fn write_field(&mut self, slot: usize, field: Field, value: f64) {
        match (&mut self.records[slot].entity, field) {
            (SketchEntity::Point { x, .. }, Field::X) => *x = value,
            (SketchEntity::Point { y, .. }, Field::Y) => *y = value,
            (SketchEntity::Circle { radius, .. }, Field::Radius) => *radius = value,
            _ => {}
        }
    }

    /// Refresh each arc's stored radius from its center and start point.
    pub(crate) fn sync_arc_radii(&mut self) {
        for slot in 0..self.records.len() {
            let id = self.records[slot].entity.id();
            if self.records[slot].entity.kind() != EntityKind::Arc {
                continue;
            }
            if let Some((_, measured)) = self.round(id) {
                if let SketchEntity::Arc { radius, .. } = &mut self.records[slot].entity {
                    *radius = measured;
                }
            }
        }
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        let values = self
            .records
            .iter()
            .filter_map(|r| match &r.entity {
                SketchEntity::Point { id, x, y, z, .. } => Some((*id, [*x, *y, *z])),
                SketchEntity::Circle { id, radius, .. } | SketchEntity::Arc { id, radius, .. } => {
                    Some((*id, [*radius, 0.0, 0.0]))
                }
                SketchEntity::Line { .. } => None,
            })
            .collect();
        PositionSnapshot { values }
    }

    /// Write back values from a snapshot. Entities created since are left as
    /// they are; entities removed since are skipped.
    pub fn restore(&mut self, snapshot: &PositionSnapshot) {
        for (id, v) in &snapshot.values {
            let Some(&slot) = self.index.get(id) else {
                continue;
            };
            match &mut self.records[slot].entity {
                SketchEntity::Point { x, y, z, .. } => {
                    *x = v[0];
                    *y = v[1];
                    *z = v[2];
                }
                SketchEntity::Circle { radius, .. } | SketchEntity::Arc { radius, .. } => {
                    *radius = v[0];
                }
                SketchEntity::Line { .. } => {}
            }
        }
    }
}
