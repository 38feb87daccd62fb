//! Constraint store and DOF accounting.

use tracing::{debug, warn};

use crate::entity::EntityStore;
use crate::error::SketchError;
use crate::evaluate::residual;
use crate::types::{
    Constraint, ConstraintId, ConstraintKind, ConstraintOptions, EntityId, EntityKind,
};

/// Owns constraint records and the running constraint DOF cost.
#[derive(Debug, Clone, Default)]
pub struct ConstraintStore {
    constraints: Vec<Constraint>,
    next_id: u32,
    dof_cost: i64,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Sum of DOF costs of all constraints.
    pub fn dof_cost(&self) -> i64 {
        self.dof_cost
    }

    pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    /// First constraint referencing `entity`, if any.
    pub fn referencing(&self, entity: EntityId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.references(entity))
    }

    /// Validate and append a constraint.
    ///
    /// A FIXED constraint also pins its entity in `entities`.
    pub fn add(
        &mut self,
        entities: &mut EntityStore,
        kind: ConstraintKind,
        entity_ids: &[EntityId],
        value: Option<f64>,
        options: ConstraintOptions,
    ) -> Result<ConstraintId, SketchError> {
        if entity_ids.len() != kind.arity() {
            return Err(SketchError::WrongEntityCount {
                kind,
                expected: kind.arity(),
                got: entity_ids.len(),
            });
        }
        let kinds = entity_ids
            .iter()
            .map(|&id| entities.kind(id).ok_or(SketchError::MissingEntity { id }))
            .collect::<Result<Vec<EntityKind>, _>>()?;
        if kind.requires_value() && value.is_none() {
            return Err(SketchError::MissingValue { kind });
        }
        if !options.weight.is_finite() || options.weight <= 0.0 {
            return Err(SketchError::InvalidWeight {
                weight: options.weight,
            });
        }
        if !kind.accepts(&kinds) {
            warn!(%kind, ?kinds, "constraint has no residual for these entity kinds, it will evaluate to 0");
        }

        let id = ConstraintId(self.next_id);
        self.next_id += 1;
        self.constraints.push(Constraint {
            id,
            kind,
            entity_ids: entity_ids.to_vec(),
            value,
            priority: options.priority,
            weight: options.weight,
            satisfied: false,
            parameter: options.parameter,
        });
        self.dof_cost += kind.dof_cost();
        if kind == ConstraintKind::Fixed {
            entities.pin(entity_ids[0]);
        }
        self.invalidate();
        debug!(%id, %kind, dof_cost = self.dof_cost, "added constraint");
        Ok(id)
    }

    /// Remove a constraint, returning its DOF cost and releasing a FIXED pin.
    pub fn remove(
        &mut self,
        entities: &mut EntityStore,
        id: ConstraintId,
    ) -> Result<Constraint, SketchError> {
        let pos = self
            .constraints
            .iter()
            .position(|c| c.id == id)
            .ok_or(SketchError::ConstraintNotFound { id })?;
        let removed = self.constraints.remove(pos);
        self.dof_cost -= removed.kind.dof_cost();
        if removed.kind == ConstraintKind::Fixed {
            entities.unpin(removed.entity_ids[0]);
        }
        self.invalidate();
        debug!(%id, kind = %removed.kind, "removed constraint");
        Ok(removed)
    }

    /// Change a constraint's value. Returns false if the id is unknown.
    pub fn set_value(&mut self, id: ConstraintId, value: f64) -> bool {
        let Some(c) = self.constraints.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        c.value = Some(value);
        self.invalidate();
        true
    }

    /// Attach a parameter name to a constraint. Returns false if the id is unknown.
    pub fn bind(&mut self, id: ConstraintId, parameter: &str) -> bool {
        let Some(c) = self.constraints.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        c.parameter = Some(parameter.to_string());
        true
    }

    /// Push a parameter value into every constraint bound to it.
    /// Returns the number of constraints changed.
    pub fn apply_parameter(&mut self, parameter: &str, value: f64) -> usize {
        let mut changed = 0;
        for c in &mut self.constraints {
            if c.parameter.as_deref() == Some(parameter) {
                c.value = Some(value);
                changed += 1;
            }
        }
        if changed > 0 {
            self.invalidate();
        }
        changed
    }

    /// Mark every cached `satisfied` flag stale.
    pub fn invalidate(&mut self) {
        for c in &mut self.constraints {
            c.satisfied = false;
        }
    }

    /// Recompute `satisfied` from current entity state.
    pub fn refresh_satisfaction(&mut self, entities: &EntityStore, tolerance: f64) {
        for c in &mut self.constraints {
            c.satisfied = residual(c, entities).abs() < tolerance;
        }
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
        self.next_id = 0;
        self.dof_cost = 0;
    }
}
