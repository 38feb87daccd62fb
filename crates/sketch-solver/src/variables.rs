//! Variable extraction: the ordered list of free scalar fields the solver moves.

use serde::{Deserialize, Serialize};

use crate::entity::EntityStore;
use crate::types::{EntityId, SketchEntity};

/// A solvable scalar field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    X,
    Y,
    Radius,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub entity: EntityId,
    pub field: Field,
    slot: usize,
}

/// Column layout of the Jacobian.
///
/// Built once per solve: `(x, y)` for every free point and `radius` for every
/// free circle, in entity insertion order. The store must not gain or lose
/// entities while a map built from it is in use.
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    vars: Vec<Variable>,
}

impl VariableMap {
    pub fn extract(store: &EntityStore) -> Self {
        let mut vars = Vec::new();
        for entity in store.iter() {
            let id = entity.id();
            if store.is_fixed(id) {
                continue;
            }
            let Some(slot) = store.slot(id) else {
                continue;
            };
            match entity {
                SketchEntity::Point { .. } => {
                    vars.push(Variable {
                        entity: id,
                        field: Field::X,
                        slot,
                    });
                    vars.push(Variable {
                        entity: id,
                        field: Field::Y,
                        slot,
                    });
                }
                SketchEntity::Circle { .. } => vars.push(Variable {
                    entity: id,
                    field: Field::Radius,
                    slot,
                }),
                SketchEntity::Line { .. } | SketchEntity::Arc { .. } => {}
            }
        }
        Self { vars }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// `(entity, field)` pairs in column order.
    pub fn layout(&self) -> Vec<(EntityId, Field)> {
        self.vars.iter().map(|v| (v.entity, v.field)).collect()
    }

    pub fn get(&self, store: &EntityStore, column: usize) -> f64 {
        let v = &self.vars[column];
        store.read_field(v.slot, v.field)
    }

    pub fn set(&self, store: &mut EntityStore, column: usize, value: f64) {
        let v = &self.vars[column];
        store.write_field(v.slot, v.field, value);
    }

    /// Gather current values in column order.
    pub fn read(&self, store: &EntityStore) -> Vec<f64> {
        self.vars
            .iter()
            .map(|v| store.read_field(v.slot, v.field))
            .collect()
    }

    /// Scatter values back into the store.
    pub fn write(&self, store: &mut EntityStore, values: &[f64]) {
        debug_assert_eq!(values.len(), self.vars.len());
        for (v, value) in self.vars.iter().zip(values) {
            store.write_field(v.slot, v.field, *value);
        }
    }
}
