//! Named parameters that drive constraint values, and edit-then-re-solve.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::SketchError;
use crate::session::SketchSession;
use crate::types::ConstraintId;

/// Flat name → value table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    values: HashMap<String, f64>,
}

impl ParameterTable {
    pub fn define(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl SketchSession {
    /// Define or overwrite a parameter. Bound constraints are not touched
    /// until the next `update_parameter`.
    pub fn define_parameter(&mut self, name: &str, value: f64) {
        self.parameters.define(name, value);
    }

    pub fn get_parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    /// Store a new parameter value, push it into every bound constraint and
    /// re-solve from the current positions.
    #[instrument(skip(self))]
    pub fn update_parameter(&mut self, name: &str, value: f64) -> Result<bool, SketchError> {
        if !self.parameters.contains(name) {
            return Err(SketchError::UnknownParameter {
                name: name.to_string(),
            });
        }
        self.parameters.define(name, value);
        let bound = self.constraints.apply_parameter(name, value);
        debug!(bound, "parameter pushed to constraints");
        self.invalidate();
        Ok(self.solve())
    }

    /// Set one constraint's value and re-solve. Returns false for an unknown id.
    #[instrument(skip(self))]
    pub fn update_constraint_value(&mut self, id: ConstraintId, value: f64) -> bool {
        if !self.constraints.set_value(id, value) {
            return false;
        }
        self.invalidate();
        self.solve()
    }

    /// Drive an existing constraint from a parameter. The parameter's current
    /// value is copied in; no solve is run.
    pub fn bind_parameter(&mut self, id: ConstraintId, name: &str) -> Result<(), SketchError> {
        let value = self
            .parameters
            .get(name)
            .ok_or_else(|| SketchError::UnknownParameter {
                name: name.to_string(),
            })?;
        if self.constraints.get(id).is_none() {
            return Err(SketchError::ConstraintNotFound { id });
        }
        self.constraints.bind(id, name);
        self.constraints.set_value(id, value);
        self.invalidate();
        Ok(())
    }
}
