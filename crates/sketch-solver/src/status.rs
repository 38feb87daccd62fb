use serde::{Deserialize, Serialize};

use crate::constraint::ConstraintStore;
use crate::types::{ConstraintId, ConstraintKind, EntityId};

/// Summary of a sketch's size, DOF balance and last solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchStatus {
    pub entity_count: usize,
    pub constraint_count: usize,
    pub dof_count: i64,
    pub solved: bool,
    /// Iterations of the last solve, 0 if none ran yet.
    pub iterations: usize,
    pub fully_constrained: bool,
    pub over_constrained: bool,
    pub under_constrained: bool,
}

/// Per-constraint diagnostics for a sketch UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintStatus {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub symbol: String,
    pub satisfied: bool,
    pub entity_ids: Vec<EntityId>,
    pub priority: i32,
}

/// DOF balance from bookkeeping alone. Zero is necessary, not sufficient,
/// for a unique solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintBalance {
    FullyConstrained,
    UnderConstrained { dof: u32 },
    OverConstrained { excess: u32 },
}

impl ConstraintBalance {
    pub fn classify(dof_count: i64) -> Self {
        match dof_count {
            0 => ConstraintBalance::FullyConstrained,
            d if d > 0 => ConstraintBalance::UnderConstrained {
                dof: u32::try_from(d).unwrap_or(u32::MAX),
            },
            d => ConstraintBalance::OverConstrained {
                excess: u32::try_from(d.unsigned_abs()).unwrap_or(u32::MAX),
            },
        }
    }
}

impl SketchStatus {
    pub fn balance(&self) -> ConstraintBalance {
        ConstraintBalance::classify(self.dof_count)
    }
}

/// Constraint diagnostics, higher priority first, then creation order.
pub fn constraint_statuses(constraints: &ConstraintStore) -> Vec<ConstraintStatus> {
    let mut out: Vec<ConstraintStatus> = constraints
        .iter()
        .map(|c| ConstraintStatus {
            id: c.id,
            kind: c.kind,
            symbol: c.kind.symbol().to_string(),
            satisfied: c.satisfied,
            entity_ids: c.entity_ids.clone(),
            priority: c.priority,
        })
        .collect();
    out.sort_by_key(|s| (std::cmp::Reverse(s.priority), s.id));
    out
}
