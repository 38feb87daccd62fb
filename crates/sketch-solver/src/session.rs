//! The sketch session: one owned sketch with its stores, parameters and solver.

use nalgebra::Vector2;
use tracing::{info, instrument};

use crate::constraint::ConstraintStore;
use crate::entity::{EntityStore, PositionSnapshot};
use crate::error::SketchError;
use crate::parametric::ParameterTable;
use crate::solver::{SolveReport, Solver, SolverConfig};
use crate::status::{ConstraintStatus, SketchStatus, constraint_statuses};
use crate::types::{
    Constraint, ConstraintId, ConstraintKind, ConstraintOptions, EntityId, SketchEntity,
};

/// A 2D sketch being edited and solved.
///
/// Sessions are independent: each owns its entities, constraints, parameters
/// and solver state. Hosts sharing one across threads wrap it in a lock.
#[derive(Debug, Clone, Default)]
pub struct SketchSession {
    pub(crate) entities: EntityStore,
    pub(crate) constraints: ConstraintStore,
    pub(crate) parameters: ParameterTable,
    pub(crate) solver: Solver,
    pub(crate) solved: bool,
    pub(crate) last_report: Option<SolveReport>,
}

impl SketchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            solver: Solver::new(config),
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SolverConfig {
        self.solver.config()
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.solver.set_config(config);
    }

    /// `Σ intrinsic DOF − Σ constraint DOF cost`.
    pub fn dof_count(&self) -> i64 {
        self.entities.intrinsic_dof() - self.constraints.dof_cost()
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    pub(crate) fn invalidate(&mut self) {
        self.solved = false;
        self.constraints.invalidate();
    }

    // ── Entities ────────────────────────────────────────────────────────────

    pub fn add_point(&mut self, id: EntityId, x: f64, y: f64) -> Result<EntityId, SketchError> {
        self.add_point_3d(id, x, y, 0.0, false)
    }

    pub fn add_fixed_point(
        &mut self,
        id: EntityId,
        x: f64,
        y: f64,
    ) -> Result<EntityId, SketchError> {
        self.add_point_3d(id, x, y, 0.0, true)
    }

    /// `z` is stored for consumers and never solved.
    pub fn add_point_3d(
        &mut self,
        id: EntityId,
        x: f64,
        y: f64,
        z: f64,
        fixed: bool,
    ) -> Result<EntityId, SketchError> {
        let id = self.entities.add_point(id, x, y, z, fixed)?;
        self.invalidate();
        Ok(id)
    }

    pub fn add_line(
        &mut self,
        id: EntityId,
        start: EntityId,
        end: EntityId,
    ) -> Result<EntityId, SketchError> {
        let id = self.entities.add_line(id, start, end)?;
        self.invalidate();
        Ok(id)
    }

    pub fn add_circle(
        &mut self,
        id: EntityId,
        center: EntityId,
        radius: f64,
    ) -> Result<EntityId, SketchError> {
        let id = self.entities.add_circle(id, center, radius, false)?;
        self.invalidate();
        Ok(id)
    }

    /// A circle whose radius never moves. The center stays free.
    pub fn add_fixed_circle(
        &mut self,
        id: EntityId,
        center: EntityId,
        radius: f64,
    ) -> Result<EntityId, SketchError> {
        let id = self.entities.add_circle(id, center, radius, true)?;
        self.invalidate();
        Ok(id)
    }

    pub fn add_arc(
        &mut self,
        id: EntityId,
        center: EntityId,
        start: EntityId,
        end: EntityId,
        radius: f64,
    ) -> Result<EntityId, SketchError> {
        let id = self.entities.add_arc(id, center, start, end, radius)?;
        self.invalidate();
        Ok(id)
    }

    /// Remove an entity no other entity or constraint refers to.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<SketchEntity, SketchError> {
        if let Some(c) = self.constraints.referencing(id) {
            return Err(SketchError::EntityInUse {
                id,
                by: format!("constraint {}", c.id),
            });
        }
        let removed = self.entities.remove(id)?;
        self.invalidate();
        Ok(removed)
    }

    /// Move a point, e.g. while dragging. The next solve starts from here.
    pub fn set_point(&mut self, id: EntityId, x: f64, y: f64) -> Result<(), SketchError> {
        self.entities.set_point(id, x, y)?;
        self.invalidate();
        Ok(())
    }

    /// Returns false if the entity has no radius.
    pub fn set_radius(&mut self, id: EntityId, radius: f64) -> Result<bool, SketchError> {
        let changed = self.entities.set_radius(id, radius)?;
        if changed {
            self.invalidate();
        }
        Ok(changed)
    }

    pub fn entity(&self, id: EntityId) -> Option<&SketchEntity> {
        self.entities.get(id)
    }

    pub fn point(&self, id: EntityId) -> Option<Vector2<f64>> {
        self.entities.point(id)
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &SketchEntity> {
        self.entities.iter()
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        self.entities.snapshot()
    }

    pub fn restore(&mut self, snapshot: &PositionSnapshot) {
        self.entities.restore(snapshot);
        self.invalidate();
    }

    // ── Constraints ─────────────────────────────────────────────────────────

    /// Add a constraint. When `options.parameter` is set, the constraint takes
    /// its value from that parameter, which must already be defined.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        entity_ids: &[EntityId],
        value: Option<f64>,
        options: ConstraintOptions,
    ) -> Result<ConstraintId, SketchError> {
        let value = match options.parameter.as_deref() {
            Some(name) => Some(self.parameters.get(name).ok_or_else(|| {
                SketchError::UnknownParameter {
                    name: name.to_string(),
                }
            })?),
            None => value,
        };
        let id = self
            .constraints
            .add(&mut self.entities, kind, entity_ids, value, options)?;
        self.solved = false;
        Ok(id)
    }

    /// Add a constraint by its textual kind, e.g. `"DISTANCE"` or `"fix-x"`.
    pub fn add_constraint_named(
        &mut self,
        kind: &str,
        entity_ids: &[EntityId],
        value: Option<f64>,
        options: ConstraintOptions,
    ) -> Result<ConstraintId, SketchError> {
        let kind: ConstraintKind = kind.parse()?;
        self.add_constraint(kind, entity_ids, value, options)
    }

    fn add_simple(
        &mut self,
        kind: ConstraintKind,
        entity_ids: &[EntityId],
        value: Option<f64>,
    ) -> Result<ConstraintId, SketchError> {
        self.add_constraint(kind, entity_ids, value, ConstraintOptions::default())
    }

    pub fn add_distance(
        &mut self,
        a: EntityId,
        b: EntityId,
        distance: f64,
    ) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Distance, &[a, b], Some(distance))
    }

    pub fn add_length(&mut self, line: EntityId, length: f64) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Length, &[line], Some(length))
    }

    pub fn add_horizontal(&mut self, line: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Horizontal, &[line], None)
    }

    pub fn add_vertical(&mut self, line: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Vertical, &[line], None)
    }

    pub fn add_parallel(&mut self, l1: EntityId, l2: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Parallel, &[l1, l2], None)
    }

    pub fn add_perpendicular(
        &mut self,
        l1: EntityId,
        l2: EntityId,
    ) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Perpendicular, &[l1, l2], None)
    }

    /// Angle between two lines in degrees.
    pub fn add_angle(
        &mut self,
        l1: EntityId,
        l2: EntityId,
        degrees: f64,
    ) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Angle, &[l1, l2], Some(degrees))
    }

    pub fn add_coincident(&mut self, a: EntityId, b: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Coincident, &[a, b], None)
    }

    pub fn add_concentric(&mut self, a: EntityId, b: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Concentric, &[a, b], None)
    }

    /// Tangency between a circle or arc and a line segment, in either order.
    pub fn add_tangent(&mut self, a: EntityId, b: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Tangent, &[a, b], None)
    }

    pub fn add_equal(&mut self, a: EntityId, b: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Equal, &[a, b], None)
    }

    pub fn add_radius(&mut self, round: EntityId, radius: f64) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Radius, &[round], Some(radius))
    }

    pub fn add_diameter(
        &mut self,
        round: EntityId,
        diameter: f64,
    ) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Diameter, &[round], Some(diameter))
    }

    pub fn add_fix_x(&mut self, point: EntityId, x: f64) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::FixX, &[point], Some(x))
    }

    pub fn add_fix_y(&mut self, point: EntityId, y: f64) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::FixY, &[point], Some(y))
    }

    /// Pin an entity in place. Removing the constraint frees it again.
    pub fn add_fixed(&mut self, entity: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Fixed, &[entity], None)
    }

    pub fn add_midpoint(
        &mut self,
        point: EntityId,
        line: EntityId,
    ) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Midpoint, &[point, line], None)
    }

    /// `a` and `b` mirrored across `axis`.
    pub fn add_symmetric(
        &mut self,
        a: EntityId,
        b: EntityId,
        axis: EntityId,
    ) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Symmetric, &[a, b, axis], None)
    }

    pub fn add_colinear(&mut self, l1: EntityId, l2: EntityId) -> Result<ConstraintId, SketchError> {
        self.add_simple(ConstraintKind::Colinear, &[l1, l2], None)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint, SketchError> {
        let removed = self.constraints.remove(&mut self.entities, id)?;
        self.solved = false;
        Ok(removed)
    }

    /// Change a constraint's value without re-solving.
    pub fn set_value(&mut self, id: ConstraintId, value: f64) -> Result<(), SketchError> {
        if !self.constraints.set_value(id, value) {
            return Err(SketchError::ConstraintNotFound { id });
        }
        self.solved = false;
        Ok(())
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    // ── Solving ─────────────────────────────────────────────────────────────

    /// Solve from the current positions. Returns whether every constraint
    /// converged; details are in [`SketchSession::last_report`].
    pub fn solve(&mut self) -> bool {
        self.solve_report().converged()
    }

    #[instrument(skip(self), fields(entities = self.entities.len(), constraints = self.constraints.len()))]
    pub fn solve_report(&mut self) -> SolveReport {
        let report = self.solver.solve(&mut self.entities, &mut self.constraints);
        self.solved = report.converged();
        self.last_report = Some(report.clone());
        report
    }

    pub fn last_report(&self) -> Option<&SolveReport> {
        self.last_report.as_ref()
    }

    pub fn get_status(&self) -> SketchStatus {
        let dof_count = self.dof_count();
        SketchStatus {
            entity_count: self.entities.len(),
            constraint_count: self.constraints.len(),
            dof_count,
            solved: self.solved,
            iterations: self.last_report.as_ref().map_or(0, |r| r.iterations),
            fully_constrained: dof_count == 0,
            over_constrained: dof_count < 0,
            under_constrained: dof_count > 0,
        }
    }

    pub fn get_constraint_status(&self) -> Vec<ConstraintStatus> {
        constraint_statuses(&self.constraints)
    }

    /// DOF left after the Jacobian rank at the current positions.
    pub fn rank_dof(&mut self) -> i64 {
        self.solver.rank_dof(&mut self.entities, &self.constraints)
    }

    /// Drop every entity, constraint and parameter.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.constraints.clear();
        self.parameters.clear();
        self.solver.reset();
        self.solved = false;
        self.last_report = None;
        info!("sketch session reset");
    }
}
