use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SketchError;

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Caller-chosen identifier of a sketch entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

/// Identifier assigned by the constraint store, sequential per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        EntityId(id)
    }
}

// ── Entities ────────────────────────────────────────────────────────────────

/// A geometric primitive owned by the entity store.
///
/// Lines, circles and arcs refer to their defining points by id; the points
/// themselves carry the coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SketchEntity {
    Point {
        id: EntityId,
        x: f64,
        y: f64,
        z: f64,
        fixed: bool,
    },
    Line {
        id: EntityId,
        start_id: EntityId,
        end_id: EntityId,
    },
    Circle {
        id: EntityId,
        center_id: EntityId,
        radius: f64,
        fixed: bool,
    },
    Arc {
        id: EntityId,
        center_id: EntityId,
        start_id: EntityId,
        end_id: EntityId,
        radius: f64,
    },
}

impl SketchEntity {
    pub fn id(&self) -> EntityId {
        match self {
            SketchEntity::Point { id, .. }
            | SketchEntity::Line { id, .. }
            | SketchEntity::Circle { id, .. }
            | SketchEntity::Arc { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            SketchEntity::Point { .. } => EntityKind::Point,
            SketchEntity::Line { .. } => EntityKind::Line,
            SketchEntity::Circle { .. } => EntityKind::Circle,
            SketchEntity::Arc { .. } => EntityKind::Arc,
        }
    }

    /// Whether the entity is currently excluded from the variable vector.
    /// Lines and arcs have no fixed flag of their own.
    pub fn is_fixed(&self) -> bool {
        match self {
            SketchEntity::Point { fixed, .. } | SketchEntity::Circle { fixed, .. } => *fixed,
            SketchEntity::Line { .. } | SketchEntity::Arc { .. } => false,
        }
    }

    /// Point ids this entity is built from, in declaration order.
    pub fn references(&self) -> Vec<EntityId> {
        match self {
            SketchEntity::Point { .. } => Vec::new(),
            SketchEntity::Line {
                start_id, end_id, ..
            } => vec![*start_id, *end_id],
            SketchEntity::Circle { center_id, .. } => vec![*center_id],
            SketchEntity::Arc {
                center_id,
                start_id,
                end_id,
                ..
            } => vec![*center_id, *start_id, *end_id],
        }
    }

    /// DOF the entity contributes on creation, before any constraint.
    ///
    /// A free point has 2, a free circle's radius 1 and an arc's radius 1.
    /// Lines carry none; their DOF live in the endpoints.
    pub fn intrinsic_dof(&self) -> i64 {
        match self {
            SketchEntity::Point { fixed: false, .. } => 2,
            SketchEntity::Circle { fixed: false, .. } => 1,
            SketchEntity::Arc { .. } => 1,
            _ => 0,
        }
    }
}

/// Classification of entity types for constraint dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Point,
    Line,
    Circle,
    Arc,
}

impl EntityKind {
    /// Circles and arcs both have a center and a radius.
    pub fn is_round(self) -> bool {
        matches!(self, EntityKind::Circle | EntityKind::Arc)
    }
}

// ── Constraints ─────────────────────────────────────────────────────────────

/// The fixed constraint vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    Distance,
    Angle,
    Radius,
    Diameter,
    Length,
    Horizontal,
    Vertical,
    Parallel,
    Perpendicular,
    Tangent,
    Equal,
    FixX,
    FixY,
    Coincident,
    Concentric,
    Colinear,
    Symmetric,
    Midpoint,
    Fixed,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 19] = [
        ConstraintKind::Distance,
        ConstraintKind::Angle,
        ConstraintKind::Radius,
        ConstraintKind::Diameter,
        ConstraintKind::Length,
        ConstraintKind::Horizontal,
        ConstraintKind::Vertical,
        ConstraintKind::Parallel,
        ConstraintKind::Perpendicular,
        ConstraintKind::Tangent,
        ConstraintKind::Equal,
        ConstraintKind::FixX,
        ConstraintKind::FixY,
        ConstraintKind::Coincident,
        ConstraintKind::Concentric,
        ConstraintKind::Colinear,
        ConstraintKind::Symmetric,
        ConstraintKind::Midpoint,
        ConstraintKind::Fixed,
    ];

    /// DOF removed from the global balance when a constraint of this kind is added.
    pub fn dof_cost(self) -> i64 {
        match self {
            ConstraintKind::Distance
            | ConstraintKind::Angle
            | ConstraintKind::Radius
            | ConstraintKind::Diameter
            | ConstraintKind::Length
            | ConstraintKind::Horizontal
            | ConstraintKind::Vertical
            | ConstraintKind::Parallel
            | ConstraintKind::Perpendicular
            | ConstraintKind::Tangent
            | ConstraintKind::Equal
            | ConstraintKind::FixX
            | ConstraintKind::FixY => 1,
            ConstraintKind::Coincident
            | ConstraintKind::Concentric
            | ConstraintKind::Colinear
            | ConstraintKind::Symmetric
            | ConstraintKind::Midpoint => 2,
            ConstraintKind::Fixed => 3,
        }
    }

    /// Number of entity ids a constraint of this kind takes.
    pub fn arity(self) -> usize {
        match self {
            ConstraintKind::Radius
            | ConstraintKind::Diameter
            | ConstraintKind::Length
            | ConstraintKind::Horizontal
            | ConstraintKind::Vertical
            | ConstraintKind::FixX
            | ConstraintKind::FixY
            | ConstraintKind::Fixed => 1,
            ConstraintKind::Symmetric => 3,
            _ => 2,
        }
    }

    /// Dimensional kinds need a target value.
    pub fn requires_value(self) -> bool {
        matches!(
            self,
            ConstraintKind::Distance
                | ConstraintKind::Angle
                | ConstraintKind::Radius
                | ConstraintKind::Diameter
                | ConstraintKind::Length
                | ConstraintKind::FixX
                | ConstraintKind::FixY
        )
    }

    /// Number of scalar equations the kind feeds into the Jacobian.
    pub fn equation_count(self) -> usize {
        match self {
            ConstraintKind::Fixed => 0,
            ConstraintKind::Coincident
            | ConstraintKind::Concentric
            | ConstraintKind::Colinear
            | ConstraintKind::Symmetric
            | ConstraintKind::Midpoint => 2,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConstraintKind::Distance => "DISTANCE",
            ConstraintKind::Angle => "ANGLE",
            ConstraintKind::Radius => "RADIUS",
            ConstraintKind::Diameter => "DIAMETER",
            ConstraintKind::Length => "LENGTH",
            ConstraintKind::Horizontal => "HORIZONTAL",
            ConstraintKind::Vertical => "VERTICAL",
            ConstraintKind::Parallel => "PARALLEL",
            ConstraintKind::Perpendicular => "PERPENDICULAR",
            ConstraintKind::Tangent => "TANGENT",
            ConstraintKind::Equal => "EQUAL",
            ConstraintKind::FixX => "FIX_X",
            ConstraintKind::FixY => "FIX_Y",
            ConstraintKind::Coincident => "COINCIDENT",
            ConstraintKind::Concentric => "CONCENTRIC",
            ConstraintKind::Colinear => "COLINEAR",
            ConstraintKind::Symmetric => "SYMMETRIC",
            ConstraintKind::Midpoint => "MIDPOINT",
            ConstraintKind::Fixed => "FIXED",
        }
    }

    /// Short glyph shown next to a constraint in a sketch UI.
    pub fn symbol(self) -> &'static str {
        match self {
            ConstraintKind::Distance => "↔",
            ConstraintKind::Angle => "∠",
            ConstraintKind::Radius => "R",
            ConstraintKind::Diameter => "⌀",
            ConstraintKind::Length => "L",
            ConstraintKind::Horizontal => "H",
            ConstraintKind::Vertical => "V",
            ConstraintKind::Parallel => "∥",
            ConstraintKind::Perpendicular => "⊥",
            ConstraintKind::Tangent => "T",
            ConstraintKind::Equal => "=",
            ConstraintKind::FixX => "X",
            ConstraintKind::FixY => "Y",
            ConstraintKind::Coincident => "●",
            ConstraintKind::Concentric => "◎",
            ConstraintKind::Colinear => "⋯",
            ConstraintKind::Symmetric => "⇌",
            ConstraintKind::Midpoint => "M",
            ConstraintKind::Fixed => "⚓",
        }
    }

    /// Whether the given entity kinds are ones this constraint has a residual for.
    /// Mismatches are accepted but evaluate to zero.
    pub fn accepts(self, kinds: &[EntityKind]) -> bool {
        use EntityKind::*;
        match (self, kinds) {
            (ConstraintKind::Distance | ConstraintKind::Coincident, [a, b]) => {
                anchored(*a) && anchored(*b)
            }
            (ConstraintKind::Concentric, [a, b]) => anchored(*a) && anchored(*b),
            (
                ConstraintKind::Length | ConstraintKind::Horizontal | ConstraintKind::Vertical,
                [Line],
            ) => true,
            (
                ConstraintKind::Parallel
                | ConstraintKind::Perpendicular
                | ConstraintKind::Angle
                | ConstraintKind::Colinear,
                [Line, Line],
            ) => true,
            (ConstraintKind::Radius | ConstraintKind::Diameter, [k]) => k.is_round(),
            (ConstraintKind::Tangent, [Line, k]) | (ConstraintKind::Tangent, [k, Line]) => {
                k.is_round()
            }
            (ConstraintKind::Equal, [Line, Line]) => true,
            (ConstraintKind::Equal, [a, b]) => a.is_round() && b.is_round(),
            (ConstraintKind::FixX | ConstraintKind::FixY, [k]) => anchored(*k),
            (ConstraintKind::Midpoint, [a, Line]) => anchored(*a),
            (ConstraintKind::Symmetric, [a, b, Line]) => anchored(*a) && anchored(*b),
            (ConstraintKind::Fixed, [_]) => true,
            _ => false,
        }
    }
}

/// Entities that resolve to a single location: a point, or a circle/arc center.
fn anchored(kind: EntityKind) -> bool {
    matches!(kind, EntityKind::Point | EntityKind::Circle | EntityKind::Arc)
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConstraintKind {
    type Err = SketchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        ConstraintKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| SketchError::UnknownConstraintKind(s.to_string()))
    }
}

/// Optional settings for a new constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintOptions {
    /// Reported back to callers; higher values are listed first in diagnostics.
    pub priority: i32,
    /// Scales the constraint's equations in the least-squares step.
    /// Must be finite and positive.
    pub weight: f64,
    /// Parameter that drives this constraint's value.
    pub parameter: Option<String>,
}

impl Default for ConstraintOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            weight: 1.0,
            parameter: None,
        }
    }
}

/// A constraint record. Holds entity ids only; entities belong to the entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub entity_ids: Vec<EntityId>,
    pub value: Option<f64>,
    pub priority: i32,
    pub weight: f64,
    /// Valid only right after a converged solve; cleared on any change.
    pub satisfied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl Constraint {
    /// Target value, or 0 for geometric (valueless) kinds.
    pub fn target(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn references(&self, entity: EntityId) -> bool {
        self.entity_ids.contains(&entity)
    }
}
