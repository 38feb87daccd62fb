//! Constraint evaluation: pure residual functions over current entity state.
//!
//! Every constraint produces a fixed number of equation components (the rows
//! it contributes to the Jacobian) and one scalar residual used for the total
//! error and the `satisfied` flag. Residuals are zero when the constraint holds.

use nalgebra::Vector2;
use std::f64::consts::PI;

use crate::entity::EntityStore;
use crate::types::{Constraint, ConstraintKind, EntityId};

type Vec2 = Vector2<f64>;

/// Lines shorter than this are treated as degenerate.
const DEGENERATE_LENGTH: f64 = 1e-12;

/// Evaluated state of one constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Residual {
    /// FIXED: no equations, always satisfied.
    Bookkeeping,
    Scalar(f64),
    Planar(f64, f64),
}

impl Residual {
    /// Signed value for scalar kinds, Euclidean norm for planar ones.
    pub fn value(self) -> f64 {
        match self {
            Residual::Bookkeeping => 0.0,
            Residual::Scalar(r) => r,
            Residual::Planar(a, b) => a.hypot(b),
        }
    }

    fn push_into(self, out: &mut Vec<f64>, weight: f64) {
        match self {
            Residual::Bookkeeping => {}
            Residual::Scalar(r) => out.push(weight * r),
            Residual::Planar(a, b) => {
                out.push(weight * a);
                out.push(weight * b);
            }
        }
    }
}

/// Scalar residual of a constraint.
pub fn residual(constraint: &Constraint, store: &EntityStore) -> f64 {
    evaluate(constraint, store).value()
}

/// Append a constraint's weighted equation components to `out`.
///
/// Always appends exactly `constraint.kind.equation_count()` values, so row
/// positions stay stable while the solver probes variables.
pub fn push_equations(constraint: &Constraint, store: &EntityStore, out: &mut Vec<f64>) {
    evaluate(constraint, store).push_into(out, constraint.weight);
}

/// Dispatch on constraint kind. Entity kinds the constraint has no formula for
/// evaluate to zero.
pub fn evaluate(constraint: &Constraint, store: &EntityStore) -> Residual {
    let ids = constraint.entity_ids.as_slice();
    let target = constraint.target();
    let shape = constraint.kind.equation_count();
    let evaluated = match constraint.kind {
        ConstraintKind::Fixed => Some(Residual::Bookkeeping),
        ConstraintKind::Distance => distance(store, ids, target),
        ConstraintKind::Length => length(store, ids, target),
        ConstraintKind::Horizontal => line_delta(store, ids).map(|d| Residual::Scalar(d.y)),
        ConstraintKind::Vertical => line_delta(store, ids).map(|d| Residual::Scalar(d.x)),
        ConstraintKind::Parallel => {
            line_pair(store, ids).map(|(d1, d2)| Residual::Scalar(cross(d1, d2)))
        }
        ConstraintKind::Perpendicular => {
            line_pair(store, ids).map(|(d1, d2)| Residual::Scalar(d1.dot(&d2)))
        }
        ConstraintKind::Angle => line_pair(store, ids).map(|(d1, d2)| angle(d1, d2, target)),
        ConstraintKind::Coincident | ConstraintKind::Concentric => coincident(store, ids),
        ConstraintKind::Tangent => tangent(store, ids),
        ConstraintKind::Equal => equal(store, ids),
        ConstraintKind::Radius => first_round(store, ids).map(|r| Residual::Scalar(r - target)),
        ConstraintKind::Diameter => {
            first_round(store, ids).map(|r| Residual::Scalar(2.0 * r - target))
        }
        ConstraintKind::FixX => first_anchor(store, ids).map(|p| Residual::Scalar(p.x - target)),
        ConstraintKind::FixY => first_anchor(store, ids).map(|p| Residual::Scalar(p.y - target)),
        ConstraintKind::Midpoint => midpoint(store, ids),
        ConstraintKind::Symmetric => symmetric(store, ids),
        ConstraintKind::Colinear => colinear(store, ids),
    };
    evaluated.unwrap_or(match shape {
        0 => Residual::Bookkeeping,
        1 => Residual::Scalar(0.0),
        _ => Residual::Planar(0.0, 0.0),
    })
}

// ── Geometry helpers ────────────────────────────────────────────────────────

fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

fn first_anchor(store: &EntityStore, ids: &[EntityId]) -> Option<Vec2> {
    store.anchor(*ids.first()?)
}

fn first_round(store: &EntityStore, ids: &[EntityId]) -> Option<f64> {
    store.round(*ids.first()?).map(|(_, r)| r)
}

/// Direction vector (end − start) of the first line.
fn line_delta(store: &EntityStore, ids: &[EntityId]) -> Option<Vec2> {
    let (s, e) = store.segment(*ids.first()?)?;
    Some(e - s)
}

fn line_pair(store: &EntityStore, ids: &[EntityId]) -> Option<(Vec2, Vec2)> {
    let [a, b] = ids else { return None };
    let (s1, e1) = store.segment(*a)?;
    let (s2, e2) = store.segment(*b)?;
    Some((e1 - s1, e2 - s2))
}

/// Wrap an angle in radians into (−π, π].
fn wrap_angle(mut a: f64) -> f64 {
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}

// ── Residuals ───────────────────────────────────────────────────────────────

fn distance(store: &EntityStore, ids: &[EntityId], target: f64) -> Option<Residual> {
    let [a, b] = ids else { return None };
    let p1 = store.anchor(*a)?;
    let p2 = store.anchor(*b)?;
    Some(Residual::Scalar((p2 - p1).norm() - target))
}

fn length(store: &EntityStore, ids: &[EntityId], target: f64) -> Option<Residual> {
    line_delta(store, ids).map(|d| Residual::Scalar(d.norm() - target))
}

fn coincident(store: &EntityStore, ids: &[EntityId]) -> Option<Residual> {
    let [a, b] = ids else { return None };
    let d = store.anchor(*b)? - store.anchor(*a)?;
    Some(Residual::Planar(d.x, d.y))
}

/// Fold any angle in degrees onto the unsigned range [0, 180].
/// −45 and 315 both become 45.
pub fn fold_angle_target(degrees: f64) -> f64 {
    let t = degrees.abs() % 360.0;
    if t > 180.0 { 360.0 - t } else { t }
}

/// Signed angle from the first line to the second, compared with the target
/// magnitude on the side the lines currently sit on. Result in degrees.
///
/// atan2 keeps the derivative finite at 0° and 180°, where an arccos
/// formulation is singular.
fn angle(d1: Vec2, d2: Vec2, target_deg: f64) -> Residual {
    let current = cross(d1, d2).atan2(d1.dot(&d2));
    let side = if current < 0.0 { -1.0 } else { 1.0 };
    let target = fold_angle_target(target_deg).to_radians();
    let diff = wrap_angle(current - side * target);
    Residual::Scalar(diff.to_degrees())
}

/// Distance from a circle's center to the nearest point of a line segment,
/// minus the radius. The projection is clamped to the segment, so this is
/// segment tangency rather than infinite-line tangency.
fn tangent(store: &EntityStore, ids: &[EntityId]) -> Option<Residual> {
    let [a, b] = ids else { return None };
    let ((center, radius), (s, e)) = match (store.round(*a), store.segment(*b)) {
        (Some(round), Some(seg)) => (round, seg),
        _ => (store.round(*b)?, store.segment(*a)?),
    };
    let dir = e - s;
    let len_sq = dir.norm_squared();
    let closest = if len_sq < DEGENERATE_LENGTH * DEGENERATE_LENGTH {
        s
    } else {
        let t = ((center - s).dot(&dir) / len_sq).clamp(0.0, 1.0);
        s + dir * t
    };
    Some(Residual::Scalar((center - closest).norm() - radius))
}

/// Length difference for two lines, radius difference for two circles/arcs.
fn equal(store: &EntityStore, ids: &[EntityId]) -> Option<Residual> {
    let [a, b] = ids else { return None };
    if let (Some((s1, e1)), Some((s2, e2))) = (store.segment(*a), store.segment(*b)) {
        return Some(Residual::Scalar((e1 - s1).norm() - (e2 - s2).norm()));
    }
    let (_, r1) = store.round(*a)?;
    let (_, r2) = store.round(*b)?;
    Some(Residual::Scalar(r1 - r2))
}

/// Point minus the midpoint of the line.
fn midpoint(store: &EntityStore, ids: &[EntityId]) -> Option<Residual> {
    let [point, line] = ids else { return None };
    let p = store.anchor(*point)?;
    let (s, e) = store.segment(*line)?;
    let d = p - (s + e) * 0.5;
    Some(Residual::Planar(d.x, d.y))
}

/// The midpoint of p1–p2 lies on the axis and p1–p2 is perpendicular to it.
/// Both components are normalized by the axis length.
fn symmetric(store: &EntityStore, ids: &[EntityId]) -> Option<Residual> {
    let [a, b, axis] = ids else { return None };
    let p1 = store.anchor(*a)?;
    let p2 = store.anchor(*b)?;
    let (s, e) = store.segment(*axis)?;
    let u = e - s;
    let len = u.norm();
    if len < DEGENERATE_LENGTH {
        return None;
    }
    let mid = (p1 + p2) * 0.5;
    Some(Residual::Planar(
        cross(mid - s, u) / len,
        (p2 - p1).dot(&u) / len,
    ))
}

/// Both endpoints of the second line lie on the infinite extension of the first.
fn colinear(store: &EntityStore, ids: &[EntityId]) -> Option<Residual> {
    let [a, b] = ids else { return None };
    let (s1, e1) = store.segment(*a)?;
    let (s2, e2) = store.segment(*b)?;
    let d = e1 - s1;
    let len = d.norm();
    if len < DEGENERATE_LENGTH {
        return None;
    }
    Some(Residual::Planar(
        cross(d, s2 - s1) / len,
        cross(d, e2 - s1) / len,
    ))
}
