use approx::assert_relative_eq;
use sketch_solver::*;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn id(n: u32) -> EntityId {
    EntityId(n)
}

fn assert_point_near(session: &SketchSession, point: u32, expected: (f64, f64), tol: f64) {
    let p = session
        .point(id(point))
        .unwrap_or_else(|| panic!("point {} not found in session", point));
    assert!(
        (p.x - expected.0).abs() < tol && (p.y - expected.1).abs() < tol,
        "point {} = ({:.6}, {:.6}), expected ({:.6}, {:.6}), tol={tol}",
        point,
        p.x,
        p.y,
        expected.0,
        expected.1,
    );
}

fn distance(session: &SketchSession, a: u32, b: u32) -> f64 {
    let pa = session.point(id(a)).unwrap();
    let pb = session.point(id(b)).unwrap();
    (pb - pa).norm()
}

/// Degrees from line `l1` to line `l2`, signed, in (−180, 180].
fn line_angle(session: &SketchSession, l1: u32, l2: u32) -> f64 {
    let dir = |l: u32| match session.entity(id(l)) {
        Some(SketchEntity::Line {
            start_id, end_id, ..
        }) => session.point(*end_id).unwrap() - session.point(*start_id).unwrap(),
        other => panic!("entity {} is not a line: {:?}", l, other),
    };
    let (d1, d2) = (dir(l1), dir(l2));
    (d1.x * d2.y - d1.y * d2.x).atan2(d1.dot(&d2)).to_degrees()
}

/// Slightly skewed 100×50 rectangle with its first corner created fixed.
/// Points 1–4, lines 11–14.
fn skewed_rectangle() -> SketchSession {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 95.0, 3.0).unwrap();
    s.add_point(id(3), 103.0, 48.0).unwrap();
    s.add_point(id(4), -2.0, 52.0).unwrap();
    s.add_line(id(11), id(1), id(2)).unwrap();
    s.add_line(id(12), id(2), id(3)).unwrap();
    s.add_line(id(13), id(3), id(4)).unwrap();
    s.add_line(id(14), id(4), id(1)).unwrap();
    s.add_horizontal(id(11)).unwrap();
    s.add_horizontal(id(13)).unwrap();
    s.add_vertical(id(12)).unwrap();
    s.add_vertical(id(14)).unwrap();
    s.add_distance(id(1), id(2), 100.0).unwrap();
    s.add_distance(id(2), id(3), 50.0).unwrap();
    s
}

// ── Basic Properties ───────────────────────────────────────────────────────

#[test]
fn distance_already_satisfied_converges_immediately() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 3.0, 4.0).unwrap();
    s.add_distance(id(1), id(2), 5.0).unwrap();

    assert!(s.solve());
    let report = s.last_report().unwrap();
    assert!(report.iterations <= 2, "took {} iterations", report.iterations);
    assert_point_near(&s, 2, (3.0, 4.0), 1e-9);
}

#[test]
fn end_to_end_horizontal_line_with_distance() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 10.0, 0.0).unwrap();
    s.add_line(id(3), id(1), id(2)).unwrap();
    assert_eq!(s.dof_count(), 4);

    s.add_horizontal(id(3)).unwrap();
    s.add_distance(id(1), id(2), 10.0).unwrap();
    assert_eq!(s.dof_count(), 2);

    assert!(s.solve());
    let b = s.point(id(2)).unwrap();
    assert!(b.y.abs() < 1e-6);
    assert!((distance(&s, 1, 2) - 10.0).abs() < 1e-6);
}

#[test]
fn single_free_point_is_under_constrained() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 2.0, 3.0).unwrap();
    let status = s.get_status();
    assert_eq!(status.dof_count, 2);
    assert!(status.under_constrained);
    assert!(!status.fully_constrained);
    assert!(!status.over_constrained);
    assert_eq!(
        status.balance(),
        ConstraintBalance::UnderConstrained { dof: 2 }
    );
}

#[test]
fn inconsistent_fixed_points_fail_after_max_iterations() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 10.0, 0.0).unwrap();
    s.add_fixed(id(1)).unwrap();
    s.add_fixed(id(2)).unwrap();
    s.add_distance(id(1), id(2), 5.0).unwrap();

    assert!(s.get_status().over_constrained);
    assert!(!s.solve());
    let report = s.last_report().unwrap();
    assert_eq!(report.state, SolveState::MaxItersExceeded);
    assert_eq!(report.iterations, s.config().max_iterations);
    assert!(!s.get_status().solved);
    assert!(s.get_constraint_status().iter().all(|c| !c.satisfied));
    assert_point_near(&s, 2, (10.0, 0.0), 1e-12);
}

#[test]
fn reset_clears_everything() {
    let mut s = skewed_rectangle();
    s.define_parameter("w", 100.0);
    assert!(s.solve());
    s.reset();

    let status = s.get_status();
    assert_eq!(status.entity_count, 0);
    assert_eq!(status.constraint_count, 0);
    assert_eq!(status.dof_count, 0);
    assert!(!status.solved);
    assert_eq!(s.get_parameter("w"), None);
    assert!(s.last_report().is_none());

    // Ids are reusable after a reset.
    s.add_point(id(1), 0.0, 0.0).unwrap();
    assert_eq!(s.dof_count(), 2);
}

#[test]
fn resolving_converged_system_is_idempotent() {
    let mut s = skewed_rectangle();
    assert!(s.solve());
    let first = s.snapshot();

    assert!(s.solve());
    assert_eq!(s.last_report().unwrap().iterations, 0);
    assert_eq!(s.snapshot(), first);
}

// ── Well-posed Systems ─────────────────────────────────────────────────────

#[test]
fn rectangle_fully_constrained_satisfies_every_constraint() {
    let mut s = skewed_rectangle();
    assert_eq!(s.dof_count(), 0);
    assert!(s.get_status().fully_constrained);

    assert!(s.solve());
    assert_point_near(&s, 1, (0.0, 0.0), 1e-12);
    assert_point_near(&s, 2, (100.0, 0.0), 1e-5);
    assert_point_near(&s, 3, (100.0, 50.0), 1e-5);
    assert_point_near(&s, 4, (0.0, 50.0), 1e-5);

    let statuses = s.get_constraint_status();
    assert_eq!(statuses.len(), 6);
    assert!(statuses.iter().all(|c| c.satisfied));
}

#[test]
fn rank_dof_matches_bookkeeping_without_redundancy() {
    let mut s = skewed_rectangle();
    assert!(s.solve());
    assert_eq!(s.rank_dof(), 0);

    // A second horizontal on the same line costs DOF on paper only.
    s.add_horizontal(id(11)).unwrap();
    assert_eq!(s.dof_count(), -1);
    assert_eq!(s.rank_dof(), 0);
}

#[test]
fn legacy_jacobi_levels_line() {
    let mut s = SketchSession::with_config(SolverConfig::legacy());
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 10.0, 4.0).unwrap();
    s.add_line(id(3), id(1), id(2)).unwrap();
    s.add_horizontal(id(3)).unwrap();

    assert!(s.solve());
    let a = s.point(id(1)).unwrap();
    let b = s.point(id(2)).unwrap();
    assert!((a.y - b.y).abs() < 1e-6);
}

// ── Constraint Kinds ───────────────────────────────────────────────────────

#[test]
fn midpoint_moves_point_onto_line_center() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_fixed_point(id(2), 10.0, 0.0).unwrap();
    s.add_point(id(3), 3.0, 2.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_midpoint(id(3), id(10)).unwrap();

    assert!(s.solve());
    assert_point_near(&s, 3, (5.0, 0.0), 1e-6);
}

#[test]
fn symmetric_mirrors_point_across_axis() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, -5.0).unwrap();
    s.add_fixed_point(id(2), 0.0, 5.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_fixed_point(id(3), -3.0, 1.0).unwrap();
    s.add_point(id(4), 2.0, 2.0).unwrap();
    s.add_symmetric(id(3), id(4), id(10)).unwrap();

    assert!(s.solve());
    assert_point_near(&s, 4, (3.0, 1.0), 1e-6);
}

#[test]
fn colinear_pulls_second_line_onto_first() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_fixed_point(id(2), 10.0, 0.0).unwrap();
    s.add_point(id(3), 12.0, 1.0).unwrap();
    s.add_point(id(4), 20.0, -2.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_line(id(11), id(3), id(4)).unwrap();
    s.add_colinear(id(10), id(11)).unwrap();

    assert!(s.solve());
    assert!(s.point(id(3)).unwrap().y.abs() < 1e-6);
    assert!(s.point(id(4)).unwrap().y.abs() < 1e-6);
}

#[test]
fn angle_right_angle_between_lines() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_fixed_point(id(2), 10.0, 0.0).unwrap();
    s.add_point(id(3), 5.0, 4.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_line(id(11), id(1), id(3)).unwrap();
    s.add_angle(id(10), id(11), 90.0).unwrap();

    assert!(s.solve());
    assert_relative_eq!(line_angle(&s, 10, 11), 90.0, epsilon = 1e-5);
}

#[test]
fn angle_negative_and_reflex_targets_fold() {
    for (target, end, expected) in [(-45.0, (5.0, -4.0), -45.0), (315.0, (5.0, 4.0), 45.0)] {
        let mut s = SketchSession::new();
        s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
        s.add_fixed_point(id(2), 10.0, 0.0).unwrap();
        s.add_point(id(3), end.0, end.1).unwrap();
        s.add_line(id(10), id(1), id(2)).unwrap();
        s.add_line(id(11), id(1), id(3)).unwrap();
        s.add_angle(id(10), id(11), target).unwrap();

        assert!(s.solve(), "angle {target} did not converge");
        assert_relative_eq!(line_angle(&s, 10, 11), expected, epsilon = 1e-5);
    }
}

#[test]
fn angle_near_zero_and_straight_converge() {
    for (target, end) in [(0.0, (10.0, 0.5)), (180.0, (-10.0, 0.5))] {
        let mut s = SketchSession::new();
        s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
        s.add_fixed_point(id(2), 10.0, 0.0).unwrap();
        s.add_point(id(3), end.0, end.1).unwrap();
        s.add_line(id(10), id(1), id(2)).unwrap();
        s.add_line(id(11), id(1), id(3)).unwrap();
        s.add_angle(id(10), id(11), target).unwrap();

        assert!(s.solve(), "angle {target} did not converge");
        let p = s.point(id(3)).unwrap();
        assert!(p.y.abs() < 1e-5, "angle {target}: end y = {}", p.y);
        assert!(p.x.signum() == end.0.signum());
    }
}

#[test]
fn tangent_circle_rests_on_segment() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), -10.0, 0.0).unwrap();
    s.add_fixed_point(id(2), 10.0, 0.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_point(id(3), 1.0, 4.0).unwrap();
    s.add_fixed_circle(id(20), id(3), 3.0).unwrap();
    s.add_tangent(id(20), id(10)).unwrap();

    assert!(s.solve());
    let c = s.point(id(3)).unwrap();
    assert!((c.y.abs() - 3.0).abs() < 1e-6, "center y = {}", c.y);
}

#[test]
fn tangent_arc_rests_on_segment() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), -10.0, 0.0).unwrap();
    s.add_fixed_point(id(2), 10.0, 0.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_point(id(3), 0.0, 5.0).unwrap();
    s.add_point(id(4), 4.0, 5.0).unwrap();
    s.add_point(id(5), 0.0, 9.0).unwrap();
    s.add_arc(id(20), id(3), id(4), id(5), 4.0).unwrap();
    s.add_tangent(id(20), id(10)).unwrap();
    s.add_radius(id(20), 4.0).unwrap();

    assert!(s.solve());
    let c = s.point(id(3)).unwrap();
    assert!((c.y.abs() - 4.0).abs() < 1e-6, "center y = {}", c.y);
    assert_relative_eq!(distance(&s, 3, 4), 4.0, epsilon = 1e-6);
    match s.entity(id(20)) {
        Some(SketchEntity::Arc { radius, .. }) => {
            assert_relative_eq!(*radius, 4.0, epsilon = 1e-6)
        }
        other => panic!("expected arc, got {:?}", other),
    }
}

#[test]
fn equal_and_radius_drive_circle_radii() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_fixed_point(id(2), 20.0, 0.0).unwrap();
    s.add_circle(id(10), id(1), 2.0).unwrap();
    s.add_circle(id(11), id(2), 5.0).unwrap();
    s.add_radius(id(10), 3.0).unwrap();
    s.add_equal(id(10), id(11)).unwrap();
    assert_eq!(s.dof_count(), 0);

    assert!(s.solve());
    for circle in [10, 11] {
        match s.entity(id(circle)) {
            Some(SketchEntity::Circle { radius, .. }) => {
                assert_relative_eq!(*radius, 3.0, epsilon = 1e-6)
            }
            other => panic!("expected circle, got {:?}", other),
        }
    }
}

#[test]
fn diameter_and_concentric() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 1.0, -1.0).unwrap();
    s.add_circle(id(10), id(1), 2.0).unwrap();
    s.add_circle(id(11), id(2), 1.0).unwrap();
    s.add_diameter(id(11), 8.0).unwrap();
    s.add_concentric(id(10), id(11)).unwrap();

    assert!(s.solve());
    assert_point_near(&s, 2, (0.0, 0.0), 1e-6);
    match s.entity(id(11)) {
        Some(SketchEntity::Circle { radius, .. }) => {
            assert_relative_eq!(*radius, 4.0, epsilon = 1e-6)
        }
        other => panic!("expected circle, got {:?}", other),
    }
}

#[test]
fn arc_radius_follows_start_point() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 3.0, 0.0).unwrap();
    s.add_point(id(3), 0.0, 3.0).unwrap();
    s.add_arc(id(10), id(1), id(2), id(3), 3.0).unwrap();
    assert_eq!(s.dof_count(), 5);
    s.add_radius(id(10), 5.0).unwrap();

    assert!(s.solve());
    assert_relative_eq!(distance(&s, 1, 2), 5.0, epsilon = 1e-6);
    match s.entity(id(10)) {
        Some(SketchEntity::Arc { radius, .. }) => {
            assert_relative_eq!(*radius, 5.0, epsilon = 1e-6)
        }
        other => panic!("expected arc, got {:?}", other),
    }
}

#[test]
fn fix_x_and_fix_y_place_point() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 7.0, -3.0).unwrap();
    s.add_fix_x(id(1), 2.0).unwrap();
    s.add_fix_y(id(1), 4.5).unwrap();
    assert!(s.get_status().fully_constrained);

    assert!(s.solve());
    assert_point_near(&s, 1, (2.0, 4.5), 1e-6);
}

#[test]
fn midpoint_moves_circle_center_onto_line_center() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_fixed_point(id(2), 10.0, 0.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_point(id(3), 3.0, 2.0).unwrap();
    s.add_fixed_circle(id(20), id(3), 1.5).unwrap();
    s.add_midpoint(id(20), id(10)).unwrap();

    assert!(s.solve());
    assert_point_near(&s, 3, (5.0, 0.0), 1e-6);
}

#[test]
fn weights_shift_overconstrained_compromise() {
    let solve_with = |weight: f64| {
        let mut s =
            SketchSession::with_config(SolverConfig::default().with_max_iterations(200));
        s.add_point(id(1), 2.0, 0.0).unwrap();
        s.add_fix_y(id(1), 0.0).unwrap();
        s.add_fix_x(id(1), 0.0).unwrap();
        s.add_constraint(
            ConstraintKind::FixX,
            &[id(1)],
            Some(10.0),
            ConstraintOptions {
                weight,
                ..ConstraintOptions::default()
            },
        )
        .unwrap();
        assert!(!s.solve());
        s.point(id(1)).unwrap().x
    };

    // Least squares over x² + w²(x − 10)².
    assert_relative_eq!(solve_with(1.0), 5.0, epsilon = 1e-3);
    assert_relative_eq!(solve_with(3.0), 9.0, epsilon = 1e-3);
}

#[test]
fn mismatched_kinds_evaluate_to_zero() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 1.0, 1.0).unwrap();
    s.add_point(id(3), 5.0, 0.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_line(id(11), id(2), id(3)).unwrap();
    s.add_tangent(id(10), id(11)).unwrap();

    assert!(s.solve());
    assert_eq!(s.last_report().unwrap().iterations, 0);
    assert_point_near(&s, 2, (1.0, 1.0), 1e-12);
}

// ── Pinning and Removal ────────────────────────────────────────────────────

#[test]
fn fixed_point_does_not_move() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 1.0, 1.0).unwrap();
    s.add_point(id(2), 4.0, 5.0).unwrap();
    s.add_fixed(id(1)).unwrap();
    s.add_distance(id(1), id(2), 10.0).unwrap();

    assert!(s.solve());
    assert_point_near(&s, 1, (1.0, 1.0), 1e-12);
    assert_relative_eq!(distance(&s, 1, 2), 10.0, epsilon = 1e-6);
}

#[test]
fn removing_fixed_restores_dof_and_unpins() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 1.0, 1.0).unwrap();
    let before = s.dof_count();
    let fixed = s.add_fixed(id(1)).unwrap();
    assert_eq!(s.dof_count(), before - 3);
    assert!(s.entity(id(1)).unwrap().is_fixed());

    let removed = s.remove_constraint(fixed).unwrap();
    assert_eq!(removed.kind, ConstraintKind::Fixed);
    assert_eq!(s.dof_count(), before);
    assert!(!s.entity(id(1)).unwrap().is_fixed());

    s.add_fix_x(id(1), 6.0).unwrap();
    assert!(s.solve());
    assert_relative_eq!(s.point(id(1)).unwrap().x, 6.0, epsilon = 1e-6);
}

#[test]
fn fixing_a_line_pins_its_endpoints() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 10.0, 0.0).unwrap();
    s.add_point(id(3), 5.0, 5.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_fixed(id(10)).unwrap();
    s.add_distance(id(2), id(3), 3.0).unwrap();

    assert!(s.solve());
    assert_point_near(&s, 1, (0.0, 0.0), 1e-12);
    assert_point_near(&s, 2, (10.0, 0.0), 1e-12);
    assert_relative_eq!(distance(&s, 2, 3), 3.0, epsilon = 1e-6);
}

#[test]
fn remove_constraint_unknown_id() {
    let mut s = SketchSession::new();
    assert_eq!(
        s.remove_constraint(ConstraintId(3)).unwrap_err(),
        SketchError::ConstraintNotFound { id: ConstraintId(3) }
    );
}

#[test]
fn entity_errors_leave_session_unchanged() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_circle(id(2), id(1), 1.0).unwrap();

    assert_eq!(
        s.add_line(id(3), id(1), id(9)).unwrap_err(),
        SketchError::MissingEntity { id: id(9) }
    );
    assert!(matches!(
        s.add_line(id(3), id(1), id(2)),
        Err(SketchError::NotAPoint { .. })
    ));
    assert_eq!(
        s.add_point(id(2), 0.0, 0.0).unwrap_err(),
        SketchError::DuplicateEntity { id: id(2) }
    );
    assert!(matches!(
        s.remove_entity(id(1)),
        Err(SketchError::EntityInUse { .. })
    ));
    let status = s.get_status();
    assert_eq!(status.entity_count, 2);
    assert_eq!(status.dof_count, 3);
}

#[test]
fn non_positive_weight_is_rejected() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 2.0, 0.0).unwrap();
    for weight in [0.0, -2.0, f64::NAN, f64::INFINITY] {
        let err = s
            .add_constraint(
                ConstraintKind::FixX,
                &[id(1)],
                Some(0.5),
                ConstraintOptions {
                    weight,
                    ..ConstraintOptions::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SketchError::InvalidWeight { .. }));
    }
    assert_eq!(s.get_status().constraint_count, 0);
    assert_eq!(s.dof_count(), 2);
}

#[test]
fn snapshot_rolls_back_failed_solve() {
    let mut s = SketchSession::with_config(SolverConfig::default().with_max_iterations(5));
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 1.0, 0.0).unwrap();
    s.add_fix_x(id(2), 3.0).unwrap();
    s.add_fix_x(id(2), 4.0).unwrap();
    let before = s.snapshot();

    assert!(!s.solve());
    s.restore(&before);
    assert_point_near(&s, 2, (1.0, 0.0), 1e-12);
    assert!(!s.get_status().solved);
}

// ── Parametric Updates ─────────────────────────────────────────────────────

#[test]
fn update_parameter_drives_bound_constraint() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 5.0, 0.0).unwrap();
    s.add_line(id(10), id(1), id(2)).unwrap();
    s.add_horizontal(id(10)).unwrap();
    s.define_parameter("width", 5.0);
    let c = s
        .add_constraint(
            ConstraintKind::Distance,
            &[id(1), id(2)],
            None,
            ConstraintOptions {
                parameter: Some("width".into()),
                ..ConstraintOptions::default()
            },
        )
        .unwrap();
    assert!(s.solve());

    assert_eq!(s.update_parameter("width", 8.0), Ok(true));
    assert_eq!(s.get_parameter("width"), Some(8.0));
    assert_eq!(s.constraint(c).unwrap().value, Some(8.0));
    assert_point_near(&s, 2, (8.0, 0.0), 1e-5);
}

#[test]
fn bound_after_the_fact_and_updated() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 0.0, 2.0).unwrap();
    s.add_fix_x(id(2), 0.0).unwrap();
    let c = s.add_fix_y(id(2), 2.0).unwrap();
    s.define_parameter("height", 2.0);
    s.bind_parameter(c, "height").unwrap();

    assert!(s.update_parameter("height", 7.5).unwrap());
    assert_point_near(&s, 2, (0.0, 7.5), 1e-6);
}

#[test]
fn update_constraint_value_resolves() {
    let mut s = SketchSession::new();
    s.add_fixed_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 3.0, 4.0).unwrap();
    let c = s.add_distance(id(1), id(2), 5.0).unwrap();
    assert!(s.solve());

    assert!(s.update_constraint_value(c, 10.0));
    assert_relative_eq!(distance(&s, 1, 2), 10.0, epsilon = 1e-6);
    assert!(!s.update_constraint_value(ConstraintId(42), 1.0));
}

// ── Configuration and Cancellation ─────────────────────────────────────────

#[test]
fn zero_time_budget_cancels() {
    let mut s = SketchSession::with_config(
        SolverConfig::default().with_time_budget(std::time::Duration::ZERO),
    );
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_fix_x(id(1), 1.0).unwrap();

    assert!(!s.solve());
    let report = s.last_report().unwrap();
    assert_eq!(report.state, SolveState::Cancelled);
    assert_eq!(report.iterations, 0);
}

#[test]
fn config_loaded_from_json() {
    let config = SolverConfig::from_json(
        r#"{ "method": "Jacobi", "max_iterations": 300, "tolerance": 1e-8 }"#,
    )
    .unwrap();
    let mut s = SketchSession::with_config(config);
    assert_eq!(s.config().method, SolveMethod::Jacobi);

    s.add_point(id(1), 2.0, 0.0).unwrap();
    s.add_fix_x(id(1), 0.5).unwrap();
    assert!(s.solve());
    assert!(s.last_report().unwrap().total_error < 1e-8);
}

#[test]
fn report_serializes_to_json() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_fix_y(id(1), 1.0).unwrap();
    s.solve();

    let json = serde_json::to_value(s.last_report().unwrap()).unwrap();
    assert_eq!(json["state"], "Converged");
    assert_eq!(json["variable_count"], 2);
    let status = serde_json::to_value(s.get_status()).unwrap();
    assert_eq!(status["solved"], true);
}

// ── Diagnostics ────────────────────────────────────────────────────────────

#[test]
fn constraint_status_sorted_by_priority() {
    let mut s = SketchSession::new();
    s.add_point(id(1), 0.0, 0.0).unwrap();
    s.add_point(id(2), 4.0, 0.0).unwrap();
    let low = s.add_distance(id(1), id(2), 4.0).unwrap();
    let high = s
        .add_constraint(
            ConstraintKind::FixY,
            &[id(2)],
            Some(0.0),
            ConstraintOptions {
                priority: 5,
                ..ConstraintOptions::default()
            },
        )
        .unwrap();

    let statuses = s.get_constraint_status();
    assert_eq!(statuses[0].id, high);
    assert_eq!(statuses[0].symbol, "Y");
    assert_eq!(statuses[1].id, low);
    assert_eq!(statuses[1].entity_ids, vec![id(1), id(2)]);
    assert!(statuses.iter().all(|c| !c.satisfied));
}

// ── Performance Benchmarking ───────────────────────────────────────────────

/// Chain of N rectangles joined corner to corner. The first corner is pinned;
/// every later rectangle starts 10 units away from where the chain needs it.
fn rectangle_chain(n: u32) -> SketchSession {
    let mut s = SketchSession::new();
    for i in 0..n {
        let base = i * 4 + 1;
        let x_off = f64::from(i) * 110.0;
        s.add_point(id(base), x_off, 0.0).unwrap();
        s.add_point(id(base + 1), x_off + 100.0, 1.0).unwrap();
        s.add_point(id(base + 2), x_off + 99.0, 50.0).unwrap();
        s.add_point(id(base + 3), x_off, 51.0).unwrap();

        let line = 1000 + i * 4;
        for k in 0..4 {
            s.add_line(id(line + k), id(base + k), id(base + (k + 1) % 4))
                .unwrap();
        }
        s.add_horizontal(id(line)).unwrap();
        s.add_horizontal(id(line + 2)).unwrap();
        s.add_vertical(id(line + 1)).unwrap();
        s.add_vertical(id(line + 3)).unwrap();
        s.add_distance(id(base), id(base + 1), 100.0).unwrap();
        s.add_distance(id(base + 1), id(base + 2), 50.0).unwrap();

        if i == 0 {
            s.add_fixed(id(base)).unwrap();
        } else {
            s.add_coincident(id(base - 3), id(base)).unwrap();
        }
    }
    s
}

fn bench_chain(n: u32, budget_ms: u128) {
    let runs = 5;
    let mut constraint_count = 0;
    let start = std::time::Instant::now();
    for _ in 0..runs {
        let mut s = rectangle_chain(n);
        constraint_count = s.get_status().constraint_count;
        assert!(s.solve(), "chain of {n} rectangles did not converge");
    }
    let per_solve = start.elapsed() / runs;

    eprintln!(
        "bench: {} constraints, {:.1}µs/solve ({} runs)",
        constraint_count,
        per_solve.as_nanos() as f64 / 1000.0,
        runs
    );
    assert!(
        per_solve.as_millis() < budget_ms,
        "solve with {} constraints took {:?}, expected < {}ms",
        constraint_count,
        per_solve,
        budget_ms
    );
}

#[test]
fn bench_solve_14_constraints() {
    bench_chain(2, 200);
}

#[test]
fn bench_solve_49_constraints() {
    bench_chain(7, 2000);
}
