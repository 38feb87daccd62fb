//! Numerical solver: drives free variables until every residual vanishes.
//!
//! Each iteration evaluates all constraints, builds a forward-difference
//! Jacobian over the free variables and applies one update step:
//!   (J^T J + lambda * I) * dx = -J^T * r
//! for Levenberg-Marquardt, or a per-entry damped Jacobi update for the
//! legacy method.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector, SVD};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::constraint::ConstraintStore;
use crate::entity::EntityStore;
use crate::error::SketchError;
use crate::evaluate::{push_equations, residual};
use crate::variables::VariableMap;

/// Jacobian entries at or below this magnitude are skipped by the Jacobi step.
const JACOBI_PIVOT_MIN: f64 = 1e-10;

/// Update rule applied once per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveMethod {
    /// Damped normal equations with adaptive lambda.
    LevenbergMarquardt,
    /// Per-entry update `dx[j] -= damping * r[i] / J[i][j]`.
    Jacobi,
}

/// Configuration for the sketch solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_iterations: usize,
    /// Converged once the sum of absolute residuals drops below this.
    pub tolerance: f64,
    /// Forward-difference step for the Jacobian.
    pub fd_step: f64,
    pub method: SolveMethod,
    /// Jacobi step scale.
    pub damping: f64,
    pub lambda_initial: f64,
    pub lambda_factor: f64,
    /// Damping retries per iteration before the gradient fallback.
    pub max_lambda_attempts: usize,
    /// Wall-clock limit per solve, checked once per iteration.
    pub time_budget: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            fd_step: 1e-7,
            method: SolveMethod::LevenbergMarquardt,
            damping: 0.5,
            lambda_initial: 1e-3,
            lambda_factor: 10.0,
            max_lambda_attempts: 10,
            time_budget: None,
        }
    }
}

impl SolverConfig {
    /// Damped Jacobi updates, as older sketch files were solved.
    pub fn legacy() -> Self {
        Self {
            method: SolveMethod::Jacobi,
            ..Self::default()
        }
    }

    /// Bounded for drag-time re-solves: fewer iterations and a frame-sized budget.
    pub fn interactive() -> Self {
        Self {
            max_iterations: 200,
            time_budget: Some(Duration::from_millis(16)),
            ..Self::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_method(mut self, method: SolveMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SketchError> {
        let config: SolverConfig =
            serde_json::from_str(json).map_err(|e| SketchError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SketchError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(SketchError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !self.fd_step.is_finite() || self.fd_step <= 0.0 {
            return Err(SketchError::InvalidConfig(format!(
                "fd_step must be positive, got {}",
                self.fd_step
            )));
        }
        if !self.lambda_factor.is_finite() || self.lambda_factor <= 1.0 {
            return Err(SketchError::InvalidConfig(format!(
                "lambda_factor must exceed 1, got {}",
                self.lambda_factor
            )));
        }
        Ok(())
    }
}

/// Solver state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveState {
    Init,
    Iterating,
    Converged,
    MaxItersExceeded,
    Cancelled,
}

/// Outcome of one `solve` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub state: SolveState,
    pub iterations: usize,
    /// Sum of absolute scalar residuals at exit.
    pub total_error: f64,
    pub elapsed: Duration,
    pub variable_count: usize,
    pub equation_count: usize,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.state == SolveState::Converged
    }
}

#[derive(Debug, Clone)]
pub struct Solver {
    config: SolverConfig,
    state: SolveState,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            state: SolveState::Init,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    pub fn state(&self) -> SolveState {
        self.state
    }

    /// Back to `Init`, e.g. after the sketch was cleared.
    pub fn reset(&mut self) {
        self.state = SolveState::Init;
    }

    /// Iterate from the current positions until converged, out of iterations
    /// or out of time. On convergence, satisfaction flags and arc radii are
    /// refreshed; otherwise satisfaction stays stale.
    #[instrument(skip_all, fields(method = ?self.config.method))]
    pub fn solve(
        &mut self,
        entities: &mut EntityStore,
        constraints: &mut ConstraintStore,
    ) -> SolveReport {
        let start = Instant::now();
        let config = self.config.clone();
        self.state = SolveState::Iterating;
        constraints.invalidate();

        let vars = VariableMap::extract(entities);
        let mut x = DVector::from_vec(vars.read(entities));
        let mut lambda = config.lambda_initial;
        let mut iterations = 0;
        let mut total_error;

        let state = loop {
            total_error = total_error_of(constraints, entities);
            if total_error < config.tolerance {
                break SolveState::Converged;
            }
            if config.time_budget.is_some_and(|budget| start.elapsed() >= budget) {
                break SolveState::Cancelled;
            }
            if vars.is_empty() {
                iterations = config.max_iterations;
                break SolveState::MaxItersExceeded;
            }
            if iterations >= config.max_iterations {
                break SolveState::MaxItersExceeded;
            }

            let r = equations(constraints, entities);
            let jac = build_jacobian(entities, constraints, &vars, &r, config.fd_step);
            match config.method {
                SolveMethod::LevenbergMarquardt => {
                    lm_step(entities, constraints, &vars, &mut x, &jac, &r, &mut lambda, &config)
                }
                SolveMethod::Jacobi => jacobi_step(entities, &vars, &mut x, &jac, &r, &config),
            }
            iterations += 1;
            debug!(iterations, total_error, lambda, "solver iteration");
        };

        if state == SolveState::Converged {
            constraints.refresh_satisfaction(entities, config.tolerance);
            entities.sync_arc_radii();
        }
        self.state = state;

        let report = SolveReport {
            state,
            iterations,
            total_error,
            elapsed: start.elapsed(),
            variable_count: vars.len(),
            equation_count: equation_count(constraints),
        };
        info!(
            state = ?report.state,
            iterations = report.iterations,
            total_error = report.total_error,
            variables = report.variable_count,
            equations = report.equation_count,
            "sketch solve finished"
        );
        report
    }

    /// Free variables minus the numerical rank of the Jacobian at the current
    /// positions. Unlike the bookkeeping DOF count this sees redundant
    /// constraints: two identical DISTANCE constraints only remove one DOF.
    pub fn rank_dof(&self, entities: &mut EntityStore, constraints: &ConstraintStore) -> i64 {
        let vars = VariableMap::extract(entities);
        if vars.is_empty() {
            return 0;
        }
        let r = equations(constraints, entities);
        if r.is_empty() {
            return vars.len() as i64;
        }
        let jac = build_jacobian(entities, constraints, &vars, &r, self.config.fd_step);
        vars.len() as i64 - jacobian_rank(jac) as i64
    }
}

// ── Residual collection ─────────────────────────────────────────────────────

fn total_error_of(constraints: &ConstraintStore, entities: &EntityStore) -> f64 {
    constraints.iter().map(|c| residual(c, entities).abs()).sum()
}

fn equation_count(constraints: &ConstraintStore) -> usize {
    constraints.iter().map(|c| c.kind.equation_count()).sum()
}

/// Weighted equation components of every constraint, in store order.
fn equations(constraints: &ConstraintStore, entities: &EntityStore) -> DVector<f64> {
    let mut rows = Vec::with_capacity(equation_count(constraints));
    for c in constraints.iter() {
        push_equations(c, entities, &mut rows);
    }
    DVector::from_vec(rows)
}

/// Forward-difference Jacobian, probing each variable in the store and
/// restoring it afterwards.
fn build_jacobian(
    entities: &mut EntityStore,
    constraints: &ConstraintStore,
    vars: &VariableMap,
    base: &DVector<f64>,
    h: f64,
) -> DMatrix<f64> {
    let m = base.len();
    let mut jac = DMatrix::zeros(m, vars.len());
    for j in 0..vars.len() {
        let orig = vars.get(entities, j);
        vars.set(entities, j, orig + h);
        let r_plus = equations(constraints, entities);
        vars.set(entities, j, orig);
        for i in 0..m {
            jac[(i, j)] = (r_plus[i] - base[i]) / h;
        }
    }
    jac
}

fn jacobian_rank(jac: DMatrix<f64>) -> usize {
    let (m, n) = jac.shape();
    let svd = SVD::new(jac, false, false);
    let sv = &svd.singular_values;
    let max_sv = sv.iter().cloned().fold(0.0_f64, f64::max);
    let threshold = (max_sv * (m.max(n) as f64) * f64::EPSILON).max(1e-9);
    sv.iter().filter(|&&s| s > threshold).count()
}

// ── Update steps ────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn lm_step(
    entities: &mut EntityStore,
    constraints: &ConstraintStore,
    vars: &VariableMap,
    x: &mut DVector<f64>,
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    lambda: &mut f64,
    config: &SolverConfig,
) {
    let base_sq = r.norm_squared();
    let jt = jac.transpose();
    let jtj = &jt * jac;
    let rhs = -(&jt * r);
    let n = x.len();

    for _ in 0..config.max_lambda_attempts {
        let mut damped = jtj.clone();
        for i in 0..n {
            damped[(i, i)] += *lambda;
        }
        let dx = match damped.clone().cholesky() {
            Some(chol) => Some(chol.solve(&rhs)),
            None => damped.lu().solve(&rhs),
        };
        if let Some(dx) = dx {
            let candidate = &*x + dx;
            if try_accept(entities, constraints, vars, x, candidate, base_sq) {
                *lambda = (*lambda / config.lambda_factor).max(1e-15);
                return;
            }
        }
        *lambda *= config.lambda_factor;
    }

    // Small gradient step when no damping level helped.
    let grad_norm = rhs.norm();
    if grad_norm > 1e-20 {
        let candidate = &*x + &rhs * (0.01 / grad_norm);
        try_accept(entities, constraints, vars, x, candidate, base_sq);
    }
}

/// Write `candidate` into the store and keep it if the weighted sum of squares
/// improved; otherwise restore `x`.
fn try_accept(
    entities: &mut EntityStore,
    constraints: &ConstraintStore,
    vars: &VariableMap,
    x: &mut DVector<f64>,
    candidate: DVector<f64>,
    base_sq: f64,
) -> bool {
    vars.write(entities, candidate.as_slice());
    if equations(constraints, entities).norm_squared() < base_sq {
        *x = candidate;
        true
    } else {
        vars.write(entities, x.as_slice());
        false
    }
}

fn jacobi_step(
    entities: &mut EntityStore,
    vars: &VariableMap,
    x: &mut DVector<f64>,
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    config: &SolverConfig,
) {
    let mut delta = DVector::zeros(x.len());
    for i in 0..jac.nrows() {
        for j in 0..jac.ncols() {
            let d = jac[(i, j)];
            if d.abs() > JACOBI_PIVOT_MIN {
                delta[j] -= config.damping * r[i] / d;
            }
        }
    }
    *x += delta;
    vars.write(entities, x.as_slice());
}
