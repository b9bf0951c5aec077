//! Nonlinear least squares on top of the `levenberg_marquardt` crate.

use crate::params::SolverParams;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

/// A nonlinear least-squares problem `min ½‖r(x)‖²`.
pub trait NllsProblem {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Defaults to central finite differences over every parameter.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        numeric_jacobian(|p| self.residuals(p), x)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// Residual evaluations spent by the solver.
    pub iterations: usize,
    /// `½‖r‖²` at the returned parameters.
    pub final_cost: f64,
    pub converged: bool,
}

#[inline]
pub(crate) fn fd_step(x: f64) -> f64 {
    1e-6 * (1.0 + x.abs())
}

/// Central-difference Jacobian of `f` at `x`.
pub fn numeric_jacobian(f: impl Fn(&DVector<f64>) -> DVector<f64>, x: &DVector<f64>) -> DMatrix<f64> {
    let r0 = f(x);
    let mut jac = DMatrix::<f64>::zeros(r0.len(), x.len());
    let mut xp = x.clone();
    for i in 0..x.len() {
        let h = fd_step(x[i]);
        xp[i] = x[i] + h;
        let rp = f(&xp);
        xp[i] = x[i] - h;
        let rm = f(&xp);
        xp[i] = x[i];
        jac.set_column(i, &((rp - rm) / (2.0 * h)));
    }
    jac
}

struct LmWrapper<'a, P: NllsProblem + ?Sized> {
    problem: &'a P,
    params: DVector<f64>,
}

impl<P: NllsProblem + ?Sized> LeastSquaresProblem<f64, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let r = self.problem.residuals(&self.params);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let j = self.problem.jacobian(&self.params);
        j.iter().all(|v| v.is_finite()).then_some(j)
    }
}

/// Minimize `problem` from `x0`.
///
/// `max_iterations` caps the solver's patience; MINPACK scales it by the
/// parameter count to bound residual evaluations.
pub fn solve<P: NllsProblem + ?Sized>(
    problem: &P,
    x0: DVector<f64>,
    params: &SolverParams,
) -> (DVector<f64>, SolveReport) {
    let lm = LevenbergMarquardt::new()
        .with_ftol(params.cost_tolerance)
        .with_xtol(params.step_tolerance)
        .with_gtol(params.gradient_tolerance)
        .with_stepbound(params.step_bound)
        .with_patience(params.max_iterations.max(1));

    let (wrapper, report) = lm.minimize(LmWrapper { problem, params: x0 });
    log::debug!(
        "levenberg-marquardt: {:?} after {} evaluations, cost {:.3e}",
        report.termination,
        report.number_of_evaluations,
        report.objective_function
    );

    (
        wrapper.params,
        SolveReport {
            iterations: report.number_of_evaluations,
            final_cost: report.objective_function,
            converged: report.termination.was_successful(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneDimProblem;

    impl NllsProblem for OneDimProblem {
        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            DVector::from_element(1, x[0] - 3.0)
        }

        fn jacobian(&self, _x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_element(1, 1, 1.0)
        }
    }

    /// Rosenbrock as residuals: r = (10 (y - x²), 1 - x).
    struct Rosenbrock;

    impl NllsProblem for Rosenbrock {
        fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
            DVector::from_vec(vec![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]])
        }
    }

    /// Residual that turns NaN away from the start point.
    struct Poisoned;

    impl NllsProblem for Poisoned {
        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            let v = if x[0] == 1.0 { 5.0 } else { f64::NAN };
            DVector::from_element(1, v)
        }

        fn jacobian(&self, _x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_element(1, 1, 1.0)
        }
    }

    #[test]
    fn solves_trivial_problem() {
        let (x, report) = solve(&OneDimProblem, DVector::from_element(1, 10.0), &SolverParams::default());
        assert!((x[0] - 3.0).abs() < 1e-6, "got {}", x[0]);
        assert!(report.final_cost < 1e-12);
        assert!(report.converged, "{report:?}");
        assert!(report.iterations > 0);
    }

    #[test]
    fn solves_rosenbrock_with_numeric_jacobian() {
        let (x, report) = solve(
            &Rosenbrock,
            DVector::from_vec(vec![-1.2, 1.0]),
            &SolverParams::default(),
        );
        assert!((x[0] - 1.0).abs() < 1e-6 && (x[1] - 1.0).abs() < 1e-6, "{x}");
        assert!(report.final_cost < 1e-12);
        assert!(report.converged, "{report:?}");
    }

    #[test]
    fn non_finite_residuals_are_not_reported_as_converged() {
        let (_, report) = solve(&Poisoned, DVector::from_element(1, 1.0), &SolverParams::default());
        assert!(!report.converged, "{report:?}");
    }

    #[test]
    fn numeric_jacobian_matches_analytic() {
        let x = DVector::from_vec(vec![0.5, -0.25]);
        let j = numeric_jacobian(|p| Rosenbrock.residuals(p), &x);
        assert!((j[(0, 0)] - (-20.0 * 0.5)).abs() < 1e-6);
        assert!((j[(0, 1)] - 10.0).abs() < 1e-6);
        assert!((j[(1, 0)] + 1.0).abs() < 1e-6);
        assert!(j[(1, 1)].abs() < 1e-6);
    }
}
