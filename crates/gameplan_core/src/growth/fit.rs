//! Least-squares fitting of growth curves to `(day_offset, factor)` anchors.
//!
//! Polynomials are solved directly (normal equations on a domain mapped to
//! `[-1, 1]`). Linear, exponential and logistic forms go through a bounded
//! Levenberg-Marquardt loop with every parameter constrained to be `>= 0`.
//! Nonlinear fits run on `x / x_scale` so day offsets in the thousands do not
//! leave the rate parameter at 1e-4 scale.

use serde::{Deserialize, Serialize};

use crate::error::FitError;

const MAX_ITERATIONS: usize = 500;
const MAX_DAMPING_TRIES: usize = 20;
const COST_TOLERANCE: f64 = 1e-14;
const STEP_TOLERANCE: f64 = 1e-12;

/// Solve `a * x = b` with Gaussian elimination and partial pivoting
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn check_points(points: &[(f64, f64)], required: usize) -> Result<(), FitError> {
    if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(FitError::NonFinite);
    }
    let distinct = distinct_x(points);
    if distinct < required {
        return Err(FitError::InsufficientPoints {
            required,
            found: distinct,
        });
    }
    Ok(())
}

fn distinct_x(points: &[(f64, f64)]) -> usize {
    let mut xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    xs.dedup();
    xs.len()
}

/// A least-squares polynomial, evaluated on a domain mapped to `[-1, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coefficients: Vec<f64>,
    domain: (f64, f64),
}

impl Polynomial {
    /// Fit a polynomial of `degree` to `points`.
    ///
    /// The degree is reduced to `distinct_points - 1` when there are too few
    /// points to determine it, so a single anchor yields a constant.
    pub fn fit(points: &[(f64, f64)], degree: usize) -> Result<Self, FitError> {
        check_points(points, 1)?;
        let degree = degree.min(distinct_x(points) - 1);

        let lo = points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
        let hi = points
            .iter()
            .map(|(x, _)| *x)
            .fold(f64::NEG_INFINITY, f64::max);
        let mut poly = Self {
            coefficients: Vec::new(),
            domain: (lo, hi),
        };

        let m = degree + 1;
        let mut ata = vec![vec![0.0; m]; m];
        let mut aty = vec![0.0; m];
        for (x, y) in points {
            let u = poly.map_domain(*x);
            let powers: Vec<f64> = (0..m).map(|k| u.powi(k as i32)).collect();
            for i in 0..m {
                aty[i] += powers[i] * y;
                for j in 0..m {
                    ata[i][j] += powers[i] * powers[j];
                }
            }
        }

        poly.coefficients = solve_linear(ata, aty).ok_or(FitError::SingularSystem)?;
        Ok(poly)
    }

    fn map_domain(&self, x: f64) -> f64 {
        let (lo, hi) = self.domain;
        if hi > lo {
            (2.0 * x - (lo + hi)) / (hi - lo)
        } else {
            0.0
        }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn eval(&self, x: f64) -> f64 {
        let u = self.map_domain(x);
        // Horner
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }
}

/// Parametric forms fitted by nonlinear least squares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveForm {
    /// `a + b*x`
    Linear,
    /// `a * (1 + b)^x`
    Exponential,
    /// `a / (1 + b*e^(-c*x))`
    Logistic,
}

impl CurveForm {
    pub fn n_params(&self) -> usize {
        match self {
            CurveForm::Linear | CurveForm::Exponential => 2,
            CurveForm::Logistic => 3,
        }
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        match self {
            CurveForm::Linear => p[0] + p[1] * x,
            CurveForm::Exponential => p[0] * (1.0 + p[1]).powf(x),
            CurveForm::Logistic => p[0] / (1.0 + p[1] * (-p[2] * x).exp()),
        }
    }

    fn gradient(&self, x: f64, p: &[f64]) -> Vec<f64> {
        match self {
            CurveForm::Linear => vec![1.0, x],
            CurveForm::Exponential => {
                let base = 1.0 + p[1];
                vec![base.powf(x), p[0] * x * base.powf(x - 1.0)]
            }
            CurveForm::Logistic => {
                let e = (-p[2] * x).exp();
                let denom = 1.0 + p[1] * e;
                vec![
                    1.0 / denom,
                    -p[0] * e / (denom * denom),
                    p[0] * p[1] * x * e / (denom * denom),
                ]
            }
        }
    }

    /// Starting parameters in scaled-x space
    fn initial_guess(&self, scaled: &[(f64, f64)], cap: Option<f64>) -> Vec<f64> {
        let (_, y_first) = scaled
            .iter()
            .copied()
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or((0.0, 1.0));
        match self {
            CurveForm::Linear => vec![y_first.max(0.0), 0.0],
            CurveForm::Exponential => vec![y_first.max(1e-6), 0.0],
            CurveForm::Logistic => {
                let max_y = scaled.iter().map(|(_, y)| *y).fold(f64::MIN, f64::max);
                let a = cap.map_or(max_y, |c| c.max(max_y));
                let b = if y_first > 0.0 {
                    (a / y_first - 1.0).max(0.1)
                } else {
                    1.0
                };
                vec![a, b, 1.0]
            }
        }
    }
}

/// The result of a nonlinear fit; evaluates in unscaled day offsets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCurve {
    form: CurveForm,
    params: Vec<f64>,
    x_scale: f64,
}

impl FittedCurve {
    /// Fit `form` to `points`.
    ///
    /// `cap` raises the logistic initial guess for the upper asymptote; it is
    /// ignored for the other forms.
    pub fn fit(form: CurveForm, points: &[(f64, f64)], cap: Option<f64>) -> Result<Self, FitError> {
        check_points(points, 2)?;

        let x_scale = points
            .iter()
            .map(|(x, _)| x.abs())
            .fold(0.0_f64, f64::max)
            .max(f64::MIN_POSITIVE);
        let scaled: Vec<(f64, f64)> = points.iter().map(|(x, y)| (x / x_scale, *y)).collect();

        let params = levenberg_marquardt(form, &scaled, form.initial_guess(&scaled, cap))?;
        tracing::debug!(?form, ?params, x_scale, "fitted growth curve");

        Ok(Self {
            form,
            params,
            x_scale,
        })
    }

    pub fn form(&self) -> CurveForm {
        self.form
    }

    /// Parameters in day-offset units
    pub fn params(&self) -> Vec<f64> {
        match self.form {
            CurveForm::Linear => vec![self.params[0], self.params[1] / self.x_scale],
            CurveForm::Exponential => vec![
                self.params[0],
                (1.0 + self.params[1]).powf(1.0 / self.x_scale) - 1.0,
            ],
            CurveForm::Logistic => vec![
                self.params[0],
                self.params[1],
                self.params[2] / self.x_scale,
            ],
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.form.eval(x / self.x_scale, &self.params)
    }
}

fn sum_squared_residuals(form: CurveForm, points: &[(f64, f64)], p: &[f64]) -> f64 {
    points
        .iter()
        .map(|(x, y)| {
            let r = y - form.eval(*x, p);
            r * r
        })
        .sum()
}

fn project(p: &mut [f64]) {
    for v in p.iter_mut() {
        *v = v.max(0.0);
    }
}

fn levenberg_marquardt(
    form: CurveForm,
    points: &[(f64, f64)],
    initial: Vec<f64>,
) -> Result<Vec<f64>, FitError> {
    let m = form.n_params();
    let mut p = initial;
    project(&mut p);
    let mut cost = sum_squared_residuals(form, points, &p);
    if !cost.is_finite() {
        return Err(FitError::NonFinite);
    }
    let mut lambda = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        if cost < COST_TOLERANCE {
            return Ok(p);
        }

        let mut jtj = vec![vec![0.0; m]; m];
        let mut jtr = vec![0.0; m];
        for (x, y) in points {
            let residual = y - form.eval(*x, &p);
            let grad = form.gradient(*x, &p);
            for i in 0..m {
                jtr[i] += grad[i] * residual;
                for j in 0..m {
                    jtj[i][j] += grad[i] * grad[j];
                }
            }
        }

        let mut improved = false;
        for _ in 0..MAX_DAMPING_TRIES {
            let mut damped = jtj.clone();
            for (i, row) in damped.iter_mut().enumerate() {
                row[i] += lambda * jtj[i][i].max(1e-12);
            }
            let Some(step) = solve_linear(damped, jtr.clone()) else {
                lambda *= 10.0;
                continue;
            };

            let mut candidate: Vec<f64> = p.iter().zip(&step).map(|(a, d)| a + d).collect();
            project(&mut candidate);
            let candidate_cost = sum_squared_residuals(form, points, &candidate);

            if candidate_cost.is_finite() && candidate_cost < cost {
                let step_norm: f64 = candidate
                    .iter()
                    .zip(&p)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
                let param_norm: f64 = p.iter().map(|v| v * v).sum::<f64>().sqrt();
                let relative_gain = (cost - candidate_cost) / cost.max(f64::MIN_POSITIVE);

                p = candidate;
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-15);
                improved = true;

                if relative_gain < COST_TOLERANCE
                    || step_norm < STEP_TOLERANCE * (param_norm + STEP_TOLERANCE)
                {
                    return Ok(p);
                }
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            // no damping level reduces the cost: local minimum within bounds
            return Ok(p);
        }
    }

    Err(FitError::DidNotConverge {
        iterations: MAX_ITERATIONS,
        residual: cost,
    })
}
