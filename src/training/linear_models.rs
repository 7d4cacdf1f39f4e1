//! Linear model implementations
//!
//! Closed-form least squares (optionally L2-penalized) and coordinate-descent
//! lasso / elastic net. All models center the data when fitting an intercept.

use super::models::{check_fit_shapes, linear_predict, r2_score, Model};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Cholesky factor of a symmetric positive-definite matrix, `None` if not PD
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `A x = b` for symmetric positive-definite `A`.
/// A near-singular `A` gets a small diagonal ridge and one retry.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let l = match cholesky(a) {
        Some(l) => l,
        None => {
            let mut a_reg = a.clone();
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
            if ridge <= 0.0 {
                return None;
            }
            for k in 0..n {
                a_reg[[k, k]] += ridge;
            }
            cholesky(&a_reg)?
        }
    };

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gauss-Jordan inversion with partial pivoting (fallback)
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // Augmented matrix [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }

        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some(aug.slice(ndarray::s![.., n..]).to_owned())
}

/// Solve `(XᵀX + αI) w = Xᵀy`
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
    let mut xtx = x.t().dot(x);
    for i in 0..xtx.nrows() {
        xtx[[i, i]] += alpha;
    }
    let xty = x.t().dot(y);

    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Ok(w);
    }
    matrix_inverse(&xtx)
        .map(|inv| inv.dot(&xty))
        .ok_or_else(|| ForecastError::ComputationError("Matrix is singular, cannot solve least squares".to_string()))
}

/// Mean-centered copy of the training data
struct Centered {
    x: Array2<f64>,
    y: Array1<f64>,
    x_mean: Array1<f64>,
    y_mean: f64,
}

impl Centered {
    fn new(x: &Array2<f64>, y: &Array1<f64>, fit_intercept: bool) -> Result<Self> {
        if !fit_intercept {
            return Ok(Self {
                x: x.clone(),
                y: y.clone(),
                x_mean: Array1::zeros(x.ncols()),
                y_mean: 0.0,
            });
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| ForecastError::InvalidInput("cannot center empty data".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        Ok(Self {
            x: x - &x_mean.view().insert_axis(Axis(0)),
            y: y - y_mean,
            x_mean,
            y_mean,
        })
    }

    fn intercept(&self, w: &Array1<f64>) -> f64 {
        self.y_mean - w.dot(&self.x_mean)
    }
}

/// Soft-threshold operator for the L1 proximal step
fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Coordinate descent on `½‖y - Xw‖² + l1‖w‖₁ + ½ l2‖w‖²`
fn coordinate_descent(x: &Array2<f64>, y: &Array1<f64>, l1: f64, l2: f64, max_iter: usize, tol: f64) -> Array1<f64> {
    let n_features = x.ncols();
    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| x.column(j).mapv(|v| v * v).sum())
        .collect();

    let mut w = Array1::zeros(n_features);
    let mut r = y.clone();

    for _ in 0..max_iter {
        let mut max_change = 0.0f64;

        for j in 0..n_features {
            let denom = col_norms[j] + l2;
            if denom < 1e-15 {
                w[j] = 0.0;
                continue;
            }
            let rho = x.column(j).dot(&r) + col_norms[j] * w[j];
            let old = w[j];
            w[j] = soft_threshold(rho, l1) / denom;

            let delta = old - w[j];
            if delta != 0.0 {
                r.scaled_add(delta, &x.column(j));
                max_change = max_change.max(delta.abs());
            }
        }

        if max_change < tol {
            break;
        }
    }
    w
}

fn fitted(coefficients: &Option<Array1<f64>>) -> Result<&Array1<f64>> {
    coefficients.as_ref().ok_or(ForecastError::ModelNotFitted)
}

// ============ Ordinary least squares ============

/// Linear regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Ok(r2_score(y, &self.predict(x)?))
    }
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let data = Centered::new(x, y, self.fit_intercept)?;
        let w = solve_normal_equations(&data.x, &data.y, 0.0)?;
        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, fitted(&self.coefficients)?, self.intercept)
    }

    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    fn intercept(&self) -> Option<f64> {
        self.coefficients.as_ref().map(|_| self.intercept)
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

// ============ Ridge ============

/// Ridge Regression (L2-regularized linear regression)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Ok(r2_score(y, &self.predict(x)?))
    }
}

impl Model for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let data = Centered::new(x, y, self.fit_intercept)?;
        let w = solve_normal_equations(&data.x, &data.y, self.alpha)?;
        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, fitted(&self.coefficients)?, self.intercept)
    }

    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    fn intercept(&self) -> Option<f64> {
        self.coefficients.as_ref().map(|_| self.intercept)
    }

    fn name(&self) -> &'static str {
        "ridge"
    }
}

// ============ Lasso ============

/// Lasso Regression (L1-regularized via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha,
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Ok(r2_score(y, &self.predict(x)?))
    }
}

impl Model for LassoRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let data = Centered::new(x, y, self.fit_intercept)?;
        let lambda = self.alpha * x.nrows() as f64;
        let w = coordinate_descent(&data.x, &data.y, lambda, 0.0, self.max_iter, self.tol);
        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, fitted(&self.coefficients)?, self.intercept)
    }

    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    fn intercept(&self) -> Option<f64> {
        self.coefficients.as_ref().map(|_| self.intercept)
    }

    fn name(&self) -> &'static str {
        "lasso"
    }
}

// ============ Elastic net ============

/// Elastic Net Regression (L1 + L2 regularization via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// Overall regularization strength
    pub alpha: f64,
    /// L1 ratio (0.0 = pure L2/Ridge, 1.0 = pure L1/Lasso)
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for ElasticNetRegression {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNetRegression {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha,
            l1_ratio: l1_ratio.clamp(0.0, 1.0),
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Ok(r2_score(y, &self.predict(x)?))
    }
}

impl Model for ElasticNetRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let data = Centered::new(x, y, self.fit_intercept)?;
        let n = x.nrows() as f64;
        let l1 = self.alpha * self.l1_ratio * n;
        let l2 = self.alpha * (1.0 - self.l1_ratio) * n;
        let w = coordinate_descent(&data.x, &data.y, l1, l2, self.max_iter, self.tol);
        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, fitted(&self.coefficients)?, self.intercept)
    }

    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    fn intercept(&self) -> Option<f64> {
        self.coefficients.as_ref().map(|_| self.intercept)
    }

    fn name(&self) -> &'static str {
        "elastic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_simple() {
        let x = array![
            [1.0, 1.0],
            [2.0, 1.0],
            [1.0, 2.0],
            [2.0, 2.0],
            [3.0, 1.0],
        ];
        // y = 2*x1 + 3*x2 + 1
        let y = array![6.0, 8.0, 9.0, 11.0, 10.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let w = model.coefficients().unwrap();
        assert!((w[0] - 2.0).abs() < 1e-6);
        assert!((w[1] - 3.0).abs() < 1e-6);
        assert!((model.intercept - 1.0).abs() < 1e-6);

        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.99, "R² should be close to 1, got {}", r2);
    }

    #[test]
    fn test_unfitted_and_wrong_width() {
        let model = LinearRegression::new();
        assert!(matches!(model.predict(&array![[1.0]]), Err(ForecastError::ModelNotFitted)));

        let mut model = RidgeRegression::new(0.1);
        model.fit(&array![[1.0, 2.0], [2.0, 1.0], [3.0, 3.0]], &array![1.0, 2.0, 3.0]).unwrap();
        assert!(model.predict(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_fit_shape_mismatch() {
        let mut model = LinearRegression::new();
        let result = model.fit(&array![[1.0], [2.0]], &array![1.0]);
        assert!(matches!(result, Err(ForecastError::ShapeError { .. })));
    }

    #[test]
    fn test_ridge_regression() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = RidgeRegression::new(0.1);
        model.fit(&x, &y).unwrap();
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.95, "Ridge R² = {}", r2);
    }

    #[test]
    fn test_lasso_regression() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = LassoRegression::new(0.01);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.coefficients().unwrap()[1], 0.0);
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.9, "Lasso R² = {}", r2);
    }

    #[test]
    fn test_elastic_net() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let mut model = ElasticNetRegression::new(0.01, 0.5);
        model.fit(&x, &y).unwrap();
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.9, "ElasticNet R² = {}", r2);
    }

    #[test]
    fn test_matrix_inverse() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = matrix_inverse(&m).unwrap();
        let identity = m.dot(&inv);
        assert!((identity[[0, 0]] - 1.0).abs() < 1e-10);
        assert!(identity[[0, 1]].abs() < 1e-10);
        assert!(matrix_inverse(&array![[1.0, 2.0], [2.0, 4.0]]).is_none());
    }
}
