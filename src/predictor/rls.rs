//! Recursive least squares with exponential forgetting over a dynamic number
//! of regressors.

#[derive(Debug, Clone)]
pub(crate) struct Rls {
    pub beta: Vec<f64>,
    p: Vec<Vec<f64>>,
    forgetting: f64,
    ridge: f64,
}

impl Rls {
    pub fn new(dim: usize, forgetting: f64, ridge: f64) -> Self {
        let mut rls = Self {
            beta: vec![0.0; dim],
            p: vec![vec![0.0; dim]; dim],
            forgetting: forgetting.clamp(0.90, 1.0),
            ridge,
        };
        rls.reset_covariance();
        rls
    }

    fn reset_covariance(&mut self) {
        let v = 1.0 / self.ridge.max(1e-9);
        for (i, row) in self.p.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = if i == j { v } else { 0.0 };
            }
        }
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        dot(&self.beta, x)
    }

    pub fn update(&mut self, x: &[f64], y: f64) {
        let dim = self.beta.len();
        debug_assert_eq!(x.len(), dim);
        let lambda = self.forgetting;
        if self.p[0][0].abs() <= f64::EPSILON {
            self.reset_covariance();
        }
        let px: Vec<f64> = (0..dim)
            .map(|i| (0..dim).map(|j| self.p[i][j] * x[j]).sum())
            .collect();
        let denom = lambda + dot(x, &px);
        if !denom.is_finite() || denom.abs() <= 1e-12 {
            return;
        }
        let k: Vec<f64> = px.iter().map(|v| v / denom).collect();
        let err = y - self.predict(x);
        for (b, ki) in self.beta.iter_mut().zip(&k) {
            *b += ki * err;
        }

        let x_t_p: Vec<f64> = (0..dim)
            .map(|j| (0..dim).map(|i| x[i] * self.p[i][j]).sum())
            .collect();
        for i in 0..dim {
            for (j, xtpj) in x_t_p.iter().enumerate() {
                self.p[i][j] = (self.p[i][j] - k[i] * xtpj) / lambda;
            }
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_linear_relationship() {
        let mut rls = Rls::new(2, 1.0, 1e-3);
        for i in 0..200 {
            let x = (i as f64 * 0.37).sin();
            rls.update(&[1.0, x], 0.5 + 2.0 * x);
        }
        assert!((rls.beta[0] - 0.5).abs() < 1e-3);
        assert!((rls.beta[1] - 2.0).abs() < 1e-3);
    }
}
