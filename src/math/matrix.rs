use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

/// Dense row-major matrix of `f64`.
///
/// Element `(i, j)` lives at `data[i * cols + j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wraps an existing buffer. Panics if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
        assert_eq!(data.len(), rows * cols, "Matrix buffer does not match {}x{}", rows, cols);
        Matrix { rows, cols, data }
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both uniforms in (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f64, rng: &mut R) -> Matrix {
        let data = (0..rows * cols)
            .map(|_| Matrix::sample_standard_normal(rng) * std_dev)
            .collect();
        Matrix { rows, cols, data }
    }

    /// He initialization: samples from N(0, sqrt(2 / rows)).
    ///
    /// Weights are stored as (fan_in, fan_out), so `rows` is the fan-in.
    /// Use before ReLU layers.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (2.0 / rows as f64).sqrt(), rng)
    }

    /// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / rows)).
    ///
    /// Use before Sigmoid/Tanh/Identity/Softmax layers.
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (1.0 / rows as f64).sqrt(), rng)
    }

    /// Row vector times matrix: returns `input · self` as a plain `Vec`.
    ///
    /// `input.len()` must equal `self.rows`.
    pub fn left_multiply(&self, input: &[f64]) -> Vec<f64> {
        assert_eq!(input.len(), self.rows, "Matrices are of incorrect sizes");
        let mut out = vec![0.0; self.cols];
        for (i, &x) in input.iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            for (o, &w) in out.iter_mut().zip(self.row(i)) {
                *o += x * w;
            }
        }
        out
    }

    /// `self · v` for a column vector `v` of length `self.cols`.
    pub fn right_multiply(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.cols, "Matrices are of incorrect sizes");
        (0..self.rows)
            .map(|i| self.row(i).iter().zip(v).map(|(w, x)| w * x).sum())
            .collect()
    }

    /// Accumulates the outer product `a ⊗ b` into `self`.
    pub fn add_outer(&mut self, a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), self.rows);
        assert_eq!(b.len(), self.cols);
        for (i, &ai) in a.iter().enumerate() {
            if ai == 0.0 {
                continue;
            }
            let row = &mut self.data[i * self.cols..(i + 1) * self.cols];
            for (cell, &bj) in row.iter_mut().zip(b) {
                *cell += ai * bj;
            }
        }
    }

    pub fn scale_in_place(&mut self, factor: f64) {
        self.data.iter_mut().for_each(|x| *x *= factor);
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn vector_products_match_hand_computation() {
        let w = Matrix::from_vec(2, 3, vec![1.0, -1.0, 0.5, 2.0, 0.0, -2.0]);
        assert_eq!(w.left_multiply(&[3.0, 4.0]), vec![11.0, -3.0, -6.5]);

        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(w.right_multiply(&v), vec![1.0 - 2.0 + 1.5, 2.0 - 6.0]);
    }

    #[test]
    fn add_outer_accumulates() {
        let mut m = Matrix::zeros(2, 2);
        m.add_outer(&[1.0, 2.0], &[3.0, 4.0]);
        m.add_outer(&[1.0, 0.0], &[1.0, 1.0]);
        assert_eq!(m.data, vec![4.0, 5.0, 6.0, 8.0]);
    }

    #[test]
    fn he_init_is_reproducible_with_seed() {
        let a = Matrix::he(16, 4, &mut StdRng::seed_from_u64(7));
        let b = Matrix::he(16, 4, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.is_finite());
    }
}
