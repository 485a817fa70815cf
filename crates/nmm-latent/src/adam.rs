use nmm_core::{Error, Result};

/// Adam (Kingma & Ba) with bias-corrected moment estimates.
///
/// State is kept per parameter slot; slot layout is fixed by the first call
/// to [`step`](Self::step) and must not change afterwards.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: i32,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    /// Create with learning rate `lr` and the usual defaults
    /// (`beta1 = 0.9`, `beta2 = 0.999`, `eps = 1e-8`).
    pub fn new(lr: f64) -> Result<Self> {
        if !lr.is_finite() || lr <= 0.0 {
            return Err(Error::Validation(format!("learning rate must be finite and > 0, got {}", lr)));
        }
        Ok(Self { lr, beta1: 0.9, beta2: 0.999, eps: 1e-8, t: 0, m: Vec::new(), v: Vec::new() })
    }

    /// Learning rate.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Number of steps taken.
    pub fn steps(&self) -> i32 {
        self.t
    }

    /// Descend along `grads`, updating `params` in place.
    pub fn step(&mut self, params: Vec<&mut [f64]>, grads: &[&[f64]]) -> Result<()> {
        if params.len() != grads.len() {
            return Err(Error::Validation(format!(
                "parameter/gradient slot mismatch: {} vs {}",
                params.len(),
                grads.len()
            )));
        }
        if self.m.is_empty() {
            self.m = grads.iter().map(|g| vec![0.0; g.len()]).collect();
            self.v = grads.iter().map(|g| vec![0.0; g.len()]).collect();
        } else if self.m.len() != grads.len() {
            return Err(Error::Validation(format!(
                "optimizer has {} slots, got {}",
                self.m.len(),
                grads.len()
            )));
        }

        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t);
        let bc2 = 1.0 - self.beta2.powi(self.t);
        let step_size = self.lr * bc2.sqrt() / bc1;

        for (slot, (p, g)) in params.into_iter().zip(grads).enumerate() {
            if p.len() != g.len() || self.m[slot].len() != g.len() {
                return Err(Error::Validation(format!("slot {} length mismatch", slot)));
            }
            let m = &mut self.m[slot];
            let v = &mut self.v[slot];
            for k in 0..g.len() {
                m[k] = self.beta1 * m[k] + (1.0 - self.beta1) * g[k];
                v[k] = self.beta2 * v[k] + (1.0 - self.beta2) * g[k] * g[k];
                p[k] -= step_size * m[k] / (v[k].sqrt() + self.eps);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimises_quadratic() {
        // f(x, y) = (x - 3)^2 + 10 (y + 1)^2
        let mut opt = Adam::new(0.05).unwrap();
        let mut w = vec![0.0, 0.0];
        for _ in 0..3000 {
            let g = vec![2.0 * (w[0] - 3.0), 20.0 * (w[1] + 1.0)];
            opt.step(vec![w.as_mut_slice()], &[g.as_slice()]).unwrap();
        }
        assert_relative_eq!(w[0], 3.0, epsilon = 5e-2);
        assert_relative_eq!(w[1], -1.0, epsilon = 5e-2);
        assert_eq!(opt.steps(), 3000);
    }

    #[test]
    fn test_first_step_moves_by_lr() {
        let mut opt = Adam::new(0.01).unwrap();
        let mut w = vec![1.0];
        opt.step(vec![w.as_mut_slice()], &[&[5.0]]).unwrap();
        assert_relative_eq!(w[0], 1.0 - 0.01, epsilon = 1e-8);
    }

    #[test]
    fn test_slot_mismatch() {
        let mut opt = Adam::new(0.01).unwrap();
        let mut w = vec![1.0, 2.0];
        assert!(opt.step(vec![w.as_mut_slice()], &[&[1.0]]).is_err());
        assert!(Adam::new(0.0).is_err());
    }
}
