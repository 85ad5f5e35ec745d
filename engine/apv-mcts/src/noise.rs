//! Dirichlet exploration noise.

use rand::Rng;
use rand_distr::{Distribution, Gamma};

/// Generate Dirichlet-distributed noise using Gamma variates.
///
/// Falls back to a flat distribution if `alpha` is not a valid shape.
pub fn dirichlet_noise<R: Rng + ?Sized>(n: usize, alpha: f32, rng: &mut R) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    let Ok(gamma) = Gamma::new(alpha as f64, 1.0) else {
        return vec![1.0 / n as f32; n];
    };
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    // Normalize
    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    } else {
        // Tiny alpha can underflow every draw to zero
        samples[rng.gen_range(0..n)] = 1.0;
    }

    samples
}

/// Replace `priors` with `(1 - epsilon) * priors + epsilon * Dir(alpha)`.
pub fn mix_dirichlet_noise<R: Rng + ?Sized>(
    priors: &mut [f32],
    alpha: f32,
    epsilon: f32,
    rng: &mut R,
) {
    if epsilon <= 0.0 {
        return;
    }
    let noise = dirichlet_noise(priors.len(), alpha, rng);
    for (p, n) in priors.iter_mut().zip(noise) {
        *p = (1.0 - epsilon) * *p + epsilon * n;
    }
}
