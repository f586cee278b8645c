//! 2D sample sets on the unit square for Monte-Carlo integration.
//!
//! The grid generators round the requested count up to the next perfect
//! square; callers must use the length of the returned set, not the count
//! they asked for.

use crate::gen_f64;
use lux_math::DVec2;
use rand::RngCore;

/// Side length of the smallest square grid holding at least `n` cells.
fn grid_side(n: usize) -> usize {
    let mut side = (n as f64).sqrt() as usize;
    while side * side < n {
        side += 1;
    }
    side
}

/// One jittered sample in each cell of a square grid.
pub fn stratified_jittered(n: usize, rng: &mut dyn RngCore) -> Vec<DVec2> {
    let side = grid_side(n);
    let cell = 1.0 / side as f64;
    let mut samples = Vec::with_capacity(side * side);
    for i in 0..side {
        for j in 0..side {
            let x = (i as f64 + gen_f64(rng)) * cell;
            let y = (j as f64 + gen_f64(rng)) * cell;
            samples.push(DVec2::new(x, y));
        }
    }
    samples
}

/// The centres of the cells of a square grid.
pub fn uniform_grid(n: usize) -> Vec<DVec2> {
    let side = grid_side(n);
    let cell = 1.0 / side as f64;
    let mut samples = Vec::with_capacity(side * side);
    for i in 0..side {
        for j in 0..side {
            samples.push(DVec2::new((i as f64 + 0.5) * cell, (j as f64 + 0.5) * cell));
        }
    }
    samples
}

/// `n` independent uniform samples.
pub fn random(n: usize, rng: &mut dyn RngCore) -> Vec<DVec2> {
    (0..n).map(|_| DVec2::new(gen_f64(rng), gen_f64(rng))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_grid_side_rounds_up() {
        assert_eq!(grid_side(0), 0);
        assert_eq!(grid_side(1), 1);
        assert_eq!(grid_side(16), 4);
        assert_eq!(grid_side(17), 5);
        assert_eq!(grid_side(24), 5);
    }

    #[test]
    fn test_stratified_one_sample_per_cell() {
        let mut rng = StdRng::seed_from_u64(1);
        let samples = stratified_jittered(10, &mut rng);
        assert_eq!(samples.len(), 16);

        let mut seen = [false; 16];
        for s in &samples {
            assert!(s.x >= 0.0 && s.x < 1.0 && s.y >= 0.0 && s.y < 1.0);
            let cell = (s.x * 4.0) as usize * 4 + (s.y * 4.0) as usize;
            assert!(!seen[cell]);
            seen[cell] = true;
        }
    }

    #[test]
    fn test_uniform_grid_centres() {
        let samples = uniform_grid(4);
        assert_eq!(samples, vec![
            DVec2::new(0.25, 0.25),
            DVec2::new(0.25, 0.75),
            DVec2::new(0.75, 0.25),
            DVec2::new(0.75, 0.75),
        ]);
    }

    #[test]
    fn test_random_count_is_exact() {
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(random(7, &mut rng).len(), 7);
        assert!(random(0, &mut rng).is_empty());
    }
}
