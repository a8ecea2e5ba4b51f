//! Sampling pattern of the rotated BRIEF test.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Fixed seed so that every process produces the same pattern.
pub const PATTERN_SEED: u64 = 0x3498_5739;

/// Number of binary tests, 8 per descriptor byte.
pub const PATTERN_PAIRS: usize = 256;

/// Two test points as `[x0, y0, x1, y1]` offsets from the keypoint.
pub type PointPair = [i8; 4];

/// Generates `n_pairs` point pairs inside the disc of diameter `patch_size`.
///
/// Points are drawn uniformly and rejected outside the disc, so rotating the
/// pattern never moves a sample further than `patch_size / 2` from the center.
/// The two points of a pair are always distinct.
pub fn generate_pattern(patch_size: u32, n_pairs: usize) -> Vec<PointPair> {
    let half = (patch_size / 2).min(i8::MAX as u32) as i32;
    let mut rng = Pcg32::seed_from_u64(PATTERN_SEED);

    let point = |rng: &mut Pcg32| loop {
        let x = rng.gen_range(-half..=half);
        let y = rng.gen_range(-half..=half);
        if x * x + y * y <= half * half {
            return (x as i8, y as i8);
        }
    };

    (0..n_pairs)
        .map(|_| loop {
            let (x0, y0) = point(&mut rng);
            let (x1, y1) = point(&mut rng);
            if (x0, y0) != (x1, y1) || half == 0 {
                return [x0, y0, x1, y1];
            }
        })
        .collect()
}
