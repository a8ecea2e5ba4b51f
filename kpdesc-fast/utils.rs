/// Bit tricks for the FAST segment test

/// Check if the 16-bit circular mask holds at least `min_count` consecutive set bits,
/// using a branch-free rotate-and-and approach.
pub fn has_contiguous_arc(mask: u16, min_count: usize) -> bool {
    if min_count > 16 || min_count == 0 {
        return false;
    }
    if mask == u16::MAX {
        return true;
    }

    // For a run of length n: mask & rot(mask, 1) & ... & rot(mask, n - 1) != 0
    let mut test_mask = mask;
    for i in 1..min_count as u32 {
        test_mask &= mask.rotate_left(i);
        if test_mask == 0 {
            return false;
        }
    }

    test_mask != 0
}

/// Builds the circle mask where bit `i` is set when `pred(values[i])` holds.
pub fn circle_mask<F>(values: &[i16; 16], pred: F) -> u16
where
    F: Fn(i16) -> bool,
{
    values
        .iter()
        .enumerate()
        .fold(0u16, |mask, (i, &v)| if pred(v) { mask | (1 << i) } else { mask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Straightforward scan over the doubled circle.
    fn longest_run(mask: u16) -> usize {
        let mut best = 0;
        let mut current = 0;
        for i in 0..32 {
            if mask & (1 << (i % 16)) != 0 {
                current += 1;
                best = best.max(current);
            } else {
                current = 0;
            }
        }
        best.min(16)
    }

    #[test]
    fn test_contiguous_simple() {
        let mask: u16 = 0b0000_0001_1111_1111;
        assert!(has_contiguous_arc(mask, 9));
        assert!(!has_contiguous_arc(mask, 10));
    }

    #[test]
    fn test_contiguous_wrap_around() {
        // bits 12..16 and 0..5
        let mask: u16 = 0b1111_0000_0001_1111;
        assert!(has_contiguous_arc(mask, 9));
        assert!(!has_contiguous_arc(mask, 10));
    }

    #[test]
    fn test_alternating_bits() {
        assert!(!has_contiguous_arc(0b0101_0101_0101_0101, 2));
        assert!(has_contiguous_arc(0b0101_0101_0101_0101, 1));
    }

    #[test]
    fn test_circle_mask() {
        let mut values = [0i16; 16];
        values[3] = 20;
        values[15] = 30;
        assert_eq!(circle_mask(&values, |v| v > 10), (1 << 3) | (1 << 15));
    }

    proptest! {
        #[test]
        fn prop_matches_linear_scan(mask in any::<u16>(), n in 1usize..=16) {
            prop_assert_eq!(has_contiguous_arc(mask, n), longest_run(mask) >= n);
        }
    }
}
