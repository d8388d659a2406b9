//! Weighted sampling: discrete draws from probability-weighted tables

use rand::Rng;

/// An entry of a probability-weighted table
pub trait Weighted {
    /// Probability of this entry being drawn
    fn probability(&self) -> f64;
}

impl<T> Weighted for (f64, T) {
    fn probability(&self) -> f64 {
        self.0
    }
}

/// Resolve a uniform draw in `[0, 1)` against a list of probabilities.
///
/// Returns the index of the first entry whose running cumulative probability
/// exceeds `draw`. When floating-point residue leaves the draw unresolved past
/// the last entry, the last index is returned. `None` only for an empty list.
pub fn pick_index<I>(probabilities: I, draw: f64) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut cumulative = 0.0;
    let mut last = None;

    for (index, probability) in probabilities.into_iter().enumerate() {
        cumulative += probability;
        if draw < cumulative {
            return Some(index);
        }
        last = Some(index);
    }

    last
}

/// Pick an entry for a given uniform draw
pub fn pick<T: Weighted>(entries: &[T], draw: f64) -> Option<&T> {
    pick_index(entries.iter().map(Weighted::probability), draw).map(|index| &entries[index])
}

/// Draw one entry, consuming exactly one uniform value from `rng`
pub fn sample<'a, T, R>(entries: &'a [T], rng: &mut R) -> Option<&'a T>
where
    T: Weighted,
    R: Rng + ?Sized,
{
    let draw: f64 = rng.random();
    pick(entries, draw)
}

/// Bernoulli trial backed by a single uniform draw
#[inline]
pub fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.random::<f64>() < probability
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_pick_first_bucket() {
        let table = [(0.25, 'a'), (0.25, 'b'), (0.5, 'c')];
        assert_eq!(pick(&table, 0.0).map(|e| e.1), Some('a'));
        assert_eq!(pick(&table, 0.2499).map(|e| e.1), Some('a'));
    }

    #[test]
    fn test_pick_boundaries_are_exclusive() {
        let table = [(0.25, 'a'), (0.25, 'b'), (0.5, 'c')];
        assert_eq!(pick(&table, 0.25).map(|e| e.1), Some('b'));
        assert_eq!(pick(&table, 0.5).map(|e| e.1), Some('c'));
    }

    #[test]
    fn test_residue_falls_back_to_last() {
        // Sums to slightly less than 1.0
        let table = [(0.1, 1u32), (0.2, 2), (0.699_999_9, 3)];
        assert_eq!(pick(&table, 0.999_999_99).map(|e| e.1), Some(3));
        assert_eq!(pick_index([0.3, 0.3], 0.95), Some(1));
    }

    #[test]
    fn test_empty_table() {
        let table: [(f64, u32); 0] = [];
        assert!(pick(&table, 0.5).is_none());
        assert!(pick_index(std::iter::empty(), 0.5).is_none());
    }

    #[test]
    fn test_sample_consumes_one_draw() {
        let table = [(0.5, 1u32), (0.5, 2)];
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);

        sample(&table, &mut a);
        let _: f64 = b.random();

        assert_eq!(a.random::<u64>(), b.random::<u64>());
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(chance(&mut rng, 1.0));
            assert!(!chance(&mut rng, 0.0));
        }
    }

    #[test]
    fn test_sampling_frequencies_converge() {
        let table = [(0.03, 0usize), (0.56, 1), (0.41, 2)];
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let mut counts = [0u32; 3];
        let n = 200_000;

        for _ in 0..n {
            if let Some(entry) = sample(&table, &mut rng) {
                counts[entry.1] += 1;
            }
        }

        for (i, (p, _)) in table.iter().enumerate() {
            let observed = counts[i] as f64 / n as f64;
            let sigma = (p * (1.0 - p) / n as f64).sqrt();
            assert!(
                (observed - p).abs() < 5.0 * sigma,
                "bucket {} observed {:.5} expected {:.5}",
                i,
                observed,
                p
            );
        }
    }
}
