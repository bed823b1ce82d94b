//! Hybrid introsort used by the per-tick classification rebuild.
//!
//! The comparison key is the unit's `type_id` with the classification bits
//! already encoded into its high bits (see `index.rs`), so no auxiliary key
//! array is needed. The input is usually near-sorted from the previous tick,
//! which the up-front sortedness check turns into an O(n) pass. Otherwise:
//! partitions of at most [`SMALL_CUTOFF`] elements get one gap-6 shell pass
//! followed by insertion sort; larger partitions run a median-of-three
//! (median-of-nine above [`MEDIAN9_CUTOFF`]) quicksort with three-way
//! partitioning, degrading to heapsort once the recursion budget of
//! `2 * log2(n)` is spent.

use crate::unit::Unit;

const SMALL_CUTOFF: usize = 12;
const MEDIAN9_CUTOFF: usize = 64;

#[inline]
fn key(u: &Unit) -> u32 {
    u.type_id.0
}

fn is_sorted(units: &[Unit]) -> bool {
    units.windows(2).all(|w| key(&w[0]) <= key(&w[1]))
}

/// Sort the unit array ascending by encoded type id.
pub(crate) fn sort_units(units: &mut [Unit]) {
    let n = units.len();
    if n < 2 || is_sorted(units) {
        return;
    }
    let budget = 2 * (usize::BITS - n.leading_zeros()) as usize;
    introsort(units, budget);
    debug_assert!(is_sorted(units), "classification sort produced unordered output");
}

fn introsort(units: &mut [Unit], mut budget: usize) {
    let mut units = units;
    loop {
        let n = units.len();
        if n <= SMALL_CUTOFF {
            small_sort(units);
            return;
        }
        if budget == 0 {
            heapsort(units);
            return;
        }
        budget -= 1;

        let pivot = select_pivot(units);
        let (lt, gt) = partition3(units, pivot);

        // Recurse into the smaller side, iterate on the larger one so the
        // stack stays logarithmic.
        let (left, rest) = { units }.split_at_mut(lt);
        let right = &mut rest[gt - lt..];
        if left.len() < right.len() {
            introsort(left, budget);
            units = right;
        } else {
            introsort(right, budget);
            units = left;
        }
    }
}

/// One shell pass with gap 6, then plain insertion sort.
fn small_sort(units: &mut [Unit]) {
    let n = units.len();
    let mut i = 6;
    while i < n {
        if key(&units[i]) < key(&units[i - 6]) {
            units.swap(i, i - 6);
        }
        i += 1;
    }
    for i in 1..n {
        let mut j = i;
        while j > 0 && key(&units[j]) < key(&units[j - 1]) {
            units.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn median3(a: u32, b: u32, c: u32) -> u32 {
    a.min(b).max(a.max(b).min(c))
}

fn select_pivot(units: &[Unit]) -> u32 {
    let n = units.len();
    if n > MEDIAN9_CUTOFF {
        let s = n / 8;
        let m = n / 2;
        let lo = median3(key(&units[0]), key(&units[s]), key(&units[2 * s]));
        let mid = median3(key(&units[m - s]), key(&units[m]), key(&units[m + s]));
        let hi = median3(
            key(&units[n - 1 - 2 * s]),
            key(&units[n - 1 - s]),
            key(&units[n - 1]),
        );
        median3(lo, mid, hi)
    } else {
        median3(key(&units[0]), key(&units[n / 2]), key(&units[n - 1]))
    }
}

/// Duplicate-aware three-way partition. Returns `(lt, gt)` such that
/// `units[..lt] < pivot`, `units[lt..gt] == pivot`, `units[gt..] > pivot`.
fn partition3(units: &mut [Unit], pivot: u32) -> (usize, usize) {
    let mut lt = 0;
    let mut i = 0;
    let mut gt = units.len();
    while i < gt {
        let k = key(&units[i]);
        if k < pivot {
            units.swap(lt, i);
            lt += 1;
            i += 1;
        } else if k > pivot {
            gt -= 1;
            units.swap(i, gt);
        } else {
            i += 1;
        }
    }
    (lt, gt)
}

fn heapsort(units: &mut [Unit]) {
    let n = units.len();
    for root in (0..n / 2).rev() {
        sift_down(units, root, n);
    }
    for end in (1..n).rev() {
        units.swap(0, end);
        sift_down(units, 0, end);
    }
}

fn sift_down(units: &mut [Unit], mut root: usize, end: usize) {
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            return;
        }
        if child + 1 < end && key(&units[child]) < key(&units[child + 1]) {
            child += 1;
        }
        if key(&units[root]) >= key(&units[child]) {
            return;
        }
        units.swap(root, child);
        root = child;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{test_unit, Alliance, UnitFlags};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn units_with_keys(keys: &[u32]) -> Vec<Unit> {
        keys.iter()
            .enumerate()
            .map(|(i, &k)| test_unit(i as u64, k, Alliance::Own, UnitFlags::empty()))
            .collect()
    }

    fn keys_of(units: &[Unit]) -> Vec<u32> {
        units.iter().map(key).collect()
    }

    #[test]
    fn sorts_random_inputs_of_all_sizes() {
        let mut rng = ChaCha8Rng::seed_from_u64(0xC1A5);
        for n in 0..200 {
            let keys: Vec<u32> = (0..n).map(|_| rng.gen_range(0..50)).collect();
            let mut units = units_with_keys(&keys);
            sort_units(&mut units);

            let mut expected = keys.clone();
            expected.sort_unstable();
            assert_eq!(keys_of(&units), expected, "failed at n={n}");
        }
    }

    #[test]
    fn sorted_and_reversed_inputs() {
        let ascending: Vec<u32> = (0..500).collect();
        let mut units = units_with_keys(&ascending);
        sort_units(&mut units);
        assert_eq!(keys_of(&units), ascending);

        let descending: Vec<u32> = (0..500).rev().collect();
        let mut units = units_with_keys(&descending);
        sort_units(&mut units);
        assert_eq!(keys_of(&units), ascending);
    }

    #[test]
    fn heavy_duplicates() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let keys: Vec<u32> = (0..1000).map(|_| rng.gen_range(0..4)).collect();
        let mut units = units_with_keys(&keys);
        sort_units(&mut units);
        let mut expected = keys;
        expected.sort_unstable();
        assert_eq!(keys_of(&units), expected);
    }

    #[test]
    fn heapsort_alone_sorts() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let keys: Vec<u32> = (0..300).map(|_| rng.gen()).collect();
        let mut units = units_with_keys(&keys);
        heapsort(&mut units);
        let mut expected = keys;
        expected.sort_unstable();
        assert_eq!(keys_of(&units), expected);
    }

    #[test]
    fn membership_preserved() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let keys: Vec<u32> = (0..256).map(|_| rng.gen_range(0..40)).collect();
        let mut units = units_with_keys(&keys);
        sort_units(&mut units);

        let mut tags: Vec<u64> = units.iter().map(|u| u.tag.0).collect();
        tags.sort_unstable();
        let expected: Vec<u64> = (0..256).collect();
        assert_eq!(tags, expected);
    }
}
