//! Longest Increasing Subsequence
//!
//! Patience sorting with binary search, O(n log n). The keyed list
//! reconciler uses it to find the reused nodes that are already in relative
//! order and therefore never need to move.

/// Positions of one longest strictly increasing subsequence of `seq`.
///
/// The returned positions index into `seq` and are in ascending order.
/// When several subsequences share the maximum length, the one ending in
/// the smallest values is chosen.
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    if seq.is_empty() {
        return Vec::new();
    }

    // tails[k] is the position of the smallest tail of an increasing run of length k + 1.
    let mut tails: Vec<usize> = Vec::with_capacity(seq.len());
    // predecessor[i] is the position before i in the best run ending at i.
    let mut predecessor: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        let k = tails.partition_point(|&t| seq[t] < value);
        if k > 0 {
            predecessor[i] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        result.push(i);
        cursor = predecessor[i];
    }
    result.reverse();
    result
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
