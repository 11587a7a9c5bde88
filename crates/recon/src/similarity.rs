//! Edit-distance similarity between names.

use crate::names::normalize;

/// Threshold used when none is configured.
pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const MIN_THRESHOLD: f64 = 0.5;
pub const MAX_THRESHOLD: f64 = 1.0;

/// Levenshtein distance with unit costs, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());

    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=n {
        dp[0][j] = j;
    }

    for i in 1..=m {
        for j in 1..=n {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1]
            } else {
                1 + dp[i - 1][j - 1].min(dp[i - 1][j]).min(dp[i][j - 1])
            };
        }
    }

    dp[m][n]
}

/// Similarity in `[0, 1]` between the normalized forms of two names.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch<'a> {
    /// Position of the winner in the candidate list.
    pub index: usize,
    pub candidate: &'a str,
    pub score: f64,
}

/// Highest-scoring candidate at or above `threshold`.
///
/// A candidate replaces the current best only with a strictly greater score,
/// so on ties the first one seen wins.
pub fn find_best_match<'a, I>(target: &str, candidates: I, threshold: f64) -> Option<BestMatch<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<BestMatch<'a>> = None;
    let mut best_score = 0.0;

    for (index, candidate) in candidates.into_iter().enumerate() {
        let score = similarity(target, candidate);
        if score > best_score && score >= threshold {
            best_score = score;
            best = Some(BestMatch { index, candidate, score });
        }
    }

    best
}
