//! Phred score utilities.
//!
//! Mean read quality is not the arithmetic mean of the Phred scores. Each score is
//! converted to its error probability, the probabilities are averaged, and the average
//! is converted back to the Phred scale. This weights low-quality bases appropriately:
//! a read with half Q10 and half Q40 bases has a mean quality near Q13, not Q25.

/// Offset of Phred+33 (Sanger) ASCII-encoded quality strings
pub const PHRED_OFFSET: u8 = 33;

/// Phred score type
pub type PhredScore = u8;

/// Converts a Phred score to its probability of error.
///
/// # Examples
/// ```
/// use nanoget_lib::phred::phred_to_error_prob;
///
/// assert!((phred_to_error_prob(10) - 0.1).abs() < 1e-12);
/// assert!((phred_to_error_prob(20) - 0.01).abs() < 1e-12);
/// ```
#[inline]
#[must_use]
pub fn phred_to_error_prob(phred: PhredScore) -> f64 {
    10f64.powf(-f64::from(phred) / 10.0)
}

/// Converts a probability of error to the (fractional) Phred scale.
#[inline]
#[must_use]
pub fn error_prob_to_phred(prob: f64) -> f64 {
    -10.0 * prob.log10()
}

/// Computes the mean quality of numeric Phred scores.
///
/// Returns `None` for an empty slice, since the mean is undefined.
///
/// # Examples
/// ```
/// use nanoget_lib::phred::mean_quality;
///
/// assert!((mean_quality(&[20, 20, 20]).unwrap() - 20.0).abs() < 1e-9);
/// assert!(mean_quality(&[]).is_none());
/// // Q10 dominates: the mean error is (0.1 + 0.0001) / 2
/// let q = mean_quality(&[10, 40]).unwrap();
/// assert!((q - 13.006).abs() < 1e-3);
/// ```
#[must_use]
pub fn mean_quality(quals: &[PhredScore]) -> Option<f64> {
    if quals.is_empty() {
        return None;
    }
    let total: f64 = quals.iter().map(|&q| phred_to_error_prob(q)).sum();
    Some(error_prob_to_phred(total / quals.len() as f64))
}

/// Computes the mean quality of a Phred+33 ASCII-encoded quality string.
///
/// Characters below the offset are treated as Q0.
#[must_use]
pub fn mean_quality_ascii(quals: &[u8]) -> Option<f64> {
    if quals.is_empty() {
        return None;
    }
    let total: f64 =
        quals.iter().map(|&q| phred_to_error_prob(q.saturating_sub(PHRED_OFFSET))).sum();
    Some(error_prob_to_phred(total / quals.len() as f64))
}

/// Computes the median of a Phred+33 ASCII-encoded quality string.
///
/// For an even number of scores the two middle scores are averaged.
#[must_use]
pub fn median_quality_ascii(quals: &[u8]) -> Option<f64> {
    if quals.is_empty() {
        return None;
    }
    let mut scores: Vec<PhredScore> =
        quals.iter().map(|&q| q.saturating_sub(PHRED_OFFSET)).collect();
    scores.sort_unstable();
    let mid = scores.len() / 2;
    if scores.len() % 2 == 0 {
        Some((f64::from(scores[mid - 1]) + f64::from(scores[mid])) / 2.0)
    } else {
        Some(f64::from(scores[mid]))
    }
}
