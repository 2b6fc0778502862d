//! Percent sequence identity of a single alignment.
//!
//! Percent identity is `100 * (1 - edit_distance / aligned_length)`, where the aligned
//! length is the number of reference bases spanned by the alignment (`M`, `=`, `X` and `D`
//! operations). The edit distance comes from the `NM` tag when the aligner wrote one.
//! Otherwise it is rebuilt from the `MD` tag (every mismatched or deleted reference base
//! appears there as a letter) plus the total length of `I` operations in the CIGAR, which
//! `MD` cannot describe.

use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;

/// Result of computing percent identity for one alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdentityOutcome {
    /// Percent identity in `[.., 100]`
    Identity(f64),
    /// The alignment spans no reference bases, so identity is undefined
    ZeroLengthAlignment,
    /// Neither an `NM` nor an `MD` tag is present
    Unavailable,
}

impl IdentityOutcome {
    /// Returns the identity value, if one was computed.
    #[must_use]
    pub fn value(self) -> Option<f64> {
        match self {
            IdentityOutcome::Identity(v) => Some(v),
            IdentityOutcome::ZeroLengthAlignment | IdentityOutcome::Unavailable => None,
        }
    }
}

/// Number of reference bases consumed by match, mismatch and deletion operations.
#[must_use]
pub fn reference_aligned_length(ops: &[Op]) -> u64 {
    ops.iter()
        .filter(|op| {
            matches!(
                op.kind(),
                Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch | Kind::Deletion
            )
        })
        .map(|op| op.len() as u64)
        .sum()
}

/// Total length of insertion operations.
#[must_use]
pub fn insertion_length(ops: &[Op]) -> u64 {
    ops.iter().filter(|op| op.kind() == Kind::Insertion).map(|op| op.len() as u64).sum()
}

/// Counts mismatched and deleted reference bases in an `MD` string.
///
/// # Examples
/// ```
/// use nanoget_lib::identity::md_edit_count;
///
/// assert_eq!(md_edit_count(b"10A5^AC6"), 3);
/// assert_eq!(md_edit_count(b"100"), 0);
/// ```
#[must_use]
pub fn md_edit_count(md: &[u8]) -> u64 {
    md.iter().filter(|b| b.is_ascii_alphabetic()).count() as u64
}

/// Percent identity from a known edit distance and aligned length.
#[must_use]
pub fn identity_from_edit_distance(edit_distance: u64, aligned_length: u64) -> IdentityOutcome {
    if aligned_length == 0 {
        return IdentityOutcome::ZeroLengthAlignment;
    }
    IdentityOutcome::Identity(100.0 * (1.0 - edit_distance as f64 / aligned_length as f64))
}

/// Percent identity of one alignment.
///
/// `nm` takes precedence; `md` plus the CIGAR insertions are the fallback.
#[must_use]
pub fn percent_identity(ops: &[Op], nm: Option<u64>, md: Option<&[u8]>) -> IdentityOutcome {
    let aligned_length = reference_aligned_length(ops);
    let edit_distance = match (nm, md) {
        (Some(nm), _) => nm,
        (None, Some(md)) => md_edit_count(md) + insertion_length(ops),
        (None, None) => return IdentityOutcome::Unavailable,
    };
    identity_from_edit_distance(edit_distance, aligned_length)
}
