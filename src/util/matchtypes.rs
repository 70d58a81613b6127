/*!
Types describing the result of a match call.
*/

use core::fmt;

use crate::classes::CharWidth;

/// A representation of a match reported by the engine.
///
/// A match records the start and end offsets of the match in the haystack,
/// in code units. Every match guarantees that `start <= end`.
///
/// Capturing group results use `Option<Match>`, where `None` is the
/// "group did not participate in the match" sentinel.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Match {
    /// The start offset of the match, inclusive.
    start: usize,
    /// The end offset of the match, exclusive.
    end: usize,
}

impl Match {
    /// Create a new match from a code unit offset span.
    ///
    /// # Panics
    ///
    /// This panics if `end < start`.
    #[inline]
    pub fn new(start: usize, end: usize) -> Match {
        assert!(start <= end);
        Match { start, end }
    }

    /// The starting position of the match.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// The ending position of the match.
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Returns the match location as a range.
    #[inline]
    pub fn range(&self) -> core::ops::Range<usize> {
        self.start..self.end
    }

    /// Returns the length of the match, in code units.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if and only if this match is empty. That is, when
    /// `start() == end()`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An error that aborted a match call.
///
/// "No match" is not an error; it is reported in the value channel as
/// `None`. The errors here are the ways a call can fail outright: caller
/// misuse detected up front (a pattern object that fails its sanity check,
/// or a haystack whose code unit width disagrees with the pattern's),
/// failure to allocate the per-call automaton cache, and broken structural
/// invariants. The last kind always indicates a defect in the pattern
/// representation or the engine itself, never a property of the haystack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecError {
    kind: ExecErrorKind,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum ExecErrorKind {
    /// The pattern object failed its sanity check.
    InvalidPattern,
    /// The pattern and haystack use different code unit widths.
    MixedWidth { pattern: CharWidth, haystack: CharWidth },
    /// Per-call cache or scratch storage could not be allocated.
    Space,
    /// A structural invariant did not hold.
    Internal { reason: &'static str },
}

impl ExecError {
    pub(crate) fn invalid() -> ExecError {
        ExecError { kind: ExecErrorKind::InvalidPattern }
    }

    pub(crate) fn mixed(pattern: CharWidth, haystack: CharWidth) -> ExecError {
        ExecError { kind: ExecErrorKind::MixedWidth { pattern, haystack } }
    }

    pub(crate) fn space() -> ExecError {
        ExecError { kind: ExecErrorKind::Space }
    }

    pub(crate) fn internal(reason: &'static str) -> ExecError {
        ExecError { kind: ExecErrorKind::Internal { reason } }
    }

    /// Returns true if this error reports a pattern object that failed its
    /// sanity check.
    pub fn is_invalid_pattern(&self) -> bool {
        matches!(self.kind, ExecErrorKind::InvalidPattern)
    }

    /// Returns true if this error reports a code unit width mismatch
    /// between pattern and haystack.
    pub fn is_mixed_width(&self) -> bool {
        matches!(self.kind, ExecErrorKind::MixedWidth { .. })
    }

    /// Returns true if this error reports an allocation failure for
    /// per-call scratch state.
    pub fn is_space(&self) -> bool {
        matches!(self.kind, ExecErrorKind::Space)
    }

    /// Returns true if this error reports a broken structural invariant.
    /// Such an error is a defect and worth reporting as a bug.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ExecErrorKind::Internal { .. })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ExecError {}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExecErrorKind::InvalidPattern => {
                write!(f, "pattern object failed its sanity check")
            }
            ExecErrorKind::MixedWidth { pattern, haystack } => write!(
                f,
                "pattern compiled for {} code units cannot match a {} haystack",
                pattern, haystack,
            ),
            ExecErrorKind::Space => {
                write!(f, "failed to allocate per-call match state")
            }
            ExecErrorKind::Internal { reason } => {
                write!(f, "internal invariant violated: {}", reason)
            }
        }
    }
}
