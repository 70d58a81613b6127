/*!
A leading-literal prefilter.

When the compiler proves that every match begins with one specific code
unit, the drivers can skip straight to its next occurrence before paying for
an automaton walk. A prefilter is only ever allowed to produce false
positives (a candidate the automaton then rejects), never false negatives,
so it cannot affect match results.
*/

use crate::classes::CodeUnit;

#[derive(Clone, Debug)]
pub(crate) struct Prefilter {
    unit: u32,
}

impl Prefilter {
    pub(crate) fn new(unit: u32) -> Prefilter {
        Prefilter { unit }
    }

    /// Returns the position of the next candidate match start at or after
    /// `at`, or `None` if the rest of the haystack cannot contain one.
    #[inline]
    pub(crate) fn find<U: CodeUnit>(
        &self,
        haystack: &[U],
        at: usize,
    ) -> Option<usize> {
        if let Some(bytes) = U::as_bytes(haystack) {
            if self.unit < 256 {
                return memchr::memchr(self.unit as u8, &bytes[at..])
                    .map(|i| at + i);
            }
        }
        haystack[at..]
            .iter()
            .position(|&u| u.as_u32() == self.unit)
            .map(|i| at + i)
    }
}
