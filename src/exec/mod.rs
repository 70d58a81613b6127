/*!
Match execution: validation, per-call state, and driver dispatch.

The engine has two drivers. The [simple driver](simple) handles patterns
without backreferences in one deterministic pass; the [backtracking
driver](backtrack) handles the rest with a memoized retry search. Both share
the same shape: a coarse scan with the pattern's search automaton to bound a
candidate window, a walk of the real automaton to pin the match, and a
structural dissection of the subexpression tree to recover capturing group
spans.

Everything mutable lives in an [`ExecState`] created per call and dropped on
every exit path; the pattern itself is never touched.
*/

use alloc::vec;
use alloc::vec::Vec;

use crate::classes::CodeUnit;
use crate::dfa::{Cache, Text};
use crate::pattern::{Pattern, SubId, SubKind};
use crate::util::matchtypes::{ExecError, Match};

mod backtrack;
mod simple;

/// Per-call options for a match.
///
/// The defaults run an ordinary match: buffer edges count as text
/// boundaries, no extension report, default cache sizing.
#[derive(Clone, Debug, Default)]
pub struct ExecOptions {
    not_bol: bool,
    not_eol: bool,
    want_extend: bool,
    cache_capacity: Option<usize>,
}

impl ExecOptions {
    /// Returns the default options.
    pub fn new() -> ExecOptions {
        ExecOptions::default()
    }

    /// Declares that the start of the buffer is not the beginning of a
    /// line, so boundary-sensitive pattern elements must not treat it as
    /// one.
    pub fn not_bol(mut self, yes: bool) -> ExecOptions {
        self.not_bol = yes;
        self
    }

    /// Declares that the end of the buffer is not the end of a line.
    pub fn not_eol(mut self, yes: bool) -> ExecOptions {
        self.not_eol = yes;
        self
    }

    /// Requests an [`Extend`] report: how far the buffer would need to
    /// extend for a different outcome to become possible. Computing it
    /// disables the leading-literal skip, since the report must account for
    /// every position.
    pub fn want_extend(mut self, yes: bool) -> ExecOptions {
        self.want_extend = yes;
        self
    }

    /// Overrides the per-automaton state set cache capacity for this call.
    ///
    /// This is a performance (and testing) knob only: any capacity produces
    /// identical match results. Values below the engine's minimum are
    /// clamped up to it.
    pub fn cache_capacity(mut self, capacity: Option<usize>) -> ExecOptions {
        self.cache_capacity = capacity;
        self
    }
}

/// Where a match could begin if the buffer were extended; see
/// [`ExecOptions::want_extend`].
///
/// `start` is the earliest position at which the engine could not rule out
/// a match that ran past the end of the buffer (the end of the buffer
/// itself, if it ruled out everything). `end` is always the buffer length:
/// how far such a match might reach is unknowable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Extend {
    start: usize,
    end: usize,
}

impl Extend {
    /// The earliest position of a potential buffer-extending match.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// The buffer length at the time of the call.
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }
}

/// The outcome of [`Pattern::exec`].
#[derive(Clone, Debug)]
pub struct Exec {
    found: Option<Match>,
    extend: Option<Extend>,
}

impl Exec {
    /// The whole-pattern match, if one was found.
    #[inline]
    pub fn found(&self) -> Option<Match> {
        self.found
    }

    /// The extension report, if one was requested.
    #[inline]
    pub fn extend(&self) -> Option<Extend> {
        self.extend
    }
}

/// What a driver reports back to the dispatcher.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Hit {
    /// Whether the pattern matched at all.
    pub(crate) matched: bool,
    /// The whole-match span, when one was pinned down. (An existence-only
    /// call skips pinning.)
    pub(crate) span: Option<(usize, usize)>,
    /// Where a buffer-extending match could begin.
    pub(crate) cold: Option<usize>,
}

impl Hit {
    pub(crate) fn none(cold: Option<usize>) -> Hit {
        Hit { matched: false, span: None, cold }
    }
}

impl Pattern {
    /// Returns the whole-pattern match and fills `caps` with per-group
    /// spans, using default options.
    ///
    /// `caps.len()` is the requested group count: slot 0 receives the whole
    /// match, slot `i` group `i`. Groups that did not participate are set
    /// to `None`, as are slots beyond the pattern's group count. On a
    /// no-match outcome `caps` is left untouched.
    pub fn find<U: CodeUnit>(
        &self,
        haystack: &[U],
        caps: &mut [Option<Match>],
    ) -> Result<Option<Match>, ExecError> {
        self.exec(haystack, caps, &ExecOptions::new()).map(|e| e.found)
    }

    /// Reports whether the pattern matches anywhere in the haystack,
    /// without pinning down where. This is cheaper than [`Pattern::find`]:
    /// for patterns without backreferences only the coarse search automaton
    /// runs.
    pub fn is_match<U: CodeUnit>(
        &self,
        haystack: &[U],
    ) -> Result<bool, ExecError> {
        self.check::<U>()?;
        if self.is_impossible() {
            return Ok(false);
        }
        let text = Text {
            units: haystack,
            not_bol: false,
            not_eol: false,
        };
        let opts = ExecOptions::new();
        if self.has_backrefs() {
            // the backtracking driver needs group spans to validate
            // backreferences even when the caller wants none
            let mut owned = vec![None; self.group_count() + 1];
            Ok(self.run(text, &mut owned, &opts)?.matched)
        } else {
            Ok(self.run(text, &mut [], &opts)?.matched)
        }
    }

    /// Runs a match with explicit options.
    ///
    /// This is the full contract: `caps` as in [`Pattern::find`], plus the
    /// boundary declarations and reports of [`ExecOptions`]. A pattern
    /// compiled with captures disabled ignores `caps` entirely except for
    /// resetting it to the unmatched sentinel on success.
    pub fn exec<U: CodeUnit>(
        &self,
        haystack: &[U],
        caps: &mut [Option<Match>],
        opts: &ExecOptions,
    ) -> Result<Exec, ExecError> {
        self.check::<U>()?;
        if self.is_impossible() {
            return Ok(Exec { found: None, extend: None });
        }
        let requested = if self.captures_disabled() { 0 } else { caps.len() };
        let text = Text {
            units: haystack,
            not_bol: opts.not_bol,
            not_eol: opts.not_eol,
        };

        let hit = if self.has_backrefs() {
            // the backtracking driver always works with the full group
            // vector; the requested prefix is copied out afterwards
            let mut owned: Vec<Option<Match>> =
                vec![None; self.group_count() + 1];
            let hit = self.run(text, &mut owned, opts)?;
            if hit.matched {
                for slot in caps.iter_mut() {
                    *slot = None;
                }
                let n = core::cmp::min(requested, owned.len());
                caps[..n].copy_from_slice(&owned[..n]);
            }
            hit
        } else if requested == 0 {
            // existence plus location, but no group dissection
            let mut owned = [None; 1];
            let hit = self.run(text, &mut owned[..], opts)?;
            if hit.matched {
                for slot in caps.iter_mut() {
                    *slot = None;
                }
            }
            hit
        } else {
            self.run(text, caps, opts)?
        };

        let found = hit.span.map(|(start, end)| Match::new(start, end));
        let extend = if opts.want_extend {
            Some(Extend {
                start: hit.cold.unwrap_or_else(|| haystack.len()),
                end: haystack.len(),
            })
        } else {
            None
        };
        Ok(Exec { found, extend })
    }

    /// Validates the pattern object and haystack width before any matching
    /// work begins.
    fn check<U: CodeUnit>(&self) -> Result<(), ExecError> {
        if self.magic != crate::pattern::PATTERN_MAGIC {
            return Err(ExecError::invalid());
        }
        if U::WIDTH != self.char_width() {
            return Err(ExecError::mixed(self.char_width(), U::WIDTH));
        }
        Ok(())
    }

    fn run<U: CodeUnit>(
        &self,
        text: Text<'_, U>,
        pmatch: &mut [Option<Match>],
        opts: &ExecOptions,
    ) -> Result<Hit, ExecError> {
        let mem_len = if self.has_backrefs() { self.node_count() } else { 0 };
        let mut state = ExecState {
            pattern: self,
            text,
            pmatch,
            mem: vec![0; mem_len],
            scratch: (Cache::new(), Cache::new()),
            cache_capacity: opts.cache_capacity,
            use_prefilter: !opts.want_extend,
        };
        if self.has_backrefs() {
            state.complicated_find()
        } else {
            state.simple_find()
        }
    }
}

/// All mutable state of one match call.
pub(crate) struct ExecState<'a, 'h, U: CodeUnit> {
    pub(crate) pattern: &'a Pattern,
    pub(crate) text: Text<'h, U>,
    /// Group span vector; slot 0 is the whole match.
    pub(crate) pmatch: &'a mut [Option<Match>],
    /// Retry memo, one slot per tree node (empty without backreferences).
    pub(crate) mem: Vec<usize>,
    /// A reusable cache pair for drivers whose walker use is strictly
    /// sequential. Code that keeps walkers alive across recursion builds
    /// throwaway caches instead.
    pub(crate) scratch: (Cache, Cache),
    pub(crate) cache_capacity: Option<usize>,
    pub(crate) use_prefilter: bool,
}

/// Fetches the automaton a parent needs to run a child node directly.
pub(crate) fn cfa_of<'p>(
    pat: &'p Pattern,
    id: SubId,
) -> Result<&'p crate::cfa::Cfa, ExecError> {
    pat.node(id).cfa.as_ref().ok_or_else(|| {
        ExecError::internal("subexpression node is missing its automaton")
    })
}

/// Resets every group slot but the whole-match one to "unmatched".
pub(crate) fn zap_subexpressions(pmatch: &mut [Option<Match>]) {
    for slot in pmatch.iter_mut().skip(1) {
        *slot = None;
    }
}

impl<'a, 'h, U: CodeUnit> ExecState<'a, 'h, U> {
    /// Resets the retry memo and captured spans of an entire subtree, so a
    /// fresh combinatorial attempt never sees a stale partial one.
    pub(crate) fn zap_subtree(&mut self, id: SubId) {
        let node = self.pattern.node(id);
        if let Some(slot) = self.mem.get_mut(node.retry) {
            *slot = 0;
        }
        if let SubKind::Capture { group } = node.kind {
            if group < self.pmatch.len() {
                self.pmatch[group] = None;
            }
        }
        if let Some(left) = node.left {
            self.zap_subtree(left);
        }
        if let Some(right) = node.right {
            self.zap_subtree(right);
        }
    }

    /// Records a capturing node's span, if the caller asked for that group.
    pub(crate) fn subset(
        &mut self,
        id: SubId,
        begin: usize,
        end: usize,
    ) -> Result<(), ExecError> {
        let group = match self.pattern.node(id).kind {
            SubKind::Capture { group } => group,
            _ => {
                return Err(ExecError::internal(
                    "span recorded for a non-capturing node",
                ))
            }
        };
        if group >= self.pmatch.len() {
            return Ok(());
        }
        trace!("setting group {} to {}..{}", group, begin, end);
        self.pmatch[group] = Some(Match::new(begin, end));
        Ok(())
    }
}
