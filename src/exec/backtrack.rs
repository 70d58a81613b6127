/*!
The backtracking driver: patterns with backreferences.

A backreference makes the automata optimistic: they match a structural
approximation of the pattern, so an accepted span is only a candidate until
a full dissection of the subexpression tree confirms it. The driver pairs an
outer window search with an inner retry loop over candidate end positions,
and the dissection itself becomes a memoized backtracking search: every node
remembers its last attempt in the per-call retry memo, so a failed sibling
sends control back *into* a subtree rather than restarting it from scratch.
The memo (and any captured spans) of a subtree is zapped whenever an
ancestor changes the boundaries handed to it, which keeps stale partial
attempts from leaking into a new combinatorial attempt.

The worst case is combinatorial in pathological patterns; callers who need
a bound must impose one from outside, e.g. by limiting input size.
*/

use crate::classes::CodeUnit;
use crate::dfa::{Cache, Dfa};
use crate::exec::{cfa_of, zap_subexpressions, ExecState, Hit};
use crate::pattern::{SubId, SubKind};
use crate::util::matchtypes::{ExecError, Match};

/// Alternation retry states.
const UNTRIED: usize = 0;
const TRYING: usize = 1;
const TRIED: usize = 2;

impl<'a, 'h, U: CodeUnit> ExecState<'a, 'h, U> {
    /// Finds a match by candidate generation and full dissection.
    pub(crate) fn complicated_find(&mut self) -> Result<Hit, ExecError> {
        let pat = self.pattern;
        let text = self.text;
        let vstop = text.units.len();
        let cap = self.cache_capacity;
        let root = pat.root();
        let shorter = pat.node(root).shorter;

        // These two walkers stay live across the dissection recursion, so
        // they get caches of their own rather than the scratch pair.
        let mut search_cache = Cache::new();
        let mut dfa_cache = Cache::new();
        let mut search = Dfa::new(
            &pat.search,
            pat.color_map(),
            &pat.lacons,
            &mut search_cache,
            cap,
        )?;
        let mut dfa = Dfa::new(
            cfa_of(pat, root)?,
            pat.color_map(),
            &pat.lacons,
            &mut dfa_cache,
            cap,
        )?;

        let mut cold: Option<usize> = None;
        let mut close = 0;
        loop {
            trace!("window search at {}", close);
            let walk = search.shortest(&text, close, close, vstop)?;
            let found_close = match walk.end {
                Some(close) => close,
                None => break,
            };
            let open = match walk.cold {
                Some(open) => open,
                None => {
                    return Err(ExecError::internal(
                        "window search lost its cold start",
                    ))
                }
            };
            cold = None;
            trace!("candidate window {}..{}", open, found_close);
            for begin in open..=found_close {
                let mut estart = begin;
                let mut estop = vstop;
                loop {
                    let (end, hit_stop) = if shorter {
                        let walk =
                            dfa.shortest(&text, begin, estart, estop)?;
                        (walk.end, walk.hit_stop)
                    } else {
                        let walk = dfa.longest(&text, begin, estop)?;
                        (walk.end, walk.hit_stop)
                    };
                    if hit_stop && cold.is_none() {
                        cold = Some(begin);
                    }
                    let end = match end {
                        Some(end) => end,
                        None => break,
                    };
                    trace!("tentative end {}", end);
                    zap_subexpressions(self.pmatch);
                    self.zap_subtree(root);
                    if self.cdissect(root, begin, end)? {
                        if !self.pmatch.is_empty() {
                            self.pmatch[0] = Some(Match::new(begin, end));
                        }
                        return Ok(Hit {
                            matched: true,
                            span: Some((begin, end)),
                            cold,
                        });
                    }
                    // no candidate end closer to this one can do better
                    let exhausted =
                        if shorter { end == estop } else { end == begin };
                    if exhausted {
                        return Ok(Hit::none(cold));
                    }
                    if shorter {
                        estart = end + 1;
                    } else {
                        estop = end - 1;
                    }
                }
            }
            // advance the window past everything just exhausted
            if found_close + 1 >= vstop {
                break;
            }
            close = found_close + 1;
        }
        Ok(Hit::none(cold))
    }

    /// Dissects a candidate span against a subtree, backtracking through
    /// the retry memo. `Ok(false)` is an ordinary "this decomposition does
    /// not work"; real failures come back as errors.
    pub(super) fn cdissect(
        &mut self,
        id: SubId,
        begin: usize,
        end: usize,
    ) -> Result<bool, ExecError> {
        let pat = self.pattern;
        trace!("cdissect node {} over {}..{}", id, begin, end);
        let node = pat.node(id);
        match node.kind {
            // the enclosing automaton check already verified this span
            SubKind::Terminal => Ok(true),
            SubKind::Alt => self.calt_dissect(Some(id), begin, end),
            SubKind::Concat => {
                let left = node.left.ok_or_else(|| {
                    ExecError::internal("concatenation without children")
                })?;
                if pat.node(left).shorter {
                    self.crev_dissect(id, begin, end)
                } else {
                    self.ccon_dissect(id, begin, end)
                }
            }
            SubKind::Capture { .. } => {
                let child = node.left.ok_or_else(|| {
                    ExecError::internal("capture without a child")
                })?;
                let matched = self.cdissect(child, begin, end)?;
                if matched {
                    self.subset(id, begin, end)?;
                }
                Ok(matched)
            }
            SubKind::Backref { group, min, max } => {
                self.cbr_dissect(id, group, min, max, begin, end)
            }
        }
    }

    /// Concatenation with a greedy left operand: start from the longest
    /// left match and shrink, resuming at the memoized midpoint.
    fn ccon_dissect(
        &mut self,
        id: SubId,
        begin: usize,
        end: usize,
    ) -> Result<bool, ExecError> {
        let pat = self.pattern;
        let text = self.text;
        let cap = self.cache_capacity;
        let node = pat.node(id);
        let retry = node.retry;
        let (left, right) = match (node.left, node.right) {
            (Some(left), Some(right)) => (left, right),
            _ => {
                return Err(ExecError::internal(
                    "concatenation without two children",
                ))
            }
        };
        let mut left_cache = Cache::new();
        let mut right_cache = Cache::new();
        let mut d = Dfa::new(
            cfa_of(pat, left)?,
            pat.color_map(),
            &pat.lacons,
            &mut left_cache,
            cap,
        )?;
        let mut d2 = Dfa::new(
            cfa_of(pat, right)?,
            pat.color_map(),
            &pat.lacons,
            &mut right_cache,
            cap,
        )?;

        // pick a tentative midpoint, or resume at the memoized one; the
        // memo holds the offset from begin plus one, so zero means
        // "clean slate"
        let mut mid = if self.mem[retry] == 0 {
            let mid = match d.longest(&text, begin, end)?.end {
                Some(mid) => mid,
                None => return Ok(false),
            };
            self.mem[retry] = mid - begin + 1;
            trace!("tentative midpoint {}", mid);
            mid
        } else {
            let mid = begin + (self.mem[retry] - 1);
            trace!("working midpoint {}", mid);
            mid
        };

        loop {
            // try this midpoint on for size
            if d2.longest(&text, mid, end)?.end == Some(end) {
                if self.cdissect(left, begin, mid)?
                    && self.cdissect(right, mid, end)?
                {
                    return Ok(true);
                }
            }
            // that midpoint didn't work, find a new one
            if mid == begin {
                return Ok(false);
            }
            mid = match d.longest(&text, begin, mid - 1)?.end {
                Some(mid) => mid,
                None => return Ok(false),
            };
            self.mem[retry] = mid - begin + 1;
            trace!("new midpoint {}", mid);
            self.zap_subtree(left);
            self.zap_subtree(right);
        }
    }

    /// Concatenation with a shortest-preferring left operand: start from
    /// the shortest left match and grow.
    fn crev_dissect(
        &mut self,
        id: SubId,
        begin: usize,
        end: usize,
    ) -> Result<bool, ExecError> {
        let pat = self.pattern;
        let text = self.text;
        let cap = self.cache_capacity;
        let node = pat.node(id);
        let retry = node.retry;
        let (left, right) = match (node.left, node.right) {
            (Some(left), Some(right)) => (left, right),
            _ => {
                return Err(ExecError::internal(
                    "concatenation without two children",
                ))
            }
        };
        let mut left_cache = Cache::new();
        let mut right_cache = Cache::new();
        let mut d = Dfa::new(
            cfa_of(pat, left)?,
            pat.color_map(),
            &pat.lacons,
            &mut left_cache,
            cap,
        )?;
        let mut d2 = Dfa::new(
            cfa_of(pat, right)?,
            pat.color_map(),
            &pat.lacons,
            &mut right_cache,
            cap,
        )?;

        let mut mid = if self.mem[retry] == 0 {
            let mid = match d.shortest(&text, begin, begin, end)?.end {
                Some(mid) => mid,
                None => return Ok(false),
            };
            self.mem[retry] = mid - begin + 1;
            trace!("tentative midpoint {}", mid);
            mid
        } else {
            let mid = begin + (self.mem[retry] - 1);
            trace!("working midpoint {}", mid);
            mid
        };

        loop {
            if d2.longest(&text, mid, end)?.end == Some(end) {
                if self.cdissect(left, begin, mid)?
                    && self.cdissect(right, mid, end)?
                {
                    return Ok(true);
                }
            }
            if mid == end {
                return Ok(false);
            }
            mid = match d.shortest(&text, begin, mid + 1, end)?.end {
                Some(mid) => mid,
                None => return Ok(false),
            };
            self.mem[retry] = mid - begin + 1;
            trace!("new midpoint {}", mid);
            self.zap_subtree(left);
            self.zap_subtree(right);
        }
    }

    /// Walks an alternation chain, remembering per branch whether it is
    /// untried, mid-attempt, or exhausted.
    fn calt_dissect(
        &mut self,
        mut cur: Option<SubId>,
        begin: usize,
        end: usize,
    ) -> Result<bool, ExecError> {
        let pat = self.pattern;
        let text = self.text;
        let cap = self.cache_capacity;
        while let Some(id) = cur {
            let node = pat.node(id);
            debug_assert!(matches!(node.kind, SubKind::Alt));
            let next = node.right;
            if self.mem[node.retry] != TRIED {
                let branch = node.left.ok_or_else(|| {
                    ExecError::internal("alternation without a branch")
                })?;
                let mut viable = true;
                if self.mem[node.retry] == UNTRIED {
                    let mut cache = Cache::new();
                    let mut d = Dfa::new(
                        cfa_of(pat, branch)?,
                        pat.color_map(),
                        &pat.lacons,
                        &mut cache,
                        cap,
                    )?;
                    viable = d.longest(&text, begin, end)?.end == Some(end);
                    self.mem[node.retry] =
                        if viable { TRYING } else { TRIED };
                    if viable {
                        trace!("alternation branch {} viable", id);
                    }
                }
                if viable {
                    if self.cdissect(branch, begin, end)? {
                        return Ok(true);
                    }
                    self.mem[node.retry] = TRIED;
                }
            }
            cur = next;
        }
        Ok(false)
    }

    /// Matches a backreference by counting equal-length repeats of the
    /// captured content across the candidate range.
    fn cbr_dissect(
        &mut self,
        id: SubId,
        group: usize,
        min: u32,
        max: Option<u32>,
        begin: usize,
        end: usize,
    ) -> Result<bool, ExecError> {
        let pat = self.pattern;
        let text = self.text;
        let retry = pat.node(id).retry;
        trace!("backref to group {} over {}..{}", group, begin, end);

        let slot = self.pmatch.get(group).ok_or_else(|| {
            ExecError::internal("backreference to an out-of-range group")
        })?;
        let mat = match *slot {
            Some(mat) => mat,
            // the referenced group never participated
            None => return Ok(false),
        };

        // a fixed span admits no alternative decomposition, so one attempt
        // settles it for this range
        if self.mem[retry] != 0 {
            return Ok(false);
        }
        self.mem[retry] = 1;

        let len = mat.len();
        if len == 0 {
            return Ok(begin == end);
        }
        if end - begin < len {
            return Ok(false);
        }
        let stop = end - len;

        let source = &text.units[mat.range()];
        let compare = pat.compare();
        let mut count: usize = 0;
        let mut at = begin;
        while at <= stop && max.map_or(true, |max| count < max as usize) {
            if !compare.units_eq(source, &text.units[at..at + len]) {
                break;
            }
            count += 1;
            at += len;
        }
        trace!("backref found {} repeats", count);
        if at != end {
            // didn't consume the whole range
            return Ok(false);
        }
        Ok(min as usize <= count && max.map_or(true, |max| count <= max as usize))
    }
}
