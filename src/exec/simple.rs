/*!
The simple driver: patterns without backreferences.

Without backreferences, the automata tell the whole truth: once the search
automaton has bounded a candidate window and the real automaton has pinned
the match, every node's span in the subexpression tree is structurally
determined. The dissection here therefore never backtracks; a concatenation
may slide its midpoint while looking for the split both operands accept, but
once the operands agree the children's dissection cannot fail.
*/

use crate::classes::CodeUnit;
use crate::dfa::Dfa;
use crate::exec::{cfa_of, zap_subexpressions, ExecState, Hit};
use crate::pattern::{SubId, SubKind};
use crate::util::matchtypes::{ExecError, Match};

impl<'a, 'h, U: CodeUnit> ExecState<'a, 'h, U> {
    /// Finds a match, pins its boundaries, and dissects capturing groups.
    pub(crate) fn simple_find(&mut self) -> Result<Hit, ExecError> {
        let pat = self.pattern;
        let text = self.text;
        let vstop = text.units.len();
        let shorter = pat.node(pat.root()).shorter;
        let cap = self.cache_capacity;

        // if every match starts with a known literal, skip ahead to it
        let mut scan = 0;
        if self.use_prefilter {
            if let Some(pre) = pat.prefilter() {
                match pre.find(text.units, 0) {
                    Some(pos) => scan = pos,
                    None => return Ok(Hit::none(None)),
                }
            }
        }

        // first, a shot with the search automaton
        trace!("searching from {}", scan);
        let (close, cold) = {
            let mut search = Dfa::new(
                &pat.search,
                pat.color_map(),
                &pat.lacons,
                &mut self.scratch.0,
                cap,
            )?;
            let walk = search.shortest(&text, scan, scan, vstop)?;
            (walk.end, walk.cold)
        };
        let close = match close {
            Some(close) => close,
            None => return Ok(Hit::none(cold)),
        };
        if self.pmatch.is_empty() {
            // found, and the caller does not need the exact location
            return Ok(Hit { matched: true, span: None, cold });
        }

        // find the starting point and match
        let open = match cold {
            Some(open) => open,
            None => {
                return Err(ExecError::internal(
                    "window search lost its cold start",
                ))
            }
        };
        trace!("candidate window {}..{}", open, close);
        let mut cold = None;
        let mut span = None;
        {
            let mut dfa = Dfa::new(
                cfa_of(pat, pat.root())?,
                pat.color_map(),
                &pat.lacons,
                &mut self.scratch.0,
                cap,
            )?;
            for begin in open..=close {
                let (end, hit_stop) = if shorter {
                    let walk = dfa.shortest(&text, begin, begin, vstop)?;
                    (walk.end, walk.hit_stop)
                } else {
                    let walk = dfa.longest(&text, begin, vstop)?;
                    (walk.end, walk.hit_stop)
                };
                if hit_stop && cold.is_none() {
                    cold = Some(begin);
                }
                if let Some(end) = end {
                    span = Some((begin, end));
                    break;
                }
            }
        }
        // the search automaton accepted, so some begin must work
        let (begin, end) = match span {
            Some(span) => span,
            None => {
                return Err(ExecError::internal(
                    "window search promised a match",
                ))
            }
        };

        // and pin down the details
        self.pmatch[0] = Some(Match::new(begin, end));
        if self.pmatch.len() == 1 {
            return Ok(Hit { matched: true, span: Some((begin, end)), cold });
        }
        zap_subexpressions(self.pmatch);
        let root = pat.root();
        self.dissect(root, begin, end)?;
        Ok(Hit { matched: true, span: Some((begin, end)), cold })
    }

    /// Determines subexpression spans for a verified whole span.
    ///
    /// Capturing chains unroll into the loop instead of recursing, so
    /// nesting depth only tracks genuine structure.
    pub(super) fn dissect(
        &mut self,
        id: SubId,
        begin: usize,
        end: usize,
    ) -> Result<(), ExecError> {
        let pat = self.pattern;
        let mut id = id;
        loop {
            trace!("dissect node {} over {}..{}", id, begin, end);
            let node = pat.node(id);
            match node.kind {
                // the parent already verified this span
                SubKind::Terminal => return Ok(()),
                SubKind::Alt => return self.alt_dissect(id, begin, end),
                SubKind::Concat => return self.concat_dissect(id, begin, end),
                SubKind::Backref { .. } => {
                    return Err(ExecError::internal(
                        "backreference outside the backtracking driver",
                    ))
                }
                SubKind::Capture { .. } => {
                    self.subset(id, begin, end)?;
                    id = match node.left {
                        Some(child) => child,
                        None => {
                            return Err(ExecError::internal(
                                "capture without a child",
                            ))
                        }
                    };
                }
            }
        }
    }

    /// Splits a concatenation's span between its operands.
    fn concat_dissect(
        &mut self,
        id: SubId,
        begin: usize,
        end: usize,
    ) -> Result<(), ExecError> {
        let pat = self.pattern;
        let text = self.text;
        let cap = self.cache_capacity;
        let node = pat.node(id);
        let (left, right) = match (node.left, node.right) {
            (Some(left), Some(right)) => (left, right),
            _ => {
                return Err(ExecError::internal(
                    "concatenation without two children",
                ))
            }
        };
        let shorter = pat.node(left).shorter;
        let stop = if shorter { end } else { begin };

        let mid = {
            let mut d = Dfa::new(
                cfa_of(pat, left)?,
                pat.color_map(),
                &pat.lacons,
                &mut self.scratch.0,
                cap,
            )?;
            let mut d2 = Dfa::new(
                cfa_of(pat, right)?,
                pat.color_map(),
                &pat.lacons,
                &mut self.scratch.1,
                cap,
            )?;

            // pick a tentative midpoint
            let found = if shorter {
                d.shortest(&text, begin, begin, end)?.end
            } else {
                d.longest(&text, begin, end)?.end
            };
            let mut mid = match found {
                Some(mid) => mid,
                None => {
                    return Err(ExecError::internal(
                        "no midpoint for a verified span",
                    ))
                }
            };
            trace!("tentative midpoint {}", mid);

            // iterate until both operands accept the split
            while d2.longest(&text, mid, end)?.end != Some(end) {
                if mid == stop {
                    return Err(ExecError::internal(
                        "midpoints exhausted for a verified span",
                    ));
                }
                let found = if shorter {
                    d.shortest(&text, begin, mid + 1, end)?.end
                } else {
                    d.longest(&text, begin, mid - 1)?.end
                };
                mid = match found {
                    Some(mid) => mid,
                    None => {
                        return Err(ExecError::internal(
                            "midpoint search failed for a verified span",
                        ))
                    }
                };
                trace!("new midpoint {}", mid);
            }
            mid
        };

        self.dissect(left, begin, mid)?;
        self.dissect(right, mid, end)
    }

    /// Finds the branch of an alternation that accepts the span.
    fn alt_dissect(
        &mut self,
        id: SubId,
        begin: usize,
        end: usize,
    ) -> Result<(), ExecError> {
        let pat = self.pattern;
        let text = self.text;
        let cap = self.cache_capacity;
        let mut cur = Some(id);
        while let Some(id) = cur {
            let node = pat.node(id);
            let branch = match node.left {
                Some(branch) => branch,
                None => {
                    return Err(ExecError::internal(
                        "alternation without a branch",
                    ))
                }
            };
            let accepts = {
                let mut d = Dfa::new(
                    cfa_of(pat, branch)?,
                    pat.color_map(),
                    &pat.lacons,
                    &mut self.scratch.0,
                    cap,
                )?;
                d.longest(&text, begin, end)?.end == Some(end)
            };
            if accepts {
                return self.dissect(branch, begin, end);
            }
            cur = node.right;
        }
        Err(ExecError::internal("no alternative matched a verified span"))
    }
}
