/*!
The compact automaton consumed by the matching engine.

A [`Cfa`] is an immutable finite automaton whose transitions are labeled with
colors rather than characters. It is produced by the pattern compiler and
never modified afterwards, which is what makes a compiled pattern safe to
match from many threads at once.

Two pseudo states bound the useful region: walks are seeded at `pre`, and a
walk has found a match once `post` becomes reachable. Entering the automaton
consumes one *lookaround* color (the begin-of-text color, or the color of the
unit just before the starting position), and symmetrically `post` is entered
by consuming the color of the unit just after the match, or the end-of-text
color at the buffer's edge. The lazy walker in this crate accounts for that
one-unit skew when reporting match boundaries.

Arc lists may also carry colors at or beyond the color map's count. Those do
not classify any unit; they are references into the pattern's lookahead
constraint vector and are only followed when the referenced constraint holds
at the current position.
*/

use alloc::vec;
use alloc::vec::Vec;

use core::fmt;

use crate::classes::Color;

/// A compact, color-labeled automaton.
///
/// Use [`Cfa::builder`] to assemble one. States are numbered `0..state_count`
/// and each owns a list of `(color, target)` arcs stored in one flat arena.
#[derive(Clone)]
pub struct Cfa {
    nstates: usize,
    ncolors: usize,
    pre: usize,
    post: usize,
    /// Colors consumed for the position just before a walk's start: slot 1
    /// when the walk starts at the true beginning of text, slot 0 when the
    /// caller asked for the beginning to not count as one.
    bos: [Option<Color>; 2],
    /// Same as `bos`, for the end of text.
    eos: [Option<Color>; 2],
    left_anchored: bool,
    has_lacons: bool,
    /// Per-state flag: the state is only reachable without consuming any of
    /// the match itself. Used to find the earliest plausible match start.
    no_progress: Vec<bool>,
    /// `arcs[offsets[s] as usize..offsets[s + 1] as usize]` is state `s`'s
    /// arc list.
    offsets: Vec<u32>,
    arcs: Vec<CArc>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct CArc {
    pub(crate) color: Color,
    pub(crate) to: u32,
}

impl Cfa {
    /// Returns a builder for an automaton with `nstates` states over a color
    /// map with `ncolors` colors.
    ///
    /// # Panics
    ///
    /// This panics if `nstates` is zero or does not fit in a `u32`, or if
    /// `ncolors` is zero.
    pub fn builder(nstates: usize, ncolors: usize) -> CfaBuilder {
        assert!(nstates > 0, "an automaton needs at least one state");
        assert!(nstates <= u32::MAX as usize, "too many states");
        assert!(ncolors > 0, "an automaton needs at least one color");
        CfaBuilder {
            nstates,
            ncolors,
            pre: None,
            post: None,
            bos: [None; 2],
            eos: [None; 2],
            left_anchored: false,
            no_progress: vec![false; nstates],
            arcs: vec![Vec::new(); nstates],
        }
    }

    /// Returns the number of states.
    #[inline]
    pub fn state_count(&self) -> usize {
        self.nstates
    }

    /// Returns the number of colors in the map this automaton was compiled
    /// against. Arc colors at or beyond this count are lookahead constraint
    /// references.
    #[inline]
    pub fn color_count(&self) -> usize {
        self.ncolors
    }

    /// Returns the setup state seeding every walk.
    #[inline]
    pub fn pre(&self) -> usize {
        self.pre
    }

    /// Returns the teardown state whose reachability signals a match.
    #[inline]
    pub fn post(&self) -> usize {
        self.post
    }

    /// Returns true if this automaton can only match at the beginning of
    /// text.
    #[inline]
    pub fn is_left_anchored(&self) -> bool {
        self.left_anchored
    }

    #[inline]
    pub(crate) fn has_lacons(&self) -> bool {
        self.has_lacons
    }

    #[inline]
    pub(crate) fn is_no_progress(&self, state: usize) -> bool {
        self.no_progress[state]
    }

    #[inline]
    pub(crate) fn bos(&self, not_bol: bool) -> Option<Color> {
        self.bos[if not_bol { 0 } else { 1 }]
    }

    #[inline]
    pub(crate) fn eos(&self, not_eol: bool) -> Option<Color> {
        self.eos[if not_eol { 0 } else { 1 }]
    }

    #[inline]
    pub(crate) fn arcs(&self, state: usize) -> &[CArc] {
        let lo = self.offsets[state] as usize;
        let hi = self.offsets[state + 1] as usize;
        &self.arcs[lo..hi]
    }

    /// Returns the heap memory used by this automaton, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.no_progress.len() * core::mem::size_of::<bool>()
            + self.offsets.len() * core::mem::size_of::<u32>()
            + self.arcs.len() * core::mem::size_of::<CArc>()
    }
}

impl fmt::Debug for Cfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cfa(")?;
        for s in 0..self.nstates {
            let mut tags = alloc::string::String::new();
            if s == self.pre {
                tags.push_str(" <pre>");
            }
            if s == self.post {
                tags.push_str(" <post>");
            }
            if self.no_progress[s] {
                tags.push_str(" <noprogress>");
            }
            write!(f, "  {:3}{}:", s, tags)?;
            for arc in self.arcs(s) {
                write!(f, " {}=>{}", arc.color, arc.to)?;
            }
            writeln!(f, "")?;
        }
        write!(f, ")")
    }
}

/// A builder for a [`Cfa`].
///
/// The builder records arcs per state in insertion order; insertion order is
/// preserved in the built automaton, so walks are fully deterministic for a
/// given compilation.
#[derive(Clone, Debug)]
pub struct CfaBuilder {
    nstates: usize,
    ncolors: usize,
    pre: Option<usize>,
    post: Option<usize>,
    bos: [Option<Color>; 2],
    eos: [Option<Color>; 2],
    left_anchored: bool,
    no_progress: Vec<bool>,
    arcs: Vec<Vec<CArc>>,
}

impl CfaBuilder {
    /// Adds an arc from `from` to `to` on the given color. A color at or
    /// beyond the builder's color count is a lookahead constraint reference
    /// and marks the automaton as requiring constraint checks.
    ///
    /// # Panics
    ///
    /// This panics if `from` or `to` is out of range.
    pub fn add_arc(&mut self, from: usize, color: Color, to: usize) -> &mut CfaBuilder {
        assert!(from < self.nstates, "arc source out of range");
        assert!(to < self.nstates, "arc target out of range");
        self.arcs[from].push(CArc { color, to: to as u32 });
        self
    }

    /// Designates the setup state.
    pub fn set_pre(&mut self, state: usize) -> &mut CfaBuilder {
        assert!(state < self.nstates, "pre state out of range");
        self.pre = Some(state);
        self
    }

    /// Designates the teardown state.
    pub fn set_post(&mut self, state: usize) -> &mut CfaBuilder {
        assert!(state < self.nstates, "post state out of range");
        self.post = Some(state);
        self
    }

    /// Sets the color consumed for the position before a walk starting at
    /// the true beginning of text.
    pub fn set_bos(&mut self, color: Option<Color>) -> &mut CfaBuilder {
        self.bos[1] = color;
        self
    }

    /// Sets the color consumed instead of [`CfaBuilder::set_bos`]'s when the
    /// caller declared that the buffer start is not a line beginning.
    pub fn set_bol(&mut self, color: Option<Color>) -> &mut CfaBuilder {
        self.bos[0] = color;
        self
    }

    /// Sets the color consumed for the position after a match ending at the
    /// true end of text.
    pub fn set_eos(&mut self, color: Option<Color>) -> &mut CfaBuilder {
        self.eos[1] = color;
        self
    }

    /// Sets the color consumed instead of [`CfaBuilder::set_eos`]'s when the
    /// caller declared that the buffer end is not a line ending.
    pub fn set_eol(&mut self, color: Option<Color>) -> &mut CfaBuilder {
        self.eos[0] = color;
        self
    }

    /// Marks this automaton as only able to match at the beginning of text.
    pub fn left_anchored(&mut self, yes: bool) -> &mut CfaBuilder {
        self.left_anchored = yes;
        self
    }

    /// Marks a state as reachable only without consuming any of the match.
    ///
    /// # Panics
    ///
    /// This panics if `state` is out of range.
    pub fn mark_no_progress(&mut self, state: usize) -> &mut CfaBuilder {
        assert!(state < self.nstates, "state out of range");
        self.no_progress[state] = true;
        self
    }

    /// Builds the automaton.
    ///
    /// # Panics
    ///
    /// This panics if the pre or post state was never designated, or if they
    /// coincide.
    pub fn build(&self) -> Cfa {
        let pre = self.pre.expect("pre state never designated");
        let post = self.post.expect("post state never designated");
        assert!(pre != post, "pre and post states must differ");

        let mut offsets = Vec::with_capacity(self.nstates + 1);
        let mut arcs = Vec::new();
        let mut has_lacons = false;
        offsets.push(0);
        for list in self.arcs.iter() {
            for arc in list.iter() {
                if arc.color as usize >= self.ncolors {
                    has_lacons = true;
                }
                arcs.push(*arc);
            }
            offsets.push(arcs.len() as u32);
        }
        Cfa {
            nstates: self.nstates,
            ncolors: self.ncolors,
            pre,
            post,
            bos: self.bos,
            eos: self.eos,
            left_anchored: self.left_anchored,
            has_lacons,
            no_progress: self.no_progress.clone(),
            offsets,
            arcs,
        }
    }
}
