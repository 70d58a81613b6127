/*!
The compiled pattern object and its subexpression tree.

A [`Pattern`] is the hand-off point between the pattern compiler and this
crate's matching engine: a main automaton (owned by the tree's root node), a
"searchified" variant of it used to locate candidate windows quickly, the
shared color map, a tree describing the pattern's capturing structure, and a
vector of lookahead constraint sub-automata.

Everything here is immutable once [`PatternBuilder::build`] returns, so a
pattern may be matched concurrently from any number of threads; all mutable
match state lives in per-call buffers.
*/

use alloc::vec::Vec;

use core::fmt;

use crate::cfa::Cfa;
use crate::classes::{CharWidth, CodeUnit, Color, ColorMap};
use crate::util::prefilter::Prefilter;

/// Stamp checked at match time to catch callers handing the engine a pattern
/// object that did not come out of a builder in one piece.
pub(crate) const PATTERN_MAGIC: u16 = 0xFED7;

/// The index of a node in a pattern's subexpression tree.
pub type SubId = usize;

/// How backreference content comparison treats case.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compare {
    /// Code units must be identical.
    Exact,
    /// ASCII letters compare equal to their other-case forms. Units outside
    /// ASCII are compared exactly; locale-aware folding is out of scope.
    AsciiCaseInsensitive,
}

impl Compare {
    pub(crate) fn units_eq<U: CodeUnit>(self, a: &[U], b: &[U]) -> bool {
        match self {
            Compare::Exact => a == b,
            Compare::AsciiCaseInsensitive => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(&x, &y)| {
                        fold(x.as_u32()) == fold(y.as_u32())
                    })
            }
        }
    }
}

#[inline]
fn fold(unit: u32) -> u32 {
    if (b'A' as u32) <= unit && unit <= (b'Z' as u32) {
        unit + 0x20
    } else {
        unit
    }
}

/// The operator of a subexpression tree node.
#[derive(Clone, Debug)]
pub(crate) enum SubKind {
    /// A leaf with no capturing structure; the enclosing node has already
    /// verified its span against this node's automaton.
    Terminal,
    /// One branch of an alternation. The left child is the branch body; the
    /// right child, if any, is the next branch in the chain.
    Alt,
    /// A concatenation of the left and right children.
    Concat,
    /// A capturing group recording its child's span.
    Capture { group: usize },
    /// A backreference to a previously captured group, repeated between
    /// `min` and `max` times (`None` meaning unbounded).
    Backref { group: usize, min: u32, max: Option<u32> },
}

pub(crate) struct SubNode {
    pub(crate) kind: SubKind,
    pub(crate) left: Option<SubId>,
    pub(crate) right: Option<SubId>,
    /// This node's own automaton, present wherever a parent needs to run the
    /// node's sub-pattern directly (tree root, concatenation operands,
    /// alternation branches).
    pub(crate) cfa: Option<Cfa>,
    /// Index into the per-call retry memo.
    pub(crate) retry: usize,
    /// True if this node prefers the shortest match (non-greedy).
    pub(crate) shorter: bool,
}

pub(crate) struct SubTree {
    pub(crate) nodes: Vec<SubNode>,
    pub(crate) root: SubId,
}

/// A compiled pattern, ready for matching.
///
/// See the crate documentation for an end-to-end example of assembling one.
pub struct Pattern {
    pub(crate) magic: u16,
    width: CharWidth,
    nsub: usize,
    has_backrefs: bool,
    no_captures: bool,
    impossible: bool,
    pub(crate) tree: SubTree,
    pub(crate) search: Cfa,
    cm: ColorMap,
    pub(crate) lacons: Vec<Lacon>,
    compare: Compare,
    prefilter: Option<Prefilter>,
}

/// A lookahead constraint: a sub-automaton that must (or must not) match
/// starting at the position where the constraint is evaluated.
pub(crate) struct Lacon {
    pub(crate) cfa: Cfa,
    pub(crate) positive: bool,
}

impl Pattern {
    /// Returns a builder for assembling a pattern compiled for the given
    /// code unit width.
    pub fn builder(width: CharWidth) -> PatternBuilder {
        PatternBuilder {
            width,
            nsub: 0,
            no_captures: false,
            impossible: false,
            nodes: Vec::new(),
            root: None,
            search: None,
            cm: None,
            lacons: Vec::new(),
            compare: Compare::Exact,
            prefix: None,
        }
    }

    /// Returns the code unit width this pattern was compiled for.
    #[inline]
    pub fn char_width(&self) -> CharWidth {
        self.width
    }

    /// Returns the number of capturing groups in this pattern, not counting
    /// the implicit whole-match group 0.
    #[inline]
    pub fn group_count(&self) -> usize {
        self.nsub
    }

    /// Returns true if this pattern contains backreferences, which force the
    /// backtracking driver.
    #[inline]
    pub fn has_backrefs(&self) -> bool {
        self.has_backrefs
    }

    #[inline]
    pub(crate) fn is_impossible(&self) -> bool {
        self.impossible
    }

    #[inline]
    pub(crate) fn captures_disabled(&self) -> bool {
        self.no_captures
    }

    #[inline]
    pub(crate) fn color_map(&self) -> &ColorMap {
        &self.cm
    }

    #[inline]
    pub(crate) fn compare(&self) -> Compare {
        self.compare
    }

    #[inline]
    pub(crate) fn prefilter(&self) -> Option<&Prefilter> {
        self.prefilter.as_ref()
    }

    #[inline]
    pub(crate) fn root(&self) -> SubId {
        self.tree.root
    }

    #[inline]
    pub(crate) fn node(&self, id: SubId) -> &SubNode {
        &self.tree.nodes[id]
    }

    #[inline]
    pub(crate) fn node_count(&self) -> usize {
        self.tree.nodes.len()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("width", &self.width)
            .field("nsub", &self.nsub)
            .field("has_backrefs", &self.has_backrefs)
            .field("nodes", &self.tree.nodes.len())
            .field("lacons", &self.lacons.len())
            .finish()
    }
}

/// An error produced when a [`PatternBuilder`] is asked to assemble an
/// inconsistent pattern object.
#[derive(Clone, Debug)]
pub struct BuildError {
    kind: BuildErrorKind,
}

#[derive(Clone, Debug)]
enum BuildErrorKind {
    Incomplete(&'static str),
    Node { index: SubId, reason: &'static str },
    Group { index: SubId, group: usize },
    Lacon { color: Color },
    Colors { have: usize, want: usize },
}

impl BuildError {
    fn incomplete(what: &'static str) -> BuildError {
        BuildError { kind: BuildErrorKind::Incomplete(what) }
    }

    fn node(index: SubId, reason: &'static str) -> BuildError {
        BuildError { kind: BuildErrorKind::Node { index, reason } }
    }

    fn group(index: SubId, group: usize) -> BuildError {
        BuildError { kind: BuildErrorKind::Group { index, group } }
    }

    fn lacon(color: Color) -> BuildError {
        BuildError { kind: BuildErrorKind::Lacon { color } }
    }

    fn colors(have: usize, want: usize) -> BuildError {
        BuildError { kind: BuildErrorKind::Colors { have, want } }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BuildError {}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BuildErrorKind::Incomplete(what) => {
                write!(f, "pattern is missing its {}", what)
            }
            BuildErrorKind::Node { index, reason } => {
                write!(f, "malformed subexpression node {}: {}", index, reason)
            }
            BuildErrorKind::Group { index, group } => {
                write!(
                    f,
                    "subexpression node {} refers to group {} \
                     but the pattern declares fewer groups",
                    index, group,
                )
            }
            BuildErrorKind::Lacon { color } => {
                write!(
                    f,
                    "arc color {} refers to a lookahead constraint \
                     that was never registered",
                    color,
                )
            }
            BuildErrorKind::Colors { have, want } => {
                write!(
                    f,
                    "automaton was compiled against {} colors \
                     but the color map defines {}",
                    have, want,
                )
            }
        }
    }
}

/// A builder for a [`Pattern`].
///
/// This is the contract surface for the pattern compiler: it hands the
/// engine the automata and tree described in the crate documentation, and
/// `build` verifies the structural invariants the engine depends on.
pub struct PatternBuilder {
    width: CharWidth,
    nsub: usize,
    no_captures: bool,
    impossible: bool,
    nodes: Vec<SubNode>,
    root: Option<SubId>,
    search: Option<Cfa>,
    cm: Option<ColorMap>,
    lacons: Vec<Lacon>,
    compare: Compare,
    prefix: Option<u32>,
}

impl PatternBuilder {
    /// Declares the number of capturing groups (excluding group 0).
    pub fn group_count(&mut self, nsub: usize) -> &mut PatternBuilder {
        self.nsub = nsub;
        self
    }

    /// Declares that capturing group results are never wanted for this
    /// pattern, letting the engine skip dissection entirely.
    pub fn no_captures(&mut self, yes: bool) -> &mut PatternBuilder {
        self.no_captures = yes;
        self
    }

    /// Declares that the compiler proved this pattern can never match.
    pub fn impossible(&mut self, yes: bool) -> &mut PatternBuilder {
        self.impossible = yes;
        self
    }

    /// Sets the shared color map.
    pub fn color_map(&mut self, cm: ColorMap) -> &mut PatternBuilder {
        self.cm = Some(cm);
        self
    }

    /// Sets the search automaton used for the coarse candidate-window scan.
    pub fn search(&mut self, cfa: Cfa) -> &mut PatternBuilder {
        self.search = Some(cfa);
        self
    }

    /// Sets the backreference content comparison mode.
    pub fn compare(&mut self, compare: Compare) -> &mut PatternBuilder {
        self.compare = compare;
        self
    }

    /// Declares that every match of this pattern begins with the given code
    /// unit. The engine may use this to skip ahead before running the search
    /// automaton; a wrong hint produces wrong results, so compilers should
    /// only set it when it is a proven property of the pattern.
    pub fn prefix(&mut self, unit: u32) -> &mut PatternBuilder {
        self.prefix = Some(unit);
        self
    }

    /// Registers a lookahead constraint and returns the arc color that
    /// refers to it: the color map's color count plus the constraint's
    /// registration index.
    ///
    /// # Panics
    ///
    /// This panics if the color map has not been set yet; the reference
    /// colors are relative to its color count.
    pub fn lacon(&mut self, cfa: Cfa, positive: bool) -> Color {
        let ncolors = self
            .cm
            .as_ref()
            .expect("set the color map before registering constraints")
            .color_count();
        let color = (ncolors + self.lacons.len()) as Color;
        self.lacons.push(Lacon { cfa, positive });
        color
    }

    /// Adds a terminal node.
    pub fn terminal(&mut self, cfa: Option<Cfa>) -> SubId {
        self.push(SubKind::Terminal, None, None, cfa)
    }

    /// Adds a concatenation node over two previously added children.
    pub fn concat(&mut self, cfa: Cfa, left: SubId, right: SubId) -> SubId {
        self.push(SubKind::Concat, Some(left), Some(right), Some(cfa))
    }

    /// Adds one branch of an alternation. `branch` is the branch body and
    /// `next` the rest of the chain, built right-to-left.
    pub fn alt(&mut self, cfa: Cfa, branch: SubId, next: Option<SubId>) -> SubId {
        self.push(SubKind::Alt, Some(branch), next, Some(cfa))
    }

    /// Adds a capturing node for group `group` over a previously added
    /// child.
    pub fn capture(&mut self, cfa: Cfa, group: usize, child: SubId) -> SubId {
        self.push(SubKind::Capture { group }, Some(child), None, Some(cfa))
    }

    /// Adds a backreference node matching `min..=max` consecutive repeats of
    /// whatever group `group` captured (`max = None` for unbounded).
    pub fn backref(
        &mut self,
        cfa: Cfa,
        group: usize,
        min: u32,
        max: Option<u32>,
    ) -> SubId {
        self.push(SubKind::Backref { group, min, max }, None, None, Some(cfa))
    }

    /// Marks a previously added node as preferring the shortest match.
    pub fn prefer_shorter(&mut self, id: SubId) -> &mut PatternBuilder {
        self.nodes[id].shorter = true;
        self
    }

    /// Designates the tree root. The root node must own the pattern's main
    /// automaton.
    pub fn root(&mut self, id: SubId) -> &mut PatternBuilder {
        self.root = Some(id);
        self
    }

    fn push(
        &mut self,
        kind: SubKind,
        left: Option<SubId>,
        right: Option<SubId>,
        cfa: Option<Cfa>,
    ) -> SubId {
        let id = self.nodes.len();
        self.nodes.push(SubNode { kind, left, right, cfa, retry: id, shorter: false });
        id
    }

    /// Builds the pattern, verifying every structural invariant the matching
    /// engine relies on.
    pub fn build(self) -> Result<Pattern, BuildError> {
        let cm = self.cm.ok_or_else(|| BuildError::incomplete("color map"))?;
        let search = self.search.ok_or_else(|| BuildError::incomplete("search automaton"))?;
        let root = self.root.ok_or_else(|| BuildError::incomplete("tree root"))?;
        if self.nodes.is_empty() {
            return Err(BuildError::incomplete("subexpression tree"));
        }
        if root >= self.nodes.len() {
            return Err(BuildError::node(root, "root is out of range"));
        }
        if self.nodes[root].cfa.is_none() {
            return Err(BuildError::node(root, "root owns no automaton"));
        }

        let ncolors = cm.color_count();
        let mut has_backrefs = false;
        let nodes = &self.nodes;
        for (i, node) in nodes.iter().enumerate() {
            let child_in_range = |c: Option<SubId>| c.map_or(true, |c| c < nodes.len());
            if !child_in_range(node.left) || !child_in_range(node.right) {
                return Err(BuildError::node(i, "child index out of range"));
            }
            let child_cfa = |c: SubId| nodes[c].cfa.is_some();
            match node.kind {
                SubKind::Terminal => {
                    if node.left.is_some() || node.right.is_some() {
                        return Err(BuildError::node(i, "terminal with children"));
                    }
                }
                SubKind::Alt => {
                    let branch = match node.left {
                        None => return Err(BuildError::node(i, "alternation without a branch")),
                        Some(b) => b,
                    };
                    if !child_cfa(branch) {
                        return Err(BuildError::node(i, "alternation branch owns no automaton"));
                    }
                    if let Some(next) = node.right {
                        if !matches!(self.nodes[next].kind, SubKind::Alt) {
                            return Err(BuildError::node(i, "alternation chained to a non-alternation"));
                        }
                    }
                }
                SubKind::Concat => {
                    let (l, r) = match (node.left, node.right) {
                        (Some(l), Some(r)) => (l, r),
                        _ => return Err(BuildError::node(i, "concatenation without two children")),
                    };
                    if !child_cfa(l) || !child_cfa(r) {
                        return Err(BuildError::node(i, "concatenation operand owns no automaton"));
                    }
                }
                SubKind::Capture { group } => {
                    if node.left.is_none() || node.right.is_some() {
                        return Err(BuildError::node(i, "capture must have exactly one child"));
                    }
                    if group < 1 || group > self.nsub {
                        return Err(BuildError::group(i, group));
                    }
                }
                SubKind::Backref { group, min, max } => {
                    has_backrefs = true;
                    if node.left.is_some() || node.right.is_some() {
                        return Err(BuildError::node(i, "backreference with children"));
                    }
                    if group < 1 || group > self.nsub {
                        return Err(BuildError::group(i, group));
                    }
                    if let Some(max) = max {
                        if min > max {
                            return Err(BuildError::node(i, "backreference bounds inverted"));
                        }
                    }
                }
            }
            // Every owned automaton must agree with the shared color map,
            // and its lookahead constraint references must resolve.
            if let Some(ref cfa) = node.cfa {
                check_cfa(cfa, ncolors, self.lacons.len())?;
            }
        }
        check_cfa(&search, ncolors, self.lacons.len())?;
        for lacon in self.lacons.iter() {
            check_cfa(&lacon.cfa, ncolors, self.lacons.len())?;
        }

        Ok(Pattern {
            magic: PATTERN_MAGIC,
            width: self.width,
            nsub: self.nsub,
            has_backrefs,
            no_captures: self.no_captures,
            impossible: self.impossible,
            tree: SubTree { nodes: self.nodes, root },
            search,
            cm,
            lacons: self.lacons,
            compare: self.compare,
            prefilter: self.prefix.map(Prefilter::new),
        })
    }
}

fn check_cfa(
    cfa: &Cfa,
    ncolors: usize,
    nlacons: usize,
) -> Result<(), BuildError> {
    if cfa.color_count() != ncolors {
        return Err(BuildError::colors(cfa.color_count(), ncolors));
    }
    for state in 0..cfa.state_count() {
        for arc in cfa.arcs(state) {
            let co = arc.color as usize;
            if co >= ncolors && co - ncolors >= nlacons {
                return Err(BuildError::lacon(arc.color));
            }
        }
    }
    Ok(())
}
