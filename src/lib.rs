/*!
Match execution and capture dissection for compiled regex automata.

This crate is the back half of a regex implementation: it takes a pattern
that has *already* been compiled — a compact color-labeled automaton plus a
tree describing the pattern's capturing structure — and executes it against
a haystack, reporting whether and where the pattern matches and the span of
every capturing group. Pattern text parsing and automaton construction are
someone else's job; the [`PatternBuilder`] is the hand-off contract.

# How matching works

The automata are nondeterministic, so execution walks *sets* of states. The
walker discovers reachable state sets lazily and memoizes them in a small
per-call cache, giving DFA-like scanning speed without determinizing
anything up front; the cache's capacity and eviction policy affect only
performance, never results.

Locating a match takes two automata: a "searchified" variant scans for the
earliest candidate window, then the real automaton pins down the match
bounds from each plausible start. Capturing groups are recovered afterwards
by *dissection*: a structural walk of the subexpression tree that re-runs
node automata over sub-spans. For patterns without backreferences this is a
single deterministic pass. With backreferences the automata only see a
structural approximation of the pattern, so candidate spans must be
confirmed by a memoized backtracking dissection that remembers, per node,
what it already tried.

# Example

Everything below the builder calls is normally emitted by a pattern
compiler; spelled out by hand, the pattern `ab` looks like this:

```
use regex_exec::{CharWidth, Cfa, ColorMap, Pattern, WHITE};

// 'a' and 'b' get color classes of their own; begin/end of text get
// pseudo colors that classify no unit.
let mut cmb = ColorMap::builder();
let ca = cmb.add_color();
let cb = cmb.add_color();
let bos = cmb.add_color();
let eos = cmb.add_color();
cmb.set_unit(b'a' as u32, ca);
cmb.set_unit(b'b' as u32, cb);
let cm = cmb.build();

// The automaton for `ab`: entry consumes one lookaround color (anything,
// or begin-of-text), then `a`, then `b`, then anything (or end-of-text)
// carries it into the accepting post state.
let build = |search: bool| {
    let mut b = Cfa::builder(5, cm.color_count());
    b.set_pre(0).set_post(4);
    b.set_bos(Some(bos)).set_bol(Some(bos));
    b.set_eos(Some(eos)).set_eol(Some(eos));
    for &co in &[WHITE, ca, cb, bos] {
        b.add_arc(0, co, 1);
        if search {
            // the searchified form stays ready to start one unit later
            b.add_arc(0, co, 0);
        }
    }
    b.add_arc(1, ca, 2);
    b.add_arc(2, cb, 3);
    for &co in &[WHITE, ca, cb, eos] {
        b.add_arc(3, co, 4);
    }
    b.mark_no_progress(0).mark_no_progress(1);
    b.build()
};

let mut pb = Pattern::builder(CharWidth::One);
pb.search(build(true));
let root = pb.terminal(Some(build(false)));
pb.root(root);
pb.color_map(cm);
let pattern = pb.build()?;

let mut caps = [None; 1];
let m = pattern.find(&b"xxabxx"[..], &mut caps)?.unwrap();
assert_eq!((m.start(), m.end()), (2, 4));
# Ok::<(), Box<dyn std::error::Error>>(())
```

# Concurrency

A [`Pattern`] is immutable after construction and safe to match from many
threads at once; every match call owns all of its mutable state (group
vector, retry memo, automaton caches) and releases it on every exit path.

# Crate features

* **std** - Enabled by default. Implements `std::error::Error` for this
crate's error types. Without it, the crate is `no_std` (but still requires
`alloc`).
* **logging** - Emits trace-level diagnostics via the `log` crate. Disabled
by default.
*/

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use crate::{
    cfa::{Cfa, CfaBuilder},
    classes::{
        CharWidth, CodeUnit, Color, ColorMap, ColorMapBuilder, MAX_COLORS,
        WHITE,
    },
    exec::{Exec, ExecOptions, Extend},
    pattern::{BuildError, Compare, Pattern, PatternBuilder, SubId},
    util::matchtypes::{ExecError, Match},
};

#[macro_use]
mod macros;

mod cfa;
mod classes;
mod dfa;
mod exec;
mod pattern;
pub mod util;
