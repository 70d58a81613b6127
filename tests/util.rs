// A miniature pattern compiler for exercising the engine.
//
// The real compiler is a separate component; tests stand one up from a tiny
// AST instead. Position (Glushkov) construction is used because it yields
// epsilon-free automata directly, which is exactly the compact-automaton
// shape the engine consumes. Backreferences are approximated in the automata
// by repetitions of the referenced subpattern, as the engine expects: the
// automata generate candidates, the backtracking dissection enforces the
// real equal-content semantics.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use regex_exec::{
    Cfa, CharWidth, Color, ColorMap, Compare, Match, Pattern, PatternBuilder,
    SubId, WHITE,
};

#[derive(Clone, Debug)]
pub enum Re {
    Lit(char),
    Seq(Vec<Re>),
    Alt(Vec<Re>),
    Cap(usize, Box<Re>),
    Plus(Box<Re>),
    Star(Box<Re>),
    Shortest(Box<Re>),
    Backref { group: usize, min: u32, max: Option<u32> },
}

pub fn lit(c: char) -> Re {
    Re::Lit(c)
}

pub fn text(s: &str) -> Re {
    Re::Seq(s.chars().map(Re::Lit).collect())
}

pub fn seq(items: Vec<Re>) -> Re {
    Re::Seq(items)
}

pub fn alt(items: Vec<Re>) -> Re {
    Re::Alt(items)
}

pub fn cap(group: usize, re: Re) -> Re {
    Re::Cap(group, Box::new(re))
}

pub fn plus(re: Re) -> Re {
    Re::Plus(Box::new(re))
}

pub fn star(re: Re) -> Re {
    Re::Star(Box::new(re))
}

pub fn shortest(re: Re) -> Re {
    Re::Shortest(Box::new(re))
}

pub fn backref(group: usize) -> Re {
    Re::Backref { group, min: 1, max: Some(1) }
}

pub fn backref_range(group: usize, min: u32, max: Option<u32>) -> Re {
    Re::Backref { group, min, max }
}

#[derive(Clone, Debug)]
pub struct CompileOpts {
    pub width: CharWidth,
    pub prefix: Option<u32>,
    pub no_captures: bool,
    pub compare: Compare,
}

impl Default for CompileOpts {
    fn default() -> CompileOpts {
        CompileOpts {
            width: CharWidth::One,
            prefix: None,
            no_captures: false,
            compare: Compare::Exact,
        }
    }
}

pub fn compile(re: &Re) -> Pattern {
    compile_with(re, &CompileOpts::default())
}

pub fn compile_width(re: &Re, width: CharWidth) -> Pattern {
    compile_with(re, &CompileOpts { width, ..CompileOpts::default() })
}

pub fn compile_with(re: &Re, opts: &CompileOpts) -> Pattern {
    let mut chars = Vec::new();
    collect_chars(re, &mut chars);
    let mut groups = BTreeMap::new();
    let mut nsub = 0;
    collect_groups(re, &mut groups, &mut nsub);

    let mut cmb = ColorMap::builder();
    let mut colors = BTreeMap::new();
    for &c in chars.iter() {
        let color = cmb.add_color();
        cmb.set_unit(c as u32, color);
        // case-insensitive patterns classify both cases alike, so the
        // automata generate the candidates the comparison then accepts
        if matches!(opts.compare, Compare::AsciiCaseInsensitive)
            && c.is_ascii_alphabetic()
        {
            let flipped = if c.is_ascii_lowercase() {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            cmb.set_unit(flipped as u32, color);
        }
        colors.insert(c, color);
    }
    let bos = cmb.add_color();
    let eos = cmb.add_color();
    let cm = cmb.build();

    let compiler = Compiler { colors, bos, eos, ncolors: cm.color_count(), groups };

    let mut pb = Pattern::builder(opts.width);
    pb.group_count(nsub);
    pb.no_captures(opts.no_captures);
    pb.compare(opts.compare);
    if let Some(prefix) = opts.prefix {
        pb.prefix(prefix);
    }
    pb.search(compiler.cfa(re, true));
    let root = compiler.node(&mut pb, re);
    pb.root(root);
    pb.color_map(cm);
    pb.build().expect("test pattern must assemble")
}

fn collect_chars(re: &Re, out: &mut Vec<char>) {
    match re {
        Re::Lit(c) => {
            if !out.contains(c) {
                out.push(*c);
            }
        }
        Re::Seq(items) | Re::Alt(items) => {
            for item in items {
                collect_chars(item, out);
            }
        }
        Re::Cap(_, body) | Re::Plus(body) | Re::Star(body) | Re::Shortest(body) => {
            collect_chars(body, out)
        }
        Re::Backref { .. } => {}
    }
}

fn collect_groups(re: &Re, out: &mut BTreeMap<usize, Re>, nsub: &mut usize) {
    match re {
        Re::Lit(_) | Re::Backref { .. } => {}
        Re::Seq(items) | Re::Alt(items) => {
            for item in items {
                collect_groups(item, out, nsub);
            }
        }
        Re::Cap(group, body) => {
            *nsub = (*nsub).max(*group);
            out.insert(*group, (**body).clone());
            collect_groups(body, out, nsub);
        }
        Re::Plus(body) | Re::Star(body) | Re::Shortest(body) => {
            collect_groups(body, out, nsub)
        }
    }
}

fn has_structure(re: &Re) -> bool {
    match re {
        Re::Lit(_) => false,
        // a shortest preference must land on a tree node of its own
        Re::Cap(..) | Re::Backref { .. } | Re::Shortest(_) => true,
        Re::Seq(items) | Re::Alt(items) => items.iter().any(has_structure),
        Re::Plus(body) | Re::Star(body) => has_structure(body),
    }
}

struct Compiler {
    colors: BTreeMap<char, Color>,
    bos: Color,
    eos: Color,
    ncolors: usize,
    groups: BTreeMap<usize, Re>,
}

/// The capture-free skeleton the automata are built from.
#[derive(Clone, Debug)]
enum G {
    Empty,
    Lit(Color),
    Seq(Vec<G>),
    Alt(Vec<G>),
    Plus(Box<G>),
    Star(Box<G>),
}

impl Compiler {
    /// Strips capturing structure and expands backreferences into
    /// repetitions of the referenced subpattern.
    fn skeleton(&self, re: &Re) -> G {
        match re {
            Re::Lit(c) => G::Lit(self.colors[c]),
            Re::Seq(items) => {
                G::Seq(items.iter().map(|i| self.skeleton(i)).collect())
            }
            Re::Alt(items) => {
                G::Alt(items.iter().map(|i| self.skeleton(i)).collect())
            }
            Re::Cap(_, body) | Re::Shortest(body) => self.skeleton(body),
            Re::Plus(body) => G::Plus(Box::new(self.skeleton(body))),
            Re::Star(body) => G::Star(Box::new(self.skeleton(body))),
            Re::Backref { group, min, max } => {
                let body = self
                    .groups
                    .get(group)
                    .expect("backreference to an undeclared group");
                repeat(self.skeleton(body), *min, *max)
            }
        }
    }

    /// Builds the position automaton of a subpattern, wrapped in the
    /// engine's pre/post convention. With `search` set, the pre state also
    /// loops so a walk can begin anywhere at or after its start.
    fn cfa(&self, re: &Re, search: bool) -> Cfa {
        let gl = Glushkov::new(&self.skeleton(re));
        let npos = gl.color.len();
        let (pre, init, post) = (0, 1, npos + 2);
        let pos = |p: usize| p + 2;

        let mut rainbow: Vec<Color> = vec![WHITE];
        rainbow.extend(self.colors.values().copied());

        let mut arcs = BTreeSet::new();
        for &co in rainbow.iter().chain(Some(&self.bos)) {
            arcs.insert((pre, co, init));
            if search {
                arcs.insert((pre, co, pre));
            }
        }
        for &p in gl.first.iter() {
            arcs.insert((init, gl.color[p], pos(p)));
        }
        for p in 0..npos {
            for &q in gl.follow[p].iter() {
                arcs.insert((pos(p), gl.color[q], pos(q)));
            }
        }
        for &p in gl.last.iter() {
            for &co in rainbow.iter().chain(Some(&self.eos)) {
                arcs.insert((pos(p), co, post));
            }
        }
        if gl.nullable {
            for &co in rainbow.iter().chain(Some(&self.eos)) {
                arcs.insert((init, co, post));
            }
        }

        let mut b = Cfa::builder(npos + 3, self.ncolors);
        b.set_pre(pre).set_post(post);
        b.set_bos(Some(self.bos)).set_bol(Some(self.bos));
        b.set_eos(Some(self.eos)).set_eol(Some(self.eos));
        b.mark_no_progress(pre).mark_no_progress(init);
        for (from, co, to) in arcs {
            b.add_arc(from, co, to);
        }
        b.build()
    }

    /// Builds the subexpression tree node for a subpattern.
    fn node(&self, pb: &mut PatternBuilder, re: &Re) -> SubId {
        if !has_structure(re) {
            return pb.terminal(Some(self.cfa(re, false)));
        }
        match re {
            Re::Seq(items) => match items.len() {
                0 => pb.terminal(Some(self.cfa(re, false))),
                1 => self.node(pb, &items[0]),
                _ => {
                    let left = self.node(pb, &items[0]);
                    let rest = Re::Seq(items[1..].to_vec());
                    let right = self.node(pb, &rest);
                    pb.concat(self.cfa(re, false), left, right)
                }
            },
            Re::Alt(items) => {
                assert!(!items.is_empty(), "empty alternation");
                let mut next = None;
                for (i, item) in items.iter().enumerate().rev() {
                    let branch = self.node(pb, item);
                    let tail = Re::Alt(items[i..].to_vec());
                    next = Some(pb.alt(self.cfa(&tail, false), branch, next));
                }
                next.unwrap()
            }
            Re::Cap(group, body) => {
                let child = self.node(pb, body);
                let id = pb.capture(self.cfa(body, false), *group, child);
                // a capture around non-greedy content is itself non-greedy
                if matches!(**body, Re::Shortest(_)) {
                    pb.prefer_shorter(id);
                }
                id
            }
            Re::Shortest(body) => {
                let id = self.node(pb, body);
                pb.prefer_shorter(id);
                id
            }
            Re::Backref { group, min, max } => {
                pb.backref(self.cfa(re, false), *group, *min, *max)
            }
            Re::Plus(_) | Re::Star(_) => {
                panic!("captures inside repetition are not supported by the test harness")
            }
            Re::Lit(_) => unreachable!("literals have no structure"),
        }
    }
}

/// Expands a bounded repetition into the skeleton language.
fn repeat(g: G, min: u32, max: Option<u32>) -> G {
    let mut items = Vec::new();
    for _ in 0..min {
        items.push(g.clone());
    }
    match max {
        None => {
            if min == 0 {
                return G::Star(Box::new(g));
            }
            let last = items.pop().unwrap();
            items.push(G::Plus(Box::new(last)));
        }
        Some(max) => {
            assert!(min <= max, "inverted repetition bounds");
            for _ in min..max {
                items.push(G::Alt(vec![g.clone(), G::Empty]));
            }
        }
    }
    if items.len() == 1 {
        items.pop().unwrap()
    } else {
        G::Seq(items)
    }
}

/// The standard position-automaton quantities.
struct Glushkov {
    color: Vec<Color>,
    follow: Vec<Vec<usize>>,
    first: Vec<usize>,
    last: Vec<usize>,
    nullable: bool,
}

impl Glushkov {
    fn new(g: &G) -> Glushkov {
        let mut gl = Glushkov {
            color: Vec::new(),
            follow: Vec::new(),
            first: Vec::new(),
            last: Vec::new(),
            nullable: false,
        };
        let (nullable, first, last) = gl.go(g);
        gl.nullable = nullable;
        gl.first = first;
        gl.last = last;
        gl
    }

    fn go(&mut self, g: &G) -> (bool, Vec<usize>, Vec<usize>) {
        match g {
            G::Empty => (true, Vec::new(), Vec::new()),
            G::Lit(color) => {
                let p = self.color.len();
                self.color.push(*color);
                self.follow.push(Vec::new());
                (false, vec![p], vec![p])
            }
            G::Seq(items) => {
                let mut nullable = true;
                let mut first = Vec::new();
                let mut last: Vec<usize> = Vec::new();
                for item in items {
                    let (n2, f2, l2) = self.go(item);
                    for &p in last.iter() {
                        for &q in f2.iter() {
                            self.follow[p].push(q);
                        }
                    }
                    if nullable {
                        first.extend_from_slice(&f2);
                    }
                    if n2 {
                        last.extend_from_slice(&l2);
                    } else {
                        last = l2;
                    }
                    nullable = nullable && n2;
                }
                (nullable, first, last)
            }
            G::Alt(items) => {
                let mut nullable = false;
                let mut first = Vec::new();
                let mut last = Vec::new();
                for item in items {
                    let (n2, f2, l2) = self.go(item);
                    nullable = nullable || n2;
                    first.extend_from_slice(&f2);
                    last.extend_from_slice(&l2);
                }
                (nullable, first, last)
            }
            G::Plus(body) => {
                let (nullable, first, last) = self.go(body);
                for &p in last.iter() {
                    for &q in first.iter() {
                        self.follow[p].push(q);
                    }
                }
                (nullable, first, last)
            }
            G::Star(body) => {
                let (_, first, last) = self.go(body);
                for &p in last.iter() {
                    for &q in first.iter() {
                        self.follow[p].push(q);
                    }
                }
                (true, first, last)
            }
        }
    }
}

/// Runs a match and returns `(group0, group1, ...)` spans, `None` on no
/// match.
pub fn find_spans(
    pat: &Pattern,
    haystack: &[u8],
    ngroups: usize,
) -> Option<Vec<Option<(usize, usize)>>> {
    let mut caps: Vec<Option<Match>> = vec![None; ngroups];
    let found = pat.find(haystack, &mut caps).expect("match must not error");
    found?;
    Some(caps.iter().map(|m| m.map(|m| (m.start(), m.end()))).collect())
}
