// Scenario coverage for both drivers: window search, boundary pinning,
// dissection, backreferences, preferences, lookahead constraints, widths
// and per-call options.

use bstr::ByteSlice;

use regex_exec::{
    Cfa, CharWidth, Compare, ExecOptions, Match, Pattern, WHITE,
};

use crate::util::{
    alt, backref, backref_range, cap, compile, compile_width, compile_with,
    find_spans, lit, plus, seq, shortest, star, text, CompileOpts, Re,
};

/// The pattern `a(b|c)d`.
fn concat_alt() -> Re {
    seq(vec![lit('a'), cap(1, alt(vec![lit('b'), lit('c')])), lit('d')])
}

#[test]
fn concat_alternation_matches_with_groups() {
    let pat = compile(&concat_alt());
    let hay = b"xabdx";
    assert_eq!(
        find_spans(&pat, hay, 2),
        Some(vec![Some((1, 4)), Some((2, 3))]),
        "haystack {:?}",
        hay.as_bstr(),
    );
    // the other branch
    assert_eq!(
        find_spans(&pat, b"acd", 2),
        Some(vec![Some((0, 3)), Some((1, 2))]),
    );
}

#[test]
fn no_match_leaves_the_sentinel_default() {
    let pat = compile(&concat_alt());
    let mut caps: [Option<Match>; 2] = [None, None];
    let found = pat.find(&b"xyz"[..], &mut caps).unwrap();
    assert_eq!(found, None);
    assert_eq!(caps, [None, None]);
}

#[test]
fn backref_splits_a_run_evenly() {
    // `(a+)\1` over "aaaa": the automata accept any 2+ run; only the
    // dissection can decide the capture must be the first half
    let pat = compile(&seq(vec![cap(1, plus(lit('a'))), backref(1)]));
    assert!(pat.has_backrefs());
    assert_eq!(
        find_spans(&pat, b"aaaa", 2),
        Some(vec![Some((0, 4)), Some((0, 2))]),
    );
    // an odd run forces the whole match shorter than the automata's
    // longest candidate
    assert_eq!(
        find_spans(&pat, b"aaa", 2),
        Some(vec![Some((0, 2)), Some((0, 1))]),
    );
    assert_eq!(find_spans(&pat, b"a", 2), None);
    assert_eq!(find_spans(&pat, b"bbbb", 2), None);
}

#[test]
fn backref_requires_equal_content() {
    let pat = compile(&seq(vec![
        cap(1, alt(vec![lit('a'), lit('b')])),
        backref(1),
    ]));
    assert_eq!(
        find_spans(&pat, b"bb", 2),
        Some(vec![Some((0, 2)), Some((0, 1))]),
    );
    // `(a|b)\1` is not `(a|b)(a|b)`
    assert_eq!(find_spans(&pat, b"ab", 2), None);
}

#[test]
fn backref_repetition_bounds_are_enforced() {
    // `(a)\1{2,3}`
    let pat = compile(&seq(vec![
        cap(1, lit('a')),
        backref_range(1, 2, Some(3)),
    ]));
    assert_eq!(
        find_spans(&pat, b"aaa", 2),
        Some(vec![Some((0, 3)), Some((0, 1))]),
    );
    assert_eq!(
        find_spans(&pat, b"aaaa", 2),
        Some(vec![Some((0, 4)), Some((0, 1))]),
    );
    assert_eq!(find_spans(&pat, b"aa", 2), None);
}

#[test]
fn leftmost_longest_picks_the_working_branch() {
    // `(ab|a)b` over "ab": the first branch would starve the trailing
    // literal, so dissection must settle on the second
    let pat = compile(&seq(vec![
        cap(1, alt(vec![text("ab"), lit('a')])),
        lit('b'),
    ]));
    assert_eq!(
        find_spans(&pat, b"ab", 2),
        Some(vec![Some((0, 2)), Some((0, 1))]),
    );
    // with room, the longer branch wins
    assert_eq!(
        find_spans(&pat, b"abb", 2),
        Some(vec![Some((0, 3)), Some((0, 2))]),
    );
}

#[test]
fn shortest_preference_at_the_root() {
    let pat = compile(&shortest(plus(lit('a'))));
    assert_eq!(find_spans(&pat, b"aaa", 1), Some(vec![Some((0, 1))]));
}

#[test]
fn shortest_preference_under_a_backref() {
    // `(a+?)\1`: the reversed dissection grows the capture from the
    // shortest split up
    let pat = compile(&seq(vec![
        cap(1, shortest(plus(lit('a')))),
        backref(1),
    ]));
    assert_eq!(
        find_spans(&pat, b"aaaa", 2),
        Some(vec![Some((0, 4)), Some((0, 2))]),
    );
}

#[test]
fn shortest_preference_in_simple_concat() {
    // `(a+?)(a+)` has no backreferences, so the non-backtracking
    // dissection must handle the shortest-preferring left operand
    let pat = compile(&seq(vec![
        cap(1, shortest(plus(lit('a')))),
        cap(2, plus(lit('a'))),
    ]));
    assert_eq!(
        find_spans(&pat, b"aaa", 3),
        Some(vec![Some((0, 3)), Some((0, 1)), Some((1, 3))]),
    );
}

#[test]
fn empty_match_from_a_star() {
    let pat = compile(&star(lit('a')));
    assert_eq!(find_spans(&pat, b"bbb", 1), Some(vec![Some((0, 0))]));
    // leftmost beats longest: the empty match at 0 wins over the run at 1
    assert_eq!(find_spans(&pat, b"baab", 1), Some(vec![Some((0, 0))]));
    assert_eq!(find_spans(&pat, b"", 1), Some(vec![Some((0, 0))]));
}

#[test]
fn plus_takes_the_longest_run() {
    let pat = compile(&plus(lit('a')));
    assert_eq!(find_spans(&pat, b"baaab", 1), Some(vec![Some((1, 4))]));
    assert_eq!(find_spans(&pat, b"", 1), None);
}

#[test]
fn case_insensitive_backref_compare() {
    let re = seq(vec![cap(1, plus(lit('a'))), backref(1)]);
    let pat = compile_with(
        &re,
        &CompileOpts {
            compare: Compare::AsciiCaseInsensitive,
            ..CompileOpts::default()
        },
    );
    assert_eq!(
        find_spans(&pat, b"aA", 2),
        Some(vec![Some((0, 2)), Some((0, 1))]),
    );
    // exact comparison rejects the same haystack
    let exact = compile(&re);
    assert_eq!(find_spans(&exact, b"aA", 2), None);
}

#[test]
fn no_captures_pattern_still_locates_the_match() {
    let pat = compile_with(
        &concat_alt(),
        &CompileOpts { no_captures: true, ..CompileOpts::default() },
    );
    let mut caps: [Option<Match>; 2] = [Some(Match::new(9, 9)); 2];
    let exec =
        pat.exec(&b"xabdx"[..], &mut caps, &ExecOptions::new()).unwrap();
    assert_eq!(exec.found(), Some(Match::new(1, 4)));
    // the requested count is overridden to zero: everything resets to the
    // unmatched sentinel
    assert_eq!(caps, [None, None]);
}

#[test]
fn sixteen_and_thirty_two_bit_haystacks() {
    let re = seq(vec![lit('a'), lit('b')]);
    let pat16 = compile_width(&re, CharWidth::Two);
    let hay16: &[u16] = &[b'x' as u16, b'a' as u16, b'b' as u16];
    let mut caps = [None; 1];
    let m = pat16.find(hay16, &mut caps).unwrap().unwrap();
    assert_eq!((m.start(), m.end()), (1, 3));

    let pat32 = compile_width(&re, CharWidth::Four);
    let hay32: &[u32] = &[b'a' as u32, b'b' as u32, b'z' as u32];
    let m = pat32.find(hay32, &mut caps).unwrap().unwrap();
    assert_eq!((m.start(), m.end()), (0, 2));

    // units beyond the dense color table
    let wide = compile_width(
        &seq(vec![lit('\u{1234}'), lit('x')]),
        CharWidth::Two,
    );
    let hay: &[u16] = &[0x20, 0x1234, b'x' as u16];
    let m = wide.find(hay, &mut caps).unwrap().unwrap();
    assert_eq!((m.start(), m.end()), (1, 3));
}

#[test]
fn width_mismatch_is_an_error_not_a_no_match() {
    let pat = compile(&text("ab"));
    let hay16: &[u16] = &[b'a' as u16, b'b' as u16];
    let err = pat.find(hay16, &mut []).unwrap_err();
    assert!(err.is_mixed_width());
}

#[test]
fn prefilter_hint_changes_nothing() {
    let plain = compile(&text("abc"));
    let hinted = compile_with(
        &text("abc"),
        &CompileOpts { prefix: Some(b'a' as u32), ..CompileOpts::default() },
    );
    for hay in [
        &b""[..],
        &b"abc"[..],
        &b"xxabc"[..],
        &b"ababc"[..],
        &b"abd"[..],
        &b"xaxbxc"[..],
    ]
    .iter()
    {
        let mut caps_a = [None; 1];
        let mut caps_b = [None; 1];
        let a = plain.find(*hay, &mut caps_a).unwrap();
        let b = hinted.find(*hay, &mut caps_b).unwrap();
        assert_eq!(a, b, "haystack {:?}", hay.as_bstr());
        assert_eq!(caps_a, caps_b);
    }
}

#[test]
fn extend_report_points_at_the_pending_start() {
    let pat = compile(&text("abc"));
    let opts = ExecOptions::new().want_extend(true);

    // a prefix of the pattern is pending at position 2
    let mut caps = [None; 1];
    let exec = pat.exec(&b"xxab"[..], &mut caps, &opts).unwrap();
    assert_eq!(exec.found(), None);
    assert_eq!(exec.extend().map(|e| (e.start(), e.end())), Some((2, 4)));

    // nothing pending at all
    let exec = pat.exec(&b"xxq"[..], &mut caps, &opts).unwrap();
    assert_eq!(exec.found(), None);
    assert_eq!(exec.extend().map(|e| e.start()), Some(3));

    // found, and still extendable at the match start
    let exec = pat.exec(&b"abc"[..], &mut caps, &opts).unwrap();
    assert_eq!(exec.found(), Some(Match::new(0, 3)));
    assert_eq!(exec.extend().map(|e| e.start()), Some(0));
}

#[test]
fn is_match_skips_location_work() {
    let pat = compile(&concat_alt());
    assert!(pat.is_match(&b"xabdx"[..]).unwrap());
    assert!(!pat.is_match(&b"xyz"[..]).unwrap());
    let br = compile(&seq(vec![cap(1, plus(lit('a'))), backref(1)]));
    assert!(br.is_match(&b"xxaaxx"[..]).unwrap());
    assert!(!br.is_match(&b"xaxax"[..]).unwrap());
}

#[test]
fn deep_alternation_chains_backtrack_correctly() {
    // `(ad|ab|a)(bc|c)` over "abc": the first viable pairing is
    // (ab, c); a sibling failure must re-enter the left alternation
    let pat = compile(&seq(vec![
        cap(1, alt(vec![text("ad"), text("ab"), lit('a')])),
        cap(2, alt(vec![text("bc"), lit('c')])),
    ]));
    assert_eq!(
        find_spans(&pat, b"abc", 3),
        Some(vec![Some((0, 3)), Some((0, 2)), Some((2, 3))]),
    );
    // here the left must fall all the way through to its third branch
    assert_eq!(
        find_spans(&pat, b"abcx", 3),
        Some(vec![Some((0, 3)), Some((0, 2)), Some((2, 3))]),
    );
}

// Hand-assembled patterns with lookahead constraints; the test compiler
// does not generate these.
mod lookahead {
    use super::*;

    // colors for `a(?=b)` over the {a, b} alphabet
    const CA: u16 = 1;
    const CB: u16 = 2;
    const BOS: u16 = 3;
    const EOS: u16 = 4;
    const NCOLORS: usize = 5;
    const LACON: u16 = 5;

    fn body_cfa(search: bool) -> Cfa {
        let mut b = Cfa::builder(5, NCOLORS);
        b.set_pre(0).set_post(4);
        b.set_bos(Some(BOS)).set_bol(Some(BOS));
        b.set_eos(Some(EOS)).set_eol(Some(EOS));
        for &co in &[WHITE, CA, CB, BOS] {
            b.add_arc(0, co, 1);
            if search {
                b.add_arc(0, co, 0);
            }
        }
        b.add_arc(1, CA, 2);
        // the constraint gate: no text is consumed crossing it
        b.add_arc(2, LACON, 3);
        for &co in &[WHITE, CA, CB, EOS] {
            b.add_arc(3, co, 4);
        }
        b.mark_no_progress(0).mark_no_progress(1);
        b.build()
    }

    fn lacon_cfa() -> Cfa {
        let mut b = Cfa::builder(4, NCOLORS);
        b.set_pre(0).set_post(3);
        b.set_bos(Some(BOS)).set_bol(Some(BOS));
        b.set_eos(Some(EOS)).set_eol(Some(EOS));
        for &co in &[WHITE, CA, CB, BOS] {
            b.add_arc(0, co, 1);
        }
        b.add_arc(1, CB, 2);
        for &co in &[WHITE, CA, CB, EOS] {
            b.add_arc(2, co, 3);
        }
        b.mark_no_progress(0).mark_no_progress(1);
        b.build()
    }

    fn pattern(positive: bool) -> Pattern {
        let mut cmb = regex_exec::ColorMap::builder();
        let ca = cmb.add_color();
        let cb = cmb.add_color();
        let _bos = cmb.add_color();
        let _eos = cmb.add_color();
        cmb.set_unit(b'a' as u32, ca);
        cmb.set_unit(b'b' as u32, cb);
        let mut pb = Pattern::builder(CharWidth::One);
        pb.color_map(cmb.build());
        let gate = pb.lacon(lacon_cfa(), positive);
        assert_eq!(gate, LACON);
        pb.search(body_cfa(true));
        let root = pb.terminal(Some(body_cfa(false)));
        pb.root(root);
        pb.build().unwrap()
    }

    #[test]
    fn positive_lookahead() {
        let pat = pattern(true);
        assert_eq!(find_spans(&pat, b"ab", 1), Some(vec![Some((0, 1))]));
        assert_eq!(find_spans(&pat, b"ac", 1), None);
        assert_eq!(find_spans(&pat, b"a", 1), None);
        assert_eq!(find_spans(&pat, b"xaab", 1), Some(vec![Some((2, 3))]));
    }

    #[test]
    fn negative_lookahead() {
        let pat = pattern(false);
        assert_eq!(find_spans(&pat, b"ac", 1), Some(vec![Some((0, 1))]));
        assert_eq!(find_spans(&pat, b"ab", 1), None);
        // at the end of text the constraint cannot match, so it holds
        assert_eq!(find_spans(&pat, b"a", 1), Some(vec![Some((0, 1))]));
    }
}

// A hand-assembled left-anchored pattern (`^a`); anchoring shows up as a
// pre state reachable only through the begin-of-text color.
mod anchored {
    use super::*;

    const CA: u16 = 1;
    const BOS: u16 = 2;
    const EOS: u16 = 3;

    fn pattern() -> Pattern {
        let cfa = || {
            let mut b = Cfa::builder(4, 4);
            b.set_pre(0).set_post(3);
            b.set_bos(Some(BOS)).set_bol(None);
            b.set_eos(Some(EOS)).set_eol(Some(EOS));
            b.left_anchored(true);
            b.add_arc(0, BOS, 1);
            b.add_arc(1, CA, 2);
            for &co in &[WHITE, CA, EOS] {
                b.add_arc(2, co, 3);
            }
            b.mark_no_progress(0).mark_no_progress(1);
            b.build()
        };
        let mut cmb = regex_exec::ColorMap::builder();
        let ca = cmb.add_color();
        let _bos = cmb.add_color();
        let _eos = cmb.add_color();
        cmb.set_unit(b'a' as u32, ca);
        let mut pb = Pattern::builder(CharWidth::One);
        pb.color_map(cmb.build());
        // anchored patterns need no scan loop; the search form is the
        // pattern itself
        pb.search(cfa());
        let root = pb.terminal(Some(cfa()));
        pb.root(root);
        pb.build().unwrap()
    }

    #[test]
    fn matches_only_at_the_start() {
        let pat = pattern();
        assert_eq!(find_spans(&pat, b"ab", 1), Some(vec![Some((0, 1))]));
        assert_eq!(find_spans(&pat, b"ba", 1), None);
    }

    #[test]
    fn not_bol_turns_the_start_off() {
        let pat = pattern();
        let mut caps = [None; 1];
        let opts = ExecOptions::new().not_bol(true);
        let exec = pat.exec(&b"ab"[..], &mut caps, &opts).unwrap();
        assert_eq!(exec.found(), None);
    }
}
