/*!
The lazy automaton walker and its per-call cache.

A [`Cfa`](crate::Cfa) is nondeterministic: a walk is over *sets* of states.
Determinizing a whole automaton up front is wasted work for the handful of
state sets a typical match visits, so the walker here discovers state sets
lazily: each time it needs a transition it has not seen, it computes the
target set once (a "miss"), stores it in a fixed-capacity cache, and from
then on follows a plain table lookup. When the cache fills up, a low-value
entry is evicted and recomputed on demand if ever needed again; eviction can
only cost time, never change a result.

The cache is strictly per match call. It is created empty (or reset from a
previous automaton's use within the same call), consulted by the two walk
shapes the drivers need — [`Dfa::longest`] and [`Dfa::shortest`] — and
dropped with the call. Nothing here is shared across calls or threads.

Positions reported by walks account for the automaton's one-unit lookaround
skew: a walk consumes one color for the position *before* its starting point
(the begin-of-text color, or the preceding unit's color), and accepting
state sets are entered by consuming the unit *after* the match (or the
end-of-text color at the buffer's edge).
*/

use alloc::vec::Vec;

use crate::cfa::Cfa;
use crate::classes::{CodeUnit, Color, ColorMap};
use crate::pattern::Lacon;
use crate::util::matchtypes::ExecError;

/// The minimum number of state sets a cache must hold.
///
/// Below this, a walk could find itself with no evictable entry: the starter
/// set is locked, the set being extended is protected, and the newly built
/// set needs a slot of its own.
const MIN_CACHE_ENTRIES: usize = 5;

/// State set flags.
const STARTER: u8 = 1 << 0;
const POSTSTATE: u8 = 1 << 1;
const LOCKED: u8 = 1 << 2;
const NOPROGRESS: u8 = 1 << 3;

/// A haystack together with the caller's boundary declarations.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Text<'h, U: CodeUnit> {
    pub(crate) units: &'h [U],
    pub(crate) not_bol: bool,
    pub(crate) not_eol: bool,
}

/// The result of a longest-match walk.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Longest {
    /// The last position at which the automaton accepted, if any.
    pub(crate) end: Option<usize>,
    /// True if the walk was still viable when it ran out of buffer, i.e. a
    /// longer buffer might have produced a different (longer) answer.
    pub(crate) hit_stop: bool,
}

/// The result of a shortest-match walk.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Shortest {
    /// The first position at or after the requested minimum at which the
    /// automaton accepted, if any.
    pub(crate) end: Option<usize>,
    /// The last position at which the walk had made no progress into an
    /// actual match: the earliest plausible match start. `None` if the walk
    /// died before its bookkeeping was meaningful.
    pub(crate) cold: Option<usize>,
    /// True if the walk ran out of buffer before it could settle the
    /// outcome.
    pub(crate) hit_stop: bool,
}

/// One cached state set's metadata. The set's bitvector and out-transition
/// row live in the [`Cache`]'s flat arenas at the same index.
#[derive(Clone, Debug)]
struct Entry {
    hash: u64,
    flags: u8,
    /// The last walk position at which this set was current. Reset at the
    /// start of every walk; feeds acceptance and cold-start bookkeeping as
    /// well as the eviction heuristic.
    last_seen: Option<usize>,
}

/// Reusable storage for one automaton's discovered state sets.
///
/// A cache may be reset and reused for a different automaton within the
/// same match call; the two drivers do exactly that with their scratch
/// pair.
#[derive(Clone, Debug)]
pub(crate) struct Cache {
    entries: Vec<Entry>,
    /// `capacity * words_per` bitvector words; row `i` is entry `i`'s set.
    bits: Vec<u64>,
    /// `capacity * ncolors` cached transitions; `None` means not computed.
    outs: Vec<Option<u32>>,
    /// Scratch bitvector for building candidate sets.
    work: Vec<u64>,
    words_per: usize,
    ncolors: usize,
    capacity: usize,
    /// Greatest `last_seen` among evicted accepting sets this walk.
    last_post: Option<usize>,
    /// Greatest `last_seen` among evicted no-progress sets this walk.
    last_nopr: Option<usize>,
    /// Clock hand for the eviction scan.
    search: usize,
}

impl Cache {
    pub(crate) fn new() -> Cache {
        Cache {
            entries: Vec::new(),
            bits: Vec::new(),
            outs: Vec::new(),
            work: Vec::new(),
            words_per: 0,
            ncolors: 0,
            capacity: 0,
            last_post: None,
            last_nopr: None,
            search: 0,
        }
    }

    /// Re-targets this cache at the given automaton, discarding all cached
    /// sets. Storage allocation is the one failure mode a match call can
    /// recover from gracefully, so it is fallible.
    fn reset(&mut self, cfa: &Cfa, capacity: Option<usize>) -> Result<(), ExecError> {
        let nstates = cfa.state_count();
        let ncolors = cfa.color_count();
        let capacity = core::cmp::max(
            capacity.unwrap_or(2 * nstates),
            MIN_CACHE_ENTRIES,
        );
        let words_per = (nstates + 63) / 64;

        self.entries.clear();
        self.bits.clear();
        self.outs.clear();
        self.entries.try_reserve(capacity).map_err(|_| ExecError::space())?;
        self.bits
            .try_reserve(capacity * words_per)
            .map_err(|_| ExecError::space())?;
        self.outs
            .try_reserve(capacity * ncolors)
            .map_err(|_| ExecError::space())?;
        self.bits.resize(capacity * words_per, 0);
        self.outs.resize(capacity * ncolors, None);
        self.work.clear();
        self.work.resize(words_per, 0);

        self.words_per = words_per;
        self.ncolors = ncolors;
        self.capacity = capacity;
        self.last_post = None;
        self.last_nopr = None;
        self.search = 0;
        Ok(())
    }

    #[inline]
    fn out(&self, set: usize, color: Color) -> Option<usize> {
        self.outs[set * self.ncolors + color as usize].map(|p| p as usize)
    }

    #[inline]
    fn set_out(&mut self, set: usize, color: Color, to: usize) {
        self.outs[set * self.ncolors + color as usize] = Some(to as u32);
    }

    #[inline]
    fn bits(&self, set: usize) -> &[u64] {
        &self.bits[set * self.words_per..(set + 1) * self.words_per]
    }

    /// Returns the heap memory used by this cache, in bytes.
    pub(crate) fn memory_usage(&self) -> usize {
        self.entries.capacity() * core::mem::size_of::<Entry>()
            + self.bits.capacity() * core::mem::size_of::<u64>()
            + self.outs.capacity() * core::mem::size_of::<Option<u32>>()
            + self.work.capacity() * core::mem::size_of::<u64>()
    }
}

#[inline]
fn bit_set(words: &mut [u64], bit: usize) {
    words[bit / 64] |= 1 << (bit % 64);
}

#[inline]
fn bit_test(words: &[u64], bit: usize) -> bool {
    words[bit / 64] & (1 << (bit % 64)) != 0
}

/// Folds a state-set bitvector into a hash, FNV style.
fn hash_words(words: &[u64]) -> u64 {
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = 0xcbf2_9ce4_8422_2325;
    for &word in words.iter() {
        hash = (hash ^ word).wrapping_mul(PRIME);
    }
    hash
}

#[inline]
fn max_opt(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(a), Some(b)) => Some(core::cmp::max(a, b)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// A lazy walker over one automaton, backed by a borrowed cache.
pub(crate) struct Dfa<'a, 'c> {
    cfa: &'a Cfa,
    cm: &'a ColorMap,
    lacons: &'a [Lacon],
    cache: &'c mut Cache,
}

impl<'a, 'c> Dfa<'a, 'c> {
    pub(crate) fn new(
        cfa: &'a Cfa,
        cm: &'a ColorMap,
        lacons: &'a [Lacon],
        cache: &'c mut Cache,
        capacity: Option<usize>,
    ) -> Result<Dfa<'a, 'c>, ExecError> {
        cache.reset(cfa, capacity)?;
        Ok(Dfa { cfa, cm, lacons, cache })
    }

    /// Walks forward from `start`, never past `stop`, and reports the last
    /// position at which the automaton accepted.
    pub(crate) fn longest<U: CodeUnit>(
        &mut self,
        text: &Text<'_, U>,
        start: usize,
        stop: usize,
    ) -> Result<Longest, ExecError> {
        let units = text.units;
        let vstop = units.len();
        debug_assert!(start <= stop && stop <= vstop);
        // One extra unit may be consumed beyond `stop`: accepting sets are
        // entered on the unit following the match.
        let realstop = if stop == vstop { stop } else { stop + 1 };
        let dead = Longest { end: None, hit_stop: false };

        let mut css = self.initialize(start)?;
        let mut cp = start;

        // startup
        let co = if cp == 0 {
            match self.cfa.bos(text.not_bol) {
                Some(co) => co,
                None => return Ok(dead),
            }
        } else {
            self.cm.get(units[cp - 1])
        };
        css = match self.miss(text, css, co, cp, start)? {
            Some(set) => set,
            None => return Ok(dead),
        };
        self.cache.entries[css].last_seen = Some(cp);

        // main loop
        while cp < realstop {
            let co = self.cm.get(units[cp]);
            let next = match self.cache.out(css, co) {
                Some(set) => Some(set),
                None => self.miss(text, css, co, cp + 1, start)?,
            };
            let ss = match next {
                Some(set) => set,
                None => break,
            };
            cp += 1;
            self.cache.entries[ss].last_seen = Some(cp);
            css = ss;
        }

        // shutdown: the walk is still alive at the buffer's end, so a
        // longer buffer might extend the match, and the match may close on
        // the end-of-text color
        let mut hit_stop = false;
        if cp == vstop && stop == vstop {
            hit_stop = true;
            if let Some(co) = self.cfa.eos(text.not_eol) {
                if let Some(ss) = self.miss(text, css, co, cp, start)? {
                    if self.cache.entries[ss].flags & POSTSTATE != 0 {
                        return Ok(Longest { end: Some(cp), hit_stop });
                    }
                }
            }
        }

        // find the last position at which an accepting set was current;
        // entering one consumed the unit just past the match proper
        let mut post = self.cache.last_post;
        for e in self.cache.entries.iter() {
            if e.flags & POSTSTATE != 0 {
                post = max_opt(post, e.last_seen);
            }
        }
        match post {
            Some(p) if p > start => Ok(Longest { end: Some(p - 1), hit_stop }),
            _ => Ok(Longest { end: None, hit_stop }),
        }
    }

    /// Walks forward from `start` and reports the first position in
    /// `min..=max` at which the automaton accepted.
    pub(crate) fn shortest<U: CodeUnit>(
        &mut self,
        text: &Text<'_, U>,
        start: usize,
        min: usize,
        max: usize,
    ) -> Result<Shortest, ExecError> {
        let units = text.units;
        let vstop = units.len();
        debug_assert!(start <= min && min <= max && max <= vstop);
        let realmin = if min == vstop { min } else { min + 1 };
        let realmax = if max == vstop { max } else { max + 1 };
        let dead = Shortest { end: None, cold: None, hit_stop: false };

        let mut css = self.initialize(start)?;
        let mut cp = start;

        // startup
        let co = if cp == 0 {
            match self.cfa.bos(text.not_bol) {
                Some(co) => co,
                None => return Ok(dead),
            }
        } else {
            self.cm.get(units[cp - 1])
        };
        css = match self.miss(text, css, co, cp, start)? {
            Some(set) => set,
            None => return Ok(dead),
        };
        self.cache.entries[css].last_seen = Some(cp);

        // main loop
        let mut alive = true;
        while cp < realmax {
            let co = self.cm.get(units[cp]);
            let next = match self.cache.out(css, co) {
                Some(set) => Some(set),
                None => self.miss(text, css, co, cp + 1, start)?,
            };
            let ss = match next {
                Some(set) => set,
                None => {
                    alive = false;
                    break;
                }
            };
            cp += 1;
            self.cache.entries[ss].last_seen = Some(cp);
            css = ss;
            if self.cache.entries[css].flags & POSTSTATE != 0 && cp >= realmin {
                break;
            }
        }
        if !alive {
            return Ok(dead);
        }

        let cold = Some(self.last_cold());

        let mut hit_stop = false;
        let mut accepted = self.cache.entries[css].flags & POSTSTATE != 0;
        if accepted && cp > min {
            // the unit that carried us into the accepting set is not part
            // of the match
            debug_assert!(cp >= realmin);
            cp -= 1;
        } else if cp == vstop && max == vstop {
            accepted = match self.cfa.eos(text.not_eol) {
                Some(co) => match self.miss(text, css, co, cp, start)? {
                    Some(ss) => self.cache.entries[ss].flags & POSTSTATE != 0,
                    None => false,
                },
                None => false,
            };
            if !accepted {
                hit_stop = true;
            }
        }
        if !accepted {
            return Ok(Shortest { end: None, cold, hit_stop });
        }
        Ok(Shortest { end: Some(cp), cold, hit_stop })
    }

    /// Returns the last position at which the walk's state set consisted
    /// solely of no-progress states.
    fn last_cold(&self) -> usize {
        let mut nopr = self.cache.last_nopr;
        for e in self.cache.entries.iter() {
            if e.flags & NOPROGRESS != 0 {
                nopr = max_opt(nopr, e.last_seen);
            }
        }
        nopr.unwrap_or(0)
    }

    /// Fetches (building if necessary) the starter set and resets all
    /// per-walk bookkeeping.
    fn initialize(&mut self, start: usize) -> Result<usize, ExecError> {
        let words = self.cache.words_per;
        let idx = if !self.cache.entries.is_empty()
            && self.cache.entries[0].flags & STARTER != 0
        {
            0
        } else {
            let idx = self.get_vacant(start, start, None)?;
            debug_assert_eq!(idx, 0);
            let pre = self.cfa.pre();
            let cache = &mut *self.cache;
            for word in cache.bits[idx * words..(idx + 1) * words].iter_mut() {
                *word = 0;
            }
            bit_set(&mut cache.bits[idx * words..(idx + 1) * words], pre);
            cache.entries[idx].hash =
                hash_words(&cache.bits[idx * words..(idx + 1) * words]);
            cache.entries[idx].flags = STARTER | LOCKED | NOPROGRESS;
            idx
        };
        for e in self.cache.entries.iter_mut() {
            e.last_seen = None;
        }
        self.cache.entries[idx].last_seen = Some(start);
        self.cache.last_post = None;
        self.cache.last_nopr = None;
        Ok(idx)
    }

    /// Computes the set reached from `css` on `co`, caching the result.
    ///
    /// `cp` is the text position the transition lands on (it parameterizes
    /// lookahead constraints and the eviction heuristic); `start` is the
    /// walk's starting position. Returns `None` if the transition is dead.
    fn miss<U: CodeUnit>(
        &mut self,
        text: &Text<'_, U>,
        css: usize,
        co: Color,
        cp: usize,
        start: usize,
    ) -> Result<Option<usize>, ExecError> {
        debug_assert!((co as usize) < self.cache.ncolors);
        // for convenience, we can be called even when it is not a miss
        if let Some(set) = self.cache.out(css, co) {
            return Ok(Some(set));
        }

        let words = self.cache.words_per;
        let post = self.cfa.post();
        let mut work = core::mem::take(&mut self.cache.work);
        if work.len() != words {
            work.clear();
            work.resize(words, 0);
        } else {
            for word in work.iter_mut() {
                *word = 0;
            }
        }

        // which states can the current set reach on this color?
        let mut ispost = false;
        let mut noprogress = true;
        let mut gotstate = false;
        {
            let src = self.cache.bits(css);
            for state in 0..self.cfa.state_count() {
                if !bit_test(src, state) {
                    continue;
                }
                for arc in self.cfa.arcs(state) {
                    if arc.color != co {
                        continue;
                    }
                    let to = arc.to as usize;
                    bit_set(&mut work, to);
                    gotstate = true;
                    if to == post {
                        ispost = true;
                    }
                    if !self.cfa.is_no_progress(to) {
                        noprogress = false;
                    }
                }
            }
        }

        // fold in targets of satisfied lookahead constraints, to closure
        let mut sawlacons = false;
        if gotstate && self.cfa.has_lacons() {
            loop {
                let mut added = false;
                for state in 0..self.cfa.state_count() {
                    if !bit_test(&work, state) {
                        continue;
                    }
                    for arc in self.cfa.arcs(state) {
                        if (arc.color as usize) < self.cfa.color_count() {
                            continue;
                        }
                        sawlacons = true;
                        let to = arc.to as usize;
                        if bit_test(&work, to) {
                            continue;
                        }
                        if !self.lacon_holds(text, cp, arc.color)? {
                            continue;
                        }
                        bit_set(&mut work, to);
                        added = true;
                        if to == post {
                            ispost = true;
                        }
                        if !self.cfa.is_no_progress(to) {
                            noprogress = false;
                        }
                    }
                }
                if !added {
                    break;
                }
            }
        }
        if !gotstate {
            self.cache.work = work;
            return Ok(None);
        }

        // is this set cached already?
        let hash = hash_words(&work);
        let mut found = None;
        for i in 0..self.cache.entries.len() {
            if self.cache.entries[i].hash == hash
                && self.cache.bits(i) == &work[..]
            {
                found = Some(i);
                break;
            }
        }
        let set = match found {
            Some(set) => set,
            None => {
                trace!("cache miss: new state set at position {}", cp);
                let set = self.get_vacant(cp, start, Some(css))?;
                debug_assert!(set != css);
                let cache = &mut *self.cache;
                cache.bits[set * words..(set + 1) * words]
                    .copy_from_slice(&work);
                let mut flags = 0;
                if ispost {
                    flags |= POSTSTATE;
                }
                if noprogress {
                    flags |= NOPROGRESS;
                }
                cache.entries[set].hash = hash;
                cache.entries[set].flags = flags;
                // last_seen is the caller's business
                set
            }
        };
        // a transition whose discovery tested a lookahead constraint is
        // position dependent and must not be cached
        if !sawlacons {
            self.cache.set_out(css, co, set);
        }
        self.cache.work = work;
        Ok(Some(set))
    }

    /// Evaluates the lookahead constraint referenced by color `co` at
    /// position `cp`, with a throwaway walker of its own.
    fn lacon_holds<U: CodeUnit>(
        &self,
        text: &Text<'_, U>,
        cp: usize,
        co: Color,
    ) -> Result<bool, ExecError> {
        let n = co as usize - self.cfa.color_count();
        let lacon = self.lacons.get(n).ok_or_else(|| {
            ExecError::internal("lookahead constraint reference out of range")
        })?;
        trace!("testing lookahead constraint {} at {}", n, cp);
        let mut cache = Cache::new();
        let mut dfa =
            Dfa::new(&lacon.cfa, self.cm, self.lacons, &mut cache, None)?;
        let walk = dfa.longest(text, cp, text.units.len())?;
        Ok(if lacon.positive {
            walk.end.is_some()
        } else {
            walk.end.is_none()
        })
    }

    /// Returns a free cache slot, evicting if the cache is full. `protect`
    /// is the slot whose transition is being extended; it must survive.
    fn get_vacant(
        &mut self,
        cp: usize,
        start: usize,
        protect: Option<usize>,
    ) -> Result<usize, ExecError> {
        if self.cache.entries.len() < self.cache.capacity {
            let idx = self.cache.entries.len();
            self.cache.entries.push(Entry {
                hash: 0,
                flags: 0,
                last_seen: None,
            });
            return Ok(idx);
        }

        let victim = self.pick_next(cp, start, protect)?;
        trace!("cache full: evicting state set {}", victim);
        let cache = &mut *self.cache;
        // unlink: clear every transition into the victim, then the victim's
        // own transition row
        for slot in cache.outs.iter_mut() {
            if *slot == Some(victim as u32) {
                *slot = None;
            }
        }
        let nc = cache.ncolors;
        for slot in cache.outs[victim * nc..(victim + 1) * nc].iter_mut() {
            *slot = None;
        }
        // an evicted accepting or no-progress set keeps contributing to the
        // walk's bookkeeping
        let entry = &mut cache.entries[victim];
        if entry.flags & POSTSTATE != 0 {
            cache.last_post = max_opt(cache.last_post, entry.last_seen);
        }
        if entry.flags & NOPROGRESS != 0 {
            cache.last_nopr = max_opt(cache.last_nopr, entry.last_seen);
        }
        entry.hash = 0;
        entry.flags = 0;
        entry.last_seen = None;
        Ok(victim)
    }

    /// Picks the entry to evict: a clock scan preferring entries not seen
    /// recently, falling back to any unlocked entry. Which entry is picked
    /// affects only performance, never the match result.
    fn pick_next(
        &mut self,
        cp: usize,
        start: usize,
        protect: Option<usize>,
    ) -> Result<usize, ExecError> {
        let cache = &mut *self.cache;
        let cap = cache.capacity;
        debug_assert_eq!(cache.entries.len(), cap);
        // the oldest third of the cache's span is considered expendable
        let ancient = if cp - start > cap * 2 / 3 {
            cp - cap * 2 / 3
        } else {
            start
        };
        let hand = if cache.search < cap { cache.search } else { 0 };
        for i in (hand..cap).chain(0..hand) {
            let e = &cache.entries[i];
            if e.flags & LOCKED == 0
                && Some(i) != protect
                && e.last_seen.map_or(true, |seen| seen < ancient)
            {
                cache.search = (i + 1) % cap;
                return Ok(i);
            }
        }
        // nobody is old; take anything unlocked rather than fail the match
        for i in (hand..cap).chain(0..hand) {
            let e = &cache.entries[i];
            if e.flags & LOCKED == 0 && Some(i) != protect {
                cache.search = (i + 1) % cap;
                return Ok(i);
            }
        }
        Err(ExecError::internal("no evictable state set in cache"))
    }
}
