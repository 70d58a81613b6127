/*!
Code units and the character equivalence classes ("colors") they map to.

A compiled pattern never inspects characters directly. At compile time, every
code unit is assigned to a small integer color such that two units with the
same color are indistinguishable to the pattern. The automata in this crate
label their transitions with colors, which keeps per-state transition lists
tiny even for patterns built over 32-bit alphabets.
*/

use alloc::vec::Vec;

use core::cmp::Ordering;
use core::fmt;

/// An equivalence class of code units.
///
/// Colors are small integers handed out by a [`ColorMapBuilder`]. Color `0`
/// ([`WHITE`]) is always present and acts as the class of every unit that was
/// never mentioned by the pattern. Colors at or beyond a map's color count
/// never appear in the map itself; automata use that tail range to refer to
/// lookahead constraints.
pub type Color = u16;

/// The color of every code unit not otherwise classified.
pub const WHITE: Color = 0;

/// The maximum number of colors a single map may hand out.
///
/// The ceiling leaves room above the real colors for lookahead constraint
/// references without risking wraparound in `Color` arithmetic.
pub const MAX_COLORS: usize = 1 << 15;

/// The width of the code units a pattern was compiled for.
///
/// A pattern is compiled against exactly one width and can only run over
/// haystacks of that width. Mixing them is reported as an error at match
/// time, never coerced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CharWidth {
    /// 8-bit code units (`&[u8]` haystacks).
    One,
    /// 16-bit code units (`&[u16]` haystacks).
    Two,
    /// 32-bit code units (`&[u32]` haystacks).
    Four,
}

impl CharWidth {
    /// Returns the size of one code unit, in bytes.
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            CharWidth::One => 1,
            CharWidth::Two => 2,
            CharWidth::Four => 4,
        }
    }
}

impl fmt::Display for CharWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CharWidth::One => write!(f, "8-bit"),
            CharWidth::Two => write!(f, "16-bit"),
            CharWidth::Four => write!(f, "32-bit"),
        }
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// A haystack code unit.
///
/// This trait is sealed and implemented for `u8`, `u16` and `u32`. It exists
/// so that one matching engine can serve all three widths the surrounding
/// system may have been built for, with the width recorded on the compiled
/// pattern and checked at match time.
pub trait CodeUnit: Copy + Eq + fmt::Debug + private::Sealed {
    /// The width tag corresponding to this unit type.
    const WIDTH: CharWidth;

    /// This unit's value, zero extended.
    fn as_u32(self) -> u32;

    /// Views a haystack of these units as raw bytes, when the representation
    /// permits it. Only 8-bit haystacks do; the prefilter uses this to take
    /// its `memchr` fast path.
    #[inline]
    fn as_bytes(_units: &[Self]) -> Option<&[u8]> {
        None
    }
}

impl CodeUnit for u8 {
    const WIDTH: CharWidth = CharWidth::One;

    #[inline]
    fn as_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    fn as_bytes(units: &[u8]) -> Option<&[u8]> {
        Some(units)
    }
}

impl CodeUnit for u16 {
    const WIDTH: CharWidth = CharWidth::Two;

    #[inline]
    fn as_u32(self) -> u32 {
        self as u32
    }
}

impl CodeUnit for u32 {
    const WIDTH: CharWidth = CharWidth::Four;

    #[inline]
    fn as_u32(self) -> u32 {
        self
    }
}

/// A mapping from code units to colors.
///
/// The map is dense for the first 256 unit values and falls back to a sorted
/// range list above that, which keeps lookups cheap for the region where
/// nearly all classification happens while still covering wide alphabets.
///
/// A color map is immutable once built and is shared by every automaton of
/// the pattern it was compiled with.
#[derive(Clone)]
pub struct ColorMap {
    /// Total number of colors handed out, including pseudo colors that
    /// classify no unit (used for begin/end of text).
    ncolors: usize,
    /// Colors of units 0..=255.
    low: [Color; 256],
    /// Colors of units >= 256, sorted by range start, non-overlapping.
    ranges: Vec<ColorRange>,
}

#[derive(Clone, Copy, Debug)]
struct ColorRange {
    lo: u32,
    hi: u32,
    color: Color,
}

impl ColorMap {
    /// Returns a builder for assembling a color map.
    pub fn builder() -> ColorMapBuilder {
        ColorMapBuilder {
            ncolors: 1,
            low: [WHITE; 256],
            ranges: Vec::new(),
        }
    }

    /// Returns the color of the given code unit.
    #[inline]
    pub fn get<U: CodeUnit>(&self, unit: U) -> Color {
        let unit = unit.as_u32();
        if unit < 256 {
            return self.low[unit as usize];
        }
        let found = self.ranges.binary_search_by(|r| {
            if r.hi < unit {
                Ordering::Less
            } else if r.lo > unit {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        });
        match found {
            Ok(i) => self.ranges[i].color,
            Err(_) => WHITE,
        }
    }

    /// Returns the total number of colors in this map, including pseudo
    /// colors that classify no code unit.
    #[inline]
    pub fn color_count(&self) -> usize {
        self.ncolors
    }

    /// Returns the heap memory used by this map, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.ranges.len() * core::mem::size_of::<ColorRange>()
    }
}

impl fmt::Debug for ColorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorMap")
            .field("ncolors", &self.ncolors)
            .field("ranges", &self.ranges.len())
            .finish()
    }
}

/// A builder for a [`ColorMap`].
///
/// Color `0` ([`WHITE`]) exists from the start. Fresh colors are handed out
/// by [`ColorMapBuilder::add_color`]; units are then assigned to them. A
/// color that ends up classifying no unit is a pseudo color, which is how
/// begin/end-of-text markers get colors of their own.
#[derive(Clone, Debug)]
pub struct ColorMapBuilder {
    ncolors: usize,
    low: [Color; 256],
    ranges: Vec<ColorRange>,
}

impl ColorMapBuilder {
    /// Allocates and returns a fresh color.
    ///
    /// # Panics
    ///
    /// This panics if more than [`MAX_COLORS`] colors are allocated.
    pub fn add_color(&mut self) -> Color {
        assert!(self.ncolors < MAX_COLORS, "too many colors");
        let color = self.ncolors as Color;
        self.ncolors += 1;
        color
    }

    /// Assigns a single code unit to the given color.
    ///
    /// # Panics
    ///
    /// This panics if `color` has not been allocated.
    pub fn set_unit(&mut self, unit: u32, color: Color) {
        self.set_range(unit, unit, color);
    }

    /// Assigns every code unit in `lo..=hi` to the given color.
    ///
    /// # Panics
    ///
    /// This panics if `lo > hi` or if `color` has not been allocated.
    pub fn set_range(&mut self, lo: u32, hi: u32, color: Color) {
        assert!(lo <= hi, "invalid unit range");
        assert!((color as usize) < self.ncolors, "unallocated color");
        let mut unit = lo;
        while unit < 256 && unit <= hi {
            self.low[unit as usize] = color;
            unit += 1;
        }
        if hi >= 256 {
            let lo = core::cmp::max(lo, 256);
            self.ranges.push(ColorRange { lo, hi, color });
        }
    }

    /// Builds the color map.
    ///
    /// # Panics
    ///
    /// This panics if two range assignments above unit 255 overlap. (Below
    /// 256, later assignments simply win.)
    pub fn build(mut self) -> ColorMap {
        self.ranges.sort_by_key(|r| r.lo);
        for pair in self.ranges.windows(2) {
            assert!(pair[0].hi < pair[1].lo, "overlapping color ranges");
        }
        ColorMap { ncolors: self.ncolors, low: self.low, ranges: self.ranges }
    }
}
