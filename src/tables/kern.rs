// https://docs.microsoft.com/en-us/typography/opentype/spec/kern

use crate::parser::{FromData, Stream};
use crate::GlyphId;

/// The `coverage` bits of a `kern` subtable header.
///
/// Exposed for callers inspecting kerning subtables on their own.
pub mod coverage {
    #![allow(missing_docs)]

    pub const HORIZONTAL: u16 = 1 << 0;
    pub const CROSS_STREAM: u16 = 1 << 2;
}

#[derive(Clone, Copy)]
struct KerningRecord {
    // In the table a pair is stored as two u16, but we use a single u32
    // so it can be binary searched directly.
    pair: u32,
    value: i16,
}

impl FromData for KerningRecord {
    const SIZE: usize = 6;

    #[inline]
    fn parse(data: &[u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        Some(KerningRecord {
            pair: s.read::<u32>()?,
            value: s.read::<i16>()?,
        })
    }
}

/// Returns kerning for a pair of glyphs.
///
/// Only the first subtable of the OpenType variant is used, and only when
/// it is a horizontal, non-cross-stream format 0 list of sorted pairs.
pub fn glyphs_kerning(data: &[u8], left: GlyphId, right: GlyphId) -> Option<i16> {
    let mut s = Stream::new(data);

    // The Apple variant starts with a Fixed 1.0 version; only the
    // OpenType variant (version 0) is supported.
    let version = s.read::<u16>()?;
    if version != 0 {
        return None;
    }

    let number_of_tables = s.read::<u16>()?;
    if number_of_tables == 0 {
        return None;
    }

    // Subtable header.
    s.skip::<u16>(); // version
    s.skip::<u16>(); // length
    let format_and_coverage = s.read::<u16>()?;

    // Format in the high byte, coverage bits in the low one.
    // Require format 0, horizontal, no cross-stream.
    if format_and_coverage != coverage::HORIZONTAL {
        return None;
    }

    let number_of_pairs = s.read::<u16>()?;
    s.advance(6); // search_range (u16) + entry_selector (u16) + range_shift (u16)
    let pairs = s.read_array16::<KerningRecord>(number_of_pairs)?;

    let needle = u32::from(left.0) << 16 | u32::from(right.0);
    pairs
        .binary_search_by(|v| v.pair.cmp(&needle))
        .map(|(_, v)| v.value)
}
