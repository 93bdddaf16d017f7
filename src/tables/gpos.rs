// https://docs.microsoft.com/en-us/typography/opentype/spec/gpos
//
// Only the Pair Adjustment Positioning lookup (type 2) is consumed here,
// and only for a horizontal-advance-only value format. This is not a
// layout engine: the table is treated as a fancy kerning source.

use crate::parser::{FromData, Offset, Offset16, Stream};
use crate::GlyphId;
use core::cmp::Ordering;

const PAIR_ADJUSTMENT: u16 = 2;

// https://docs.microsoft.com/en-us/typography/opentype/spec/gpos#value-record
const X_ADVANCE: u16 = 0x0004;

/// Returns the pair-adjustment x-advance for a pair of glyphs.
///
/// Walks every type 2 lookup and returns the first non-zero adjustment.
pub fn glyphs_kerning(data: &[u8], left: GlyphId, right: GlyphId) -> Option<i16> {
    let mut s = Stream::new(data);
    let major_version = s.read::<u16>()?;
    let minor_version = s.read::<u16>()?;
    if major_version != 1 || minor_version > 1 {
        return None;
    }

    s.skip::<Offset16>(); // script list
    s.skip::<Offset16>(); // feature list
    let lookup_list_offset = s.read::<Offset16>()?;

    let lookup_list = data.get(lookup_list_offset.to_usize()..)?;
    let mut s = Stream::new(lookup_list);
    let count = s.read::<u16>()?;
    let offsets = s.read_array16::<Offset16>(count)?;

    for offset in offsets {
        let lookup = match lookup_list.get(offset.to_usize()..) {
            Some(data) => data,
            None => continue,
        };

        if let Some(value) = lookup_kerning(lookup, left, right) {
            if value != 0 {
                return Some(value);
            }
        }
    }

    None
}

fn lookup_kerning(lookup: &[u8], left: GlyphId, right: GlyphId) -> Option<i16> {
    let mut s = Stream::new(lookup);
    let lookup_type = s.read::<u16>()?;
    if lookup_type != PAIR_ADJUSTMENT {
        return None;
    }

    s.skip::<u16>(); // lookup flag
    let subtable_count = s.read::<u16>()?;
    let subtables = s.read_array16::<Offset16>(subtable_count)?;

    for offset in subtables {
        let subtable = match lookup.get(offset.to_usize()..) {
            Some(data) => data,
            None => continue,
        };

        if let Some(value) = pair_adjustment(subtable, left, right) {
            if value != 0 {
                return Some(value);
            }
        }
    }

    None
}

fn pair_adjustment(data: &[u8], left: GlyphId, right: GlyphId) -> Option<i16> {
    let mut s = Stream::new(data);
    let format = s.read::<u16>()?;
    let coverage_offset = s.read::<Offset16>()?;
    let value_format1 = s.read::<u16>()?;
    let value_format2 = s.read::<u16>()?;

    // Horizontal advance adjustments only.
    if value_format1 != X_ADVANCE || value_format2 != 0 {
        warn!("unsupported GPOS pair value format: ({}, {})", value_format1, value_format2);
        return None;
    }

    let coverage_index = coverage_index(data.get(coverage_offset.to_usize()..)?, left)?;

    match format {
        1 => {
            // Specific glyph pairs.
            let pair_set_count = s.read::<u16>()?;
            let pair_sets = s.read_array16::<Offset16>(pair_set_count)?;
            let pair_set = data.get(pair_sets.get(coverage_index)?.to_usize()..)?;

            let mut s = Stream::new(pair_set);
            let count = s.read::<u16>()?;
            let records = s.read_array16::<PairValueRecord>(count)?;
            records
                .binary_search_by(|r| r.second_glyph.cmp(&right.0))
                .map(|(_, r)| r.x_advance)
        }
        2 => {
            // A class pair matrix.
            let class_def1_offset = s.read::<Offset16>()?;
            let class_def2_offset = s.read::<Offset16>()?;
            let class1_count = s.read::<u16>()?;
            let class2_count = s.read::<u16>()?;

            let class1 = glyph_class(data.get(class_def1_offset.to_usize()..)?, left);
            let class2 = glyph_class(data.get(class_def2_offset.to_usize()..)?, right);
            if class1 >= class1_count || class2 >= class2_count {
                return None;
            }

            let index = usize::from(class1) * usize::from(class2_count) + usize::from(class2);
            Stream::read_at::<i16>(data, s.offset() + index * i16::SIZE)
        }
        _ => None,
    }
}

#[derive(Clone, Copy)]
struct PairValueRecord {
    second_glyph: u16,
    x_advance: i16,
}

impl FromData for PairValueRecord {
    const SIZE: usize = 4;

    #[inline]
    fn parse(data: &[u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        Some(PairValueRecord {
            second_glyph: s.read::<u16>()?,
            x_advance: s.read::<i16>()?,
        })
    }
}

#[derive(Clone, Copy)]
struct RangeRecord {
    start: u16,
    end: u16,
    value: u16,
}

impl FromData for RangeRecord {
    const SIZE: usize = 6;

    #[inline]
    fn parse(data: &[u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        Some(RangeRecord {
            start: s.read::<u16>()?,
            end: s.read::<u16>()?,
            value: s.read::<u16>()?,
        })
    }
}

impl RangeRecord {
    #[inline]
    fn contains(&self, glyph_id: GlyphId) -> Ordering {
        if self.end < glyph_id.0 {
            Ordering::Less
        } else if self.start > glyph_id.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/chapter2#coverage-table
fn coverage_index(data: &[u8], glyph_id: GlyphId) -> Option<u16> {
    let mut s = Stream::new(data);
    let format = s.read::<u16>()?;
    match format {
        1 => {
            let count = s.read::<u16>()?;
            let glyphs = s.read_array16::<u16>(count)?;
            glyphs.binary_search_by(|g| g.cmp(&glyph_id.0)).map(|(i, _)| i)
        }
        2 => {
            let count = s.read::<u16>()?;
            let records = s.read_array16::<RangeRecord>(count)?;
            let (_, record) = records.binary_search_by(|r| r.contains(glyph_id))?;
            // `value` is the coverage index of the range start.
            record.value.checked_add(glyph_id.0.checked_sub(record.start)?)
        }
        _ => None,
    }
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/chapter2#class-definition-table
//
// Any glyph not covered belongs to class 0.
fn glyph_class(data: &[u8], glyph_id: GlyphId) -> u16 {
    glyph_class_impl(data, glyph_id).unwrap_or(0)
}

fn glyph_class_impl(data: &[u8], glyph_id: GlyphId) -> Option<u16> {
    let mut s = Stream::new(data);
    let format = s.read::<u16>()?;
    match format {
        1 => {
            let start = s.read::<u16>()?;
            let count = s.read::<u16>()?;
            let classes = s.read_array16::<u16>(count)?;
            classes.get(glyph_id.0.checked_sub(start)?)
        }
        2 => {
            let count = s.read::<u16>()?;
            let records = s.read_array16::<RangeRecord>(count)?;
            records.binary_search_by(|r| r.contains(glyph_id)).map(|(_, r)| r.value)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_positioning_format1() {
        let data = &[
            0x00, 0x01, // major version: 1
            0x00, 0x00, // minor version: 0
            0x00, 0x00, // script list offset: 0 (unused)
            0x00, 0x00, // feature list offset: 0 (unused)
            0x00, 0x0A, // lookup list offset: 10
            // Lookup list
            0x00, 0x01, // lookup count: 1
            0x00, 0x04, // lookup offset [0]: 4
            // Lookup
            0x00, 0x02, // lookup type: 2 (pair adjustment)
            0x00, 0x00, // lookup flag: 0
            0x00, 0x01, // subtable count: 1
            0x00, 0x08, // subtable offset [0]: 8
            // PairPos format 1
            0x00, 0x01, // pos format: 1
            0x00, 0x0C, // coverage offset: 12
            0x00, 0x04, // value format 1: X_ADVANCE
            0x00, 0x00, // value format 2: 0
            0x00, 0x01, // pair set count: 1
            0x00, 0x12, // pair set offset [0]: 18
            // Coverage
            0x00, 0x01, // format: 1
            0x00, 0x01, // glyph count: 1
            0x00, 0x01, // glyph [0]: 1
            // Pair set
            0x00, 0x01, // pair value count: 1
            0x00, 0x02, // second glyph: 2
            0xFF, 0xB0, // x advance: -80
        ];

        assert_eq!(glyphs_kerning(data, GlyphId(1), GlyphId(2)), Some(-80));
        assert_eq!(glyphs_kerning(data, GlyphId(1), GlyphId(3)), None);
        assert_eq!(glyphs_kerning(data, GlyphId(2), GlyphId(1)), None);
    }

    #[test]
    fn pair_positioning_format2() {
        let data = &[
            0x00, 0x01, // major version: 1
            0x00, 0x00, // minor version: 0
            0x00, 0x00, // script list offset: 0 (unused)
            0x00, 0x00, // feature list offset: 0 (unused)
            0x00, 0x0A, // lookup list offset: 10
            // Lookup list
            0x00, 0x01, // lookup count: 1
            0x00, 0x04, // lookup offset [0]: 4
            // Lookup
            0x00, 0x02, // lookup type: 2 (pair adjustment)
            0x00, 0x00, // lookup flag: 0
            0x00, 0x01, // subtable count: 1
            0x00, 0x08, // subtable offset [0]: 8
            // PairPos format 2
            0x00, 0x02, // pos format: 2
            0x00, 0x18, // coverage offset: 24
            0x00, 0x04, // value format 1: X_ADVANCE
            0x00, 0x00, // value format 2: 0
            0x00, 0x1E, // class def 1 offset: 30
            0x00, 0x26, // class def 2 offset: 38
            0x00, 0x02, // class 1 count: 2
            0x00, 0x02, // class 2 count: 2
            // Class pair matrix
            0x00, 0x00, // [0][0]: 0
            0x00, 0x00, // [0][1]: 0
            0x00, 0x00, // [1][0]: 0
            0xFF, 0xB0, // [1][1]: -80
            // Coverage
            0x00, 0x01, // format: 1
            0x00, 0x01, // glyph count: 1
            0x00, 0x01, // glyph [0]: 1
            // Class def 1, format 1
            0x00, 0x01, // format: 1
            0x00, 0x01, // start glyph: 1
            0x00, 0x01, // glyph count: 1
            0x00, 0x01, // class [0]: 1
            // Class def 2, format 2
            0x00, 0x02, // format: 2
            0x00, 0x01, // range count: 1
            0x00, 0x02, // start glyph: 2
            0x00, 0x02, // end glyph: 2
            0x00, 0x01, // class: 1
        ];

        assert_eq!(glyphs_kerning(data, GlyphId(1), GlyphId(2)), Some(-80));
        // Glyph 3 is class 0 and the [1][0] matrix cell is zero.
        assert_eq!(glyphs_kerning(data, GlyphId(1), GlyphId(3)), None);
    }

    #[test]
    fn unsupported_value_format() {
        let data = &[
            0x00, 0x01, // major version: 1
            0x00, 0x00, // minor version: 0
            0x00, 0x00, // script list offset: 0 (unused)
            0x00, 0x00, // feature list offset: 0 (unused)
            0x00, 0x0A, // lookup list offset: 10
            // Lookup list
            0x00, 0x01, // lookup count: 1
            0x00, 0x04, // lookup offset [0]: 4
            // Lookup
            0x00, 0x02, // lookup type: 2 (pair adjustment)
            0x00, 0x00, // lookup flag: 0
            0x00, 0x01, // subtable count: 1
            0x00, 0x08, // subtable offset [0]: 8
            // PairPos format 1 with a full value record
            0x00, 0x01, // pos format: 1
            0x00, 0x0C, // coverage offset: 12
            0x00, 0x05, // value format 1: X_PLACEMENT | X_ADVANCE
            0x00, 0x00, // value format 2: 0
            0x00, 0x00, // pair set count: 0
            // Coverage
            0x00, 0x01, // format: 1
            0x00, 0x01, // glyph count: 1
            0x00, 0x01, // glyph [0]: 1
        ];

        assert_eq!(glyphs_kerning(data, GlyphId(1), GlyphId(2)), None);
    }
}
