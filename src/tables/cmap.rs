// https://docs.microsoft.com/en-us/typography/opentype/spec/cmap

use crate::parser::{FromData, NumFrom, Stream};
use crate::PlatformId;
use core::convert::TryFrom;

#[derive(Clone, Copy)]
struct EncodingRecord {
    platform_id: PlatformId,
    encoding_id: u16,
    offset: u32,
}

impl FromData for EncodingRecord {
    const SIZE: usize = 8;

    #[inline]
    fn parse(data: &[u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        Some(EncodingRecord {
            platform_id: s.read::<PlatformId>()?,
            encoding_id: s.read::<u16>()?,
            offset: s.read::<u32>()?,
        })
    }
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/name#windows-encoding-ids
const WINDOWS_UNICODE_BMP_ENCODING_ID: u16 = 1;
const WINDOWS_UNICODE_FULL_ENCODING_ID: u16 = 10;

impl EncodingRecord {
    #[inline]
    fn is_unicode(&self) -> bool {
        match self.platform_id {
            PlatformId::Unicode => true,
            PlatformId::Windows => {
                self.encoding_id == WINDOWS_UNICODE_BMP_ENCODING_ID
                    || self.encoding_id == WINDOWS_UNICODE_FULL_ENCODING_ID
            }
            _ => false,
        }
    }
}

/// Selects the first Unicode-compatible encoding subtable.
///
/// The returned slice starts at the subtable and runs to the end of the
/// table, since subtable lengths are untrustworthy in malformed fonts.
pub fn parse(data: &[u8]) -> Option<&[u8]> {
    let mut s = Stream::new(data);
    s.skip::<u16>(); // version
    let count = s.read::<u16>()?;
    let records = s.read_array16::<EncodingRecord>(count)?;

    let record = records.into_iter().find(EncodingRecord::is_unicode)?;
    data.get(usize::num_from(record.offset)..)
}

/// Maps a codepoint to a glyph ID using the selected subtable.
///
/// Never fails: any unsupported format or malformed data maps to the
/// missing glyph.
pub fn glyph_index(subtable: &[u8], code_point: u32) -> Option<u16> {
    let format = Stream::read_at::<u16>(subtable, 0)?;
    let glyph = match format {
        0 => parse_format0(subtable, code_point),
        2 => {
            // High-byte mapping for CJK. Not supported.
            warn!("cmap subtable format 2 is not supported");
            None
        }
        4 => parse_format4(subtable, code_point),
        6 => parse_format6(subtable, code_point),
        12 => parse_format12(subtable, code_point),
        13 => parse_format13(subtable, code_point),
        _ => None,
    };

    // 0 indicates the missing glyph.
    glyph.filter(|&g| g != 0)
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/cmap#format-0-byte-encoding-table
fn parse_format0(data: &[u8], code_point: u32) -> Option<u16> {
    let mut s = Stream::new(data);
    s.skip::<u16>(); // format
    let length = s.read::<u16>()?;
    s.skip::<u16>(); // language

    // The glyph array is `length - 6` bytes long.
    if code_point.checked_add(6)? < u32::from(length) {
        s.advance(usize::num_from(code_point));
        s.read::<u8>().map(u16::from)
    } else {
        None
    }
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/cmap#format-4-segment-mapping-to-delta-values
//
// Unlike a plain binary search over the segments, this follows the
// searchRange/entrySelector/rangeShift search the format was designed
// around. Fonts in the wild ship segment arrays that only resolve
// correctly under this exact decrement-and-bias walk.
fn parse_format4(data: &[u8], code_point: u32) -> Option<u16> {
    // This subtable supports code points only in a u16 range.
    let code_point = u16::try_from(code_point).ok()?;

    let seg_count_x2 = Stream::read_at::<u16>(data, 6)?;
    if seg_count_x2 < 2 {
        return None;
    }
    let seg_count = usize::from(seg_count_x2 / 2);

    let mut search_range = Stream::read_at::<u16>(data, 8)? / 2;
    let mut entry_selector = Stream::read_at::<u16>(data, 10)?;
    let range_shift = usize::from(Stream::read_at::<u16>(data, 12)? / 2);

    // End codes start right after the fixed header.
    let end_codes = 14;
    let mut search = end_codes;

    // The segments lie in [endCount, endCount + segCount * 2), but
    // searchRange is the largest power of two below that, so the leftover
    // tail is stepped over first.
    if code_point >= Stream::read_at::<u16>(data, search + range_shift * 2)? {
        search += range_shift * 2;
    }

    // Decrement to bias the search towards the smallest matching end code.
    search -= 2;
    while entry_selector != 0 {
        search_range /= 2;
        let end = Stream::read_at::<u16>(data, search + usize::from(search_range) * 2)?;
        if code_point > end {
            search += usize::from(search_range) * 2;
        }
        entry_selector -= 1;
    }
    search += 2;

    let item = (search - end_codes) / 2;

    let start = Stream::read_at::<u16>(data, 14 + seg_count * 2 + 2 + 2 * item)?;
    let end = Stream::read_at::<u16>(data, end_codes + 2 * item)?;
    if code_point < start || code_point > end {
        return None;
    }

    let id_range_offset = Stream::read_at::<u16>(data, 14 + seg_count * 6 + 2 + 2 * item)?;
    if id_range_offset == 0 {
        let id_delta = Stream::read_at::<i16>(data, 14 + seg_count * 4 + 2 + 2 * item)?;
        return Some(code_point.wrapping_add(id_delta as u16));
    }

    // The glyph ID array is indexed relative to the idRangeOffset slot.
    let pos = usize::from(id_range_offset)
        + usize::from(code_point - start) * 2
        + 14 + seg_count * 6 + 2 + 2 * item;
    Stream::read_at::<u16>(data, pos)
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/cmap#format-6-trimmed-table-mapping
fn parse_format6(data: &[u8], code_point: u32) -> Option<u16> {
    // This subtable supports code points only in a u16 range.
    let code_point = u16::try_from(code_point).ok()?;

    let mut s = Stream::new(data);
    s.skip::<u16>(); // format
    s.skip::<u16>(); // length
    s.skip::<u16>(); // language
    let first_code_point = s.read::<u16>()?;
    let count = s.read::<u16>()?;
    let glyphs = s.read_array16::<u16>(count)?;

    let idx = code_point.checked_sub(first_code_point)?;
    glyphs.get(idx)
}

#[derive(Clone, Copy)]
struct SequentialMapGroup {
    start_char_code: u32,
    end_char_code: u32,
    start_glyph_id: u32,
}

impl FromData for SequentialMapGroup {
    const SIZE: usize = 12;

    #[inline]
    fn parse(data: &[u8]) -> Option<Self> {
        let mut s = Stream::new(data);
        Some(SequentialMapGroup {
            start_char_code: s.read::<u32>()?,
            end_char_code: s.read::<u32>()?,
            start_glyph_id: s.read::<u32>()?,
        })
    }
}

impl SequentialMapGroup {
    #[inline]
    fn contains(&self, code_point: u32) -> core::cmp::Ordering {
        use core::cmp::Ordering;
        if self.end_char_code < code_point {
            Ordering::Less
        } else if self.start_char_code > code_point {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/cmap#format-12-segmented-coverage
fn parse_format12(data: &[u8], code_point: u32) -> Option<u16> {
    let mut s = Stream::new(data);
    s.skip::<u16>(); // format
    s.skip::<u16>(); // reserved
    s.skip::<u32>(); // length
    s.skip::<u32>(); // language
    let count = s.read::<u32>()?;
    let groups = s.read_array32::<SequentialMapGroup>(count)?;

    let (_, group) = groups.binary_search_by(|g| g.contains(code_point))?;
    let id = group
        .start_glyph_id
        .checked_add(code_point)?
        .checked_sub(group.start_char_code)?;
    u16::try_from(id).ok()
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/cmap#format-13-many-to-one-range-mappings
//
// Same layout as format 12, but the glyph ID is shared by the whole range.
fn parse_format13(data: &[u8], code_point: u32) -> Option<u16> {
    let mut s = Stream::new(data);
    s.skip::<u16>(); // format
    s.skip::<u16>(); // reserved
    s.skip::<u32>(); // length
    s.skip::<u32>(); // language
    let count = s.read::<u32>()?;
    let groups = s.read_array32::<SequentialMapGroup>(count)?;

    let (_, group) = groups.binary_search_by(|g| g.contains(code_point))?;
    u16::try_from(group.start_glyph_id).ok()
}
