// https://docs.microsoft.com/en-us/typography/opentype/spec/head

use crate::parser::Stream;
use crate::Rect;

const TABLE_SIZE: usize = 54;
const UNITS_PER_EM_OFFSET: usize = 18;
const MAC_STYLE_OFFSET: usize = 44;
const BBOX_OFFSET: usize = 36;
const INDEX_TO_LOC_FORMAT_OFFSET: usize = 50;

/// The `macStyle` bit field.
///
/// Exposed for callers that implement font-name matching.
pub mod mac_style {
    #![allow(missing_docs)]

    pub const BOLD: u16 = 1 << 0;
    pub const ITALIC: u16 = 1 << 1;
    pub const UNDERSCORE: u16 = 1 << 2;
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum IndexToLocationFormat {
    Short,
    Long,
}

#[inline]
pub fn parse(data: &[u8]) -> Option<&[u8]> {
    if data.len() >= TABLE_SIZE {
        Some(data)
    } else {
        None
    }
}

#[inline]
pub fn units_per_em(data: &[u8]) -> Option<u16> {
    let num = Stream::read_at::<u16>(data, UNITS_PER_EM_OFFSET)?;
    // 'Values 16 to 16384 are valid.'
    if (16..=16384).contains(&num) {
        Some(num)
    } else {
        None
    }
}

#[inline]
pub fn global_bbox(data: &[u8]) -> Option<Rect> {
    let mut s = Stream::new_at(data, BBOX_OFFSET)?;
    Some(Rect {
        x_min: s.read::<i16>()?,
        y_min: s.read::<i16>()?,
        x_max: s.read::<i16>()?,
        y_max: s.read::<i16>()?,
    })
}

#[inline]
pub fn mac_style_bits(data: &[u8]) -> u16 {
    Stream::read_at::<u16>(data, MAC_STYLE_OFFSET).unwrap_or(0)
}

#[inline]
pub(crate) fn index_to_loc_format(data: &[u8]) -> Option<IndexToLocationFormat> {
    match Stream::read_at::<i16>(data, INDEX_TO_LOC_FORMAT_OFFSET)? {
        0 => Some(IndexToLocationFormat::Short),
        1 => Some(IndexToLocationFormat::Long),
        _ => None,
    }
}
