// https://docs.microsoft.com/en-us/typography/opentype/spec/os2

use crate::parser::Stream;

const FS_SELECTION_OFFSET: usize = 62;
const TYPO_ASCENDER_OFFSET: usize = 68;
const TYPO_DESCENDER_OFFSET: usize = 70;
const TYPO_LINE_GAP_OFFSET: usize = 72;

// The typographic metrics fields were present from version 0 on,
// so the minimal length covers them.
const MIN_TABLE_SIZE: usize = 78;

#[inline]
pub fn parse(data: &[u8]) -> Option<&[u8]> {
    if data.len() >= MIN_TABLE_SIZE {
        Some(data)
    } else {
        None
    }
}

#[inline]
pub fn typo_ascender(data: &[u8]) -> Option<i16> {
    Stream::read_at::<i16>(data, TYPO_ASCENDER_OFFSET)
}

#[inline]
pub fn typo_descender(data: &[u8]) -> Option<i16> {
    Stream::read_at::<i16>(data, TYPO_DESCENDER_OFFSET)
}

#[inline]
pub fn typo_line_gap(data: &[u8]) -> Option<i16> {
    Stream::read_at::<i16>(data, TYPO_LINE_GAP_OFFSET)
}

/// Checks the USE_TYPO_METRICS bit of fsSelection.
#[inline]
pub fn use_typographic_metrics(data: &[u8]) -> bool {
    const USE_TYPO_METRICS: u16 = 1 << 7;
    Stream::read_at::<u16>(data, FS_SELECTION_OFFSET)
        .map(|n| n & USE_TYPO_METRICS != 0)
        .unwrap_or(false)
}
