// The INDEX data structure from the Adobe Technical Note #5176,
// chapter 5 INDEX Data.

use crate::parser::{FromData, NumFrom, Stream, U24};
use core::convert::TryFrom;

#[derive(Clone, Copy, Debug)]
pub enum OffsetSize {
    Size1 = 1,
    Size2 = 2,
    Size3 = 3,
    Size4 = 4,
}

impl OffsetSize {
    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }
}

fn parse_offset_size(s: &mut Stream) -> Option<OffsetSize> {
    match s.read::<u8>()? {
        1 => Some(OffsetSize::Size1),
        2 => Some(OffsetSize::Size2),
        3 => Some(OffsetSize::Size3),
        4 => Some(OffsetSize::Size4),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VarOffsets<'a> {
    data: &'a [u8],
    offset_size: OffsetSize,
}

impl<'a> VarOffsets<'a> {
    pub fn get(&self, index: u32) -> Option<u32> {
        if index >= self.len() {
            return None;
        }

        let start = usize::num_from(index) * self.offset_size.to_usize();
        let end = start + self.offset_size.to_usize();
        let data = self.data.get(start..end)?;
        let n = match self.offset_size {
            OffsetSize::Size1 => u32::from(u8::parse(data)?),
            OffsetSize::Size2 => u32::from(u16::parse(data)?),
            OffsetSize::Size3 => U24::parse(data)?.0,
            OffsetSize::Size4 => u32::parse(data)?,
        };

        // An offset must be positive.
        if n == 0 {
            return None;
        }

        // INDEX offsets are one-based, shift them back.
        Some(n - 1)
    }

    #[inline]
    pub fn last(&self) -> Option<u32> {
        if !self.is_empty() {
            self.get(self.len() - 1)
        } else {
            None
        }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.data.len() as u32 / self.offset_size.to_u32()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A variable-sized array of byte objects.
#[derive(Clone, Copy, Debug)]
pub struct Index<'a> {
    data: &'a [u8],
    offsets: VarOffsets<'a>,
}

impl<'a> Default for Index<'a> {
    #[inline]
    fn default() -> Self {
        Index {
            data: b"",
            offsets: VarOffsets {
                data: b"",
                offset_size: OffsetSize::Size1,
            },
        }
    }
}

impl<'a> Index<'a> {
    #[inline]
    pub fn len(&self) -> u32 {
        // The last offset points past the end of the object data,
        // it does not start an entry.
        self.offsets.len().saturating_sub(1)
    }

    pub fn get(&self, index: u32) -> Option<&'a [u8]> {
        // Check for overflow first.
        if index == u32::MAX {
            None
        } else if index + 1 < self.offsets.len() {
            let start = usize::try_from(self.offsets.get(index)?).ok()?;
            let end = usize::try_from(self.offsets.get(index + 1)?).ok()?;
            self.data.get(start..end)
        } else {
            None
        }
    }
}

pub fn parse_index<'a>(s: &mut Stream<'a>) -> Option<Index<'a>> {
    let count = s.read::<u16>()?;
    if count == 0 {
        return Some(Index::default());
    }

    let offset_size = parse_offset_size(s)?;
    let offsets_len = (u32::from(count) + 1).checked_mul(offset_size.to_u32())?;
    let offsets = VarOffsets {
        data: s.read_bytes(usize::num_from(offsets_len))?,
        offset_size,
    };

    // The last offset says how long the object data is.
    match offsets.last() {
        Some(last_offset) => {
            let data = s.read_bytes(usize::num_from(last_offset))?;
            Some(Index { data, offsets })
        }
        None => Some(Index::default()),
    }
}

pub fn skip_index(s: &mut Stream) -> Option<()> {
    let count = s.read::<u16>()?;
    if count == 0 {
        return Some(());
    }

    let offset_size = parse_offset_size(s)?;
    let offsets_len = (u32::from(count) + 1).checked_mul(offset_size.to_u32())?;
    let offsets = VarOffsets {
        data: s.read_bytes(usize::num_from(offsets_len))?,
        offset_size,
    };

    if let Some(last_offset) = offsets.last() {
        s.advance(usize::num_from(last_offset));
    }

    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_index() {
        let data = &[
            0x00, 0x00, // count: 0
        ];
        let index = parse_index(&mut Stream::new(data)).unwrap();
        assert_eq!(index.len(), 0);
        assert_eq!(index.get(0), None);
    }

    #[test]
    fn two_entries() {
        let data = &[
            0x00, 0x02, // count: 2
            0x01, // offset size: 1
            0x01, // offset [0]: 1
            0x02, // offset [1]: 2
            0x04, // offset [2]: 4
            0xAA, // entry [0]
            0xBB, 0xCC, // entry [1]
        ];
        let index = parse_index(&mut Stream::new(data)).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(0), Some(&[0xAA][..]));
        assert_eq!(index.get(1), Some(&[0xBB, 0xCC][..]));
        assert_eq!(index.get(2), None);
    }

    #[test]
    fn zero_offset() {
        let data = &[
            0x00, 0x01, // count: 1
            0x01, // offset size: 1
            0x00, // offset [0]: 0 <-- offsets are one-based, so invalid
            0x01, // offset [1]: 1
        ];
        let index = parse_index(&mut Stream::new(data)).unwrap();
        assert_eq!(index.get(0), None);
    }

    #[test]
    fn invalid_offset_size() {
        let data = &[
            0x00, 0x01, // count: 1
            0x05, // offset size: 5 <-- invalid
        ];
        assert!(parse_index(&mut Stream::new(data)).is_none());
    }
}
