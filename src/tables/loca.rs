// https://docs.microsoft.com/en-us/typography/opentype/spec/loca

use crate::parser::{LazyArray16, NumFrom, Stream};
use crate::tables::head::IndexToLocationFormat;
use crate::GlyphId;
use core::num::NonZeroU16;
use core::ops::Range;

/// An index-to-location table.
#[derive(Clone, Copy)]
pub enum Table<'a> {
    /// Short offsets, stored divided by 2.
    Short(LazyArray16<'a, u16>),
    /// Long offsets.
    Long(LazyArray16<'a, u32>),
}

impl<'a> Table<'a> {
    pub fn parse(
        data: &'a [u8],
        number_of_glyphs: NonZeroU16,
        format: IndexToLocationFormat,
    ) -> Option<Self> {
        // The number of offsets is `maxp.numGlyphs + 1`.
        //
        // Check for overflow first.
        let total = if number_of_glyphs.get() == u16::MAX {
            number_of_glyphs.get()
        } else {
            number_of_glyphs.get() + 1
        };

        let mut s = Stream::new(data);
        match format {
            IndexToLocationFormat::Short => Some(Table::Short(s.read_array16::<u16>(total)?)),
            IndexToLocationFormat::Long => Some(Table::Long(s.read_array16::<u32>(total)?)),
        }
    }

    #[inline]
    fn len(&self) -> u16 {
        match self {
            Table::Short(ref array) => array.len(),
            Table::Long(ref array) => array.len(),
        }
    }

    /// Returns the glyph's range in the `glyf` table.
    ///
    /// Returns `None` for out-of-bounds glyphs and for empty glyphs
    /// (`loca[i] == loca[i + 1]`).
    #[inline]
    pub fn glyph_range(&self, glyph_id: GlyphId) -> Option<Range<usize>> {
        let glyph_id = glyph_id.0;
        if glyph_id == u16::MAX {
            return None;
        }

        // Glyph ID must be smaller than the total number of offsets.
        if glyph_id + 1 >= self.len() {
            return None;
        }

        let range = match self {
            Table::Short(ref array) => {
                // 'The actual local offset divided by 2 is stored.'
                usize::from(array.get(glyph_id)?) * 2..usize::from(array.get(glyph_id + 1)?) * 2
            }
            Table::Long(ref array) => {
                usize::num_from(array.get(glyph_id)?)..usize::num_from(array.get(glyph_id + 1)?)
            }
        };

        if range.start >= range.end {
            // 'The offsets must be in ascending order.'
            // And an empty range means an empty glyph.
            None
        } else {
            Some(range)
        }
    }
}
