/*!
A safe TrueType/OpenType font parser and glyph rasterizer.

The whole font stays in the caller's byte buffer; parsing never copies
and never trusts an offset read from the file. On top of the parser sit
an analytic antialiased rasterizer and a signed-distance-field generator,
so a glyph can go from codepoint to grayscale pixels without any other
dependency.

## Features

- Zero-copy parsing of `glyf`/`loca` and `CFF ` outlines, `cmap`
  formats 0/4/6/12/13, horizontal metrics, `kern` and GPOS pair kerning,
  and TrueType collections.
- Designed for untrusted input: every read is bounds-checked and
  malformed data degrades to "missing glyph"-style neutral answers.
- Exact-coverage scanline rasterization with subpixel positioning.
  No supersampling.
- Signed distance field generation from the unflattened outline.

## Error handling

There is no `Error` enum. Malformed fonts are an expected input, not an
exceptional one, so everything boils down to `Option::None` or a neutral
value. A font that cannot provide the mandatory tables fails at
[`Face::parse`]; later queries cannot fail structurally.
*/

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]

#[cfg(feature = "logging")]
macro_rules! warn {
    ($($arg:tt)+) => {
        log::log!(log::Level::Warn, $($arg)+);
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! warn {
    ($($arg:tt)+) => {};
}

mod parser;
mod raster;
mod tables;

#[cfg(test)]
mod writer;

use core::fmt;
use core::num::NonZeroU16;

use parser::{FromData, NumFrom, Stream};
use tables::{cff, cmap, glyf, gpos, head, hhea, hmtx, kern, loca, maxp, os2, svg};

pub use raster::{Bitmap, BitmapBox};
pub use tables::head::mac_style;
pub use tables::kern::coverage as kern_coverage;

/// A type-safe wrapper for a glyph ID.
///
/// 0 is the "missing glyph".
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug)]
pub struct GlyphId(pub u16);

impl FromData for GlyphId {
    const SIZE: usize = 2;

    #[inline]
    fn parse(data: &[u8]) -> Option<Self> {
        u16::parse(data).map(GlyphId)
    }
}

/// A platform ID of a `cmap` encoding record.
///
/// Exposed for callers that match fonts by `name` table entries.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[allow(missing_docs)]
pub enum PlatformId {
    Unicode,
    Macintosh,
    Iso,
    Windows,
    Custom,
}

impl FromData for PlatformId {
    const SIZE: usize = 2;

    #[inline]
    fn parse(data: &[u8]) -> Option<Self> {
        match u16::parse(data)? {
            0 => Some(PlatformId::Unicode),
            1 => Some(PlatformId::Macintosh),
            2 => Some(PlatformId::Iso),
            3 => Some(PlatformId::Windows),
            4 => Some(PlatformId::Custom),
            _ => None,
        }
    }
}

/// A rectangle in font units, y-up.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub struct Rect {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

/// An outline segment, in font units.
///
/// `x`/`y` is always the segment's endpoint; `x1, y1` and `x2, y2` are
/// control points.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub enum Vertex {
    MoveTo { x: f32, y: f32 },
    LineTo { x: f32, y: f32 },
    QuadTo { x1: f32, y1: f32, x: f32, y: f32 },
    CurveTo { x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32 },
    Close,
}

/// A trait for glyph outline construction.
pub trait OutlineBuilder {
    /// Appends a MoveTo segment.
    ///
    /// Start of a contour.
    fn move_to(&mut self, x: f32, y: f32);

    /// Appends a LineTo segment.
    fn line_to(&mut self, x: f32, y: f32);

    /// Appends a QuadTo segment.
    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32);

    /// Appends a CurveTo segment.
    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32);

    /// Appends a ClosePath segment.
    ///
    /// End of a contour.
    fn close(&mut self);
}

struct ShapeBuilder(Vec<Vertex>);

impl OutlineBuilder for ShapeBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.push(Vertex::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.push(Vertex::LineTo { x, y });
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.push(Vertex::QuadTo { x1, y1, x, y });
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.push(Vertex::CurveTo { x1, y1, x2, y2, x, y });
    }

    fn close(&mut self) {
        self.0.push(Vertex::Close);
    }
}

struct DummyOutline;

impl OutlineBuilder for DummyOutline {
    fn move_to(&mut self, _: f32, _: f32) {}
    fn line_to(&mut self, _: f32, _: f32) {}
    fn quad_to(&mut self, _: f32, _: f32, _: f32, _: f32) {}
    fn curve_to(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: f32) {}
    fn close(&mut self) {}
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font
#[derive(Clone, Copy)]
struct TableRecord {
    tag: [u8; 4],
    offset: u32,
    length: u32,
}

impl FromData for TableRecord {
    const SIZE: usize = 16;

    #[inline]
    fn parse(data: &[u8]) -> Option<Self> {
        use core::convert::TryInto;
        let mut s = Stream::new(data);
        let tag: [u8; 4] = s.read_bytes(4)?.try_into().ok()?;
        s.skip::<u32>(); // checksum
        Some(TableRecord {
            tag,
            offset: s.read::<u32>()?,
            length: s.read::<u32>()?,
        })
    }
}

const SFNT_VERSION_TRUE_TYPE: u32 = 0x00010000;
const SFNT_VERSION_OPEN_TYPE: u32 = 0x4F54544F; // OTTO
const SFNT_VERSION_APPLE_TRUE: u32 = 0x74727565; // true
const SFNT_VERSION_TYPE_1: u32 = 0x74797031; // typ1
const SFNT_VERSION_OLD_MAC: u32 = 0x31000000; // 1\0\0\0

const TTC_HEADER_SIZE: usize = 12;

/// Returns the number of fonts stored in a TrueType font collection.
///
/// Returns `None` if the data is not a font collection.
pub fn fonts_in_collection(data: &[u8]) -> Option<u32> {
    let mut s = Stream::new(data);
    if s.read_bytes(4)? != b"ttcf" {
        return None;
    }

    let version = s.read::<u32>()?;
    if version != 0x00010000 && version != 0x00020000 {
        return None;
    }

    s.read::<u32>()
}

/// A font face handle.
///
/// Borrows the font data; the caller keeps the buffer alive for the
/// lifetime of the face. A face is immutable after construction and
/// holds no hidden state, so it can be shared freely between threads.
#[derive(Clone)]
pub struct Face<'a> {
    cmap_subtable: &'a [u8],
    head: &'a [u8],
    hhea: &'a [u8],
    hmtx: hmtx::Table<'a>,
    glyf: Option<&'a [u8]>,
    loca: Option<loca::Table<'a>>,
    cff: Option<cff::Metadata<'a>>,
    os2: Option<&'a [u8]>,
    kern: Option<&'a [u8]>,
    gpos: Option<&'a [u8]>,
    svg: Option<&'a [u8]>,
    number_of_glyphs: NonZeroU16,
}

impl<'a> Face<'a> {
    /// Creates a `Face` from raw font data.
    ///
    /// `index` picks a font out of a TrueType collection; for a plain
    /// font it must be 0.
    ///
    /// Fails when the mandatory tables are missing or malformed:
    /// `cmap` (with a Unicode-compatible subtable), `head`, `hhea`,
    /// `hmtx`, `maxp`, and either `glyf` + `loca` or `CFF `.
    pub fn parse(data: &'a [u8], index: u32) -> Option<Self> {
        let table_data = if let Some(n) = fonts_in_collection(data) {
            if index >= n {
                return None;
            }

            const OFFSET_32_SIZE: usize = 4;
            let offset_pos = TTC_HEADER_SIZE.checked_add(OFFSET_32_SIZE.checked_mul(usize::num_from(index))?)?;
            let font_offset = Stream::read_at::<u32>(data, offset_pos)?;
            data.get(usize::num_from(font_offset)..)?
        } else {
            if index != 0 {
                return None;
            }

            data
        };

        let mut s = Stream::new(table_data);
        let sfnt_version = s.read::<u32>()?;
        match sfnt_version {
            SFNT_VERSION_TRUE_TYPE
            | SFNT_VERSION_OPEN_TYPE
            | SFNT_VERSION_APPLE_TRUE
            | SFNT_VERSION_TYPE_1
            | SFNT_VERSION_OLD_MAC => {}
            _ => return None,
        }

        let num_tables = s.read::<u16>()?;
        s.advance(6); // searchRange (u16) + entrySelector (u16) + rangeShift (u16)
        let tables = s.read_array16::<TableRecord>(num_tables)?;

        let mut cff = None;
        let mut cmap = None;
        let mut glyf = None;
        let mut gpos = None;
        let mut head = None;
        let mut hhea = None;
        let mut hmtx = None;
        let mut kern = None;
        let mut loca = None;
        let mut maxp = None;
        let mut os2 = None;
        let mut svg = None;
        for table in tables {
            let start = usize::num_from(table.offset);
            let end = start.checked_add(usize::num_from(table.length));
            let range = match end {
                Some(end) => start..end,
                None => continue,
            };

            // Table offsets are relative to the whole file,
            // also for collection members.
            match &table.tag {
                b"CFF " => cff = data.get(range).and_then(cff::parse_metadata),
                b"GPOS" => gpos = data.get(range),
                b"OS/2" => os2 = data.get(range).and_then(os2::parse),
                b"SVG " => svg = data.get(range),
                b"cmap" => cmap = data.get(range).and_then(cmap::parse),
                b"glyf" => glyf = data.get(range),
                b"head" => head = data.get(range).and_then(head::parse),
                b"hhea" => hhea = data.get(range).and_then(hhea::parse),
                b"hmtx" => hmtx = data.get(range),
                b"kern" => kern = data.get(range),
                b"loca" => loca = data.get(range),
                b"maxp" => maxp = data.get(range).and_then(maxp::parse),
                _ => {}
            }
        }

        // Check the mandatory tables.
        let head = head?;
        let hhea = hhea?;
        let number_of_glyphs = maxp?;
        let cmap_subtable = cmap?;

        let hmtx = {
            let number_of_h_metrics = hhea::number_of_h_metrics(hhea)?;
            hmtx::Table::parse(hmtx?, number_of_h_metrics, number_of_glyphs)?
        };

        let loca = match (loca, head::index_to_loc_format(head)) {
            (Some(data), Some(format)) => loca::Table::parse(data, number_of_glyphs, format),
            _ => None,
        };

        // An outline source is mandatory: either glyf + loca or CFF.
        let (glyf, loca) = match (glyf, loca) {
            (Some(glyf), Some(loca)) => (Some(glyf), Some(loca)),
            _ => (None, None),
        };
        if glyf.is_none() && cff.is_none() {
            return None;
        }

        Some(Face {
            cmap_subtable,
            head,
            hhea,
            hmtx,
            glyf,
            loca,
            cff,
            os2,
            kern,
            gpos,
            svg,
            number_of_glyphs,
        })
    }

    /// Returns the total number of glyphs in the face.
    ///
    /// Never zero.
    #[inline]
    pub fn number_of_glyphs(&self) -> u16 {
        self.number_of_glyphs.get()
    }

    /// Resolves a Unicode codepoint to a glyph ID.
    ///
    /// Total over all codepoints: any unmapped or out-of-range result is
    /// the missing glyph, reported as `None`.
    #[inline]
    pub fn glyph_index(&self, code_point: u32) -> Option<GlyphId> {
        let index = cmap::glyph_index(self.cmap_subtable, code_point)?;
        // A malformed cmap may map outside the glyph count.
        if index < self.number_of_glyphs.get() {
            Some(GlyphId(index))
        } else {
            None
        }
    }

    /// Resolves a `char` to a glyph ID.
    #[inline]
    pub fn glyph_index_char(&self, c: char) -> Option<GlyphId> {
        self.glyph_index(u32::from(c))
    }

    /// Returns the glyph's horizontal advance in font units.
    #[inline]
    pub fn glyph_hor_advance(&self, glyph_id: GlyphId) -> Option<u16> {
        self.hmtx.advance(glyph_id)
    }

    /// Returns the glyph's left side bearing in font units.
    #[inline]
    pub fn glyph_hor_side_bearing(&self, glyph_id: GlyphId) -> Option<i16> {
        self.hmtx.side_bearing(glyph_id)
    }

    /// Returns the kerning between two glyphs in font units.
    ///
    /// GPOS pair adjustment is preferred; the legacy `kern` table is
    /// used only when the font has no GPOS table.
    pub fn glyphs_kerning(&self, left: GlyphId, right: GlyphId) -> Option<i16> {
        if let Some(gpos_data) = self.gpos {
            gpos::glyphs_kerning(gpos_data, left, right)
        } else {
            kern::glyphs_kerning(self.kern?, left, right)
        }
    }

    /// Returns the face's ascender from `hhea`.
    #[inline]
    pub fn ascender(&self) -> i16 {
        hhea::ascender(self.hhea)
    }

    /// Returns the face's descender from `hhea`. Typically negative.
    #[inline]
    pub fn descender(&self) -> i16 {
        hhea::descender(self.hhea)
    }

    /// Returns the face's line gap from `hhea`.
    #[inline]
    pub fn line_gap(&self) -> i16 {
        hhea::line_gap(self.hhea)
    }

    /// Returns the typographic ascender from `OS/2`, when present.
    #[inline]
    pub fn typographic_ascender(&self) -> Option<i16> {
        self.os2.and_then(os2::typo_ascender)
    }

    /// Returns the typographic descender from `OS/2`, when present.
    #[inline]
    pub fn typographic_descender(&self) -> Option<i16> {
        self.os2.and_then(os2::typo_descender)
    }

    /// Returns the typographic line gap from `OS/2`, when present.
    #[inline]
    pub fn typographic_line_gap(&self) -> Option<i16> {
        self.os2.and_then(os2::typo_line_gap)
    }

    /// Checks that the face prefers its typographic metrics
    /// (`OS/2` fsSelection bit 7).
    #[inline]
    pub fn use_typographic_metrics(&self) -> bool {
        self.os2.map(os2::use_typographic_metrics).unwrap_or(false)
    }

    /// Returns the face's units per EM.
    ///
    /// `None` when the stored value is outside 16..=16384.
    #[inline]
    pub fn units_per_em(&self) -> Option<u16> {
        head::units_per_em(self.head)
    }

    /// Returns the face's global bounding box in font units.
    #[inline]
    pub fn global_bounding_box(&self) -> Rect {
        head::global_bbox(self.head).unwrap_or(Rect {
            x_min: 0,
            y_min: 0,
            x_max: 0,
            y_max: 0,
        })
    }

    /// Checks the bold bit of `head` macStyle.
    #[inline]
    pub fn is_bold(&self) -> bool {
        head::mac_style_bits(self.head) & mac_style::BOLD != 0
    }

    /// Checks the italic bit of `head` macStyle.
    #[inline]
    pub fn is_italic(&self) -> bool {
        head::mac_style_bits(self.head) & mac_style::ITALIC != 0
    }

    /// Computes the scale that maps the face's ascent-to-descent range
    /// to `height` pixels.
    #[inline]
    pub fn scale_for_pixel_height(&self, height: f32) -> f32 {
        let font_height = i32::from(self.ascender()) - i32::from(self.descender());
        if font_height != 0 {
            height / font_height as f32
        } else {
            0.0
        }
    }

    /// Computes the scale that maps one EM to `pixels` pixels.
    #[inline]
    pub fn scale_for_em_to_pixels(&self, pixels: f32) -> f32 {
        match self.units_per_em() {
            Some(units) => pixels / f32::from(units),
            None => 0.0,
        }
    }

    /// Outlines a glyph and returns its bounding box in font units.
    ///
    /// The builder may receive segments even when the outline turns out
    /// to be malformed, in which case `None` is returned and the partial
    /// output must be discarded.
    pub fn outline_glyph(
        &self,
        glyph_id: GlyphId,
        builder: &mut dyn OutlineBuilder,
    ) -> Option<Rect> {
        if let (Some(glyf_data), Some(loca_table)) = (self.glyf, self.loca) {
            return glyf::outline(loca_table, glyf_data, glyph_id, builder);
        }

        if let Some(ref metadata) = self.cff {
            return cff::outline(metadata, glyph_id, builder);
        }

        None
    }

    /// Returns a glyph's outline as a vertex stream.
    ///
    /// `None` for empty and malformed glyphs.
    pub fn glyph_shape(&self, glyph_id: GlyphId) -> Option<Vec<Vertex>> {
        let mut builder = ShapeBuilder(Vec::new());
        self.outline_glyph(glyph_id, &mut builder)?;
        Some(builder.0)
    }

    /// Returns a glyph's bounding box in font units.
    ///
    /// For `glyf` outlines this reads the stored box; for CFF the
    /// charstring is interpreted and the box computed.
    pub fn glyph_bounding_box(&self, glyph_id: GlyphId) -> Option<Rect> {
        if let (Some(glyf_data), Some(loca_table)) = (self.glyf, self.loca) {
            return glyf::bounding_box(loca_table, glyf_data, glyph_id);
        }

        if let Some(ref metadata) = self.cff {
            return cff::outline(metadata, glyph_id, &mut DummyOutline);
        }

        None
    }

    /// Checks that a glyph has no outline at all.
    #[inline]
    pub fn is_glyph_empty(&self, glyph_id: GlyphId) -> bool {
        self.glyph_bounding_box(glyph_id).is_none()
    }

    /// Returns a glyph's SVG document, when the face has an `SVG ` table.
    ///
    /// The document content is returned as-is and is not parsed.
    #[inline]
    pub fn glyph_svg_image(&self, glyph_id: GlyphId) -> Option<&'a [u8]> {
        self.svg.and_then(|data| svg::parse(data, glyph_id))
    }

    /// Computes where a glyph lands on the bitmap grid at the given
    /// scale and subpixel shift.
    ///
    /// The box is y-down. `None` for empty glyphs, which render to a
    /// zero-sized bitmap.
    pub fn glyph_bitmap_box(
        &self,
        glyph_id: GlyphId,
        scale_x: f32,
        scale_y: f32,
        shift_x: f32,
        shift_y: f32,
    ) -> Option<BitmapBox> {
        let rect = self.glyph_bounding_box(glyph_id)?;
        Some(raster::bitmap_box(rect, scale_x, scale_y, shift_x, shift_y))
    }

    /// Rasterizes a glyph into a new bitmap.
    ///
    /// The bitmap has exactly the dimensions of
    /// [`glyph_bitmap_box`](Self::glyph_bitmap_box). `None` for empty
    /// glyphs and degenerate scales.
    pub fn render_glyph(
        &self,
        glyph_id: GlyphId,
        scale_x: f32,
        scale_y: f32,
        shift_x: f32,
        shift_y: f32,
    ) -> Option<Bitmap> {
        let bbox = self.glyph_bitmap_box(glyph_id, scale_x, scale_y, shift_x, shift_y)?;
        let width = bbox.width();
        let height = bbox.height();
        if width == 0 || height == 0 {
            return None;
        }

        let mut pixels = vec![0; width as usize * height as usize];
        if !self.render_glyph_into(
            glyph_id,
            &mut pixels,
            width,
            height,
            width as usize,
            scale_x,
            scale_y,
            shift_x,
            shift_y,
        ) {
            return None;
        }

        Some(Bitmap {
            width,
            height,
            pixels,
        })
    }

    /// Rasterizes a glyph into caller-provided storage.
    ///
    /// `pixels` is interpreted as `height` rows of `width` bytes,
    /// `stride` bytes apart. The glyph is positioned by its own bitmap
    /// box, so rendering into a box-sized buffer places it exactly.
    ///
    /// Returns `false` without touching `pixels` when the glyph is empty
    /// or the buffer is too small.
    #[allow(clippy::too_many_arguments)]
    pub fn render_glyph_into(
        &self,
        glyph_id: GlyphId,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        scale_x: f32,
        scale_y: f32,
        shift_x: f32,
        shift_y: f32,
    ) -> bool {
        let width = width as usize;
        let height = height as usize;
        if width == 0 || height == 0 || stride < width {
            return false;
        }

        let required = stride
            .checked_mul(height - 1)
            .and_then(|n| n.checked_add(width));
        match required {
            Some(required) if pixels.len() >= required => {}
            _ => return false,
        }

        let scale = scale_x.min(scale_y);
        if scale <= 0.0 {
            return false;
        }

        let bbox = match self.glyph_bitmap_box(glyph_id, scale_x, scale_y, shift_x, shift_y) {
            Some(bbox) => bbox,
            None => return false,
        };

        // 0.35 px of tessellation error, expressed in font units.
        let mut flattener = raster::flatten::Flattener::new(0.35 / scale);
        if self.outline_glyph(glyph_id, &mut flattener).is_none() {
            return false;
        }
        let (points, contour_lengths) = flattener.finish();

        raster::rasterize_into(
            pixels,
            width,
            height,
            stride,
            &points,
            &contour_lengths,
            scale_x,
            scale_y,
            shift_x,
            shift_y,
            bbox.x_min,
            bbox.y_min,
            true,
        );

        true
    }

    /// Computes a glyph's signed distance field.
    ///
    /// The output box is the bitmap box at a uniform `scale`, expanded
    /// by `padding` pixels on all sides. Each byte is
    /// `onedge_value + distance * pixel_dist_scale`, clamped to 0..=255,
    /// where the distance is positive inside the glyph.
    pub fn glyph_sdf(
        &self,
        glyph_id: GlyphId,
        scale: f32,
        padding: i32,
        onedge_value: u8,
        pixel_dist_scale: f32,
    ) -> Option<Bitmap> {
        let rect = self.glyph_bounding_box(glyph_id)?;
        let shape = self.glyph_shape(glyph_id)?;
        raster::sdf::glyph_sdf(&shape, rect, scale, padding, onedge_value, pixel_dist_scale)
    }

    /// A shorthand for [`glyph_hor_advance`](Self::glyph_hor_advance)
    /// by codepoint.
    #[inline]
    pub fn char_hor_advance(&self, c: char) -> Option<u16> {
        self.glyph_hor_advance(self.glyph_index_char(c)?)
    }

    /// A shorthand for [`glyph_bitmap_box`](Self::glyph_bitmap_box)
    /// by codepoint.
    #[inline]
    pub fn char_bitmap_box(
        &self,
        c: char,
        scale_x: f32,
        scale_y: f32,
        shift_x: f32,
        shift_y: f32,
    ) -> Option<BitmapBox> {
        self.glyph_bitmap_box(self.glyph_index_char(c)?, scale_x, scale_y, shift_x, shift_y)
    }

    /// A shorthand for [`render_glyph`](Self::render_glyph) by codepoint.
    #[inline]
    pub fn render_char(
        &self,
        c: char,
        scale_x: f32,
        scale_y: f32,
        shift_x: f32,
        shift_y: f32,
    ) -> Option<Bitmap> {
        self.render_glyph(self.glyph_index_char(c)?, scale_x, scale_y, shift_x, shift_y)
    }

    /// A shorthand for [`glyph_sdf`](Self::glyph_sdf) by codepoint.
    #[inline]
    pub fn char_sdf(
        &self,
        c: char,
        scale: f32,
        padding: i32,
        onedge_value: u8,
        pixel_dist_scale: f32,
    ) -> Option<Bitmap> {
        self.glyph_sdf(
            self.glyph_index_char(c)?,
            scale,
            padding,
            onedge_value,
            pixel_dist_scale,
        )
    }
}

impl fmt::Debug for Face<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Face()")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{self, TtfType::*};

    fn build_font(magic: writer::TtfType, tables: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut w = writer::Writer::new();
        w.write(magic);
        w.write(UInt16(tables.len() as u16)); // numTables
        w.write(UInt16(0)); // searchRange
        w.write(UInt16(0)); // entrySelector
        w.write(UInt16(0)); // rangeShift

        let mut offset = 12 + 16 * tables.len();
        for (tag, data) in tables {
            w.data.extend_from_slice(*tag);
            w.write(UInt32(0)); // checksum
            w.write(UInt32(offset as u32));
            w.write(UInt32(data.len() as u32));
            offset += data.len();
        }

        for (_, data) in tables {
            w.data.extend_from_slice(data);
        }

        w.data
    }

    fn head_table() -> Vec<u8> {
        writer::convert(&[
            UInt32(0x00010000), // version
            UInt32(0),          // font revision
            UInt32(0),          // checksum adjustment
            UInt32(0x5F0F3CF5), // magic number
            UInt16(0),          // flags
            UInt16(1000),       // units per em
            Raw(&[0; 16]),      // created + modified
            Int16(0),           // x min
            Int16(0),           // y min
            Int16(200),         // x max
            Int16(200),         // y max
            UInt16(mac_style::BOLD), // mac style
            UInt16(8),          // lowest rec PPEM
            Int16(2),           // font direction hint
            Int16(0),           // index to loc format: short
            Int16(0),           // glyph data format
        ])
    }

    fn hhea_table(number_of_h_metrics: u16) -> Vec<u8> {
        writer::convert(&[
            UInt32(0x00010000), // version
            Int16(800),         // ascender
            Int16(-200),        // descender
            Int16(50),          // line gap
            UInt16(600),        // advance width max
            Int16(0),           // min left side bearing
            Int16(0),           // min right side bearing
            Int16(0),           // x max extent
            Int16(1),           // caret slope rise
            Int16(0),           // caret slope run
            Int16(0),           // caret offset
            Raw(&[0; 8]),       // reserved
            Int16(0),           // metric data format
            UInt16(number_of_h_metrics),
        ])
    }

    fn maxp_table(number_of_glyphs: u16) -> Vec<u8> {
        writer::convert(&[
            UInt32(0x00010000), // version
            UInt16(number_of_glyphs),
        ])
    }

    fn hmtx_table() -> Vec<u8> {
        writer::convert(&[
            UInt16(500), // advance width [0]
            Int16(0),    // side bearing [0]
            UInt16(600), // advance width [1]
            Int16(10),   // side bearing [1]
        ])
    }

    fn cmap_table() -> Vec<u8> {
        writer::convert(&[
            UInt16(0), // version
            UInt16(1), // encoding records count
            // Record [0]: Windows Unicode BMP
            UInt16(3),  // platform ID
            UInt16(1),  // encoding ID
            UInt32(12), // offset
            // Format 4 subtable, maps 'A' (0x41) to glyph 1.
            UInt16(4),  // format
            UInt16(32), // length
            UInt16(0),  // language
            UInt16(4),  // 2 x segCount
            UInt16(2),  // search range
            UInt16(0),  // entry selector
            UInt16(2),  // range shift
            UInt16(0x41),   // end char code [0]
            UInt16(0xFFFF), // end char code [1]
            UInt16(0),      // reserved
            UInt16(0x41),   // start char code [0]
            UInt16(0xFFFF), // start char code [1]
            Int16(-64),     // id delta [0]
            Int16(1),       // id delta [1]
            UInt16(0),      // id range offset [0]
            UInt16(0),      // id range offset [1]
        ])
    }

    fn loca_table() -> Vec<u8> {
        writer::convert(&[
            UInt16(0),  // offset [0]: 0
            UInt16(0),  // offset [1]: 0 <-- glyph 0 is empty
            UInt16(11), // offset [2]: 22 / 2
        ])
    }

    // A single-contour 200x200 square.
    fn glyf_table() -> Vec<u8> {
        writer::convert(&[
            Int16(1),    // number of contours
            Int16(0),    // x min
            Int16(0),    // y min
            Int16(200),  // x max
            Int16(200),  // y max
            UInt16(3),   // endPtsOfContours [0]
            UInt16(0),   // instructions length
            UInt8(0x31), // flag [0]: on curve, x same, y same
            UInt8(0x33), // flag [1]: on curve, x short positive, y same
            UInt8(0x35), // flag [2]: on curve, x same, y short positive
            UInt8(0x23), // flag [3]: on curve, x short negative, y same
            UInt8(200),  // x delta [1]
            UInt8(200),  // x delta [3]
            UInt8(200),  // y delta [2]
            UInt8(0),    // padding
        ])
    }

    fn kern_table() -> Vec<u8> {
        writer::convert(&[
            UInt16(0), // version
            UInt16(1), // number of tables
            UInt16(0), // subtable version
            UInt16(20), // subtable length
            UInt16(1), // format 0, horizontal coverage
            UInt16(1), // number of pairs
            UInt16(6), // search range
            UInt16(0), // entry selector
            UInt16(0), // range shift
            UInt16(1), // left glyph
            UInt16(1), // right glyph
            Int16(-50), // value
        ])
    }

    // A Type 2 charstring drawing an open triangle: 10 20 rmoveto,
    // then 100 30 hlineto.
    fn cff_table() -> Vec<u8> {
        writer::convert(&[
            UInt8(1), // major version
            UInt8(0), // minor version
            UInt8(4), // header size
            UInt8(0), // absolute offset size
            UInt16(0), // Name INDEX: count 0
            // Top DICT INDEX
            UInt16(1), // count
            UInt8(1),  // offset size
            UInt8(1),  // index [0]
            UInt8(3),  // index [1]
            CFFInt(17), // CharStrings offset
            UInt8(17),  // CharStrings operator
            UInt16(0), // String INDEX: count 0
            UInt16(0), // Global Subr INDEX: count 0
            // CharStrings INDEX
            UInt16(1), // count
            UInt8(1),  // offset size
            UInt8(1),  // index [0]
            UInt8(8),  // index [1]
            // Glyph 0
            CFFInt(10),
            CFFInt(20),
            UInt8(21), // rmoveto
            CFFInt(100),
            CFFInt(30),
            UInt8(6), // hlineto
            UInt8(14), // endchar
        ])
    }

    fn test_font() -> Vec<u8> {
        build_font(
            TrueTypeMagic,
            &[
                (b"cmap", &cmap_table()),
                (b"glyf", &glyf_table()),
                (b"head", &head_table()),
                (b"hhea", &hhea_table(2)),
                (b"hmtx", &hmtx_table()),
                (b"kern", &kern_table()),
                (b"loca", &loca_table()),
                (b"maxp", &maxp_table(2)),
            ],
        )
    }

    fn test_cff_font() -> Vec<u8> {
        build_font(
            OpenTypeMagic,
            &[
                (b"CFF ", &cff_table()),
                (b"cmap", &cmap_table()),
                (b"head", &head_table()),
                (b"hhea", &hhea_table(1)),
                (b"hmtx", &writer::convert(&[UInt16(500), Int16(0)])),
                (b"maxp", &maxp_table(1)),
            ],
        )
    }

    #[test]
    fn empty_font() {
        assert!(Face::parse(&[], 0).is_none());
    }

    #[test]
    fn incomplete_header() {
        let data = writer::convert(&[
            TrueTypeMagic,
            UInt16(0), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        for i in 0..data.len() {
            assert!(Face::parse(&data[0..i], 0).is_none());
        }
    }

    #[test]
    fn zero_tables() {
        let data = writer::convert(&[
            TrueTypeMagic,
            UInt16(0), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        assert!(Face::parse(&data, 0).is_none());
    }

    #[test]
    fn tables_count_overflow() {
        let data = writer::convert(&[
            TrueTypeMagic,
            UInt16(u16::MAX), // numTables
            UInt16(0),        // searchRange
            UInt16(0),        // entrySelector
            UInt16(0),        // rangeShift
        ]);

        assert!(Face::parse(&data, 0).is_none());
    }

    #[test]
    fn open_type_magic_without_tables() {
        let data = writer::convert(&[
            OpenTypeMagic,
            UInt16(0), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        assert!(Face::parse(&data, 0).is_none());
    }

    #[test]
    fn unknown_magic() {
        let data = writer::convert(&[
            Raw(&[0xFF, 0xFF, 0xFF, 0xFF]),
            UInt16(0), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        assert!(Face::parse(&data, 0).is_none());
    }

    #[test]
    fn empty_font_collection() {
        let data = writer::convert(&[
            FontCollectionMagic,
            UInt16(1), // majorVersion
            UInt16(0), // minorVersion
            UInt32(0), // numFonts
        ]);

        assert_eq!(fonts_in_collection(&data), Some(0));
        assert!(Face::parse(&data, 0).is_none());
    }

    #[test]
    fn font_collection_num_fonts_overflow() {
        let data = writer::convert(&[
            FontCollectionMagic,
            UInt16(1),        // majorVersion
            UInt16(0),        // minorVersion
            UInt32(u32::MAX), // numFonts
        ]);

        assert_eq!(fonts_in_collection(&data), Some(u32::MAX));
        assert!(Face::parse(&data, 0).is_none());
    }

    #[test]
    fn font_collection_unknown_version() {
        let data = writer::convert(&[
            FontCollectionMagic,
            UInt16(3), // majorVersion
            UInt16(0), // minorVersion
            UInt32(1), // numFonts
        ]);

        assert_eq!(fonts_in_collection(&data), None);
    }

    #[test]
    fn font_index_overflow() {
        let data = writer::convert(&[
            FontCollectionMagic,
            UInt16(1), // majorVersion
            UInt16(0), // minorVersion
            UInt32(1), // numFonts
        ]);

        assert!(Face::parse(&data, u32::MAX).is_none());
    }

    #[test]
    fn plain_font_rejects_nonzero_index() {
        let data = test_font();
        assert!(Face::parse(&data, 0).is_some());
        assert!(Face::parse(&data, 1).is_none());
    }

    #[test]
    fn basic_queries() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        assert_eq!(face.number_of_glyphs(), 2);
        assert_eq!(face.units_per_em(), Some(1000));
        assert_eq!(face.ascender(), 800);
        assert_eq!(face.descender(), -200);
        assert_eq!(face.line_gap(), 50);
        assert!(face.is_bold());
        assert!(!face.is_italic());
        assert_eq!(
            face.global_bounding_box(),
            Rect {
                x_min: 0,
                y_min: 0,
                x_max: 200,
                y_max: 200
            }
        );
    }

    #[test]
    fn glyph_index_lookup() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        assert_eq!(face.glyph_index_char('A'), Some(GlyphId(1)));
        assert_eq!(face.glyph_index_char('B'), None);
        assert_eq!(face.glyph_index(0x10FFFF), None);
    }

    #[test]
    fn horizontal_metrics() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        assert_eq!(face.glyph_hor_advance(GlyphId(0)), Some(500));
        assert_eq!(face.glyph_hor_advance(GlyphId(1)), Some(600));
        assert_eq!(face.glyph_hor_side_bearing(GlyphId(1)), Some(10));
        assert_eq!(face.char_hor_advance('A'), Some(600));
    }

    #[test]
    fn kerning_fallback() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        // No GPOS table, so the `kern` table is used.
        assert_eq!(face.glyphs_kerning(GlyphId(1), GlyphId(1)), Some(-50));
        assert_eq!(face.glyphs_kerning(GlyphId(0), GlyphId(1)), None);
    }

    #[test]
    fn scale_factors() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        // ascender - descender is 1000.
        let scale = face.scale_for_pixel_height(20.0);
        assert!((scale * 1000.0 - 20.0).abs() < 1e-4);
        let scale = face.scale_for_em_to_pixels(16.0);
        assert!((scale * 1000.0 - 16.0).abs() < 1e-4);
    }

    #[test]
    fn empty_glyph() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        // Glyph 0 has no outline: no shape, no box, no bitmap.
        assert!(face.is_glyph_empty(GlyphId(0)));
        assert_eq!(face.glyph_shape(GlyphId(0)), None);
        assert_eq!(face.glyph_bitmap_box(GlyphId(0), 1.0, 1.0, 0.0, 0.0), None);
        assert!(face.render_glyph(GlyphId(0), 1.0, 1.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn glyph_shape_of_square() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        let shape = face.glyph_shape(GlyphId(1)).unwrap();
        assert_eq!(
            shape,
            vec![
                Vertex::MoveTo { x: 0.0, y: 0.0 },
                Vertex::LineTo { x: 200.0, y: 0.0 },
                Vertex::LineTo { x: 200.0, y: 200.0 },
                Vertex::LineTo { x: 0.0, y: 200.0 },
                Vertex::LineTo { x: 0.0, y: 0.0 },
                Vertex::Close,
            ]
        );

        assert_eq!(
            face.glyph_bounding_box(GlyphId(1)),
            Some(Rect {
                x_min: 0,
                y_min: 0,
                x_max: 200,
                y_max: 200
            })
        );
    }

    #[test]
    fn render_square_glyph() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        let bbox = face.glyph_bitmap_box(GlyphId(1), 0.01, 0.01, 0.0, 0.0).unwrap();
        assert_eq!(
            bbox,
            BitmapBox {
                x_min: 0,
                y_min: -2,
                x_max: 2,
                y_max: 0
            }
        );

        let bitmap = face.render_glyph(GlyphId(1), 0.01, 0.01, 0.0, 0.0).unwrap();
        // The bitmap matches the bitmap box exactly.
        assert_eq!(bitmap.width, bbox.width());
        assert_eq!(bitmap.height, bbox.height());
        // And the square covers it completely.
        assert!(bitmap.pixels.iter().all(|&p| p == 255));
    }

    #[test]
    fn render_into_respects_stride() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        let mut pixels = vec![0u8; 4 * 2];
        assert!(face.render_glyph_into(GlyphId(1), &mut pixels, 2, 2, 4, 0.01, 0.01, 0.0, 0.0));
        assert_eq!(pixels[0..2], [255, 255]);
        assert_eq!(pixels[4..6], [255, 255]);
        // Untouched padding bytes between rows.
        assert_eq!(pixels[2..4], [0, 0]);

        // A buffer that cannot hold the rows is rejected.
        let mut small = vec![0u8; 3];
        assert!(!face.render_glyph_into(GlyphId(1), &mut small, 2, 2, 4, 0.01, 0.01, 0.0, 0.0));
    }

    #[test]
    fn sdf_of_square() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        let sdf = face.glyph_sdf(GlyphId(1), 0.05, 2, 128, 20.0).unwrap();
        // 200 units at 0.05 px/unit is 10 px, plus 2 px of padding.
        assert_eq!(sdf.width, 14);
        assert_eq!(sdf.height, 14);

        // Center pixel is well inside, corner pixel is outside.
        let center = sdf.pixels[7 * 14 + 7] as i32;
        let corner = sdf.pixels[0] as i32;
        assert!(center > 128);
        assert!(corner < 128);
    }

    #[test]
    fn codepoint_wrappers() {
        let data = test_font();
        let face = Face::parse(&data, 0).unwrap();

        assert!(face.render_char('A', 0.01, 0.01, 0.0, 0.0).is_some());
        assert!(face.char_bitmap_box('A', 0.01, 0.01, 0.0, 0.0).is_some());
        assert!(face.char_sdf('A', 0.05, 2, 128, 20.0).is_some());
        assert!(face.render_char('B', 0.01, 0.01, 0.0, 0.0).is_none());
    }

    #[test]
    fn cff_face() {
        let data = test_cff_font();
        let face = Face::parse(&data, 0).unwrap();
        assert_eq!(face.number_of_glyphs(), 1);

        let shape = face.glyph_shape(GlyphId(0)).unwrap();
        assert_eq!(
            shape,
            vec![
                Vertex::MoveTo { x: 10.0, y: 20.0 },
                Vertex::LineTo { x: 110.0, y: 20.0 },
                Vertex::LineTo { x: 110.0, y: 50.0 },
                Vertex::Close,
            ]
        );

        // CFF bounding boxes are computed from the charstring.
        assert_eq!(
            face.glyph_bounding_box(GlyphId(0)),
            Some(Rect {
                x_min: 10,
                y_min: 20,
                x_max: 110,
                y_max: 50
            })
        );

        // The implicitly closed triangle rasterizes to something.
        let bitmap = face.render_glyph(GlyphId(0), 0.1, 0.1, 0.0, 0.0).unwrap();
        assert_eq!(bitmap.width, 10);
        assert_eq!(bitmap.height, 3);
        assert!(bitmap.pixels.iter().any(|&p| p > 0));
    }

    #[test]
    fn missing_mandatory_table() {
        // Without `maxp` the face must not parse.
        let font = build_font(
            TrueTypeMagic,
            &[
                (b"cmap", &cmap_table()),
                (b"glyf", &glyf_table()),
                (b"head", &head_table()),
                (b"hhea", &hhea_table(2)),
                (b"hmtx", &hmtx_table()),
                (b"loca", &loca_table()),
            ],
        );
        assert!(Face::parse(&font, 0).is_none());
    }

    #[test]
    fn missing_outline_source() {
        // Neither glyf + loca nor CFF.
        let font = build_font(
            TrueTypeMagic,
            &[
                (b"cmap", &cmap_table()),
                (b"head", &head_table()),
                (b"hhea", &hhea_table(2)),
                (b"hmtx", &hmtx_table()),
                (b"maxp", &maxp_table(2)),
            ],
        );
        assert!(Face::parse(&font, 0).is_none());
    }

    #[test]
    fn truncated_tables_are_rejected() {
        // Truncating the font anywhere must never panic.
        let data = test_font();
        for i in 0..data.len() {
            let face = Face::parse(&data[0..i], 0);
            if let Some(face) = face {
                // Queries on a partially out-of-range font stay safe.
                let _ = face.glyph_index_char('A');
                let _ = face.render_glyph(GlyphId(1), 0.01, 0.01, 0.0, 0.0);
            }
        }
    }

    #[test]
    fn collection_member_parses() {
        // A tiny TTC wrapping the test font once.
        let font = test_font();
        let mut w = writer::Writer::new();
        w.write(FontCollectionMagic);
        w.write(UInt16(1)); // majorVersion
        w.write(UInt16(0)); // minorVersion
        w.write(UInt32(1)); // numFonts
        w.write(UInt32(16)); // offset [0]
        // The member's table offsets are relative to the whole file.
        let mut data = w.data;
        let shift = data.len() as u32; // 16
        let mut member = font.clone();
        // Patch the table record offsets.
        let num_tables = u16::from_be_bytes([member[4], member[5]]) as usize;
        for i in 0..num_tables {
            let pos = 12 + 16 * i + 8;
            let old = u32::from_be_bytes([
                member[pos],
                member[pos + 1],
                member[pos + 2],
                member[pos + 3],
            ]);
            member[pos..pos + 4].copy_from_slice(&(old + shift).to_be_bytes());
        }
        data.extend_from_slice(&member);

        assert_eq!(fonts_in_collection(&data), Some(1));
        let face = Face::parse(&data, 0).unwrap();
        assert_eq!(face.number_of_glyphs(), 2);
        assert_eq!(face.glyph_index_char('A'), Some(GlyphId(1)));
        assert!(Face::parse(&data, 1).is_none());
    }
}
