// https://docs.microsoft.com/en-us/typography/opentype/spec/glyf

use crate::parser::{F2DOT14, Stream};
use crate::tables::loca;
use crate::{GlyphId, OutlineBuilder, Rect};

// https://docs.microsoft.com/en-us/typography/opentype/spec/glyf#simple-glyph-description
mod simple_flags {
    pub const ON_CURVE_POINT: u8 = 1 << 0;
    pub const X_SHORT_VECTOR: u8 = 1 << 1;
    pub const Y_SHORT_VECTOR: u8 = 1 << 2;
    pub const REPEAT_FLAG: u8 = 1 << 3;
    pub const X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR: u8 = 1 << 4;
    pub const Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR: u8 = 1 << 5;
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/glyf#composite-glyph-description
mod composite_flags {
    pub const ARG_1_AND_2_ARE_WORDS: u16 = 1 << 0;
    pub const ARGS_ARE_XY_VALUES: u16 = 1 << 1;
    pub const WE_HAVE_A_SCALE: u16 = 1 << 3;
    pub const MORE_COMPONENTS: u16 = 1 << 5;
    pub const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 1 << 6;
    pub const WE_HAVE_A_TWO_BY_TWO: u16 = 1 << 7;
}

// A malformed font can have a compound glyph that references itself.
// The composition depth cap turns such cycles into a bounded failure.
const MAX_COMPONENTS: u8 = 32;

pub(crate) struct Builder<'a> {
    builder: &'a mut dyn OutlineBuilder,
    transform: Transform,
    is_default_ts: bool, // `bool` is faster than `Option` or `is_default()`.
}

impl<'a> Builder<'a> {
    #[inline]
    fn new(transform: Transform, builder: &'a mut dyn OutlineBuilder) -> Self {
        Builder {
            builder,
            is_default_ts: transform.is_default(),
            transform,
        }
    }

    #[inline]
    fn move_to(&mut self, mut x: f32, mut y: f32) {
        if !self.is_default_ts {
            self.transform.apply_to(&mut x, &mut y);
        }
        self.builder.move_to(x, y);
    }

    #[inline]
    fn line_to(&mut self, mut x: f32, mut y: f32) {
        if !self.is_default_ts {
            self.transform.apply_to(&mut x, &mut y);
        }
        self.builder.line_to(x, y);
    }

    #[inline]
    fn quad_to(&mut self, mut x1: f32, mut y1: f32, mut x: f32, mut y: f32) {
        if !self.is_default_ts {
            self.transform.apply_to(&mut x1, &mut y1);
            self.transform.apply_to(&mut x, &mut y);
        }
        self.builder.quad_to(x1, y1, x, y);
    }

    #[inline]
    fn close(&mut self) {
        self.builder.close();
    }
}

#[derive(Clone, Copy)]
pub(crate) struct Transform {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Transform {
    #[inline]
    fn combine(ts1: Self, ts2: Self) -> Self {
        Transform {
            a: ts1.a * ts2.a + ts1.c * ts2.b,
            b: ts1.b * ts2.a + ts1.d * ts2.b,
            c: ts1.a * ts2.c + ts1.c * ts2.d,
            d: ts1.b * ts2.c + ts1.d * ts2.d,
            e: ts1.a * ts2.e + ts1.c * ts2.f + ts1.e,
            f: ts1.b * ts2.e + ts1.d * ts2.f + ts1.f,
        }
    }

    #[inline]
    fn apply_to(&self, x: &mut f32, y: &mut f32) {
        let tx = *x;
        let ty = *y;
        *x = self.a * tx + self.c * ty + self.e;
        *y = self.b * tx + self.d * ty + self.f;
    }

    #[inline]
    fn is_default(&self) -> bool {
        // A direct float comparison is fine in our case.
        self.a == 1.0
            && self.b == 0.0
            && self.c == 0.0
            && self.d == 1.0
            && self.e == 0.0
            && self.f == 0.0
    }
}

impl Default for Transform {
    #[inline]
    fn default() -> Self {
        Transform {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }
}

/// Outlines a glyph and returns its bounding box as stored in the glyph header.
pub(crate) fn outline(
    loca_table: loca::Table,
    glyf_data: &[u8],
    glyph_id: GlyphId,
    builder: &mut dyn OutlineBuilder,
) -> Option<Rect> {
    let mut b = Builder::new(Transform::default(), builder);
    let range = loca_table.glyph_range(glyph_id)?;
    let glyph_data = glyf_data.get(range)?;
    outline_impl(loca_table, glyf_data, glyph_data, 0, &mut b)
}

/// Returns the bounding box stored in the glyph header.
pub(crate) fn bounding_box(
    loca_table: loca::Table,
    glyf_data: &[u8],
    glyph_id: GlyphId,
) -> Option<Rect> {
    let range = loca_table.glyph_range(glyph_id)?;
    let glyph_data = glyf_data.get(range)?;
    let mut s = Stream::new(glyph_data);
    s.skip::<i16>(); // numberOfContours
    parse_bbox(&mut s)
}

#[inline]
fn parse_bbox(s: &mut Stream) -> Option<Rect> {
    Some(Rect {
        x_min: s.read::<i16>()?,
        y_min: s.read::<i16>()?,
        x_max: s.read::<i16>()?,
        y_max: s.read::<i16>()?,
    })
}

fn outline_impl(
    loca_table: loca::Table,
    glyf_data: &[u8],
    glyph_data: &[u8],
    depth: u8,
    builder: &mut Builder,
) -> Option<Rect> {
    if depth >= MAX_COMPONENTS {
        warn!("glyph composition depth limit reached");
        return None;
    }

    let mut s = Stream::new(glyph_data);
    let number_of_contours = s.read::<i16>()?;
    let rect = parse_bbox(&mut s)?;

    if number_of_contours > 0 {
        parse_simple_outline(s.tail()?, number_of_contours as u16, builder)?;
    } else if number_of_contours < 0 {
        parse_composite_outline(loca_table, glyf_data, s.tail()?, depth, builder)?;
    }
    // A zero contour count is a valid empty glyph.

    Some(rect)
}

#[inline(never)]
fn parse_simple_outline(
    glyph_data: &[u8],
    number_of_contours: u16,
    builder: &mut Builder,
) -> Option<()> {
    let mut s = Stream::new(glyph_data);
    let endpoints = s.read_array16::<u16>(number_of_contours)?;

    let points_total = {
        let last_point = endpoints.last()?;
        // Prevent overflow.
        if last_point == u16::MAX {
            return None;
        }
        last_point + 1
    };

    let instructions_len = s.read::<u16>()?;
    s.advance(usize::from(instructions_len));

    let flags_offset = s.offset();
    let x_coords_len = resolve_x_coords_len(&mut s, points_total)?;
    let x_coords_offset = s.offset();
    let y_coords_offset = x_coords_offset + usize::from(x_coords_len);

    let mut points = GlyphPoints {
        flags: Stream::new(glyph_data.get(flags_offset..x_coords_offset)?),
        x_coords: Stream::new(glyph_data.get(x_coords_offset..y_coords_offset)?),
        y_coords: Stream::new(glyph_data.get(y_coords_offset..)?),
        points_left: points_total,
        flag_repeats: 0,
        last_flags: 0,
        x: 0,
        y: 0,
    };

    let mut total = 0u16;
    let mut last = 0u16;
    for n in endpoints {
        if n < last {
            // Endpoints must be in an increasing order.
            break;
        }
        last = n;

        // Check for overflow.
        if n == u16::MAX {
            break;
        }

        let n = n + 1 - total;
        total += n;

        // A contour must have at least two points.
        if n >= 2 {
            parse_contour(points.by_ref().take(usize::from(n)), builder);
        } else {
            // Keep the point streams aligned.
            for _ in points.by_ref().take(usize::from(n)) {}
        }
    }

    Some(())
}

/// Resolves the X coordinates length.
///
/// The length depends on the *Simple Glyph Flags*, so we have to process
/// them all to find it.
fn resolve_x_coords_len(s: &mut Stream, points_total: u16) -> Option<u16> {
    use simple_flags::*;

    let mut flags_left = points_total;
    let mut x_coords_len = 0u16;
    while flags_left > 0 {
        let flags = s.read::<u8>()?;

        // The number of times a glyph point repeats.
        let repeats = if flags & REPEAT_FLAG != 0 {
            u16::from(s.read::<u8>()?) + 1
        } else {
            1
        };

        if flags & X_SHORT_VECTOR != 0 {
            // Coordinate is 1 byte long.
            x_coords_len = x_coords_len.checked_add(repeats)?;
        } else if flags & X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR == 0 {
            // Coordinate is 2 bytes long.
            x_coords_len = x_coords_len.checked_add(repeats.checked_mul(2)?)?;
        }

        flags_left = flags_left.saturating_sub(repeats);
    }

    Some(x_coords_len)
}

#[derive(Clone, Copy)]
struct GlyphPoint {
    x: i16,
    y: i16,
    on_curve: bool,
}

struct GlyphPoints<'a> {
    flags: Stream<'a>,
    x_coords: Stream<'a>,
    y_coords: Stream<'a>,
    points_left: u16,
    flag_repeats: u8,
    last_flags: u8,
    x: i16,
    y: i16,
}

impl<'a> Iterator for GlyphPoints<'a> {
    type Item = GlyphPoint;

    fn next(&mut self) -> Option<Self::Item> {
        use simple_flags::*;

        if self.points_left == 0 {
            return None;
        }

        if self.flag_repeats == 0 {
            self.last_flags = self.flags.read::<u8>()?;
            if self.last_flags & REPEAT_FLAG != 0 {
                self.flag_repeats = self.flags.read::<u8>()?;
            }
        } else {
            self.flag_repeats -= 1;
        }

        let dx = parse_coord(
            self.last_flags,
            X_SHORT_VECTOR,
            X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR,
            &mut self.x_coords,
        )?;
        self.x = self.x.wrapping_add(dx);

        let dy = parse_coord(
            self.last_flags,
            Y_SHORT_VECTOR,
            Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR,
            &mut self.y_coords,
        )?;
        self.y = self.y.wrapping_add(dy);

        self.points_left -= 1;

        Some(GlyphPoint {
            x: self.x,
            y: self.y,
            on_curve: self.last_flags & ON_CURVE_POINT != 0,
        })
    }
}

fn parse_coord(flags: u8, short_vector: u8, same_or_positive: u8, coords: &mut Stream) -> Option<i16> {
    match (flags & short_vector != 0, flags & same_or_positive != 0) {
        (true, true) => Some(i16::from(coords.read::<u8>()?)),
        (true, false) => Some(-i16::from(coords.read::<u8>()?)),
        // Keep the previous coordinate.
        (false, true) => Some(0),
        (false, false) => coords.read::<i16>(),
    }
}

/// Emits a contour's segments.
///
/// Rules:
/// - an on-curve point after an off-curve one closes a quad;
/// - two off-curve points in a row imply an on-curve midpoint between them;
/// - a contour that begins off-curve starts at the midpoint towards the
///   next point, or at the next point itself when that one is on-curve.
///
/// The closing segment back to the start obeys the same midpoint rules.
fn parse_contour(mut points: core::iter::Take<&mut GlyphPoints>, builder: &mut Builder) {
    let first = match points.next() {
        Some(p) => p,
        None => return,
    };

    let mut start_off = None;
    let mut pending = None;
    let (sx, sy);
    if first.on_curve {
        sx = f32::from(first.x);
        sy = f32::from(first.y);
    } else {
        start_off = Some((f32::from(first.x), f32::from(first.y)));
        match points.next() {
            Some(second) if second.on_curve => {
                sx = f32::from(second.x);
                sy = f32::from(second.y);
            }
            Some(second) => {
                sx = (f32::from(first.x) + f32::from(second.x)) / 2.0;
                sy = (f32::from(first.y) + f32::from(second.y)) / 2.0;
                pending = Some(second);
            }
            None => return,
        }
    }

    builder.move_to(sx, sy);

    let mut was_off = false;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for point in pending.into_iter().chain(points) {
        let x = f32::from(point.x);
        let y = f32::from(point.y);
        if point.on_curve {
            if was_off {
                builder.quad_to(cx, cy, x, y);
                was_off = false;
            } else {
                builder.line_to(x, y);
            }
        } else {
            if was_off {
                builder.quad_to(cx, cy, (cx + x) / 2.0, (cy + y) / 2.0);
            }
            cx = x;
            cy = y;
            was_off = true;
        }
    }

    if let Some((ox, oy)) = start_off {
        if was_off {
            builder.quad_to(cx, cy, (cx + ox) / 2.0, (cy + oy) / 2.0);
        }
        builder.quad_to(ox, oy, sx, sy);
    } else if was_off {
        builder.quad_to(cx, cy, sx, sy);
    } else {
        builder.line_to(sx, sy);
    }

    builder.close();
}

#[inline(never)]
fn parse_composite_outline(
    loca_table: loca::Table,
    glyf_data: &[u8],
    data: &[u8],
    depth: u8,
    builder: &mut Builder,
) -> Option<()> {
    use composite_flags::*;

    let mut s = Stream::new(data);
    loop {
        let flags = s.read::<u16>()?;
        let glyph_id = s.read::<GlyphId>()?;

        let (arg1, arg2) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            (f32::from(s.read::<i16>()?), f32::from(s.read::<i16>()?))
        } else {
            (f32::from(s.read::<i8>()?), f32::from(s.read::<i8>()?))
        };

        let mut ts = Transform::default();
        if flags & ARGS_ARE_XY_VALUES != 0 {
            ts.e = arg1;
            ts.f = arg2;
        }
        // Otherwise the arguments are point-matching indices,
        // which are not supported; the translation stays zero.

        if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            ts.a = s.read::<F2DOT14>()?.0;
            ts.b = s.read::<F2DOT14>()?.0;
            ts.c = s.read::<F2DOT14>()?.0;
            ts.d = s.read::<F2DOT14>()?.0;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            ts.a = s.read::<F2DOT14>()?.0;
            ts.d = s.read::<F2DOT14>()?.0;
        } else if flags & WE_HAVE_A_SCALE != 0 {
            ts.a = s.read::<F2DOT14>()?.0;
            ts.d = ts.a;
        }

        // Per Apple's convention, each transformed axis is additionally
        // scaled by the length of its basis vector:
        // (x, y) -> (m * (a*x + c*y + e), n * (b*x + d*y + f)).
        let m = (ts.a * ts.a + ts.b * ts.b).sqrt();
        let n = (ts.c * ts.c + ts.d * ts.d).sqrt();
        let ts = Transform {
            a: m * ts.a,
            b: n * ts.b,
            c: m * ts.c,
            d: n * ts.d,
            e: m * ts.e,
            f: n * ts.f,
        };

        if let Some(range) = loca_table.glyph_range(glyph_id) {
            if let Some(glyph_data) = glyf_data.get(range) {
                let transform = Transform::combine(builder.transform, ts);
                let mut b = Builder::new(transform, builder.builder);
                outline_impl(loca_table, glyf_data, glyph_data, depth + 1, &mut b)?;
            }
        }

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }

    Some(())
}
