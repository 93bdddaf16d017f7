//! An analytic antialiased scanline rasterizer.
//!
//! Contours are converted to a sorted edge list and swept one scanline at
//! a time. Coverage is the exact signed trapezoid area each edge cuts out
//! of a pixel, so no supersampling is involved.

pub(crate) mod flatten;
pub(crate) mod sdf;

use crate::Rect;
use flatten::Point;

/// A grayscale bitmap.
///
/// Coverage bitmaps store 0 for transparent and 255 for opaque pixels.
/// Rows are `width` bytes long, top row first, y grows downwards.
#[derive(Clone, Debug)]
pub struct Bitmap {
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Row-major pixel data, `width * height` bytes.
    pub pixels: Vec<u8>,
}

/// A glyph's bounding box on the output bitmap, in pixels.
///
/// Unlike [`Rect`], this is y-down: the glyph's top maps to `y_min`.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub struct BitmapBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl BitmapBox {
    /// Box width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        (i64::from(self.x_max) - i64::from(self.x_min)).max(0) as u32
    }

    /// Box height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        (i64::from(self.y_max) - i64::from(self.y_min)).max(0) as u32
    }
}

/// Projects a font-units bounding box onto the bitmap grid.
///
/// The low corner is floored and the high one is ceiled, and the y axis
/// flips: glyphs are y-up while bitmaps are y-down.
pub(crate) fn bitmap_box(
    rect: Rect,
    scale_x: f32,
    scale_y: f32,
    shift_x: f32,
    shift_y: f32,
) -> BitmapBox {
    BitmapBox {
        x_min: (f32::from(rect.x_min) * scale_x + shift_x).floor() as i32,
        y_min: (-f32::from(rect.y_max) * scale_y + shift_y).floor() as i32,
        x_max: (f32::from(rect.x_max) * scale_x + shift_x).ceil() as i32,
        y_max: (-f32::from(rect.y_min) * scale_y + shift_y).ceil() as i32,
    }
}

#[derive(Clone, Copy, Default)]
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    /// The original orientation crossed scanlines upwards.
    invert: bool,
}

/// Rasterizes flattened contours into a caller-provided byte grid.
///
/// Every pixel of the grid is written, including uncovered ones.
/// `(off_x, off_y)` is the grid origin in bitmap space. With `invert`
/// set, `scale_y` is negated, which maps y-up outlines onto the y-down
/// grid.
#[allow(clippy::too_many_arguments)]
pub(crate) fn rasterize_into(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    stride: usize,
    points: &[Point],
    contour_lengths: &[usize],
    scale_x: f32,
    scale_y: f32,
    shift_x: f32,
    shift_y: f32,
    off_x: i32,
    off_y: i32,
    invert: bool,
) {
    if width == 0 || height == 0 || stride < width {
        return;
    }

    let required = stride
        .checked_mul(height - 1)
        .and_then(|n| n.checked_add(width));
    match required {
        Some(required) if pixels.len() >= required => {}
        _ => return,
    }

    let y_scale = if invert { -scale_y } else { scale_y };

    let mut edges = Vec::with_capacity(points.len() + 1);
    let mut base = 0;
    for &len in contour_lengths {
        let contour = match points.get(base..base + len) {
            Some(c) => c,
            None => return,
        };
        base += len;

        if len < 2 {
            continue;
        }

        let mut j = len - 1;
        for k in 0..len {
            let p = contour[j];
            let q = contour[k];
            j = k;

            // Horizontal segments contribute no area.
            if p.y == q.y {
                continue;
            }

            // Order the endpoints top-down in bitmap space and remember
            // the original winding direction.
            let invert_edge = if invert { p.y > q.y } else { p.y < q.y };
            let (a, b) = if invert_edge { (p, q) } else { (q, p) };

            edges.push(Edge {
                x0: a.x * scale_x + shift_x,
                y0: a.y * y_scale + shift_y,
                x1: b.x * scale_x + shift_x,
                y1: b.y * y_scale + shift_y,
                invert: invert_edge,
            });
        }
    }

    sort_edges(&mut edges);

    // A sentinel so the sweep's admission loop always stops.
    edges.push(Edge {
        y0: (off_y + height as i32) as f32 + 1.0,
        ..Edge::default()
    });

    sweep(pixels, width, height, stride, &edges, off_x, off_y);
}

#[inline]
fn edge_above(a: &Edge, b: &Edge) -> bool {
    a.y0 < b.y0
}

fn sort_edges(edges: &mut [Edge]) {
    quicksort_edges(edges);
    insertion_sort_edges(edges);
}

fn insertion_sort_edges(p: &mut [Edge]) {
    for i in 1..p.len() {
        let t = p[i];
        let mut j = i;
        while j > 0 {
            if !edge_above(&t, &p[j - 1]) {
                break;
            }
            p[j] = p[j - 1];
            j -= 1;
        }
        if i != j {
            p[j] = t;
        }
    }
}

// A median-of-three quicksort that leaves runs shorter than the
// insertion-sort threshold unsorted for the final pass.
fn quicksort_edges(mut p: &mut [Edge]) {
    while p.len() > 12 {
        let n = p.len();
        let m = n >> 1;

        // Compute the median of three.
        let c01 = edge_above(&p[0], &p[m]);
        let c12 = edge_above(&p[m], &p[n - 1]);
        if c01 != c12 {
            // Otherwise the median is one of the outer elements.
            let c = edge_above(&p[0], &p[n - 1]);
            let z = if c == c12 { 0 } else { n - 1 };
            p.swap(z, m);
        }

        // Now p[m] is the median of three. Move it to the front so it
        // stays put during partitioning.
        p.swap(0, m);

        let mut i = 1;
        let mut j = n - 1;
        loop {
            // The handling of equality here is crucial for the
            // sentinel-free inner loops.
            loop {
                if !edge_above(&p[i], &p[0]) {
                    break;
                }
                i += 1;
            }
            loop {
                if !edge_above(&p[0], &p[j]) {
                    break;
                }
                j -= 1;
            }

            if i >= j {
                break;
            }

            p.swap(i, j);
            i += 1;
            j -= 1;
        }

        // Recurse on the smaller side, iterate on the larger one.
        if j < n - i {
            let (left, right) = p.split_at_mut(i);
            quicksort_edges(&mut left[..j]);
            p = right;
        } else {
            let (left, right) = p.split_at_mut(i);
            quicksort_edges(right);
            p = &mut left[..j];
        }
    }
}

#[derive(Clone, Copy, Default)]
struct ActiveEdge {
    /// Arena handle of the next list node; 0 is the end of the list.
    next: u32,
    /// Current x at the top of the scanline.
    fx: f32,
    /// dx/dy.
    fdx: f32,
    /// dy/dx, or 0 for vertical edges.
    fdy: f32,
    /// +1 or -1, the winding sign.
    direction: f32,
    sy: f32,
    ey: f32,
}

impl ActiveEdge {
    fn new(e: &Edge, off_x: i32, start_point: f32) -> Self {
        let dxdy = (e.x1 - e.x0) / (e.y1 - e.y0);
        ActiveEdge {
            next: 0,
            fdx: dxdy,
            fdy: if dxdy != 0.0 { 1.0 / dxdy } else { 0.0 },
            fx: e.x0 + dxdy * (start_point - e.y0) - off_x as f32,
            direction: if e.invert { 1.0 } else { -1.0 },
            sy: e.y0,
            ey: e.y1,
        }
    }
}

/// The active edge pool.
///
/// Nodes are addressed by `index + 1` handles (0 is "none") and freed
/// slots are threaded into a free list through `next`, preserving the
/// O(1) insert/remove of a pointer-based intrusive list.
struct EdgeArena {
    nodes: Vec<ActiveEdge>,
    free_head: u32,
}

impl EdgeArena {
    fn new() -> Self {
        EdgeArena {
            nodes: Vec::new(),
            free_head: 0,
        }
    }

    fn alloc(&mut self, node: ActiveEdge) -> u32 {
        if self.free_head != 0 {
            let handle = self.free_head;
            self.free_head = self.nodes[(handle - 1) as usize].next;
            self.nodes[(handle - 1) as usize] = node;
            handle
        } else {
            self.nodes.push(node);
            self.nodes.len() as u32
        }
    }

    fn release(&mut self, handle: u32) {
        self.nodes[(handle - 1) as usize].next = self.free_head;
        self.free_head = handle;
    }

    #[inline]
    fn get(&self, handle: u32) -> &ActiveEdge {
        &self.nodes[(handle - 1) as usize]
    }

    #[inline]
    fn get_mut(&mut self, handle: u32) -> &mut ActiveEdge {
        &mut self.nodes[(handle - 1) as usize]
    }
}

fn sweep(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    stride: usize,
    edges: &[Edge],
    off_x: i32,
    off_y: i32,
) {
    let mut arena = EdgeArena::new();
    let mut active: u32 = 0;

    // Coverage deltas for the current row, plus the carry array telling
    // every pixel to the right of an edge that it is covered by the
    // edge's height. The carry is offset by one pixel.
    let mut scanline = vec![0.0f32; width];
    let mut scanline_fill = vec![0.0f32; width + 1];

    let mut e = 0;
    let mut y = off_y;
    let mut j = 0;
    while j < height {
        // Find center of pixel for this scanline.
        let scan_y_top = y as f32;
        let scan_y_bottom = y as f32 + 1.0;

        for v in scanline.iter_mut() {
            *v = 0.0;
        }
        for v in scanline_fill.iter_mut() {
            *v = 0.0;
        }

        // Update all active edges: remove the ones that terminate
        // before the top of this scanline.
        let mut prev: u32 = 0;
        let mut cur = active;
        while cur != 0 {
            let node = *arena.get(cur);
            if node.ey <= scan_y_top {
                if prev == 0 {
                    active = node.next;
                } else {
                    arena.get_mut(prev).next = node.next;
                }
                arena.release(cur);
                cur = node.next;
            } else {
                prev = cur;
                cur = node.next;
            }
        }

        // Insert all edges that start before the bottom of this scanline.
        while e < edges.len() && edges[e].y0 <= scan_y_bottom {
            if edges[e].y0 != edges[e].y1 {
                let mut node = ActiveEdge::new(&edges[e], off_x, scan_y_top);
                if j == 0 && off_y != 0 {
                    // This can happen due to subpixel positioning and
                    // some kind of fp rounding error.
                    if node.ey < scan_y_top {
                        node.ey = scan_y_top;
                    }
                }
                debug_assert!(node.ey >= scan_y_top);
                node.next = active;
                active = arena.alloc(node);
            }
            e += 1;
        }

        // Now process all active edges.
        if active != 0 {
            fill_active_edges(&mut scanline, &mut scanline_fill, width, &arena, active, scan_y_top);
        }

        {
            let mut sum = 0.0f32;
            for i in 0..width {
                sum += scanline_fill[i];
                let k = scanline[i] + sum;
                // The absolute value implements the non-zero winding
                // rule for counter-clockwise-outlined holes.
                let k = k.abs() * 255.0 + 0.5;
                let mut m = k as i32;
                if m > 255 {
                    m = 255;
                }
                pixels[j * stride + i] = m as u8;
            }
        }

        // Advance all the edges.
        let mut cur = active;
        while cur != 0 {
            let node = arena.get_mut(cur);
            node.fx += node.fdx;
            cur = node.next;
        }

        y += 1;
        j += 1;
    }
}

#[inline]
fn sized_trapezoid_area(height: f32, top_width: f32, bottom_width: f32) -> f32 {
    debug_assert!(top_width >= 0.0);
    debug_assert!(bottom_width >= 0.0);
    (top_width + bottom_width) / 2.0 * height
}

#[inline]
fn position_trapezoid_area(height: f32, tx0: f32, tx1: f32, bx0: f32, bx1: f32) -> f32 {
    sized_trapezoid_area(height, tx1 - tx0, bx1 - bx0)
}

#[inline]
fn sized_triangle_area(height: f32, width: f32) -> f32 {
    height * width / 2.0
}

/// Accumulates the signed area a clipped edge fragment covers in the
/// pixel `x` of `array`. The fragment is clamped to the edge's vertical
/// extent first.
fn handle_clipped_edge(
    array: &mut [f32],
    x: i32,
    e: &ActiveEdge,
    mut x0: f32,
    mut y0: f32,
    mut x1: f32,
    mut y1: f32,
) {
    if y0 == y1 {
        return;
    }
    debug_assert!(y0 < y1);
    debug_assert!(e.sy <= e.ey);
    if y0 > e.ey {
        return;
    }
    if y1 < e.sy {
        return;
    }
    if y0 < e.sy {
        x0 += (x1 - x0) * (e.sy - y0) / (y1 - y0);
        y0 = e.sy;
    }
    if y1 > e.ey {
        x1 += (x1 - x0) * (e.ey - y1) / (y1 - y0);
        y1 = e.ey;
    }

    let xf = x as f32;
    if x0 == xf {
        debug_assert!(x1 <= xf + 1.0);
    } else if x0 == xf + 1.0 {
        debug_assert!(x1 >= xf);
    } else if x0 <= xf {
        debug_assert!(x1 <= xf);
    } else if x0 >= xf + 1.0 {
        debug_assert!(x1 >= xf + 1.0);
    } else {
        debug_assert!(x1 >= xf && x1 <= xf + 1.0);
    }

    if x0 <= xf && x1 <= xf {
        array[x as usize] += e.direction * (y1 - y0);
    } else if x0 >= xf + 1.0 && x1 >= xf + 1.0 {
        // Fully to the right, no coverage.
    } else {
        debug_assert!(x0 >= xf && x0 <= xf + 1.0 && x1 >= xf && x1 <= xf + 1.0);
        // Coverage = 1 - average x position.
        array[x as usize] += e.direction * (y1 - y0) * (1.0 - ((x0 - xf) + (x1 - xf)) / 2.0);
    }
}

/// The core coverage computation for one scanline.
///
/// `scanline` receives the pixel-local coverage, `scanline_fill` (offset
/// by one pixel) the carry that tells downstream pixels how much of the
/// scanline's height is filled to the right of the edge.
fn fill_active_edges(
    scanline: &mut [f32],
    scanline_fill: &mut [f32],
    len: usize,
    arena: &EdgeArena,
    first: u32,
    y_top: f32,
) {
    let y_bottom = y_top + 1.0;
    let len_f = len as f32;

    let mut handle = first;
    while handle != 0 {
        let e = arena.get(handle);
        handle = e.next;

        // Brightness per pixel is the fraction of the pixel covered,
        // which is the fraction of this scanline's vertical strip cut
        // off by the edge.
        debug_assert!(e.ey >= y_top);

        if e.fdx == 0.0 {
            let x0 = e.fx;
            if x0 < len_f {
                if x0 >= 0.0 {
                    handle_clipped_edge(scanline, x0 as i32, e, x0, y_top, x0, y_bottom);
                    handle_clipped_edge(scanline_fill, x0 as i32 + 1, e, x0, y_top, x0, y_bottom);
                } else {
                    handle_clipped_edge(scanline_fill, 0, e, x0, y_top, x0, y_bottom);
                }
            }
        } else {
            let mut x0 = e.fx;
            let mut dx = e.fdx;
            let mut xb = x0 + dx;
            let mut dy = e.fdy;
            debug_assert!(e.sy <= y_bottom && e.ey >= y_top);

            // Compute endpoints of the line segment clipped to this
            // scanline. The intersections with y_top/y_bottom may lie
            // outside the segment itself.
            let (mut x_top, mut sy0) = if e.sy > y_top {
                (x0 + dx * (e.sy - y_top), e.sy)
            } else {
                (x0, y_top)
            };
            let (mut x_bottom, mut sy1) = if e.ey < y_bottom {
                (x0 + dx * (e.ey - y_top), e.ey)
            } else {
                (xb, y_bottom)
            };

            if x_top >= 0.0 && x_bottom >= 0.0 && x_top < len_f && x_bottom < len_f {
                // From here on no x range checks are needed.
                if x_top as i32 == x_bottom as i32 {
                    // Simple case, the fragment spans only one pixel.
                    let x = x_top as i32;
                    let height = (sy1 - sy0) * e.direction;
                    scanline[x as usize] += position_trapezoid_area(
                        height,
                        x_top,
                        x as f32 + 1.0,
                        x_bottom,
                        x as f32 + 1.0,
                    );
                    // Everything right of this pixel is filled.
                    scanline_fill[x as usize + 1] += height;
                } else {
                    // The fragment covers two or more pixels.
                    if x_top > x_bottom {
                        // Flip the scanline vertically; the signed area
                        // stays the same.
                        sy0 = y_bottom - (sy0 - y_top);
                        sy1 = y_bottom - (sy1 - y_top);
                        core::mem::swap(&mut sy0, &mut sy1);
                        core::mem::swap(&mut x_bottom, &mut x_top);
                        dx = -dx;
                        dy = -dy;
                        core::mem::swap(&mut x0, &mut xb);
                    }
                    debug_assert!(dy >= 0.0);
                    debug_assert!(dx >= 0.0);

                    let x1 = x_top as i32;
                    let x2 = x_bottom as i32;
                    // Intersections with the vertical pixel boundaries
                    // at x1+1 and x2.
                    let mut y_crossing = y_top + dy * (x1 as f32 + 1.0 - x0);
                    let mut y_final = y_top + dy * (x2 as f32 - x0);

                    // When x_bottom is barely past x1+1, y_crossing can
                    // overshoot the scanline.
                    if y_crossing > y_bottom {
                        y_crossing = y_bottom;
                    }

                    let sign = e.direction;

                    // Area of the strip from sy0 down to y_crossing.
                    let mut area = sign * (y_crossing - sy0);

                    // Triangle (x_top, sy0), (x1+1, sy0), (x1+1, y_crossing).
                    scanline[x1 as usize] += sized_triangle_area(area, x1 as f32 + 1.0 - x_top);

                    if y_final > y_bottom {
                        let denom = x2 - (x1 + 1);
                        y_final = y_bottom;
                        if denom != 0 {
                            dy = (y_final - y_crossing) / denom as f32;
                        }
                    }

                    // dy is the change in y per 1 change in x, which is
                    // also the pixel-area change per step in x.
                    let step = sign * dy;
                    for x in (x1 + 1)..x2 {
                        scanline[x as usize] += area + step / 2.0;
                        area += step;
                    }

                    debug_assert!(area.abs() <= 1.01);
                    debug_assert!(sy1 > y_final - 0.01);

                    // The last pixel gets the strip from all pixels to
                    // the left plus its own trapezoid to the right edge.
                    scanline[x2 as usize] += area
                        + sign
                            * position_trapezoid_area(
                                sy1 - y_final,
                                x2 as f32,
                                x2 as f32 + 1.0,
                                x_bottom,
                                x2 as f32 + 1.0,
                            );

                    // The rest of the scanline is filled by the total
                    // height of the fragment.
                    scanline_fill[x2 as usize + 1] += sign * (sy1 - sy0);
                }
            } else {
                // The edge leaves the grid horizontally, so each pixel
                // needs explicit clipping. Split the fragment at the
                // pixel's vertical boundaries and feed the pieces to the
                // clipped handler one by one.
                for x in 0..len {
                    let y0 = y_top;
                    let x1 = x as f32;
                    let x2 = x as f32 + 1.0;
                    let x3 = xb;
                    let y3 = y_bottom;

                    // x = e.x + e.dx * (y - y_top)
                    // (y - y_top) = (x - e.x) / e.dx
                    let y1 = (x as f32 - x0) / dx + y_top;
                    let y2 = (x as f32 + 1.0 - x0) / dx + y_top;

                    let xi = x as i32;
                    if x0 < x1 && x3 > x2 {
                        // Three segments descending down-right.
                        handle_clipped_edge(scanline, xi, e, x0, y0, x1, y1);
                        handle_clipped_edge(scanline, xi, e, x1, y1, x2, y2);
                        handle_clipped_edge(scanline, xi, e, x2, y2, x3, y3);
                    } else if x3 < x1 && x0 > x2 {
                        // Three segments descending down-left.
                        handle_clipped_edge(scanline, xi, e, x0, y0, x2, y2);
                        handle_clipped_edge(scanline, xi, e, x2, y2, x1, y1);
                        handle_clipped_edge(scanline, xi, e, x1, y1, x3, y3);
                    } else if x0 < x1 && x3 > x1 {
                        // Two segments across x, down-right.
                        handle_clipped_edge(scanline, xi, e, x0, y0, x1, y1);
                        handle_clipped_edge(scanline, xi, e, x1, y1, x3, y3);
                    } else if x3 < x1 && x0 > x1 {
                        // Two segments across x, down-left.
                        handle_clipped_edge(scanline, xi, e, x0, y0, x1, y1);
                        handle_clipped_edge(scanline, xi, e, x1, y1, x3, y3);
                    } else if x0 < x2 && x3 > x2 {
                        // Two segments across x+1, down-right.
                        handle_clipped_edge(scanline, xi, e, x0, y0, x2, y2);
                        handle_clipped_edge(scanline, xi, e, x2, y2, x3, y3);
                    } else if x3 < x2 && x0 > x2 {
                        // Two segments across x+1, down-left.
                        handle_clipped_edge(scanline, xi, e, x0, y0, x2, y2);
                        handle_clipped_edge(scanline, xi, e, x2, y2, x3, y3);
                    } else {
                        // One segment.
                        handle_clipped_edge(scanline, xi, e, x0, y0, x3, y3);
                    }
                }
            }
        }
    }
}
