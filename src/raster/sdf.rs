//! Signed distance field generation.
//!
//! Works on the unflattened outline: for every output pixel the closest
//! point on any line or quad segment is found analytically, and a
//! horizontal ray cast decides the sign via the non-zero winding rule.

use super::{bitmap_box, Bitmap};
use crate::{Rect, Vertex};

#[derive(Clone, Copy, Debug)]
enum Segment {
    Line {
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
    },
    Quad {
        x0: f32,
        y0: f32,
        cx: f32,
        cy: f32,
        x1: f32,
        y1: f32,
    },
}

/// Converts a vertex stream into closed-contour segments in font units.
///
/// Cubic segments are approximated by their chord: the distance error is
/// irrelevant at SDF resolutions and the winding count stays correct.
fn collect_segments(shape: &[Vertex]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(shape.len());
    let mut x = 0.0;
    let mut y = 0.0;
    let mut start_x = 0.0;
    let mut start_y = 0.0;

    let close = |segments: &mut Vec<Segment>, x: f32, y: f32, sx: f32, sy: f32| {
        if x != sx || y != sy {
            segments.push(Segment::Line {
                x0: x,
                y0: y,
                x1: sx,
                y1: sy,
            });
        }
    };

    for vertex in shape {
        match *vertex {
            Vertex::MoveTo { x: px, y: py } => {
                close(&mut segments, x, y, start_x, start_y);
                x = px;
                y = py;
                start_x = px;
                start_y = py;
            }
            Vertex::LineTo { x: px, y: py } => {
                if px != x || py != y {
                    segments.push(Segment::Line {
                        x0: x,
                        y0: y,
                        x1: px,
                        y1: py,
                    });
                }
                x = px;
                y = py;
            }
            Vertex::QuadTo {
                x1: cx,
                y1: cy,
                x: px,
                y: py,
            } => {
                segments.push(Segment::Quad {
                    x0: x,
                    y0: y,
                    cx,
                    cy,
                    x1: px,
                    y1: py,
                });
                x = px;
                y = py;
            }
            Vertex::CurveTo { x: px, y: py, .. } => {
                if px != x || py != y {
                    segments.push(Segment::Line {
                        x0: x,
                        y0: y,
                        x1: px,
                        y1: py,
                    });
                }
                x = px;
                y = py;
            }
            Vertex::Close => {
                close(&mut segments, x, y, start_x, start_y);
                x = start_x;
                y = start_y;
            }
        }
    }

    close(&mut segments, x, y, start_x, start_y);
    segments
}

/// Computes the signed distance field of a glyph.
///
/// The output is `onedge_value` at the outline, higher inside, lower
/// outside, with `pixel_dist_scale` units per pixel of distance.
pub(crate) fn glyph_sdf(
    shape: &[Vertex],
    rect: Rect,
    scale: f32,
    padding: i32,
    onedge_value: u8,
    pixel_dist_scale: f32,
) -> Option<Bitmap> {
    if scale <= 0.0 {
        return None;
    }

    if rect.x_min == rect.x_max || rect.y_min == rect.y_max {
        return None;
    }

    let bbox = bitmap_box(rect, scale, scale, 0.0, 0.0);
    let ix0 = i64::from(bbox.x_min) - i64::from(padding);
    let iy0 = i64::from(bbox.y_min) - i64::from(padding);
    let ix1 = i64::from(bbox.x_max) + i64::from(padding);
    let iy1 = i64::from(bbox.y_max) + i64::from(padding);
    if ix0 >= ix1 || iy0 >= iy1 {
        return None;
    }

    let width = (ix1 - ix0) as usize;
    let height = (iy1 - iy0) as usize;

    let segments = collect_segments(shape);

    // The output is y-down, so all the y math runs on a negated scale.
    let scale_x = scale;
    let scale_y = -scale;

    // Reciprocals that the inner loop would otherwise recompute per pixel:
    // line lengths and the leading cubic coefficient of each quad.
    let precompute: Vec<f32> = segments
        .iter()
        .map(|segment| match *segment {
            Segment::Line { x0, y0, x1, y1 } => {
                let (x0, y0) = (x0 * scale_x, y0 * scale_y);
                let (x1, y1) = (x1 * scale_x, y1 * scale_y);
                let dist = ((x1 - x0) * (x1 - x0) + (y1 - y0) * (y1 - y0)).sqrt();
                if dist == 0.0 {
                    0.0
                } else {
                    1.0 / dist
                }
            }
            Segment::Quad {
                x0,
                y0,
                cx,
                cy,
                x1,
                y1,
            } => {
                let bx = x0 * scale_x - 2.0 * cx * scale_x + x1 * scale_x;
                let by = y0 * scale_y - 2.0 * cy * scale_y + y1 * scale_y;
                let len2 = bx * bx + by * by;
                if len2 != 0.0 {
                    1.0 / len2
                } else {
                    0.0
                }
            }
        })
        .collect();

    let mut pixels = vec![0u8; width * height];

    for y in iy0..iy1 {
        for x in ix0..ix1 {
            let sx = x as f32 + 0.5;
            let sy = y as f32 + 0.5;
            let x_gspace = sx / scale_x;
            let y_gspace = sy / scale_y;

            // The sign of the distance comes from the same inside test
            // the rasterizer's fill rule is based on.
            let winding = compute_crossings(x_gspace, y_gspace, &segments);

            let mut min_dist = 999999.0f32;
            for (segment, &precomputed) in segments.iter().zip(&precompute) {
                match *segment {
                    Segment::Line { x0, y0, x1, y1 } => {
                        if precomputed == 0.0 {
                            continue;
                        }

                        let (x0, y0) = (x0 * scale_x, y0 * scale_y);
                        let (x1, y1) = (x1 * scale_x, y1 * scale_y);

                        let dist2 = (x0 - sx) * (x0 - sx) + (y0 - sy) * (y0 - sy);
                        if dist2 < min_dist * min_dist {
                            min_dist = dist2.sqrt();
                        }

                        // Perpendicular distance to the infinite line.
                        let dist =
                            ((x1 - x0) * (y0 - sy) - (y1 - y0) * (x0 - sx)).abs() * precomputed;
                        if dist < min_dist {
                            // Only valid if the foot of the perpendicular
                            // falls within the segment.
                            let dx = x1 - x0;
                            let dy = y1 - y0;
                            let px = x0 - sx;
                            let py = y0 - sy;
                            let t = -(px * dx + py * dy) / (dx * dx + dy * dy);
                            if (0.0..=1.0).contains(&t) {
                                min_dist = dist;
                            }
                        }
                    }
                    Segment::Quad {
                        x0,
                        y0,
                        cx,
                        cy,
                        x1,
                        y1,
                    } => {
                        let (x0, y0) = (x0 * scale_x, y0 * scale_y);
                        let (cx, cy) = (cx * scale_x, cy * scale_y);
                        let (x1, y1) = (x1 * scale_x, y1 * scale_y);

                        let box_x0 = x0.min(cx).min(x1);
                        let box_y0 = y0.min(cy).min(y1);
                        let box_x1 = x0.max(cx).max(x1);
                        let box_y1 = y0.max(cy).max(y1);
                        // Coarse culling to avoid the cubic solve.
                        if sx <= box_x0 - min_dist
                            || sx >= box_x1 + min_dist
                            || sy <= box_y0 - min_dist
                            || sy >= box_y1 + min_dist
                        {
                            continue;
                        }

                        // Minimize |P(t) - S|^2 where
                        // P(t) = p0 + 2 t a + t^2 b,
                        // a = p1 - p0, b = p0 - 2 p1 + p2.
                        // The derivative is the cubic
                        // t^3 (b.b) + 3 t^2 (a.b) + t (2 |a|^2 + m.b) + m.a
                        // with m = p0 - S.
                        let ax = cx - x0;
                        let ay = cy - y0;
                        let bx = x0 - 2.0 * cx + x1;
                        let by = y0 - 2.0 * cy + y1;
                        let mx = x0 - sx;
                        let my = y0 - sy;

                        let mut res = [0.0f32; 3];
                        let num;
                        let a_inv = precomputed;
                        if a_inv == 0.0 {
                            // The cubic degenerates to a quadratic.
                            let a = 3.0 * (ax * bx + ay * by);
                            let b = 2.0 * (ax * ax + ay * ay) + (mx * bx + my * by);
                            let c = mx * ax + my * ay;
                            if a == 0.0 {
                                // And possibly to a linear equation.
                                if b != 0.0 {
                                    res[0] = -c / b;
                                    num = 1;
                                } else {
                                    num = 0;
                                }
                            } else {
                                let discriminant = b * b - 4.0 * a * c;
                                if discriminant < 0.0 {
                                    num = 0;
                                } else {
                                    let root = discriminant.sqrt();
                                    res[0] = (-b - root) / (2.0 * a);
                                    res[1] = (-b + root) / (2.0 * a);
                                    num = 2;
                                }
                            }
                        } else {
                            let b = 3.0 * (ax * bx + ay * by) * a_inv;
                            let c = (2.0 * (ax * ax + ay * ay) + (mx * bx + my * by)) * a_inv;
                            let d = (mx * ax + my * ay) * a_inv;
                            num = solve_cubic(b, c, d, &mut res);
                        }

                        let dist2 = (x0 - sx) * (x0 - sx) + (y0 - sy) * (y0 - sy);
                        if dist2 < min_dist * min_dist {
                            min_dist = dist2.sqrt();
                        }
                        let dist2 = (x1 - sx) * (x1 - sx) + (y1 - sy) * (y1 - sy);
                        if dist2 < min_dist * min_dist {
                            min_dist = dist2.sqrt();
                        }

                        for &t in res.iter().take(num) {
                            if (0.0..=1.0).contains(&t) {
                                let it = 1.0 - t;
                                let px = it * it * x0 + 2.0 * t * it * cx + t * t * x1;
                                let py = it * it * y0 + 2.0 * t * it * cy + t * t * y1;
                                let dist2 = (px - sx) * (px - sx) + (py - sy) * (py - sy);
                                if dist2 < min_dist * min_dist {
                                    min_dist = dist2.sqrt();
                                }
                            }
                        }
                    }
                }
            }

            if winding == 0 {
                // Outside the shape, so the distance is negative.
                min_dist = -min_dist;
            }

            let val = f32::from(onedge_value) + pixel_dist_scale * min_dist;
            let val = val.max(0.0).min(255.0);
            pixels[((y - iy0) as usize) * width + (x - ix0) as usize] = val as u8;
        }
    }

    Some(Bitmap {
        width: width as u32,
        height: height as u32,
        pixels,
    })
}

/// Counts signed ray crossings to the right of `(x, y)`, in glyph space.
fn compute_crossings(x: f32, mut y: f32, segments: &[Segment]) -> i32 {
    // Keep the ray away from integer y coordinates so it cannot pass
    // exactly through a vertex.
    let y_frac = y % 1.0;
    if y_frac < 0.01 {
        y += 0.01;
    } else if y_frac > 0.99 {
        y -= 0.01;
    }

    let mut winding = 0;
    for segment in segments {
        match *segment {
            Segment::Line { x0, y0, x1, y1 } => {
                winding += line_crossing(x, y, x0, y0, x1, y1);
            }
            Segment::Quad {
                x0,
                y0,
                cx,
                cy,
                x1,
                y1,
            } => {
                let ay = y0.min(cy).min(y1);
                let by = y0.max(cy).max(y1);
                let bx = x0.max(cx).max(x1);
                if y > ay && y < by && x < bx {
                    // A quad whose control point duplicates an endpoint
                    // is a line.
                    if (x0 == cx && y0 == cy) || (cx == x1 && cy == y1) {
                        winding += line_crossing(x, y, x0, y0, x1, y1);
                    } else {
                        winding += quad_crossings(x, y, x0, y0, cx, cy, x1, y1);
                    }
                }
            }
        }
    }

    winding
}

fn line_crossing(x: f32, y: f32, x0: f32, y0: f32, x1: f32, y1: f32) -> i32 {
    if y > y0.min(y1) && y < y0.max(y1) && x < x0.max(x1) {
        let x_inter = (y - y0) / (y1 - y0) * (x1 - x0) + x0;
        if x_inter > x {
            return if y0 < y1 { 1 } else { -1 };
        }
    }

    0
}

// Solves y(t) = y for the quad and counts the crossings right of x.
#[allow(clippy::too_many_arguments)]
fn quad_crossings(x: f32, y: f32, x0: f32, y0: f32, cx: f32, cy: f32, x1: f32, y1: f32) -> i32 {
    let a = y0 - 2.0 * cy + y1;
    let b = cy - y0;
    let c = y0 - y;

    let mut roots = [0.0f32; 2];
    let mut num = 0;
    if a != 0.0 {
        let discr = b * b - a * c;
        if discr > 0.0 {
            let d = discr.sqrt();
            let rcpna = -1.0 / a;
            let s0 = (b + d) * rcpna;
            let s1 = (b - d) * rcpna;
            if (0.0..=1.0).contains(&s0) {
                roots[num] = s0;
                num += 1;
            }
            if d > 0.0 && (0.0..=1.0).contains(&s1) {
                roots[num] = s1;
                num += 1;
            }
        }
    } else {
        // 2 b s + c = 0
        if b != 0.0 {
            let s0 = c / (-2.0 * b);
            if (0.0..=1.0).contains(&s0) {
                roots[num] = s0;
                num += 1;
            }
        }
    }

    let mut winding = 0;
    for &s in roots.iter().take(num) {
        let it = 1.0 - s;
        let x_inter = it * it * x0 + 2.0 * s * it * cx + s * s * x1;
        if x_inter > x {
            // dy/dt decides the crossing direction.
            winding += if a * s + b > 0.0 { 1 } else { -1 };
        }
    }

    winding
}

// Cardano's formula for t^3 + a t^2 + b t + c = 0.
fn solve_cubic(a: f32, b: f32, c: f32, r: &mut [f32; 3]) -> usize {
    let s = -a / 3.0;
    let p = b - a * a / 3.0;
    let q = a * (2.0 * a * a - 9.0 * b) / 27.0 + c;
    let p3 = p * p * p;
    let d = q * q + 4.0 * p3 / 27.0;
    if d >= 0.0 {
        let z = d.sqrt();
        let u = ((-q + z) / 2.0).cbrt();
        let v = ((-q - z) / 2.0).cbrt();
        r[0] = s + u + v;
        1
    } else {
        // Three real roots via the trigonometric form;
        // p3 is negative since d is.
        let u = (-p / 3.0).sqrt();
        let v = (-(27.0 / p3).sqrt() * q / 2.0).acos() / 3.0;
        let m = v.cos();
        let n = (v - core::f32::consts::PI / 1.5).cos() * 1.732_050_8;
        r[0] = s + u * 2.0 * m;
        r[1] = s - u * (m + n);
        r[2] = s - u * (m - n);
        3
    }
}
