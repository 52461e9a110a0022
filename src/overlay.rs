//! In-place annotation of RGBA frames. Writes outside the frame are clipped.

use crate::types::{Frame, Rect, Rgba};

pub const REGION_THICKNESS: i32 = 2;
pub const CENTROID_RADIUS: i32 = 5;

/// Outlines `region`. Each edge is a band `thickness` pixels wide, clipped to
/// the frame before any pixel is touched.
pub fn draw_region(frame: &mut Frame, region: &Rect, color: Rgba, thickness: i32) {
    let r = i64::from((thickness.max(1) - 1) / 2);
    let left = i64::from(region.x);
    let top = i64::from(region.y);
    let right = left + i64::from(region.width.max(1)) - 1;
    let bottom = top + i64::from(region.height.max(1)) - 1;

    fill_clipped(frame, (left - r, top - r), (right + r, top + r), color);
    fill_clipped(frame, (left - r, bottom - r), (right + r, bottom + r), color);
    fill_clipped(frame, (left - r, top - r), (left + r, bottom + r), color);
    fill_clipped(frame, (right - r, top - r), (right + r, bottom + r), color);
}

/// Circle outline of the given radius.
pub fn draw_circle(frame: &mut Frame, center: (i32, i32), radius: i32, color: Rgba) {
    let (cx, cy) = center;
    let outer = radius * radius;
    let inner = (radius - 1).max(0) * (radius - 1).max(0);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d = dx * dx + dy * dy;
            if d <= outer && (radius == 0 || d > inner) {
                put_pixel_safe(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Fills the inclusive box `from..=to`, intersected with the frame.
fn fill_clipped(frame: &mut Frame, from: (i64, i64), to: (i64, i64), color: Rgba) {
    let x0 = from.0.max(0);
    let y0 = from.1.max(0);
    let x1 = to.0.min(i64::from(frame.width) - 1);
    let y1 = to.1.min(i64::from(frame.height) - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }

    let stride = frame.width as usize * 4;
    let len = frame.rgba.len();
    for y in y0 as usize..=y1 as usize {
        let row = &mut frame.rgba[(y * stride).min(len)..];
        for x in x0 as usize..=x1 as usize {
            if let Some(px) = row.get_mut(x * 4..x * 4 + 4) {
                px.copy_from_slice(&color.0);
            }
        }
    }
}

fn put_pixel_safe(frame: &mut Frame, x: i32, y: i32, color: Rgba) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= frame.width || uy >= frame.height {
        return;
    }
    let idx = ((uy as usize) * (frame.width as usize) + ux as usize) * 4;
    if let Some(px) = frame.rgba.get_mut(idx..idx + 4) {
        px.copy_from_slice(&color.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> Frame {
        Frame::new(vec![0u8; (width * height * 4) as usize], width, height)
    }

    #[test]
    fn region_outline_leaves_interior_untouched() {
        let mut frame = blank(10, 10);
        draw_region(&mut frame, &Rect::new(2, 2, 5, 5), Rgba::RED, 1);
        assert_eq!(frame.pixel(2, 2), Some(Rgba::RED.0));
        assert_eq!(frame.pixel(6, 6), Some(Rgba::RED.0));
        assert_eq!(frame.pixel(4, 4), Some([0, 0, 0, 0]));
        assert_eq!(frame.pixel(7, 7), Some([0, 0, 0, 0]));
    }

    #[test]
    fn drawing_off_frame_is_clipped() {
        let mut frame = blank(4, 4);
        draw_region(&mut frame, &Rect::new(-10, -10, 30, 30), Rgba::BLUE, 3);
        draw_circle(&mut frame, (100, 100), CENTROID_RADIUS, Rgba::YELLOW);
        assert_eq!(frame.rgba.len(), 64);
    }

    #[test]
    fn circle_is_an_outline() {
        let mut frame = blank(20, 20);
        draw_circle(&mut frame, (10, 10), CENTROID_RADIUS, Rgba::YELLOW);
        assert_eq!(frame.pixel(15, 10), Some(Rgba::YELLOW.0));
        assert_eq!(frame.pixel(10, 10), Some([0, 0, 0, 0]));
    }

    #[test]
    fn oversized_region_is_clipped_without_overflow() {
        let mut frame = blank(8, 6);
        draw_region(&mut frame, &Rect::new(1, 1, i32::MAX, i32::MAX), Rgba::GREEN, 2);
        assert_eq!(frame.pixel(7, 1), Some(Rgba::GREEN.0));
        assert_eq!(frame.pixel(1, 5), Some(Rgba::GREEN.0));
        assert_eq!(frame.pixel(3, 3), Some([0, 0, 0, 0]));

        draw_region(&mut frame, &Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX), Rgba::RED, 3);
        assert_eq!(frame.rgba.len(), 8 * 6 * 4);
    }

    #[test]
    fn thick_outline_straddles_the_edge() {
        let mut frame = blank(12, 12);
        draw_region(&mut frame, &Rect::new(3, 3, 6, 6), Rgba::BLUE, 3);
        for (x, y) in [(2, 3), (3, 2), (4, 4), (9, 8), (8, 9)] {
            assert_eq!(frame.pixel(x, y), Some(Rgba::BLUE.0), "({x}, {y})");
        }
        assert_eq!(frame.pixel(6, 6), Some([0, 0, 0, 0]));
    }
}
