use std::{fmt, time::Instant};

use crate::error::RecognizerError;

/// One captured RGBA image. Reused by the worker loop across capture cycles.
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// A frame with no pixel data, ready to be filled by a capture device.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.rgba.is_empty() || self.width == 0 || self.height == 0
    }

    /// Whether the buffer length matches `width * height * 4`.
    pub fn is_consistent(&self) -> bool {
        let expected = (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4);
        self.rgba.len() == expected
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let px = self.rgba.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }

    /// Integer center, truncating toward zero.
    pub fn center(&self) -> (i32, i32) {
        let cx = f64::from(self.x) + f64::from(self.width) / 2.0;
        let cy = f64::from(self.y) + f64::from(self.height) / 2.0;
        (cx as i32, cy as i32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const RED: Rgba = Rgba([239, 68, 68, 255]);
    pub const GREEN: Rgba = Rgba([16, 185, 129, 255]);
    pub const BLUE: Rgba = Rgba([56, 189, 248, 255]);
    pub const YELLOW: Rgba = Rgba([250, 204, 21, 255]);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba([r, g, b, a])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureKind {
    OpenedHand,
    ClosedHand,
}

impl GestureKind {
    pub fn id(&self) -> u32 {
        match self {
            GestureKind::OpenedHand => 0x00,
            GestureKind::ClosedHand => 0x01,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GestureKind::OpenedHand => "opened hand",
            GestureKind::ClosedHand => "closed hand",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A recognized gesture occurrence. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GestureEvent {
    source: String,
    kind: GestureKind,
    timestamp_millis: u64,
    x: i32,
    y: i32,
}

impl GestureEvent {
    /// `source` names the gesture that produced the event and must not be blank.
    pub fn new(
        source: impl Into<String>,
        kind: GestureKind,
        timestamp_millis: u64,
        x: i32,
        y: i32,
    ) -> Result<Self, RecognizerError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(RecognizerError::InvalidArgument(
                "gesture event source must not be empty".to_string(),
            ));
        }
        Ok(Self {
            source,
            kind,
            timestamp_millis,
            x,
            y,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp_millis
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn location(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

impl fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) at ({}, {}) @{}",
            self.source, self.kind, self.x, self.y, self.timestamp_millis
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Rect::new(0, 0, 10, 10), (5, 5))]
    #[case(Rect::new(1, 1, 3, 3), (2, 2))]
    #[case(Rect::new(10, 20, 5, 7), (12, 23))]
    #[case(Rect::new(-3, -3, 3, 3), (-1, -1))]
    fn center_truncates(#[case] rect: Rect, #[case] expected: (i32, i32)) {
        assert_eq!(rect.center(), expected);
    }

    #[test]
    fn area_does_not_overflow_i32() {
        let rect = Rect::new(0, 0, 100_000, 100_000);
        assert_eq!(rect.area(), 10_000_000_000);
    }

    #[test]
    fn event_rejects_blank_source() {
        let err = GestureEvent::new("  ", GestureKind::OpenedHand, 0, 1, 2).unwrap_err();
        assert!(matches!(err, RecognizerError::InvalidArgument(_)));
    }

    #[test]
    fn frame_consistency_and_pixel_lookup() {
        let mut frame = Frame::new(vec![0u8; 2 * 2 * 4], 2, 2);
        assert!(frame.is_consistent());
        assert!(!frame.is_empty());
        frame.rgba[12..16].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(frame.pixel(1, 1), Some([1, 2, 3, 4]));
        assert_eq!(frame.pixel(2, 0), None);
        assert!(Frame::empty().is_empty());
    }
}
