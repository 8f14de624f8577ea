use crate::shared::detection::Detection;
use crate::shared::frame::Frame;
use crate::shared::region_spec::RegionSpec;

use super::glyphs::{glyph, GLYPH_HEIGHT, GLYPH_WIDTH};

pub const PERSON_COLOR: [u8; 3] = [0, 255, 0];
pub const REGION_COLOR: [u8; 3] = [0, 0, 255];
const LABEL_TEXT_COLOR: [u8; 3] = [0, 0, 0];

/// Draws detection boxes, labels and the region outline onto frames.
///
/// Only pixels change; detection data is never touched. Shapes that fall
/// partly outside the frame are clipped.
#[derive(Clone, Debug)]
pub struct FrameAnnotator {
    box_color: [u8; 3],
    region_color: [u8; 3],
    thickness: u32,
    text_scale: u32,
}

impl FrameAnnotator {
    pub fn new(box_color: [u8; 3], region_color: [u8; 3], thickness: u32, text_scale: u32) -> Self {
        Self {
            box_color,
            region_color,
            thickness: thickness.max(1),
            text_scale: text_scale.max(1),
        }
    }

    pub fn draw_region(&self, frame: &mut Frame, region: &RegionSpec) {
        draw_rect_outline(
            frame,
            region.left() as i64,
            region.top() as i64,
            region.right() as i64 - 1,
            region.bottom() as i64 - 1,
            self.region_color,
            self.thickness,
        );
    }

    /// Box plus a `"<label> <confidence>"` tag above it (or just inside the
    /// box when there is no room above).
    pub fn draw_detection(&self, frame: &mut Frame, detection: &Detection) {
        let b = &detection.bbox;
        let (x1, y1) = (b.x1.round() as i64, b.y1.round() as i64);
        let (x2, y2) = (b.x2.round() as i64 - 1, b.y2.round() as i64 - 1);
        draw_rect_outline(frame, x1, y1, x2, y2, self.box_color, self.thickness);

        let text = format!("{} {:.2}", detection.label, detection.confidence);
        let tag_h = (GLYPH_HEIGHT * self.text_scale + 4) as i64;
        let tag_y = if y1 - tag_h >= 0 { y1 - tag_h } else { y1 };
        self.draw_tag(frame, x1, tag_y, &text);
    }

    fn draw_tag(&self, frame: &mut Frame, x: i64, y: i64, text: &str) {
        let scale = self.text_scale as i64;
        let advance = (GLYPH_WIDTH as i64 + 1) * scale;
        let tag_w = advance * text.chars().count() as i64 + 3;
        let tag_h = GLYPH_HEIGHT as i64 * scale + 4;
        fill_rect(frame, x, y, x + tag_w - 1, y + tag_h - 1, self.box_color);

        for (i, c) in text.chars().enumerate() {
            let origin_x = x + 2 + i as i64 * advance;
            let origin_y = y + 2;
            for (row, bits) in glyph(c).iter().enumerate() {
                for col in 0..GLYPH_WIDTH as i64 {
                    if bits & (1 << (GLYPH_WIDTH as i64 - 1 - col)) == 0 {
                        continue;
                    }
                    let px = origin_x + col * scale;
                    let py = origin_y + row as i64 * scale;
                    fill_rect(frame, px, py, px + scale - 1, py + scale - 1, LABEL_TEXT_COLOR);
                }
            }
        }
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new(PERSON_COLOR, REGION_COLOR, 2, 2)
    }
}

/// Outline of the inclusive rectangle `(x1, y1)`-`(x2, y2)`, growing inward.
fn draw_rect_outline(
    frame: &mut Frame,
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
    color: [u8; 3],
    thickness: u32,
) {
    if x2 < x1 || y2 < y1 {
        return;
    }
    let t = thickness as i64 - 1;
    fill_rect(frame, x1, y1, x2, (y1 + t).min(y2), color);
    fill_rect(frame, x1, (y2 - t).max(y1), x2, y2, color);
    fill_rect(frame, x1, y1, (x1 + t).min(x2), y2, color);
    fill_rect(frame, (x2 - t).max(x1), y1, x2, y2, color);
}

/// Fills the inclusive rectangle, clipped to the frame.
fn fill_rect(frame: &mut Frame, x1: i64, y1: i64, x2: i64, y2: i64, color: [u8; 3]) {
    let fw = frame.width() as i64;
    let fh = frame.height() as i64;
    let x1 = x1.max(0);
    let y1 = y1.max(0);
    let x2 = x2.min(fw - 1);
    let y2 = y2.min(fh - 1);
    if x2 < x1 || y2 < y1 {
        return;
    }

    let mut pixels = frame.as_ndarray_mut();
    for row in y1 as usize..=y2 as usize {
        for col in x1 as usize..=x2 as usize {
            for (c, value) in color.iter().enumerate() {
                pixels[[row, col, c]] = *value;
            }
        }
    }
}
