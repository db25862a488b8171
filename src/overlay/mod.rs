//! Compositing of the AR reticle and detection banner onto a frame snapshot.
//!
//! Rendering is a pure function of its inputs: the same frame, detection and
//! output size always produce byte-identical pixels.

pub mod font;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, Blend};
use imageproc::rect::Rect;

use crate::detection::{DetectionState, DEFAULT_CONFIDENCE_THRESHOLD};

pub const RETICLE_GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// `rgba(0, 255, 0, 0.8)`
pub const BANNER_FILL: Rgba<u8> = Rgba([0, 255, 0, 204]);
pub const BANNER_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Geometry is specified against a 720px short edge and scaled from there.
const REFERENCE_EDGE: f32 = 720.0;

/// Axis-aligned box in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelBox {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + self.width as i32
            && y < self.y + self.height as i32
    }

    fn rect(&self) -> Rect {
        Rect::at(self.x, self.y).of_size(self.width.max(1), self.height.max(1))
    }
}

/// Where each overlay element lands for a given output size.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayout {
    pub center: (i32, i32),
    pub half_size: i32,
    pub bracket: i32,
    pub thickness: u32,
    pub glyph_cell: u32,
    /// Present only when the detection is confident.
    pub banner: Option<(PixelBox, String)>,
}

impl OverlayLayout {
    pub fn compute(width: u32, height: u32, banner_text: Option<String>) -> Self {
        let scale = width.min(height) as f32 / REFERENCE_EDGE;
        let scaled = |v: f32, min: i32| ((v * scale).round() as i32).max(min);

        let center = ((width / 2) as i32, (height / 2) as i32);
        let half_size = scaled(50.0, 6);
        let bracket = scaled(20.0, 2);
        let thickness = scaled(2.0, 1) as u32;
        let glyph_cell = scaled(2.0, 1) as u32;

        let banner = banner_text.map(|text| {
            let padding = scaled(16.0, 2) as u32;
            let text_width = font::text_width(&text, glyph_cell);
            let banner_width = (scaled(200.0, 1) as u32).max(text_width + 2 * padding);
            let banner_height =
                (scaled(40.0, 1) as u32).max(font::text_height(glyph_cell) + padding);
            let area = PixelBox {
                x: center.0 - (banner_width / 2) as i32,
                y: center.1 + half_size + scaled(20.0, 2),
                width: banner_width,
                height: banner_height,
            };
            (area, text)
        });

        Self {
            center,
            half_size,
            bracket,
            thickness,
            glyph_cell,
            banner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    threshold: f32,
}

impl OverlayRenderer {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn layout(&self, detection: &DetectionState, width: u32, height: u32) -> OverlayLayout {
        OverlayLayout::compute(width, height, detection.banner_text(self.threshold))
    }

    /// Composite the overlay onto a copy of `frame` scaled to `width` x `height`.
    pub fn render(
        &self,
        frame: &RgbaImage,
        detection: &DetectionState,
        width: u32,
        height: u32,
    ) -> RgbaImage {
        let base = if frame.dimensions() == (width, height) {
            frame.clone()
        } else {
            imageops::resize(frame, width, height, FilterType::Triangle)
        };
        if width == 0 || height == 0 {
            return base;
        }

        let layout = self.layout(detection, width, height);
        let mut canvas = base;
        draw_reticle(&mut canvas, &layout);

        if let Some(bbox) = detection.bounding_box.filter(|_| layout.banner.is_some()) {
            let (fw, fh) = frame.dimensions();
            let sx = width as f32 / fw.max(1) as f32;
            let sy = height as f32 / fh.max(1) as f32;
            let region = Rect::at((bbox.x * sx).round() as i32, (bbox.y * sy).round() as i32)
                .of_size(
                    ((bbox.width * sx).round() as u32).max(1),
                    ((bbox.height * sy).round() as u32).max(1),
                );
            draw_hollow_rect_mut(&mut canvas, region, RETICLE_GREEN);
        }

        match &layout.banner {
            Some((area, text)) => {
                let mut blended = Blend(canvas);
                draw_filled_rect_mut(&mut blended, area.rect(), BANNER_FILL);
                let mut canvas = blended.0;
                font::draw_text_centered(
                    &mut canvas,
                    text,
                    area.x + (area.width / 2) as i32,
                    area.y + (area.height / 2) as i32,
                    layout.glyph_cell,
                    BANNER_TEXT,
                );
                canvas
            }
            None => canvas,
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Horizontal stroke from `x0` to `x1` inclusive, centred on `y`.
fn hline(img: &mut RgbaImage, x0: i32, x1: i32, y: i32, thickness: u32) {
    let (left, right) = (x0.min(x1), x0.max(x1));
    let rect =
        Rect::at(left, y - (thickness / 2) as i32).of_size((right - left + 1) as u32, thickness);
    draw_filled_rect_mut(img, rect, RETICLE_GREEN);
}

fn vline(img: &mut RgbaImage, x: i32, y0: i32, y1: i32, thickness: u32) {
    let (top, bottom) = (y0.min(y1), y0.max(y1));
    let rect =
        Rect::at(x - (thickness / 2) as i32, top).of_size(thickness, (bottom - top + 1) as u32);
    draw_filled_rect_mut(img, rect, RETICLE_GREEN);
}

fn draw_reticle(img: &mut RgbaImage, layout: &OverlayLayout) {
    let (cx, cy) = layout.center;
    let half = layout.half_size;
    let t = layout.thickness;

    hline(img, cx - half, cx + half, cy, t);
    vline(img, cx, cy - half, cy + half, t);

    let b = layout.bracket;
    for (sx, sy) in [(-1, -1), (1, -1), (-1, 1), (1, 1)] {
        let corner_x = cx + sx * half;
        let corner_y = cy + sy * half;
        hline(img, corner_x, corner_x - sx * b, corner_y, t);
        vline(img, corner_x, corner_y, corner_y - sy * b, t);
    }
}
