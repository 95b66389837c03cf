//! Drawing surface: RGBA pixel buffer, stroke session, and rasterizer.

use crate::input::{DeviceKind, PointerEvent};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RGBA8 color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

/// Snapshot encoding errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
}

/// State spanning one pointer-down-to-pointer-up gesture.
#[derive(Debug, Clone, Copy)]
struct StrokeSession {
    last_point: Point,
}

/// Distance between disc stamps along a segment, in pixels.
const STAMP_SPACING: f64 = 0.5;

/// The drawing surface.
///
/// Owns the pixel buffer exclusively. The buffer is the ink layer: it starts
/// fully transparent and only stroke segments write to it, so the ink-bounds
/// scan (alpha > 0) sees exactly the user-drawn content. The opaque
/// background color is a presentation concern; the shell composites it
/// beneath the ink.
///
/// Dimensions are fixed at construction. Pointer events from non-drawing
/// devices are silently ignored, as is any move without an active stroke
/// session.
#[derive(Debug, Clone)]
pub struct Surface {
    width: usize,
    height: usize,
    /// RGBA8, row-major, `width * height * 4` bytes.
    pixels: Vec<u8>,
    /// Active stroke session, if a gesture is in progress.
    stroke: Option<StrokeSession>,
    /// Color applied to subsequent stroke segments.
    color: Rgba,
    /// Presentation color composited beneath the ink.
    background: Rgba,
    /// Multiplier from pointer pressure to rendered line width.
    width_scale: f64,
}

impl Surface {
    /// Default multiplier from pressure to line width.
    pub const DEFAULT_WIDTH_SCALE: f64 = 4.0;

    /// Create a surface with an empty ink layer.
    pub fn new(width: usize, height: usize, background: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
            stroke: None,
            color: Rgba::white(),
            background,
            width_scale: Self::DEFAULT_WIDTH_SCALE,
        }
    }

    /// Override the pressure-to-width multiplier.
    pub fn set_width_scale(&mut self, scale: f64) {
        self.width_scale = scale;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Read-only view of the RGBA ink buffer.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Presentation background color.
    pub fn background(&self) -> Rgba {
        self.background
    }

    /// Whether a stroke gesture is currently in progress.
    pub fn stroke_active(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    /// Set the color used for subsequent segments. Already-rendered ink
    /// is unaffected.
    pub fn set_color(&mut self, color: Rgba) {
        self.color = color;
    }

    /// Route a pointer event to the matching handler.
    pub fn handle_pointer_event(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down { position, device } => self.pointer_down(position, device),
            PointerEvent::Move {
                position,
                pressure,
                device,
            } => self.pointer_move(position, pressure, device),
            PointerEvent::Up | PointerEvent::Leave => self.pointer_up(),
        }
    }

    /// Begin a stroke session. Non-drawing devices are ignored.
    pub fn pointer_down(&mut self, position: Point, device: DeviceKind) {
        if !device.draws() {
            return;
        }
        self.stroke = Some(StrokeSession {
            last_point: position,
        });
    }

    /// Extend the active stroke to `position`.
    ///
    /// Rendered width is `pressure * width_scale`, with pressure substituted
    /// by 1.0 when the device reports zero (mice do).
    pub fn pointer_move(&mut self, position: Point, pressure: f64, device: DeviceKind) {
        if !device.draws() {
            return;
        }
        let Some(session) = self.stroke else {
            return;
        };
        let pressure = if pressure == 0.0 { 1.0 } else { pressure };
        let width = pressure * self.width_scale;
        self.stroke_segment(session.last_point, position, width, self.color);
        self.stroke = Some(StrokeSession {
            last_point: position,
        });
    }

    /// End the stroke session. Idempotent.
    pub fn pointer_up(&mut self) {
        self.stroke = None;
    }

    /// Erase all ink. Color selection and any active stroke session are
    /// untouched.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Encode the ink buffer as a PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut data, self.width as u32, self.height as u32);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
        }
        Ok(data)
    }

    /// Encode the ink buffer as a `data:image/png;base64,...` URI, the
    /// outbound payload format of the solver service.
    pub fn png_data_uri(&self) -> Result<String, SnapshotError> {
        let data = self.encode_png()?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(data)))
    }

    /// Stroke a line segment with round caps by stamping filled discs
    /// along its length.
    fn stroke_segment(&mut self, from: Point, to: Point, width: f64, color: Rgba) {
        let radius = (width / 2.0).max(0.5);
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let length = (dx * dx + dy * dy).sqrt();
        let steps = (length / STAMP_SPACING).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            self.fill_disc(from.x + dx * t, from.y + dy * t, radius, color);
        }
    }

    /// Fill a disc of `radius` around (`cx`, `cy`).
    fn fill_disc(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba) {
        let x_min = (cx - radius).ceil() as i64;
        let x_max = (cx + radius).floor() as i64;
        let y_min = (cy - radius).ceil() as i64;
        let y_max = (cy + radius).floor() as i64;
        let r_sq = radius * radius;
        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                if dx * dx + dy * dy <= r_sq {
                    self.put_pixel(x, y, color);
                }
            }
        }
    }

    /// Write one pixel, ignoring out-of-bounds coordinates.
    fn put_pixel(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) * 4;
        self.pixels[idx] = color.r;
        self.pixels[idx + 1] = color.g;
        self.pixels[idx + 2] = color.b;
        self.pixels[idx + 3] = color.a;
    }
}
