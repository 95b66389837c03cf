//! Window shell and event pump.

use kurbo::Point;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use sketchsolve_core::{
    DeviceKind, Overlay, OverlayManager, Rgba, SWATCHES, SessionController, SessionNotice,
    Settings, SolverClient, SubmitError, Surface, TypesetSink, overlay,
};
use std::time::Instant;
use thiserror::Error;

const WINDOW_WIDTH: usize = 960;
const WINDOW_HEIGHT: usize = 600;
const WINDOW_TITLE: &str = "SketchSolve — draw, Enter to solve, R to reset";

/// Shell errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("window error: {0}")]
    Window(#[from] minifb::Error),
}

/// Typesetting sink stand-in: logs the marked-up overlay set whenever it
/// changes. A real deployment would hand the markup to a math renderer.
#[derive(Default)]
struct LogTypeset;

impl TypesetSink for LogTypeset {
    fn typeset(&mut self, overlays: &[Overlay]) {
        for (i, o) in overlays.iter().enumerate() {
            log::info!(
                "typeset[{i}] at ({:.0}, {:.0}): {}",
                o.position().x,
                o.position().y,
                o.content()
            );
        }
    }
}

/// The native application.
pub struct App;

impl App {
    pub fn run(settings: Settings) -> Result<(), AppError> {
        let mut window = Window::new(
            WINDOW_TITLE,
            WINDOW_WIDTH,
            WINDOW_HEIGHT,
            WindowOptions::default(),
        )?;
        window.set_target_fps(60);

        let mut surface = Surface::new(WINDOW_WIDTH, WINDOW_HEIGHT, settings.background);
        surface.set_width_scale(settings.width_scale);
        let mut overlays = OverlayManager::new();
        let mut session = SessionController::new(settings.default_anchor);
        let mut client = SolverClient::new(settings.endpoint.clone());
        let mut sink = LogTypeset;

        log::info!("solver endpoint: {}", client.endpoint());

        let mut framebuffer = vec![0u32; WINDOW_WIDTH * WINDOW_HEIGHT];
        let mut left_was_down = false;

        while window.is_open() && !window.is_key_down(Key::Escape) {
            let pointer = window
                .get_mouse_pos(MouseMode::Clamp)
                .map(|(x, y)| Point::new(x as f64, y as f64));
            let left_down = window.get_mouse_down(MouseButton::Left);

            // Left button drives either overlay dragging or inking: a press
            // over an overlay grabs it, anywhere else starts a stroke.
            if let Some(point) = pointer {
                if left_down && !left_was_down {
                    if !overlays.begin_drag(point) {
                        surface.pointer_down(point, DeviceKind::Mouse);
                    }
                } else if left_down {
                    if overlays.drag_active() {
                        overlays.drag_to(point);
                    } else {
                        // minifb reports no pressure; the surface falls back
                        // to full width.
                        surface.pointer_move(point, 0.0, DeviceKind::Mouse);
                    }
                }
            }
            if !left_down && left_was_down {
                overlays.end_drag();
                surface.pointer_up();
            }
            left_was_down = left_down;

            if window.is_key_pressed(Key::Enter, KeyRepeat::No) {
                match session.submit(&surface, &mut client) {
                    Ok(()) => log::info!("sketch submitted"),
                    Err(SubmitError::Busy) => log::warn!("submission already in progress"),
                    Err(e) => log::error!("submit failed: {e}"),
                }
            }
            if window.is_key_pressed(Key::R, KeyRepeat::No) {
                session.reset(&mut surface, &mut overlays);
            }
            for (i, key) in [
                Key::Key1,
                Key::Key2,
                Key::Key3,
                Key::Key4,
                Key::Key5,
                Key::Key6,
                Key::Key7,
                Key::Key8,
            ]
            .iter()
            .enumerate()
            {
                if window.is_key_pressed(*key, KeyRepeat::No) {
                    surface.set_color(SWATCHES[i]);
                }
            }

            for notice in session.poll(&mut client, &mut overlays, Instant::now()) {
                match notice {
                    SessionNotice::SubmitFailed { message } => {
                        log::error!("solver error: {message}");
                    }
                    SessionNotice::ResultsScheduled { count } => {
                        log::info!("{count} result(s) incoming");
                    }
                }
            }

            if overlays.take_dirty() {
                sink.typeset(overlays.overlays());
            }

            compose(&surface, &overlays, &mut framebuffer);
            window.update_with_buffer(&framebuffer, WINDOW_WIDTH, WINDOW_HEIGHT)?;
        }

        Ok(())
    }
}

/// Composite ink over the background and mark overlay positions.
fn compose(surface: &Surface, overlays: &OverlayManager, framebuffer: &mut [u32]) {
    let background = pack(surface.background());
    let pixels = surface.pixels();
    for (i, out) in framebuffer.iter_mut().enumerate() {
        let p = &pixels[i * 4..i * 4 + 4];
        *out = if p[3] > 0 {
            pack(Rgba::new(p[0], p[1], p[2], p[3]))
        } else {
            background
        };
    }
    for o in overlays.overlays() {
        draw_marker(framebuffer, surface.width(), surface.height(), o.position());
    }
}

/// Outline the nominal overlay box so the user can see and grab it. The
/// markup itself belongs to the external typesetting engine.
fn draw_marker(framebuffer: &mut [u32], width: usize, height: usize, position: Point) {
    const MARKER: u32 = 0x00_80_80_80;
    let x0 = position.x as i64;
    let y0 = position.y as i64;
    let x1 = x0 + overlay::HIT_WIDTH as i64;
    let y1 = y0 + overlay::HIT_HEIGHT as i64;
    for x in x0..=x1 {
        put(framebuffer, width, height, x, y0, MARKER);
        put(framebuffer, width, height, x, y1, MARKER);
    }
    for y in y0..=y1 {
        put(framebuffer, width, height, x0, y, MARKER);
        put(framebuffer, width, height, x1, y, MARKER);
    }
}

fn put(framebuffer: &mut [u32], width: usize, height: usize, x: i64, y: i64, color: u32) {
    if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
        return;
    }
    framebuffer[y as usize * width + x as usize] = color;
}

/// Pack an RGBA color into minifb's 0x00RRGGBB format.
fn pack(color: Rgba) -> u32 {
    ((color.r as u32) << 16) | ((color.g as u32) << 8) | color.b as u32
}
