//! SketchSolve application shell.
//!
//! A thin native window over `sketchsolve-core`: pumps mouse state into
//! pointer events, presents the ink buffer over the background color, and
//! binds keys for submit, reset, and color swatches.

mod app;

pub use app::{App, AppError};
