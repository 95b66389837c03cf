//! SketchSolve Core Library
//!
//! Drawing-surface engine for the SketchSolve sketch calculator: pointer
//! capture and stroke rendering, ink bounding-box scanning, result-overlay
//! placement, and the submit/reset session lifecycle.

pub mod bounds;
pub mod config;
pub mod input;
pub mod overlay;
pub mod session;
pub mod solver;
pub mod surface;

pub use bounds::InkBounds;
pub use config::{SWATCHES, Settings};
pub use input::{DeviceKind, PointerEvent};
pub use overlay::{Overlay, OverlayManager, TypesetSink};
pub use session::{OVERLAY_DELAY, SessionController, SessionNotice, SessionState, SubmitError};
pub use solver::{
    CalculateRequest, ResponseItem, SolveTransport, SolverClient, SolverError, SolverEvent,
};
pub use surface::{Rgba, SnapshotError, Surface};
