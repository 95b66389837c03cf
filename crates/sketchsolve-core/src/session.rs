//! Submit/reset session lifecycle.
//!
//! The controller bridges the surface, the solving service, and the overlay
//! manager. One submission moves linearly through
//! `Idle -> Submitting -> Integrating -> Idle`; reset is orthogonal and
//! valid from any state.

use crate::bounds::InkBounds;
use crate::overlay::{OverlayManager, display_markup};
use crate::solver::{CalculateRequest, SolveTransport, SolverError, SolverEvent};
use crate::surface::{SnapshotError, Surface};
use kurbo::Point;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Fixed delay between integration and overlay creation, uniform across a
/// batch (items pop in together, not staggered relative to each other).
pub const OVERLAY_DELAY: Duration = Duration::from_millis(1000);

/// Submission protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Integrating,
}

/// Errors rejecting a submit call.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    Busy,
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// User-visible outcome reported by `poll`.
#[derive(Debug, Clone)]
pub enum SessionNotice {
    /// The submission failed; ink, overlays, and bindings are untouched.
    SubmitFailed { message: String },
    /// A response batch was integrated; overlays are scheduled.
    ResultsScheduled { count: usize },
}

/// An overlay creation scheduled for a fixed deadline, keyed by submission
/// so reset and later submissions can cancel it.
#[derive(Debug, Clone)]
struct PendingOverlay {
    submission: u64,
    due: Instant,
    content: String,
    position: Point,
}

/// Orchestrates the submission lifecycle and owns the variable bindings.
#[derive(Debug)]
pub struct SessionController {
    state: SessionState,
    /// Symbol -> value assignments accumulated across submissions,
    /// cleared only on reset.
    bindings: HashMap<String, String>,
    /// Anchor used when the submitted canvas carries no ink.
    default_anchor: Point,
    /// Monotonic submission counter.
    next_submission: u64,
    /// Submission currently in flight, if any. A response arriving after
    /// this was cleared by reset is dropped.
    current: Option<u64>,
    /// Ink-bounds anchor of the in-flight submission, computed once from
    /// the submit-time snapshot and reused for every batch item.
    anchor: Point,
    pending: Vec<PendingOverlay>,
}

impl SessionController {
    pub fn new(default_anchor: Point) -> Self {
        Self {
            state: SessionState::Idle,
            bindings: HashMap::new(),
            default_anchor,
            next_submission: 0,
            current: None,
            anchor: default_anchor,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bindings(&self) -> &HashMap<String, String> {
        &self.bindings
    }

    /// Number of scheduled-but-unfired overlay creations.
    pub fn pending_overlays(&self) -> usize {
        self.pending.len()
    }

    /// Encode the surface and issue one request to the solving service.
    ///
    /// Rejected while a prior submission is in progress; submissions are
    /// strictly serialized. Pending overlays from prior submissions are
    /// cancelled so stale results never pop in over a new sketch.
    pub fn submit<T: SolveTransport>(
        &mut self,
        surface: &Surface,
        transport: &mut T,
    ) -> Result<(), SubmitError> {
        if self.state != SessionState::Idle {
            return Err(SubmitError::Busy);
        }

        let image = surface.png_data_uri()?;
        let bounds = InkBounds::scan(surface.pixels(), surface.width(), surface.height());
        let anchor = bounds.center().unwrap_or(self.default_anchor);

        transport.submit(CalculateRequest {
            image,
            dict_of_vars: self.bindings.clone(),
        })?;

        self.pending.clear();
        self.anchor = anchor;
        self.next_submission += 1;
        self.current = Some(self.next_submission);
        self.state = SessionState::Submitting;
        log::info!(
            "submission {} issued, anchor ({:.0}, {:.0})",
            self.next_submission,
            anchor.x,
            anchor.y
        );
        Ok(())
    }

    /// Drive the session forward: integrate a finished response and fire
    /// due overlay creations. Call once per event-loop turn.
    pub fn poll<T: SolveTransport>(
        &mut self,
        transport: &mut T,
        overlays: &mut OverlayManager,
        now: Instant,
    ) -> Vec<SessionNotice> {
        let mut notices = Vec::new();

        if let Some(event) = transport.poll() {
            match self.current {
                Some(submission) => match event {
                    SolverEvent::Completed { items } => {
                        self.state = SessionState::Integrating;
                        for item in &items {
                            if item.assign {
                                self.bindings
                                    .insert(item.expr.clone(), item.result.clone());
                            }
                            self.pending.push(PendingOverlay {
                                submission,
                                due: now + OVERLAY_DELAY,
                                content: display_markup(&item.expr, &item.result),
                                position: self.anchor,
                            });
                        }
                        log::info!(
                            "submission {} integrated, {} overlays scheduled",
                            submission,
                            items.len()
                        );
                        notices.push(SessionNotice::ResultsScheduled { count: items.len() });
                        self.state = SessionState::Idle;
                        self.current = None;
                    }
                    SolverEvent::Failed { message } => {
                        log::error!("submission {} failed: {}", submission, message);
                        notices.push(SessionNotice::SubmitFailed { message });
                        self.state = SessionState::Idle;
                        self.current = None;
                    }
                },
                // Reset discarded this submission while it was in flight.
                None => log::debug!("dropping response for discarded submission"),
            }
        }

        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].due <= now {
                let fired = self.pending.remove(index);
                overlays.add(fired.content, fired.position);
            } else {
                index += 1;
            }
        }

        notices
    }

    /// Reset the whole session: erase ink, drop overlays and bindings,
    /// cancel scheduled overlay creations, and discard the eventual
    /// response of any in-flight submission. Valid from any state.
    pub fn reset(&mut self, surface: &mut Surface, overlays: &mut OverlayManager) {
        surface.clear();
        overlays.clear_all();
        self.bindings.clear();
        self.pending.clear();
        self.current = None;
        self.state = SessionState::Idle;
        log::info!("session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::DeviceKind;
    use crate::solver::ResponseItem;
    use crate::surface::Rgba;

    /// Scripted transport standing in for the HTTP client.
    #[derive(Default)]
    struct FakeTransport {
        queued: Option<SolverEvent>,
        busy: bool,
        submissions: Vec<CalculateRequest>,
    }

    impl FakeTransport {
        fn complete(&mut self, items: Vec<ResponseItem>) {
            self.queued = Some(SolverEvent::Completed { items });
        }

        fn fail(&mut self, message: &str) {
            self.queued = Some(SolverEvent::Failed {
                message: message.to_string(),
            });
        }
    }

    impl SolveTransport for FakeTransport {
        fn submit(&mut self, request: CalculateRequest) -> Result<(), SolverError> {
            if self.busy {
                return Err(SolverError::Busy);
            }
            self.busy = true;
            self.submissions.push(request);
            Ok(())
        }

        fn poll(&mut self) -> Option<SolverEvent> {
            let event = self.queued.take()?;
            self.busy = false;
            Some(event)
        }

        fn in_flight(&self) -> bool {
            self.busy
        }
    }

    fn item(expr: &str, result: &str, assign: bool) -> ResponseItem {
        ResponseItem {
            expr: expr.into(),
            result: result.into(),
            assign,
        }
    }

    fn drawn_surface() -> Surface {
        let mut surface = Surface::new(64, 64, Rgba::black());
        surface.pointer_down(Point::new(20.0, 20.0), DeviceKind::Pen);
        surface.pointer_move(Point::new(40.0, 40.0), 1.0, DeviceKind::Pen);
        surface.pointer_up();
        surface
    }

    fn controller() -> SessionController {
        SessionController::new(Point::new(10.0, 200.0))
    }

    #[test]
    fn test_batch_integration_merges_assignments() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let surface = drawn_surface();
        let t0 = Instant::now();

        session.submit(&surface, &mut transport).unwrap();
        assert_eq!(session.state(), SessionState::Submitting);

        transport.complete(vec![item("x", "5", true), item("x + 1", "6", false)]);
        let notices = session.poll(&mut transport, &mut overlays, t0);

        assert_eq!(session.bindings().len(), 1);
        assert_eq!(session.bindings()["x"], "5");
        assert_eq!(session.pending_overlays(), 2);
        assert!(overlays.is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(
            notices[..],
            [SessionNotice::ResultsScheduled { count: 2 }]
        ));
    }

    #[test]
    fn test_overlays_fire_together_after_fixed_delay() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let surface = drawn_surface();
        let t0 = Instant::now();

        session.submit(&surface, &mut transport).unwrap();
        transport.complete(vec![item("x", "5", true), item("x + 1", "6", false)]);
        session.poll(&mut transport, &mut overlays, t0);

        // Just before the deadline nothing fires.
        session.poll(
            &mut transport,
            &mut overlays,
            t0 + OVERLAY_DELAY - Duration::from_millis(1),
        );
        assert!(overlays.is_empty());

        // At the deadline the whole batch pops in at once, in array order.
        session.poll(&mut transport, &mut overlays, t0 + OVERLAY_DELAY);
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays.overlays()[0].content(), r"\[\LARGE x = 5 \]");
        assert_eq!(overlays.overlays()[1].content(), r"\[\LARGE x + 1 = 6 \]");
        assert_eq!(session.pending_overlays(), 0);
    }

    #[test]
    fn test_anchor_is_submit_time_ink_center() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let mut surface = drawn_surface();
        let t0 = Instant::now();

        let bounds = InkBounds::scan(surface.pixels(), surface.width(), surface.height());
        let expected = bounds.center().unwrap();

        session.submit(&surface, &mut transport).unwrap();
        // Redrawing after submit must not move the anchor.
        surface.pointer_down(Point::new(60.0, 5.0), DeviceKind::Pen);
        surface.pointer_move(Point::new(63.0, 5.0), 1.0, DeviceKind::Pen);

        transport.complete(vec![item("x", "5", true)]);
        session.poll(&mut transport, &mut overlays, t0);
        session.poll(&mut transport, &mut overlays, t0 + OVERLAY_DELAY);

        assert_eq!(overlays.overlays()[0].position(), expected);
    }

    #[test]
    fn test_blank_canvas_uses_default_anchor() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let surface = Surface::new(64, 64, Rgba::black());
        let t0 = Instant::now();

        session.submit(&surface, &mut transport).unwrap();
        transport.complete(vec![item("0", "0", false)]);
        session.poll(&mut transport, &mut overlays, t0);
        session.poll(&mut transport, &mut overlays, t0 + OVERLAY_DELAY);

        assert_eq!(overlays.overlays()[0].position(), Point::new(10.0, 200.0));
    }

    #[test]
    fn test_second_submit_while_busy_is_rejected() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let surface = drawn_surface();

        session.submit(&surface, &mut transport).unwrap();
        assert!(matches!(
            session.submit(&surface, &mut transport),
            Err(SubmitError::Busy)
        ));
        assert_eq!(transport.submissions.len(), 1);
    }

    #[test]
    fn test_bindings_travel_with_next_request() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let surface = drawn_surface();
        let t0 = Instant::now();

        session.submit(&surface, &mut transport).unwrap();
        transport.complete(vec![item("x", "5", true)]);
        session.poll(&mut transport, &mut overlays, t0);

        session.submit(&surface, &mut transport).unwrap();
        assert_eq!(transport.submissions[1].dict_of_vars["x"], "5");
        // First request went out before the binding existed.
        assert!(transport.submissions[0].dict_of_vars.is_empty());
    }

    #[test]
    fn test_later_assignment_overwrites_earlier() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let surface = drawn_surface();

        session.submit(&surface, &mut transport).unwrap();
        transport.complete(vec![item("x", "1", true), item("x", "2", true)]);
        session.poll(&mut transport, &mut overlays, Instant::now());

        assert_eq!(session.bindings()["x"], "2");
    }

    #[test]
    fn test_transport_failure_surfaces_and_recovers() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let surface = drawn_surface();
        let ink_before = surface.pixels().to_vec();

        session.submit(&surface, &mut transport).unwrap();
        transport.fail("connection refused");
        let notices = session.poll(&mut transport, &mut overlays, Instant::now());

        assert!(matches!(
            &notices[..],
            [SessionNotice::SubmitFailed { message }] if message == "connection refused"
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(overlays.is_empty());
        assert!(session.bindings().is_empty());
        assert_eq!(surface.pixels(), &ink_before[..]);

        // Session is usable again.
        session.submit(&surface, &mut transport).unwrap();
    }

    #[test]
    fn test_reset_cancels_pending_overlays() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let mut surface = drawn_surface();
        let t0 = Instant::now();

        session.submit(&surface, &mut transport).unwrap();
        transport.complete(vec![item("x", "5", true)]);
        session.poll(&mut transport, &mut overlays, t0);
        assert_eq!(session.pending_overlays(), 1);

        session.reset(&mut surface, &mut overlays);
        session.poll(&mut transport, &mut overlays, t0 + OVERLAY_DELAY);

        assert!(overlays.is_empty());
        assert!(session.bindings().is_empty());
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reset_discards_in_flight_response() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let mut surface = drawn_surface();
        let t0 = Instant::now();

        session.submit(&surface, &mut transport).unwrap();
        session.reset(&mut surface, &mut overlays);

        // Response lands after the reset.
        transport.complete(vec![item("x", "5", true)]);
        session.poll(&mut transport, &mut overlays, t0);
        session.poll(&mut transport, &mut overlays, t0 + OVERLAY_DELAY);

        assert!(overlays.is_empty());
        assert!(session.bindings().is_empty());
        assert_eq!(session.pending_overlays(), 0);
    }

    #[test]
    fn test_new_submission_cancels_stale_pending() {
        let mut session = controller();
        let mut transport = FakeTransport::default();
        let mut overlays = OverlayManager::new();
        let surface = drawn_surface();
        let t0 = Instant::now();

        session.submit(&surface, &mut transport).unwrap();
        transport.complete(vec![item("old", "1", false)]);
        session.poll(&mut transport, &mut overlays, t0);
        assert_eq!(session.pending_overlays(), 1);

        // Resubmit before the stale overlay fires.
        session.submit(&surface, &mut transport).unwrap();
        assert_eq!(session.pending_overlays(), 0);

        transport.complete(vec![item("new", "2", false)]);
        session.poll(&mut transport, &mut overlays, t0 + OVERLAY_DELAY);
        session.poll(&mut transport, &mut overlays, t0 + OVERLAY_DELAY * 2);

        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays.overlays()[0].content(), r"\[\LARGE new = 2 \]");
    }
}
