use std::time::Duration;

use crate::event::Modifiers;
use crate::geometry::Point;
use crate::stroke::gestures::StrokeActionInfo;

/// Emitted once when pointer travel exceeds the activation distance and
/// stroke recognition starts.
#[derive(Debug, Clone)]
pub struct StrokeGestureBeginEvent {
    pub modifiers: Modifiers,
    pub origin: Point,
    pub latest_pos: Point,
    pub time: Duration,
}

/// Emitted for every tracked motion sample while a stroke is active.
#[derive(Debug, Clone)]
pub struct StrokeGestureUpdateEvent {
    pub segment_origin: Point,
    pub latest_pos: Point,
    /// True when the simplifier just committed a turning point and opened a
    /// new line segment.
    pub starting_new_segment: bool,
    pub time: Duration,
}

/// Emitted when a stroke ended and a registered template matched.
#[derive(Debug, Clone)]
pub struct StrokeGestureEndEvent {
    pub triggered_action: StrokeActionInfo,
    pub score: f64,
    pub time: Duration,
}

/// Emitted when a stroke ended without a match, or was aborted.
#[derive(Debug, Clone)]
pub struct StrokeGestureCancelEvent {
    pub time: Duration,
}

/// The downstream notification target for stroke recognition, typically a
/// compositor's effects layer drawing the live trace.
///
/// All hooks default to no-ops so implementors only override what they
/// consume.
pub trait EffectsHandler {
    fn stroke_gesture_begin(&mut self, _event: &StrokeGestureBeginEvent) {}
    fn stroke_gesture_update(&mut self, _event: &StrokeGestureUpdateEvent) {}
    fn stroke_gesture_end(&mut self, _event: &StrokeGestureEndEvent) {}
    fn stroke_gesture_cancelled(&mut self, _event: &StrokeGestureCancelEvent) {}
}
