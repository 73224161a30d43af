use std::f64::consts::PI;
use std::rc::Rc;

use tracing::debug;

use crate::event::Modifiers;
use crate::geometry::Point;

/// Candidates scoring below this are rejected; the stroke is then reported as
/// cancelled rather than triggering anything.
pub const MIN_MATCHING_SCORE: f64 = 0.7;

/// Number of equal-arc-length samples a polyline is reduced to before its
/// angular signature is taken.
const SIGNATURE_SAMPLES: usize = 32;

/// Identifies the action a recognized stroke triggers, for downstream
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrokeActionInfo {
    pub name: String,
    pub label: String,
}

impl StrokeActionInfo {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// A registered stroke template: a reference polyline with its precomputed
/// directional encoding, immutable after construction.
pub struct StrokeGesture {
    points: Vec<Point>,
    signature: Vec<f64>,
    modifiers: Modifiers,
    action: StrokeActionInfo,
    on_triggered: Option<Box<dyn Fn()>>,
}

impl std::fmt::Debug for StrokeGesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrokeGesture")
            .field("action", &self.action)
            .field("modifiers", &self.modifiers)
            .field("points", &self.points.len())
            .finish()
    }
}

impl StrokeGesture {
    /// Builds a template from a reference polyline. Returns None for
    /// degenerate polylines (fewer than two points, or zero total length)
    /// which cannot encode a direction.
    pub fn new(points: Vec<Point>, modifiers: Modifiers, action: StrokeActionInfo) -> Option<Self> {
        let signature = angular_signature(&points)?;
        Some(Self {
            points,
            signature,
            modifiers,
            action,
            on_triggered: None,
        })
    }

    /// Registers a callback invoked when this gesture is the winning match of
    /// an ended stroke.
    pub fn with_triggered(mut self, callback: impl Fn() + 'static) -> Self {
        self.on_triggered = Some(Box::new(callback));
        self
    }

    pub fn min_matching_score() -> f64 {
        MIN_MATCHING_SCORE
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn action_info(&self) -> &StrokeActionInfo {
        &self.action
    }

    pub(crate) fn trigger(&self) {
        if let Some(callback) = &self.on_triggered {
            callback();
        }
    }

    /// Similarity of an input polyline against this template, in 0.0..=1.0.
    /// Pure geometry: scale and translation invariant, orientation sensitive.
    #[profiling::function]
    pub fn compare(&self, points: &[Point]) -> f64 {
        let Some(candidate) = angular_signature(points) else {
            return 0.0;
        };
        let total: f64 = self
            .signature
            .iter()
            .zip(&candidate)
            .map(|(a, b)| angular_difference(*a, *b))
            .sum();
        1.0 - total / (self.signature.len() as f64 * PI)
    }
}

/// Insertion-ordered collection of registered stroke templates. Does not own
/// the gestures; whatever UI/config layer registered them does.
#[derive(Debug, Default)]
pub struct StrokeGestures {
    gestures: Vec<Rc<StrokeGesture>>,
}

impl StrokeGestures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, gesture: Rc<StrokeGesture>) {
        self.gestures.push(gesture);
    }

    /// Removes a gesture by identity. Unknown gestures are ignored.
    pub fn remove(&mut self, gesture: &Rc<StrokeGesture>) {
        self.gestures.retain(|g| !Rc::ptr_eq(g, gesture));
    }

    pub fn len(&self) -> usize {
        self.gestures.len()
    }

    /// True when no gesture is registered for this modifier combination.
    pub fn is_empty(&self, modifiers: Modifiers) -> bool {
        !self.gestures.iter().any(|g| g.modifiers == modifiers)
    }

    /// The best-scoring registered gesture for the input polyline among those
    /// matching the modifier combination, or None when nothing reaches
    /// [`MIN_MATCHING_SCORE`]. Ties go to the first registered gesture.
    #[profiling::function]
    pub fn best_match(&self, modifiers: Modifiers, points: &[Point]) -> Option<(Rc<StrokeGesture>, f64)> {
        let mut best: Option<(Rc<StrokeGesture>, f64)> = None;
        for gesture in self.gestures.iter().filter(|g| g.modifiers == modifiers) {
            let score = gesture.compare(points);
            debug!(action = %gesture.action.name, score, "scored stroke candidate");
            if score >= MIN_MATCHING_SCORE && best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((gesture.clone(), score));
            }
        }
        best
    }
}

/// Resamples a polyline to `SIGNATURE_SAMPLES` points spaced evenly along its
/// arc length, then encodes it as the sequence of segment direction angles.
/// None for polylines with no measurable length.
fn angular_signature(points: &[Point]) -> Option<Vec<f64>> {
    let resampled = resample(points, SIGNATURE_SAMPLES)?;
    Some(
        resampled
            .windows(2)
            .map(|pair| {
                let d = pair[1] - pair[0];
                d.y.atan2(d.x)
            })
            .collect(),
    )
}

fn resample(points: &[Point], samples: usize) -> Option<Vec<Point>> {
    if points.len() < 2 {
        return None;
    }
    let total: f64 = points.windows(2).map(|p| p[0].distance_to(p[1])).sum();
    if total <= 0.0 {
        return None;
    }

    let step = total / (samples - 1) as f64;
    let mut out = Vec::with_capacity(samples);
    out.push(points[0]);

    let mut carried = 0.0;
    let mut previous = points[0];
    for &point in &points[1..] {
        let mut segment = previous.distance_to(point);
        let mut origin = previous;
        while carried + segment >= step && out.len() < samples - 1 {
            let t = (step - carried) / segment;
            let interpolated = origin + (point - origin) * t;
            out.push(interpolated);
            segment -= step - carried;
            carried = 0.0;
            origin = interpolated;
        }
        carried += segment;
        previous = point;
    }
    while out.len() < samples {
        out.push(points[points.len() - 1]);
    }
    Some(out)
}

/// Absolute angular difference wrapped to 0..=PI.
fn angular_difference(a: f64, b: f64) -> f64 {
    let mut diff = (a - b).rem_euclid(2.0 * PI);
    if diff > PI {
        diff = 2.0 * PI - diff;
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn line(from: Point, to: Point) -> Vec<Point> {
        vec![from, to]
    }

    fn horizontal() -> Rc<StrokeGesture> {
        Rc::new(
            StrokeGesture::new(
                line(Point::ZERO, Point::new(200.0, 0.0)),
                Modifiers::empty(),
                StrokeActionInfo::new("next", "Next track"),
            )
            .unwrap(),
        )
    }

    #[test]
    fn degenerate_polylines_make_no_template() {
        assert!(StrokeGesture::new(vec![], Modifiers::empty(), StrokeActionInfo::new("a", "a")).is_none());
        assert!(StrokeGesture::new(
            vec![Point::new(5.0, 5.0)],
            Modifiers::empty(),
            StrokeActionInfo::new("a", "a")
        )
        .is_none());
        assert!(StrokeGesture::new(
            vec![Point::new(5.0, 5.0), Point::new(5.0, 5.0)],
            Modifiers::empty(),
            StrokeActionInfo::new("a", "a")
        )
        .is_none());
    }

    #[test]
    fn exact_replay_scores_maximum() {
        let gesture = horizontal();
        let score = gesture.compare(gesture.points());
        assert!((score - 1.0).abs() < 1e-9);
        assert!(score >= StrokeGesture::min_matching_score());
    }

    #[test]
    fn scale_and_translation_do_not_affect_the_score() {
        let gesture = horizontal();
        let score = gesture.compare(&line(Point::new(40.0, 80.0), Point::new(90.0, 80.0)));
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reversed_direction_scores_zero() {
        let gesture = horizontal();
        let score = gesture.compare(&line(Point::new(200.0, 0.0), Point::ZERO));
        assert!(score < 1e-9);
    }

    #[test]
    fn perpendicular_stroke_stays_below_threshold() {
        let gesture = horizontal();
        let score = gesture.compare(&line(Point::ZERO, Point::new(0.0, 200.0)));
        assert!(score < MIN_MATCHING_SCORE);
    }

    #[test]
    fn best_match_prefers_the_closer_template() {
        let mut gestures = StrokeGestures::new();
        let horizontal = horizontal();
        let l_shape = Rc::new(
            StrokeGesture::new(
                vec![Point::ZERO, Point::new(100.0, 0.0), Point::new(100.0, 100.0)],
                Modifiers::empty(),
                StrokeActionInfo::new("corner", "Corner"),
            )
            .unwrap(),
        );
        gestures.add(horizontal.clone());
        gestures.add(l_shape.clone());

        let (winner, score) = gestures
            .best_match(Modifiers::empty(), &line(Point::ZERO, Point::new(300.0, 0.0)))
            .unwrap();
        assert!(Rc::ptr_eq(&winner, &horizontal));
        assert!(score > 0.99);

        let (winner, _) = gestures
            .best_match(
                Modifiers::empty(),
                &[Point::ZERO, Point::new(50.0, 0.0), Point::new(50.0, 50.0)],
            )
            .unwrap();
        assert!(Rc::ptr_eq(&winner, &l_shape));
    }

    #[test]
    fn candidates_are_prefiltered_by_modifiers() {
        let mut gestures = StrokeGestures::new();
        let plain = horizontal();
        let with_ctrl = Rc::new(
            StrokeGesture::new(
                line(Point::ZERO, Point::new(200.0, 0.0)),
                Modifiers::CTRL,
                StrokeActionInfo::new("ctrl-next", "Ctrl next"),
            )
            .unwrap(),
        );
        gestures.add(plain);
        gestures.add(with_ctrl.clone());

        assert!(gestures.is_empty(Modifiers::ALT));
        assert!(!gestures.is_empty(Modifiers::CTRL));

        let (winner, _) = gestures
            .best_match(Modifiers::CTRL, &line(Point::ZERO, Point::new(100.0, 0.0)))
            .unwrap();
        assert!(Rc::ptr_eq(&winner, &with_ctrl));
    }

    #[test]
    fn ties_go_to_the_first_registered_gesture() {
        let mut gestures = StrokeGestures::new();
        let first = horizontal();
        let duplicate = Rc::new(
            StrokeGesture::new(
                line(Point::ZERO, Point::new(200.0, 0.0)),
                Modifiers::empty(),
                StrokeActionInfo::new("other", "Other"),
            )
            .unwrap(),
        );
        gestures.add(first.clone());
        gestures.add(duplicate);

        let (winner, _) = gestures
            .best_match(Modifiers::empty(), &line(Point::ZERO, Point::new(100.0, 0.0)))
            .unwrap();
        assert!(Rc::ptr_eq(&winner, &first));
    }

    #[test]
    fn no_match_below_threshold() {
        let mut gestures = StrokeGestures::new();
        gestures.add(horizontal());
        assert!(gestures
            .best_match(Modifiers::empty(), &line(Point::new(200.0, 0.0), Point::ZERO))
            .is_none());
    }

    #[test]
    fn removal_is_by_identity() {
        let mut gestures = StrokeGestures::new();
        let a = horizontal();
        let b = horizontal();
        gestures.add(a.clone());
        gestures.add(b.clone());
        gestures.remove(&a);
        assert_eq!(gestures.len(), 1);
        let (winner, _) = gestures
            .best_match(Modifiers::empty(), &line(Point::ZERO, Point::new(100.0, 0.0)))
            .unwrap();
        assert!(Rc::ptr_eq(&winner, &b));
    }

    #[test]
    fn triggered_callback_fires() {
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let gesture = StrokeGesture::new(
            line(Point::ZERO, Point::new(10.0, 0.0)),
            Modifiers::empty(),
            StrokeActionInfo::new("n", "N"),
        )
        .unwrap()
        .with_triggered(move || counter.set(counter.get() + 1));
        gesture.trigger();
        assert_eq!(count.get(), 1);
    }
}
