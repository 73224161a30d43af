use crate::geometry::{perpendicular_distance_from_ray, Point};

/// Motion samples closer than this to the current segment origin are ignored
/// outright.
pub const RADIAL_DISTANCE_TOLERANCE: f64 = 5.0;
/// Half-width of the tolerance ray; exceeding it commits a turning point and
/// starts a new line segment.
pub const PERPENDICULAR_DISTANCE_TOLERANCE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
struct TurningPointCandidate {
    point: Point,
    score: f64,
    is_left_of_ray: Option<bool>,
}

/// Result of feeding one motion sample to the tracker.
#[derive(Debug, Clone, Copy)]
pub struct StrokeUpdate {
    pub segment_origin: Point,
    pub latest_pos: Point,
    pub starting_new_segment: bool,
}

/// Streaming Opheim-style line simplification with turning-point tracking.
///
/// Simplification happens sample by sample while the user is still drawing,
/// so the committed vertex list stays bounded by genuine direction changes
/// and the match at stroke end never sees thousands of raw samples.
///
/// Outline (steps marked * are not in the textbook algorithm):
/// * Keep an origin point, a tolerance ray from the origin towards the
///   furthest point seen in the current segment, and a turning point
///   candidate (*) scored to sit at the far end of the segment.
/// * Ignore samples within the radial tolerance of the origin.
/// * Commit the candidate as a real vertex and restart the ray from it when
///   the sample leaves the tolerance ray, or when it backtracks towards the
///   origin by more than the radial tolerance compared to the candidate (*).
/// * Otherwise only the uncommitted end of the current segment moves.
///
/// The candidate update is biased to avoid flip-flopping between the two
/// sides of the ray on purely lateral jitter. The bias is an empirically
/// tuned heuristic; its comparison structure is load-bearing for the shape
/// of recognized strokes.
#[derive(Debug, Default)]
pub struct StrokeTracker {
    origin: Point,
    tolerance_vector: Point,
    turning_candidate: TurningPointCandidate,
}

impl StrokeTracker {
    /// Starts tracking with the grab's press point as origin and the
    /// position that exceeded the activation distance as the segment end.
    /// `points` becomes the committed vertex list `[origin, position]`.
    pub fn begin(points: &mut Vec<Point>, position: Point) -> Self {
        let origin = points.first().copied().unwrap_or(position);
        points.truncate(1);
        points.push(position);
        Self {
            origin,
            tolerance_vector: position - origin,
            turning_candidate: TurningPointCandidate {
                point: position,
                score: 0.0,
                is_left_of_ray: None,
            },
        }
    }

    /// Feeds the next motion sample, updating `points` in place.
    #[profiling::function]
    pub fn advance(&mut self, points: &mut Vec<Point>, position: Point) -> StrokeUpdate {
        let delta_from_origin = position - self.origin;
        let distance_from_origin = delta_from_origin.length();

        if distance_from_origin > RADIAL_DISTANCE_TOLERANCE {
            if self.tolerance_vector.is_zero() {
                // First candidate in this segment; by definition it lies
                // within the tolerance ray and is not a segment-starting
                // turn. It keeps being updated until one commits.
                self.tolerance_vector = delta_from_origin;
                self.turning_candidate = TurningPointCandidate {
                    point: position,
                    score: distance_from_origin,
                    is_left_of_ray: None,
                };
            } else {
                let perpendicular =
                    perpendicular_distance_from_ray(position, self.origin, self.tolerance_vector);

                let mut starting_new_segment = false;
                if perpendicular.distance > PERPENDICULAR_DISTANCE_TOLERANCE {
                    starting_new_segment = true;
                } else if distance_from_origin
                    < (self.turning_candidate.point - self.origin).length()
                        - RADIAL_DISTANCE_TOLERANCE
                {
                    // Backtracking relative to the turning point candidate.
                    starting_new_segment = true;
                }

                if starting_new_segment {
                    // Lock in the turning point as a real vertex, then open a
                    // new segment from it to the current position.
                    self.origin = self.turning_candidate.point;
                    if let Some(last) = points.last_mut() {
                        *last = self.turning_candidate.point;
                    }
                    points.push(position);

                    let update = StrokeUpdate {
                        segment_origin: self.origin,
                        latest_pos: position,
                        starting_new_segment: true,
                    };
                    // The ray is re-established once the radial tolerance is
                    // exceeded again.
                    self.tolerance_vector = Point::ZERO;
                    self.turning_candidate = TurningPointCandidate::default();
                    return update;
                }

                // Still inside the ray and not backtracking. A plain
                // distance score would let purely lateral moves steal the
                // candidate from the other side of the ray, so same-side
                // candidates get their perpendicular distance as a bonus.
                let perpendicular_distance_bias =
                    if Some(perpendicular.is_left_of_ray) == self.turning_candidate.is_left_of_ray {
                        perpendicular.distance
                    } else {
                        0.0
                    };
                let score = distance_from_origin + perpendicular_distance_bias;
                if score > self.turning_candidate.score {
                    self.turning_candidate = TurningPointCandidate {
                        point: position,
                        score,
                        is_left_of_ray: Some(perpendicular.is_left_of_ray),
                    };
                }
            }
        }

        if let Some(last) = points.last_mut() {
            *last = position;
        }
        StrokeUpdate {
            segment_origin: self.origin,
            latest_pos: position,
            starting_new_segment: false,
        }
    }
}
