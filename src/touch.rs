use std::collections::HashMap;

use crate::event::SurfaceId;
use crate::geometry::Point;

/// Touch redirection façade: tracks active touch points by slot id, and the
/// surface the first touch landed on.
#[derive(Debug, Default)]
pub struct TouchRedirection {
    points: HashMap<i32, Point>,
    focus: Option<SurfaceId>,
}

impl TouchRedirection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, id: i32) -> Option<Point> {
        self.points.get(&id).copied()
    }

    pub fn focus(&self) -> Option<SurfaceId> {
        self.focus
    }

    pub(crate) fn set_focus(&mut self, focus: Option<SurfaceId>) {
        self.focus = focus;
    }

    pub fn active_points(&self) -> usize {
        self.points.len()
    }

    pub(crate) fn down(&mut self, id: i32, position: Point) {
        self.points.insert(id, position);
    }

    pub(crate) fn motion(&mut self, id: i32, position: Point) {
        if let Some(point) = self.points.get_mut(&id) {
            *point = position;
        }
    }

    pub(crate) fn up(&mut self, id: i32) {
        self.points.remove(&id);
        if self.points.is_empty() {
            self.focus = None;
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.points.clear();
        self.focus = None;
    }
}
