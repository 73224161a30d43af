use std::rc::Rc;
use std::time::Duration;

use crate::device::InputDevice;
use crate::event::{ButtonState, MouseButtons, SurfaceId};
use crate::geometry::Point;

/// Collaborator capable of synthesizing pointer button events back into the
/// dispatch pipeline. Used by the stroke filter to replay a consumed
/// activation click one event-loop iteration later.
pub trait PointerButtonSink {
    fn process_button(
        &self,
        native_button: u32,
        state: ButtonState,
        time: Duration,
        device: &Rc<InputDevice>,
    );
}

/// Pointer redirection façade: global position, held-button bookkeeping and
/// the hovered/focused surface.
#[derive(Debug, Default)]
pub struct PointerRedirection {
    position: Point,
    buttons: MouseButtons,
    pressed_native: Vec<u32>,
    hover: Option<SurfaceId>,
    focus: Option<SurfaceId>,
}

impl PointerRedirection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current global pointer position.
    pub fn position(&self) -> Point {
        self.position
    }

    /// The surface currently under the pointer, per the embedder's resolver.
    pub fn hover(&self) -> Option<SurfaceId> {
        self.hover
    }

    /// The surface holding pointer focus. This can lag behind `hover`: it
    /// only moves on unconsumed button presses.
    pub fn focus(&self) -> Option<SurfaceId> {
        self.focus
    }

    pub(crate) fn set_hover(&mut self, hover: Option<SurfaceId>) {
        self.hover = hover;
    }

    pub(crate) fn set_focus(&mut self, focus: Option<SurfaceId>) {
        self.focus = focus;
    }

    /// Currently held logical buttons.
    pub fn button_states(&self) -> MouseButtons {
        self.buttons
    }

    pub fn is_button_pressed(&self, native_button: u32) -> bool {
        self.pressed_native.contains(&native_button)
    }

    /// Applies a relative motion, returning the new position.
    pub(crate) fn apply_motion(&mut self, delta: Point) -> Point {
        self.position += delta;
        self.position
    }

    /// Applies an absolute motion, returning the delta from the previous
    /// position.
    pub(crate) fn apply_motion_absolute(&mut self, position: Point) -> Point {
        let delta = position - self.position;
        self.position = position;
        delta
    }

    /// Records a button transition; the returned set includes the pressed
    /// button on press and excludes it on release.
    pub(crate) fn apply_button(&mut self, native_button: u32, state: ButtonState) -> MouseButtons {
        match state {
            ButtonState::Pressed => {
                if !self.pressed_native.contains(&native_button) {
                    self.pressed_native.push(native_button);
                }
                self.buttons |= MouseButtons::from_native(native_button);
            }
            ButtonState::Released => {
                self.pressed_native.retain(|b| *b != native_button);
                // Another physical button may map to the same logical one.
                let logical = MouseButtons::from_native(native_button);
                if !self
                    .pressed_native
                    .iter()
                    .any(|b| MouseButtons::from_native(*b) == logical)
                {
                    self.buttons &= !logical;
                }
            }
        }
        self.buttons
    }
}
