pub mod gestures;
pub mod simplify;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::StrokeSettings;
use crate::device::{DeviceId, InputDevice};
use crate::effects::{
    EffectsHandler, StrokeGestureBeginEvent, StrokeGestureCancelEvent, StrokeGestureEndEvent,
    StrokeGestureUpdateEvent,
};
use crate::event::{ButtonState, Modifiers, MouseButtons, PointerButtonEvent, PointerMotionEvent};
use crate::geometry::Point;
use crate::input::InputEventFilter;
use crate::pointer::PointerButtonSink;
use crate::scheduler::{Scheduler, TimerToken};
use crate::stroke::gestures::StrokeGestures;
use crate::stroke::simplify::StrokeTracker;

/// Claim on the press/release pair of one device's activation button while we
/// wait to see whether the pointer travels far enough to become a stroke.
#[derive(Debug)]
struct ButtonGrab {
    device: Weak<InputDevice>,
    /// Committed stroke vertices, append-only while grabbed.
    points: Vec<Point>,
    native_button: u32,
    modifiers: Modifiers,
    last_timestamp: Duration,
    /// Set once the emulated press/release replay has been scheduled; the
    /// entry then only exists to swallow its own round-trip.
    releasing: bool,
}

/// Input event filter implementing freehand stroke recognition.
///
/// Consumes the configured activation button per device, tracks the drawn
/// path through the incremental simplifier while the grab is active, and at
/// stroke end either triggers the best-matching registered gesture or reports
/// the stroke as cancelled. A consumed click that never became a stroke is
/// replayed through the pointer pipeline one event-loop iteration later so it
/// still behaves as an ordinary click.
pub struct StrokeInputFilter {
    gestures: Rc<RefCell<StrokeGestures>>,
    effects: Weak<RefCell<dyn EffectsHandler>>,
    scheduler: Rc<dyn Scheduler>,
    replay: Rc<dyn PointerButtonSink>,

    activation_button: HashMap<String, u32>,
    activation_distance: f64,
    start_buttonless_timeout: Duration,
    end_buttonless_timeout: Duration,

    button_grabs: IndexMap<DeviceId, ButtonGrab>,
    active_grab_device: Option<DeviceId>,
    tracker: StrokeTracker,
    buttonless_timer: Option<TimerToken>,

    self_weak: Weak<RefCell<StrokeInputFilter>>,
}

impl StrokeInputFilter {
    pub fn new(
        settings: &StrokeSettings,
        gestures: Rc<RefCell<StrokeGestures>>,
        effects: Weak<RefCell<dyn EffectsHandler>>,
        scheduler: Rc<dyn Scheduler>,
        replay: Rc<dyn PointerButtonSink>,
    ) -> Rc<RefCell<Self>> {
        let filter = Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            RefCell::new(Self {
                gestures,
                effects,
                scheduler,
                replay,
                activation_button: HashMap::new(),
                activation_distance: 0.0,
                start_buttonless_timeout: Duration::ZERO,
                end_buttonless_timeout: Duration::ZERO,
                button_grabs: IndexMap::new(),
                active_grab_device: None,
                tracker: StrokeTracker::default(),
                buttonless_timer: None,
                self_weak: weak.clone(),
            })
        });
        filter.borrow_mut().reconfigure(settings);
        filter
    }

    pub fn reconfigure(&mut self, settings: &StrokeSettings) {
        self.activation_distance = settings.activation_distance;
        self.start_buttonless_timeout = Duration::from_millis(settings.start_buttonless_timeout_ms);
        self.end_buttonless_timeout = Duration::from_millis(settings.end_buttonless_timeout_ms);
        if self.end_buttonless_timeout.is_zero() {
            self.end_buttonless_timeout = self.start_buttonless_timeout;
        }
        self.activation_button = settings
            .devices
            .iter()
            .map(|(name, device)| (name.clone(), device.activation_button))
            .collect();
    }

    pub fn gestures(&self) -> Rc<RefCell<StrokeGestures>> {
        self.gestures.clone()
    }

    fn pointer_button_pressed(&mut self, event: &PointerButtonEvent) -> bool {
        let device_id = event.device.id();

        if let Some(grab) = self.button_grabs.get_mut(&device_id) {
            // Once a button grab started, pressing another button cancels a
            // possible stroke.
            if event.native_button != grab.native_button {
                if self.active_grab_device == Some(device_id) {
                    self.cancel_stroke(event.timestamp);
                } else {
                    let scheduler = self.scheduler.clone();
                    let replay = self.replay.clone();
                    if !grab.releasing {
                        release_grab(&*scheduler, &replay, grab);
                    }
                }
            }
            // Also pass through an emulated activation button press that
            // never turned active.
            return false;
        }

        // Multiple devices can be grabbed, but once any of them moved far
        // enough we are in active recognition and discard other attempts at
        // starting a new one.
        if self.active_grab_device.is_some() {
            return false;
        }

        // Don't grab the button if no gestures are registered to begin with.
        if self.gestures.borrow().is_empty(event.modifiers) {
            return false;
        }

        let Some(&activation) = self.activation_button.get(event.device.name()) else {
            return false;
        };

        // Only look for strokes when *only* the activation button is down.
        if event.native_button == activation
            && (event.buttons & !MouseButtons::from_native(activation)).is_empty()
        {
            self.button_grabs.insert(
                device_id,
                ButtonGrab {
                    device: Rc::downgrade(&event.device),
                    points: vec![event.position],
                    native_button: event.native_button,
                    modifiers: event.modifiers,
                    last_timestamp: event.timestamp,
                    releasing: false,
                },
            );
            return true; // inhibit the button event
        }

        false
    }

    fn pointer_button_released(&mut self, event: &PointerButtonEvent) -> bool {
        let device_id = event.device.id();
        let Some(grab) = self.button_grabs.get_mut(&device_id) else {
            return false;
        };

        if event.native_button != grab.native_button {
            return false;
        }

        if grab.releasing {
            // Emulated button release after ending stroke recognition.
            self.button_grabs.shift_remove(&device_id);
            return false;
        }
        grab.last_timestamp = event.timestamp;

        if !self.start_buttonless_timeout.is_zero() && self.active_grab_device.is_none() {
            let timeout = self.start_buttonless_timeout;
            self.restart_buttonless_timer(timeout);
        } else {
            self.end_stroke(event.timestamp);
        }
        true // inhibit the button event
    }

    fn on_pointer_motion(&mut self, event: &PointerMotionEvent) -> bool {
        let device_id = event.device.id();
        if !self.button_grabs.contains_key(&device_id) {
            return false;
        }
        if self.effects.strong_count() == 0 {
            // No recognition can start if there is nobody to notify.
            return false;
        }

        if self.active_grab_device.is_none() {
            // Start recognition once the pointer moved far enough from the
            // button-pressed starting point.
            let start = self.button_grabs[&device_id].points[0];
            if start.distance_to(event.position) >= self.activation_distance {
                self.active_grab_device = Some(device_id);
                self.release_inactive_button_grabs();
                self.begin_stroke(device_id, event);
            }
        } else if self.active_grab_device == Some(device_id) {
            self.update_stroke(device_id, event);
        }

        // Extend the duration of buttonless stroke timeouts if that's what we
        // started with.
        if self.buttonless_timer.is_some() {
            let timeout = self.end_buttonless_timeout;
            self.restart_buttonless_timer(timeout);
            if let Some(grab) = self.button_grabs.get_mut(&device_id) {
                // Timestamp for emulating a click that never turns active.
                grab.last_timestamp = event.timestamp;
            }
        }

        false
    }

    fn begin_stroke(&mut self, device_id: DeviceId, event: &PointerMotionEvent) {
        let Some(effects) = self.effects.upgrade() else {
            return;
        };
        let Some(grab) = self.button_grabs.get_mut(&device_id) else {
            return;
        };
        debug!(device = %event.device.name(), "starting stroke recognition");

        let begin = StrokeGestureBeginEvent {
            modifiers: grab.modifiers,
            origin: grab.points[0],
            latest_pos: *grab.points.last().unwrap_or(&event.position),
            time: event.timestamp,
        };
        effects.borrow_mut().stroke_gesture_begin(&begin);

        self.tracker = StrokeTracker::begin(&mut grab.points, event.position);
    }

    fn update_stroke(&mut self, device_id: DeviceId, event: &PointerMotionEvent) {
        let Some(effects) = self.effects.upgrade() else {
            return;
        };
        let Some(grab) = self.button_grabs.get_mut(&device_id) else {
            return;
        };
        let update = self.tracker.advance(&mut grab.points, event.position);
        effects
            .borrow_mut()
            .stroke_gesture_update(&StrokeGestureUpdateEvent {
                segment_origin: update.segment_origin,
                latest_pos: update.latest_pos,
                starting_new_segment: update.starting_new_segment,
                time: event.timestamp,
            });
    }

    fn end_stroke(&mut self, time: Duration) {
        self.stop_buttonless_timer();
        self.release_inactive_button_grabs();

        let Some(active) = self.active_grab_device.take() else {
            return;
        };
        let Some(grab) = self.button_grabs.shift_remove(&active) else {
            return;
        };
        debug!(points = grab.points.len(), "ending stroke recognition");

        let matched = self.gestures.borrow().best_match(grab.modifiers, &grab.points);

        let Some(effects) = self.effects.upgrade() else {
            return;
        };
        match matched {
            Some((gesture, score)) => {
                debug!(action = %gesture.action_info().name, score, "matched stroke gesture");
                gesture.trigger();
                effects.borrow_mut().stroke_gesture_end(&StrokeGestureEndEvent {
                    triggered_action: gesture.action_info().clone(),
                    score,
                    time,
                });
            }
            None => {
                debug!("no stroke matches");
                effects
                    .borrow_mut()
                    .stroke_gesture_cancelled(&StrokeGestureCancelEvent { time });
            }
        }
    }

    /// Aborts active recognition without attempting a match.
    fn cancel_stroke(&mut self, time: Duration) {
        self.stop_buttonless_timer();
        self.release_inactive_button_grabs();

        let Some(active) = self.active_grab_device.take() else {
            return;
        };
        self.button_grabs.shift_remove(&active);
        debug!("cancelling stroke recognition");

        if let Some(effects) = self.effects.upgrade() {
            effects
                .borrow_mut()
                .stroke_gesture_cancelled(&StrokeGestureCancelEvent { time });
        }
    }

    fn release_inactive_button_grabs(&mut self) {
        let scheduler = self.scheduler.clone();
        let replay = self.replay.clone();
        let active = self.active_grab_device;
        for (id, grab) in self.button_grabs.iter_mut() {
            if Some(*id) != active && !grab.releasing {
                release_grab(&*scheduler, &replay, grab);
            }
        }
    }

    fn stop_buttonless_timer(&mut self) {
        if let Some(token) = self.buttonless_timer.take() {
            self.scheduler.cancel(token);
        }
    }

    fn restart_buttonless_timer(&mut self, timeout: Duration) {
        self.stop_buttonless_timer();
        let weak = self.self_weak.clone();
        self.buttonless_timer = self.scheduler.schedule(
            timeout,
            Box::new(move || {
                if let Some(filter) = weak.upgrade() {
                    let mut filter = filter.borrow_mut();
                    filter.buttonless_timer = None;
                    filter.on_buttonless_timeout();
                }
            }),
        );
    }

    fn on_buttonless_timeout(&mut self) {
        let time = self
            .active_grab_device
            .and_then(|id| self.button_grabs.get(&id))
            .or_else(|| self.button_grabs.values().last())
            .map(|grab| grab.last_timestamp)
            .unwrap_or_default();
        self.end_stroke(time);
    }
}

/// Marks the grab as releasing and schedules the emulated press/release pair
/// for the next event-loop iteration, so replay never happens inside the
/// dispatch that decided to release.
fn release_grab(scheduler: &dyn Scheduler, replay: &Rc<dyn PointerButtonSink>, grab: &mut ButtonGrab) {
    grab.releasing = true;

    let replay = replay.clone();
    let device = grab.device.clone();
    let button = grab.native_button;
    let time = grab.last_timestamp;
    scheduler.defer(Box::new(move || {
        let Some(device) = device.upgrade() else {
            return;
        };
        replay.process_button(button, ButtonState::Pressed, time, &device);
        replay.process_button(button, ButtonState::Released, time, &device);
        // The grab entry stays in the table until the emulated release
        // round-trips, so the replayed pair cannot start a new grab.
    }));
}

impl InputEventFilter for StrokeInputFilter {
    fn pointer_motion(&mut self, event: &PointerMotionEvent) -> bool {
        self.on_pointer_motion(event)
    }

    fn pointer_button(&mut self, event: &PointerButtonEvent) -> bool {
        match event.state {
            ButtonState::Pressed => self.pointer_button_pressed(event),
            ButtonState::Released => self.pointer_button_released(event),
        }
    }

    fn device_removed(&mut self, device: &Rc<InputDevice>) {
        let device_id = device.id();
        if self.active_grab_device == Some(device_id) {
            self.stop_buttonless_timer();
            self.active_grab_device = None;
            debug!("input device removed, aborting stroke recognition");

            let time = self
                .button_grabs
                .get(&device_id)
                .map(|grab| grab.last_timestamp)
                .unwrap_or_default();
            if let Some(effects) = self.effects.upgrade() {
                effects
                    .borrow_mut()
                    .stroke_gesture_cancelled(&StrokeGestureCancelEvent { time });
            }
        }
        self.button_grabs.shift_remove(&device_id);
    }
}
