//! End-to-end scenarios for the stroke recognition pipeline: backend events
//! in, spy/filter dispatch, grab promotion, simplification, matching and
//! click replay.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use inkline::config::{StrokeDeviceSettings, StrokeSettings, StrokeTemplate};
use inkline::device::{DeviceCapabilities, InputDevice};
use inkline::effects::{
    EffectsHandler, StrokeGestureBeginEvent, StrokeGestureCancelEvent, StrokeGestureEndEvent,
    StrokeGestureUpdateEvent,
};
use inkline::input::{
    InputEventFilter, InputEventSpy, InputFilterOrder, InputHandle, InputRedirection,
};
use inkline::scheduler::ManualScheduler;
use inkline::stroke::StrokeInputFilter;
use inkline::xkb::{Xkb, FALLBACK_KEYMAP};
use inkline::{ButtonState, Point, StrokeGestures, BTN_LEFT, BTN_RIGHT};

#[derive(Default)]
struct RecordingEffects {
    begins: Vec<StrokeGestureBeginEvent>,
    updates: Vec<StrokeGestureUpdateEvent>,
    ends: Vec<StrokeGestureEndEvent>,
    cancels: Vec<StrokeGestureCancelEvent>,
}

impl EffectsHandler for RecordingEffects {
    fn stroke_gesture_begin(&mut self, event: &StrokeGestureBeginEvent) {
        self.begins.push(event.clone());
    }
    fn stroke_gesture_update(&mut self, event: &StrokeGestureUpdateEvent) {
        self.updates.push(event.clone());
    }
    fn stroke_gesture_end(&mut self, event: &StrokeGestureEndEvent) {
        self.ends.push(event.clone());
    }
    fn stroke_gesture_cancelled(&mut self, event: &StrokeGestureCancelEvent) {
        self.cancels.push(event.clone());
    }
}

/// Stands in for default delivery: records the button events no filter
/// consumed.
#[derive(Default)]
struct ForwardRecorder {
    buttons: Vec<(u32, ButtonState)>,
}

impl InputEventFilter for ForwardRecorder {
    fn pointer_button(&mut self, event: &inkline::event::PointerButtonEvent) -> bool {
        self.buttons.push((event.native_button, event.state));
        false
    }
}

/// Passive observer counting every pointer button event, consumed or not.
#[derive(Default)]
struct ButtonSpy {
    count: usize,
}

impl InputEventSpy for ButtonSpy {
    fn pointer_button(&mut self, _event: &inkline::event::PointerButtonEvent) {
        self.count += 1;
    }
}

struct Pipeline {
    input: Rc<RefCell<InputRedirection>>,
    scheduler: Rc<ManualScheduler>,
    effects: Rc<RefCell<RecordingEffects>>,
    forward: Rc<RefCell<ForwardRecorder>>,
    spy: Rc<RefCell<ButtonSpy>>,
    // Installed filters are held weakly by the chain; the harness keeps them
    // alive.
    _stroke_filter: Rc<RefCell<StrokeInputFilter>>,
}

fn east_template() -> StrokeTemplate {
    StrokeTemplate {
        name: "east".into(),
        label: "Swipe east".into(),
        modifiers: vec![],
        points: vec![(0.0, 0.0), (200.0, 0.0)],
    }
}

fn settings(device_names: &[&str]) -> StrokeSettings {
    let mut settings = StrokeSettings::default();
    for name in device_names {
        settings.devices.insert(
            (*name).into(),
            StrokeDeviceSettings {
                activation_button: BTN_LEFT,
            },
        );
    }
    settings.gestures.push(east_template());
    settings
}

fn pipeline(settings: &StrokeSettings) -> Pipeline {
    let xkb = Xkb::from_keymap_string(FALLBACK_KEYMAP).expect("fallback keymap compiles");
    let input = InputRedirection::new_shared(xkb);
    let scheduler = Rc::new(ManualScheduler::new());

    let effects: Rc<RefCell<RecordingEffects>> = Rc::new(RefCell::new(RecordingEffects::default()));
    let effects_dyn: Rc<RefCell<dyn EffectsHandler>> = effects.clone();

    let gestures: Rc<RefCell<StrokeGestures>> = Rc::new(RefCell::new(settings.build_gestures()));
    let stroke_filter = StrokeInputFilter::new(
        settings,
        gestures,
        Rc::downgrade(&effects_dyn),
        scheduler.clone(),
        Rc::new(InputHandle::new(&input)),
    );

    let forward = Rc::new(RefCell::new(ForwardRecorder::default()));
    let spy = Rc::new(RefCell::new(ButtonSpy::default()));

    {
        let mut input = input.borrow_mut();
        input.install_spy(spy.clone());
        input.install_filter(InputFilterOrder::Stroke, stroke_filter.clone());
        input.install_filter(InputFilterOrder::Forward, forward.clone());
    }

    Pipeline {
        input,
        scheduler,
        effects,
        forward,
        spy,
        _stroke_filter: stroke_filter,
    }
}

impl Pipeline {
    fn add_mouse(&self, name: &str) -> Rc<InputDevice> {
        self.input
            .borrow_mut()
            .add_device(InputDevice::new(name, "event11", DeviceCapabilities::POINTER))
    }

    fn press(&self, device: &Rc<InputDevice>, button: u32, ms: u64) -> bool {
        self.input.borrow_mut().process_pointer_button(
            device.id(),
            button,
            ButtonState::Pressed,
            Duration::from_millis(ms),
        )
    }

    fn release(&self, device: &Rc<InputDevice>, button: u32, ms: u64) -> bool {
        self.input.borrow_mut().process_pointer_button(
            device.id(),
            button,
            ButtonState::Released,
            Duration::from_millis(ms),
        )
    }

    fn move_to(&self, device: &Rc<InputDevice>, position: Point, ms: u64) -> bool {
        self.input.borrow_mut().process_pointer_motion_absolute(
            device.id(),
            position,
            Duration::from_millis(ms),
        )
    }
}

// Scenario A: a straight horizontal drag with the activation button held
// fires begin once, updates for the following samples, and ends with the
// horizontal template triggered.
#[test]
fn straight_stroke_triggers_the_horizontal_template() {
    let p = pipeline(&settings(&["mouse"]));
    let mouse = p.add_mouse("mouse");

    p.move_to(&mouse, Point::ZERO, 0);
    assert!(p.press(&mouse, BTN_LEFT, 1));

    for step in 1..=10u64 {
        p.move_to(&mouse, Point::new(step as f64 * 20.0, 0.0), 1 + step);
    }
    assert!(p.release(&mouse, BTN_LEFT, 20));

    let effects = p.effects.borrow();
    assert_eq!(effects.begins.len(), 1);
    assert_eq!(effects.begins[0].origin, Point::ZERO);
    // Steps after the one that exceeded the activation distance.
    assert_eq!(effects.updates.len(), 9);
    assert_eq!(effects.ends.len(), 1);
    assert_eq!(effects.ends[0].triggered_action.name, "east");
    assert!(effects.cancels.is_empty());

    // Recognized strokes swallow the click entirely, nothing is replayed.
    p.scheduler.dispatch_pending();
    assert!(p.forward.borrow().buttons.is_empty());
}

// Scenario B: a tap within the activation distance produces no stroke
// notifications and is replayed as an ordinary click one loop turn later.
#[test]
fn short_tap_replays_as_a_plain_click() {
    let p = pipeline(&settings(&["mouse"]));
    let mouse = p.add_mouse("mouse");

    p.move_to(&mouse, Point::ZERO, 0);
    assert!(p.press(&mouse, BTN_LEFT, 1));
    p.move_to(&mouse, Point::new(3.0, 4.0), 2);
    assert!(p.release(&mouse, BTN_LEFT, 3));

    {
        let effects = p.effects.borrow();
        assert!(effects.begins.is_empty());
        assert!(effects.ends.is_empty());
        assert!(effects.cancels.is_empty());
    }
    // Nothing reached default delivery yet.
    assert!(p.forward.borrow().buttons.is_empty());

    p.scheduler.dispatch_pending();
    assert_eq!(
        p.forward.borrow().buttons,
        vec![(BTN_LEFT, ButtonState::Pressed), (BTN_LEFT, ButtonState::Released)]
    );

    // The spy saw the original pair and the replayed pair.
    assert_eq!(p.spy.borrow().count, 4);
}

// Scenario C: while one device is actively recognizing, another device's
// activation press is not grabbed and falls through.
#[test]
fn only_one_device_recognizes_at_a_time() {
    let p = pipeline(&settings(&["mouse-a", "mouse-b"]));
    let a = p.add_mouse("mouse-a");
    let b = p.add_mouse("mouse-b");

    p.move_to(&a, Point::ZERO, 0);
    assert!(p.press(&a, BTN_LEFT, 1));
    p.move_to(&a, Point::new(40.0, 0.0), 2);
    assert_eq!(p.effects.borrow().begins.len(), 1);

    // B's press must fall through to default delivery.
    assert!(!p.press(&b, BTN_LEFT, 3));
    assert_eq!(p.forward.borrow().buttons, vec![(BTN_LEFT, ButtonState::Pressed)]);
}

// Two devices may be grabbed at once, but promotion to active releases every
// other grab and replays its buffered click.
#[test]
fn promotion_releases_the_other_devices_grab() {
    let p = pipeline(&settings(&["mouse-a", "mouse-b"]));
    let a = p.add_mouse("mouse-a");
    let b = p.add_mouse("mouse-b");

    p.move_to(&a, Point::ZERO, 0);
    assert!(p.press(&a, BTN_LEFT, 1));
    assert!(p.press(&b, BTN_LEFT, 2));

    // A exceeds the activation distance and becomes the active grab device.
    p.move_to(&a, Point::new(40.0, 0.0), 3);
    assert_eq!(p.effects.borrow().begins.len(), 1);

    // B's buffered click is replayed on the next loop iteration.
    p.scheduler.dispatch_pending();
    assert_eq!(
        p.forward.borrow().buttons,
        vec![(BTN_LEFT, ButtonState::Pressed), (BTN_LEFT, ButtonState::Released)]
    );
}

// Scenario D: a second button on the actively gesturing device cancels the
// stroke immediately, with no further updates.
#[test]
fn second_button_cancels_an_active_stroke() {
    let p = pipeline(&settings(&["mouse"]));
    let mouse = p.add_mouse("mouse");

    p.move_to(&mouse, Point::ZERO, 0);
    p.press(&mouse, BTN_LEFT, 1);
    p.move_to(&mouse, Point::new(40.0, 0.0), 2);
    p.move_to(&mouse, Point::new(60.0, 0.0), 3);
    let updates_before = p.effects.borrow().updates.len();

    p.press(&mouse, BTN_RIGHT, 4);
    {
        let effects = p.effects.borrow();
        assert_eq!(effects.cancels.len(), 1);
        assert!(effects.ends.is_empty());
    }

    // The grab is purged: further motion produces no updates.
    p.move_to(&mouse, Point::new(80.0, 0.0), 5);
    assert_eq!(p.effects.borrow().updates.len(), updates_before);
}

#[test]
fn device_removal_mid_stroke_cancels() {
    let p = pipeline(&settings(&["mouse"]));
    let mouse = p.add_mouse("mouse");

    p.move_to(&mouse, Point::ZERO, 0);
    p.press(&mouse, BTN_LEFT, 1);
    p.move_to(&mouse, Point::new(40.0, 0.0), 2);
    assert_eq!(p.effects.borrow().begins.len(), 1);

    p.input.borrow_mut().remove_device(mouse.id());
    let effects = p.effects.borrow();
    assert_eq!(effects.cancels.len(), 1);
    assert!(effects.ends.is_empty());
}

#[test]
fn buttonless_stroke_ends_after_the_quiet_timeout() {
    let mut s = settings(&["mouse"]);
    s.start_buttonless_timeout_ms = 300;
    let p = pipeline(&s);
    let mouse = p.add_mouse("mouse");

    // Click, release within the activation distance, then draw.
    p.move_to(&mouse, Point::ZERO, 0);
    assert!(p.press(&mouse, BTN_LEFT, 1));
    p.move_to(&mouse, Point::new(5.0, 0.0), 2);
    assert!(p.release(&mouse, BTN_LEFT, 3));
    assert!(p.effects.borrow().begins.is_empty());

    // Motion before the timeout resumes tracking from the buffered points.
    p.scheduler.advance(Duration::from_millis(100));
    p.move_to(&mouse, Point::new(50.0, 0.0), 103);
    assert_eq!(p.effects.borrow().begins.len(), 1);
    p.scheduler.advance(Duration::from_millis(200));
    p.move_to(&mouse, Point::new(120.0, 0.0), 303);
    p.move_to(&mouse, Point::new(200.0, 0.0), 304);
    assert!(p.effects.borrow().ends.is_empty());

    // Quiet period: the end timeout (defaulting to the start timeout) fires
    // and the stroke matches.
    p.scheduler.advance(Duration::from_millis(400));
    let effects = p.effects.borrow();
    assert_eq!(effects.ends.len(), 1);
    assert_eq!(effects.ends[0].triggered_action.name, "east");
}

#[test]
fn tap_with_buttonless_timeout_and_no_motion_replays_the_click() {
    let mut s = settings(&["mouse"]);
    s.start_buttonless_timeout_ms = 300;
    let p = pipeline(&s);
    let mouse = p.add_mouse("mouse");

    p.move_to(&mouse, Point::ZERO, 0);
    p.press(&mouse, BTN_LEFT, 1);
    p.release(&mouse, BTN_LEFT, 2);

    p.scheduler.advance(Duration::from_millis(400));
    p.scheduler.dispatch_pending();
    assert_eq!(
        p.forward.borrow().buttons,
        vec![(BTN_LEFT, ButtonState::Pressed), (BTN_LEFT, ButtonState::Released)]
    );
    let effects = p.effects.borrow();
    assert!(effects.begins.is_empty());
    assert!(effects.cancels.is_empty());
}

#[test]
fn unmatched_stroke_is_reported_as_cancelled() {
    let p = pipeline(&settings(&["mouse"]));
    let mouse = p.add_mouse("mouse");

    // Draw westwards; the only template points east.
    p.move_to(&mouse, Point::new(200.0, 0.0), 0);
    p.press(&mouse, BTN_LEFT, 1);
    for step in 1..=10u64 {
        p.move_to(&mouse, Point::new(200.0 - step as f64 * 20.0, 0.0), 1 + step);
    }
    p.release(&mouse, BTN_LEFT, 20);

    let effects = p.effects.borrow();
    assert_eq!(effects.begins.len(), 1);
    assert!(effects.ends.is_empty());
    assert_eq!(effects.cancels.len(), 1);
}

#[test]
fn jittered_stroke_still_matches() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let p = pipeline(&settings(&["mouse"]));
    let mouse = p.add_mouse("mouse");
    let mut rng = StdRng::seed_from_u64(7);

    p.move_to(&mouse, Point::ZERO, 0);
    p.press(&mouse, BTN_LEFT, 1);
    for step in 1..=50u64 {
        let jitter: f64 = rng.gen_range(-2.0..2.0);
        p.move_to(&mouse, Point::new(step as f64 * 8.0, jitter), 1 + step);
    }
    p.release(&mouse, BTN_LEFT, 60);

    let effects = p.effects.borrow();
    assert_eq!(effects.ends.len(), 1);
    assert_eq!(effects.ends[0].triggered_action.name, "east");
}

#[test]
fn spies_observe_consumed_and_replayed_events() {
    let p = pipeline(&settings(&["mouse"]));
    let mouse = p.add_mouse("mouse");

    p.move_to(&mouse, Point::ZERO, 0);
    p.press(&mouse, BTN_LEFT, 1);
    for step in 1..=5u64 {
        p.move_to(&mouse, Point::new(step as f64 * 30.0, 0.0), 1 + step);
    }
    p.release(&mouse, BTN_LEFT, 10);
    p.scheduler.dispatch_pending();

    // Both consumed events reached the spy; nothing reached default
    // delivery and nothing was replayed.
    assert_eq!(p.spy.borrow().count, 2);
    assert!(p.forward.borrow().buttons.is_empty());
}
