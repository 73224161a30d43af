use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use calloop::EventLoop;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

use inkline::config::{Config, StrokeDeviceSettings, StrokeTemplate};
use inkline::device::{DeviceCapabilities, InputDevice};
use inkline::effects::{
    EffectsHandler, StrokeGestureBeginEvent, StrokeGestureCancelEvent, StrokeGestureEndEvent,
    StrokeGestureUpdateEvent,
};
use inkline::input::{InputFilterOrder, InputHandle, InputRedirection};
use inkline::scheduler::CalloopScheduler;
use inkline::stroke::StrokeInputFilter;
use inkline::xkb::Xkb;
use inkline::{ButtonState, Point, BTN_MIDDLE};

const DEMO_DEVICE: &str = "demo mouse";

/// Logs stroke notifications instead of drawing a live trace.
struct LoggingEffects;

impl EffectsHandler for LoggingEffects {
    fn stroke_gesture_begin(&mut self, event: &StrokeGestureBeginEvent) {
        info!(origin = ?event.origin, "stroke began");
    }

    fn stroke_gesture_update(&mut self, event: &StrokeGestureUpdateEvent) {
        info!(
            latest = ?event.latest_pos,
            new_segment = event.starting_new_segment,
            "stroke update"
        );
    }

    fn stroke_gesture_end(&mut self, event: &StrokeGestureEndEvent) {
        info!(
            action = %event.triggered_action.name,
            score = event.score,
            "stroke matched"
        );
    }

    fn stroke_gesture_cancelled(&mut self, _event: &StrokeGestureCancelEvent) {
        info!("stroke cancelled");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging();

    let mut config = Config::load(Path::new("inkline.toml"))?;
    if config.stroke.gestures.is_empty() {
        config.stroke.gestures.push(StrokeTemplate {
            name: "demo-east".into(),
            label: "Eastward swipe".into(),
            modifiers: vec![],
            points: vec![(0.0, 0.0), (200.0, 0.0)],
        });
    }
    config
        .stroke
        .devices
        .entry(DEMO_DEVICE.into())
        .or_insert(StrokeDeviceSettings {
            activation_button: BTN_MIDDLE,
        });

    let mut event_loop: EventLoop<'static, ()> = EventLoop::try_new()?;
    let scheduler = Rc::new(CalloopScheduler::new(event_loop.handle()));

    let xkb = Xkb::new(&config.keyboard.keymap, config.keyboard.numlock_on_startup)?;
    let input = InputRedirection::new_shared(xkb);
    input.borrow_mut().set_device_defaults(config.device.clone());

    let gestures = Rc::new(RefCell::new(config.stroke.build_gestures()));
    let effects: Rc<RefCell<dyn EffectsHandler>> = Rc::new(RefCell::new(LoggingEffects));
    let replay = Rc::new(InputHandle::new(&input));
    let stroke_filter = StrokeInputFilter::new(
        &config.stroke,
        gestures,
        Rc::downgrade(&effects),
        scheduler.clone(),
        replay,
    );
    input
        .borrow_mut()
        .install_filter(InputFilterOrder::Stroke, stroke_filter.clone());

    let device = input.borrow_mut().add_device(InputDevice::new(
        DEMO_DEVICE,
        "event0",
        DeviceCapabilities::POINTER,
    ));

    // Draw an eastward stroke with the activation button held.
    {
        let mut input = input.borrow_mut();
        input.process_pointer_button(
            device.id(),
            BTN_MIDDLE,
            ButtonState::Pressed,
            Duration::from_millis(0),
        );
        for step in 1..=10u64 {
            input.process_pointer_motion(
                device.id(),
                Point::new(20.0, 0.0),
                Duration::from_millis(step * 10),
            );
        }
        input.process_pointer_button(
            device.id(),
            BTN_MIDDLE,
            ButtonState::Released,
            Duration::from_millis(120),
        );
    }

    // And a short tap, which gets replayed as a plain click on the next loop
    // iteration.
    {
        let mut input = input.borrow_mut();
        input.process_pointer_button(
            device.id(),
            BTN_MIDDLE,
            ButtonState::Pressed,
            Duration::from_millis(200),
        );
        input.process_pointer_button(
            device.id(),
            BTN_MIDDLE,
            ButtonState::Released,
            Duration::from_millis(210),
        );
    }

    event_loop.dispatch(Some(Duration::from_millis(50)), &mut ())?;
    info!("demo finished");
    Ok(())
}

fn logging() {
    if std::env::var("INKLINE_LOG").is_err() {
        std::env::set_var("INKLINE_LOG", "none,inkline=debug");
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_env_var("INKLINE_LOG")
                .with_default_directive(LevelFilter::ERROR.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::Layer::default())
        .init();
}
