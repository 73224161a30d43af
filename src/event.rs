use std::rc::Rc;
use std::time::Duration;

use xkbcommon::xkb::Keysym;

use crate::device::InputDevice;
use crate::geometry::Point;

/// Opaque handle to a window/surface, owned by the embedding window
/// management layer.
pub type SurfaceId = u64;

bitflags::bitflags! {
    /// Keyboard modifiers in their logical (layout independent) form.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const LOGO  = 0b1000;
    }
}

bitflags::bitflags! {
    /// Keyboard LEDs derived from locked modifiers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Leds: u32 {
        const NUM_LOCK    = 0b001;
        const CAPS_LOCK   = 0b010;
        const SCROLL_LOCK = 0b100;
    }
}

bitflags::bitflags! {
    /// Logical pointer buttons currently held down.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct MouseButtons: u32 {
        const LEFT    = 0b000001;
        const RIGHT   = 0b000010;
        const MIDDLE  = 0b000100;
        const SIDE    = 0b001000;
        const EXTRA   = 0b010000;
        const FORWARD = 0b100000;
        const BACK    = 0b1000000;
        const TASK    = 0b10000000;
    }
}

impl MouseButtons {
    /// Maps a Linux evdev button code to its logical button, if any.
    pub fn from_native(code: u32) -> MouseButtons {
        match code {
            crate::BTN_LEFT => MouseButtons::LEFT,
            crate::BTN_RIGHT => MouseButtons::RIGHT,
            crate::BTN_MIDDLE => MouseButtons::MIDDLE,
            crate::BTN_SIDE => MouseButtons::SIDE,
            crate::BTN_EXTRA => MouseButtons::EXTRA,
            crate::BTN_FORWARD => MouseButtons::FORWARD,
            crate::BTN_BACK => MouseButtons::BACK,
            crate::BTN_TASK => MouseButtons::TASK,
            _ => MouseButtons::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
    /// Auto-repeat of a held key. A distinct state, not a second press.
    Repeated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    Pressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSource {
    Wheel,
    Finger,
    Continuous,
    WheelTilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityState {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipState {
    Up,
    Down,
}

#[derive(Debug)]
pub struct PointerMotionEvent {
    pub device: Rc<InputDevice>,
    /// New global pointer position after applying this motion.
    pub position: Point,
    pub delta: Point,
    pub modifiers: Modifiers,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct PointerButtonEvent {
    pub device: Rc<InputDevice>,
    pub button: MouseButtons,
    /// The raw evdev button code (BTN_LEFT etc).
    pub native_button: u32,
    pub state: ButtonState,
    /// All logical buttons held down, including the one in this event.
    pub buttons: MouseButtons,
    pub position: Point,
    pub modifiers: Modifiers,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct PointerAxisEvent {
    pub device: Rc<InputDevice>,
    pub axis: Axis,
    pub delta: f64,
    pub delta_discrete: Option<i32>,
    pub source: AxisSource,
    pub modifiers: Modifiers,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct KeyboardKeyEvent {
    pub device: Rc<InputDevice>,
    /// Raw evdev keycode, without the xkb offset.
    pub key: u32,
    pub state: KeyState,
    pub keysym: Keysym,
    /// UTF-8 text produced by this key press, empty when none.
    pub text: String,
    pub modifiers: Modifiers,
    /// Modifiers with those consumed by the key translation filtered out.
    pub modifiers_for_shortcuts: Modifiers,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TouchDownEvent {
    pub device: Rc<InputDevice>,
    pub id: i32,
    pub position: Point,
    pub modifiers: Modifiers,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TouchMotionEvent {
    pub device: Rc<InputDevice>,
    pub id: i32,
    pub position: Point,
    pub modifiers: Modifiers,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TouchUpEvent {
    pub device: Rc<InputDevice>,
    pub id: i32,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct SwipeGestureBeginEvent {
    pub device: Rc<InputDevice>,
    pub fingers: u32,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct SwipeGestureUpdateEvent {
    pub device: Rc<InputDevice>,
    pub delta: Point,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct SwipeGestureEndEvent {
    pub device: Rc<InputDevice>,
    pub cancelled: bool,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct PinchGestureBeginEvent {
    pub device: Rc<InputDevice>,
    pub fingers: u32,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct PinchGestureUpdateEvent {
    pub device: Rc<InputDevice>,
    pub delta: Point,
    pub scale: f64,
    pub rotation: f64,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct PinchGestureEndEvent {
    pub device: Rc<InputDevice>,
    pub cancelled: bool,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct HoldGestureBeginEvent {
    pub device: Rc<InputDevice>,
    pub fingers: u32,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct HoldGestureEndEvent {
    pub device: Rc<InputDevice>,
    pub cancelled: bool,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct SwitchEvent {
    pub device: Rc<InputDevice>,
    pub state: SwitchState,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TabletToolProximityEvent {
    pub device: Rc<InputDevice>,
    pub tool: u32,
    pub position: Point,
    pub state: ProximityState,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TabletToolAxisEvent {
    pub device: Rc<InputDevice>,
    pub tool: u32,
    pub position: Point,
    pub pressure: f64,
    pub tilt: Point,
    pub rotation: f64,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TabletToolTipEvent {
    pub device: Rc<InputDevice>,
    pub tool: u32,
    pub position: Point,
    pub state: TipState,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TabletToolButtonEvent {
    pub device: Rc<InputDevice>,
    pub tool: u32,
    pub button: u32,
    pub pressed: bool,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TabletPadButtonEvent {
    pub device: Rc<InputDevice>,
    pub button: u32,
    pub pressed: bool,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TabletPadStripEvent {
    pub device: Rc<InputDevice>,
    pub number: u32,
    pub position: f64,
    pub is_finger: bool,
    pub timestamp: Duration,
}

#[derive(Debug)]
pub struct TabletPadRingEvent {
    pub device: Rc<InputDevice>,
    pub number: u32,
    pub position: f64,
    pub is_finger: bool,
    pub timestamp: Duration,
}
