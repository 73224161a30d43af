pub mod config;
pub mod device;
pub mod effects;
pub mod event;
pub mod geometry;
pub mod input;
pub mod keyboard;
pub mod pointer;
pub mod scheduler;
pub mod stroke;
pub mod tablet;
pub mod touch;
pub mod xkb;

pub use config::Config;
pub use device::{DeviceCapabilities, DeviceId, InputDevice};
pub use effects::EffectsHandler;
pub use event::{ButtonState, KeyState, Leds, Modifiers, MouseButtons};
pub use geometry::Point;
pub use input::{BackendEvent, InputEventFilter, InputEventSpy, InputFilterOrder, InputHandle, InputRedirection};
pub use scheduler::{CalloopScheduler, ManualScheduler, Scheduler};
pub use stroke::gestures::{StrokeActionInfo, StrokeGesture, StrokeGestures};
pub use stroke::StrokeInputFilter;
pub use xkb::Xkb;

// Linux evdev pointer button codes.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;
pub const BTN_SIDE: u32 = 0x113;
pub const BTN_EXTRA: u32 = 0x114;
pub const BTN_FORWARD: u32 = 0x115;
pub const BTN_BACK: u32 = 0x116;
pub const BTN_TASK: u32 = 0x117;
