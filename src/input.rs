use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use crate::device::{DeviceId, InputDevice};
use crate::event::{
    Axis, AxisSource, ButtonState, HoldGestureBeginEvent, HoldGestureEndEvent, KeyState,
    KeyboardKeyEvent, MouseButtons, PinchGestureBeginEvent, PinchGestureEndEvent,
    PinchGestureUpdateEvent, PointerAxisEvent, PointerButtonEvent, PointerMotionEvent,
    ProximityState, SwipeGestureBeginEvent, SwipeGestureEndEvent, SwipeGestureUpdateEvent,
    SurfaceId, SwitchEvent, SwitchState, TabletPadButtonEvent, TabletPadRingEvent,
    TabletPadStripEvent, TabletToolAxisEvent, TabletToolButtonEvent, TabletToolProximityEvent,
    TabletToolTipEvent, TipState, TouchDownEvent, TouchMotionEvent, TouchUpEvent,
};
use crate::geometry::Point;
use crate::keyboard::KeyboardRedirection;
use crate::pointer::{PointerButtonSink, PointerRedirection};
use crate::tablet::TabletRedirection;
use crate::touch::TouchRedirection;
use crate::xkb::Xkb;

/// Position of a filter in the input chain; lower values see events first.
/// This ordering is what lets e.g. a lock-screen filter take exclusive
/// control without knowing about the filters below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum InputFilterOrder {
    VirtualTerminal,
    LockScreen,
    ScreenEdge,
    GlobalShortcut,
    Stroke,
    Effects,
    Popup,
    Decoration,
    WindowAction,
    Forward,
}

/// Active handler of input events. A hook returning true consumes the event:
/// no later filter and no default delivery sees it.
///
/// Every hook has a no-op body so concrete filters only implement what they
/// care about.
#[allow(unused_variables)]
pub trait InputEventFilter {
    fn pointer_motion(&mut self, event: &PointerMotionEvent) -> bool {
        false
    }
    fn pointer_button(&mut self, event: &PointerButtonEvent) -> bool {
        false
    }
    fn pointer_frame(&mut self) -> bool {
        false
    }
    fn pointer_axis(&mut self, event: &PointerAxisEvent) -> bool {
        false
    }
    fn keyboard_key(&mut self, event: &KeyboardKeyEvent) -> bool {
        false
    }
    fn touch_down(&mut self, event: &TouchDownEvent) -> bool {
        false
    }
    fn touch_motion(&mut self, event: &TouchMotionEvent) -> bool {
        false
    }
    fn touch_up(&mut self, event: &TouchUpEvent) -> bool {
        false
    }
    fn touch_cancel(&mut self) -> bool {
        false
    }
    fn touch_frame(&mut self) -> bool {
        false
    }
    fn swipe_gesture_begin(&mut self, event: &SwipeGestureBeginEvent) -> bool {
        false
    }
    fn swipe_gesture_update(&mut self, event: &SwipeGestureUpdateEvent) -> bool {
        false
    }
    fn swipe_gesture_end(&mut self, event: &SwipeGestureEndEvent) -> bool {
        false
    }
    fn pinch_gesture_begin(&mut self, event: &PinchGestureBeginEvent) -> bool {
        false
    }
    fn pinch_gesture_update(&mut self, event: &PinchGestureUpdateEvent) -> bool {
        false
    }
    fn pinch_gesture_end(&mut self, event: &PinchGestureEndEvent) -> bool {
        false
    }
    fn hold_gesture_begin(&mut self, event: &HoldGestureBeginEvent) -> bool {
        false
    }
    fn hold_gesture_end(&mut self, event: &HoldGestureEndEvent) -> bool {
        false
    }
    fn switch_event(&mut self, event: &SwitchEvent) -> bool {
        false
    }
    fn tablet_tool_proximity(&mut self, event: &TabletToolProximityEvent) -> bool {
        false
    }
    fn tablet_tool_axis(&mut self, event: &TabletToolAxisEvent) -> bool {
        false
    }
    fn tablet_tool_tip(&mut self, event: &TabletToolTipEvent) -> bool {
        false
    }
    fn tablet_tool_button(&mut self, event: &TabletToolButtonEvent) -> bool {
        false
    }
    fn tablet_pad_button(&mut self, event: &TabletPadButtonEvent) -> bool {
        false
    }
    fn tablet_pad_strip(&mut self, event: &TabletPadStripEvent) -> bool {
        false
    }
    fn tablet_pad_ring(&mut self, event: &TabletPadRingEvent) -> bool {
        false
    }
    fn device_added(&mut self, device: &Rc<InputDevice>) {}
    fn device_removed(&mut self, device: &Rc<InputDevice>) {}
}

/// Passive observer of input events. Spies see every event before the filter
/// chain runs and cannot affect dispatch.
#[allow(unused_variables)]
pub trait InputEventSpy {
    fn pointer_motion(&mut self, event: &PointerMotionEvent) {}
    fn pointer_button(&mut self, event: &PointerButtonEvent) {}
    fn pointer_frame(&mut self) {}
    fn pointer_axis(&mut self, event: &PointerAxisEvent) {}
    fn keyboard_key(&mut self, event: &KeyboardKeyEvent) {}
    fn touch_down(&mut self, event: &TouchDownEvent) {}
    fn touch_motion(&mut self, event: &TouchMotionEvent) {}
    fn touch_up(&mut self, event: &TouchUpEvent) {}
    fn touch_cancel(&mut self) {}
    fn touch_frame(&mut self) {}
    fn swipe_gesture_begin(&mut self, event: &SwipeGestureBeginEvent) {}
    fn swipe_gesture_update(&mut self, event: &SwipeGestureUpdateEvent) {}
    fn swipe_gesture_end(&mut self, event: &SwipeGestureEndEvent) {}
    fn pinch_gesture_begin(&mut self, event: &PinchGestureBeginEvent) {}
    fn pinch_gesture_update(&mut self, event: &PinchGestureUpdateEvent) {}
    fn pinch_gesture_end(&mut self, event: &PinchGestureEndEvent) {}
    fn hold_gesture_begin(&mut self, event: &HoldGestureBeginEvent) {}
    fn hold_gesture_end(&mut self, event: &HoldGestureEndEvent) {}
    fn switch_event(&mut self, event: &SwitchEvent) {}
    fn tablet_tool_proximity(&mut self, event: &TabletToolProximityEvent) {}
    fn tablet_tool_axis(&mut self, event: &TabletToolAxisEvent) {}
    fn tablet_tool_tip(&mut self, event: &TabletToolTipEvent) {}
    fn tablet_tool_button(&mut self, event: &TabletToolButtonEvent) {}
    fn tablet_pad_button(&mut self, event: &TabletPadButtonEvent) {}
    fn tablet_pad_strip(&mut self, event: &TabletPadStripEvent) {}
    fn tablet_pad_ring(&mut self, event: &TabletPadRingEvent) {}
    fn device_added(&mut self, device: &Rc<InputDevice>) {}
    fn device_removed(&mut self, device: &Rc<InputDevice>) {}
}

struct FilterEntry {
    order: InputFilterOrder,
    seq: u64,
    filter: Weak<RefCell<dyn InputEventFilter>>,
}

/// Raw backend events as supplied by a libinput-style source, tagged with
/// device identity and a monotonic timestamp.
#[derive(Debug)]
pub enum BackendEvent {
    DeviceAdded { device: InputDevice },
    DeviceRemoved { device_id: DeviceId },
    KeyboardKey { device_id: DeviceId, key: u32, state: KeyState, time: Duration },
    PointerMotion { device_id: DeviceId, delta: Point, time: Duration },
    PointerMotionAbsolute { device_id: DeviceId, position: Point, time: Duration },
    PointerButton { device_id: DeviceId, button: u32, state: ButtonState, time: Duration },
    PointerAxis {
        device_id: DeviceId,
        axis: Axis,
        delta: f64,
        delta_discrete: Option<i32>,
        source: AxisSource,
        time: Duration,
    },
    PointerFrame,
    TouchDown { device_id: DeviceId, id: i32, position: Point, time: Duration },
    TouchMotion { device_id: DeviceId, id: i32, position: Point, time: Duration },
    TouchUp { device_id: DeviceId, id: i32, time: Duration },
    TouchCancel { device_id: DeviceId },
    TouchFrame { device_id: DeviceId },
    SwipeBegin { device_id: DeviceId, fingers: u32, time: Duration },
    SwipeUpdate { device_id: DeviceId, delta: Point, time: Duration },
    SwipeEnd { device_id: DeviceId, cancelled: bool, time: Duration },
    PinchBegin { device_id: DeviceId, fingers: u32, time: Duration },
    PinchUpdate {
        device_id: DeviceId,
        delta: Point,
        scale: f64,
        rotation: f64,
        time: Duration,
    },
    PinchEnd { device_id: DeviceId, cancelled: bool, time: Duration },
    HoldBegin { device_id: DeviceId, fingers: u32, time: Duration },
    HoldEnd { device_id: DeviceId, cancelled: bool, time: Duration },
    SwitchToggle { device_id: DeviceId, state: SwitchState, time: Duration },
    TabletToolProximity {
        device_id: DeviceId,
        tool: u32,
        position: Point,
        state: ProximityState,
        time: Duration,
    },
    TabletToolAxis {
        device_id: DeviceId,
        tool: u32,
        position: Point,
        pressure: f64,
        tilt: Point,
        rotation: f64,
        time: Duration,
    },
    TabletToolTip {
        device_id: DeviceId,
        tool: u32,
        position: Point,
        state: TipState,
        time: Duration,
    },
    TabletToolButton {
        device_id: DeviceId,
        tool: u32,
        button: u32,
        pressed: bool,
        time: Duration,
    },
    TabletPadButton { device_id: DeviceId, button: u32, pressed: bool, time: Duration },
    TabletPadStrip {
        device_id: DeviceId,
        number: u32,
        position: f64,
        is_finger: bool,
        time: Duration,
    },
    TabletPadRing {
        device_id: DeviceId,
        number: u32,
        position: f64,
        is_finger: bool,
        time: Duration,
    },
}

/// Routes raw backend events into the spy and filter chains and keeps the
/// per-capability redirection state.
///
/// Dispatch order for every event: build the typed event struct, notify every
/// spy in registration order, then walk the filters in priority order until
/// one consumes the event. The return value of the `process_*` methods tells
/// the embedder whether default delivery (forwarding to the focused surface)
/// should still happen.
pub struct InputRedirection {
    devices: Vec<Rc<InputDevice>>,
    filters: Vec<FilterEntry>,
    spies: Vec<Weak<RefCell<dyn InputEventSpy>>>,
    next_filter_seq: u64,

    keyboard: KeyboardRedirection,
    pointer: PointerRedirection,
    touch: TouchRedirection,
    tablet: TabletRedirection,

    device_defaults: crate::device::DeviceConfig,
    surface_resolver: Option<Box<dyn Fn(Point) -> Option<SurfaceId>>>,
}

impl InputRedirection {
    pub fn new(xkb: Xkb) -> Self {
        Self {
            devices: Vec::new(),
            filters: Vec::new(),
            spies: Vec::new(),
            next_filter_seq: 0,
            keyboard: KeyboardRedirection::new(xkb),
            pointer: PointerRedirection::new(),
            touch: TouchRedirection::new(),
            tablet: TabletRedirection::new(),
            device_defaults: crate::device::DeviceConfig::default(),
            surface_resolver: None,
        }
    }

    pub fn new_shared(xkb: Xkb) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(xkb)))
    }

    pub fn keyboard(&self) -> &KeyboardRedirection {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut KeyboardRedirection {
        &mut self.keyboard
    }

    pub fn pointer(&self) -> &PointerRedirection {
        &self.pointer
    }

    pub fn touch(&self) -> &TouchRedirection {
        &self.touch
    }

    pub fn tablet(&self) -> &TabletRedirection {
        &self.tablet
    }

    pub fn global_pointer(&self) -> Point {
        self.pointer.position()
    }

    pub fn button_states(&self) -> MouseButtons {
        self.pointer.button_states()
    }

    pub fn set_device_defaults(&mut self, defaults: crate::device::DeviceConfig) {
        self.device_defaults = defaults;
    }

    /// Installs the collaborator that maps a global position to the surface
    /// under it; drives the pointer/touch hover and focus state.
    pub fn set_surface_resolver(&mut self, resolver: Box<dyn Fn(Point) -> Option<SurfaceId>>) {
        self.surface_resolver = Some(resolver);
    }

    fn surface_at(&self, position: Point) -> Option<SurfaceId> {
        self.surface_resolver.as_ref().and_then(|resolver| resolver(position))
    }

    // -- device registry --------------------------------------------------

    pub fn add_device(&mut self, device: InputDevice) -> Rc<InputDevice> {
        device.set_config(self.device_defaults.clone());
        let device = Rc::new(device);
        debug!(name = %device.name(), sys_name = %device.sys_name(), "adding input device");
        self.devices.push(device.clone());

        let added = device.clone();
        self.process_spies(|spy| spy.device_added(&added));
        self.process_all_filters(|filter| filter.device_added(&added));
        device
    }

    pub fn remove_device(&mut self, device_id: DeviceId) -> Option<Rc<InputDevice>> {
        let index = self.devices.iter().position(|d| d.id() == device_id)?;
        let device = self.devices.remove(index);
        debug!(name = %device.name(), "removing input device");

        let removed = device.clone();
        self.process_spies(|spy| spy.device_removed(&removed));
        self.process_all_filters(|filter| filter.device_removed(&removed));
        Some(device)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Rc<InputDevice>> {
        self.devices.iter()
    }

    pub fn device(&self, device_id: DeviceId) -> Option<Rc<InputDevice>> {
        self.devices.iter().find(|d| d.id() == device_id).cloned()
    }

    pub fn has_keyboard(&self) -> bool {
        self.devices.iter().any(|d| d.is_keyboard())
    }

    pub fn has_alpha_numeric_keyboard(&self) -> bool {
        self.devices.iter().any(|d| d.is_alpha_numeric_keyboard())
    }

    pub fn has_pointer(&self) -> bool {
        self.devices.iter().any(|d| d.is_pointer())
    }

    pub fn has_touch(&self) -> bool {
        self.devices.iter().any(|d| d.is_touch())
    }

    pub fn has_tablet_mode_switch(&self) -> bool {
        self.devices.iter().any(|d| d.is_tablet_mode_switch())
    }

    // -- spy/filter chains ------------------------------------------------

    /// Installs a filter at its position in the chain. The chain holds a weak
    /// reference: dropping the filter's owner unregisters it automatically.
    pub fn install_filter(&mut self, order: InputFilterOrder, filter: Rc<RefCell<dyn InputEventFilter>>) {
        let seq = self.next_filter_seq;
        self.next_filter_seq += 1;
        self.filters.push(FilterEntry {
            order,
            seq,
            filter: Rc::downgrade(&filter),
        });
        self.filters.sort_by_key(|entry| (entry.order, entry.seq));
    }

    pub fn uninstall_filter(&mut self, filter: &Rc<RefCell<dyn InputEventFilter>>) {
        let target = Rc::downgrade(filter);
        self.filters.retain(|entry| !entry.filter.ptr_eq(&target));
    }

    /// Installs a spy; spies run in registration order. Held weakly, like
    /// filters.
    pub fn install_spy(&mut self, spy: Rc<RefCell<dyn InputEventSpy>>) {
        self.spies.push(Rc::downgrade(&spy));
    }

    pub fn uninstall_spy(&mut self, spy: &Rc<RefCell<dyn InputEventSpy>>) {
        let target = Rc::downgrade(spy);
        self.spies.retain(|entry| !entry.ptr_eq(&target));
    }

    /// Invokes `function` on each filter in priority order, stopping at the
    /// first one that returns true.
    fn process_filters(&mut self, mut function: impl FnMut(&mut dyn InputEventFilter) -> bool) -> bool {
        self.filters.retain(|entry| entry.filter.strong_count() > 0);
        let active: Vec<_> = self.filters.iter().filter_map(|entry| entry.filter.upgrade()).collect();
        for filter in active {
            if function(&mut *filter.borrow_mut()) {
                return true;
            }
        }
        false
    }

    /// Invokes `function` on every filter with no short-circuit, for
    /// notifications that are not consumable events.
    fn process_all_filters(&mut self, mut function: impl FnMut(&mut dyn InputEventFilter)) {
        self.filters.retain(|entry| entry.filter.strong_count() > 0);
        let active: Vec<_> = self.filters.iter().filter_map(|entry| entry.filter.upgrade()).collect();
        for filter in active {
            function(&mut *filter.borrow_mut());
        }
    }

    /// Invokes `function` on every spy, unconditionally.
    fn process_spies(&mut self, mut function: impl FnMut(&mut dyn InputEventSpy)) {
        self.spies.retain(|entry| entry.strong_count() > 0);
        let active: Vec<_> = self.spies.iter().filter_map(|entry| entry.upgrade()).collect();
        for spy in active {
            function(&mut *spy.borrow_mut());
        }
    }

    // -- event intake -----------------------------------------------------

    /// Routes one backend event. Returns true if a filter consumed it.
    pub fn process_event(&mut self, event: BackendEvent) -> bool {
        match event {
            BackendEvent::DeviceAdded { device } => {
                self.add_device(device);
                false
            }
            BackendEvent::DeviceRemoved { device_id } => {
                self.remove_device(device_id);
                false
            }
            BackendEvent::KeyboardKey { device_id, key, state, time } => {
                self.process_keyboard_key(device_id, key, state, time)
            }
            BackendEvent::PointerMotion { device_id, delta, time } => {
                self.process_pointer_motion(device_id, delta, time)
            }
            BackendEvent::PointerMotionAbsolute { device_id, position, time } => {
                self.process_pointer_motion_absolute(device_id, position, time)
            }
            BackendEvent::PointerButton { device_id, button, state, time } => {
                self.process_pointer_button(device_id, button, state, time)
            }
            BackendEvent::PointerAxis { device_id, axis, delta, delta_discrete, source, time } => {
                self.process_pointer_axis(device_id, axis, delta, delta_discrete, source, time)
            }
            BackendEvent::PointerFrame => self.process_pointer_frame(),
            BackendEvent::TouchDown { device_id, id, position, time } => {
                self.process_touch_down(device_id, id, position, time)
            }
            BackendEvent::TouchMotion { device_id, id, position, time } => {
                self.process_touch_motion(device_id, id, position, time)
            }
            BackendEvent::TouchUp { device_id, id, time } => self.process_touch_up(device_id, id, time),
            BackendEvent::TouchCancel { .. } => self.process_touch_cancel(),
            BackendEvent::TouchFrame { .. } => self.process_touch_frame(),
            BackendEvent::SwipeBegin { device_id, fingers, time } => {
                self.process_swipe_begin(device_id, fingers, time)
            }
            BackendEvent::SwipeUpdate { device_id, delta, time } => {
                self.process_swipe_update(device_id, delta, time)
            }
            BackendEvent::SwipeEnd { device_id, cancelled, time } => {
                self.process_swipe_end(device_id, cancelled, time)
            }
            BackendEvent::PinchBegin { device_id, fingers, time } => {
                self.process_pinch_begin(device_id, fingers, time)
            }
            BackendEvent::PinchUpdate { device_id, delta, scale, rotation, time } => {
                self.process_pinch_update(device_id, delta, scale, rotation, time)
            }
            BackendEvent::PinchEnd { device_id, cancelled, time } => {
                self.process_pinch_end(device_id, cancelled, time)
            }
            BackendEvent::HoldBegin { device_id, fingers, time } => {
                self.process_hold_begin(device_id, fingers, time)
            }
            BackendEvent::HoldEnd { device_id, cancelled, time } => {
                self.process_hold_end(device_id, cancelled, time)
            }
            BackendEvent::SwitchToggle { device_id, state, time } => {
                self.process_switch_toggle(device_id, state, time)
            }
            BackendEvent::TabletToolProximity { device_id, tool, position, state, time } => {
                self.process_tablet_tool_proximity(device_id, tool, position, state, time)
            }
            BackendEvent::TabletToolAxis { device_id, tool, position, pressure, tilt, rotation, time } => {
                self.process_tablet_tool_axis(device_id, tool, position, pressure, tilt, rotation, time)
            }
            BackendEvent::TabletToolTip { device_id, tool, position, state, time } => {
                self.process_tablet_tool_tip(device_id, tool, position, state, time)
            }
            BackendEvent::TabletToolButton { device_id, tool, button, pressed, time } => {
                self.process_tablet_tool_button(device_id, tool, button, pressed, time)
            }
            BackendEvent::TabletPadButton { device_id, button, pressed, time } => {
                self.process_tablet_pad_button(device_id, button, pressed, time)
            }
            BackendEvent::TabletPadStrip { device_id, number, position, is_finger, time } => {
                self.process_tablet_pad_strip(device_id, number, position, is_finger, time)
            }
            BackendEvent::TabletPadRing { device_id, number, position, is_finger, time } => {
                self.process_tablet_pad_ring(device_id, number, position, is_finger, time)
            }
        }
    }

    fn event_device(&self, device_id: DeviceId) -> Option<Rc<InputDevice>> {
        let device = self.device(device_id);
        if device.is_none() {
            // Unknown devices are dropped rather than trusted.
            warn!(device_id, "event for unknown input device");
        }
        device.filter(|d| d.is_enabled())
    }

    #[profiling::function]
    pub fn process_keyboard_key(&mut self, device_id: DeviceId, key: u32, state: KeyState, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };

        let translation = self.keyboard.update_key(key, state);

        // Hardware LED sync across every keyboard, the locks are global.
        for keyboard in self.devices.iter().filter(|d| d.is_keyboard()) {
            if keyboard.set_leds(translation.leds) {
                debug!(name = %keyboard.name(), leds = ?translation.leds, "updating keyboard leds");
            }
        }

        let event = KeyboardKeyEvent {
            device,
            key,
            state,
            keysym: translation.keysym,
            text: translation.text,
            modifiers: translation.modifiers,
            modifiers_for_shortcuts: translation.modifiers_for_shortcuts,
            timestamp: time,
        };
        self.process_spies(|spy| spy.keyboard_key(&event));
        self.process_filters(|filter| filter.keyboard_key(&event))
    }

    #[profiling::function]
    pub fn process_pointer_motion(&mut self, device_id: DeviceId, delta: Point, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let position = self.pointer.apply_motion(delta);
        let hover = self.surface_at(position);
        self.pointer.set_hover(hover);
        let event = PointerMotionEvent {
            device,
            position,
            delta,
            modifiers: self.keyboard.modifiers(),
            timestamp: time,
        };
        self.process_spies(|spy| spy.pointer_motion(&event));
        self.process_filters(|filter| filter.pointer_motion(&event))
    }

    pub fn process_pointer_motion_absolute(&mut self, device_id: DeviceId, position: Point, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let delta = self.pointer.apply_motion_absolute(position);
        let hover = self.surface_at(position);
        self.pointer.set_hover(hover);
        let event = PointerMotionEvent {
            device,
            position,
            delta,
            modifiers: self.keyboard.modifiers(),
            timestamp: time,
        };
        self.process_spies(|spy| spy.pointer_motion(&event));
        self.process_filters(|filter| filter.pointer_motion(&event))
    }

    #[profiling::function]
    pub fn process_pointer_button(&mut self, device_id: DeviceId, button: u32, state: ButtonState, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let buttons = self.pointer.apply_button(button, state);
        let event = PointerButtonEvent {
            device,
            button: MouseButtons::from_native(button),
            native_button: button,
            state,
            buttons,
            position: self.pointer.position(),
            modifiers: self.keyboard.modifiers(),
            timestamp: time,
        };
        self.process_spies(|spy| spy.pointer_button(&event));
        let consumed = self.process_filters(|filter| filter.pointer_button(&event));
        // Pointer focus follows unconsumed presses; a consumed press (e.g. a
        // stroke grab) must not move focus.
        if !consumed && state == ButtonState::Pressed {
            let focus = self.pointer.hover();
            self.pointer.set_focus(focus);
        }
        consumed
    }

    pub fn process_pointer_axis(
        &mut self,
        device_id: DeviceId,
        axis: Axis,
        delta: f64,
        delta_discrete: Option<i32>,
        source: AxisSource,
        time: Duration,
    ) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = PointerAxisEvent {
            device,
            axis,
            delta,
            delta_discrete,
            source,
            modifiers: self.keyboard.modifiers(),
            timestamp: time,
        };
        self.process_spies(|spy| spy.pointer_axis(&event));
        self.process_filters(|filter| filter.pointer_axis(&event))
    }

    pub fn process_pointer_frame(&mut self) -> bool {
        self.process_spies(|spy| spy.pointer_frame());
        self.process_filters(|filter| filter.pointer_frame())
    }

    pub fn process_touch_down(&mut self, device_id: DeviceId, id: i32, position: Point, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        self.touch.down(id, position);
        if self.touch.focus().is_none() {
            let focus = self.surface_at(position);
            self.touch.set_focus(focus);
        }
        let event = TouchDownEvent {
            device,
            id,
            position,
            modifiers: self.keyboard.modifiers(),
            timestamp: time,
        };
        self.process_spies(|spy| spy.touch_down(&event));
        self.process_filters(|filter| filter.touch_down(&event))
    }

    pub fn process_touch_motion(&mut self, device_id: DeviceId, id: i32, position: Point, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        self.touch.motion(id, position);
        let event = TouchMotionEvent {
            device,
            id,
            position,
            modifiers: self.keyboard.modifiers(),
            timestamp: time,
        };
        self.process_spies(|spy| spy.touch_motion(&event));
        self.process_filters(|filter| filter.touch_motion(&event))
    }

    pub fn process_touch_up(&mut self, device_id: DeviceId, id: i32, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        self.touch.up(id);
        let event = TouchUpEvent {
            device,
            id,
            timestamp: time,
        };
        self.process_spies(|spy| spy.touch_up(&event));
        self.process_filters(|filter| filter.touch_up(&event))
    }

    pub fn process_touch_cancel(&mut self) -> bool {
        self.touch.cancel();
        self.process_spies(|spy| spy.touch_cancel());
        self.process_filters(|filter| filter.touch_cancel())
    }

    pub fn process_touch_frame(&mut self) -> bool {
        self.process_spies(|spy| spy.touch_frame());
        self.process_filters(|filter| filter.touch_frame())
    }

    pub fn process_swipe_begin(&mut self, device_id: DeviceId, fingers: u32, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = SwipeGestureBeginEvent {
            device,
            fingers,
            timestamp: time,
        };
        self.process_spies(|spy| spy.swipe_gesture_begin(&event));
        self.process_filters(|filter| filter.swipe_gesture_begin(&event))
    }

    pub fn process_swipe_update(&mut self, device_id: DeviceId, delta: Point, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = SwipeGestureUpdateEvent {
            device,
            delta,
            timestamp: time,
        };
        self.process_spies(|spy| spy.swipe_gesture_update(&event));
        self.process_filters(|filter| filter.swipe_gesture_update(&event))
    }

    pub fn process_swipe_end(&mut self, device_id: DeviceId, cancelled: bool, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = SwipeGestureEndEvent {
            device,
            cancelled,
            timestamp: time,
        };
        self.process_spies(|spy| spy.swipe_gesture_end(&event));
        self.process_filters(|filter| filter.swipe_gesture_end(&event))
    }

    pub fn process_pinch_begin(&mut self, device_id: DeviceId, fingers: u32, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = PinchGestureBeginEvent {
            device,
            fingers,
            timestamp: time,
        };
        self.process_spies(|spy| spy.pinch_gesture_begin(&event));
        self.process_filters(|filter| filter.pinch_gesture_begin(&event))
    }

    pub fn process_pinch_update(
        &mut self,
        device_id: DeviceId,
        delta: Point,
        scale: f64,
        rotation: f64,
        time: Duration,
    ) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = PinchGestureUpdateEvent {
            device,
            delta,
            scale,
            rotation,
            timestamp: time,
        };
        self.process_spies(|spy| spy.pinch_gesture_update(&event));
        self.process_filters(|filter| filter.pinch_gesture_update(&event))
    }

    pub fn process_pinch_end(&mut self, device_id: DeviceId, cancelled: bool, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = PinchGestureEndEvent {
            device,
            cancelled,
            timestamp: time,
        };
        self.process_spies(|spy| spy.pinch_gesture_end(&event));
        self.process_filters(|filter| filter.pinch_gesture_end(&event))
    }

    pub fn process_hold_begin(&mut self, device_id: DeviceId, fingers: u32, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = HoldGestureBeginEvent {
            device,
            fingers,
            timestamp: time,
        };
        self.process_spies(|spy| spy.hold_gesture_begin(&event));
        self.process_filters(|filter| filter.hold_gesture_begin(&event))
    }

    pub fn process_hold_end(&mut self, device_id: DeviceId, cancelled: bool, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = HoldGestureEndEvent {
            device,
            cancelled,
            timestamp: time,
        };
        self.process_spies(|spy| spy.hold_gesture_end(&event));
        self.process_filters(|filter| filter.hold_gesture_end(&event))
    }

    pub fn process_switch_toggle(&mut self, device_id: DeviceId, state: SwitchState, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = SwitchEvent {
            device,
            state,
            timestamp: time,
        };
        self.process_spies(|spy| spy.switch_event(&event));
        self.process_filters(|filter| filter.switch_event(&event))
    }

    pub fn process_tablet_tool_proximity(
        &mut self,
        device_id: DeviceId,
        tool: u32,
        position: Point,
        state: ProximityState,
        time: Duration,
    ) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        match state {
            ProximityState::In => self.tablet.proximity_in(tool, position),
            ProximityState::Out => self.tablet.proximity_out(tool),
        }
        let event = TabletToolProximityEvent {
            device,
            tool,
            position,
            state,
            timestamp: time,
        };
        self.process_spies(|spy| spy.tablet_tool_proximity(&event));
        self.process_filters(|filter| filter.tablet_tool_proximity(&event))
    }

    pub fn process_tablet_tool_axis(
        &mut self,
        device_id: DeviceId,
        tool: u32,
        position: Point,
        pressure: f64,
        tilt: Point,
        rotation: f64,
        time: Duration,
    ) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        self.tablet.motion(tool, position);
        let event = TabletToolAxisEvent {
            device,
            tool,
            position,
            pressure,
            tilt,
            rotation,
            timestamp: time,
        };
        self.process_spies(|spy| spy.tablet_tool_axis(&event));
        self.process_filters(|filter| filter.tablet_tool_axis(&event))
    }

    pub fn process_tablet_tool_tip(
        &mut self,
        device_id: DeviceId,
        tool: u32,
        position: Point,
        state: TipState,
        time: Duration,
    ) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        self.tablet.tip(tool, state == TipState::Down);
        let event = TabletToolTipEvent {
            device,
            tool,
            position,
            state,
            timestamp: time,
        };
        self.process_spies(|spy| spy.tablet_tool_tip(&event));
        self.process_filters(|filter| filter.tablet_tool_tip(&event))
    }

    pub fn process_tablet_tool_button(
        &mut self,
        device_id: DeviceId,
        tool: u32,
        button: u32,
        pressed: bool,
        time: Duration,
    ) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = TabletToolButtonEvent {
            device,
            tool,
            button,
            pressed,
            timestamp: time,
        };
        self.process_spies(|spy| spy.tablet_tool_button(&event));
        self.process_filters(|filter| filter.tablet_tool_button(&event))
    }

    pub fn process_tablet_pad_button(&mut self, device_id: DeviceId, button: u32, pressed: bool, time: Duration) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = TabletPadButtonEvent {
            device,
            button,
            pressed,
            timestamp: time,
        };
        self.process_spies(|spy| spy.tablet_pad_button(&event));
        self.process_filters(|filter| filter.tablet_pad_button(&event))
    }

    pub fn process_tablet_pad_strip(
        &mut self,
        device_id: DeviceId,
        number: u32,
        position: f64,
        is_finger: bool,
        time: Duration,
    ) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = TabletPadStripEvent {
            device,
            number,
            position,
            is_finger,
            timestamp: time,
        };
        self.process_spies(|spy| spy.tablet_pad_strip(&event));
        self.process_filters(|filter| filter.tablet_pad_strip(&event))
    }

    pub fn process_tablet_pad_ring(
        &mut self,
        device_id: DeviceId,
        number: u32,
        position: f64,
        is_finger: bool,
        time: Duration,
    ) -> bool {
        let Some(device) = self.event_device(device_id) else {
            return false;
        };
        let event = TabletPadRingEvent {
            device,
            number,
            position,
            is_finger,
            timestamp: time,
        };
        self.process_spies(|spy| spy.tablet_pad_ring(&event));
        self.process_filters(|filter| filter.tablet_pad_ring(&event))
    }
}

/// Weak, clonable handle to a shared [`InputRedirection`], safe to hold from
/// deferred tasks: events fed through it re-enter dispatch on a later loop
/// iteration, never inside the dispatch that created the task.
#[derive(Clone)]
pub struct InputHandle {
    redirection: Weak<RefCell<InputRedirection>>,
}

impl InputHandle {
    pub fn new(redirection: &Rc<RefCell<InputRedirection>>) -> Self {
        Self {
            redirection: Rc::downgrade(redirection),
        }
    }
}

impl PointerButtonSink for InputHandle {
    fn process_button(&self, native_button: u32, state: ButtonState, time: Duration, device: &Rc<InputDevice>) {
        if let Some(input) = self.redirection.upgrade() {
            input
                .borrow_mut()
                .process_pointer_button(device.id(), native_button, state, time);
        }
    }
}
