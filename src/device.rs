use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::event::Leds;

pub type DeviceId = u64;

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DeviceCapabilities: u32 {
        const KEYBOARD           = 0b0000001;
        const POINTER            = 0b0000010;
        const TOUCH              = 0b0000100;
        const TABLET_TOOL        = 0b0001000;
        const TABLET_PAD         = 0b0010000;
        const LID_SWITCH         = 0b0100000;
        const TABLET_MODE_SWITCH = 0b1000000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollMethod {
    #[default]
    TwoFinger,
    Edge,
    OnButtonDown,
    NoScroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceOrientation {
    #[default]
    Normal,
    Rotated90,
    Rotated180,
    Rotated270,
}

/// Mutable per-device configuration, applied by the embedding backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeviceConfig {
    pub enabled: bool,
    pub natural_scroll: bool,
    pub tap_to_click: bool,
    pub scroll_method: ScrollMethod,
    pub pointer_acceleration: f64,
    pub orientation: DeviceOrientation,
    pub calibration_matrix: [f64; 6],
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            natural_scroll: false,
            tap_to_click: false,
            scroll_method: ScrollMethod::default(),
            pointer_acceleration: 0.0,
            orientation: DeviceOrientation::default(),
            calibration_matrix: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }
}

/// One physical or virtual input device as enumerated by the backend.
///
/// Owned by the [`InputRedirection`](crate::input::InputRedirection) registry;
/// everything else holds non-owning `Rc` clones or the plain [`DeviceId`].
#[derive(Debug)]
pub struct InputDevice {
    id: DeviceId,
    name: String,
    sys_name: String,
    vendor_id: u32,
    product_id: u32,
    capabilities: DeviceCapabilities,
    config: RefCell<DeviceConfig>,
    leds: Cell<Leds>,
}

impl InputDevice {
    pub fn new(name: impl Into<String>, sys_name: impl Into<String>, capabilities: DeviceCapabilities) -> Self {
        Self {
            id: NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            sys_name: sys_name.into(),
            vendor_id: 0,
            product_id: 0,
            capabilities,
            config: RefCell::new(DeviceConfig::default()),
            leds: Cell::new(Leds::empty()),
        }
    }

    pub fn with_ids(mut self, vendor_id: u32, product_id: u32) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sys_name(&self) -> &str {
        &self.sys_name
    }

    pub fn vendor_id(&self) -> u32 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u32 {
        self.product_id
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    pub fn is_keyboard(&self) -> bool {
        self.capabilities.contains(DeviceCapabilities::KEYBOARD)
    }

    /// A keyboard with enough keys to type on, as opposed to e.g. a power
    /// button that also reports the keyboard capability.
    pub fn is_alpha_numeric_keyboard(&self) -> bool {
        self.is_keyboard() && !self.name.to_ascii_lowercase().contains("button")
    }

    pub fn is_pointer(&self) -> bool {
        self.capabilities.contains(DeviceCapabilities::POINTER)
    }

    pub fn is_touch(&self) -> bool {
        self.capabilities.contains(DeviceCapabilities::TOUCH)
    }

    pub fn is_tablet_tool(&self) -> bool {
        self.capabilities.contains(DeviceCapabilities::TABLET_TOOL)
    }

    pub fn is_tablet_pad(&self) -> bool {
        self.capabilities.contains(DeviceCapabilities::TABLET_PAD)
    }

    pub fn is_lid_switch(&self) -> bool {
        self.capabilities.contains(DeviceCapabilities::LID_SWITCH)
    }

    pub fn is_tablet_mode_switch(&self) -> bool {
        self.capabilities.contains(DeviceCapabilities::TABLET_MODE_SWITCH)
    }

    pub fn config(&self) -> DeviceConfig {
        self.config.borrow().clone()
    }

    pub fn set_config(&self, config: DeviceConfig) {
        *self.config.borrow_mut() = config;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.borrow().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.config.borrow_mut().enabled = enabled;
    }

    pub fn leds(&self) -> Leds {
        self.leds.get()
    }

    /// Updates the hardware LED state. Returns true if the state changed.
    pub fn set_leds(&self, leds: Leds) -> bool {
        let changed = self.leds.get() != leds;
        self.leds.set(leds);
        changed
    }
}
