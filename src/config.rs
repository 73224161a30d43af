use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::device::DeviceConfig;
use crate::event::Modifiers;
use crate::geometry::Point;
use crate::stroke::gestures::{StrokeActionInfo, StrokeGesture, StrokeGestures};
use crate::xkb::{KeymapRules, NumLockPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub keyboard: KeyboardSettings,
    pub stroke: StrokeSettings,
    /// Defaults applied to newly added devices.
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct KeyboardSettings {
    #[serde(flatten)]
    pub keymap: KeymapRules,
    pub numlock_on_startup: NumLockPolicy,
    pub repeat_rate: u32,
    pub repeat_delay_ms: u64,
}

impl Default for KeyboardSettings {
    fn default() -> Self {
        Self {
            keymap: KeymapRules::default(),
            numlock_on_startup: NumLockPolicy::Unchanged,
            repeat_rate: 25,
            repeat_delay_ms: 660,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StrokeSettings {
    /// Minimum pointer travel before a grab becomes active recognition.
    pub activation_distance: f64,
    /// Non-zero enables click-then-draw strokes on button release.
    pub start_buttonless_timeout_ms: u64,
    /// Quiet time that ends a buttonless stroke; defaults to the start
    /// timeout when zero.
    pub end_buttonless_timeout_ms: u64,
    /// Per-device activation buttons, keyed by device name. Devices without
    /// an entry never start strokes.
    pub devices: HashMap<String, StrokeDeviceSettings>,
    pub gestures: Vec<StrokeTemplate>,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self {
            activation_distance: 16.0,
            start_buttonless_timeout_ms: 0,
            end_buttonless_timeout_ms: 0,
            devices: HashMap::new(),
            gestures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StrokeDeviceSettings {
    /// Raw evdev button code (e.g. 0x112 for BTN_MIDDLE).
    pub activation_button: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StrokeTemplate {
    pub name: String,
    pub label: String,
    /// Modifier names: "shift", "ctrl", "alt", "logo".
    pub modifiers: Vec<String>,
    pub points: Vec<(f64, f64)>,
}

impl Config {
    /// Loads the TOML config. A missing file yields the defaults; a file
    /// that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(toml::from_str(&contents)?)
    }
}

impl StrokeSettings {
    /// Builds the gesture registry from the configured templates, skipping
    /// (and logging) degenerate ones.
    pub fn build_gestures(&self) -> StrokeGestures {
        let mut gestures = StrokeGestures::new();
        for template in &self.gestures {
            let points: Vec<Point> = template.points.iter().map(|&(x, y)| Point::new(x, y)).collect();
            let modifiers = modifiers_from_names(&template.modifiers);
            let action = StrokeActionInfo::new(template.name.clone(), template.label.clone());
            match StrokeGesture::new(points, modifiers, action) {
                Some(gesture) => gestures.add(Rc::new(gesture)),
                None => warn!(name = %template.name, "ignoring degenerate stroke template"),
            }
        }
        gestures
    }
}

pub fn modifiers_from_names(names: &[String]) -> Modifiers {
    let mut modifiers = Modifiers::empty();
    for name in names {
        match name.as_str() {
            "shift" => modifiers |= Modifiers::SHIFT,
            "ctrl" | "control" => modifiers |= Modifiers::CTRL,
            "alt" => modifiers |= Modifiers::ALT,
            "logo" | "meta" | "super" => modifiers |= Modifiers::LOGO,
            other => warn!(modifier = other, "unknown modifier name in config"),
        }
    }
    modifiers
}
