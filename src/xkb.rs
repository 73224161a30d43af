use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use xkbcommon::xkb;
use xkbcommon::xkb::{Keycode, Keysym, LayoutIndex, ModIndex, ModMask};

use crate::event::{KeyState, Leds, Modifiers};

/// Offset between Linux evdev KEY_* numbering and keycodes in the XKB evdev
/// dataset.
const EVDEV_OFFSET: u32 = 8;

#[derive(Debug, Error)]
pub enum XkbError {
    #[error("could not compile xkb keymap")]
    KeymapCompile,
}

/// Rule names used to compile a keymap, in xkb's RMLVO model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct KeymapRules {
    pub rules: String,
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: Option<String>,
}

impl KeymapRules {
    /// libxkbcommon reads the XKB_DEFAULT_* variables through secure_getenv,
    /// which yields nothing for privileged processes, so empty fields are
    /// filled from the environment here.
    fn resolved(&self) -> KeymapRules {
        let mut out = self.clone();
        let env = |name: &str| std::env::var(name).unwrap_or_default();
        if out.rules.is_empty() {
            out.rules = env("XKB_DEFAULT_RULES");
        }
        if out.model.is_empty() {
            out.model = env("XKB_DEFAULT_MODEL");
        }
        if out.layout.is_empty() {
            out.layout = env("XKB_DEFAULT_LAYOUT");
            out.variant = env("XKB_DEFAULT_VARIANT");
        }
        if out.options.is_none() {
            let options = env("XKB_DEFAULT_OPTIONS");
            if !options.is_empty() {
                out.options = Some(options);
            }
        }
        out
    }
}

/// What to do with NumLock when the first keymap is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumLockPolicy {
    On,
    Off,
    #[default]
    Unchanged,
}

/// Serialized modifier masks, suitable for forwarding to a seat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub depressed: ModMask,
    pub latched: ModMask,
    pub locked: ModMask,
}

/// Keyboard layout/keymap owner and modifier state machine.
///
/// Mutated only through [`Xkb::update_key`], [`Xkb::update_modifiers_state`]
/// and the layout switch calls; recreated state whenever the keymap changes.
pub struct Xkb {
    context: xkb::Context,
    keymap: xkb::Keymap,
    state: xkb::State,
    compose: Option<xkb::compose::State>,

    shift_mod: ModIndex,
    caps_mod: ModIndex,
    ctrl_mod: ModIndex,
    alt_mod: ModIndex,
    meta_mod: ModIndex,
    num_mod: ModIndex,

    num_led: xkb::LedIndex,
    caps_led: xkb::LedIndex,
    scroll_led: xkb::LedIndex,

    modifier_state: ModifierState,
    current_layout: LayoutIndex,
    modifiers: Modifiers,
    consumed_modifiers: Modifiers,
    keysym: Keysym,
    leds: Leds,
    layout_list: Vec<String>,

    numlock_policy: NumLockPolicy,
    startup: bool,
}

impl Xkb {
    /// Compiles a keymap for the given rule names, falling back to the
    /// environment defaults and finally to the built-in keymap when nothing
    /// else loads.
    pub fn new(rules: &KeymapRules, numlock_policy: NumLockPolicy) -> Result<Self, XkbError> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);

        let resolved = rules.resolved();
        let keymap = keymap_from_names(&context, &resolved)
            .or_else(|| {
                debug!("could not compile keymap from configured rules, trying defaults");
                keymap_from_names(&context, &KeymapRules::default().resolved())
            })
            .or_else(|| {
                debug!("could not compile default keymap, using built-in fallback");
                xkb::Keymap::new_from_string(
                    &context,
                    FALLBACK_KEYMAP.to_string(),
                    xkb::KEYMAP_FORMAT_TEXT_V1,
                    xkb::KEYMAP_COMPILE_NO_FLAGS,
                )
            })
            .ok_or(XkbError::KeymapCompile)?;

        let layout_list = layout_list_of(&resolved.layout);
        Self::from_parts(context, keymap, layout_list, numlock_policy)
    }

    /// Compiles the keymap from a complete keymap string. Used by embedders
    /// that receive keymaps from elsewhere, and by tests.
    pub fn from_keymap_string(keymap: &str) -> Result<Self, XkbError> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_string(
            &context,
            keymap.to_string(),
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or(XkbError::KeymapCompile)?;
        Self::from_parts(context, keymap, Vec::new(), NumLockPolicy::Unchanged)
    }

    fn from_parts(
        context: xkb::Context,
        keymap: xkb::Keymap,
        layout_list: Vec<String>,
        numlock_policy: NumLockPolicy,
    ) -> Result<Self, XkbError> {
        let state = xkb::State::new(&keymap);
        // As in the xkbcommon docs, the compose locale comes from LC_ALL,
        // LC_CTYPE or LANG, whichever is set first.
        let compose = std::env::var("LC_ALL")
            .ok()
            .or_else(|| std::env::var("LC_CTYPE").ok())
            .or_else(|| std::env::var("LANG").ok())
            .and_then(|locale| {
                xkb::compose::Table::new_from_locale(
                    &context,
                    std::ffi::OsStr::new(&locale),
                    xkb::compose::COMPILE_NO_FLAGS,
                )
                .ok()
            })
            .map(|table| xkb::compose::State::new(&table, xkb::compose::STATE_NO_FLAGS));
        let mut this = Self {
            context,
            keymap,
            state,
            compose,
            shift_mod: xkb::MOD_INVALID,
            caps_mod: xkb::MOD_INVALID,
            ctrl_mod: xkb::MOD_INVALID,
            alt_mod: xkb::MOD_INVALID,
            meta_mod: xkb::MOD_INVALID,
            num_mod: xkb::MOD_INVALID,
            num_led: xkb::LED_INVALID,
            caps_led: xkb::LED_INVALID,
            scroll_led: xkb::LED_INVALID,
            modifier_state: ModifierState::default(),
            current_layout: 0,
            modifiers: Modifiers::empty(),
            consumed_modifiers: Modifiers::empty(),
            keysym: xkeysym::NO_SYMBOL,
            leds: Leds::empty(),
            layout_list,
            numlock_policy,
            startup: true,
        };
        this.reindex_keymap();
        Ok(this)
    }

    /// Replaces the keymap with one compiled from new rule names. On
    /// compilation failure the current keymap stays active.
    pub fn reconfigure(&mut self, rules: &KeymapRules) {
        let resolved = rules.resolved();
        let Some(keymap) = keymap_from_names(&self.context, &resolved) else {
            debug!("could not compile xkb keymap from configuration, keeping current keymap");
            return;
        };
        self.layout_list = layout_list_of(&resolved.layout);
        self.update_keymap(keymap);
    }

    fn update_keymap(&mut self, keymap: xkb::Keymap) {
        // Carry the lock state over to the new keymap.
        let numlock_was_on = self.num_mod != xkb::MOD_INVALID
            && self
                .state
                .mod_index_is_active(self.num_mod, xkb::STATE_MODS_LOCKED);
        let capslock_was_on = self.caps_mod != xkb::MOD_INVALID
            && self
                .state
                .mod_index_is_active(self.caps_mod, xkb::STATE_MODS_LOCKED);

        self.state = xkb::State::new(&keymap);
        self.keymap = keymap;
        self.reindex_keymap();

        if !self.startup {
            self.set_modifier_locked(self.num_mod, numlock_was_on);
            self.set_modifier_locked(self.caps_mod, capslock_was_on);
            self.update_modifiers();
        }
    }

    fn reindex_keymap(&mut self) {
        self.shift_mod = self.keymap.mod_get_index(xkb::MOD_NAME_SHIFT);
        self.caps_mod = self.keymap.mod_get_index(xkb::MOD_NAME_CAPS);
        self.ctrl_mod = self.keymap.mod_get_index(xkb::MOD_NAME_CTRL);
        self.alt_mod = self.keymap.mod_get_index(xkb::MOD_NAME_ALT);
        self.meta_mod = self.keymap.mod_get_index(xkb::MOD_NAME_LOGO);
        self.num_mod = self.keymap.mod_get_index(xkb::MOD_NAME_NUM);

        self.num_led = self.keymap.led_get_index(xkb::LED_NAME_NUM);
        self.caps_led = self.keymap.led_get_index(xkb::LED_NAME_CAPS);
        self.scroll_led = self.keymap.led_get_index(xkb::LED_NAME_SCROLL);

        self.current_layout = self.state.serialize_layout(xkb::STATE_LAYOUT_EFFECTIVE);
        self.modifier_state = ModifierState {
            depressed: self.state.serialize_mods(xkb::STATE_MODS_DEPRESSED),
            latched: self.state.serialize_mods(xkb::STATE_MODS_LATCHED),
            locked: self.state.serialize_mods(xkb::STATE_MODS_LOCKED),
        };

        if self.startup {
            self.startup = false;
            match self.numlock_policy {
                NumLockPolicy::On => self.set_modifier_locked(self.num_mod, true),
                NumLockPolicy::Off => self.set_modifier_locked(self.num_mod, false),
                NumLockPolicy::Unchanged => {}
            }
        }
        self.update_modifiers();
    }

    fn set_modifier_locked(&mut self, modifier: ModIndex, locked: bool) {
        if modifier == xkb::MOD_INVALID || modifier >= 32 {
            return;
        }
        let mut mask = self.modifier_state.locked;
        if locked {
            mask |= 1 << modifier;
        } else {
            mask &= !(1 << modifier);
        }
        self.modifier_state.locked = mask;
        self.state.update_mask(
            self.modifier_state.depressed,
            self.modifier_state.latched,
            self.modifier_state.locked,
            0,
            0,
            self.current_layout,
        );
        self.modifier_state.locked = self.state.serialize_mods(xkb::STATE_MODS_LOCKED);
    }

    /// Feeds one physical key transition into the state machine. Repeats do
    /// not change modifier state, only the cached keysym and text.
    pub fn update_key(&mut self, key: u32, state: KeyState) {
        let keycode = Keycode::from(key + EVDEV_OFFSET);
        let sym = self.state.key_get_one_sym(keycode);
        match state {
            KeyState::Pressed => {
                self.state.update_key(keycode, xkb::KeyDirection::Down);
            }
            KeyState::Released => {
                self.state.update_key(keycode, xkb::KeyDirection::Up);
            }
            KeyState::Repeated => {}
        }
        self.keysym = match self.compose.as_mut() {
            Some(compose) => {
                if state == KeyState::Pressed {
                    compose.feed(sym);
                }
                match compose.status() {
                    xkb::compose::Status::Nothing => sym,
                    xkb::compose::Status::Composed => {
                        let composed = compose.keysym().unwrap_or(xkeysym::NO_SYMBOL);
                        compose.reset();
                        composed
                    }
                    _ => xkeysym::NO_SYMBOL,
                }
            }
            None => sym,
        };
        self.update_modifiers();
        self.update_consumed_modifiers(key);
    }

    /// Applies externally supplied modifier masks (e.g. from an input method).
    pub fn update_modifiers_state(
        &mut self,
        depressed: ModMask,
        latched: ModMask,
        locked: ModMask,
        layout: LayoutIndex,
    ) {
        if self.state.update_mask(depressed, latched, locked, 0, 0, layout) == 0 {
            return;
        }
        self.update_modifiers();
    }

    fn update_modifiers(&mut self) {
        let mut mods = Modifiers::empty();
        if self.mod_active(self.shift_mod, xkb::STATE_MODS_EFFECTIVE) {
            mods |= Modifiers::SHIFT;
        }
        if self.mod_active(self.ctrl_mod, xkb::STATE_MODS_EFFECTIVE) {
            mods |= Modifiers::CTRL;
        }
        if self.mod_active(self.alt_mod, xkb::STATE_MODS_EFFECTIVE) {
            mods |= Modifiers::ALT;
        }
        if self.mod_active(self.meta_mod, xkb::STATE_MODS_EFFECTIVE) {
            mods |= Modifiers::LOGO;
        }
        self.modifiers = mods;

        let mut leds = Leds::empty();
        if self.num_led != xkb::LED_INVALID && self.state.led_index_is_active(self.num_led) {
            leds |= Leds::NUM_LOCK;
        }
        if self.caps_led != xkb::LED_INVALID && self.state.led_index_is_active(self.caps_led) {
            leds |= Leds::CAPS_LOCK;
        }
        if self.scroll_led != xkb::LED_INVALID && self.state.led_index_is_active(self.scroll_led) {
            leds |= Leds::SCROLL_LOCK;
        }
        self.leds = leds;

        self.current_layout = self.state.serialize_layout(xkb::STATE_LAYOUT_EFFECTIVE);
        self.modifier_state = ModifierState {
            depressed: self.state.serialize_mods(xkb::STATE_MODS_DEPRESSED),
            latched: self.state.serialize_mods(xkb::STATE_MODS_LATCHED),
            locked: self.state.serialize_mods(xkb::STATE_MODS_LOCKED),
        };
    }

    fn update_consumed_modifiers(&mut self, key: u32) {
        let keycode = Keycode::from(key + EVDEV_OFFSET);
        let mut mods = Modifiers::empty();
        if self.mod_consumed(keycode, self.shift_mod) {
            mods |= Modifiers::SHIFT;
        }
        if self.mod_consumed(keycode, self.ctrl_mod) {
            mods |= Modifiers::CTRL;
        }
        if self.mod_consumed(keycode, self.alt_mod) {
            mods |= Modifiers::ALT;
        }
        if self.mod_consumed(keycode, self.meta_mod) {
            mods |= Modifiers::LOGO;
        }
        self.consumed_modifiers = mods;
    }

    fn mod_active(&self, idx: ModIndex, component: xkb::StateComponent) -> bool {
        idx != xkb::MOD_INVALID && self.state.mod_index_is_active(idx, component)
    }

    fn mod_consumed(&mut self, key: Keycode, idx: ModIndex) -> bool {
        idx != xkb::MOD_INVALID && self.state.mod_index_is_consumed(key, idx)
    }

    /// All currently effective modifiers.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// The modifiers that should count towards global shortcut matching:
    /// whatever is active minus whatever the translation of the last key
    /// consumed. Shift held to type an uppercase letter is consumed and is
    /// therefore not reported; Shift+F5 reports Shift.
    pub fn modifiers_for_shortcuts(&self) -> Modifiers {
        self.modifiers & !self.consumed_modifiers
    }

    pub fn modifier_state(&self) -> ModifierState {
        self.modifier_state
    }

    pub fn leds(&self) -> Leds {
        self.leds
    }

    /// The keysym of the most recent key fed to [`Xkb::update_key`].
    pub fn keysym(&self) -> Keysym {
        self.keysym
    }

    /// Translates a raw key to its keysym under the current state.
    pub fn to_keysym(&self, key: u32) -> Keysym {
        self.state.key_get_one_sym(Keycode::from(key + EVDEV_OFFSET))
    }

    /// UTF-8 text produced by pressing the raw key under the current state.
    pub fn key_text(&self, key: u32) -> String {
        self.state.key_get_utf8(Keycode::from(key + EVDEV_OFFSET))
    }

    /// The character for a keysym, if it maps to one.
    pub fn to_char(&self, keysym: Keysym) -> Option<char> {
        keysym.key_char()
    }

    pub fn should_key_repeat(&self, key: u32) -> bool {
        self.keymap.key_repeats(Keycode::from(key + EVDEV_OFFSET))
    }

    pub fn number_of_layouts(&self) -> u32 {
        self.keymap.num_layouts()
    }

    pub fn current_layout(&self) -> LayoutIndex {
        self.current_layout
    }

    pub fn layout_name_of(&self, layout: LayoutIndex) -> String {
        self.keymap.layout_get_name(layout).to_string()
    }

    pub fn layout_name(&self) -> String {
        self.layout_name_of(self.current_layout)
    }

    pub fn layout_short_name(&self, index: usize) -> Option<&str> {
        self.layout_list.get(index).map(String::as_str)
    }

    /// Switches the effective layout, preserving the modifier masks. Out of
    /// range indices are a no-op and return false.
    pub fn switch_to_layout(&mut self, layout: LayoutIndex) -> bool {
        if layout >= self.number_of_layouts() {
            return false;
        }
        let depressed = self.state.serialize_mods(xkb::STATE_MODS_DEPRESSED);
        let latched = self.state.serialize_mods(xkb::STATE_MODS_LATCHED);
        let locked = self.state.serialize_mods(xkb::STATE_MODS_LOCKED);
        self.state.update_mask(depressed, latched, locked, 0, 0, layout);
        self.update_modifiers();
        true
    }

    pub fn switch_to_next_layout(&mut self) {
        let layouts = self.number_of_layouts();
        if layouts == 0 {
            return;
        }
        self.switch_to_layout((self.current_layout + 1) % layouts);
    }

    pub fn switch_to_previous_layout(&mut self) {
        let layouts = self.number_of_layouts();
        if layouts == 0 {
            return;
        }
        let previous = if self.current_layout == 0 {
            layouts - 1
        } else {
            self.current_layout - 1
        };
        self.switch_to_layout(previous);
    }

    /// The compiled keymap as text, the form a seat hands out to clients.
    pub fn keymap_string(&self) -> String {
        self.keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1)
    }

    /// Finds a raw key (and shift level) that produces the given keysym on
    /// the active layout.
    pub fn keycode_from_keysym(&self, keysym: Keysym) -> Option<(u32, u32)> {
        let layout = self.state.serialize_layout(xkb::STATE_LAYOUT_EFFECTIVE);
        let min = self.keymap.min_keycode().raw();
        let max = self.keymap.max_keycode().raw();
        for raw in min..max {
            let keycode = Keycode::from(raw);
            let levels = self.keymap.num_levels_for_key(keycode, layout);
            for level in 0..levels {
                let syms = self.keymap.key_get_syms_by_level(keycode, layout, level);
                if syms.contains(&keysym) {
                    return Some((raw - EVDEV_OFFSET, level));
                }
            }
        }
        None
    }
}

fn keymap_from_names(context: &xkb::Context, rules: &KeymapRules) -> Option<xkb::Keymap> {
    xkb::Keymap::new_from_names(
        context,
        &rules.rules,
        &rules.model,
        &rules.layout,
        &rules.variant,
        rules.options.clone(),
        xkb::KEYMAP_COMPILE_NO_FLAGS,
    )
}

fn layout_list_of(layout: &str) -> Vec<String> {
    layout
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compiled when neither the configured nor the environment rule names
/// produce a keymap, and by the hermetic tests. US layout, two shift levels,
/// the common modifiers and lock LEDs.
pub const FALLBACK_KEYMAP: &str = r#"xkb_keymap {
  xkb_keycodes "fallback" {
    minimum = 8;
    maximum = 255;
    <ESC>  = 9;
    <AE01> = 10;  <AE02> = 11;  <AE03> = 12;  <AE04> = 13;  <AE05> = 14;
    <AE06> = 15;  <AE07> = 16;  <AE08> = 17;  <AE09> = 18;  <AE10> = 19;
    <AD01> = 24;  <AD02> = 25;  <AD03> = 26;  <AD04> = 27;  <AD05> = 28;
    <AD06> = 29;  <AD07> = 30;  <AD08> = 31;  <AD09> = 32;  <AD10> = 33;
    <RTRN> = 36;
    <LCTL> = 37;
    <AC01> = 38;  <AC02> = 39;  <AC03> = 40;  <AC04> = 41;  <AC05> = 42;
    <AC06> = 43;  <AC07> = 44;  <AC08> = 45;  <AC09> = 46;
    <LFSH> = 50;
    <AB01> = 52;  <AB02> = 53;  <AB03> = 54;  <AB04> = 55;  <AB05> = 56;
    <AB06> = 57;  <AB07> = 58;
    <RTSH> = 62;
    <LALT> = 64;
    <SPCE> = 65;
    <CAPS> = 66;
    <FK01> = 67;  <FK02> = 68;  <FK03> = 69;  <FK04> = 70;  <FK05> = 71;
    <FK06> = 72;  <FK07> = 73;  <FK08> = 74;  <FK09> = 75;  <FK10> = 76;
    <NMLK> = 77;
    <SCLK> = 78;
    <UP>   = 111;
    <LEFT> = 113;
    <RGHT> = 114;
    <DOWN> = 116;
    <LWIN> = 133;
    indicator 1 = "Caps Lock";
    indicator 2 = "Num Lock";
    indicator 3 = "Scroll Lock";
  };
  xkb_types "fallback" {
    type "ONE_LEVEL" {
      modifiers = none;
      map[none] = Level1;
      level_name[Level1] = "Any";
    };
    type "TWO_LEVEL" {
      modifiers = Shift;
      map[Shift] = Level2;
      level_name[Level1] = "Base";
      level_name[Level2] = "Shift";
    };
    type "ALPHABETIC" {
      modifiers = Shift+Lock;
      map[Shift] = Level2;
      map[Lock] = Level2;
      level_name[Level1] = "Base";
      level_name[Level2] = "Caps";
    };
  };
  xkb_compatibility "fallback" {
    virtual_modifiers NumLock,ScrollLock;
    interpret Caps_Lock+AnyOfOrNone(all) {
      action = LockMods(modifiers=Lock);
    };
    interpret Num_Lock+AnyOfOrNone(all) {
      virtualModifier = NumLock;
      action = LockMods(modifiers=NumLock);
    };
    interpret Scroll_Lock+AnyOfOrNone(all) {
      virtualModifier = ScrollLock;
      action = LockMods(modifiers=ScrollLock);
    };
    interpret Any+AnyOf(all) {
      action = SetMods(modifiers=modMapMods,clearLocks);
    };
    indicator "Caps Lock" { modifiers = Lock; };
    indicator "Num Lock" { modifiers = NumLock; };
    indicator "Scroll Lock" { modifiers = ScrollLock; };
  };
  xkb_symbols "fallback" {
    key <ESC>  { [ Escape ] };
    key <AE01> { [ 1, exclam ] };
    key <AE02> { [ 2, at ] };
    key <AE03> { [ 3, numbersign ] };
    key <AE04> { [ 4, dollar ] };
    key <AE05> { [ 5, percent ] };
    key <AE06> { [ 6, asciicircum ] };
    key <AE07> { [ 7, ampersand ] };
    key <AE08> { [ 8, asterisk ] };
    key <AE09> { [ 9, parenleft ] };
    key <AE10> { [ 0, parenright ] };
    key <AD01> { type = "ALPHABETIC", [ q, Q ] };
    key <AD02> { type = "ALPHABETIC", [ w, W ] };
    key <AD03> { type = "ALPHABETIC", [ e, E ] };
    key <AD04> { type = "ALPHABETIC", [ r, R ] };
    key <AD05> { type = "ALPHABETIC", [ t, T ] };
    key <AD06> { type = "ALPHABETIC", [ y, Y ] };
    key <AD07> { type = "ALPHABETIC", [ u, U ] };
    key <AD08> { type = "ALPHABETIC", [ i, I ] };
    key <AD09> { type = "ALPHABETIC", [ o, O ] };
    key <AD10> { type = "ALPHABETIC", [ p, P ] };
    key <RTRN> { [ Return ] };
    key <LCTL> { [ Control_L ] };
    key <AC01> { type = "ALPHABETIC", [ a, A ] };
    key <AC02> { type = "ALPHABETIC", [ s, S ] };
    key <AC03> { type = "ALPHABETIC", [ d, D ] };
    key <AC04> { type = "ALPHABETIC", [ f, F ] };
    key <AC05> { type = "ALPHABETIC", [ g, G ] };
    key <AC06> { type = "ALPHABETIC", [ h, H ] };
    key <AC07> { type = "ALPHABETIC", [ j, J ] };
    key <AC08> { type = "ALPHABETIC", [ k, K ] };
    key <AC09> { type = "ALPHABETIC", [ l, L ] };
    key <LFSH> { [ Shift_L ] };
    key <AB01> { type = "ALPHABETIC", [ z, Z ] };
    key <AB02> { type = "ALPHABETIC", [ x, X ] };
    key <AB03> { type = "ALPHABETIC", [ c, C ] };
    key <AB04> { type = "ALPHABETIC", [ v, V ] };
    key <AB05> { type = "ALPHABETIC", [ b, B ] };
    key <AB06> { type = "ALPHABETIC", [ n, N ] };
    key <AB07> { type = "ALPHABETIC", [ m, M ] };
    key <RTSH> { [ Shift_R ] };
    key <LALT> { [ Alt_L ] };
    key <SPCE> { [ space ] };
    key <CAPS> { [ Caps_Lock ] };
    key <FK01> { [ F1 ] };
    key <FK02> { [ F2 ] };
    key <FK03> { [ F3 ] };
    key <FK04> { [ F4 ] };
    key <FK05> { [ F5 ] };
    key <FK06> { [ F6 ] };
    key <FK07> { [ F7 ] };
    key <FK08> { [ F8 ] };
    key <FK09> { [ F9 ] };
    key <FK10> { [ F10 ] };
    key <NMLK> { [ Num_Lock ] };
    key <SCLK> { [ Scroll_Lock ] };
    key <UP>   { [ Up ] };
    key <LEFT> { [ Left ] };
    key <RGHT> { [ Right ] };
    key <DOWN> { [ Down ] };
    key <LWIN> { [ Super_L ] };
    modifier_map Shift { <LFSH>, <RTSH> };
    modifier_map Lock { <CAPS> };
    modifier_map Control { <LCTL> };
    modifier_map Mod1 { <LALT> };
    modifier_map Mod2 { <NMLK> };
    modifier_map Mod4 { <LWIN> };
  };
};
"#;

#[cfg(test)]
mod tests {
    use super::*;

    // Linux evdev codes used by the fallback keymap.
    const KEY_W: u32 = 17;
    const KEY_LEFTSHIFT: u32 = 42;
    const KEY_F5: u32 = 63;
    const KEY_CAPSLOCK: u32 = 58;

    fn xkb() -> Xkb {
        Xkb::from_keymap_string(FALLBACK_KEYMAP).expect("fallback keymap compiles")
    }

    #[test]
    fn fallback_keymap_compiles() {
        let xkb = xkb();
        assert_eq!(xkb.number_of_layouts(), 1);
        assert_eq!(xkb.current_layout(), 0);
    }

    #[test]
    fn plain_letter_has_no_shortcut_modifiers() {
        let mut xkb = xkb();
        xkb.update_key(KEY_W, KeyState::Pressed);
        assert_eq!(xkb.keysym(), Keysym::w);
        assert_eq!(xkb.modifiers_for_shortcuts(), Modifiers::empty());
        xkb.update_key(KEY_W, KeyState::Released);
    }

    #[test]
    fn shift_consumed_by_letter_is_not_shortcut_relevant() {
        let mut xkb = xkb();
        xkb.update_key(KEY_LEFTSHIFT, KeyState::Pressed);
        assert!(xkb.modifiers().contains(Modifiers::SHIFT));

        xkb.update_key(KEY_W, KeyState::Pressed);
        assert_eq!(xkb.keysym(), Keysym::W);
        assert!(!xkb.modifiers_for_shortcuts().contains(Modifiers::SHIFT));

        xkb.update_key(KEY_W, KeyState::Released);
        xkb.update_key(KEY_LEFTSHIFT, KeyState::Released);
    }

    #[test]
    fn shift_with_function_key_is_shortcut_relevant() {
        let mut xkb = xkb();
        xkb.update_key(KEY_LEFTSHIFT, KeyState::Pressed);
        xkb.update_key(KEY_F5, KeyState::Pressed);
        assert_eq!(xkb.keysym(), Keysym::F5);
        assert!(xkb.modifiers_for_shortcuts().contains(Modifiers::SHIFT));
    }

    #[test]
    fn caps_lock_drives_led() {
        let mut xkb = xkb();
        assert_eq!(xkb.leds(), Leds::empty());
        xkb.update_key(KEY_CAPSLOCK, KeyState::Pressed);
        xkb.update_key(KEY_CAPSLOCK, KeyState::Released);
        assert!(xkb.leds().contains(Leds::CAPS_LOCK));
        // Toggling it off clears the LED again.
        xkb.update_key(KEY_CAPSLOCK, KeyState::Pressed);
        xkb.update_key(KEY_CAPSLOCK, KeyState::Released);
        assert!(!xkb.leds().contains(Leds::CAPS_LOCK));
    }

    #[test]
    fn layout_switch_out_of_range_is_a_noop() {
        let mut xkb = xkb();
        assert!(!xkb.switch_to_layout(5));
        assert_eq!(xkb.current_layout(), 0);
    }

    #[test]
    fn switching_to_current_layout_is_idempotent() {
        let mut xkb = xkb();
        assert!(xkb.switch_to_layout(0));
        assert_eq!(xkb.current_layout(), 0);
    }

    #[test]
    fn next_and_previous_layout_wrap() {
        // Single-layout keymap: next/previous always land back on 0.
        let mut xkb = xkb();
        xkb.switch_to_next_layout();
        assert_eq!(xkb.current_layout(), 0);
        xkb.switch_to_previous_layout();
        assert_eq!(xkb.current_layout(), 0);
    }

    #[test]
    fn repeat_does_not_change_modifier_state() {
        let mut xkb = xkb();
        xkb.update_key(KEY_LEFTSHIFT, KeyState::Pressed);
        let before = xkb.modifier_state();
        xkb.update_key(KEY_W, KeyState::Pressed);
        xkb.update_key(KEY_W, KeyState::Repeated);
        xkb.update_key(KEY_W, KeyState::Released);
        assert_eq!(xkb.modifier_state().depressed, before.depressed);
    }

    #[test]
    fn key_text_and_chars() {
        let mut xkb = xkb();
        assert_eq!(xkb.key_text(KEY_W), "w");
        xkb.update_key(KEY_LEFTSHIFT, KeyState::Pressed);
        assert_eq!(xkb.key_text(KEY_W), "W");
        assert_eq!(xkb.to_char(Keysym::W), Some('W'));
        assert_eq!(xkb.to_char(Keysym::F5), None);
    }

    #[test]
    fn keycode_lookup_round_trips() {
        let xkb = xkb();
        let (key, level) = xkb.keycode_from_keysym(Keysym::w).expect("w is mapped");
        assert_eq!(key, KEY_W);
        assert_eq!(level, 0);
        let (key, level) = xkb.keycode_from_keysym(Keysym::W).expect("W is mapped");
        assert_eq!(key, KEY_W);
        assert_eq!(level, 1);
        assert!(xkb.keycode_from_keysym(Keysym::ydiaeresis).is_none());
    }

    #[test]
    fn numlock_policy_applies_at_startup() {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_string(
            &context,
            FALLBACK_KEYMAP.to_string(),
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .unwrap();
        let xkb = Xkb::from_parts(context, keymap, Vec::new(), NumLockPolicy::On).unwrap();
        assert!(xkb.leds().contains(Leds::NUM_LOCK));
    }

    #[test]
    fn keymap_serialization_is_reloadable() {
        let xkb = xkb();
        let serialized = xkb.keymap_string();
        assert!(serialized.contains("xkb_keymap"));
        assert!(Xkb::from_keymap_string(&serialized).is_ok());
    }
}
