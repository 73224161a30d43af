use xkbcommon::xkb::Keysym;

use crate::event::{KeyState, Leds, Modifiers};
use crate::xkb::Xkb;

/// Outcome of feeding one key transition through the xkb state machine,
/// everything needed to assemble a `KeyboardKeyEvent`.
#[derive(Debug)]
pub struct KeyTranslation {
    pub keysym: Keysym,
    pub text: String,
    pub modifiers: Modifiers,
    pub modifiers_for_shortcuts: Modifiers,
    pub leds: Leds,
}

/// Keyboard redirection façade: owns the xkb state machine and produces key
/// translations for the dispatch layer.
pub struct KeyboardRedirection {
    xkb: Xkb,
}

impl KeyboardRedirection {
    pub fn new(xkb: Xkb) -> Self {
        Self { xkb }
    }

    pub fn xkb(&self) -> &Xkb {
        &self.xkb
    }

    pub fn xkb_mut(&mut self) -> &mut Xkb {
        &mut self.xkb
    }

    pub fn modifiers(&self) -> Modifiers {
        self.xkb.modifiers()
    }

    /// Feeds the key into xkb and returns the translation for the event.
    pub fn update_key(&mut self, key: u32, state: KeyState) -> KeyTranslation {
        self.xkb.update_key(key, state);
        let text = match state {
            KeyState::Pressed | KeyState::Repeated => self.xkb.key_text(key),
            KeyState::Released => String::new(),
        };
        KeyTranslation {
            keysym: self.xkb.keysym(),
            text,
            modifiers: self.xkb.modifiers(),
            modifiers_for_shortcuts: self.xkb.modifiers_for_shortcuts(),
            leds: self.xkb.leds(),
        }
    }

    pub fn should_key_repeat(&self, key: u32) -> bool {
        self.xkb.should_key_repeat(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xkb::FALLBACK_KEYMAP;

    const KEY_A: u32 = 30;
    const KEY_LEFTSHIFT: u32 = 42;

    fn keyboard() -> KeyboardRedirection {
        KeyboardRedirection::new(Xkb::from_keymap_string(FALLBACK_KEYMAP).unwrap())
    }

    #[test]
    fn translation_carries_text_and_modifiers() {
        let mut keyboard = keyboard();
        let translation = keyboard.update_key(KEY_LEFTSHIFT, KeyState::Pressed);
        assert!(translation.modifiers.contains(Modifiers::SHIFT));
        assert!(translation.text.is_empty());

        let translation = keyboard.update_key(KEY_A, KeyState::Pressed);
        assert_eq!(translation.text, "A");
        assert_eq!(translation.keysym, Keysym::A);
    }

    #[test]
    fn release_produces_no_text() {
        let mut keyboard = keyboard();
        keyboard.update_key(KEY_A, KeyState::Pressed);
        let translation = keyboard.update_key(KEY_A, KeyState::Released);
        assert!(translation.text.is_empty());
    }

    #[test]
    fn shortcut_modifiers_follow_consumption() {
        let mut keyboard = keyboard();
        keyboard.update_key(KEY_LEFTSHIFT, KeyState::Pressed);
        let translation = keyboard.update_key(KEY_A, KeyState::Pressed);
        assert!(translation.modifiers.contains(Modifiers::SHIFT));
        assert!(!translation.modifiers_for_shortcuts.contains(Modifiers::SHIFT));
    }
}
