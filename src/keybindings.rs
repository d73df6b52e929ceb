use std::collections::HashMap;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════
// KEYBINDINGS SYSTEM
// ═══════════════════════════════════════════════════════════════════════════

/// A single key combination: modifier flags plus a letter/digit key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Always stored upper-case.
    pub key: char,
}

impl KeyCombo {
    pub fn new(ctrl: bool, shift: bool, alt: bool, key: char) -> Self {
        Self { ctrl, shift, alt, key: key.to_ascii_uppercase() }
    }
    pub fn key(k: char) -> Self {
        Self::new(false, false, false, k)
    }
    pub fn ctrl_key(k: char) -> Self {
        Self::new(true, false, false, k)
    }
    pub fn ctrl_shift_key(k: char) -> Self {
        Self::new(true, true, false, k)
    }

    /// Human-readable display string
    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("Ctrl".to_string()); }
        if self.shift { parts.push("Shift".to_string()); }
        if self.alt { parts.push("Alt".to_string()); }
        parts.push(self.key.to_string());
        parts.join("+")
    }

    /// Serialize to config string
    pub fn to_config_string(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("ctrl".to_string()); }
        if self.shift { parts.push("shift".to_string()); }
        if self.alt { parts.push("alt".to_string()); }
        parts.push(format!("key:{}", self.key));
        parts.join("+")
    }

    /// Deserialize from config string
    pub fn from_config_string(s: &str) -> Option<Self> {
        let (mut ctrl, mut shift, mut alt) = (false, false, false);
        let mut key = None;
        for part in s.split('+') {
            let part = part.trim();
            match part {
                "ctrl" => ctrl = true,
                "shift" => shift = true,
                "alt" => alt = true,
                _ => {
                    if let Some(name) = part.strip_prefix("key:") {
                        let mut chars = name.chars();
                        if let (Some(c), None) = (chars.next(), chars.next()) {
                            if c.is_ascii_alphanumeric() {
                                key = Some(c);
                            }
                        }
                    }
                }
            }
        }
        key.map(|k| Self::new(ctrl, shift, alt, k))
    }

    /// Exact match, letters compared case-insensitively.
    pub fn matches(&self, pressed: &KeyCombo) -> bool {
        self.ctrl == pressed.ctrl
            && self.shift == pressed.shift
            && self.alt == pressed.alt
            && self.key.eq_ignore_ascii_case(&pressed.key)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Actions reachable from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindableAction {
    Undo,
    Redo,
    /// Second redo chord (ctrl+shift+Z by default).
    RedoAlt,
}

impl BindableAction {
    pub fn all() -> &'static [BindableAction] {
        &[BindableAction::Undo, BindableAction::Redo, BindableAction::RedoAlt]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Undo" => Some(BindableAction::Undo),
            "Redo" => Some(BindableAction::Redo),
            "RedoAlt" => Some(BindableAction::RedoAlt),
            _ => None,
        }
    }
}

/// What a resolved shortcut asks the session to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShortcutAction {
    Undo,
    Redo,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyBindings {
    bindings: HashMap<BindableAction, KeyCombo>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let mut map = HashMap::new();
        map.insert(BindableAction::Undo, KeyCombo::ctrl_key('Z'));
        map.insert(BindableAction::Redo, KeyCombo::ctrl_key('Y'));
        map.insert(BindableAction::RedoAlt, KeyCombo::ctrl_shift_key('Z'));
        Self { bindings: map }
    }
}

impl KeyBindings {
    pub fn get(&self, action: BindableAction) -> Option<&KeyCombo> {
        self.bindings.get(&action)
    }

    pub fn set(&mut self, action: BindableAction, combo: KeyCombo) {
        self.bindings.insert(action, combo);
    }

    /// Serialize all bindings for config file
    pub fn to_config_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for action in BindableAction::all() {
            if let Some(combo) = self.bindings.get(action) {
                lines.push(format!("keybind.{:?}={}", action, combo.to_config_string()));
            }
        }
        lines
    }

    /// Load a single keybind line from config. Unknown actions and malformed
    /// combos leave the current binding in place.
    pub fn load_config_line(&mut self, action_name: &str, combo_str: &str) {
        if let Some(action) = BindableAction::from_name(action_name) {
            if let Some(combo) = KeyCombo::from_config_string(combo_str) {
                self.bindings.insert(action, combo);
            }
        }
    }

    /// Map a pressed combination to undo/redo. Undo is checked first so an
    /// override that collides with a redo chord resolves to undo.
    pub fn resolve(&self, pressed: &KeyCombo) -> Option<ShortcutAction> {
        let hit = |action| self.bindings.get(&action).is_some_and(|c| c.matches(pressed));
        if hit(BindableAction::Undo) {
            Some(ShortcutAction::Undo)
        } else if hit(BindableAction::Redo) || hit(BindableAction::RedoAlt) {
            Some(ShortcutAction::Redo)
        } else {
            None
        }
    }
}
