//! Key and modifier definitions for hotkey combinations
//!
//! Provides the modifier bitmask shared by every backend and the set of
//! named keys a binding can use, with their per-platform key codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Modifier bit masks, matching the Win32 `MOD_*` layout
pub mod flags {
    /// Alt / Option key
    pub const ALT: u8 = 0x01;
    /// Control key
    pub const CTRL: u8 = 0x02;
    /// Shift key
    pub const SHIFT: u8 = 0x04;
    /// Windows / Command / Super key
    pub const META: u8 = 0x08;
}

/// Which modifier keys must be held for a combination to fire
///
/// Persisted as its bitmask so settings files stay compact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Modifiers {
    /// Alt / Option is held
    pub alt: bool,
    /// Control is held
    pub ctrl: bool,
    /// Shift is held
    pub shift: bool,
    /// Windows / Command / Super is held
    pub meta: bool,
}

impl Modifiers {
    /// Build a modifier set from a bitmask, ignoring unknown bits
    pub fn from_mask(mask: u8) -> Self {
        Self {
            alt: mask & flags::ALT != 0,
            ctrl: mask & flags::CTRL != 0,
            shift: mask & flags::SHIFT != 0,
            meta: mask & flags::META != 0,
        }
    }

    /// The bitmask form of this modifier set
    pub fn mask(&self) -> u8 {
        let mut mask = 0;
        if self.alt {
            mask |= flags::ALT;
        }
        if self.ctrl {
            mask |= flags::CTRL;
        }
        if self.shift {
            mask |= flags::SHIFT;
        }
        if self.meta {
            mask |= flags::META;
        }
        mask
    }

    /// Check if no modifier is required
    pub fn is_empty(&self) -> bool {
        !self.alt && !self.ctrl && !self.shift && !self.meta
    }
}

impl From<u8> for Modifiers {
    fn from(mask: u8) -> Self {
        Self::from_mask(mask)
    }
}

impl From<Modifiers> for u8 {
    fn from(modifiers: Modifiers) -> Self {
        modifiers.mask()
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.ctrl, "Ctrl"),
            (self.alt, "Alt"),
            (self.shift, "Shift"),
            (self.meta, "Win"),
        ]
        .into_iter()
        .filter_map(|(held, name)| held.then_some(name))
        .collect();
        write!(f, "{}", names.join(" + "))
    }
}

macro_rules! key_codes {
    ($( $name:ident => vk $vk:expr, mac $mac:expr, sym $sym:expr; )+) => {
        /// Keys that can be bound to a hotkey
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum KeyCode {
            $( $name, )+
        }

        impl KeyCode {
            /// Every bindable key, in declaration order
            pub const ALL: &'static [KeyCode] = &[ $( KeyCode::$name, )+ ];

            /// Win32 virtual-key code
            pub fn virtual_key(self) -> u32 {
                match self {
                    $( KeyCode::$name => $vk, )+
                }
            }

            /// macOS virtual key code (`kVK_*`)
            pub fn mac_keycode(self) -> u16 {
                match self {
                    $( KeyCode::$name => $mac, )+
                }
            }

            /// X11 keysym
            pub fn keysym(self) -> u32 {
                match self {
                    $( KeyCode::$name => $sym, )+
                }
            }

            /// Name used in settings files and display text
            pub fn name(self) -> &'static str {
                match self {
                    $( KeyCode::$name => stringify!($name), )+
                }
            }
        }
    };
}

key_codes! {
    A => vk 0x41, mac 0x00, sym 0x61;
    B => vk 0x42, mac 0x0B, sym 0x62;
    C => vk 0x43, mac 0x08, sym 0x63;
    D => vk 0x44, mac 0x02, sym 0x64;
    E => vk 0x45, mac 0x0E, sym 0x65;
    F => vk 0x46, mac 0x03, sym 0x66;
    G => vk 0x47, mac 0x05, sym 0x67;
    H => vk 0x48, mac 0x04, sym 0x68;
    I => vk 0x49, mac 0x22, sym 0x69;
    J => vk 0x4A, mac 0x26, sym 0x6A;
    K => vk 0x4B, mac 0x28, sym 0x6B;
    L => vk 0x4C, mac 0x25, sym 0x6C;
    M => vk 0x4D, mac 0x2E, sym 0x6D;
    N => vk 0x4E, mac 0x2D, sym 0x6E;
    O => vk 0x4F, mac 0x1F, sym 0x6F;
    P => vk 0x50, mac 0x23, sym 0x70;
    Q => vk 0x51, mac 0x0C, sym 0x71;
    R => vk 0x52, mac 0x0F, sym 0x72;
    S => vk 0x53, mac 0x01, sym 0x73;
    T => vk 0x54, mac 0x11, sym 0x74;
    U => vk 0x55, mac 0x20, sym 0x75;
    V => vk 0x56, mac 0x09, sym 0x76;
    W => vk 0x57, mac 0x0D, sym 0x77;
    X => vk 0x58, mac 0x07, sym 0x78;
    Y => vk 0x59, mac 0x10, sym 0x79;
    Z => vk 0x5A, mac 0x06, sym 0x7A;
    D0 => vk 0x30, mac 0x1D, sym 0x30;
    D1 => vk 0x31, mac 0x12, sym 0x31;
    D2 => vk 0x32, mac 0x13, sym 0x32;
    D3 => vk 0x33, mac 0x14, sym 0x33;
    D4 => vk 0x34, mac 0x15, sym 0x34;
    D5 => vk 0x35, mac 0x17, sym 0x35;
    D6 => vk 0x36, mac 0x16, sym 0x36;
    D7 => vk 0x37, mac 0x1A, sym 0x37;
    D8 => vk 0x38, mac 0x1C, sym 0x38;
    D9 => vk 0x39, mac 0x19, sym 0x39;
    F1 => vk 0x70, mac 0x7A, sym 0xFFBE;
    F2 => vk 0x71, mac 0x78, sym 0xFFBF;
    F3 => vk 0x72, mac 0x63, sym 0xFFC0;
    F4 => vk 0x73, mac 0x76, sym 0xFFC1;
    F5 => vk 0x74, mac 0x60, sym 0xFFC2;
    F6 => vk 0x75, mac 0x61, sym 0xFFC3;
    F7 => vk 0x76, mac 0x62, sym 0xFFC4;
    F8 => vk 0x77, mac 0x64, sym 0xFFC5;
    F9 => vk 0x78, mac 0x65, sym 0xFFC6;
    F10 => vk 0x79, mac 0x6D, sym 0xFFC7;
    F11 => vk 0x7A, mac 0x67, sym 0xFFC8;
    F12 => vk 0x7B, mac 0x6F, sym 0xFFC9;
    Space => vk 0x20, mac 0x31, sym 0x20;
}

impl KeyCode {
    /// Look up a key by its settings name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_modifiers() {
        let modifiers = Modifiers::default();
        assert!(modifiers.is_empty());
        assert_eq!(modifiers.mask(), 0);
    }

    #[test]
    fn test_mask_matches_win32_layout() {
        let modifiers = Modifiers {
            alt: true,
            ctrl: true,
            shift: false,
            meta: true,
        };
        assert_eq!(modifiers.mask(), 0x01 | 0x02 | 0x08);
        assert_eq!(Modifiers::from_mask(0x0B), modifiers);
    }

    #[test]
    fn test_unknown_mask_bits_ignored() {
        let modifiers = Modifiers::from_mask(0xF4);
        assert!(modifiers.shift);
        assert!(!modifiers.ctrl);
        assert_eq!(modifiers.mask(), flags::SHIFT);
    }

    #[test]
    fn test_modifiers_serialize_as_mask() {
        let modifiers = Modifiers {
            ctrl: true,
            shift: true,
            ..Modifiers::default()
        };
        assert_eq!(serde_json::to_string(&modifiers).unwrap(), "6");
        let parsed: Modifiers = serde_json::from_str("6").unwrap();
        assert_eq!(parsed, modifiers);
    }

    #[test]
    fn test_modifier_display() {
        let modifiers = Modifiers {
            ctrl: true,
            alt: true,
            ..Modifiers::default()
        };
        assert_eq!(modifiers.to_string(), "Ctrl + Alt");
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(KeyCode::A.virtual_key(), 0x41);
        assert_eq!(KeyCode::D7.virtual_key(), 0x37);
        assert_eq!(KeyCode::F12.virtual_key(), 0x7B);
        assert_eq!(KeyCode::Space.keysym(), 0x20);
        assert_eq!(KeyCode::F1.keysym(), 0xFFBE);
        assert_eq!(KeyCode::ALL.len(), 49);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(KeyCode::from_name("F5"), Some(KeyCode::F5));
        assert_eq!(KeyCode::from_name("D0"), Some(KeyCode::D0));
        assert_eq!(KeyCode::from_name("Escape"), None);
        assert_eq!(serde_json::to_string(&KeyCode::Q).unwrap(), "\"Q\"");
    }
}
