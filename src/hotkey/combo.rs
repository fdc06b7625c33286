//! Hotkey combo model.
//!
//! A combo is a set of logical *roles* (Ctrl, Shift), each satisfied by any
//! of several physical keys — holding left Ctrl and right Shift activates
//! Ctrl+Shift just as well as the left-hand pair.

use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// A logical modifier role in the combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Ctrl,
    Shift,
}

// ---------------------------------------------------------------------------
// HotkeyCombo
// ---------------------------------------------------------------------------

/// The push-to-talk chord: every role must be held by at least one of its
/// physical keys, simultaneously, for the combo to be active.
#[derive(Debug, Clone)]
pub struct HotkeyCombo {
    roles: Vec<(Role, Vec<rdev::Key>)>,
}

impl HotkeyCombo {
    /// The default Ctrl+Shift chord, accepting left or right variants of
    /// both modifiers.
    pub fn ctrl_shift() -> Self {
        Self {
            roles: vec![
                (Role::Ctrl, vec![rdev::Key::ControlLeft, rdev::Key::ControlRight]),
                (Role::Shift, vec![rdev::Key::ShiftLeft, rdev::Key::ShiftRight]),
            ],
        }
    }

    /// The physical keys that satisfy `role` (empty for roles not in the
    /// combo).
    pub fn keys_for(&self, role: Role) -> &[rdev::Key] {
        self.roles
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, keys)| keys.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `pressed` satisfies every role of the combo.
    pub fn is_satisfied(&self, pressed: &HashSet<rdev::Key>) -> bool {
        self.roles
            .iter()
            .all(|(_, keys)| keys.iter().any(|k| pressed.contains(k)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed(keys: &[rdev::Key]) -> HashSet<rdev::Key> {
        keys.iter().copied().collect()
    }

    #[test]
    fn any_physical_variant_satisfies_a_role() {
        let combo = HotkeyCombo::ctrl_shift();
        assert!(combo.is_satisfied(&pressed(&[rdev::Key::ControlLeft, rdev::Key::ShiftLeft])));
        assert!(combo.is_satisfied(&pressed(&[rdev::Key::ControlRight, rdev::Key::ShiftLeft])));
        assert!(combo.is_satisfied(&pressed(&[rdev::Key::ControlLeft, rdev::Key::ShiftRight])));
    }

    #[test]
    fn one_role_alone_is_not_enough() {
        let combo = HotkeyCombo::ctrl_shift();
        assert!(!combo.is_satisfied(&pressed(&[rdev::Key::ControlLeft])));
        assert!(!combo.is_satisfied(&pressed(&[rdev::Key::ShiftLeft, rdev::Key::ShiftRight])));
        assert!(!combo.is_satisfied(&pressed(&[])));
    }

    #[test]
    fn unrelated_keys_do_not_interfere() {
        let combo = HotkeyCombo::ctrl_shift();
        assert!(combo.is_satisfied(&pressed(&[
            rdev::Key::ControlLeft,
            rdev::Key::ShiftLeft,
            rdev::Key::KeyA,
        ])));
        assert!(!combo.is_satisfied(&pressed(&[rdev::Key::KeyA, rdev::Key::KeyB])));
    }

    #[test]
    fn keys_for_lists_role_variants() {
        let combo = HotkeyCombo::ctrl_shift();
        assert_eq!(combo.keys_for(Role::Ctrl).len(), 2);
        assert_eq!(combo.keys_for(Role::Shift).len(), 2);
    }
}
