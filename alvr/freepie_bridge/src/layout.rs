use alvr_common::once_cell::sync::Lazy;
use std::collections::HashMap;

/// Identifies a snapshot written by a compatible host. Any other value in the
/// signature slot means the input half is stale or foreign and is ignored.
pub const TRACKING_SIGNATURE: u32 = 0x11223344;

// Input half, written by the host. Absolute offsets, little-endian.
pub const INPUT_SIGNATURE_OFFSET: usize = 0;
pub const INPUT_RESERVED_OFFSET: usize = 4;
pub const INPUT_HEAD_ORIENTATION_OFFSET: usize = 8;
pub const INPUT_CONTROLLER_ORIENTATION_OFFSET: usize = 32;
pub const INPUT_HEAD_POSITION_OFFSET: usize = 56;
pub const INPUT_CONTROLLER_POSITION_OFFSET: usize = 80;
pub const INPUT_TRACKPAD_OFFSET: usize = 104;
pub const INPUT_BUTTONS_OFFSET: usize = 120;
pub const INPUT_END: usize = 124;

// Output half, written by the bridge. It starts right after the signature and
// aliases the input field slots; ownership of the overlap is time-sliced under
// the gate, which is why decode must always run before encode.
pub const OUTPUT_BASE: usize = 4;
pub const OUTPUT_FLAGS_OFFSET: usize = OUTPUT_BASE;
pub const OUTPUT_HEAD_ORIENTATION_OFFSET: usize = OUTPUT_BASE + 4;
pub const OUTPUT_CONTROLLER_ORIENTATION_OFFSET: usize = OUTPUT_BASE + 28;
pub const OUTPUT_HEAD_POSITION_OFFSET: usize = OUTPUT_BASE + 52;
pub const OUTPUT_CONTROLLER_POSITION_OFFSET: usize = OUTPUT_BASE + 76;
pub const OUTPUT_TRIGGERS_OFFSET: usize = OUTPUT_BASE + 100;
pub const OUTPUT_JOYSTICK_LEFT_OFFSET: usize = OUTPUT_BASE + 124;
pub const OUTPUT_JOYSTICK_RIGHT_OFFSET: usize = OUTPUT_BASE + 140;
pub const OUTPUT_TRACKPAD_OFFSET: usize = OUTPUT_BASE + 156;
pub const OUTPUT_BUTTONS_OFFSET: usize = OUTPUT_BASE + 172;
pub const OUTPUT_END: usize = OUTPUT_BASE + 176;

// Free-form status text surfaced by the host overlay, NUL terminated
pub const MESSAGE_OFFSET: usize = 180;
pub const MESSAGE_SIZE: usize = 512;

pub const REGION_SIZE: usize = MESSAGE_OFFSET + MESSAGE_SIZE;

// Override categories asserted by the bridge, one bit each
pub const OVERRIDE_HEAD_ORIENTATION: u32 = 1 << 0;
pub const OVERRIDE_CONTROLLER_ORIENTATION: u32 = 1 << 1;
pub const OVERRIDE_HEAD_POSITION: u32 = 1 << 2;
pub const OVERRIDE_CONTROLLER_POSITION: u32 = 1 << 3;
pub const OVERRIDE_BUTTONS: u32 = 1 << 4;

/// Host-reported buttons, ordinal position = bit index in the input bitmask.
pub const INPUT_BUTTONS: [&str; 6] = [
    "trackpad_click",
    "trackpad_touch",
    "trigger",
    "back",
    "volume_up",
    "volume_down",
];

/// Emulated controller buttons, ordinal position = bit index in the override
/// bitmask.
pub const CONTROLLER_BUTTONS: [&str; 21] = [
    "system",
    "application_menu",
    "grip",
    "dpad_left",
    "dpad_up",
    "dpad_right",
    "dpad_down",
    "a",
    "b",
    "x",
    "y",
    "trackpad_click",
    "trackpad_touch",
    "trigger",
    "shoulder_left",
    "shoulder_right",
    "joystick_left",
    "joystick_right",
    "back",
    "guide",
    "start",
];

static INPUT_BUTTON_INDICES: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    INPUT_BUTTONS
        .iter()
        .enumerate()
        .map(|(index, name)| (*name, index))
        .collect()
});

static CONTROLLER_BUTTON_INDICES: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    CONTROLLER_BUTTONS
        .iter()
        .enumerate()
        .map(|(index, name)| (*name, index))
        .collect()
});

pub fn input_button_index(name: &str) -> Option<usize> {
    INPUT_BUTTON_INDICES.get(name).copied()
}

pub fn controller_button_index(name: &str) -> Option<usize> {
    CONTROLLER_BUTTON_INDICES.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_offsets_are_packed() {
        assert_eq!(INPUT_TRACKPAD_OFFSET, INPUT_CONTROLLER_POSITION_OFFSET + 24);
        assert_eq!(INPUT_BUTTONS_OFFSET, INPUT_TRACKPAD_OFFSET + 16);
        assert_eq!(INPUT_END, INPUT_BUTTONS_OFFSET + 4);

        assert_eq!(OUTPUT_TRIGGERS_OFFSET, 104);
        assert_eq!(OUTPUT_JOYSTICK_LEFT_OFFSET, OUTPUT_TRIGGERS_OFFSET + 24);
        assert_eq!(OUTPUT_BUTTONS_OFFSET, 176);
        assert_eq!(OUTPUT_END, MESSAGE_OFFSET);
        assert_eq!(REGION_SIZE, 692);

        // the override half reuses the input field slots
        assert_eq!(OUTPUT_HEAD_ORIENTATION_OFFSET, INPUT_HEAD_ORIENTATION_OFFSET);
        assert_eq!(OUTPUT_FLAGS_OFFSET, INPUT_RESERVED_OFFSET);
    }

    #[test]
    fn button_lookups_follow_table_order() {
        assert_eq!(input_button_index("trackpad_click"), Some(0));
        assert_eq!(input_button_index("trigger"), Some(2));
        assert_eq!(input_button_index("volume_down"), Some(5));
        assert_eq!(input_button_index("grip"), None);

        assert_eq!(controller_button_index("system"), Some(0));
        assert_eq!(controller_button_index("trigger"), Some(13));
        assert_eq!(controller_button_index("start"), Some(20));
        assert_eq!(controller_button_index("volume_up"), None);
    }
}
