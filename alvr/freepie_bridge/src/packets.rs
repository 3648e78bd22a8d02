use crate::layout::{self, *};
use alvr_common::glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// One complete host-authored record of motion and button state.
///
/// Orientations are yaw/pitch/roll triples and positions are in meters, both
/// in the host producer's conventions; the wire format does not describe its
/// own units.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Default, Debug)]
pub struct TrackingSnapshot {
    pub head_orientation: DVec3,
    pub controller_orientation: DVec3,
    pub head_position: DVec3,
    pub controller_position: DVec3,
    pub trackpad: DVec2,
    pub buttons: u32,
}

impl TrackingSnapshot {
    /// Queries a host-reported button by its table name.
    pub fn button(&self, name: &str) -> bool {
        layout::input_button_index(name).is_some_and(|index| self.buttons & (1 << index) != 0)
    }
}

/// The bridge-authored half of the region. Fields are meaningful to the host
/// only when the matching override flag is set; buttons are always written in
/// full.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Default, Debug)]
pub struct OverridePacket {
    pub flags: u32,
    pub head_orientation: DVec3,
    pub controller_orientation: DVec3,
    pub head_position: DVec3,
    pub controller_position: DVec3,
    pub trigger: f64,
    pub trigger_left: f64,
    pub trigger_right: f64,
    pub joystick_left: DVec2,
    pub joystick_right: DVec2,
    pub trackpad: DVec2,
    pub buttons: u32,
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(raw)
}

fn read_dvec2(bytes: &[u8], offset: usize) -> DVec2 {
    DVec2::new(read_f64(bytes, offset), read_f64(bytes, offset + 8))
}

fn read_dvec3(bytes: &[u8], offset: usize) -> DVec3 {
    DVec3::new(
        read_f64(bytes, offset),
        read_f64(bytes, offset + 8),
        read_f64(bytes, offset + 16),
    )
}

fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_f64(bytes: &mut [u8], offset: usize, value: f64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn write_dvec2(bytes: &mut [u8], offset: usize, value: DVec2) {
    write_f64(bytes, offset, value.x);
    write_f64(bytes, offset + 8, value.y);
}

fn write_dvec3(bytes: &mut [u8], offset: usize, value: DVec3) {
    write_f64(bytes, offset, value.x);
    write_f64(bytes, offset + 8, value.y);
    write_f64(bytes, offset + 16, value.z);
}

/// Reads the input half. Returns `None` when the signature does not match,
/// without interpreting anything past the signature slot.
pub fn decode_tracking(bytes: &[u8]) -> Option<TrackingSnapshot> {
    if bytes.len() < INPUT_END || read_u32(bytes, INPUT_SIGNATURE_OFFSET) != TRACKING_SIGNATURE {
        return None;
    }

    Some(TrackingSnapshot {
        head_orientation: read_dvec3(bytes, INPUT_HEAD_ORIENTATION_OFFSET),
        controller_orientation: read_dvec3(bytes, INPUT_CONTROLLER_ORIENTATION_OFFSET),
        head_position: read_dvec3(bytes, INPUT_HEAD_POSITION_OFFSET),
        controller_position: read_dvec3(bytes, INPUT_CONTROLLER_POSITION_OFFSET),
        trackpad: read_dvec2(bytes, INPUT_TRACKPAD_OFFSET),
        buttons: read_u32(bytes, INPUT_BUTTONS_OFFSET),
    })
}

/// Writes the output half. The signature slot at bytes [0, 4) belongs to the
/// host and is never touched. Flags are written verbatim.
pub fn encode_override(packet: &OverridePacket, bytes: &mut [u8]) {
    write_u32(bytes, OUTPUT_FLAGS_OFFSET, packet.flags);
    write_dvec3(bytes, OUTPUT_HEAD_ORIENTATION_OFFSET, packet.head_orientation);
    write_dvec3(
        bytes,
        OUTPUT_CONTROLLER_ORIENTATION_OFFSET,
        packet.controller_orientation,
    );
    write_dvec3(bytes, OUTPUT_HEAD_POSITION_OFFSET, packet.head_position);
    write_dvec3(
        bytes,
        OUTPUT_CONTROLLER_POSITION_OFFSET,
        packet.controller_position,
    );
    write_f64(bytes, OUTPUT_TRIGGERS_OFFSET, packet.trigger);
    write_f64(bytes, OUTPUT_TRIGGERS_OFFSET + 8, packet.trigger_left);
    write_f64(bytes, OUTPUT_TRIGGERS_OFFSET + 16, packet.trigger_right);
    write_dvec2(bytes, OUTPUT_JOYSTICK_LEFT_OFFSET, packet.joystick_left);
    write_dvec2(bytes, OUTPUT_JOYSTICK_RIGHT_OFFSET, packet.joystick_right);
    write_dvec2(bytes, OUTPUT_TRACKPAD_OFFSET, packet.trackpad);
    write_u32(bytes, OUTPUT_BUTTONS_OFFSET, packet.buttons);
}

/// Writes the status message, truncated to the field size and NUL terminated.
pub fn encode_message(message: &str, bytes: &mut [u8]) {
    let field = &mut bytes[MESSAGE_OFFSET..MESSAGE_OFFSET + MESSAGE_SIZE];
    let len = message.len().min(MESSAGE_SIZE - 1);
    field[..len].copy_from_slice(&message.as_bytes()[..len]);
    field[len] = 0;
}

/// Host-side writer for the input half. Skips bytes [4, 8): that slot is the
/// bridge's flags field in the output layout.
pub fn encode_tracking(snapshot: &TrackingSnapshot, bytes: &mut [u8]) {
    write_u32(bytes, INPUT_SIGNATURE_OFFSET, TRACKING_SIGNATURE);
    write_dvec3(bytes, INPUT_HEAD_ORIENTATION_OFFSET, snapshot.head_orientation);
    write_dvec3(
        bytes,
        INPUT_CONTROLLER_ORIENTATION_OFFSET,
        snapshot.controller_orientation,
    );
    write_dvec3(bytes, INPUT_HEAD_POSITION_OFFSET, snapshot.head_position);
    write_dvec3(
        bytes,
        INPUT_CONTROLLER_POSITION_OFFSET,
        snapshot.controller_position,
    );
    write_dvec2(bytes, INPUT_TRACKPAD_OFFSET, snapshot.trackpad);
    write_u32(bytes, INPUT_BUTTONS_OFFSET, snapshot.buttons);
}

/// Host-side reader for the output half.
pub fn decode_override(bytes: &[u8]) -> OverridePacket {
    OverridePacket {
        flags: read_u32(bytes, OUTPUT_FLAGS_OFFSET),
        head_orientation: read_dvec3(bytes, OUTPUT_HEAD_ORIENTATION_OFFSET),
        controller_orientation: read_dvec3(bytes, OUTPUT_CONTROLLER_ORIENTATION_OFFSET),
        head_position: read_dvec3(bytes, OUTPUT_HEAD_POSITION_OFFSET),
        controller_position: read_dvec3(bytes, OUTPUT_CONTROLLER_POSITION_OFFSET),
        trigger: read_f64(bytes, OUTPUT_TRIGGERS_OFFSET),
        trigger_left: read_f64(bytes, OUTPUT_TRIGGERS_OFFSET + 8),
        trigger_right: read_f64(bytes, OUTPUT_TRIGGERS_OFFSET + 16),
        joystick_left: read_dvec2(bytes, OUTPUT_JOYSTICK_LEFT_OFFSET),
        joystick_right: read_dvec2(bytes, OUTPUT_JOYSTICK_RIGHT_OFFSET),
        trackpad: read_dvec2(bytes, OUTPUT_TRACKPAD_OFFSET),
        buttons: read_u32(bytes, OUTPUT_BUTTONS_OFFSET),
    }
}

/// Host-side reader for the status message.
pub fn decode_message(bytes: &[u8]) -> String {
    let field = &bytes[MESSAGE_OFFSET..MESSAGE_OFFSET + MESSAGE_SIZE];
    let len = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits3(value: DVec3) -> [u64; 3] {
        [value.x.to_bits(), value.y.to_bits(), value.z.to_bits()]
    }

    #[test]
    fn tracking_round_trip_is_bit_exact() {
        // NaN payloads and infinities must survive unchanged
        let quiet_nan = f64::from_bits(0x7ff8_0000_dead_beef);
        let snapshot = TrackingSnapshot {
            head_orientation: DVec3::new(0.25, -1.5, quiet_nan),
            controller_orientation: DVec3::new(f64::INFINITY, f64::NEG_INFINITY, -0.0),
            head_position: DVec3::new(1.0, 2.0, 3.0),
            controller_position: DVec3::new(f64::MIN_POSITIVE, f64::MAX, f64::EPSILON),
            trackpad: DVec2::new(-1.0, 1.0),
            buttons: 0b10_1101,
        };

        let mut bytes = vec![0; REGION_SIZE];
        encode_tracking(&snapshot, &mut bytes);
        let decoded = decode_tracking(&bytes).unwrap();

        assert_eq!(bits3(decoded.head_orientation), bits3(snapshot.head_orientation));
        assert_eq!(
            bits3(decoded.controller_orientation),
            bits3(snapshot.controller_orientation)
        );
        assert_eq!(bits3(decoded.head_position), bits3(snapshot.head_position));
        assert_eq!(
            bits3(decoded.controller_position),
            bits3(snapshot.controller_position)
        );
        assert_eq!(decoded.trackpad, snapshot.trackpad);
        assert_eq!(decoded.buttons, snapshot.buttons);
    }

    #[test]
    fn unrecognized_signature_rejects_the_snapshot() {
        let mut bytes = vec![0; REGION_SIZE];
        encode_tracking(&TrackingSnapshot::default(), &mut bytes);
        write_u32(&mut bytes, INPUT_SIGNATURE_OFFSET, TRACKING_SIGNATURE + 1);

        assert!(decode_tracking(&bytes).is_none());
        // a buffer holding nothing but the signature slot must also be safe
        assert!(decode_tracking(&bytes[..4]).is_none());
        assert!(decode_tracking(&[]).is_none());
    }

    #[test]
    fn override_never_touches_the_signature_slot() {
        let mut bytes = vec![0xaa; REGION_SIZE];
        let packet = OverridePacket {
            flags: u32::MAX,
            buttons: u32::MAX,
            ..Default::default()
        };

        encode_override(&packet, &mut bytes);
        encode_message("sentinel check", &mut bytes);

        assert_eq!(&bytes[..4], &[0xaa; 4]);
    }

    #[test]
    fn flags_are_written_verbatim() {
        let mut bytes = vec![0; REGION_SIZE];
        let packet = OverridePacket {
            flags: OVERRIDE_HEAD_POSITION,
            ..Default::default()
        };

        encode_override(&packet, &mut bytes);

        assert_eq!(read_u32(&bytes, OUTPUT_FLAGS_OFFSET), OVERRIDE_HEAD_POSITION);
    }

    #[test]
    fn override_round_trip() {
        let packet = OverridePacket {
            flags: OVERRIDE_CONTROLLER_POSITION,
            controller_position: DVec3::new(0.1, -0.2, 0.3),
            trigger: 0.75,
            trigger_left: 0.5,
            trigger_right: 0.25,
            joystick_left: DVec2::new(-0.5, 0.5),
            joystick_right: DVec2::new(0.125, -0.125),
            trackpad: DVec2::new(0.0, 1.0),
            buttons: 1 << 13,
            ..Default::default()
        };

        let mut bytes = vec![0; REGION_SIZE];
        encode_override(&packet, &mut bytes);
        let decoded = decode_override(&bytes);

        assert_eq!(decoded, packet);
        assert_eq!(decoded.flags, 0b1000);
    }

    #[test]
    fn input_button_query_follows_the_table() {
        let mut bytes = vec![0; REGION_SIZE];
        encode_tracking(
            &TrackingSnapshot {
                head_position: DVec3::new(1.0, 2.0, 3.0),
                buttons: 0b100,
                ..Default::default()
            },
            &mut bytes,
        );

        let decoded = decode_tracking(&bytes).unwrap();
        assert_eq!(decoded.head_position, DVec3::new(1.0, 2.0, 3.0));
        assert!(decoded.button("trigger"));
        for name in ["trackpad_click", "trackpad_touch", "back", "volume_up", "volume_down"] {
            assert!(!decoded.button(name), "{name} should be inactive");
        }
    }

    #[test]
    fn message_is_truncated_and_terminated() {
        let mut bytes = vec![0; REGION_SIZE];

        encode_message("recentered", &mut bytes);
        assert_eq!(decode_message(&bytes), "recentered");

        let long = "x".repeat(MESSAGE_SIZE * 2);
        encode_message(&long, &mut bytes);
        let decoded = decode_message(&bytes);
        assert_eq!(decoded.len(), MESSAGE_SIZE - 1);
        assert_eq!(bytes[MESSAGE_OFFSET + MESSAGE_SIZE - 1], 0);
    }
}
