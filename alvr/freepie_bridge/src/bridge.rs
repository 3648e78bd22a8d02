use crate::{
    layout::{
        self, OVERRIDE_BUTTONS, OVERRIDE_CONTROLLER_ORIENTATION, OVERRIDE_CONTROLLER_POSITION,
        OVERRIDE_HEAD_ORIENTATION, OVERRIDE_HEAD_POSITION, REGION_SIZE,
    },
    packets::{self, OverridePacket, TrackingSnapshot},
    platform::{RegionGate, SharedRegion},
    BridgeConfig,
};
use alvr_common::{anyhow::Result, glam::{DVec2, DVec3}, info};
use serde::{Deserialize, Serialize};

/// Values authored by the embedding script, mirrored into the shared region on
/// every exchange. Each `override_*` switch asserts authority over one
/// category; un-flagged values are ignored by the host. Buttons are always
/// authoritative while the bridge is exchanging.
#[derive(Serialize, Deserialize, Clone, Default, Debug)]
pub struct OverrideState {
    pub override_head_orientation: bool,
    pub override_controller_orientation: bool,
    pub override_head_position: bool,
    pub override_controller_position: bool,
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
    pub message: String,
}

impl OverrideState {
    /// Sets or clears an emulated button by its table name. Returns false for
    /// names not in the table.
    pub fn set_button(&mut self, name: &str, pressed: bool) -> bool {
        match layout::controller_button_index(name) {
            Some(index) => {
                if pressed {
                    self.buttons |= 1 << index;
                } else {
                    self.buttons &= !(1 << index);
                }
                true
            }
            None => false,
        }
    }

    pub fn packet(&self) -> OverridePacket {
        let mut flags = OVERRIDE_BUTTONS;
        if self.override_head_orientation {
            flags |= OVERRIDE_HEAD_ORIENTATION;
        }
        if self.override_controller_orientation {
            flags |= OVERRIDE_CONTROLLER_ORIENTATION;
        }
        if self.override_head_position {
            flags |= OVERRIDE_HEAD_POSITION;
        }
        if self.override_controller_position {
            flags |= OVERRIDE_CONTROLLER_POSITION;
        }

        OverridePacket {
            flags,
            head_orientation: self.head_orientation,
            controller_orientation: self.controller_orientation,
            head_position: self.head_position,
            controller_position: self.controller_position,
            trigger: self.trigger,
            trigger_left: self.trigger_left,
            trigger_right: self.trigger_right,
            joystick_left: self.joystick_left,
            joystick_right: self.joystick_right,
            trackpad: self.trackpad,
            buttons: self.buttons,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum TickReport {
    /// The host has not created the shared region yet; retried next tick.
    Waiting,
    /// The gate was not acquired within the configured timeout.
    Skipped,
    /// One full exchange happened. `fresh_input` is false when the input half
    /// carried an unrecognized signature and the previous snapshot was kept.
    Exchanged { fresh_input: bool },
    /// A previous tick hit an unrecoverable setup failure; the OS is not
    /// queried again.
    Faulted,
}

struct Session {
    region: SharedRegion,
    gate: RegionGate,
}

impl Session {
    fn connect(config: &BridgeConfig) -> Result<Option<Session>> {
        let Some(region) = SharedRegion::open(&config.region_name, REGION_SIZE)? else {
            return Ok(None);
        };
        let gate = RegionGate::open(&config.gate_name)?;

        Ok(Some(Session { region, gate }))
    }
}

/// Bridge-side endpoint of the shared region, driven by an external tick
/// source. Calls are not re-entrant: the embedder must serialize them.
pub struct BridgeContext {
    config: BridgeConfig,
    session: Option<Session>,
    faulted: bool,
    input: TrackingSnapshot,
    override_state: OverrideState,
}

impl BridgeContext {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            session: None,
            faulted: false,
            input: TrackingSnapshot::default(),
            override_state: OverrideState::default(),
        }
    }

    /// The last snapshot decoded with a valid signature, zero-initialized
    /// before the first one.
    pub fn input(&self) -> &TrackingSnapshot {
        &self.input
    }

    pub fn override_state(&self) -> &OverrideState {
        &self.override_state
    }

    pub fn override_state_mut(&mut self) -> &mut OverrideState {
        &mut self.override_state
    }

    /// One exchange cycle: resolve the region if needed, then decode the
    /// host's snapshot and publish the override state under the gate.
    ///
    /// An `Err` is returned once, for unrecoverable setup failures only;
    /// afterwards the context stays in [`TickReport::Faulted`].
    pub fn poll(&mut self) -> Result<TickReport> {
        if self.faulted {
            return Ok(TickReport::Faulted);
        }

        match self.try_exchange() {
            Ok(report) => Ok(report),
            Err(e) => {
                self.faulted = true;
                self.session = None;

                Err(e)
            }
        }
    }

    fn try_exchange(&mut self) -> Result<TickReport> {
        if self.session.is_none() {
            match Session::connect(&self.config)? {
                Some(session) => {
                    info!("Attached to shared region {:?}", self.config.region_name);
                    self.session = Some(session);
                }
                None => return Ok(TickReport::Waiting),
            }
        }

        let session = match &mut self.session {
            Some(session) => session,
            None => return Ok(TickReport::Waiting),
        };

        let _lease = match self.config.lock_timeout {
            Some(timeout) => match session.gate.acquire_timeout(timeout)? {
                Some(lease) => lease,
                None => return Ok(TickReport::Skipped),
            },
            None => session.gate.acquire()?,
        };

        let fresh_input = exchange(session.region.view(), &mut self.input, &self.override_state);

        Ok(TickReport::Exchanged { fresh_input })
    }
}

// Decode must run before encode: the two halves of the region alias, so the
// override write clobbers the input field slots.
fn exchange(bytes: &mut [u8], input: &mut TrackingSnapshot, output: &OverrideState) -> bool {
    let fresh = match packets::decode_tracking(bytes) {
        Some(snapshot) => {
            *input = snapshot;
            true
        }
        None => false,
    };

    packets::encode_override(&output.packet(), bytes);
    packets::encode_message(&output.message, bytes);

    fresh
}
