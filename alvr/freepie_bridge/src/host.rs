use crate::{
    layout::REGION_SIZE,
    packets::{self, OverridePacket, TrackingSnapshot},
    platform::{RegionGate, SharedRegion},
    BridgeConfig,
};
use alvr_common::anyhow::Result;

/// Host-side owner of the shared region, the counterpart of
/// [`BridgeContext`](crate::BridgeContext). The streaming server holds one of
/// these for the lifetime of the session; tests use it to stand in for the
/// host.
pub struct HostEndpoint {
    region: SharedRegion,
    gate: RegionGate,
    gate_name: String,
}

impl HostEndpoint {
    /// Creates the region and the gate, then zeroes the region and stamps the
    /// signature so a bridge attaching early sees a valid (empty) snapshot.
    pub fn create(config: &BridgeConfig) -> Result<Self> {
        let mut region = SharedRegion::create(&config.region_name, REGION_SIZE)?;
        let gate = RegionGate::open(&config.gate_name)?;

        {
            let _lease = gate.acquire()?;
            let bytes = region.view();
            bytes.fill(0);
            packets::encode_tracking(&TrackingSnapshot::default(), bytes);
        }

        Ok(Self {
            region,
            gate,
            gate_name: config.gate_name.clone(),
        })
    }

    pub fn publish_tracking(&mut self, snapshot: &TrackingSnapshot) -> Result<()> {
        let _lease = self.gate.acquire()?;
        packets::encode_tracking(snapshot, self.region.view());

        Ok(())
    }

    pub fn read_override(&mut self) -> Result<OverridePacket> {
        let _lease = self.gate.acquire()?;

        Ok(packets::decode_override(self.region.view()))
    }

    pub fn read_message(&mut self) -> Result<String> {
        let _lease = self.gate.acquire()?;

        Ok(packets::decode_message(self.region.view()))
    }
}

impl Drop for HostEndpoint {
    fn drop(&mut self) {
        // The region name is reclaimed by SharedRegion; the gate name is only
        // known here
        RegionGate::unlink(&self.gate_name);
    }
}
