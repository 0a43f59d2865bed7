//! Probabilistic packet loss and delivery accounting.

/// Counters the host can inspect: successful deliveries and simulated
/// losses, for data packets and ACK frames separately.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
    pub packets: u32,
    pub acks: u32,
    pub lost_packets: u32,
    pub lost_acks: u32,
}

/// `(enabled, 1-in-N divider)` drop configuration for data and ACK frames.
pub(crate) struct LossConfig {
    lose_packets: bool,
    divider_packets: u32,
    lose_acks: bool,
    divider_acks: u32,
    rng: fastrand::Rng,
}

impl LossConfig {
    pub fn new() -> Self {
        LossConfig {
            lose_packets: false,
            divider_packets: 0,
            lose_acks: false,
            divider_acks: 0,
            rng: fastrand::Rng::new(),
        }
    }

    /// A divider of 0 disables loss for that frame class.
    pub fn configure(&mut self, lost_packets: u32, lost_acks: u32) {
        if lost_packets > 0 {
            self.lose_packets = true;
            self.divider_packets = lost_packets;
            log::info!("simulating 1 lost packet for {lost_packets} packets sent");
        }
        if lost_acks > 0 {
            self.lose_acks = true;
            self.divider_acks = lost_acks;
            log::info!("simulating 1 lost ACK-packet for {lost_acks} ACK-packets sent");
        }
    }

    pub fn seed(&mut self, seed: u64) {
        self.rng = fastrand::Rng::with_seed(seed);
    }

    /// Roll the dice for one outgoing data packet; `true` means drop it.
    pub fn drop_packet(&mut self) -> bool {
        self.lose_packets && self.rng.u32(0..self.divider_packets) == 0
    }

    /// Roll the dice for one outgoing ACK; `true` means drop it.
    pub fn drop_ack(&mut self) -> bool {
        self.lose_acks && self.rng.u32(0..self.divider_acks) == 0
    }
}
