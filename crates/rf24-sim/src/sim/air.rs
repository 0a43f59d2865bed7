//! The shared-medium side of a transmission: once a frame's airtime runs
//! out it is routed to every eligible receiver, and the return ACK of the
//! Enhanced ShockBurst exchange is synthesized.

use crate::radio::constants::{timing, FRAME_OVERHEAD_BITS};
use crate::radio::packet::{RxPacket, TxKind};
use crate::radio::RadioState;
use crate::types::DataRate;

use super::timer::TimerEvent;
use super::{RadioId, Simulation};

/// On-air duration of one ESB frame: preamble, address, payload, CRC and
/// the 9-bit packet control field at the configured link rate.
pub(crate) fn airtime_us(
    addr_bytes: u8,
    payload_bytes: usize,
    crc_bytes: u8,
    rate: DataRate,
) -> u64 {
    let bits = 8 * (1 + addr_bytes as u64 + payload_bytes as u64 + crc_bytes as u64)
        + FRAME_OVERHEAD_BITS;
    bits * 1_000_000 / rate.bits_per_sec()
}

impl Simulation {
    /// The frame on air left the antenna of `id`.
    pub(crate) fn on_tx_finished(&mut self, id: RadioId) {
        log::debug!(
            "[{}] TX finished in state {:?}",
            self.radios[id.0].name,
            self.radios[id.0].state
        );
        if self.radios[id.0].packet_being_sent.is_none() {
            panic!(
                "internal invariant violated: TX completion without a packet on air on {}",
                self.radios[id.0].name
            );
        }
        self.radios[id.0].tx_in_progress = false;
        if self.radios[id.0].rx_send_ack {
            self.finish_ack_tx(id);
        } else {
            self.finish_regular_tx(id);
        }
    }

    /// A PRX finished transmitting an ACK frame: deliver its effects to the
    /// waiting PTX.
    fn finish_ack_tx(&mut self, prx: RadioId) {
        self.radios[prx.0].tx_finished = true;

        let ptx = self.radios[prx.0].rx_send_ack_to.unwrap_or_else(|| {
            panic!(
                "internal invariant violated: {} sent an ACK with no peer",
                self.radios[prx.0].name
            )
        });

        if self.radios[ptx.0].ard_has_elapsed {
            log::warn!(
                "[{}] timed out while receiving ACK from {} - did you set ARD correctly?",
                self.radios[ptx.0].name,
                self.radios[prx.0].name
            );
            self.radios[prx.0].rx_send_ack = false;
            self.run_reactor(ptx);
            return;
        }

        if self.radios[ptx.0].state != RadioState::RxModeForAck {
            log::warn!(
                "[{}] is not listening (state {:?}) and will miss the ACK from {} - did you set ARD correctly?",
                self.radios[ptx.0].name,
                self.radios[ptx.0].state,
                self.radios[prx.0].name
            );
            return;
        }

        {
            let peer = &mut self.radios[ptx.0];
            peer.tx_ack_received = true;
            let status = peer.regs.status().with_tx_full(false).with_tx_ds(true);
            peer.regs.set_status(status);
        }
        self.radios[prx.0].update_fifo_status();
        self.refresh_irq(ptx);
        {
            let radio = &mut self.radios[prx.0];
            let status = radio.regs.status().with_rx_dr(true);
            radio.regs.set_status(status);
        }
        self.refresh_irq(prx);
        self.stats.acks += 1;

        let packet = self.radios[prx.0].packet_being_sent.take().unwrap_or_else(|| {
            panic!(
                "internal invariant violated: ACK completion without a packet on {}",
                self.radios[prx.0].name
            )
        });
        let TxKind::AckPayload { pipe } = packet.kind else {
            panic!(
                "internal invariant violated: regular packet in {}'s ACK path",
                self.radios[prx.0].name
            );
        };

        if !packet.payload.is_empty() {
            log::debug!("[{}] ACK has payload", self.radios[prx.0].name);
            if self.radios[ptx.0].fifo_rx.is_full() {
                log::warn!(
                    "[{}] no free space in RX fifo for ACK-packet payload, data is lost",
                    self.radios[ptx.0].name
                );
            } else {
                let peer = &mut self.radios[ptx.0];
                peer.fifo_rx.push(RxPacket {
                    pid: packet.pid,
                    pipe,
                    payload: packet.payload.clone(),
                });
                peer.update_fifo_status();
                let status = peer.regs.status().with_tx_ds(true).with_rx_dr(true);
                peer.regs.set_status(status);
                self.refresh_irq(ptx);
            }
        }

        // the acknowledged packet finally leaves the PTX's TX FIFO
        log::debug!(
            "[{}] ACK received, removing packet from TX fifo",
            self.radios[ptx.0].name
        );
        if self.radios[ptx.0].fifo_tx.pop_front().is_none() {
            log::warn!(
                "[{}] TX FIFO empty at ACK completion (flushed mid-exchange?)",
                self.radios[ptx.0].name
            );
        }
        {
            let peer = &mut self.radios[ptx.0];
            let status = peer.regs.status().with_tx_ds(true);
            peer.regs.set_status(status);
            peer.update_fifo_status();
        }
        self.refresh_irq(ptx);
        self.stats.packets += 1;

        self.run_reactor(prx);
    }

    /// A PTX finished transmitting a regular frame: maybe lose it, route it
    /// through the air, then either wait for the ACK or finish the packet.
    fn finish_regular_tx(&mut self, id: RadioId) {
        log::debug!("[{}] regular packet completed", self.radios[id.0].name);

        if self.loss.drop_packet() {
            self.stats.lost_packets += 1;
            log::info!(
                "[{}] simulating lost packet, total {} lost",
                self.radios[id.0].name,
                self.stats.lost_packets
            );
        } else {
            self.dispatch(id);
        }

        {
            let radio = &mut self.radios[id.0];
            radio.packet_being_sent = None;
            radio.tx_finished = true;
            radio.tx_in_progress = false;
        }

        let retr = self.radios[id.0].regs.setup_retr();
        if retr.arc() != 0 {
            // auto-retransmit enabled: hold the packet and wait for the ACK
            let mcu = {
                let radio = &mut self.radios[id.0];
                radio.tx_wait_for_ack = true;
                radio.tx_ack_received = false;
                radio.rx_ack_timeout = false;
                radio.ard_has_elapsed = false;
                radio.mcu
            };
            let ard_us = (retr.ard() as u64 + 1) * timing::ARD_STEP_US;
            log::debug!(
                "[{}] waiting for ACK, ARD is {} us",
                self.radios[id.0].name,
                ard_us
            );
            self.timers
                .schedule_us(mcu, id, ard_us, TimerEvent::ArdElapsed);
        } else {
            log::debug!(
                "[{}] done with this packet, removing from TX fifo",
                self.radios[id.0].name
            );
            if self.radios[id.0].fifo_tx.pop_front().is_none() {
                log::warn!(
                    "[{}] TX FIFO empty at TX completion (flushed mid-air?)",
                    self.radios[id.0].name
                );
            }
            let radio = &mut self.radios[id.0];
            let status = radio.regs.status().with_tx_ds(true);
            radio.regs.set_status(status);
            radio.update_fifo_status();
            self.refresh_irq(id);
            self.stats.packets += 1;
        }

        self.run_reactor(id);
    }

    /// Route a completed frame to every eligible receiver in the registry.
    fn dispatch(&mut self, sender: RadioId) {
        log::debug!(
            "[{}] searching for receiver for completed packet",
            self.radios[sender.0].name
        );

        let packet = self.radios[sender.0].packet_being_sent.clone().unwrap_or_else(|| {
            panic!(
                "internal invariant violated: dispatch without a packet on air on {}",
                self.radios[sender.0].name
            )
        });
        let TxKind::Regular { addr, .. } = packet.kind else {
            panic!(
                "internal invariant violated: dispatching an ack-payload from {}",
                self.radios[sender.0].name
            );
        };

        let (tx_channel, tx_rate_bits, tx_crco) = {
            let radio = &self.radios[sender.0];
            (
                radio.regs.read(crate::radio::constants::registers::RF_CH),
                radio.regs.rf_setup().into_bits() & DataRate::MASK,
                radio.regs.config().crco(),
            )
        };

        let mut any_match = false;
        for index in 0..self.radios.len() {
            if index == sender.0 {
                continue;
            }
            let matched_pipe = {
                let peer = &self.radios[index];
                if peer.state != RadioState::RxMode
                    || peer.regs.read(crate::radio::constants::registers::RF_CH) != tx_channel
                    || peer.regs.rf_setup().into_bits() & DataRate::MASK != tx_rate_bits
                    || peer.regs.config().crco() != tx_crco
                {
                    continue;
                }
                let pipes = peer.regs.pipe_addresses();
                (0u8..6).find(|&pipe| {
                    pipes[pipe as usize] == addr && peer.regs.rx_pipe_enabled(pipe)
                })
            };
            let Some(pipe) = matched_pipe else { continue };
            any_match = true;
            self.deliver(sender, RadioId(index), pipe);
        }

        if !any_match {
            log::warn!(
                "no receiver found for packet from {}",
                self.radios[sender.0].name
            );
        }
    }

    /// Hand the on-air packet to one matched receiver and trigger its ACK.
    fn deliver(&mut self, sender: RadioId, receiver: RadioId, pipe: u8) {
        let packet = self.radios[sender.0].packet_being_sent.clone().unwrap();
        let incoming = RxPacket {
            pid: packet.pid,
            pipe,
            payload: packet.payload,
        };

        if self.radios[receiver.0].fifo_rx.is_full() {
            log::warn!(
                "[{}] has no free RX slot and will miss a packet sent by {}",
                self.radios[receiver.0].name,
                self.radios[sender.0].name
            );
            return;
        }

        let duplicate = self.radios[receiver.0].last_rx.as_ref() == Some(&incoming);
        if duplicate {
            // retransmission already seen; swallow it but still ACK so the
            // sender cannot tell
            log::info!(
                "[{}] dropping duplicate packet with {} bytes payload",
                self.radios[receiver.0].name,
                incoming.payload.len()
            );
        } else {
            let radio = &mut self.radios[receiver.0];
            radio.fifo_rx.push(incoming.clone());
            radio.last_rx = Some(incoming);
            let status = radio.regs.status().with_rx_dr(true);
            radio.regs.set_status(status);
            radio.update_fifo_status();
            self.refresh_irq(receiver);
            log::debug!(
                "[{}] has a new packet, fifo_rx_entries is {}",
                self.radios[receiver.0].name,
                self.radios[receiver.0].fifo_rx.len()
            );
        }

        if self.radios[receiver.0].regs.auto_ack_enabled(pipe) {
            if self.loss.drop_ack() {
                self.stats.lost_acks += 1;
                log::info!(
                    "[{}] simulating lost ACK-packet, total {} lost",
                    self.radios[sender.0].name,
                    self.stats.lost_acks
                );
            } else {
                self.handle_tx_ack(sender, receiver);
            }
        } else {
            log::warn!(
                "auto-ACK disabled for pipe {} on {}, not sending ACK",
                pipe,
                self.radios[receiver.0].name
            );
        }
    }

    /// Put the PRX on the path to answering with an ACK and remember the
    /// peer links for the span of this exchange.
    fn handle_tx_ack(&mut self, ptx: RadioId, prx: RadioId) {
        log::debug!(
            "[{}] answering {} with an ACK after settling",
            self.radios[prx.0].name,
            self.radios[ptx.0].name
        );
        self.radios[ptx.0].tx_receive_ack_from = Some(prx);
        let mcu = {
            let radio = &mut self.radios[prx.0];
            radio.state = RadioState::TxSettlingForAck;
            radio.state_next = RadioState::TxModeForAck;
            radio.rx_send_ack = true;
            radio.rx_send_ack_to = Some(ptx);
            radio.mcu
        };
        self.timers
            .schedule_us(mcu, prx, timing::SETTLE_US, TimerEvent::SettleElapsed);
    }

    /// The auto-retransmit delay of `id` ran out. An ACK still in flight at
    /// this instant is force-aborted and lost.
    pub(crate) fn on_ard_elapsed(&mut self, id: RadioId) {
        log::debug!("[{}] ARD elapsed", self.radios[id.0].name);
        self.radios[id.0].ard_has_elapsed = true;
        if let Some(peer) = self.radios[id.0].tx_receive_ack_from {
            if self.radios[peer.0].tx_in_progress {
                self.radios[peer.0].tx_in_progress = false;
                self.radios[id.0].rx_ack_timeout = true;
                log::warn!(
                    "ARD for {} elapsed while {} was still transmitting, ACK is lost",
                    self.radios[id.0].name,
                    self.radios[peer.0].name
                );
            }
        }
        self.run_reactor(id);
    }

    /// The 250 us ACK reception watchdog of `id` fired. A correctly timed
    /// ACK still in flight defers the timeout.
    pub(crate) fn on_ack_timeout(&mut self, id: RadioId) {
        log::debug!("[{}] ACK watchdog fired", self.radios[id.0].name);
        let timed_out = if self.radios[id.0].ard_has_elapsed {
            true
        } else {
            match self.radios[id.0].tx_receive_ack_from {
                None => true,
                Some(peer) => !self.radios[peer.0].tx_in_progress,
            }
        };
        if timed_out {
            self.radios[id.0].rx_ack_timeout = true;
        } else {
            log::debug!(
                "[{}] ACK transmission in progress, not timing out",
                self.radios[id.0].name
            );
        }
        // the bounded reactor fixpoint lets STANDBY2 fall through to MAX_RT
        self.run_reactor(id);
    }
}
