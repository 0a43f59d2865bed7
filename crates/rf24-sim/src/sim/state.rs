//! The per-radio state machine reactor.
//!
//! Edge-triggered: runs after every SPI commit, CE edge and timer callback.
//! One invocation steps the state machine to a fixpoint (bounded to two
//! iterations, enough for the STANDBY2 -> MAX_RT -> STANDBY1 fall) and then
//! tries to put a frame on air.

use crate::radio::constants::timing;
use crate::radio::packet::{TxKind, TxPacket};
use crate::radio::RadioState;
use crate::radio::SpiState;

use super::air::airtime_us;
use super::timer::TimerEvent;
use super::{RadioId, Simulation};

impl Simulation {
    /// Run the reactor for one radio until its state settles, then kick off
    /// any transmission the new state allows.
    pub(crate) fn run_reactor(&mut self, id: RadioId) {
        for _ in 0..2 {
            let before = self.radios[id.0].state;
            self.step_state(id);
            if self.radios[id.0].state == before {
                break;
            }
        }
        self.start_tx(id);
        self.start_tx_ack(id);
    }

    /// A settling timer ran out: promote the radio to its pending state.
    pub(crate) fn on_settle_elapsed(&mut self, id: RadioId) {
        let (mcu, wait_ack) = {
            let radio = &mut self.radios[id.0];
            log::debug!(
                "[{}] settling done, {:?} -> {:?}",
                radio.name,
                radio.state,
                radio.state_next
            );
            radio.state = radio.state_next;
            (radio.mcu, radio.tx_wait_for_ack)
        };
        if wait_ack {
            // PTX entered the listen-for-ACK window; arm its watchdog
            self.timers
                .schedule_us(mcu, id, timing::ACK_WAIT_US, TimerEvent::AckTimeout);
        }
        self.run_reactor(id);
    }

    fn set_state(&mut self, id: RadioId, state: RadioState) {
        self.radios[id.0].state = state;
    }

    /// Enter a settling state and arm the timer that completes it. Both
    /// `state` and `state_next` are written so a stray earlier timer cannot
    /// promote the radio somewhere stale.
    fn begin_settling(&mut self, id: RadioId, settling: RadioState, next: RadioState, delay_us: u64) {
        let mcu = {
            let radio = &mut self.radios[id.0];
            radio.state = settling;
            radio.state_next = next;
            radio.mcu
        };
        self.timers
            .schedule_us(mcu, id, delay_us, TimerEvent::SettleElapsed);
    }

    fn step_state(&mut self, id: RadioId) {
        let (state, config, ce, tx_empty) = {
            let radio = &self.radios[id.0];
            (
                radio.state,
                radio.regs.config(),
                radio.pin_ce,
                radio.fifo_tx.is_empty(),
            )
        };
        match state {
            RadioState::PowerDown => {
                if config.pwr_up() {
                    log::info!("[{}] waking up", self.radios[id.0].name);
                    self.begin_settling(
                        id,
                        RadioState::StartUp,
                        RadioState::Standby1,
                        timing::START_UP_US,
                    );
                }
            }

            RadioState::StartUp => {}

            RadioState::Standby1 => {
                if !config.pwr_up() {
                    log::info!("[{}] going to power down", self.radios[id.0].name);
                    self.set_state(id, RadioState::PowerDown);
                } else if !config.prim_rx() && ce && !tx_empty {
                    log::info!("[{}] going to TX mode", self.radios[id.0].name);
                    self.begin_settling(
                        id,
                        RadioState::TxSettling,
                        RadioState::TxMode,
                        timing::CE_HOLD_US + timing::SETTLE_US,
                    );
                } else if config.prim_rx() && ce {
                    log::info!("[{}] going to RX mode", self.radios[id.0].name);
                    self.begin_settling(
                        id,
                        RadioState::RxSettling,
                        RadioState::RxMode,
                        timing::SETTLE_US,
                    );
                } else if !config.prim_rx() && ce && tx_empty {
                    log::info!(
                        "[{}] no packets to TX, going into Standby2",
                        self.radios[id.0].name
                    );
                    self.set_state(id, RadioState::Standby2);
                } else {
                    let radio = &self.radios[id.0];
                    log::debug!(
                        "[{}] no action, remaining in Standby1, CE={} CSN={} IRQ={}",
                        radio.name,
                        radio.pin_ce as u8,
                        radio.pin_csn as u8,
                        radio.pin_irq as u8
                    );
                }
            }

            RadioState::RxSettling => {
                if !config.pwr_up() {
                    // a settling timer may still fire; pin state_next too
                    log::info!("[{}] going to power down", self.radios[id.0].name);
                    self.set_state(id, RadioState::PowerDown);
                    self.radios[id.0].state_next = RadioState::PowerDown;
                } else if !ce {
                    log::info!(
                        "[{}] RX settling aborted because CE went low, going into Standby1",
                        self.radios[id.0].name
                    );
                    self.set_state(id, RadioState::Standby1);
                    self.radios[id.0].state_next = RadioState::Standby1;
                }
            }

            RadioState::TxSettling => {
                if !config.pwr_up() {
                    log::info!("[{}] going to power down", self.radios[id.0].name);
                    self.set_state(id, RadioState::PowerDown);
                    self.radios[id.0].state_next = RadioState::PowerDown;
                }
            }

            RadioState::TxMode => {
                let (tx_finished, wait_ack) = {
                    let radio = &self.radios[id.0];
                    (radio.tx_finished, radio.tx_wait_for_ack)
                };
                if tx_finished && wait_ack {
                    log::info!(
                        "[{}] going into RX mode to receive ACK",
                        self.radios[id.0].name
                    );
                    self.radios[id.0].tx_finished = false;
                    self.begin_settling(
                        id,
                        RadioState::RxSettlingForAck,
                        RadioState::RxModeForAck,
                        timing::SETTLE_US,
                    );
                } else if tx_finished && !ce {
                    log::info!("[{}] going to Standby1", self.radios[id.0].name);
                    self.radios[id.0].tx_finished = false;
                    self.set_state(id, RadioState::Standby1);
                } else if !config.pwr_up() {
                    log::info!("[{}] going to power down", self.radios[id.0].name);
                    self.set_state(id, RadioState::PowerDown);
                } else if ce && tx_empty {
                    log::info!(
                        "[{}] no packets to TX, going into Standby2",
                        self.radios[id.0].name
                    );
                    self.set_state(id, RadioState::Standby2);
                }
            }

            RadioState::RxMode => {
                if !ce {
                    log::info!("[{}] leaving RX mode for Standby1", self.radios[id.0].name);
                    self.set_state(id, RadioState::Standby1);
                } else if !config.pwr_up() {
                    log::info!("[{}] going to power down", self.radios[id.0].name);
                    self.set_state(id, RadioState::PowerDown);
                }
            }

            RadioState::Standby2 => {
                if !config.pwr_up() {
                    log::info!("[{}] going to power down", self.radios[id.0].name);
                    self.set_state(id, RadioState::PowerDown);
                } else if ce && !tx_empty {
                    log::info!("[{}] going to TX mode", self.radios[id.0].name);
                    self.begin_settling(
                        id,
                        RadioState::TxSettling,
                        RadioState::TxMode,
                        timing::SETTLE_US,
                    );
                } else if self.radios[id.0].tx_wait_for_ack && self.radios[id.0].ard_has_elapsed {
                    // keep the ACK watchdog from rearming before the
                    // retransmission has even started
                    self.radios[id.0].tx_wait_for_ack = false;
                    log::info!("[{}] ARD has elapsed", self.radios[id.0].name);
                    let retr = self.radios[id.0].regs.setup_retr();
                    if self.radios[id.0].nb_retries == retr.arc() {
                        log::info!(
                            "[{}] ARC reached, setting MAX_RT, going into Standby1",
                            self.radios[id.0].name
                        );
                        let radio = &mut self.radios[id.0];
                        let status = radio.regs.status().with_max_rt(true);
                        radio.regs.set_status(status);
                        let observe = radio.regs.observe_tx();
                        let plos = observe.plos_cnt().saturating_add(1).min(15);
                        radio.regs.set_observe_tx(observe.with_plos_cnt(plos));
                        self.refresh_irq(id);
                        self.set_state(id, RadioState::Standby1);
                    } else {
                        log::info!("[{}] going into TX to send again", self.radios[id.0].name);
                        let radio = &mut self.radios[id.0];
                        radio.nb_retries += 1;
                        let observe = radio.regs.observe_tx().with_arc_cnt(radio.nb_retries);
                        radio.regs.set_observe_tx(observe);
                        self.begin_settling(
                            id,
                            RadioState::TxSettling,
                            RadioState::TxMode,
                            timing::SETTLE_US,
                        );
                    }
                }
            }

            RadioState::RxSettlingForAck => {}

            RadioState::RxModeForAck => {
                if self.radios[id.0].tx_ack_received {
                    log::info!("[{}] ACK received, going into Standby1", self.radios[id.0].name);
                    let radio = &mut self.radios[id.0];
                    radio.state = RadioState::Standby1;
                    radio.tx_wait_for_ack = false;
                    radio.tx_receive_ack_from = None;
                    radio.rx_send_ack_to = None;
                } else if self.radios[id.0].rx_ack_timeout {
                    log::info!(
                        "[{}] timeout while waiting for ACK, going into Standby2",
                        self.radios[id.0].name
                    );
                    let radio = &mut self.radios[id.0];
                    radio.rx_ack_timeout = false;
                    radio.state = RadioState::Standby2;
                }
            }

            RadioState::TxSettlingForAck => {}

            RadioState::TxModeForAck => {
                if self.radios[id.0].tx_finished {
                    self.radios[id.0].tx_finished = false;
                    if ce {
                        log::info!(
                            "[{}] ACK transmitted, going back to RX mode",
                            self.radios[id.0].name
                        );
                        self.begin_settling(
                            id,
                            RadioState::RxSettling,
                            RadioState::RxMode,
                            timing::SETTLE_US,
                        );
                    } else {
                        log::info!(
                            "[{}] ACK transmitted, CE is low, going into Standby1",
                            self.radios[id.0].name
                        );
                        self.set_state(id, RadioState::Standby1);
                    }
                }
            }
        }
    }

    /// Copy the head TX packet into the on-air slot and arm its airtime
    /// timer. Only fires in `TX_MODE` with no frame on air and the SPI bus
    /// quiet.
    fn start_tx(&mut self, id: RadioId) {
        {
            let radio = &self.radios[id.0];
            if radio.state != RadioState::TxMode
                || radio.tx_in_progress
                || radio.spi.state != SpiState::Idle
            {
                return;
            }
        }
        let Some(packet) = self.radios[id.0].fifo_tx.head().cloned() else {
            return;
        };
        let TxKind::Regular { addr_width, .. } = packet.kind else {
            panic!(
                "internal invariant violated: ack-payload at head of {}'s TX FIFO in TX mode",
                self.radios[id.0].name
            );
        };
        let payload_bytes = packet.payload.len();
        let (mcu, airtime) = {
            let radio = &self.radios[id.0];
            let crc_bytes = if radio.regs.config().crco() { 2 } else { 1 };
            let rate = radio.regs.rf_setup().data_rate();
            (radio.mcu, airtime_us(addr_width, payload_bytes, crc_bytes, rate))
        };
        log::info!(
            "[{}] transmitting {} bytes of payload, time on air is {} us",
            self.radios[id.0].name,
            payload_bytes,
            airtime
        );
        self.trace_tx(id, false, payload_bytes);
        self.radios[id.0].packet_being_sent = Some(packet);
        self.timers
            .schedule_us(mcu, id, airtime, TimerEvent::TxFinished);
        self.radios[id.0].tx_in_progress = true;
    }

    /// Synthesize the ACK frame a PRX answers with, possibly carrying a
    /// queued ack-payload for the pipe the packet came in on.
    fn start_tx_ack(&mut self, id: RadioId) {
        {
            let radio = &self.radios[id.0];
            if radio.state != RadioState::TxModeForAck
                || radio.tx_in_progress
                || radio.spi.state != SpiState::Idle
            {
                return;
            }
        }
        let pipe = match self.radios[id.0].last_rx.as_ref() {
            Some(last_rx) => last_rx.pipe,
            None => panic!(
                "internal invariant violated: {} must ACK but never received a packet",
                self.radios[id.0].name
            ),
        };
        let use_ack_payload = {
            let radio = &self.radios[id.0];
            radio.regs.feature().en_ack_pay() && !radio.fifo_tx.is_empty()
        };
        let packet = if use_ack_payload {
            log::debug!(
                "[{}] EN_ACK_PAY enabled, pending ACK-payload will be sent",
                self.radios[id.0].name
            );
            let index = self.radios[id.0]
                .fifo_tx
                .iter()
                .position(|entry| entry.kind == TxKind::AckPayload { pipe });
            let Some(index) = index else {
                panic!(
                    "internal invariant violated: no ack-payload for pipe {} on {}",
                    pipe, self.radios[id.0].name
                );
            };
            let packet = self.radios[id.0].fifo_tx.remove(index);
            self.radios[id.0].update_fifo_status();
            self.refresh_irq(id);
            packet
        } else {
            log::debug!(
                "[{}] no pending ACK-payload, sending empty ACK",
                self.radios[id.0].name
            );
            TxPacket::empty_ack(pipe)
        };
        let payload_bytes = packet.payload.len();
        let (mcu, airtime) = {
            let radio = &self.radios[id.0];
            let addr_width = radio.regs.setup_aw().address_width();
            let crc_bytes = if radio.regs.config().crco() { 2 } else { 1 };
            let rate = radio.regs.rf_setup().data_rate();
            (radio.mcu, airtime_us(addr_width, payload_bytes, crc_bytes, rate))
        };
        let peer_name = self.radios[id.0]
            .rx_send_ack_to
            .map(|peer| self.radios[peer.0].name.clone())
            .unwrap_or_default();
        log::info!(
            "[{}] transmitting ACK with {} bytes payload to {}, time on air is {} us",
            self.radios[id.0].name,
            payload_bytes,
            peer_name,
            airtime
        );
        self.trace_tx(id, true, payload_bytes);
        self.radios[id.0].packet_being_sent = Some(packet);
        self.timers
            .schedule_us(mcu, id, airtime, TimerEvent::TxFinished);
        self.radios[id.0].tx_in_progress = true;
    }

    fn trace_tx(&mut self, id: RadioId, is_ack: bool, payload_bytes: usize) {
        let mcu = self.radios[id.0].mcu;
        let cycle = self.timers.now(mcu);
        let frequency_hz = self.timers.frequency(mcu);
        if let Some(trace) = self.radios[id.0].trace.as_mut() {
            trace.log_tx(cycle, frequency_hz, is_ack, payload_bytes);
        }
    }
}
