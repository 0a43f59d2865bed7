//! The process-wide simulation context: module registry, clock domains,
//! loss configuration and the host-facing pin/SPI surface.

mod air;
pub(crate) mod loss;
mod state;
pub(crate) mod timer;
pub(crate) mod trace;

pub use loss::SimStats;
pub use timer::McuId;

use std::path::Path;

use crate::error::SimError;
use crate::radio::{Radio, RadioState};
use loss::LossConfig;
use timer::{TimerEvent, Timers};
use trace::TraceLog;

/// Handle for one simulated radio module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RadioId(pub(crate) usize);

/// One virtual air medium and every radio attached to it.
///
/// All global state of the model lives here: the module registry, the MCU
/// clock domains, the loss configuration and the delivery counters. The
/// host drives it through pin edges ([`csn`](Simulation::csn),
/// [`ce`](Simulation::ce)), SPI bytes
/// ([`spi_exchange`](Simulation::spi_exchange)) and its cycle counter
/// ([`advance`](Simulation::advance)); everything in between happens
/// synchronously on the caller's thread.
pub struct Simulation {
    pub(crate) radios: Vec<Radio>,
    pub(crate) timers: Timers,
    pub(crate) loss: LossConfig,
    pub(crate) stats: SimStats,
    stop_on_error: bool,
    finished: bool,
}

impl Simulation {
    pub fn new() -> Self {
        Simulation {
            radios: Vec::new(),
            timers: Timers::new(),
            loss: LossConfig::new(),
            stats: SimStats::default(),
            stop_on_error: false,
            finished: false,
        }
    }

    /// Register one MCU clock domain running at `frequency_hz`.
    pub fn add_mcu(&mut self, frequency_hz: u64) -> McuId {
        self.timers.add_mcu(frequency_hz)
    }

    /// Create a radio bound to `mcu`, initialized with the datasheet reset
    /// values: powered down, CSN deasserted, CE low, IRQ released.
    pub fn make_radio(&mut self, mcu: McuId, name: &str) -> RadioId {
        // index the clock domain early so a bad handle fails loudly
        let _ = self.timers.frequency(mcu);
        self.radios.push(Radio::new(mcu, name));
        log::info!("[{name}] radio registered");
        RadioId(self.radios.len() - 1)
    }

    /// Install the IRQ pin hook and drive it with the initial (released)
    /// level. The hook runs synchronously on every pin refresh and must not
    /// call back into the simulation.
    pub fn connect(&mut self, radio: RadioId, hook: impl FnMut(bool) + 'static) {
        self.radios[radio.0].irq_hook = Some(Box::new(hook));
        self.radios[radio.0].refresh_irq();
    }

    /// Route this radio's transmissions into a plain-text trace file.
    pub fn log_to_file(&mut self, radio: RadioId, path: impl AsRef<Path>) -> std::io::Result<()> {
        let name = self.radios[radio.0].name.clone();
        let trace = TraceLog::create(path.as_ref(), &name)?;
        self.radios[radio.0].trace = Some(trace);
        log::info!("[{name}] transmission logging enabled");
        Ok(())
    }

    /// Escalate every recoverable error to a fatal diagnostic.
    pub fn set_stop_on_error(&mut self, stop: bool) {
        self.stop_on_error = stop;
    }

    /// Drop 1 in `lost_packets` data frames and 1 in `lost_acks` ACK
    /// frames; 0 disables the respective class.
    pub fn set_lost_packets(&mut self, lost_packets: u32, lost_acks: u32) {
        self.loss.configure(lost_packets, lost_acks);
    }

    /// Reseed the loss RNG for reproducible runs.
    pub fn set_loss_seed(&mut self, seed: u64) {
        self.loss.seed(seed);
    }

    /// Chip-enable pin edge. Active high.
    pub fn ce(&mut self, radio: RadioId, level: bool) {
        self.radios[radio.0].pin_ce = level;
        self.run_reactor(radio);
    }

    /// Chip-select pin edge. Active low; the rising edge commits the open
    /// SPI transaction.
    pub fn csn(&mut self, radio: RadioId, level: bool) {
        self.radios[radio.0].pin_csn = level;
        if level {
            self.radios[radio.0].finish_spi();
            self.run_reactor(radio);
            self.refresh_irq(radio);
        }
    }

    /// Clock one byte over MOSI while CSN is low, returning the MISO byte.
    /// The first byte of every transaction answers with STATUS.
    pub fn spi_exchange(&mut self, radio: RadioId, mosi: u8) -> u8 {
        match self.radios[radio.0].spi_byte(mosi) {
            Ok(miso) => miso,
            Err(err) => {
                self.report(radio, &err);
                0xFF
            }
        }
    }

    /// Advance one MCU clock domain to `to_cycle`, firing every due timer
    /// callback in deadline order along the way.
    pub fn advance(&mut self, mcu: McuId, to_cycle: u64) {
        let to_cycle = to_cycle.max(self.timers.now(mcu));
        while let Some((due, radio, event)) = self.timers.pop_due(mcu, to_cycle) {
            self.timers.set_now(mcu, due);
            self.handle_event(radio, event);
        }
        self.timers.set_now(mcu, to_cycle);
    }

    /// Current cycle of an MCU clock domain.
    pub fn now(&self, mcu: McuId) -> u64 {
        self.timers.now(mcu)
    }

    /// Earliest pending callback of an MCU clock domain, if any.
    pub fn next_deadline(&self, mcu: McuId) -> Option<u64> {
        self.timers.next_deadline(mcu)
    }

    pub fn frequency(&self, mcu: McuId) -> u64 {
        self.timers.frequency(mcu)
    }

    pub fn mcu_of(&self, radio: RadioId) -> McuId {
        self.radios[radio.0].mcu
    }

    /// Current level of the active-low IRQ pin.
    pub fn irq_level(&self, radio: RadioId) -> bool {
        self.radios[radio.0].pin_irq
    }

    pub fn radio_state(&self, radio: RadioId) -> RadioState {
        self.radios[radio.0].state
    }

    pub fn name(&self, radio: RadioId) -> &str {
        &self.radios[radio.0].name
    }

    /// Delivery and loss counters accumulated so far.
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Log the delivery totals once and flush all trace files. Also runs on
    /// drop.
    pub fn shutdown(&mut self) {
        if !self.finished {
            self.finished = true;
            log::info!(
                "simulated loss of {} packets and {} ACK-packets",
                self.stats.lost_packets,
                self.stats.lost_acks
            );
            log::info!(
                "{} packets and {} ACK-packets successfully transmitted",
                self.stats.packets,
                self.stats.acks
            );
        }
        for radio in &mut self.radios {
            if let Some(trace) = radio.trace.as_mut() {
                trace.flush();
            }
        }
    }

    pub(crate) fn refresh_irq(&mut self, radio: RadioId) {
        self.radios[radio.0].refresh_irq();
    }

    fn handle_event(&mut self, radio: RadioId, event: TimerEvent) {
        match event {
            TimerEvent::SettleElapsed => self.on_settle_elapsed(radio),
            TimerEvent::TxFinished => self.on_tx_finished(radio),
            TimerEvent::ArdElapsed => self.on_ard_elapsed(radio),
            TimerEvent::AckTimeout => self.on_ack_timeout(radio),
        }
    }

    fn report(&self, radio: RadioId, err: &SimError) {
        let name = &self.radios[radio.0].name;
        if self.stop_on_error {
            panic!("[{name}] fatal: {err}");
        }
        log::error!("[{name}] {err}");
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation::new()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.shutdown();
    }
}
