//! A cycle-driven software model of the Nordic nRF24L01+ 2.4 GHz packet
//! radio, meant to live inside an MCU instruction simulator so firmware
//! written for the real chip can be exercised end to end without hardware.
//!
//! One [`Simulation`] owns any number of radios sharing the same virtual
//! air. Each radio models the SPI command/register/FIFO interface a driver
//! sees, the power/RX/TX state machine with datasheet settling and
//! retransmission timing, the Enhanced ShockBurst ACK protocol between
//! modules (auto-ACK, auto-retransmit, ACK payloads, dynamic pipe
//! addressing, duplicate suppression, probabilistic loss) and the
//! active-low IRQ line toward the host MCU.
//!
//! The host drives pins and SPI bytes and owns time: it advances each MCU's
//! cycle counter through [`Simulation::advance`], and the model schedules
//! its settling, airtime and retransmission callbacks on those clocks. The
//! whole core is single-threaded and never blocks.
//!
//! ```
//! use rf24sim::Simulation;
//!
//! let mut sim = Simulation::new();
//! let mcu = sim.add_mcu(8_000_000);
//! let radio = sim.make_radio(mcu, "nRF1");
//!
//! // power up through the SPI interface, like firmware would
//! sim.csn(radio, false);
//! sim.spi_exchange(radio, 0x20); // W_REGISTER CONFIG
//! sim.spi_exchange(radio, 0x0A); // EN_CRC | PWR_UP
//! sim.csn(radio, true);
//!
//! sim.advance(mcu, 12_000); // 1.5 ms at 8 MHz
//! assert_eq!(sim.radio_state(radio), rf24sim::RadioState::Standby1);
//! ```

mod error;
pub mod hal;
mod radio;
mod sim;
mod types;

pub use error::SimError;
pub use radio::constants;
pub use radio::RadioState;
pub use sim::{McuId, RadioId, SimStats, Simulation};
pub use types::DataRate;

/// Cap the verbosity of the model's `log` output; a convenience wrapper for
/// hosts that do not configure a logger themselves.
pub fn set_log_level(level: log::LevelFilter) {
    log::set_max_level(level);
}
