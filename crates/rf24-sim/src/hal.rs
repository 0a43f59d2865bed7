//! `embedded-hal` 1.0 bindings for the simulated radio.
//!
//! Driver code written against [`SpiDevice`] and [`OutputPin`] — the traits
//! every nRF24L01 driver crate consumes — can run unchanged against a
//! simulated module: one SPI transaction maps to a CSN low/high pair with a
//! byte exchange per transferred byte, and `DelayNs` operations advance the
//! radio's MCU clock, firing due timer callbacks on the way.
//!
//! The simulation is shared behind `Rc<RefCell<_>>`; IRQ hooks must not
//! reenter it from inside a transaction.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};

use crate::sim::timer::ns_to_cycles;
use crate::{RadioId, Simulation};

/// Split one simulated radio into firmware-facing SPI and CE handles.
pub fn attach(sim: &Rc<RefCell<Simulation>>, radio: RadioId) -> (SpiHandle, CePin) {
    (
        SpiHandle {
            sim: sim.clone(),
            radio,
        },
        CePin {
            sim: sim.clone(),
            radio,
        },
    )
}

/// The firmware side of the radio's SPI port.
pub struct SpiHandle {
    sim: Rc<RefCell<Simulation>>,
    radio: RadioId,
}

impl SpiErrorType for SpiHandle {
    type Error = Infallible;
}

impl SpiDevice for SpiHandle {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut sim = self.sim.borrow_mut();
        sim.csn(self.radio, false);
        for operation in operations.iter_mut() {
            match operation {
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = sim.spi_exchange(self.radio, 0);
                    }
                }
                Operation::Write(buf) => {
                    for byte in buf.iter() {
                        sim.spi_exchange(self.radio, *byte);
                    }
                }
                Operation::Transfer(read, write) => {
                    let len = read.len().max(write.len());
                    for index in 0..len {
                        let mosi = write.get(index).copied().unwrap_or(0);
                        let miso = sim.spi_exchange(self.radio, mosi);
                        if let Some(slot) = read.get_mut(index) {
                            *slot = miso;
                        }
                    }
                }
                Operation::TransferInPlace(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = sim.spi_exchange(self.radio, *byte);
                    }
                }
                Operation::DelayNs(ns) => {
                    let mcu = sim.mcu_of(self.radio);
                    let target =
                        sim.now(mcu) + ns_to_cycles(*ns as u64, sim.frequency(mcu));
                    sim.advance(mcu, target);
                }
            }
        }
        sim.csn(self.radio, true);
        Ok(())
    }
}

/// The firmware side of the radio's chip-enable pin.
pub struct CePin {
    sim: Rc<RefCell<Simulation>>,
    radio: RadioId,
}

impl PinErrorType for CePin {
    type Error = Infallible;
}

impl OutputPin for CePin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.sim.borrow_mut().ce(self.radio, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.sim.borrow_mut().ce(self.radio, true);
        Ok(())
    }
}
