//! Byte-level SPI command decoding.
//!
//! While CSN is low every MOSI byte produces one MISO byte; the first byte
//! of a transaction always answers with STATUS. Side effects that the real
//! chip applies when the transaction ends (register commits, FIFO pushes
//! and pops) are deferred to [`Radio::finish_spi`], which the simulation
//! runs on the CSN rising edge.

use super::constants::{commands, registers, MAX_PAYLOAD};
use super::packet::{Payload, TxKind, TxPacket};
use super::registers::RegisterFile;
use super::Radio;
use crate::error::SimError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SpiState {
    Idle,
    ReadRegister,
    WriteRegister,
    WriteTxPayload,
    ReadRxPayload,
    ReadPayloadWidth,
    WriteAckPayload,
}

/// State of the SPI transaction currently open (CSN low).
#[derive(Debug)]
pub(crate) struct SpiTransaction {
    pub state: SpiState,
    reg_index: u8,
    value: u64,
    width: u8,
    nb_bytes: u8,
    rx_readpos: u8,
    staged: Option<TxPacket>,
}

impl SpiTransaction {
    pub fn new() -> Self {
        SpiTransaction {
            state: SpiState::Idle,
            reg_index: 0,
            value: 0,
            width: 0,
            nb_bytes: 0,
            rx_readpos: 0,
            staged: None,
        }
    }
}

impl Radio {
    /// Decode one MOSI byte, returning the MISO byte.
    ///
    /// Recoverable decode errors leave both the register file and the
    /// transaction state untouched; the caller decides whether to escalate.
    pub fn spi_byte(&mut self, mosi: u8) -> Result<u8, SimError> {
        match self.spi.state {
            SpiState::Idle => self.decode_command(mosi),
            SpiState::ReadRegister => {
                if self.spi.nb_bytes < self.spi.width {
                    let byte = (self.spi.value >> (8 * self.spi.nb_bytes)) as u8;
                    self.spi.nb_bytes += 1;
                    Ok(byte)
                } else {
                    log::warn!(
                        "[{}] tried to read more bytes than available from register 0x{:02X}",
                        self.name,
                        self.spi.reg_index
                    );
                    Ok(0xFF)
                }
            }
            SpiState::WriteRegister => {
                if self.spi.nb_bytes < self.spi.width {
                    self.spi.value |= (mosi as u64) << (8 * self.spi.nb_bytes);
                    self.spi.nb_bytes += 1;
                } else {
                    log::warn!(
                        "[{}] tried to write more bytes than possible to register 0x{:02X}",
                        self.name,
                        self.spi.reg_index
                    );
                }
                Ok(0xFF)
            }
            SpiState::WriteTxPayload | SpiState::WriteAckPayload => {
                let staged = self.spi.staged.as_mut().unwrap_or_else(|| {
                    panic!("internal invariant violated: payload transaction without staged packet")
                });
                if staged.payload.len() == MAX_PAYLOAD {
                    return Err(SimError::PayloadOverflow);
                }
                staged.payload.push(mosi);
                Ok(0xFF)
            }
            SpiState::ReadRxPayload => {
                let pos = self.spi.rx_readpos;
                let head = self.fifo_rx.head().ok_or(SimError::FifoEmpty)?;
                if pos as usize == head.payload.len() {
                    return Err(SimError::PayloadOverflow);
                }
                self.spi.rx_readpos += 1;
                Ok(head.payload[pos as usize])
            }
            SpiState::ReadPayloadWidth => {
                Ok(self.fifo_rx.head().map_or(0, |head| head.payload.len() as u8))
            }
        }
    }

    /// The first byte of a transaction: an opcode. STATUS goes out on MISO.
    fn decode_command(&mut self, opcode: u8) -> Result<u8, SimError> {
        let status_byte = self.regs.read(registers::STATUS) as u8;
        match opcode {
            commands::NOP => Ok(status_byte),
            _ if opcode & 0xE0 == commands::R_REGISTER => {
                let reg = opcode & 0x1F;
                self.spi.reg_index = reg;
                self.spi.value = self.regs.read(reg);
                self.spi.nb_bytes = 0;
                self.spi.width = RegisterFile::width_of(reg);
                self.spi.state = SpiState::ReadRegister;
                if self.spi.width == 0 {
                    return Err(SimError::ReservedRegister(reg));
                }
                Ok(status_byte)
            }
            _ if opcode & 0xE0 == commands::W_REGISTER => {
                let reg = opcode & 0x1F;
                self.spi.reg_index = reg;
                self.spi.value = 0;
                self.spi.nb_bytes = 0;
                self.spi.width = RegisterFile::width_of(reg);
                self.spi.state = SpiState::WriteRegister;
                if self.spi.width == 0 {
                    return Err(SimError::ReservedRegister(reg));
                }
                Ok(status_byte)
            }
            commands::R_RX_PAYLOAD => {
                log::debug!("[{}] command R_RX_PAYLOAD", self.name);
                if self.fifo_rx.is_empty() {
                    return Err(SimError::FifoEmpty);
                }
                self.spi.rx_readpos = 0;
                self.spi.state = SpiState::ReadRxPayload;
                Ok(status_byte)
            }
            commands::W_TX_PAYLOAD => {
                log::debug!("[{}] command W_TX_PAYLOAD", self.name);
                if self.fifo_tx.is_full() {
                    return Err(SimError::FifoFull);
                }
                self.spi.staged = Some(TxPacket {
                    kind: TxKind::Regular {
                        addr_width: self.regs.setup_aw().address_width(),
                        addr: self.regs.read(registers::TX_ADDR),
                    },
                    pid: 0,
                    payload: Payload::new(),
                });
                self.spi.state = SpiState::WriteTxPayload;
                Ok(status_byte)
            }
            commands::FLUSH_TX => {
                log::debug!("[{}] flush TX", self.name);
                self.fifo_tx.clear();
                self.update_fifo_status();
                Ok(status_byte)
            }
            commands::FLUSH_RX => {
                log::debug!("[{}] flush RX", self.name);
                self.fifo_rx.clear();
                self.update_fifo_status();
                Ok(status_byte)
            }
            commands::R_RX_PL_WID => {
                self.spi.state = SpiState::ReadPayloadWidth;
                Ok(status_byte)
            }
            _ if opcode & 0xF8 == commands::W_ACK_PAYLOAD => {
                let pipe = opcode & 0x07;
                log::debug!("[{}] command W_ACK_PAYLOAD pipe {}", self.name, pipe);
                if self.fifo_tx.is_full() {
                    return Err(SimError::FifoFull);
                }
                self.spi.staged = Some(TxPacket {
                    kind: TxKind::AckPayload { pipe },
                    pid: 0,
                    payload: Payload::new(),
                });
                self.spi.state = SpiState::WriteAckPayload;
                Ok(status_byte)
            }
            commands::REUSE_TX_PL => Err(SimError::Unimplemented("REUSE_TX_PL")),
            commands::W_TX_PAYLOAD_NO_ACK => Err(SimError::Unimplemented("W_TX_PAYLOAD_NOACK")),
            _ => Err(SimError::BadCommand(opcode)),
        }
    }

    /// Commit the open transaction; runs on the CSN rising edge.
    pub fn finish_spi(&mut self) {
        log::trace!("[{}] SPI transaction finished", self.name);
        match self.spi.state {
            SpiState::Idle | SpiState::ReadRegister | SpiState::ReadPayloadWidth => {}
            SpiState::WriteRegister => self.commit_register_write(),
            SpiState::WriteTxPayload => {
                let mut packet = self.take_staged();
                packet.pid = self.pid;
                self.pid = (self.pid + 1) & 3;
                self.fifo_tx.push(packet);
                self.update_fifo_status();
                self.tx_in_progress = false;
                self.tx_finished = false;
                self.ard_has_elapsed = false;
                self.rx_ack_timeout = false;
                self.nb_retries = 0;
                let observe = self.regs.observe_tx().with_arc_cnt(0);
                self.regs.set_observe_tx(observe);
            }
            SpiState::ReadRxPayload => {
                self.fifo_rx.pop_front();
                self.update_fifo_status();
            }
            SpiState::WriteAckPayload => {
                let packet = self.take_staged();
                self.fifo_tx.push(packet);
                self.update_fifo_status();
            }
        }
        self.spi.state = SpiState::Idle;
    }

    fn take_staged(&mut self) -> TxPacket {
        self.spi.staged.take().unwrap_or_else(|| {
            panic!("internal invariant violated: payload commit without staged packet")
        })
    }

    fn commit_register_write(&mut self) {
        let value = self.spi.value;
        match self.spi.reg_index {
            // Interrupt flags are write-one-to-clear; the derived bits stay
            // under simulator control.
            registers::STATUS => {
                let written = super::bit_fields::Status::from_bits(value as u8);
                let mut status = self.regs.status();
                if written.rx_dr() {
                    status.set_rx_dr(false);
                }
                if written.tx_ds() {
                    status.set_tx_ds(false);
                }
                if written.max_rt() {
                    status.set_max_rt(false);
                }
                self.regs.set_status(status);
            }
            registers::RF_CH => {
                self.regs.write(registers::RF_CH, value);
                let observe = self.regs.observe_tx().with_plos_cnt(0);
                self.regs.set_observe_tx(observe);
            }
            reg => self.regs.write(reg, value),
        }
    }
}
