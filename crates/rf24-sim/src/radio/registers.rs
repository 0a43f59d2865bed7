use super::bit_fields::{Config, Feature, FifoStatus, ObserveTx, RfSetup, SetupAw, SetupRetr, Status};
use super::constants::{registers, REG_COUNT, REG_WIDTHS};

/// The configuration register file.
///
/// Registers are between 8 and 40 bits wide; everything is backed by a `u64`
/// and the per-address width table decides how many bytes the SPI decoder
/// streams. Bit-level views of the single-byte registers are provided
/// through the `bitfield` types.
#[derive(Debug)]
pub(crate) struct RegisterFile {
    regs: [u64; REG_COUNT],
}

impl RegisterFile {
    /// Datasheet reset values.
    pub fn new() -> Self {
        let mut regs = [0u64; REG_COUNT];
        regs[registers::CONFIG as usize] = Config::new().with_en_crc(true).into_bits() as u64;
        regs[registers::EN_AA as usize] = 0x3F;
        regs[registers::EN_RXADDR as usize] = 0x03;
        regs[registers::SETUP_AW as usize] = 0b11;
        regs[registers::SETUP_RETR as usize] = SetupRetr::new().with_arc(3).into_bits() as u64;
        regs[registers::RF_CH as usize] = 2;
        regs[registers::RF_SETUP as usize] =
            RfSetup::new().with_rf_dr_high(true).with_rf_pwr(0b11).into_bits() as u64;
        regs[registers::STATUS as usize] = Status::new().with_rx_p_no(0b111).into_bits() as u64;
        regs[registers::RX_ADDR_P0 as usize] = 0xE7E7E7E7E7;
        regs[registers::RX_ADDR_P1 as usize] = 0xC2C2C2C2C2;
        regs[registers::RX_ADDR_P2 as usize] = 0xC3;
        regs[registers::RX_ADDR_P3 as usize] = 0xC4;
        regs[registers::RX_ADDR_P4 as usize] = 0xC5;
        regs[registers::RX_ADDR_P5 as usize] = 0xC6;
        regs[registers::TX_ADDR as usize] = 0xE7E7E7E7E7;
        regs[registers::FIFO_STATUS as usize] =
            FifoStatus::new().with_tx_empty(true).with_rx_empty(true).into_bits() as u64;
        RegisterFile { regs }
    }

    /// Width of `addr` in bytes; 0 for reserved addresses.
    pub fn width_of(addr: u8) -> u8 {
        REG_WIDTHS[addr as usize & 0x1F]
    }

    pub fn read(&self, addr: u8) -> u64 {
        self.regs[addr as usize]
    }

    pub fn write(&mut self, addr: u8, value: u64) {
        self.regs[addr as usize] = value;
    }

    pub fn config(&self) -> Config {
        Config::from_bits(self.regs[registers::CONFIG as usize] as u8)
    }

    pub fn status(&self) -> Status {
        Status::from_bits(self.regs[registers::STATUS as usize] as u8)
    }

    pub fn set_status(&mut self, status: Status) {
        self.regs[registers::STATUS as usize] = status.into_bits() as u64;
    }

    pub fn fifo_status(&self) -> FifoStatus {
        FifoStatus::from_bits(self.regs[registers::FIFO_STATUS as usize] as u8)
    }

    pub fn set_fifo_status(&mut self, fifo_status: FifoStatus) {
        self.regs[registers::FIFO_STATUS as usize] = fifo_status.into_bits() as u64;
    }

    pub fn setup_aw(&self) -> SetupAw {
        SetupAw::from_bits(self.regs[registers::SETUP_AW as usize] as u8)
    }

    pub fn setup_retr(&self) -> SetupRetr {
        SetupRetr::from_bits(self.regs[registers::SETUP_RETR as usize] as u8)
    }

    pub fn rf_setup(&self) -> RfSetup {
        RfSetup::from_bits(self.regs[registers::RF_SETUP as usize] as u8)
    }

    pub fn observe_tx(&self) -> ObserveTx {
        ObserveTx::from_bits(self.regs[registers::OBSERVE_TX as usize] as u8)
    }

    pub fn set_observe_tx(&mut self, observe: ObserveTx) {
        self.regs[registers::OBSERVE_TX as usize] = observe.into_bits() as u64;
    }

    pub fn feature(&self) -> Feature {
        Feature::from_bits(self.regs[registers::FEATURE as usize] as u8)
    }

    /// Is pipe `n` enabled in `EN_RXADDR`?
    pub fn rx_pipe_enabled(&self, pipe: u8) -> bool {
        self.regs[registers::EN_RXADDR as usize] & (1 << pipe) != 0
    }

    /// Is auto-ACK enabled for pipe `n` in `EN_AA`?
    pub fn auto_ack_enabled(&self, pipe: u8) -> bool {
        self.regs[registers::EN_AA as usize] & (1 << pipe) != 0
    }

    /// The six effective pipe addresses, masked to the configured address
    /// width. Pipes 2..=5 inherit everything but the low byte from pipe 1.
    pub fn pipe_addresses(&self) -> [u64; 6] {
        let width = self.setup_aw().address_width() as u64;
        let mask = (1u64 << (8 * width)) - 1;
        let p1 = self.regs[registers::RX_ADDR_P1 as usize];
        let mut pipes = [0u64; 6];
        pipes[0] = self.regs[registers::RX_ADDR_P0 as usize] & mask;
        pipes[1] = p1 & mask;
        for pipe in 2..6 {
            let low = self.regs[(registers::RX_ADDR_P2 + pipe - 2) as usize];
            pipes[pipe as usize] = ((p1 & 0xFF_FF_FF_FF_00) | low) & mask;
        }
        pipes
    }
}
