/// Register offsets of the nRF24L01+.
pub mod registers {
    pub const CONFIG: u8 = 0x00;
    pub const EN_AA: u8 = 0x01;
    pub const EN_RXADDR: u8 = 0x02;
    pub const SETUP_AW: u8 = 0x03;
    pub const SETUP_RETR: u8 = 0x04;
    pub const RF_CH: u8 = 0x05;
    pub const RF_SETUP: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    pub const OBSERVE_TX: u8 = 0x08;
    pub const RPD: u8 = 0x09;
    pub const RX_ADDR_P0: u8 = 0x0A;
    pub const RX_ADDR_P1: u8 = 0x0B;
    pub const RX_ADDR_P2: u8 = 0x0C;
    pub const RX_ADDR_P3: u8 = 0x0D;
    pub const RX_ADDR_P4: u8 = 0x0E;
    pub const RX_ADDR_P5: u8 = 0x0F;
    pub const TX_ADDR: u8 = 0x10;
    pub const RX_PW_P0: u8 = 0x11;
    pub const RX_PW_P1: u8 = 0x12;
    pub const RX_PW_P2: u8 = 0x13;
    pub const RX_PW_P3: u8 = 0x14;
    pub const RX_PW_P4: u8 = 0x15;
    pub const RX_PW_P5: u8 = 0x16;
    pub const FIFO_STATUS: u8 = 0x17;
    // 0x18..=0x1B are reserved
    pub const DYNPD: u8 = 0x1C;
    pub const FEATURE: u8 = 0x1D;
}

/// SPI command opcodes.
pub mod commands {
    pub const R_REGISTER: u8 = 0x00;
    pub const W_REGISTER: u8 = 0x20;
    pub const R_RX_PL_WID: u8 = 0x60;
    pub const R_RX_PAYLOAD: u8 = 0x61;
    pub const W_TX_PAYLOAD: u8 = 0xA0;
    pub const W_ACK_PAYLOAD: u8 = 0xA8;
    pub const W_TX_PAYLOAD_NO_ACK: u8 = 0xB0;
    pub const FLUSH_TX: u8 = 0xE1;
    pub const FLUSH_RX: u8 = 0xE2;
    pub const REUSE_TX_PL: u8 = 0xE3;
    pub const NOP: u8 = 0xFF;
}

/// Bit mnemonics shared between STATUS and CONFIG.
pub mod mnemonics {
    pub const MASK_RX_DR: u8 = 1 << 6;
    pub const MASK_TX_DS: u8 = 1 << 5;
    pub const MASK_MAX_RT: u8 = 1 << 4;
}

/// Analog settling and protocol delays, per the datasheet.
pub mod timing {
    /// Power-down to Standby-I.
    pub const START_UP_US: u64 = 1500;
    /// RX/TX settling between active modes.
    pub const SETTLE_US: u64 = 130;
    /// CE must be held for 10 us before a transmission; folded into the
    /// Standby-I to TX settling delay.
    pub const CE_HOLD_US: u64 = 10;
    /// How long a PTX listens for an ACK before giving up (datasheet p. 59).
    pub const ACK_WAIT_US: u64 = 250;
    /// Granularity of the auto-retransmit delay field.
    pub const ARD_STEP_US: u64 = 250;
}

pub const REG_COUNT: usize = 30;

/// Width in bytes of each register, indexed by address. The three address
/// registers are 5 bytes wide, reserved addresses decode with width 0.
pub const REG_WIDTHS: [u8; REG_COUNT] = [
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // CONFIG..RPD
    5, 5, 1, 1, 1, 1, // RX_ADDR_P0..P5
    5, // TX_ADDR
    1, 1, 1, 1, 1, 1, // RX_PW_P0..P5
    1, // FIFO_STATUS
    0, 0, 0, 0, // reserved
    1, 1, // DYNPD, FEATURE
];

/// Depth of both the TX and RX FIFO.
pub const FIFO_CAPACITY: usize = 3;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = 32;

/// Preamble (1 byte) plus the 9 packet-control bits every ESB frame carries
/// on air besides address, payload and CRC.
pub const FRAME_OVERHEAD_BITS: u64 = 9;
