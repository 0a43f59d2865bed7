use bitfield_struct::bitfield;

use crate::types::DataRate;

/// The CONFIG register as the simulated chip sees it: interrupt masks,
/// CRC setup, power and role selection.
#[bitfield(u8, order = Msb)]
pub(crate) struct Config {
    #[bits(1)]
    _padding: u8,

    /// Masks the "RX Data Ready" event off the IRQ pin.
    pub mask_rx_dr: bool,

    /// Masks the "TX Data Sent" event off the IRQ pin.
    pub mask_tx_ds: bool,

    /// Masks the "max retransmits" event off the IRQ pin.
    pub mask_max_rt: bool,

    pub en_crc: bool,

    /// 0 = 1-byte CRC, 1 = 2-byte CRC.
    pub crco: bool,

    pub pwr_up: bool,

    pub prim_rx: bool,
}

/// The STATUS register. `rx_p_no` and `tx_full` are derived from the FIFO
/// fill levels; the three interrupt flags are write-one-to-clear.
#[bitfield(u8, order = Msb)]
pub(crate) struct Status {
    #[bits(1)]
    _padding: u8,

    pub rx_dr: bool,

    pub tx_ds: bool,

    pub max_rt: bool,

    /// Pipe number of the head RX packet, `0b111` when the RX FIFO is empty.
    #[bits(3)]
    pub rx_p_no: u8,

    pub tx_full: bool,
}

#[bitfield(u8, order = Msb)]
pub(crate) struct FifoStatus {
    #[bits(1)]
    _padding: u8,

    pub tx_reuse: bool,

    pub tx_full: bool,

    pub tx_empty: bool,

    #[bits(2)]
    _padding2: u8,

    pub rx_full: bool,

    pub rx_empty: bool,
}

#[bitfield(u8, order = Msb)]
pub(crate) struct SetupAw {
    #[bits(6)]
    _padding: u8,

    #[bits(2)]
    pub aw: u8,
}

impl SetupAw {
    /// Address width in bytes, 2..=5.
    pub const fn address_width(&self) -> u8 {
        self.aw() + 2
    }
}

#[bitfield(u8, order = Msb)]
pub(crate) struct SetupRetr {
    /// The auto-retransmit `delay` field; the wait is `(ard + 1) * 250 us`.
    #[bits(4)]
    pub ard: u8,

    /// The auto-retransmit `count` field; 0 disables waiting for ACKs.
    #[bits(4)]
    pub arc: u8,
}

#[bitfield(u8, order = Msb)]
pub(crate) struct RfSetup {
    #[bits(2)]
    _padding: u8,

    pub rf_dr_low: bool,

    #[bits(1)]
    _padding2: u8,

    pub rf_dr_high: bool,

    #[bits(2)]
    pub rf_pwr: u8,

    pub lna_hcurr: bool,
}

impl RfSetup {
    pub const fn data_rate(&self) -> DataRate {
        DataRate::from_bits(self.into_bits() & DataRate::MASK)
    }
}

#[bitfield(u8, order = Msb)]
pub(crate) struct ObserveTx {
    /// Lost-packet counter, saturates at 15, cleared by writing `RF_CH`.
    #[bits(4)]
    pub plos_cnt: u8,

    /// Retransmission counter of the packet currently in flight.
    #[bits(4)]
    pub arc_cnt: u8,
}

#[bitfield(u8, order = Msb)]
pub(crate) struct Feature {
    #[bits(5)]
    _padding: u8,

    pub en_dpl: bool,

    pub en_ack_pay: bool,

    pub en_dyn_ack: bool,
}
