//! The per-module chip model: register file, FIFOs, pin shadows and the
//! bookkeeping of one Enhanced ShockBurst exchange.

pub(crate) mod bit_fields;
pub mod constants;
pub(crate) mod fifo;
pub(crate) mod packet;
pub(crate) mod registers;
mod spi;

use fifo::Fifo;
use packet::{RxPacket, TxPacket};
use registers::RegisterFile;
pub(crate) use spi::{SpiState, SpiTransaction};

use crate::sim::timer::McuId;
use crate::sim::trace::TraceLog;
use crate::sim::RadioId;

/// The power/RX/TX lifecycle of one radio, including the transient
/// settling and ACK-exchange states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioState {
    PowerDown,
    StartUp,
    Standby1,
    RxSettling,
    RxMode,
    TxSettling,
    TxMode,
    Standby2,
    RxSettlingForAck,
    RxModeForAck,
    TxSettlingForAck,
    TxModeForAck,
}

/// One simulated nRF24L01+ module.
///
/// Everything here is plain state; the reactor and the air dispatcher live
/// on [`Simulation`](crate::Simulation), which owns all modules and can
/// therefore reach a transmission's peer.
pub(crate) struct Radio {
    pub name: String,
    pub mcu: McuId,

    pub regs: RegisterFile,
    pub fifo_tx: Fifo<TxPacket>,
    pub fifo_rx: Fifo<RxPacket>,

    pub state: RadioState,
    pub state_next: RadioState,
    pub spi: SpiTransaction,

    /// 2-bit packet id counter, advanced on every committed `W_TX_PAYLOAD`.
    pub pid: u8,

    pub pin_ce: bool,
    pub pin_csn: bool,
    pub pin_irq: bool,

    pub tx_in_progress: bool,
    pub tx_finished: bool,
    pub tx_wait_for_ack: bool,
    pub tx_ack_received: bool,
    pub ard_has_elapsed: bool,
    pub rx_ack_timeout: bool,
    pub rx_send_ack: bool,
    pub nb_retries: u8,

    /// Peer links for the span of one TX -> ACK exchange; indices into the
    /// module registry, never owning.
    pub rx_send_ack_to: Option<RadioId>,
    pub tx_receive_ack_from: Option<RadioId>,

    /// Scratch slot holding the frame currently on air.
    pub packet_being_sent: Option<TxPacket>,

    /// Most recent accepted packet, used for duplicate suppression.
    pub last_rx: Option<RxPacket>,

    pub trace: Option<TraceLog>,
    pub irq_hook: Option<Box<dyn FnMut(bool)>>,
}

impl Radio {
    pub fn new(mcu: McuId, name: &str) -> Self {
        Radio {
            name: name.to_owned(),
            mcu,
            regs: RegisterFile::new(),
            fifo_tx: Fifo::new(),
            fifo_rx: Fifo::new(),
            state: RadioState::PowerDown,
            state_next: RadioState::PowerDown,
            spi: SpiTransaction::new(),
            pid: 0,
            pin_ce: false,
            pin_csn: true,
            pin_irq: true,
            tx_in_progress: false,
            tx_finished: false,
            tx_wait_for_ack: false,
            tx_ack_received: false,
            ard_has_elapsed: false,
            rx_ack_timeout: false,
            rx_send_ack: false,
            nb_retries: 0,
            rx_send_ack_to: None,
            tx_receive_ack_from: None,
            packet_being_sent: None,
            last_rx: None,
            trace: None,
            irq_hook: None,
        }
    }

    /// Mirror the FIFO fill levels into `FIFO_STATUS` and the derived
    /// `STATUS` bits. Called on every FIFO mutation; between mutations a
    /// host-cleared `RX_DR` stays cleared.
    pub fn update_fifo_status(&mut self) {
        let mut status = self.regs.status();
        match self.fifo_rx.head() {
            None => {
                status = status.with_rx_dr(false).with_rx_p_no(0b111);
            }
            Some(head) => {
                status = status.with_rx_dr(true).with_rx_p_no(head.pipe);
            }
        }
        status = status.with_tx_full(self.fifo_tx.is_full());
        self.regs.set_status(status);

        let fifo_status = self
            .regs
            .fifo_status()
            .with_tx_empty(self.fifo_tx.is_empty())
            .with_tx_full(self.fifo_tx.is_full())
            .with_rx_empty(self.fifo_rx.is_empty())
            .with_rx_full(self.fifo_rx.is_full());
        self.regs.set_fifo_status(fifo_status);
    }

    /// Active-low IRQ level: low iff at least one unmasked interrupt flag
    /// is set. Pure function of CONFIG and STATUS.
    pub fn irq_level(&self) -> bool {
        let config = self.regs.config();
        let status = self.regs.status();
        let asserted = (status.rx_dr() && !config.mask_rx_dr())
            || (status.tx_ds() && !config.mask_tx_ds())
            || (status.max_rt() && !config.mask_max_rt());
        !asserted
    }

    /// Recompute the IRQ pin and notify the host.
    pub fn refresh_irq(&mut self) {
        self.pin_irq = self.irq_level();
        log::trace!("[{}] IRQ pin set to {}", self.name, self.pin_irq as u8);
        let level = self.pin_irq;
        if let Some(hook) = self.irq_hook.as_mut() {
            hook(level);
        }
    }
}
