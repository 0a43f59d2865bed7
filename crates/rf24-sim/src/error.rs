use thiserror::Error;

/// Everything the SPI front end can reject.
///
/// Recoverable errors are logged and make the offending SPI byte return
/// `0xFF`; with [`Simulation::set_stop_on_error`](crate::Simulation::set_stop_on_error)
/// armed they terminate the simulation instead. Internal invariant
/// violations never reach this type — they indicate a simulator bug and
/// panic immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("unknown SPI command 0x{0:02X}")]
    BadCommand(u8),

    #[error("access to reserved register 0x{0:02X}")]
    ReservedRegister(u8),

    #[error("no free slot in TX FIFO")]
    FifoFull,

    #[error("no entries in RX FIFO")]
    FifoEmpty,

    #[error("payload longer than 32 bytes")]
    PayloadOverflow,

    #[error("unimplemented command {0}")]
    Unimplemented(&'static str),
}
