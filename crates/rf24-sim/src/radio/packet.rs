use arrayvec::ArrayVec;

use super::constants::MAX_PAYLOAD;

/// Payload storage shared by both packet directions.
pub(crate) type Payload = ArrayVec<u8, MAX_PAYLOAD>;

/// What a TX FIFO slot is destined for.
///
/// A PTX queues regular packets addressed at the `TX_ADDR` captured when the
/// payload was written; a PRX queues ack-payloads tagged with the pipe they
/// answer on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TxKind {
    Regular {
        /// Address width in bytes at queue time (`SETUP_AW`).
        addr_width: u8,
        /// Destination address, up to 40 bits.
        addr: u64,
    },
    AckPayload {
        pipe: u8,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TxPacket {
    pub kind: TxKind,
    /// 2-bit packet id; only meaningful for regular packets.
    pub pid: u8,
    pub payload: Payload,
}

impl TxPacket {
    /// An empty ACK frame for `pipe`, synthesized when no ack-payload is
    /// queued.
    pub fn empty_ack(pipe: u8) -> Self {
        TxPacket {
            kind: TxKind::AckPayload { pipe },
            pid: 0,
            payload: Payload::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RxPacket {
    pub pid: u8,
    /// Pipe (0..=5) the packet arrived on.
    pub pipe: u8,
    pub payload: Payload,
}
