//! Optional per-radio transmission trace, one human-readable line per frame.

use std::fs::File;
use std::io::{BufWriter, Result, Write};
use std::path::Path;

use super::timer::cycles_to_ms;

/// Writes `[t ms] [delta ms] TX|ACK N bytes` lines for every frame a radio
/// puts on air. The delta is measured against the radio's previous
/// transmission.
pub(crate) struct TraceLog {
    out: BufWriter<File>,
    last_tx_cycle: u64,
}

impl TraceLog {
    pub fn create(path: &Path, name: &str) -> Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "LOGFILE FOR nRF {name}")?;
        Ok(TraceLog {
            out,
            last_tx_cycle: 0,
        })
    }

    pub fn log_tx(&mut self, cycle: u64, frequency_hz: u64, is_ack: bool, payload_bytes: usize) {
        let now_ms = cycles_to_ms(cycle, frequency_hz);
        let delta_ms = cycles_to_ms(cycle - self.last_tx_cycle, frequency_hz);
        let kind = if is_ack { "ACK" } else { "TX" };
        let line = format!(
            "[{now_ms:10.3}ms] [delta {delta_ms:7.3}ms] {kind} {payload_bytes:2} bytes"
        );
        if let Err(err) = writeln!(self.out, "{line}") {
            log::warn!("trace write failed: {err}");
        }
        self.last_tx_cycle = cycle;
    }

    pub fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl Drop for TraceLog {
    fn drop(&mut self) {
        self.flush();
    }
}
