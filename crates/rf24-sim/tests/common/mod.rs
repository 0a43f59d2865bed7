//! A firmware's-eye test bench: two radios on two MCUs running at
//! different frequencies, driven purely through pin edges and SPI bytes,
//! with the clocks advanced in 1 us lockstep the way a host interleaves
//! its simulated MCUs.

use rf24sim::constants::{commands, registers};
use rf24sim::{McuId, RadioId, Simulation};

pub const FREQ_A: u64 = 8_000_000; // 8 cycles per us
pub const FREQ_B: u64 = 16_000_000; // 16 cycles per us

pub struct Bench {
    pub sim: Simulation,
    pub mcu_a: McuId,
    pub mcu_b: McuId,
    pub ptx: RadioId,
    pub prx: RadioId,
    t_us: u64,
}

impl Bench {
    pub fn new() -> Self {
        let mut sim = Simulation::new();
        let mcu_a = sim.add_mcu(FREQ_A);
        let mcu_b = sim.add_mcu(FREQ_B);
        let ptx = sim.make_radio(mcu_a, "ptx");
        let prx = sim.make_radio(mcu_b, "prx");
        Bench {
            sim,
            mcu_a,
            mcu_b,
            ptx,
            prx,
            t_us: 0,
        }
    }

    /// Clock one whole SPI transaction, returning every MISO byte.
    pub fn command(&mut self, radio: RadioId, mosi: &[u8]) -> Vec<u8> {
        self.sim.csn(radio, false);
        let miso = mosi
            .iter()
            .map(|byte| self.sim.spi_exchange(radio, *byte))
            .collect();
        self.sim.csn(radio, true);
        miso
    }

    pub fn write_reg(&mut self, radio: RadioId, reg: u8, bytes: &[u8]) {
        let mut frame = vec![commands::W_REGISTER | reg];
        frame.extend_from_slice(bytes);
        self.command(radio, &frame);
    }

    /// Read `n` bytes of a register; the leading STATUS byte is stripped.
    pub fn read_reg(&mut self, radio: RadioId, reg: u8, n: usize) -> Vec<u8> {
        let mut frame = vec![reg];
        frame.extend_from_slice(&vec![0u8; n]);
        self.command(radio, &frame)[1..].to_vec()
    }

    pub fn status(&mut self, radio: RadioId) -> u8 {
        self.command(radio, &[commands::NOP])[0]
    }

    /// Advance both MCUs in scaled 1 us steps.
    pub fn run_us(&mut self, us: u64) {
        for _ in 0..us {
            self.t_us += 1;
            self.sim.advance(self.mcu_a, self.t_us * (FREQ_A / 1_000_000));
            self.sim.advance(self.mcu_b, self.t_us * (FREQ_B / 1_000_000));
        }
    }

    /// PWR_UP as a primary transmitter and wait out the 1.5 ms start-up.
    pub fn power_tx(&mut self, radio: RadioId) {
        self.write_reg(radio, registers::CONFIG, &[0x0A]);
        self.run_us(1600);
    }

    /// PWR_UP as a primary receiver, raise CE and wait until listening.
    pub fn power_rx(&mut self, radio: RadioId) {
        self.write_reg(radio, registers::CONFIG, &[0x0B]);
        self.run_us(1600);
        self.sim.ce(radio, true);
        self.run_us(200);
    }

    /// The CE pulse real firmware uses to kick off a transmission.
    pub fn pulse_ce(&mut self, radio: RadioId) {
        self.sim.ce(radio, true);
        self.run_us(10);
        self.sim.ce(radio, false);
    }

    pub fn queue_payload(&mut self, radio: RadioId, payload: &[u8]) {
        let mut frame = vec![commands::W_TX_PAYLOAD];
        frame.extend_from_slice(payload);
        self.command(radio, &frame);
    }

    pub fn read_payload(&mut self, radio: RadioId, n: usize) -> Vec<u8> {
        let mut frame = vec![commands::R_RX_PAYLOAD];
        frame.extend_from_slice(&vec![0u8; n]);
        self.command(radio, &frame)[1..].to_vec()
    }

    pub fn payload_width(&mut self, radio: RadioId) -> u8 {
        self.command(radio, &[commands::R_RX_PL_WID, 0])[1]
    }
}
