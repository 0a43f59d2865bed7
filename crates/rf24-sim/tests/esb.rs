//! End-to-end Enhanced ShockBurst exchanges between two simulated radios,
//! driven exactly the way firmware drives the chip: pin edges, SPI bytes
//! and an advancing cycle counter.

mod common;

use common::Bench;
use rf24sim::constants::{commands, mnemonics, registers};
use rf24sim::RadioState;

const RX_DR: u8 = mnemonics::MASK_RX_DR;
const TX_DS: u8 = mnemonics::MASK_TX_DS;
const MAX_RT: u8 = mnemonics::MASK_MAX_RT;

fn rx_pipe(status: u8) -> u8 {
    (status >> 1) & 0b111
}

#[test]
fn delivery_with_auto_ack_round_trips_the_payload() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    bench.power_rx(prx);
    assert_eq!(bench.sim.radio_state(prx), RadioState::RxMode);
    bench.power_tx(ptx);

    bench.queue_payload(ptx, &[0x01, 0x02, 0x03, 0x04, 0x05]);
    // TX occupied, RX still empty
    assert_eq!(bench.read_reg(ptx, registers::FIFO_STATUS, 1), vec![0x01]);
    bench.pulse_ce(ptx);
    bench.run_us(800);

    // sender saw the ACK
    let status = bench.status(ptx);
    assert_ne!(status & TX_DS, 0);
    assert_eq!(status & MAX_RT, 0);
    assert_eq!(bench.sim.radio_state(ptx), RadioState::Standby1);
    // the acknowledged packet left the TX FIFO
    assert_eq!(bench.read_reg(ptx, registers::FIFO_STATUS, 1), vec![0x11]);

    // receiver has the payload on pipe 0
    let status = bench.status(prx);
    assert_ne!(status & RX_DR, 0);
    assert_eq!(rx_pipe(status), 0);
    assert_eq!(bench.payload_width(prx), 5);
    assert_eq!(bench.read_payload(prx, 5), vec![0x01, 0x02, 0x03, 0x04, 0x05]);

    // popping the payload empties the FIFO and withdraws RX_DR
    assert_eq!(bench.payload_width(prx), 0);
    let status = bench.status(prx);
    assert_eq!(status & RX_DR, 0);
    assert_eq!(rx_pipe(status), 0b111);

    let stats = bench.sim.stats();
    assert_eq!(stats.packets, 1);
    assert_eq!(stats.acks, 1);
    assert_eq!(stats.lost_packets, 0);
    assert_eq!(stats.lost_acks, 0);
}

#[test]
fn irq_line_follows_unmasked_flags() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    bench.power_rx(prx);
    bench.power_tx(ptx);
    assert!(bench.sim.irq_level(ptx));

    bench.queue_payload(ptx, &[0xAB]);
    bench.pulse_ce(ptx);
    bench.run_us(800);

    // TX_DS pulls the pin low on the sender, RX_DR on the receiver
    assert!(!bench.sim.irq_level(ptx));
    assert!(!bench.sim.irq_level(prx));

    // write-one-to-clear releases the line
    bench.write_reg(ptx, registers::STATUS, &[TX_DS]);
    assert!(bench.sim.irq_level(ptx));
    bench.write_reg(prx, registers::STATUS, &[RX_DR]);
    assert!(bench.sim.irq_level(prx));
}

#[test]
fn clearing_a_flag_twice_is_idempotent() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    bench.power_rx(prx);
    bench.power_tx(ptx);
    bench.queue_payload(ptx, &[7]);
    bench.pulse_ce(ptx);
    bench.run_us(800);

    bench.write_reg(prx, registers::STATUS, &[RX_DR]);
    let once = bench.status(prx);
    bench.write_reg(prx, registers::STATUS, &[RX_DR]);
    let twice = bench.status(prx);
    assert_eq!(once, twice);
    assert_eq!(once & RX_DR, 0);
    // the payload itself is still queued
    assert_eq!(rx_pipe(once), 0);
}

#[test]
fn lost_acks_exhaust_retries_and_set_max_rt() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);
    bench.sim.set_lost_packets(0, 1); // every ACK is lost

    bench.power_rx(prx);
    bench.power_tx(ptx);
    bench.queue_payload(ptx, &[0x11, 0x22, 0x33]);
    bench.pulse_ce(ptx);
    bench.run_us(5000);

    let status = bench.status(ptx);
    assert_ne!(status & MAX_RT, 0);
    assert_eq!(status & TX_DS, 0);
    assert_eq!(bench.sim.radio_state(ptx), RadioState::Standby1);
    // the unacknowledged packet is held in the TX FIFO
    assert_eq!(bench.read_reg(ptx, registers::FIFO_STATUS, 1), vec![0x01]);

    // retry accounting: ARC (3) retransmissions, one lost packet tally
    let observe = bench.read_reg(ptx, registers::OBSERVE_TX, 1)[0];
    assert_eq!(observe & 0x0F, 3); // ARC_CNT
    assert_eq!(observe >> 4, 1); // PLOS_CNT

    // duplicate suppression: the receiver saw exactly one unique packet
    assert_eq!(bench.payload_width(prx), 3);
    assert_eq!(bench.read_payload(prx, 3), vec![0x11, 0x22, 0x33]);
    assert_eq!(bench.payload_width(prx), 0);

    let stats = bench.sim.stats();
    assert_eq!(stats.lost_acks, 4); // initial TX plus 3 retries, each ACKed
    assert_eq!(stats.acks, 0);
    assert_eq!(stats.packets, 0);

    // a fresh RF_CH write clears the lost-packet tally
    bench.write_reg(ptx, registers::RF_CH, &[2]);
    let observe = bench.read_reg(ptx, registers::OBSERVE_TX, 1)[0];
    assert_eq!(observe >> 4, 0);
}

#[test]
fn retransmission_of_a_new_pid_is_not_suppressed() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    bench.power_rx(prx);
    bench.power_tx(ptx);

    // two packets with identical payloads but distinct PIDs
    for _ in 0..2 {
        bench.queue_payload(ptx, &[0x55, 0x66]);
        bench.pulse_ce(ptx);
        bench.run_us(1000);
    }

    assert_eq!(bench.read_payload(prx, 2), vec![0x55, 0x66]);
    assert_eq!(bench.payload_width(prx), 2);
    assert_eq!(bench.read_payload(prx, 2), vec![0x55, 0x66]);
    assert_eq!(bench.sim.stats().packets, 2);
}

#[test]
fn ack_payload_rides_back_to_the_sender() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    // queue an ack-payload for pipe 1 before anything arrives
    bench.write_reg(prx, registers::FEATURE, &[0x02]); // EN_ACK_PAY
    bench.command(prx, &[commands::W_ACK_PAYLOAD | 1, 0xAA, 0xBB, 0xCC]);
    bench.power_rx(prx);

    // aim the sender at pipe 1's address
    bench.power_tx(ptx);
    bench.write_reg(ptx, registers::TX_ADDR, &[0xC2, 0xC2, 0xC2, 0xC2, 0xC2]);
    bench.queue_payload(ptx, &[0x01, 0x02]);
    bench.pulse_ce(ptx);
    bench.run_us(1000);

    // the data packet landed on pipe 1
    let status = bench.status(prx);
    assert_eq!(rx_pipe(status), 1);

    // the sender got the ack-payload back
    let status = bench.status(ptx);
    assert_ne!(status & TX_DS, 0);
    assert_ne!(status & RX_DR, 0);
    assert_eq!(rx_pipe(status), 1);
    assert_eq!(bench.payload_width(ptx), 3);
    assert_eq!(bench.read_payload(ptx, 3), vec![0xAA, 0xBB, 0xCC]);

    // the ack-payload left the receiver's TX FIFO; the data packet is
    // still queued on its RX side
    assert_eq!(bench.read_reg(prx, registers::FIFO_STATUS, 1), vec![0x10]);
}

#[test]
fn channel_mismatch_never_delivers() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    bench.power_rx(prx);
    bench.power_tx(ptx);
    bench.write_reg(ptx, registers::RF_CH, &[40]);
    bench.queue_payload(ptx, &[0xEE]);
    bench.pulse_ce(ptx);
    bench.run_us(5000);

    assert_ne!(bench.status(ptx) & MAX_RT, 0);
    assert_eq!(bench.status(prx) & RX_DR, 0);
    assert_eq!(bench.payload_width(prx), 0);
    assert_eq!(bench.sim.stats().packets, 0);
}

#[test]
fn data_rate_mismatch_never_delivers() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    bench.power_rx(prx);
    bench.power_tx(ptx);
    bench.write_reg(ptx, registers::RF_SETUP, &[0x06]); // 1 Mbps vs default 2 Mbps
    bench.queue_payload(ptx, &[0xEE]);
    bench.pulse_ce(ptx);
    bench.run_us(6000);

    assert_ne!(bench.status(ptx) & MAX_RT, 0);
    assert_eq!(bench.status(prx) & RX_DR, 0);
}

#[test]
fn derived_pipe_addresses_deliver_with_the_right_pipe_number() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    // pipe 3: top four bytes of pipe 1, low byte 0xC4
    bench.write_reg(prx, registers::EN_RXADDR, &[0x0B]);
    bench.power_rx(prx);

    bench.power_tx(ptx);
    bench.write_reg(ptx, registers::TX_ADDR, &[0xC4, 0xC2, 0xC2, 0xC2, 0xC2]);
    bench.queue_payload(ptx, &[0x42]);
    bench.pulse_ce(ptx);
    bench.run_us(1000);

    let status = bench.status(prx);
    assert_ne!(status & RX_DR, 0);
    assert_eq!(rx_pipe(status), 3);
    assert_eq!(bench.read_payload(prx, 1), vec![0x42]);
    // auto-ACK on pipe 3 confirmed the delivery
    assert_ne!(bench.status(ptx) & TX_DS, 0);
}

#[test]
fn forced_packet_loss_reaches_nobody() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);
    bench.sim.set_lost_packets(1, 0); // every data frame is lost

    bench.power_rx(prx);
    bench.power_tx(ptx);
    bench.queue_payload(ptx, &[0x99]);
    bench.pulse_ce(ptx);
    bench.run_us(5000);

    assert_ne!(bench.status(ptx) & MAX_RT, 0);
    assert_eq!(bench.status(prx) & RX_DR, 0);
    let stats = bench.sim.stats();
    assert_eq!(stats.lost_packets, 4);
    assert_eq!(stats.packets, 0);
    assert_eq!(stats.lost_acks, 0);
}

#[test]
fn disabling_auto_ack_suppresses_the_ack() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    bench.write_reg(prx, registers::EN_AA, &[0x00]);
    bench.power_rx(prx);
    bench.power_tx(ptx);
    bench.queue_payload(ptx, &[0x77]);
    bench.pulse_ce(ptx);
    bench.run_us(5000);

    // the packet arrived once, but with no ACK the sender retries out
    assert_ne!(bench.status(prx) & RX_DR, 0);
    assert_eq!(bench.read_payload(prx, 1), vec![0x77]);
    assert_ne!(bench.status(ptx) & MAX_RT, 0);
    assert_eq!(bench.sim.stats().acks, 0);
}

#[test]
fn without_auto_retransmit_tx_ds_fires_immediately() {
    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);

    bench.power_rx(prx);
    bench.power_tx(ptx);
    bench.write_reg(ptx, registers::SETUP_RETR, &[0x00]); // ARC = 0
    bench.queue_payload(ptx, &[0x10, 0x20]);
    bench.pulse_ce(ptx);
    bench.run_us(400);

    let status = bench.status(ptx);
    assert_ne!(status & TX_DS, 0);
    assert_eq!(status & MAX_RT, 0);
    // no ACK exchange happened, the packet was counted at once
    assert_eq!(bench.sim.stats().packets, 1);
    assert_eq!(bench.sim.stats().acks, 0);
    assert_eq!(bench.read_reg(ptx, registers::FIFO_STATUS, 1), vec![0x11]);
    // the receiver still got it
    assert_eq!(bench.read_payload(prx, 2), vec![0x10, 0x20]);
}

#[test]
fn trace_file_records_tx_and_ack_lines() {
    let dir = tempfile::tempdir().unwrap();
    let ptx_log = dir.path().join("ptx.txt");
    let prx_log = dir.path().join("prx.txt");

    let mut bench = Bench::new();
    let (ptx, prx) = (bench.ptx, bench.prx);
    bench.sim.log_to_file(ptx, &ptx_log).unwrap();
    bench.sim.log_to_file(prx, &prx_log).unwrap();

    bench.power_rx(prx);
    bench.power_tx(ptx);
    bench.queue_payload(ptx, &[1, 2, 3, 4, 5]);
    bench.pulse_ce(ptx);
    bench.run_us(800);
    bench.sim.shutdown();

    let ptx_trace = std::fs::read_to_string(&ptx_log).unwrap();
    let mut ptx_lines = ptx_trace.lines();
    assert_eq!(ptx_lines.next(), Some("LOGFILE FOR nRF ptx"));
    let tx_line = ptx_lines.next().unwrap();
    assert!(tx_line.ends_with("TX  5 bytes"), "unexpected line: {tx_line}");

    let prx_trace = std::fs::read_to_string(&prx_log).unwrap();
    assert!(
        prx_trace.lines().any(|line| line.ends_with("ACK  0 bytes")),
        "no ACK line in: {prx_trace}"
    );
}
