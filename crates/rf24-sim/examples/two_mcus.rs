//! Two radios on two MCUs running at different frequencies.
//!
//! The host loop mirrors how an instruction-level simulator interleaves
//! its MCUs: always step the one furthest behind in scaled cycles
//! (`multiplier_i * cycle_i`), here with f1/f2 = 10/8 so the multipliers
//! are 4 and 5. Firmware behavior is scripted directly on the SPI surface.

use rf24sim::constants::{commands, mnemonics, registers};
use rf24sim::{McuId, RadioId, Simulation};

fn transfer(sim: &mut Simulation, radio: RadioId, frame: &[u8]) -> Vec<u8> {
    sim.csn(radio, false);
    let miso = frame
        .iter()
        .map(|byte| sim.spi_exchange(radio, *byte))
        .collect();
    sim.csn(radio, true);
    miso
}

/// Step both MCUs for `us` microseconds of wall-clock, scaled-cycle style.
fn run(sim: &mut Simulation, avr1: McuId, avr2: McuId, us: u64) {
    let f1 = sim.frequency(avr1);
    let f2 = sim.frequency(avr2);
    let (end1, end2) = (
        sim.now(avr1) + us * f1 / 1_000_000,
        sim.now(avr2) + us * f2 / 1_000_000,
    );
    // f1/f2 = 10/8 = 5/4
    let (mult1, mult2) = (4, 5);
    while sim.now(avr1) < end1 || sim.now(avr2) < end2 {
        let step1 = sim.now(avr1) < end1
            && (sim.now(avr2) >= end2 || mult1 * sim.now(avr1) < mult2 * sim.now(avr2));
        if step1 {
            sim.advance(avr1, (sim.now(avr1) + 10).min(end1));
        } else {
            sim.advance(avr2, (sim.now(avr2) + 8).min(end2));
        }
    }
}

fn main() {
    let mut sim = Simulation::new();
    sim.set_stop_on_error(true);
    sim.set_lost_packets(0, 0); // change this to experiment

    let avr1 = sim.add_mcu(10_000_000);
    let avr2 = sim.add_mcu(8_000_000);
    let sender = sim.make_radio(avr1, "nRF1");
    let receiver = sim.make_radio(avr2, "nRF2");
    sim.connect(sender, |level| {
        if !level {
            println!("nRF1: IRQ asserted");
        }
    });
    sim.connect(receiver, |level| {
        if !level {
            println!("nRF2: IRQ asserted");
        }
    });

    // both firmwares power their radio up; the receiver starts listening
    transfer(&mut sim, sender, &[commands::W_REGISTER | registers::CONFIG, 0x0A]);
    transfer(&mut sim, receiver, &[commands::W_REGISTER | registers::CONFIG, 0x0B]);
    run(&mut sim, avr1, avr2, 2_000);
    sim.ce(receiver, true);
    run(&mut sim, avr1, avr2, 200);

    // the sender queues a payload and pulses CE
    transfer(&mut sim, sender, &[commands::W_TX_PAYLOAD, 1, 2, 3, 4, 5]);
    sim.ce(sender, true);
    run(&mut sim, avr1, avr2, 10);
    sim.ce(sender, false);
    run(&mut sim, avr1, avr2, 1_000);

    let status = transfer(&mut sim, sender, &[commands::NOP])[0];
    println!(
        "nRF1: STATUS = 0x{status:02X} (TX_DS {})",
        (status & mnemonics::MASK_TX_DS != 0) as u8
    );
    transfer(
        &mut sim,
        sender,
        &[commands::W_REGISTER | registers::STATUS, mnemonics::MASK_TX_DS],
    );

    let width = transfer(&mut sim, receiver, &[commands::R_RX_PL_WID, 0])[1];
    let mut frame = vec![commands::R_RX_PAYLOAD];
    frame.extend(std::iter::repeat(0).take(width as usize));
    let miso = transfer(&mut sim, receiver, &frame);
    println!("nRF2: received {width} bytes: {:?}", &miso[1..]);

    sim.shutdown();
}
