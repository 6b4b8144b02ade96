//! Headless driver: loads a ROM image and runs the core's step loop,
//! logging diagnostics as it goes. No display or audio output — the PPU
//! and APU are a different collaborator's job; this binary exists to
//! exercise the core end to end against real cartridge images.

use std::env;
use std::fs;
use std::process::ExitCode;

use log::{info, warn};

use dmg_core::{Cartridge, Config, System};

fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(rom_path) = args.next() else {
        eprintln!("usage: dmg-core-run <rom-path> [max-steps]");
        return ExitCode::FAILURE;
    };
    let max_steps: u64 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000_000);

    let rom = match fs::read(&rom_path) {
        Ok(rom) => rom,
        Err(err) => {
            eprintln!("failed to read {rom_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let cartridge = match Cartridge::from_rom_bytes(rom) {
        Ok(cartridge) => cartridge,
        Err(err) => {
            eprintln!("failed to load cartridge: {err}");
            return ExitCode::FAILURE;
        }
    };

    let trace = env::var("DMG_TRACE").is_ok();
    let mut system = System::new(cartridge);
    system.cpu = dmg_core::Cpu::with_config(Config { trace, ..Config::default() });

    info!("starting run, battery_backed={}", system.bus.cartridge().battery_backed());

    for step in 0..max_steps {
        if let Err(err) = system.step() {
            warn!("halting after {step} steps: {err}");
            return ExitCode::FAILURE;
        }
        if step % 1_000_000 == 0 && step > 0 {
            info!("{step} steps, total_cycles={}", system.cpu.total_cycles());
        }
    }

    info!(
        "ran {max_steps} steps, total_cycles={}, pc={:#06X}",
        system.cpu.total_cycles(),
        system.cpu.registers().pc
    );
    ExitCode::SUCCESS
}
