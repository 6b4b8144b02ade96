//! The 16-bit address-space dispatcher. Routes every CPU read/write to
//! whichever component owns that range: the cartridge, one of the plain RAM
//! regions, or a device (timer, interrupts, joypad) mapped into the I/O
//! page.

use log::warn;

use crate::cartridge::Cartridge;
use crate::interrupts::InterruptController;
use crate::joypad::Joypad;
use crate::memory_map::*;
use crate::timer::Timer;

pub struct MemoryBus {
    cartridge: Cartridge,
    vram: Box<[u8; VRAM_SIZE]>,
    wram: Box<[u8; WRAM_SIZE]>,
    oam: Box<[u8; OAM_SIZE]>,
    hram: Box<[u8; HRAM_SIZE]>,
    io: Box<[u8; IO_SIZE]>,

    pub timer: Timer,
    pub interrupts: InterruptController,
    pub joypad: Joypad,
}

impl MemoryBus {
    pub fn new(cartridge: Cartridge) -> Self {
        Self {
            cartridge,
            vram: Box::new([0u8; VRAM_SIZE]),
            wram: Box::new([0u8; WRAM_SIZE]),
            oam: Box::new([0u8; OAM_SIZE]),
            hram: Box::new([0u8; HRAM_SIZE]),
            io: Box::new([0u8; IO_SIZE]),
            timer: Timer::new(),
            interrupts: InterruptController::new(),
            joypad: Joypad::new(),
        }
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            ROM_BANK_0_START..=ROM_BANK_0_END | ROM_BANK_N_START..=ROM_BANK_N_END => {
                self.cartridge.read(addr)
            }
            VRAM_START..=VRAM_END => self.vram[(addr - VRAM_START) as usize],
            EXT_RAM_START..=EXT_RAM_END => self.cartridge.read(addr),
            WRAM_START..=WRAM_END => self.wram[(addr - WRAM_START) as usize],
            ECHO_START..=ECHO_END => self.read_byte(addr - ECHO_TO_WRAM_OFFSET),
            OAM_START..=OAM_END => self.oam[(addr - OAM_START) as usize],
            NOT_USABLE_START..=NOT_USABLE_END => 0xFF,
            IO_START..=IO_END => self.read_io(addr),
            HRAM_START..=HRAM_END => self.hram[(addr - HRAM_START) as usize],
            IE_ADDR => self.interrupts.ie(),
        }
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        match addr {
            ROM_BANK_0_START..=ROM_BANK_0_END | ROM_BANK_N_START..=ROM_BANK_N_END => {
                self.cartridge.write(addr, value)
            }
            VRAM_START..=VRAM_END => self.vram[(addr - VRAM_START) as usize] = value,
            EXT_RAM_START..=EXT_RAM_END => self.cartridge.write(addr, value),
            WRAM_START..=WRAM_END => self.wram[(addr - WRAM_START) as usize] = value,
            ECHO_START..=ECHO_END => self.write_byte(addr - ECHO_TO_WRAM_OFFSET, value),
            OAM_START..=OAM_END => self.oam[(addr - OAM_START) as usize] = value,
            NOT_USABLE_START..=NOT_USABLE_END => {}
            IO_START..=IO_END => self.write_io(addr, value),
            HRAM_START..=HRAM_END => self.hram[(addr - HRAM_START) as usize] = value,
            IE_ADDR => self.interrupts.set_ie(value),
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            P1_JOYP_ADDR => self.joypad.read_p1(),
            DIV_ADDR => self.timer.div(),
            TIMA_ADDR => self.timer.tima(),
            TMA_ADDR => self.timer.tma(),
            TAC_ADDR => self.timer.tac(),
            IF_ADDR => self.interrupts.read_if(),
            _ => self.io[(addr - IO_START) as usize],
        }
    }

    fn write_io(&mut self, addr: u16, value: u8) {
        match addr {
            P1_JOYP_ADDR => self.joypad.write_p1(value),
            DIV_ADDR => self.timer.reset_div(),
            TIMA_ADDR => self.timer.set_tima(value),
            TMA_ADDR => self.timer.set_tma(value),
            TAC_ADDR => self.timer.set_tac(value),
            IF_ADDR => self.interrupts.write_if(value),
            DMA_ADDR => {
                self.io[(addr - IO_START) as usize] = value;
                self.perform_dma(value);
            }
            _ => self.io[(addr - IO_START) as usize] = value,
        }
    }

    /// OAM DMA: a 160-byte block copy from `source_high_byte << 8` into OAM.
    /// Modeled as instantaneous; the CPU stall the real hardware imposes
    /// during DMA is left to the driver to model if it cares.
    fn perform_dma(&mut self, source_high_byte: u8) {
        let source_start = (source_high_byte as u16) << 8;
        if source_start >= OAM_START {
            warn!("DMA source {:#06X} is in the restricted OAM/IO/HRAM range", source_start);
            return;
        }
        for i in 0..OAM_SIZE {
            let addr = source_start.wrapping_add(i as u16);
            self.oam[i] = self.read_byte(addr);
        }
    }
}
