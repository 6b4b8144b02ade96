//! The cartridge: ROM image, optional battery-backed RAM, and the bank
//! switching logic (MBC) that exposes them through two 16 KiB ROM windows
//! and one 8 KiB RAM window. `MbcKind` is a tagged enum rather than a trait
//! object: each variant's write-side state differs enough that a shared
//! `{read, write}` capability matched over the kind reads far more plainly
//! than an inheritance hierarchy would.

use log::{debug, warn};

use crate::error::{CpuResult, EmuError};
use crate::memory_map::{EXT_RAM_BANK_SIZE, EXT_RAM_START, ROM_BANK_0_START, ROM_BANK_SIZE};
use crate::rtc::RtcRegisters;

const HEADER_TYPE: usize = 0x0147;
const HEADER_ROM_SIZE: usize = 0x0148;
const HEADER_RAM_SIZE: usize = 0x0149;

#[derive(Debug, Clone)]
enum MbcKind {
    NoMbc,
    Mbc1 {
        ram_enable: bool,
        primary_bank: u8,
        secondary_bank: u8,
        advanced_mode: bool,
    },
    Mbc2 {
        ram_enable: bool,
        rom_bank: u8,
    },
    Mbc3 {
        ram_enable: bool,
        rom_bank: u8,
        ram_bank_or_rtc: u8,
        rtc: RtcRegisters,
        rtc_latched: RtcRegisters,
        latch_state: u8,
    },
    Mbc5 {
        ram_enable: bool,
        rom_bank: u16,
        ram_bank: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MbcFamily {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

fn classify_header(type_code: u8) -> CpuResult<(MbcFamily, bool, bool)> {
    // (family, has_ram, has_battery)
    match type_code {
        0x00 => Ok((MbcFamily::NoMbc, false, false)),
        0x08 => Ok((MbcFamily::NoMbc, true, false)),
        0x09 => Ok((MbcFamily::NoMbc, true, true)),
        0x01 => Ok((MbcFamily::Mbc1, false, false)),
        0x02 => Ok((MbcFamily::Mbc1, true, false)),
        0x03 => Ok((MbcFamily::Mbc1, true, true)),
        0x05 => Ok((MbcFamily::Mbc2, false, false)),
        0x06 => Ok((MbcFamily::Mbc2, false, true)),
        0x0F => Ok((MbcFamily::Mbc3, false, true)),
        0x10 => Ok((MbcFamily::Mbc3, true, true)),
        0x11 => Ok((MbcFamily::Mbc3, false, false)),
        0x12 => Ok((MbcFamily::Mbc3, true, false)),
        0x13 => Ok((MbcFamily::Mbc3, true, true)),
        0x19 => Ok((MbcFamily::Mbc5, false, false)),
        0x1A => Ok((MbcFamily::Mbc5, true, false)),
        0x1B => Ok((MbcFamily::Mbc5, true, true)),
        0x1C => Ok((MbcFamily::Mbc5, false, false)),
        0x1D => Ok((MbcFamily::Mbc5, true, false)),
        0x1E => Ok((MbcFamily::Mbc5, true, true)),
        _ => Err(EmuError::CartridgeUnsupported { type_code }),
    }
}

fn rom_bank_count(code: u8) -> usize {
    match code {
        0..=6 => 2usize << code,
        _ => 2,
    }
}

fn ram_layout(code: u8) -> (usize, usize) {
    // (bank count, bytes per bank)
    match code {
        0 => (0, 0),
        1 => (1, 0x800),
        2 => (1, 0x2000),
        3 => (4, 0x2000),
        4 => (16, 0x2000),
        _ => (0, 0),
    }
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    kind: MbcKind,
    rom_banks: usize,
    ram_banks: usize,
    ram_bank_size: usize,
    battery_backed: bool,
}

impl Cartridge {
    pub fn from_rom_bytes(rom: Vec<u8>) -> CpuResult<Self> {
        let type_code = *rom.get(HEADER_TYPE).unwrap_or(&0);
        let (family, has_ram, has_battery) = classify_header(type_code).map_err(|e| {
            warn_unsupported(type_code);
            e
        })?;

        let rom_size_code = *rom.get(HEADER_ROM_SIZE).unwrap_or(&0);
        let rom_banks = rom_bank_count(rom_size_code).max(2);

        let (ram_banks, ram_bank_size) = if has_ram {
            let (banks, size) = ram_layout(*rom.get(HEADER_RAM_SIZE).unwrap_or(&0));
            (banks.max(1), if size == 0 { EXT_RAM_BANK_SIZE } else { size })
        } else if family == MbcFamily::Mbc2 {
            // MBC2 carries its own built-in 512x4-bit RAM, not declared via 0x0149.
            (1, 512)
        } else {
            (0, 0)
        };

        debug!(
            "cartridge: type={:#04X} family={:?} rom_banks={} ram_banks={} battery={}",
            type_code, family, rom_banks, ram_banks, has_battery
        );

        let kind = match family {
            MbcFamily::NoMbc => MbcKind::NoMbc,
            MbcFamily::Mbc1 => MbcKind::Mbc1 {
                ram_enable: false,
                primary_bank: 1,
                secondary_bank: 0,
                advanced_mode: false,
            },
            MbcFamily::Mbc2 => MbcKind::Mbc2 {
                ram_enable: false,
                rom_bank: 1,
            },
            MbcFamily::Mbc3 => MbcKind::Mbc3 {
                ram_enable: false,
                rom_bank: 1,
                ram_bank_or_rtc: 0,
                rtc: RtcRegisters::new(),
                rtc_latched: RtcRegisters::new(),
                latch_state: 0,
            },
            MbcFamily::Mbc5 => MbcKind::Mbc5 {
                ram_enable: false,
                rom_bank: 1,
                ram_bank: 0,
            },
        };

        Ok(Self {
            rom,
            ram: vec![0u8; ram_banks * ram_bank_size],
            kind,
            rom_banks,
            ram_banks: ram_banks.max(1),
            ram_bank_size,
            battery_backed: has_battery,
        })
    }

    pub fn battery_backed(&self) -> bool {
        self.battery_backed
    }

    /// Battery-backed save RAM, for a driver to persist between runs.
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn load_ram(&mut self, data: &[u8]) {
        let n = data.len().min(self.ram.len());
        self.ram[..n].copy_from_slice(&data[..n]);
    }

    fn rom_bank_byte(&self, bank: usize, offset: u16) -> u8 {
        let bank = bank % self.rom_banks.max(1);
        let addr = bank * ROM_BANK_SIZE + offset as usize;
        self.rom.get(addr).copied().unwrap_or(0xFF)
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => match &self.kind {
                MbcKind::Mbc1 {
                    advanced_mode,
                    secondary_bank,
                    ..
                } if *advanced_mode => {
                    self.rom_bank_byte((*secondary_bank as usize) << 5, addr - ROM_BANK_0_START)
                }
                _ => self.rom_bank_byte(0, addr - ROM_BANK_0_START),
            },
            0x4000..=0x7FFF => {
                let offset = addr - 0x4000;
                match &self.kind {
                    MbcKind::NoMbc => self.rom_bank_byte(1, offset),
                    MbcKind::Mbc1 {
                        primary_bank,
                        secondary_bank,
                        ..
                    } => self.rom_bank_byte(
                        ((*secondary_bank as usize) << 5) | *primary_bank as usize,
                        offset,
                    ),
                    MbcKind::Mbc2 { rom_bank, .. } => self.rom_bank_byte(*rom_bank as usize, offset),
                    MbcKind::Mbc3 { rom_bank, .. } => self.rom_bank_byte(*rom_bank as usize, offset),
                    MbcKind::Mbc5 { rom_bank, .. } => self.rom_bank_byte(*rom_bank as usize, offset),
                }
            }
            EXT_RAM_START..=crate::memory_map::EXT_RAM_END => self.read_ram(addr),
            _ => 0xFF,
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        let offset = (addr - EXT_RAM_START) as usize;
        match &self.kind {
            MbcKind::NoMbc => self.ram.get(offset).copied().unwrap_or(0xFF),
            MbcKind::Mbc1 {
                ram_enable,
                secondary_bank,
                advanced_mode,
                ..
            } => {
                if !*ram_enable || self.ram.is_empty() {
                    return 0xFF;
                }
                let bank = if *advanced_mode { *secondary_bank as usize } else { 0 };
                self.ram_byte(bank, offset)
            }
            MbcKind::Mbc2 { ram_enable, .. } => {
                if !*ram_enable || self.ram.is_empty() {
                    return 0xFF;
                }
                0xF0 | (self.ram[offset % self.ram.len()] & 0x0F)
            }
            MbcKind::Mbc3 {
                ram_enable,
                ram_bank_or_rtc,
                rtc_latched,
                ..
            } => {
                if !*ram_enable {
                    return 0xFF;
                }
                if *ram_bank_or_rtc >= 0x08 {
                    rtc_latched.read(*ram_bank_or_rtc)
                } else {
                    self.ram_byte(*ram_bank_or_rtc as usize, offset)
                }
            }
            MbcKind::Mbc5 {
                ram_enable,
                ram_bank,
                ..
            } => {
                if !*ram_enable || self.ram.is_empty() {
                    return 0xFF;
                }
                self.ram_byte(*ram_bank as usize, offset)
            }
        }
    }

    fn ram_byte(&self, bank: usize, offset: usize) -> u8 {
        if self.ram_banks == 0 || self.ram.is_empty() {
            return 0xFF;
        }
        let bank = bank % self.ram_banks;
        self.ram
            .get(bank * self.ram_bank_size + offset)
            .copied()
            .unwrap_or(0xFF)
    }

    fn ram_byte_mut(&mut self, bank: usize, offset: usize, value: u8) {
        if self.ram_banks == 0 || self.ram.is_empty() {
            return;
        }
        let bank = bank % self.ram_banks;
        if let Some(slot) = self.ram.get_mut(bank * self.ram_bank_size + offset) {
            *slot = value;
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x7FFF => self.write_control(addr, value),
            EXT_RAM_START..=crate::memory_map::EXT_RAM_END => self.write_ram(addr, value),
            _ => {}
        }
    }

    fn write_control(&mut self, addr: u16, value: u8) {
        match &mut self.kind {
            MbcKind::NoMbc => {}
            MbcKind::Mbc1 {
                ram_enable,
                primary_bank,
                secondary_bank,
                advanced_mode,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = value & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    let bank = value & 0x1F;
                    *primary_bank = if bank == 0 { 1 } else { bank };
                }
                0x4000..=0x5FFF => *secondary_bank = value & 0x03,
                0x6000..=0x7FFF => *advanced_mode = value & 0x01 != 0,
                _ => {}
            },
            MbcKind::Mbc2 { ram_enable, rom_bank } => {
                if addr <= 0x3FFF {
                    if addr & 0x0100 == 0 {
                        *ram_enable = value & 0x0F == 0x0A;
                    } else {
                        let bank = value & 0x0F;
                        *rom_bank = if bank == 0 { 1 } else { bank };
                    }
                }
            }
            MbcKind::Mbc3 {
                ram_enable,
                rom_bank,
                ram_bank_or_rtc,
                rtc,
                rtc_latched,
                latch_state,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = value & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    let bank = value & 0x7F;
                    *rom_bank = if bank == 0 { 1 } else { bank };
                }
                0x4000..=0x5FFF => *ram_bank_or_rtc = value,
                0x6000..=0x7FFF => {
                    if *latch_state == 0 && value == 0x00 {
                        *latch_state = 1;
                    } else if *latch_state == 1 && value == 0x01 {
                        rtc.tick();
                        *rtc_latched = rtc.clone();
                        *latch_state = 0;
                    } else {
                        *latch_state = 0;
                    }
                }
                _ => {}
            },
            MbcKind::Mbc5 {
                ram_enable,
                rom_bank,
                ram_bank,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = value & 0x0F == 0x0A,
                0x2000..=0x2FFF => *rom_bank = (*rom_bank & 0x100) | value as u16,
                0x3000..=0x3FFF => *rom_bank = (*rom_bank & 0xFF) | (((value & 1) as u16) << 8),
                0x4000..=0x5FFF => *ram_bank = value & 0x0F,
                _ => {}
            },
        }
    }

    fn write_ram(&mut self, addr: u16, value: u8) {
        let offset = (addr - EXT_RAM_START) as usize;
        match &mut self.kind {
            MbcKind::NoMbc => {
                if let Some(slot) = self.ram.get_mut(offset) {
                    *slot = value;
                }
            }
            MbcKind::Mbc1 {
                ram_enable,
                secondary_bank,
                advanced_mode,
                ..
            } => {
                if !*ram_enable {
                    return;
                }
                let bank = if *advanced_mode { *secondary_bank as usize } else { 0 };
                self.ram_byte_mut(bank, offset, value);
            }
            MbcKind::Mbc2 { ram_enable, .. } => {
                if !*ram_enable || self.ram.is_empty() {
                    return;
                }
                let len = self.ram.len();
                self.ram[offset % len] = value & 0x0F;
            }
            MbcKind::Mbc3 {
                ram_enable,
                ram_bank_or_rtc,
                rtc,
                ..
            } => {
                if !*ram_enable {
                    return;
                }
                if *ram_bank_or_rtc >= 0x08 {
                    rtc.write(*ram_bank_or_rtc, value);
                } else {
                    let bank = *ram_bank_or_rtc as usize;
                    self.ram_byte_mut(bank, offset, value);
                }
            }
            MbcKind::Mbc5 {
                ram_enable,
                ram_bank,
                ..
            } => {
                if !*ram_enable {
                    return;
                }
                let bank = *ram_bank as usize;
                self.ram_byte_mut(bank, offset, value);
            }
        }
    }

}

pub(crate) fn warn_unsupported(type_code: u8) {
    warn!("cartridge: refusing unsupported type byte {:#04X}", type_code);
}
