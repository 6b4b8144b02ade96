//! The CB-prefixed page. Its 256 opcodes decode arithmetically rather than
//! through a second lookup table: bits 0-2 select the register (the same
//! `r8` encoding as the main page, `(HL)` at index 6), and bits 3-7 select
//! one of 32 operations — the eight rotate/shift forms, then BIT/RES/SET
//! each repeated across the 8 bit indices.

use crate::bus::MemoryBus;
use crate::error::CpuResult;

use super::ops_rot_shift::{rl8, rlc8, rr8, rrc8, sla8, sra8, srl8, swap8};
use super::{Cpu, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

pub(crate) fn execute(cpu: &mut Cpu, bus: &mut MemoryBus, opcode: u8) -> CpuResult<u8> {
    let reg = opcode & 0x07;
    let group = opcode >> 3;
    let indirect = reg == 6;

    match group {
        0..=7 => {
            let value = cpu.read_r8(reg, bus);
            let (result, carry) = match group {
                0 => rlc8(value),
                1 => rrc8(value),
                2 => rl8(value, cpu.flag(FLAG_C)),
                3 => rr8(value, cpu.flag(FLAG_C)),
                4 => sla8(value),
                5 => sra8(value),
                6 => (swap8(value), false),
                7 => srl8(value),
                _ => unreachable!(),
            };
            cpu.write_r8(reg, result, bus);
            cpu.set_flag(FLAG_Z, result == 0);
            cpu.set_flag(FLAG_N, false);
            cpu.set_flag(FLAG_H, false);
            cpu.set_flag(FLAG_C, carry);
            Ok(if indirect { 4 } else { 2 })
        }
        8..=15 => {
            let bit = group - 8;
            let value = cpu.read_r8(reg, bus);
            cpu.set_flag(FLAG_Z, value & (1 << bit) == 0);
            cpu.set_flag(FLAG_N, false);
            cpu.set_flag(FLAG_H, true);
            Ok(if indirect { 3 } else { 2 })
        }
        16..=23 => {
            let bit = group - 16;
            let value = cpu.read_r8(reg, bus);
            cpu.write_r8(reg, value & !(1 << bit), bus);
            Ok(if indirect { 4 } else { 2 })
        }
        24..=31 => {
            let bit = group - 24;
            let value = cpu.read_r8(reg, bus);
            cpu.write_r8(reg, value | (1 << bit), bus);
            Ok(if indirect { 4 } else { 2 })
        }
        _ => unreachable!("CB opcode group is always 0..=31"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn bus() -> MemoryBus {
        MemoryBus::new(Cartridge::from_rom_bytes(vec![0u8; 0x8000]).unwrap())
    }

    #[test]
    fn bit_7_of_zero_sets_zero_flag() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.b = 0x00;
        // BIT 7,B = 0x78
        let cycles = execute(&mut cpu, &mut b, 0x78).unwrap();
        assert_eq!(cycles, 2);
        assert!(cpu.flag(FLAG_Z));
        assert!(cpu.flag(FLAG_H));
    }

    #[test]
    fn res_0_hl_clears_bit_in_memory() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.set_hl(0xC000);
        b.write_byte(0xC000, 0xFF);
        // RES 0,(HL) = 0x86
        let cycles = execute(&mut cpu, &mut b, 0x86).unwrap();
        assert_eq!(cycles, 4);
        assert_eq!(b.read_byte(0xC000), 0xFE);
    }

    #[test]
    fn set_3_a_sets_bit_without_touching_flags() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.a = 0x00;
        cpu.f = 0xD0;
        // SET 3,A = 0xDF
        execute(&mut cpu, &mut b, 0xDF).unwrap();
        assert_eq!(cpu.a, 0x08);
        assert_eq!(cpu.f, 0xD0);
    }

    #[test]
    fn swap_b_then_swap_b_is_identity() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.b = 0x4A;
        // SWAP B = 0x30
        execute(&mut cpu, &mut b, 0x30).unwrap();
        execute(&mut cpu, &mut b, 0x30).unwrap();
        assert_eq!(cpu.b, 0x4A);
    }
}
