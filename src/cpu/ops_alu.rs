//! ADD/ADC/SUB/SBC/AND/OR/XOR/CP, INC/DEC, 16-bit ADD, DAA, CPL, CCF/SCF.
//! The eight ALU operations share one flag-setting core (`alu_op`) across
//! their register, `(HL)` and immediate encodings.

use crate::bus::MemoryBus;
use crate::error::CpuResult;

use super::{Cpu, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

fn alu_op(cpu: &mut Cpu, op: u8, value: u8) {
    match op & 0x07 {
        0 => add8(cpu, value, false),
        1 => add8(cpu, value, true),
        2 => sub8(cpu, value, false),
        3 => sub8(cpu, value, true),
        4 => and8(cpu, value),
        5 => xor8(cpu, value),
        6 => or8(cpu, value),
        7 => cp8(cpu, value),
        _ => unreachable!(),
    }
}

fn add8(cpu: &mut Cpu, value: u8, with_carry: bool) {
    let carry_in = if with_carry && cpu.flag(FLAG_C) { 1u8 } else { 0 };
    let a = cpu.a;
    let (partial, carry1) = a.overflowing_add(value);
    let (result, carry2) = partial.overflowing_add(carry_in);
    let half_carry = (a & 0x0F) + (value & 0x0F) + carry_in > 0x0F;
    cpu.a = result;
    cpu.set_flag(FLAG_Z, result == 0);
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, half_carry);
    cpu.set_flag(FLAG_C, carry1 || carry2);
}

fn sub8(cpu: &mut Cpu, value: u8, with_carry: bool) {
    let result = sub8_compute(cpu, value, with_carry);
    cpu.a = result;
}

fn cp8(cpu: &mut Cpu, value: u8) {
    sub8_compute(cpu, value, false);
}

fn sub8_compute(cpu: &mut Cpu, value: u8, with_carry: bool) -> u8 {
    let carry_in = if with_carry && cpu.flag(FLAG_C) { 1u8 } else { 0 };
    let a = cpu.a;
    let (partial, borrow1) = a.overflowing_sub(value);
    let (result, borrow2) = partial.overflowing_sub(carry_in);
    let half_borrow = (a & 0x0F) < (value & 0x0F) + carry_in;
    cpu.set_flag(FLAG_Z, result == 0);
    cpu.set_flag(FLAG_N, true);
    cpu.set_flag(FLAG_H, half_borrow);
    cpu.set_flag(FLAG_C, borrow1 || borrow2);
    result
}

fn and8(cpu: &mut Cpu, value: u8) {
    cpu.a &= value;
    cpu.set_flag(FLAG_Z, cpu.a == 0);
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, true);
    cpu.set_flag(FLAG_C, false);
}

fn or8(cpu: &mut Cpu, value: u8) {
    cpu.a |= value;
    cpu.set_flag(FLAG_Z, cpu.a == 0);
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, false);
    cpu.set_flag(FLAG_C, false);
}

fn xor8(cpu: &mut Cpu, value: u8) {
    cpu.a ^= value;
    cpu.set_flag(FLAG_Z, cpu.a == 0);
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, false);
    cpu.set_flag(FLAG_C, false);
}

pub(crate) fn alu_a_r(cpu: &mut Cpu, bus: &mut MemoryBus, op: u8, reg: u8) -> CpuResult<u8> {
    let value = cpu.read_r8(reg, bus);
    alu_op(cpu, op, value);
    Ok(if reg == 6 { 2 } else { 1 })
}

pub(crate) fn alu_a_d8(cpu: &mut Cpu, bus: &mut MemoryBus, op: u8) -> CpuResult<u8> {
    let value = cpu.fetch_byte(bus);
    alu_op(cpu, op, value);
    Ok(2)
}

pub(crate) fn inc_r8(cpu: &mut Cpu, bus: &mut MemoryBus, reg: u8) -> CpuResult<u8> {
    let value = cpu.read_r8(reg, bus);
    let result = value.wrapping_add(1);
    cpu.write_r8(reg, result, bus);
    cpu.set_flag(FLAG_Z, result == 0);
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, value & 0x0F == 0x0F);
    Ok(if reg == 6 { 3 } else { 1 })
}

pub(crate) fn dec_r8(cpu: &mut Cpu, bus: &mut MemoryBus, reg: u8) -> CpuResult<u8> {
    let value = cpu.read_r8(reg, bus);
    let result = value.wrapping_sub(1);
    cpu.write_r8(reg, result, bus);
    cpu.set_flag(FLAG_Z, result == 0);
    cpu.set_flag(FLAG_N, true);
    cpu.set_flag(FLAG_H, value & 0x0F == 0);
    Ok(if reg == 6 { 3 } else { 1 })
}

pub(crate) fn add_hl_rp(cpu: &mut Cpu, idx: u8) -> CpuResult<u8> {
    let hl = cpu.hl();
    let value = cpu.read_rp(idx);
    let (result, carry) = hl.overflowing_add(value);
    let half_carry = (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF;
    cpu.set_hl(result);
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, half_carry);
    cpu.set_flag(FLAG_C, carry);
    Ok(2)
}

/// Shared by `ADD SP,e` and `LD HL,SP+e`: flags come from the signed
/// low-byte addition regardless of which register receives the result.
pub(crate) fn add_sp_signed_flags(cpu: &mut Cpu, e: i8) -> u16 {
    let sp = cpu.sp;
    let e16 = e as i16 as u16;
    let result = sp.wrapping_add(e16);
    let half_carry = (sp & 0x0F) + (e16 & 0x0F) > 0x0F;
    let carry = (sp & 0xFF) + (e16 & 0xFF) > 0xFF;
    cpu.set_flag(FLAG_Z, false);
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, half_carry);
    cpu.set_flag(FLAG_C, carry);
    result
}

pub(crate) fn add_sp_e(cpu: &mut Cpu, bus: &mut MemoryBus) -> CpuResult<u8> {
    let e = cpu.fetch_byte(bus) as i8;
    cpu.sp = add_sp_signed_flags(cpu, e);
    Ok(4)
}

pub(crate) fn daa(cpu: &mut Cpu) -> CpuResult<u8> {
    let mut adjust = 0u8;
    let mut carry = cpu.flag(FLAG_C);
    if cpu.flag(FLAG_N) {
        if cpu.flag(FLAG_H) {
            adjust |= 0x06;
        }
        if carry {
            adjust |= 0x60;
        }
        cpu.a = cpu.a.wrapping_sub(adjust);
    } else {
        if cpu.flag(FLAG_H) || cpu.a & 0x0F > 0x09 {
            adjust |= 0x06;
        }
        if carry || cpu.a > 0x99 {
            adjust |= 0x60;
            carry = true;
        }
        cpu.a = cpu.a.wrapping_add(adjust);
    }
    cpu.set_flag(FLAG_Z, cpu.a == 0);
    cpu.set_flag(FLAG_H, false);
    cpu.set_flag(FLAG_C, carry);
    Ok(1)
}

pub(crate) fn cpl(cpu: &mut Cpu) -> CpuResult<u8> {
    cpu.a = !cpu.a;
    cpu.set_flag(FLAG_N, true);
    cpu.set_flag(FLAG_H, true);
    Ok(1)
}

pub(crate) fn scf(cpu: &mut Cpu) -> CpuResult<u8> {
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, false);
    cpu.set_flag(FLAG_C, true);
    Ok(1)
}

pub(crate) fn ccf(cpu: &mut Cpu) -> CpuResult<u8> {
    let carry = cpu.flag(FLAG_C);
    cpu.set_flag(FLAG_N, false);
    cpu.set_flag(FLAG_H, false);
    cpu.set_flag(FLAG_C, !carry);
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn bus() -> MemoryBus {
        MemoryBus::new(Cartridge::from_rom_bytes(vec![0u8; 0x8000]).unwrap())
    }

    #[test]
    fn add_sets_half_and_full_carry() {
        let mut cpu = Cpu::new();
        cpu.a = 0x0F;
        add8(&mut cpu, 0x01, false);
        assert_eq!(cpu.a, 0x10);
        assert!(cpu.flag(FLAG_H));
        assert!(!cpu.flag(FLAG_C));
    }

    #[test]
    fn sub_identical_values_sets_zero_and_clears_carry() {
        let mut cpu = Cpu::new();
        cpu.a = 0x42;
        sub8(&mut cpu, 0x42, false);
        assert_eq!(cpu.a, 0);
        assert!(cpu.flag(FLAG_Z));
        assert!(!cpu.flag(FLAG_C));
    }

    #[test]
    fn daa_after_bcd_add_corrects_to_decimal() {
        let mut cpu = Cpu::new();
        cpu.a = 0x09;
        add8(&mut cpu, 0x09, false); // binary 0x12, half-carry set
        daa(&mut cpu).unwrap();
        assert_eq!(cpu.a, 0x18);
    }

    #[test]
    fn inc_hl_indirect_costs_three_cycles() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.set_hl(0xC000);
        let cycles = inc_r8(&mut cpu, &mut b, 6).unwrap();
        assert_eq!(cycles, 3);
        assert_eq!(b.read_byte(0xC000), 1);
    }
}
