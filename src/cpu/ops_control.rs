//! Control transfer: `JP`/`JR`/`CALL`/`RET`/`RETI`/`RST`, plus `HALT`/`STOP`
//! and the `DI`/`EI` delay scheduling entry points used from `mod.rs`.
//! Conditional forms pay the taken-path cost only when the condition holds.

use crate::bus::MemoryBus;
use crate::error::CpuResult;

use super::Cpu;

pub(crate) fn jp_nn(cpu: &mut Cpu, bus: &mut MemoryBus) -> CpuResult<u8> {
    cpu.pc = cpu.fetch_word(bus);
    Ok(4)
}

pub(crate) fn jp_cc_nn(cpu: &mut Cpu, bus: &mut MemoryBus, cc: u8) -> CpuResult<u8> {
    let target = cpu.fetch_word(bus);
    if cpu.check_cond(cc) {
        cpu.pc = target;
        Ok(4)
    } else {
        Ok(3)
    }
}

pub(crate) fn jr_e(cpu: &mut Cpu, bus: &mut MemoryBus) -> CpuResult<u8> {
    let offset = cpu.fetch_byte(bus) as i8 as i16;
    cpu.pc = (cpu.pc as i16).wrapping_add(offset) as u16;
    Ok(3)
}

pub(crate) fn jr_cc_e(cpu: &mut Cpu, bus: &mut MemoryBus, cc: u8) -> CpuResult<u8> {
    let offset = cpu.fetch_byte(bus) as i8 as i16;
    if cpu.check_cond(cc) {
        cpu.pc = (cpu.pc as i16).wrapping_add(offset) as u16;
        Ok(3)
    } else {
        Ok(2)
    }
}

pub(crate) fn call_nn(cpu: &mut Cpu, bus: &mut MemoryBus) -> CpuResult<u8> {
    let target = cpu.fetch_word(bus);
    let return_pc = cpu.pc;
    cpu.push_word(bus, return_pc);
    cpu.pc = target;
    Ok(6)
}

pub(crate) fn call_cc_nn(cpu: &mut Cpu, bus: &mut MemoryBus, cc: u8) -> CpuResult<u8> {
    let target = cpu.fetch_word(bus);
    if cpu.check_cond(cc) {
        let return_pc = cpu.pc;
        cpu.push_word(bus, return_pc);
        cpu.pc = target;
        Ok(6)
    } else {
        Ok(3)
    }
}

pub(crate) fn ret(cpu: &mut Cpu, bus: &mut MemoryBus) -> CpuResult<u8> {
    cpu.pc = cpu.pop_word(bus);
    Ok(4)
}

pub(crate) fn ret_cc(cpu: &mut Cpu, bus: &mut MemoryBus, cc: u8) -> CpuResult<u8> {
    if cpu.check_cond(cc) {
        cpu.pc = cpu.pop_word(bus);
        Ok(5)
    } else {
        Ok(2)
    }
}

pub(crate) fn reti(cpu: &mut Cpu, bus: &mut MemoryBus) -> CpuResult<u8> {
    cpu.pc = cpu.pop_word(bus);
    cpu.schedule_ime_enable();
    Ok(4)
}

pub(crate) fn rst(cpu: &mut Cpu, bus: &mut MemoryBus, vector: u16) -> CpuResult<u8> {
    let return_pc = cpu.pc;
    cpu.push_word(bus, return_pc);
    cpu.pc = vector;
    Ok(4)
}

pub(crate) fn halt(cpu: &mut Cpu) -> CpuResult<u8> {
    cpu.set_halted();
    Ok(1)
}

pub(crate) fn stop(cpu: &mut Cpu, bus: &mut MemoryBus) -> CpuResult<u8> {
    // Consumes the mandatory second byte (conventionally 0x00); the
    // low-power wake protocol isn't modeled, this just stops fetching.
    let _ = cpu.fetch_byte(bus);
    cpu.request_stop();
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
    fn call_then_ret_restores_pc() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.pc = 0x0200;
        let entry_pc = cpu.pc;
        cpu.push_word(&mut b, entry_pc);
        cpu.pc = 0x0300;
        ret(&mut cpu, &mut b).unwrap();
        assert_eq!(cpu.pc, 0x0200);
    }

    #[test]
    fn conditional_jump_not_taken_leaves_pc_at_fallthrough() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        b.write_byte(cpu.pc, 0x34);
        b.write_byte(cpu.pc + 1, 0x12);
        let cycles = jp_cc_nn(&mut cpu, &mut b, 1).unwrap(); // cc=Z, Z flag clear
        assert_eq!(cycles, 3);
        assert_eq!(cpu.pc, 0x0102);
    }
}
