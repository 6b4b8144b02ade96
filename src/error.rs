use thiserror::Error;

/// Fatal conditions the core can report. Anything recoverable (unmapped I/O,
/// writes into the 0xFEA0-0xFEFF hole) follows the hardware convention of
/// 0xFF on read / drop on write instead of an error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EmuError {
    /// The decoder fetched an opcode with no defined operation (or one of
    /// the eleven documented illegal opcodes).
    #[error("unimplemented opcode {opcode:#04X} at PC={pc:#06X}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },

    /// The cartridge header's type byte (0x0147) does not match a supported
    /// MBC variant.
    #[error("unsupported cartridge type byte {type_code:#04X}")]
    CartridgeUnsupported { type_code: u8 },

    /// A collaborator (PPU, APU, ...) addressed a byte outside the window it
    /// owns. The bus itself never raises this, since every address in the
    /// 16-bit space is mapped; the variant exists so external collaborators
    /// built against this core can report the same failure mode.
    #[error("address {addr:#06X} out of range for the requesting device")]
    BusOutOfRange { addr: u16 },
}

pub type CpuResult<T> = Result<T, EmuError>;
