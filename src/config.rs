//! Driver-visible knobs that sit outside the architectural spec but are
//! needed to actually run a ROM.

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Always true: boot ROM emulation is out of scope, so the CPU always
    /// starts from the documented post-boot-ROM register/PC state. Kept as
    /// an explicit field rather than a hidden constant so a test can build
    /// a `Cpu` with an all-zero state if that's ever useful.
    pub apply_post_boot_reset: bool,
    /// When set, `Cpu::step` emits a `trace!` line per instruction
    /// (opcode, PC, register file) instead of only on fatal error.
    pub trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apply_post_boot_reset: true,
            trace: false,
        }
    }
}
