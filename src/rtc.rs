//! MBC3's real-time clock registers, latched into the 0xA000-0xBFFF window
//! when the RAM-bank-select register holds 0x08-0x0C.

use std::time::{SystemTime, UNIX_EPOCH};

const DAY_CARRY_BIT: u8 = 0b0000_0001;
const HALT_BIT: u8 = 0b0100_0000;
const DAY_OVERFLOW_BIT: u8 = 0b1000_0000;

#[derive(Clone, Debug, Default)]
pub struct RtcRegisters {
    seconds: u8,
    minutes: u8,
    hours: u8,
    day_low: u8,
    day_high: u8,
    last_updated_secs: u64,
}

impl RtcRegisters {
    pub fn new() -> Self {
        let mut rtc = Self::default();
        rtc.last_updated_secs = now_secs();
        rtc
    }

    /// Advance the registers by however much wall-clock time has elapsed
    /// since the last call. A no-op while the halt bit is set.
    pub fn tick(&mut self) {
        let now = now_secs();
        if self.day_high & HALT_BIT != 0 {
            self.last_updated_secs = now;
            return;
        }
        let elapsed = now.saturating_sub(self.last_updated_secs);
        if elapsed == 0 {
            return;
        }
        self.last_updated_secs = now;

        let total_seconds = u64::from(self.seconds) + elapsed;
        self.seconds = (total_seconds % 60) as u8;
        let total_minutes = u64::from(self.minutes) + total_seconds / 60;
        self.minutes = (total_minutes % 60) as u8;
        let total_hours = u64::from(self.hours) + total_minutes / 60;
        self.hours = (total_hours % 24) as u8;

        let mut days = u64::from(self.day_low) | (u64::from(self.day_high & DAY_CARRY_BIT) << 8);
        days += total_hours / 24;
        if days >= 512 {
            days %= 512;
            self.day_high |= DAY_OVERFLOW_BIT;
        }
        self.day_low = (days & 0xFF) as u8;
        self.day_high = (self.day_high & HALT_BIT)
            | ((days >> 8) as u8 & DAY_CARRY_BIT)
            | (self.day_high & DAY_OVERFLOW_BIT);
    }

    pub fn read(&self, reg_select: u8) -> u8 {
        match reg_select {
            0x08 => self.seconds,
            0x09 => self.minutes,
            0x0A => self.hours,
            0x0B => self.day_low,
            0x0C => self.day_high,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, reg_select: u8, value: u8) {
        match reg_select {
            0x08 => self.seconds = value.min(59),
            0x09 => self.minutes = value.min(59),
            0x0A => self.hours = value.min(23),
            0x0B => self.day_low = value,
            0x0C => {
                self.day_high =
                    (value & (DAY_CARRY_BIT | HALT_BIT)) | (self.day_high & DAY_OVERFLOW_BIT)
            }
            _ => {}
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
