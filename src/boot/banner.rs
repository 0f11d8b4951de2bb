use core::fmt;

use crate::config::{BOOTLOADER_VERSION, GATEWAY_VERSION};

pub const HARDWARE_SUMMARY: &str = "ESP32 + SX1276 LoRa";

const RULE: &str = "========================================";

/// Startup banner printed before the button is sampled.
#[derive(Clone, Copy, Debug)]
pub struct Banner {
    console_baud: u32,
}

impl Banner {
    pub const fn new(console_baud: u32) -> Self {
        Self { console_baud }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "  Meshtastic-Telegram gateway bootloader")?;
        writeln!(
            f,
            "  bootloader v{}  gateway v{}",
            BOOTLOADER_VERSION, GATEWAY_VERSION
        )?;
        writeln!(
            f,
            "  hardware: {}  console: {} baud",
            HARDWARE_SUMMARY, self.console_baud
        )?;
        f.write_str(RULE)
    }
}
