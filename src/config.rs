pub const BOOTLOADER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GATEWAY_VERSION: &str = "2.0";

pub const HOLD_WINDOW_MS: u32 = 3_000;
pub const HOLD_POLL_INTERVAL_MS: u32 = 50;

// The gateway image is ~1.7 MB; anything below this is likely an empty slot.
pub const MIN_GATEWAY_SIZE_BYTES: u32 = 1_500_000;

pub const PARTITION_ABSENT_GRACE_MS: u32 = 10_000;
pub const BOOT_COMMIT_FAILED_GRACE_MS: u32 = 5_000;
pub const CHAIN_BOOT_SETTLE_MS: u32 = 1_000;
pub const PROVISION_RESTART_DELAY_MS: u32 = 3_000;

pub const CONFIG_NAMESPACE: &str = "meshtastic";
pub const CONFIG_NAMESPACE_MAX: usize = 15;
pub const CONFIG_KEY_MAX: usize = 15;
pub const CONFIG_ENTRY_MAX: usize = 8;
pub const CONFIG_VALUE_MAX: usize = 128;
// ESP-IDF keeps one NVS page free for compaction, so two is the floor.
pub const CONFIG_STORE_PAGES_MIN: usize = 2;
pub const CONFIG_STORE_PAGES_MAX: usize = 16;

pub const PROVISION_PAYLOAD_MAX: usize = 1_024;
pub const PROVISION_CHUNK_MAX: usize = 256;
pub const PROVISION_FIELD_MAX: usize = 16;
pub const WIFI_SSID_MAX: usize = 32;
pub const WIFI_PASSWORD_MAX: usize = 64;
pub const BOT_TOKEN_MAX: usize = 96;
pub const CHAT_ID_MAX: usize = 32;

pub const DEFAULT_LORA_REGION: i32 = 3;
pub const DEFAULT_LORA_PRESET: i32 = 0;
