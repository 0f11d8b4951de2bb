//! Meshtastic LoRa region and modem preset codes accepted by the gateway.

const REGIONS: [&str; 15] = [
    "UNSET", "US", "EU_433", "EU_868", "CN", "JP", "ANZ", "KR", "TW", "RU", "IN", "NZ_865",
    "TH", "UA_433", "UA_868",
];

const PRESETS: [&str; 8] = [
    "LONG_FAST",
    "LONG_SLOW",
    "VERY_LONG_SLOW",
    "MEDIUM_SLOW",
    "MEDIUM_FAST",
    "SHORT_SLOW",
    "SHORT_FAST",
    "LONG_MODERATE",
];

pub fn region_name(code: i32) -> Option<&'static str> {
    usize::try_from(code).ok().and_then(|index| REGIONS.get(index).copied())
}

pub fn preset_name(code: i32) -> Option<&'static str> {
    usize::try_from(code).ok().and_then(|index| PRESETS.get(index).copied())
}

pub fn regions() -> impl Iterator<Item = (i32, &'static str)> {
    REGIONS.iter().enumerate().map(|(code, name)| (code as i32, *name))
}

pub fn presets() -> impl Iterator<Item = (i32, &'static str)> {
    PRESETS.iter().enumerate().map(|(code, name)| (code as i32, *name))
}
