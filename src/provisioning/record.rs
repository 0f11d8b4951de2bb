use core::fmt;

use heapless::String;
use log::warn;

use crate::config::{
    BOT_TOKEN_MAX, CHAT_ID_MAX, CONFIG_NAMESPACE, DEFAULT_LORA_PRESET, DEFAULT_LORA_REGION,
    WIFI_PASSWORD_MAX, WIFI_SSID_MAX,
};
use crate::store::{ConfigStorage, StoreError};

use super::fields::{FieldError, FieldMap, JsonFields};
use super::lora::{preset_name, region_name};

pub const KEY_WIFI_SSID: &str = "wifi_ssid";
pub const KEY_WIFI_PASS: &str = "wifi_pass";
pub const KEY_WIFI_PASSWORD: &str = "wifi_password";
pub const KEY_BOT_TOKEN: &str = "bot_token";
pub const KEY_CHAT_ID: &str = "chat_id";
pub const KEY_LORA_REGION: &str = "lora_region";
pub const KEY_LORA_PRESET: &str = "lora_preset";

/// Gateway settings collected by the portal.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ProvisioningRecord {
    pub wifi_ssid: String<WIFI_SSID_MAX>,
    pub wifi_password: String<WIFI_PASSWORD_MAX>,
    pub bot_token: String<BOT_TOKEN_MAX>,
    pub chat_id: String<CHAT_ID_MAX>,
    pub lora_region: i32,
    pub lora_preset: i32,
}

impl ProvisioningRecord {
    pub fn from_fields<F>(fields: &F) -> Result<Self, FieldError>
    where
        F: FieldMap + ?Sized,
    {
        let wifi_ssid = fields.required_str(KEY_WIFI_SSID)?;
        let bot_token = fields.required_str(KEY_BOT_TOKEN)?;
        let chat_id = fields.required_str(KEY_CHAT_ID)?;

        let wifi_password = match fields.optional_str(KEY_WIFI_PASS)? {
            Some(password) => password,
            None => fields.optional_str(KEY_WIFI_PASSWORD)?.unwrap_or_default(),
        };

        let lora_region = known_or_default(
            KEY_LORA_REGION,
            fields.int_or(KEY_LORA_REGION, DEFAULT_LORA_REGION),
            DEFAULT_LORA_REGION,
            region_name,
        );
        let lora_preset = known_or_default(
            KEY_LORA_PRESET,
            fields.int_or(KEY_LORA_PRESET, DEFAULT_LORA_PRESET),
            DEFAULT_LORA_PRESET,
            preset_name,
        );

        Ok(Self {
            wifi_ssid,
            wifi_password,
            bot_token,
            chat_id,
            lora_region,
            lora_preset,
        })
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, FieldError> {
        Self::from_fields(&JsonFields::parse(payload)?)
    }

    /// Writes all six fields in one save.
    pub fn persist<C>(&self, store: &mut C) -> Result<(), StoreError>
    where
        C: ConfigStorage + ?Sized,
    {
        store.save(
            CONFIG_NAMESPACE,
            &[
                (KEY_WIFI_SSID, self.wifi_ssid.as_str()),
                (KEY_WIFI_PASS, self.wifi_password.as_str()),
                (KEY_BOT_TOKEN, self.bot_token.as_str()),
                (KEY_CHAT_ID, self.chat_id.as_str()),
            ],
            &[
                (KEY_LORA_REGION, self.lora_region),
                (KEY_LORA_PRESET, self.lora_preset),
            ],
        )
    }

    /// Log-safe view with the secrets masked.
    pub fn summary(&self) -> RecordSummary<'_> {
        RecordSummary(self)
    }
}

fn known_or_default(
    key: &str,
    code: i32,
    default: i32,
    name: fn(i32) -> Option<&'static str>,
) -> i32 {
    if name(code).is_some() {
        code
    } else {
        warn!("provisioning: unknown {} code {}; using {}", key, code, default);
        default
    }
}

pub struct RecordSummary<'a>(&'a ProvisioningRecord);

impl fmt::Display for RecordSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0;
        writeln!(f, "  WiFi SSID:   {}", record.wifi_ssid)?;
        if record.wifi_password.is_empty() {
            writeln!(f, "  WiFi Pass:   (empty)")?;
        } else {
            writeln!(f, "  WiFi Pass:   ********")?;
        }
        writeln!(f, "  Bot Token:   {}", MaskedToken(&record.bot_token))?;
        writeln!(f, "  Chat ID:     {}", record.chat_id)?;
        writeln!(
            f,
            "  LoRa Region: {} ({})",
            record.lora_region,
            region_name(record.lora_region).unwrap_or("?")
        )?;
        write!(
            f,
            "  LoRa Preset: {} ({})",
            record.lora_preset,
            preset_name(record.lora_preset).unwrap_or("?")
        )
    }
}

const TOKEN_HEAD: usize = 10;
const TOKEN_TAIL: usize = 4;

struct MaskedToken<'a>(&'a str);

impl fmt::Display for MaskedToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars = self.0.chars().count();
        if chars <= TOKEN_HEAD + TOKEN_TAIL {
            return f.write_str("********");
        }
        for ch in self.0.chars().take(TOKEN_HEAD) {
            fmt::Write::write_char(f, ch)?;
        }
        f.write_str("...")?;
        for ch in self.0.chars().skip(chars - TOKEN_TAIL) {
            fmt::Write::write_char(f, ch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ConfigStore, StoreError};
    use crate::testing::MemFlash;

    const NVS_REGION: usize = 3 * 4_096;

    const FULL: &[u8] = br#"{"wifi_ssid":"HomeNet","wifi_pass":"hunter22","bot_token":"123456789:ABCdefGHIjklMNO","chat_id":"-1001","lora_region":"1","lora_preset":"4"}"#;

    #[test]
    fn parses_complete_submission() {
        let record = ProvisioningRecord::from_payload(FULL).expect("valid");
        assert_eq!(record.wifi_ssid.as_str(), "HomeNet");
        assert_eq!(record.wifi_password.as_str(), "hunter22");
        assert_eq!(record.chat_id.as_str(), "-1001");
        assert_eq!(record.lora_region, 1);
        assert_eq!(record.lora_preset, 4);
    }

    #[test]
    fn optional_fields_take_defaults() {
        let record = ProvisioningRecord::from_payload(
            br#"{"wifi_ssid":"A","bot_token":"T","chat_id":"1"}"#,
        )
        .expect("valid");
        assert_eq!(record.wifi_password.as_str(), "");
        assert_eq!(record.lora_region, 3);
        assert_eq!(record.lora_preset, 0);
    }

    #[test]
    fn accepts_web_app_password_key() {
        let record = ProvisioningRecord::from_payload(
            br#"{"wifi_ssid":"A","wifi_password":"pw","bot_token":"T","chat_id":"1"}"#,
        )
        .expect("valid");
        assert_eq!(record.wifi_password.as_str(), "pw");
    }

    #[test]
    fn form_password_key_takes_precedence() {
        let record = ProvisioningRecord::from_payload(
            br#"{"wifi_password":"b","wifi_pass":"a","wifi_ssid":"A","bot_token":"T","chat_id":"1"}"#,
        )
        .expect("valid");
        assert_eq!(record.wifi_password.as_str(), "a");
    }

    #[test]
    fn out_of_range_codes_fall_back() {
        let record = ProvisioningRecord::from_payload(
            br#"{"wifi_ssid":"A","bot_token":"T","chat_id":"1","lora_region":99,"lora_preset":"-2"}"#,
        )
        .expect("valid");
        assert_eq!(record.lora_region, DEFAULT_LORA_REGION);
        assert_eq!(record.lora_preset, DEFAULT_LORA_PRESET);
    }

    #[test]
    fn required_fields_are_checked_in_order() {
        assert_eq!(
            ProvisioningRecord::from_payload(br#"{"chat_id":"1"}"#),
            Err(FieldError::MissingRequiredField(KEY_WIFI_SSID))
        );
        assert_eq!(
            ProvisioningRecord::from_payload(br#"{"wifi_ssid":"A","chat_id":"1"}"#),
            Err(FieldError::MissingRequiredField(KEY_BOT_TOKEN))
        );
        assert_eq!(
            ProvisioningRecord::from_payload(br#"{"wifi_ssid":"A","bot_token":"T","chat_id":""}"#),
            Err(FieldError::MissingRequiredField(KEY_CHAT_ID))
        );
    }

    #[test]
    fn ssid_longer_than_wifi_limit_is_rejected() {
        let fields: &[(&str, &str)] = &[
            (KEY_WIFI_SSID, "0123456789012345678901234567890123"),
            (KEY_BOT_TOKEN, "T"),
            (KEY_CHAT_ID, "1"),
        ];
        assert_eq!(
            ProvisioningRecord::from_fields(fields),
            Err(FieldError::FieldTooLong(KEY_WIFI_SSID))
        );
    }

    #[test]
    fn persist_writes_all_six_fields() {
        let record = ProvisioningRecord::from_payload(FULL).expect("valid");
        let mut store = ConfigStore::new(MemFlash::new(NVS_REGION), 0, NVS_REGION as u32)
            .expect("region fits");
        record.persist(&mut store).expect("saved");
        let set = store.load(CONFIG_NAMESPACE).expect("loads");
        assert_eq!(set.len(), 6);
        assert_eq!(set.get_str(KEY_WIFI_SSID), Some("HomeNet"));
        assert_eq!(set.get_str(KEY_WIFI_PASS), Some("hunter22"));
        assert_eq!(set.get_str(KEY_BOT_TOKEN), Some("123456789:ABCdefGHIjklMNO"));
        assert_eq!(set.get_str(KEY_CHAT_ID), Some("-1001"));
        assert_eq!(set.get_int(KEY_LORA_REGION), Some(1));
        assert_eq!(set.get_int(KEY_LORA_PRESET), Some(4));
        // Page set-up, the namespace, then one append per field.
        assert_eq!(store.into_inner().writes(), 8);
    }

    #[test]
    fn persist_surfaces_flash_failure() {
        let record = ProvisioningRecord::from_payload(FULL).expect("valid");
        let mut flash = MemFlash::new(NVS_REGION);
        flash.fail_writes(true);
        let mut store = ConfigStore::new(flash, 0, NVS_REGION as u32).expect("region fits");
        assert_eq!(record.persist(&mut store), Err(StoreError::Write));
    }

    #[test]
    fn summary_masks_secrets() {
        let record = ProvisioningRecord::from_payload(FULL).expect("valid");
        let text = format!("{}", record.summary());
        assert!(!text.contains("hunter22"));
        assert!(text.contains("********"));
        assert!(text.contains("123456789:...lMNO"));
        assert!(!text.contains("ABCdefGHI"));
        assert!(text.contains("LoRa Region: 1 (US)"));
        assert!(text.contains("LoRa Preset: 4 (MEDIUM_FAST)"));
    }

    #[test]
    fn short_token_is_fully_masked() {
        assert_eq!(format!("{}", MaskedToken("short")), "********");
        assert_eq!(
            format!("{}", MaskedToken("0123456789abcdefXYZW")),
            "0123456789...XYZW"
        );
    }
}
