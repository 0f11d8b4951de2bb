//! Provisioning session: reassembles a submitted form body, validates it
//! into a [`ProvisioningRecord`] and persists it in one store write.

mod actions;
mod engine;
mod events;
pub mod fields;
pub mod lora;
mod machine;
mod record;
pub mod request;
#[cfg(test)]
mod tests;
mod types;

pub use actions::{FramingError, SessionError, SessionReply, SessionStep};
pub use engine::ProvisioningSession;
pub use events::PayloadChunk;
pub use fields::{FieldError, FieldMap, JsonFields, RawValue};
pub use record::{
    ProvisioningRecord, RecordSummary, KEY_BOT_TOKEN, KEY_CHAT_ID, KEY_LORA_PRESET,
    KEY_LORA_REGION, KEY_WIFI_PASS, KEY_WIFI_PASSWORD, KEY_WIFI_SSID,
};
pub use request::{head_len, RequestError, RequestHead, Route};
pub use types::SessionPhase;
