use crate::config::{CONFIG_NAMESPACE, PROVISION_PAYLOAD_MAX};
use crate::store::{ConfigStorage, ConfigStore, StoreError};
use crate::testing::MemFlash;

use super::{
    FieldError, FramingError, ProvisioningSession, SessionError, SessionPhase, SessionStep,
};

const MINIMAL: &[u8] = br#"{"wifi_ssid":"X","bot_token":"T","chat_id":"1"}"#;

const NVS_REGION: u32 = 3 * 4_096;

fn flash_store() -> ConfigStore<MemFlash> {
    ConfigStore::new(MemFlash::new(NVS_REGION as usize), 0, NVS_REGION).expect("region fits")
}

/// Store double that records saves and can be told to fail.
#[derive(Default)]
struct FlakyStore {
    fail: bool,
    saves: u32,
}

impl ConfigStorage for FlakyStore {
    fn save(
        &mut self,
        _namespace: &str,
        _strings: &[(&str, &str)],
        _ints: &[(&str, i32)],
    ) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Write);
        }
        self.saves += 1;
        Ok(())
    }
}

#[test]
fn minimal_submission_persists_defaults_and_restarts() {
    let mut store = flash_store();
    let mut session = ProvisioningSession::new();
    let step = session.submit_chunk(&mut store, 0, MINIMAL.len(), MINIMAL);
    assert_eq!(step, SessionStep::Restart);
    assert_eq!(session.phase(), SessionPhase::RestartPending);

    let set = store.load(CONFIG_NAMESPACE).expect("loads");
    assert_eq!(set.get_str("wifi_ssid"), Some("X"));
    assert_eq!(set.get_str("wifi_pass"), Some(""));
    assert_eq!(set.get_str("bot_token"), Some("T"));
    assert_eq!(set.get_str("chat_id"), Some("1"));
    assert_eq!(set.get_int("lora_region"), Some(3));
    assert_eq!(set.get_int("lora_preset"), Some(0));
    assert!(store.into_inner().writes() > 0);
}

#[test]
fn missing_bot_token_is_rejected_without_writes() {
    let payload = br#"{"wifi_ssid":"X","chat_id":"1"}"#;
    let mut store = flash_store();
    let mut session = ProvisioningSession::new();
    let step = session.submit_chunk(&mut store, 0, payload.len(), payload);
    assert_eq!(
        step,
        SessionStep::Rejected(SessionError::Field(FieldError::MissingRequiredField(
            "bot_token"
        )))
    );
    assert_eq!(session.phase(), SessionPhase::AwaitingInput);
    assert!(session.record().is_none());
    assert_eq!(store.into_inner().writes(), 0);
}

#[test]
fn rejected_submission_can_be_corrected() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    let bad = br#"{"wifi_ssid":"","bot_token":"T","chat_id":"1"}"#;
    assert!(matches!(
        session.submit_chunk(&mut store, 0, bad.len(), bad),
        SessionStep::Rejected(_)
    ));
    assert_eq!(
        session.submit_chunk(&mut store, 0, MINIMAL.len(), MINIMAL),
        SessionStep::Restart
    );
    assert_eq!(store.saves, 1);
}

#[test]
fn reassembles_body_delivered_in_pieces() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    let total = MINIMAL.len();
    let (head, rest) = MINIMAL.split_at(10);
    let (middle, tail) = rest.split_at(20);

    assert_eq!(
        session.submit_chunk(&mut store, 0, total, head),
        SessionStep::NeedMore
    );
    assert_eq!(
        session.submit_chunk(&mut store, 10, total, middle),
        SessionStep::NeedMore
    );
    assert_eq!(session.received(), 30);
    assert_eq!(
        session.submit_chunk(&mut store, 30, total, tail),
        SessionStep::Restart
    );
    assert_eq!(store.saves, 1);
    let record = session.record().expect("validated");
    assert_eq!(record.wifi_ssid.as_str(), "X");
}

#[test]
fn large_read_is_split_internally() {
    let mut body = std::string::String::from(r#"{"note":""#);
    body.push_str(&"n".repeat(600));
    body.push_str(r#"","wifi_ssid":"X","bot_token":"T","chat_id":"1","lora_preset":6}"#);
    let payload = body.as_bytes();

    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    assert_eq!(
        session.submit_chunk(&mut store, 0, payload.len(), payload),
        SessionStep::Restart
    );
    assert_eq!(session.record().map(|record| record.lora_preset), Some(6));
}

#[test]
fn out_of_sequence_chunk_discards_partial_payload() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    let total = MINIMAL.len();
    assert_eq!(
        session.submit_chunk(&mut store, 0, total, &MINIMAL[..10]),
        SessionStep::NeedMore
    );
    assert_eq!(
        session.submit_chunk(&mut store, 12, total, &MINIMAL[12..]),
        SessionStep::Rejected(SessionError::Framing(FramingError::UnexpectedOffset))
    );
    assert_eq!(session.phase(), SessionPhase::AwaitingInput);
    assert_eq!(session.received(), 0);

    assert_eq!(
        session.submit_chunk(&mut store, 0, total, MINIMAL),
        SessionStep::Restart
    );
}

#[test]
fn first_chunk_must_start_at_zero() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    assert_eq!(
        session.submit_chunk(&mut store, 5, MINIMAL.len(), &MINIMAL[5..]),
        SessionStep::Rejected(SessionError::Framing(FramingError::UnexpectedOffset))
    );
}

#[test]
fn changing_total_is_a_framing_error() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    let total = MINIMAL.len();
    assert_eq!(
        session.submit_chunk(&mut store, 0, total, &MINIMAL[..10]),
        SessionStep::NeedMore
    );
    assert_eq!(
        session.submit_chunk(&mut store, 10, total + 1, &MINIMAL[10..]),
        SessionStep::Rejected(SessionError::Framing(FramingError::TotalChanged))
    );
    assert_eq!(session.received(), 0);
}

#[test]
fn oversized_payload_is_refused_up_front() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    assert_eq!(
        session.submit_chunk(&mut store, 0, PROVISION_PAYLOAD_MAX + 1, b"{"),
        SessionStep::Rejected(SessionError::Framing(FramingError::TooLarge))
    );
}

#[test]
fn chunk_past_total_is_an_overrun() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    assert_eq!(
        session.submit_chunk(&mut store, 0, 4, MINIMAL),
        SessionStep::Rejected(SessionError::Framing(FramingError::Overrun))
    );
}

#[test]
fn empty_body_is_malformed() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    assert_eq!(
        session.submit_chunk(&mut store, 0, 0, &[]),
        SessionStep::Rejected(SessionError::Field(FieldError::MalformedPayload))
    );
    assert_eq!(store.saves, 0);
}

#[test]
fn persistence_failure_returns_to_awaiting_input() {
    let mut store = FlakyStore {
        fail: true,
        saves: 0,
    };
    let mut session = ProvisioningSession::new();
    assert_eq!(
        session.submit_chunk(&mut store, 0, MINIMAL.len(), MINIMAL),
        SessionStep::Rejected(SessionError::PersistenceFailed(StoreError::Write))
    );
    assert_eq!(session.phase(), SessionPhase::AwaitingInput);

    store.fail = false;
    assert_eq!(
        session.submit_chunk(&mut store, 0, MINIMAL.len(), MINIMAL),
        SessionStep::Restart
    );
    assert_eq!(store.saves, 1);
}

#[test]
fn restart_pending_ignores_further_input() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    assert_eq!(
        session.submit_chunk(&mut store, 0, MINIMAL.len(), MINIMAL),
        SessionStep::Restart
    );
    assert_eq!(
        session.submit_chunk(&mut store, 0, MINIMAL.len(), MINIMAL),
        SessionStep::Ignored
    );
    session.abandon_input();
    assert_eq!(session.phase(), SessionPhase::RestartPending);
    assert_eq!(store.saves, 1);
}

#[test]
fn abandoned_input_starts_over() {
    let mut store = FlakyStore::default();
    let mut session = ProvisioningSession::new();
    let total = MINIMAL.len();
    assert_eq!(
        session.submit_chunk(&mut store, 0, total, &MINIMAL[..10]),
        SessionStep::NeedMore
    );
    session.abandon_input();
    assert_eq!(session.received(), 0);
    assert_eq!(
        session.submit_chunk(&mut store, 0, total, MINIMAL),
        SessionStep::Restart
    );
}

#[test]
fn replies_match_portal_contract() {
    assert_eq!(SessionStep::Restart.reply().status, 200);
    assert_eq!(SessionStep::Restart.reply().body, "OK");

    let missing = SessionStep::Rejected(SessionError::Field(
        FieldError::MissingRequiredField("chat_id"),
    ));
    assert_eq!(missing.reply().status, 400);
    assert_eq!(missing.reply().body, "Missing required fields");

    let failed = SessionStep::Rejected(SessionError::PersistenceFailed(StoreError::Write));
    assert_eq!(failed.reply().status, 500);

    let too_large = SessionStep::Rejected(SessionError::Framing(FramingError::TooLarge));
    assert_eq!(too_large.reply().status, 413);
    assert_eq!(SessionStep::Ignored.reply().status, 503);
}
