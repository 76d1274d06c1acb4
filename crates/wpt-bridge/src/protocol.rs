//! Secondary-radio wire format.
//!
//! Every frame in either direction is a UTF-8 JSON array whose first
//! element is a string tag.
//!
//! Outbound (relay):
//! - `["endpoint", "/ap-list"]`
//! - `["count", K]`
//! - `["ap", ssid, "AA:BB:CC:DD:EE:FF", rssi, auth_code]`
//! - `["done", K]`
//!
//! Inbound (remote triggers):
//! - `["detected", {command object}]`
//! - `["ap-list"]`

use serde_json::{json, Value};
use wpt_core::types::{ApRecord, Command};

use crate::gateway::{command_from_value, CommandError};
use crate::transport::{RelayFrame, TransportError};

pub const TAG_ENDPOINT: &str = "endpoint";
pub const TAG_COUNT: &str = "count";
pub const TAG_AP: &str = "ap";
pub const TAG_DONE: &str = "done";
pub const TAG_DETECTED: &str = "detected";
pub const TAG_AP_LIST: &str = "ap-list";

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum RelayMessage<'a> {
    Endpoint(&'a str),
    Count(usize),
    Record(&'a ApRecord),
    Done(usize),
}

impl RelayMessage<'_> {
    /// Encode into a frame of at most `mtu` bytes.
    ///
    /// A record whose frame would overflow has its SSID shortened, one char
    /// at a time from the end, until it fits.
    pub fn encode(&self, mtu: usize) -> Result<RelayFrame, TransportError> {
        match self {
            RelayMessage::Endpoint(endpoint) => frame(json!([TAG_ENDPOINT, endpoint]), mtu),
            RelayMessage::Count(n) => frame(json!([TAG_COUNT, n]), mtu),
            RelayMessage::Done(n) => frame(json!([TAG_DONE, n]), mtu),
            RelayMessage::Record(record) => encode_record(record, mtu),
        }
    }
}

fn frame(value: Value, mtu: usize) -> Result<RelayFrame, TransportError> {
    RelayFrame::new(value.to_string().into_bytes(), mtu)
}

fn record_value(record: &ApRecord, ssid: &str) -> Value {
    json!([
        TAG_AP,
        ssid,
        record.bssid.to_string(),
        record.rssi,
        record.auth_mode.code()
    ])
}

fn encode_record(record: &ApRecord, mtu: usize) -> Result<RelayFrame, TransportError> {
    let mut ssid = record.ssid.as_str();
    loop {
        let bytes = record_value(record, ssid).to_string().into_bytes();
        if bytes.len() <= mtu {
            return RelayFrame::new(bytes, mtu);
        }
        match ssid.char_indices().next_back() {
            Some((idx, _)) => ssid = &ssid[..idx],
            None => {
                return Err(TransportError::FrameTooLarge {
                    size: bytes.len(),
                    mtu,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A command envelope received over the secondary radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEnvelope {
    /// A remote node detected a condition and asks for this attack.
    Detected(Command),
    /// A remote node asks for a fresh access point list.
    ApListRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("frame is not valid UTF-8")]
    NotUtf8,

    #[error("frame is not JSON: {0}")]
    Json(String),

    #[error("envelope must be a JSON array starting with a string tag")]
    MissingTag,

    #[error("unknown envelope tag {0:?}")]
    UnknownTag(String),

    #[error("{tag:?} envelope takes {expected} elements, got {found}")]
    Arity {
        tag: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("detected command rejected: {0}")]
    Command(#[from] CommandError),
}

impl RemoteEnvelope {
    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        let text = std::str::from_utf8(payload).map_err(|_| EnvelopeError::NotUtf8)?;
        let value: Value =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Json(e.to_string()))?;
        let items = value.as_array().ok_or(EnvelopeError::MissingTag)?;
        let tag = items
            .first()
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingTag)?;

        match tag {
            TAG_DETECTED => {
                expect_arity(TAG_DETECTED, items, 2)?;
                Ok(RemoteEnvelope::Detected(command_from_value(&items[1])?))
            }
            TAG_AP_LIST => {
                expect_arity(TAG_AP_LIST, items, 1)?;
                Ok(RemoteEnvelope::ApListRequest)
            }
            other => Err(EnvelopeError::UnknownTag(other.to_string())),
        }
    }

    /// Wire form of this envelope, as a remote node would send it.
    pub fn to_payload(&self) -> Vec<u8> {
        let value = match self {
            RemoteEnvelope::Detected(command) => json!([TAG_DETECTED, command]),
            RemoteEnvelope::ApListRequest => json!([TAG_AP_LIST]),
        };
        value.to_string().into_bytes()
    }
}

fn expect_arity(tag: &'static str, items: &[Value], expected: usize) -> Result<(), EnvelopeError> {
    if items.len() == expected {
        Ok(())
    } else {
        Err(EnvelopeError::Arity {
            tag,
            expected,
            found: items.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wpt_core::types::{AttackMethod, AttackType, AuthMode, MacAddr};

    fn record(ssid: &str) -> ApRecord {
        ApRecord {
            ssid: ssid.into(),
            bssid: MacAddr([0xEC, 0xF0, 0xFE, 0x97, 0x4E, 0x88]),
            rssi: -40,
            auth_mode: AuthMode::Wpa2Psk,
        }
    }

    fn text(frame: &RelayFrame) -> &str {
        std::str::from_utf8(frame.payload()).unwrap()
    }

    #[test]
    fn control_frames() {
        assert_eq!(
            text(&RelayMessage::Endpoint("/ap-list").encode(255).unwrap()),
            r#"["endpoint","/ap-list"]"#
        );
        assert_eq!(text(&RelayMessage::Count(3).encode(255).unwrap()), r#"["count",3]"#);
        assert_eq!(text(&RelayMessage::Done(3).encode(255).unwrap()), r#"["done",3]"#);
    }

    #[test]
    fn record_frame_is_compact() {
        let rec = record("Net");
        assert_eq!(
            text(&RelayMessage::Record(&rec).encode(255).unwrap()),
            r#"["ap","Net","EC:F0:FE:97:4E:88",-40,3]"#
        );
    }

    #[test]
    fn long_ssid_is_shortened_to_fit() {
        let rec = record(&"é".repeat(32));
        let frame = RelayMessage::Record(&rec).encode(64).unwrap();
        assert!(frame.len() <= 64);
        let value: Value = serde_json::from_slice(frame.payload()).unwrap();
        let ssid = value[1].as_str().unwrap();
        assert!(!ssid.is_empty());
        assert!(rec.ssid.starts_with(ssid));
    }

    #[test]
    fn impossible_mtu_is_reported() {
        let rec = record("Net");
        assert!(matches!(
            RelayMessage::Record(&rec).encode(8),
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn decodes_ap_list_request() {
        assert_eq!(
            RemoteEnvelope::decode(br#"["ap-list"]"#),
            Ok(RemoteEnvelope::ApListRequest)
        );
    }

    #[test]
    fn decodes_detected_command() {
        let env = RemoteEnvelope::decode(
            br#"["detected",{"ssid":"Net","attack_type":1,"attack_method":2,"timeout":30}]"#,
        )
        .unwrap();
        assert_eq!(
            env,
            RemoteEnvelope::Detected(Command {
                ap_record_id: None,
                ssid: "Net".into(),
                bssid: None,
                attack_type: AttackType::Handshake,
                attack_method: AttackMethod(2),
                timeout_seconds: 30,
            })
        );
    }

    #[test]
    fn rejects_malformed_envelopes() {
        let cases: [(&[u8], fn(&EnvelopeError) -> bool); 8] = [
            (b"\xff\xfe", |e| matches!(e, EnvelopeError::NotUtf8)),
            (b"not json", |e| matches!(e, EnvelopeError::Json(_))),
            (br#"{"tag":"ap-list"}"#, |e| matches!(e, EnvelopeError::MissingTag)),
            (b"[]", |e| matches!(e, EnvelopeError::MissingTag)),
            (br#"[1]"#, |e| matches!(e, EnvelopeError::MissingTag)),
            (br#"["reboot"]"#, |e| matches!(e, EnvelopeError::UnknownTag(_))),
            (br#"["ap-list",1]"#, |e| matches!(e, EnvelopeError::Arity { .. })),
            (br#"["detected",{"ssid":"Net"}]"#, |e| {
                matches!(e, EnvelopeError::Command(CommandError::Schema(_)))
            }),
        ];
        for (payload, check) in cases {
            let err = RemoteEnvelope::decode(payload).unwrap_err();
            assert!(check(&err), "{:?} gave {err:?}", String::from_utf8_lossy(payload));
        }
    }

    #[test]
    fn detected_without_command_is_arity_error() {
        assert_eq!(
            RemoteEnvelope::decode(br#"["detected"]"#),
            Err(EnvelopeError::Arity {
                tag: TAG_DETECTED,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn payload_decodes_back() {
        let cmd = Command {
            ap_record_id: Some(2),
            ssid: "Lab".into(),
            bssid: Some(MacAddr([1, 2, 3, 4, 5, 6])),
            attack_type: AttackType::Pmkid,
            attack_method: AttackMethod(0),
            timeout_seconds: 60,
        };
        let env = RemoteEnvelope::Detected(cmd);
        assert_eq!(RemoteEnvelope::decode(&env.to_payload()), Ok(env));
    }
}
