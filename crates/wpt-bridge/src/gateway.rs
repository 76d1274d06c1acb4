//! Command Gateway: validates control requests and publishes them on the
//! event bus without waiting for the engine.
//!
//! `/run-attack` bodies and `"detected"` radio envelopes share
//! [`command_from_value`], so both paths apply identical rules.

use serde_json::{Map, Value};
use wpt_core::types::{
    AttackMethod, AttackType, Command, MacAddr, BSSID_BUFFER_LEN, SSID_BUFFER_LEN,
};

use crate::event_bus::{BusError, BusEvent, EventBus};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The body is not well-formed JSON.
    #[error("malformed body: {0}")]
    Parse(String),

    /// A required field is missing or a field has the wrong type.
    #[error("schema violation: {0}")]
    Schema(String),

    /// The body exceeds the buffer reserved for it.
    #[error("body exceeds the {limit} byte buffer")]
    Allocation { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("publish failed: {0}")]
    Publish(#[from] BusError),
}

/// Acknowledges that an event was queued. Says nothing about whether the
/// engine has acted on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub delivered: usize,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Parse a raw request body into a [`Command`].
pub fn parse_command(body: &[u8]) -> Result<Command, CommandError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| CommandError::Parse(e.to_string()))?;
    command_from_value(&value)
}

/// Build a [`Command`] from an already-parsed JSON value.
///
/// Required: `ssid` (string), `attack_type`, `attack_method`, `timeout`
/// (integers). Optional: `ap_record_id` (integer), `bssid` (MAC string).
/// Oversized `ssid`/`bssid` strings are truncated to their buffer size
/// minus one byte rather than rejected. Integers are not narrowed: a value
/// outside its field's width (`u8` for the attack codes, `u16` for
/// `timeout`, `u32` for `ap_record_id`) or below zero is a schema error.
pub fn command_from_value(value: &Value) -> Result<Command, CommandError> {
    let obj = value
        .as_object()
        .ok_or_else(|| CommandError::Schema("expected a JSON object".into()))?;

    let ssid = match obj.get("ssid") {
        Some(Value::String(s)) => truncate_to_buffer(s, SSID_BUFFER_LEN),
        Some(_) => return Err(CommandError::Schema("`ssid` must be a string".into())),
        None => return Err(CommandError::Schema("missing `ssid`".into())),
    };

    let attack_type: u8 = required_int(obj, "attack_type")?;
    let attack_method: u8 = required_int(obj, "attack_method")?;
    let timeout_seconds: u16 = required_int(obj, "timeout")?;
    let ap_record_id: Option<u32> = optional_int(obj, "ap_record_id")?;

    let bssid = match obj.get("bssid") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let text = truncate_to_buffer(s, BSSID_BUFFER_LEN);
            let mac = text
                .parse::<MacAddr>()
                .map_err(|e| CommandError::Schema(format!("`bssid`: {e}")))?;
            Some(mac)
        }
        Some(_) => return Err(CommandError::Schema("`bssid` must be a string".into())),
    };

    Ok(Command {
        ap_record_id,
        ssid,
        bssid,
        attack_type: AttackType::from(attack_type),
        attack_method: AttackMethod(attack_method),
        timeout_seconds,
    })
}

/// Keep at most `buffer_len - 1` bytes, cutting on a char boundary.
fn truncate_to_buffer(s: &str, buffer_len: usize) -> String {
    let limit = buffer_len.saturating_sub(1);
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    tracing::debug!(original_len = s.len(), kept = end, "truncating oversized field");
    s[..end].to_string()
}

/// JSON numbers with no fractional part, as a non-negative integer.
fn as_whole_number(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
}

fn required_int<T: TryFrom<u64>>(obj: &Map<String, Value>, key: &str) -> Result<T, CommandError> {
    match optional_int(obj, key)? {
        Some(v) => Ok(v),
        None => Err(CommandError::Schema(format!("missing `{key}`"))),
    }
}

fn optional_int<T: TryFrom<u64>>(
    obj: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>, CommandError> {
    let value = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let n = as_whole_number(value)
        .ok_or_else(|| CommandError::Schema(format!("`{key}` must be a non-negative integer")))?;
    T::try_from(n)
        .map(Some)
        .map_err(|_| CommandError::Schema(format!("`{key}` is out of range")))
}

// ---------------------------------------------------------------------------
// CommandGateway
// ---------------------------------------------------------------------------

/// Entry point for every attack control request, local or remote.
#[derive(Clone)]
pub struct CommandGateway {
    bus: EventBus,
    max_body_bytes: usize,
}

impl CommandGateway {
    pub fn new(bus: EventBus, max_body_bytes: usize) -> Self {
        Self {
            bus,
            max_body_bytes,
        }
    }

    /// Largest body [`CommandGateway::submit_command`] accepts.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Validate `body` and publish exactly one ATTACK_REQUEST. Nothing is
    /// published when validation fails.
    pub async fn submit_command(&self, body: &[u8]) -> Result<Ack, GatewayError> {
        if body.len() > self.max_body_bytes {
            tracing::debug!(size = body.len(), limit = self.max_body_bytes, "body too large");
            return Err(CommandError::Allocation {
                limit: self.max_body_bytes,
            }
            .into());
        }
        let command = parse_command(body)?;
        self.submit(command).await
    }

    /// Publish an already-validated command.
    pub async fn submit(&self, command: Command) -> Result<Ack, GatewayError> {
        tracing::info!(
            ssid = %command.ssid,
            attack_type = command.attack_type.code(),
            attack_method = command.attack_method.0,
            timeout = command.timeout_seconds,
            "attack request accepted"
        );
        let delivered = self.bus.publish(BusEvent::AttackRequest(command)).await?;
        Ok(Ack { delivered })
    }

    /// Publish an ATTACK_RESET. Carries no payload and needs no validation.
    pub async fn reset(&self) -> Result<Ack, GatewayError> {
        tracing::info!("attack reset requested");
        let delivered = self.bus.publish(BusEvent::AttackReset).await?;
        Ok(Ack { delivered })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
