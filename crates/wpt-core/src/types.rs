use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Buffer size reserved for an SSID, including the terminating byte.
pub const SSID_BUFFER_LEN: usize = 33;

/// Buffer size reserved for a textual BSSID (`AA:BB:CC:DD:EE:FF`), including
/// the terminating byte.
pub const BSSID_BUFFER_LEN: usize = 18;

/// Upper bound on the attack artifact carried by a [`Status`]; the binary
/// status header stores the size as a `u16`.
pub const MAX_STATUS_CONTENT: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// MacAddr
// ---------------------------------------------------------------------------

/// A 6-byte hardware address.
///
/// Displays as colon-separated uppercase hex and parses from either `:` or
/// `-` separated hex octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address: {0:?}")]
pub struct InvalidMacAddr(pub String);

impl FromStr for MacAddr {
    type Err = InvalidMacAddr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidMacAddr(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddr(octets))
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

impl TryFrom<String> for MacAddr {
    type Error = InvalidMacAddr;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// AttackType / AttackMethod
// ---------------------------------------------------------------------------

/// Which attack the engine should run. Codes the engine does not know are
/// carried through untouched; rejecting them is the engine's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum AttackType {
    Passive,
    Handshake,
    Pmkid,
    Dos,
    Unknown(u8),
}

impl AttackType {
    pub fn code(self) -> u8 {
        match self {
            AttackType::Passive => 0,
            AttackType::Handshake => 1,
            AttackType::Pmkid => 2,
            AttackType::Dos => 3,
            AttackType::Unknown(code) => code,
        }
    }
}

impl From<u8> for AttackType {
    fn from(code: u8) -> Self {
        match code {
            0 => AttackType::Passive,
            1 => AttackType::Handshake,
            2 => AttackType::Pmkid,
            3 => AttackType::Dos,
            other => AttackType::Unknown(other),
        }
    }
}

impl From<AttackType> for u8 {
    fn from(t: AttackType) -> Self {
        t.code()
    }
}

/// Technique selector within an attack type, interpreted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttackMethod(pub u8);

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A validated attack request, immutable once built.
///
/// Serializes back to the same object shape accepted on `/run-attack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ap_record_id: Option<u32>,
    pub ssid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bssid: Option<MacAddr>,
    pub attack_type: AttackType,
    pub attack_method: AttackMethod,
    #[serde(rename = "timeout")]
    pub timeout_seconds: u16,
}

// ---------------------------------------------------------------------------
// AttackState / Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackState {
    Ready = 0,
    Running = 1,
    Finished = 2,
    Timeout = 3,
}

impl AttackState {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// `true` once the attack has ended, successfully or not.
    pub fn is_complete(self) -> bool {
        matches!(self, AttackState::Finished | AttackState::Timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status content is {size} bytes, limit is {MAX_STATUS_CONTENT}")]
pub struct ContentTooLarge {
    pub size: usize,
}

/// Attack status as published by the engine.
///
/// `content_size` always equals `content.len()`; the constructor enforces
/// [`MAX_STATUS_CONTENT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    state: AttackState,
    attack_type: AttackType,
    content_size: u16,
    content: Vec<u8>,
}

impl Status {
    pub fn new(
        state: AttackState,
        attack_type: AttackType,
        content: Vec<u8>,
    ) -> Result<Self, ContentTooLarge> {
        let content_size = u16::try_from(content.len()).map_err(|_| ContentTooLarge {
            size: content.len(),
        })?;
        Ok(Self {
            state,
            attack_type,
            content_size,
            content,
        })
    }

    pub fn ready() -> Self {
        Self {
            state: AttackState::Ready,
            attack_type: AttackType::Passive,
            content_size: 0,
            content: Vec::new(),
        }
    }

    pub fn running(attack_type: AttackType) -> Self {
        Self {
            state: AttackState::Running,
            attack_type,
            content_size: 0,
            content: Vec::new(),
        }
    }

    /// An attack that ran out of time without producing an artifact.
    pub fn timed_out(attack_type: AttackType) -> Self {
        Self {
            state: AttackState::Timeout,
            attack_type,
            content_size: 0,
            content: Vec::new(),
        }
    }

    pub fn state(&self) -> AttackState {
        self.state
    }

    pub fn attack_type(&self) -> AttackType {
        self.attack_type
    }

    pub fn content_size(&self) -> u16 {
        self.content_size
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

// ---------------------------------------------------------------------------
// AuthMode
// ---------------------------------------------------------------------------

/// Authentication mode advertised by an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Wpa3Psk,
    Wpa2Wpa3Psk,
    WapiPsk,
    Owe,
    Unknown(u8),
}

/// Name reported for auth modes outside the known table.
pub const UNKNOWN_AUTH_MODE: &str = "UNKNOWN";

const AUTH_MODE_TABLE: [(AuthMode, &str); 10] = [
    (AuthMode::Open, "WIFI_AUTH_OPEN"),
    (AuthMode::Wep, "WIFI_AUTH_WEP"),
    (AuthMode::WpaPsk, "WIFI_AUTH_WPA_PSK"),
    (AuthMode::Wpa2Psk, "WIFI_AUTH_WPA2_PSK"),
    (AuthMode::WpaWpa2Psk, "WIFI_AUTH_WPA_WPA2_PSK"),
    (AuthMode::Wpa2Enterprise, "WIFI_AUTH_WPA2_ENTERPRISE"),
    (AuthMode::Wpa3Psk, "WIFI_AUTH_WPA3_PSK"),
    (AuthMode::Wpa2Wpa3Psk, "WIFI_AUTH_WPA2_WPA3_PSK"),
    (AuthMode::WapiPsk, "WIFI_AUTH_WAPI_PSK"),
    (AuthMode::Owe, "WIFI_AUTH_OWE"),
];

impl AuthMode {
    pub fn from_code(code: u8) -> Self {
        AUTH_MODE_TABLE
            .get(code as usize)
            .map(|(mode, _)| *mode)
            .unwrap_or(AuthMode::Unknown(code))
    }

    pub fn code(self) -> u8 {
        match self {
            AuthMode::Unknown(code) => code,
            known => AUTH_MODE_TABLE
                .iter()
                .position(|(mode, _)| *mode == known)
                .map(|idx| idx as u8)
                .unwrap_or(u8::MAX),
        }
    }

    /// Symbolic name; total over every value, unknown codes map to
    /// [`UNKNOWN_AUTH_MODE`].
    pub fn name(self) -> &'static str {
        AUTH_MODE_TABLE
            .iter()
            .find(|(mode, _)| *mode == self)
            .map(|(_, name)| *name)
            .unwrap_or(UNKNOWN_AUTH_MODE)
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown auth mode: {0:?}")]
pub struct InvalidAuthMode(pub String);

impl FromStr for AuthMode {
    type Err = InvalidAuthMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AUTH_MODE_TABLE
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(mode, _)| *mode)
            .ok_or_else(|| InvalidAuthMode(s.to_string()))
    }
}

impl From<AuthMode> for String {
    fn from(mode: AuthMode) -> Self {
        mode.name().to_string()
    }
}

impl TryFrom<String> for AuthMode {
    type Error = InvalidAuthMode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// ApRecord
// ---------------------------------------------------------------------------

/// One access point found by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApRecord {
    #[serde(default)]
    pub ssid: String,
    pub bssid: MacAddr,
    pub rssi: i32,
    pub auth_mode: AuthMode,
}

impl ApRecord {
    /// Hidden networks broadcast an empty SSID.
    pub fn is_hidden(&self) -> bool {
        self.ssid.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
