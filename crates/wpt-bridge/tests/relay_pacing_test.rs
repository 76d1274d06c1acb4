//! Secondary-radio relay framing and airtime pacing, checked against a
//! recording radio on a paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use wpt_bridge::protocol::TAG_AP;
use wpt_bridge::scan::{ApScanner, RelaySettings, ScanError, ScanRelayPipeline};
use wpt_bridge::transport::{RadioKind, RelayFrame, SecondaryRadio, TransportError};
use wpt_core::types::{ApRecord, AuthMode, MacAddr};

/// Records every frame with the instant it was sent. Fails the sends whose
/// index is listed in `fail_at`.
#[derive(Default)]
struct RecordingRadio {
    sent: Mutex<Vec<(Instant, Vec<u8>)>>,
    fail_at: Vec<usize>,
    attempts: Mutex<usize>,
}

impl RecordingRadio {
    fn frames(&self) -> Vec<(Instant, serde_json::Value)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(at, bytes)| (*at, serde_json::from_slice(bytes).unwrap()))
            .collect()
    }
}

#[async_trait]
impl SecondaryRadio for RecordingRadio {
    fn kind(&self) -> RadioKind {
        RadioKind::InProcess
    }

    async fn send(&self, frame: &RelayFrame) -> Result<(), TransportError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts - 1
        };
        if self.fail_at.contains(&attempt) {
            return Err(TransportError::SendFailed("no airtime".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((Instant::now(), frame.payload().to_vec()));
        Ok(())
    }

    async fn start_receive(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn poll_frame(&self) -> Result<Option<RelayFrame>, TransportError> {
        Ok(None)
    }
}

struct NoScan;

#[async_trait]
impl ApScanner for NoScan {
    async fn scan(&self) -> Result<Vec<ApRecord>, ScanError> {
        Ok(Vec::new())
    }
}

fn records(n: u8) -> Vec<ApRecord> {
    (0..n)
        .map(|i| ApRecord {
            ssid: format!("net-{i}"),
            bssid: MacAddr([0x02, 0, 0, 0, 0, i]),
            rssi: -30 - i32::from(i),
            auth_mode: AuthMode::from_code(i % 10),
        })
        .collect()
}

fn pipeline(radio: Arc<RecordingRadio>, settings: RelaySettings) -> ScanRelayPipeline {
    ScanRelayPipeline::new(Arc::new(NoScan), radio, settings)
}

#[tokio::test(start_paused = true)]
async fn k_records_produce_k_plus_three_frames() {
    for k in [0u8, 1, 7] {
        let radio = Arc::new(RecordingRadio::default());
        let report = pipeline(radio.clone(), RelaySettings::default())
            .relay_over_secondary_channel(&records(k))
            .await;

        let frames = radio.frames();
        assert_eq!(frames.len(), usize::from(k) + 3);
        assert_eq!(report.frames_sent, usize::from(k) + 3);
        assert_eq!(report.records_relayed, usize::from(k));

        let record_frames = frames.iter().filter(|(_, v)| v[0] == TAG_AP).count();
        assert_eq!(record_frames, usize::from(k));
        assert_eq!(frames[0].1, serde_json::json!(["endpoint", "/ap-list"]));
        assert_eq!(frames[1].1, serde_json::json!(["count", k]));
        assert_eq!(frames.last().unwrap().1, serde_json::json!(["done", k]));
    }
}

#[tokio::test(start_paused = true)]
async fn consecutive_frames_respect_pacing() {
    let radio = Arc::new(RecordingRadio::default());
    let settings = RelaySettings {
        pacing: Duration::from_millis(100),
        ..RelaySettings::default()
    };
    pipeline(radio.clone(), settings)
        .relay_over_secondary_channel(&records(4))
        .await;

    let frames = radio.frames();
    for pair in frames.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= Duration::from_millis(100));
    }
}

#[tokio::test(start_paused = true)]
async fn record_frames_keep_scan_order() {
    let radio = Arc::new(RecordingRadio::default());
    let input = records(3);
    pipeline(radio.clone(), RelaySettings::default())
        .relay_over_secondary_channel(&input)
        .await;

    let ssids: Vec<String> = radio
        .frames()
        .iter()
        .filter(|(_, v)| v[0] == TAG_AP)
        .map(|(_, v)| v[1].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ssids, vec!["net-0", "net-1", "net-2"]);
}

#[tokio::test(start_paused = true)]
async fn failed_frame_is_skipped_and_relay_continues() {
    // Attempt 3 is the second record frame.
    let radio = Arc::new(RecordingRadio {
        fail_at: vec![3],
        ..RecordingRadio::default()
    });
    let report = pipeline(radio.clone(), RelaySettings::default())
        .relay_over_secondary_channel(&records(3))
        .await;

    assert_eq!(report.frames_failed, 1);
    assert_eq!(report.frames_sent, 5);
    assert_eq!(report.records_relayed, 2);
    assert_eq!(
        radio.frames().last().unwrap().1,
        serde_json::json!(["done", 3])
    );
}

#[tokio::test(start_paused = true)]
async fn long_ssids_are_shortened_to_the_mtu() {
    let radio = Arc::new(RecordingRadio::default());
    let settings = RelaySettings {
        frame_mtu: 64,
        ..RelaySettings::default()
    };
    let mut input = records(1);
    input[0].ssid = "x".repeat(32);
    let report = pipeline(radio.clone(), settings)
        .relay_over_secondary_channel(&input)
        .await;

    assert_eq!(report.records_relayed, 1);
    for (_, value) in radio.frames() {
        assert!(value.to_string().len() <= 64);
    }
}

#[tokio::test(start_paused = true)]
async fn overlapping_relays_share_airtime_without_interleaving() {
    let radio = Arc::new(RecordingRadio::default());
    let pacing = Duration::from_millis(100);
    let http_side = pipeline(
        radio.clone(),
        RelaySettings {
            pacing,
            ..RelaySettings::default()
        },
    );
    let remote_side = http_side.clone();

    let mut remote_records = records(2);
    for record in &mut remote_records {
        record.ssid = format!("remote-{}", record.ssid);
    }
    let local_records = records(3);
    let (first, second) = tokio::join!(
        http_side.relay_over_secondary_channel(&local_records),
        remote_side.relay_over_secondary_channel(&remote_records),
    );
    assert_eq!(first.frames_sent + second.frames_sent, 6 + 5);

    let frames = radio.frames();
    assert_eq!(frames.len(), 11);
    for pair in frames.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= pacing);
    }

    // Each run is one contiguous endpoint..done block.
    let tags: Vec<&str> = frames.iter().map(|(_, v)| v[0].as_str().unwrap()).collect();
    let split = tags.iter().position(|t| *t == "done").unwrap() + 1;
    for block in [&frames[..split], &frames[split..]] {
        assert_eq!(block.first().unwrap().1[0], "endpoint");
        assert_eq!(block.last().unwrap().1[0], "done");
        let count = block[1].1[1].as_u64().unwrap() as usize;
        assert_eq!(block.len(), count + 3);
        let remote = block
            .iter()
            .filter(|(_, v)| v[0] == TAG_AP)
            .map(|(_, v)| v[1].as_str().unwrap().starts_with("remote-"))
            .collect::<Vec<_>>();
        assert!(remote.iter().all(|r| *r) || remote.iter().all(|r| !*r));
    }
}

#[tokio::test(start_paused = true)]
async fn back_to_back_relays_keep_pacing_across_runs() {
    let radio = Arc::new(RecordingRadio::default());
    let pacing = Duration::from_millis(100);
    let relay = pipeline(
        radio.clone(),
        RelaySettings {
            pacing,
            ..RelaySettings::default()
        },
    );
    relay.relay_over_secondary_channel(&records(1)).await;
    relay.relay_over_secondary_channel(&records(1)).await;

    let frames = radio.frames();
    assert_eq!(frames.len(), 8);
    assert!(frames[4].0 - frames[3].0 >= pacing);
}
