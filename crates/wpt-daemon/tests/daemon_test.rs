//! Whole-process tests: the daemon wired with an in-process radio and a
//! fixture scanner, driven over HTTP and over the remote side of the radio.

use std::sync::Arc;
use std::time::Duration;

use wpt_bridge::capture::NoCaptures;
use wpt_bridge::transport::{InProcessRadio, RelayFrame, SecondaryRadio};
use wpt_core::config::{Config, StatusFormat};
use wpt_core::types::{ApRecord, AuthMode, MacAddr};
use wpt_daemon::daemon::Daemon;
use wpt_daemon::fixtures::FixtureScanner;

fn quick_config() -> Config {
    let mut config = Config::default();
    config.http.status_format = StatusFormat::Json;
    config.relay.pacing_ms = 1;
    config.listener.detected_settle_secs = 0;
    config.listener.ap_list_settle_secs = 0;
    config.listener.idle_ms = 5;
    config
}

fn fixture_records() -> Vec<ApRecord> {
    vec![ApRecord {
        ssid: "Bench".into(),
        bssid: MacAddr([0x02, 0x00, 0x5E, 0x10, 0x00, 0x01]),
        rssi: -47,
        auth_mode: AuthMode::Wpa3Psk,
    }]
}

fn daemon(config: Config) -> (Daemon, InProcessRadio) {
    let (ours, remote) = InProcessRadio::pair();
    let daemon = Daemon::with_collaborators(
        config,
        Arc::new(ours),
        Arc::new(FixtureScanner::new(fixture_records(), Duration::ZERO)),
        Arc::new(NoCaptures),
    );
    (daemon, remote)
}

async fn status_state(base: &str) -> u64 {
    let body: serde_json::Value = reqwest::get(format!("{base}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["state"].as_u64().unwrap()
}

async fn wait_for_state(base: &str, expected: u64) {
    for _ in 0..200 {
        if status_state(base).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("status never reached state {expected}");
}

#[tokio::test]
async fn http_request_drives_engine_and_reset_returns_to_ready() {
    let (daemon, _remote) = daemon(quick_config());
    let addr = daemon.start_embedded().await.unwrap();
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    wait_for_state(&base, 0).await;

    let ack = client
        .post(format!("{base}/run-attack"))
        .body(r#"{"ssid":"Bench","attack_type":2,"attack_method":0,"timeout":60}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(ack.status(), reqwest::StatusCode::OK);
    wait_for_state(&base, 1).await;

    client
        .head(format!("{base}/reset"))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
    wait_for_state(&base, 0).await;

    daemon.shutdown();
}

#[tokio::test]
async fn short_timeout_ends_in_timeout_state() {
    let (daemon, _remote) = daemon(quick_config());
    let addr = daemon.start_embedded().await.unwrap();
    let base = format!("http://{addr}");

    reqwest::Client::new()
        .post(format!("{base}/run-attack"))
        .body(r#"{"ssid":"Bench","attack_type":0,"attack_method":0,"timeout":0}"#)
        .send()
        .await
        .unwrap();
    wait_for_state(&base, 3).await;

    daemon.shutdown();
}

#[tokio::test]
async fn remote_detection_starts_an_attack() {
    let (daemon, remote) = daemon(quick_config());
    let addr = daemon.start_embedded().await.unwrap();
    let base = format!("http://{addr}");

    let envelope = br#"["detected",{"ssid":"Bench","attack_type":1,"attack_method":0,"timeout":60}]"#;
    remote
        .send(&RelayFrame::new(envelope.to_vec(), 255).unwrap())
        .await
        .unwrap();
    wait_for_state(&base, 1).await;

    daemon.shutdown();
}

#[tokio::test]
async fn remote_ap_list_is_relayed_back() {
    let (daemon, remote) = daemon(quick_config());
    daemon.start_embedded().await.unwrap();

    remote
        .send(&RelayFrame::new(br#"["ap-list"]"#.to_vec(), 255).unwrap())
        .await
        .unwrap();

    let mut frames = Vec::new();
    for _ in 0..4 {
        let frame = tokio::time::timeout(Duration::from_secs(2), remote.next_frame())
            .await
            .unwrap()
            .unwrap();
        frames.push(String::from_utf8(frame.payload().to_vec()).unwrap());
    }
    assert_eq!(
        frames,
        vec![
            r#"["endpoint","/ap-list"]"#,
            r#"["count",1]"#,
            r#"["ap","Bench","02:00:5E:10:00:01",-47,6]"#,
            r#"["done",1]"#,
        ]
    );

    daemon.shutdown();
}

#[tokio::test]
async fn run_returns_after_shutdown() {
    let (daemon, _remote) = daemon(quick_config());
    let shutdown = daemon.shutdown_handle();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move { daemon.run_with_listener(listener).await });
    wait_for_state(&format!("http://{addr}"), 0).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
