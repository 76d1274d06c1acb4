use async_trait::async_trait;

/// Source of the capture artifacts served on `/capture.pcap` and
/// `/capture.hccapx`. The bridge passes the bytes through untouched.
#[async_trait]
pub trait CaptureSource: Send + Sync + 'static {
    async fn pcap(&self) -> Vec<u8>;
    async fn hccapx(&self) -> Vec<u8>;
}

/// Serves empty captures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCaptures;

#[async_trait]
impl CaptureSource for NoCaptures {
    async fn pcap(&self) -> Vec<u8> {
        Vec::new()
    }

    async fn hccapx(&self) -> Vec<u8> {
        Vec::new()
    }
}
