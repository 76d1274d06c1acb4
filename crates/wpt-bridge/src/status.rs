//! Attack status board and its read-only projections.
//!
//! The engine holds the only [`StatusWriter`]; everyone else gets a
//! [`StatusReader`] and sees whole snapshots, never a half-written status.

use serde_json::{json, Value};
use tokio::sync::watch;
use wpt_core::config::StatusFormat;
use wpt_core::types::Status;

pub const MESSAGE_COMPLETE: &str = "Attack Finished or Timeout";
pub const MESSAGE_IN_PROGRESS: &str = "Attack In Progress or Other State";

/// Size of the binary status header: state, attack type, content size (LE).
pub const STATUS_HEADER_LEN: usize = 4;

/// No status has been published yet (the engine is not initialised).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("attack engine has not published a status yet")]
pub struct StatusUnavailable;

/// Create the status board: one writer for the engine, cloneable readers
/// for everything else.
pub fn status_channel() -> (StatusWriter, StatusReader) {
    let (tx, rx) = watch::channel(None);
    (StatusWriter { tx }, StatusReader { rx })
}

/// Engine-side handle. Not `Clone`: there is exactly one writer.
#[derive(Debug)]
pub struct StatusWriter {
    tx: watch::Sender<Option<Status>>,
}

impl StatusWriter {
    /// Replace the current status wholesale.
    pub fn publish(&self, status: Status) {
        tracing::debug!(state = ?status.state(), "status published");
        self.tx.send_replace(Some(status));
    }

    /// Hand out another reader attached to this board.
    pub fn reader(&self) -> StatusReader {
        StatusReader {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<Option<Status>>,
}

impl StatusReader {
    /// Copy of the latest status.
    pub fn snapshot(&self) -> Result<Status, StatusUnavailable> {
        self.rx.borrow().clone().ok_or(StatusUnavailable)
    }

    /// Wait until the published status satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&Status) -> bool,
    ) -> Result<Status, StatusUnavailable> {
        let guard = self
            .rx
            .wait_for(|s| s.as_ref().is_some_and(&mut predicate))
            .await
            .map_err(|_| StatusUnavailable)?;
        (*guard).clone().ok_or(StatusUnavailable)
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Header followed by the artifact when the attack is complete and produced
/// one; header only otherwise.
pub fn serialize_binary(status: &Status) -> Vec<u8> {
    let include_content = status.state().is_complete() && status.content_size() > 0;
    let mut out = Vec::with_capacity(
        STATUS_HEADER_LEN + if include_content { status.content().len() } else { 0 },
    );
    out.push(status.state().code());
    out.push(status.attack_type().code());
    out.extend_from_slice(&status.content_size().to_le_bytes());
    if include_content {
        out.extend_from_slice(status.content());
    }
    out
}

pub fn serialize_json(status: &Status) -> Value {
    let message = if status.state().is_complete() {
        MESSAGE_COMPLETE
    } else {
        MESSAGE_IN_PROGRESS
    };
    json!({
        "state": status.state().code(),
        "content_size": status.content_size(),
        "status_message": message,
    })
}

/// A status rendered in the deployment's canonical format.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusBody {
    Binary(Vec<u8>),
    Json(Value),
}

/// Read side of the status board, bound to one wire format.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    reader: StatusReader,
    format: StatusFormat,
}

impl StatusReporter {
    pub fn new(reader: StatusReader, format: StatusFormat) -> Self {
        Self { reader, format }
    }

    pub fn format(&self) -> StatusFormat {
        self.format
    }

    pub fn get_status(&self) -> Result<Status, StatusUnavailable> {
        self.reader.snapshot()
    }

    /// Snapshot once and project it.
    pub fn render(&self) -> Result<StatusBody, StatusUnavailable> {
        let status = self.get_status()?;
        Ok(match self.format {
            StatusFormat::Binary => StatusBody::Binary(serialize_binary(&status)),
            StatusFormat::Json => StatusBody::Json(serialize_json(&status)),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wpt_core::types::{AttackState, AttackType};

    #[test]
    fn reader_reports_unavailable_before_first_publish() {
        let (_writer, reader) = status_channel();
        assert_eq!(reader.snapshot(), Err(StatusUnavailable));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let (writer, reader) = status_channel();
        writer.publish(Status::running(AttackType::Pmkid));
        let before = reader.snapshot().unwrap();

        writer.publish(Status::ready());
        assert_eq!(before.state(), AttackState::Running);
        assert_eq!(reader.snapshot().unwrap().state(), AttackState::Ready);
    }

    #[test]
    fn binary_running_is_header_only() {
        let status = Status::running(AttackType::Handshake);
        assert_eq!(serialize_binary(&status), vec![1, 1, 0, 0]);
    }

    #[test]
    fn binary_finished_carries_content() {
        let status =
            Status::new(AttackState::Finished, AttackType::Pmkid, vec![0xAA; 300]).unwrap();
        let bytes = serialize_binary(&status);
        assert_eq!(&bytes[..4], &[2, 2, 0x2C, 0x01]);
        assert_eq!(bytes.len(), 4 + 300);
        assert!(bytes[4..].iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn binary_timeout_without_content_is_header_only() {
        let status = Status::new(AttackState::Timeout, AttackType::Dos, Vec::new()).unwrap();
        assert_eq!(serialize_binary(&status), vec![3, 3, 0, 0]);
    }

    #[test]
    fn binary_running_with_content_omits_it() {
        let status = Status::new(AttackState::Running, AttackType::Pmkid, vec![1, 2]).unwrap();
        assert_eq!(serialize_binary(&status), vec![1, 2, 2, 0]);
    }

    #[test]
    fn json_messages_follow_state() {
        let done = Status::new(AttackState::Timeout, AttackType::Dos, vec![9]).unwrap();
        assert_eq!(
            serialize_json(&done),
            json!({"state": 3, "content_size": 1, "status_message": MESSAGE_COMPLETE})
        );
        assert_eq!(
            serialize_json(&Status::ready())["status_message"],
            MESSAGE_IN_PROGRESS
        );
    }

    #[test]
    fn reporter_uses_configured_format() {
        let (writer, reader) = status_channel();
        writer.publish(Status::ready());

        let binary = StatusReporter::new(reader.clone(), StatusFormat::Binary);
        let json_reporter = StatusReporter::new(reader, StatusFormat::Json);

        assert_eq!(binary.render().unwrap(), StatusBody::Binary(vec![0, 0, 0, 0]));
        assert!(matches!(json_reporter.render().unwrap(), StatusBody::Json(_)));
    }

    #[tokio::test]
    async fn wait_for_sees_later_publish() {
        let (writer, mut reader) = status_channel();
        let waiter = tokio::spawn(async move {
            reader
                .wait_for(|s| s.state() == AttackState::Finished)
                .await
                .unwrap()
        });
        writer.publish(Status::running(AttackType::Pmkid));
        writer.publish(Status::new(AttackState::Finished, AttackType::Pmkid, vec![1]).unwrap());
        let status = waiter.await.unwrap();
        assert_eq!(status.content(), &[1]);
    }
}
