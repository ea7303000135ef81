use shortlink_core::{LinkVisit, VisitSink};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

pub const DEFAULT_VISIT_BUFFER: usize = 1024;

/// Log target the visit drain writes to.
pub const VISIT_LOG_TARGET: &str = "shortlink::visits";

/// A [`VisitSink`] backed by a bounded channel.
///
/// `record` never waits: when the buffer is full the visit is dropped with a
/// warning. A background task drains the channel into the
/// `shortlink::visits` log target and exits once every sink is dropped.
#[derive(Debug, Clone)]
pub struct ChannelVisitSink {
    tx: Sender<LinkVisit>,
}

impl ChannelVisitSink {
    /// Creates a sink and spawns its drain on the current runtime.
    pub fn spawn(capacity: usize) -> (Self, JoinHandle<()>) {
        let (sink, rx) = Self::channel(capacity);
        (sink, tokio::spawn(drain(rx)))
    }

    /// Creates a sink and hands back the receiving end without a drain.
    pub fn channel(capacity: usize) -> (Self, Receiver<LinkVisit>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl VisitSink for ChannelVisitSink {
    fn record(&self, visit: LinkVisit) {
        match self.tx.try_send(visit) {
            Ok(()) => {}
            Err(TrySendError::Full(visit)) => {
                warn!(code = %visit.hash, "visit buffer full, dropping event");
            }
            Err(TrySendError::Closed(visit)) => {
                trace!(code = %visit.hash, "visit drain stopped, dropping event");
            }
        }
    }
}

async fn drain(mut rx: Receiver<LinkVisit>) {
    while let Some(visit) = rx.recv().await {
        info!(
            target: VISIT_LOG_TARGET,
            code = %visit.hash,
            original_url = %visit.original_url,
            client_addr = visit.client_addr.as_deref(),
            referer = visit.referer.as_deref(),
            user_agent = visit.user_agent.as_deref(),
            browser = visit.agent.browser.as_deref(),
            browser_version = visit.agent.browser_version.as_deref(),
            os = visit.agent.os.as_deref(),
            os_version = visit.agent.os_version.as_deref(),
            device = visit.agent.device.as_deref(),
            accept_language = visit.accept_language.as_deref(),
            accessed_at = %visit.accessed_at,
            "link visited"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;
    use shortlink_core::{ClientAgent, ShortCode};

    fn visit(code: &str) -> LinkVisit {
        LinkVisit {
            hash: ShortCode::new_unchecked(code),
            original_url: "https://example.com".to_string(),
            client_addr: Some("203.0.113.7".to_string()),
            referer: None,
            user_agent: Some("curl/8.0".to_string()),
            agent: ClientAgent::default(),
            accept_language: None,
            accessed_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn records_in_order() {
        let (sink, mut rx) = ChannelVisitSink::channel(8);

        sink.record(visit("a"));
        sink.record(visit("b"));

        assert_eq!(rx.recv().await.unwrap().hash.as_str(), "a");
        assert_eq!(rx.recv().await.unwrap().hash.as_str(), "b");
    }

    #[tokio::test]
    async fn full_buffer_drops_without_blocking() {
        let (sink, mut rx) = ChannelVisitSink::channel(2);

        for code in ["a", "b", "c", "d"] {
            sink.record(visit(code));
        }
        drop(sink);

        let mut received = Vec::new();
        while let Some(v) = rx.recv().await {
            received.push(v.hash.to_string());
        }
        assert_eq!(received, ["a", "b"]);
    }

    #[tokio::test]
    async fn closed_drain_is_ignored() {
        let (sink, rx) = ChannelVisitSink::channel(2);
        drop(rx);

        sink.record(visit("a"));
    }

    #[tokio::test]
    async fn drain_exits_when_sinks_are_dropped() {
        let (sink, handle) = ChannelVisitSink::spawn(4);
        sink.record(visit("a"));
        drop(sink);

        handle.await.unwrap();
    }
}
