use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::traits::{Topic, Transport};
use super::TransportError;
use crate::app::BusSettings;

/// Broker client that dials a fresh connection for every message.
///
/// Each send connects, publishes and flushes within the write deadline, then
/// drains the connection. Dial, write and close failures are reported as
/// distinct [`TransportError`] variants.
#[derive(Debug, Clone)]
pub struct NatsTransport {
    url: String,
    write_timeout: Duration,
}

impl NatsTransport {
    pub fn new(url: impl Into<String>, write_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            write_timeout,
        }
    }

    pub fn from_settings(settings: &BusSettings) -> Self {
        Self::new(
            settings.url.clone(),
            Duration::from_millis(settings.write_timeout_ms),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn send(&self, topic: &Topic, payload: Bytes) -> Result<(), TransportError> {
        let client = timeout(self.write_timeout, async_nats::connect(self.url.as_str()))
            .await
            .map_err(|_| TransportError::Dial {
                url: self.url.clone(),
                reason: format!("timed out after {:?}", self.write_timeout),
            })?
            .map_err(|e| TransportError::Dial {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let size = payload.len();
        let write = async {
            client
                .publish(topic.as_str().to_string(), payload)
                .await
                .map_err(|e| e.to_string())?;
            client.flush().await.map_err(|e| e.to_string())
        };

        let written = match timeout(self.write_timeout, write).await {
            Err(_) => Err(TransportError::WriteTimeout {
                topic: topic.clone(),
                after: self.write_timeout,
            }),
            Ok(Err(reason)) => Err(TransportError::Write {
                topic: topic.clone(),
                reason,
            }),
            Ok(Ok(())) => Ok(()),
        };

        // Close on every path; a write failure outranks a close failure
        let closed = client
            .drain()
            .await
            .map_err(|e| TransportError::Close(e.to_string()));
        settle(written, closed)?;

        debug!(topic = %topic, bytes = size, "published to nats");
        Ok(())
    }
}

/// Combine the write and close outcomes, keeping the write error when both
/// failed
fn settle(
    written: Result<(), TransportError>,
    closed: Result<(), TransportError>,
) -> Result<(), TransportError> {
    match (written, closed) {
        (Err(write), Err(close)) => {
            warn!("closing after a failed write also failed: {}", close);
            Err(write)
        }
        (Err(write), Ok(())) => Err(write),
        (Ok(()), closed) => closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_outranks_close_error() {
        let topic = Topic::prompt();
        let write = TransportError::WriteTimeout {
            topic: topic.clone(),
            after: Duration::from_millis(10),
        };
        let close = TransportError::Close("broken pipe".to_string());

        assert_eq!(settle(Err(write.clone()), Err(close.clone())), Err(write.clone()));
        assert_eq!(settle(Err(write.clone()), Ok(())), Err(write));
        assert_eq!(settle(Ok(()), Err(close.clone())), Err(close));
        assert_eq!(settle(Ok(()), Ok(())), Ok(()));
    }

    #[test]
    fn test_from_settings() {
        let settings = BusSettings {
            url: "nats://bus:4222".to_string(),
            write_timeout_ms: 250,
            ..BusSettings::default()
        };
        let transport = NatsTransport::from_settings(&settings);
        assert_eq!(transport.url(), "nats://bus:4222");
        assert_eq!(transport.write_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_a_dial_error() {
        // Port 9 (discard) is not a NATS server
        let transport = NatsTransport::new("nats://127.0.0.1:9", Duration::from_millis(500));
        let err = transport
            .send(&Topic::prompt(), Bytes::from_static(b"hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Dial { .. }), "got {err:?}");
    }
}
