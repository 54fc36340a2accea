use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::messages::OutboundReply;

/// A source of raw inbound requests
pub trait Inbound: Send + 'static {
    /// Start delivering requests on a bounded channel. The channel closes when
    /// the source is exhausted or `shutdown` fires.
    fn listen(self, capacity: usize, shutdown: CancellationToken) -> mpsc::Receiver<Vec<u8>>;
}

/// Newline-delimited JSON requests read from any async reader (stdin, a
/// socket, a file)
pub struct LineInbound<R> {
    reader: R,
}

impl<R> LineInbound<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R> Inbound for LineInbound<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn listen(self, capacity: usize, shutdown: CancellationToken) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut lines = self.reader.lines();

        tokio::spawn(async move {
            loop {
                let line = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    line = lines.next_line() => line,
                };

                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(line.as_bytes().to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("inbound reader reached end of input");
                        break;
                    }
                    Err(e) => {
                        warn!("inbound reader failed: {}", e);
                        break;
                    }
                }
            }
        });

        rx
    }
}

/// Write each reply as one JSON line until the channel closes
pub async fn write_replies<W>(mut writer: W, mut replies: mpsc::Receiver<OutboundReply>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = replies.recv().await {
        let mut line = reply.to_json();
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
