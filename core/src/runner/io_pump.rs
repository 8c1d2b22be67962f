use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

use crate::error::RunnerError;
use crate::output::{SinkLedger, TeeTarget};

/// Pump one child stream into the shared capture buffer, teeing each chunk
/// into the configured targets. Tee failures are recorded, never propagated;
/// only a read error on the child pipe ends the pump early.
pub(crate) fn pump<R>(
    mut rd: R,
    buf: Arc<tokio::sync::Mutex<Vec<u8>>>,
    targets: Vec<TeeTarget>,
    stream: &'static str,
    ledger: SinkLedger,
) -> JoinHandle<Result<u64, RunnerError>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0u8; 16 * 1024];
        let mut total = 0u64;

        loop {
            let n = rd
                .read(&mut chunk)
                .await
                .map_err(|e| RunnerError::StreamIo { stream, source: e })?;
            if n == 0 {
                break;
            }
            total += n as u64;

            buf.lock().await.extend_from_slice(&chunk[..n]);

            for target in &targets {
                if let Err(e) = target.write_all(&chunk[..n]).await {
                    tracing::warn!(stream, error = %e, "tee write failed");
                    ledger.record(e);
                }
            }
        }

        Ok(total)
    })
}
