use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cancels `cancel` once `reader` reaches end of file.
///
/// The screensaver host keeps our stdin open for as long as the slideshow
/// should run. Input is discarded. Returns early if `cancel` fires first.
pub async fn watch_input<R>(mut reader: R, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut sink = [0u8; 256];
    loop {
        select! {
            _ = cancel.cancelled() => {
                debug!("input watcher stopping");
                return;
            }
            read = reader.read(&mut sink) => match read {
                Ok(0) => {
                    info!("stdin closed; initiating shutdown");
                    cancel.cancel();
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("stdin watcher failed: {err}");
                    return;
                }
            },
        }
    }
}
