// Progress reporter - cosmetic heartbeat edited into a chat message while a
// transformation runs

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::telegram::{ChatTransport, MessageId, RequesterId};

/// Fixed frame sequence. The reporter cannot see how long the engine will
/// take, so the bar is a heartbeat, not an estimate.
pub const PROGRESS_FRAMES: [&str; 6] = [
    "⏳ Encrypting [░░░░░░] 0%",
    "⏳ Encrypting [▓░░░░░] 20%",
    "⏳ Encrypting [▓▓░░░░] 40%",
    "⏳ Encrypting [▓▓▓░░░] 60%",
    "⏳ Encrypting [▓▓▓▓░░] 80%",
    "⏳ Encrypting [▓▓▓▓▓▓] 100%",
];

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running reporter task.
///
/// Stopping is a separate control edge from the transformation itself: the
/// completion handler can stop the reporter even while other work is still
/// suspended. `stop` is idempotent and harmless after the frames ran out.
#[derive(Debug)]
pub struct ProgressHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ProgressHandle {
    /// Ask the reporter task to stop after its current edit, if any.
    pub fn stop(&self) {
        // Err means the task already exhausted its frames and exited.
        let _ = self.stop_tx.send(true);
    }

    /// Stop and wait for the reporter task to finish.
    pub async fn finish(self) {
        self.stop();
        let _ = self.task.await;
    }
}

pub struct ProgressReporter;

impl ProgressReporter {
    /// Spawn a task that edits `message_id` to each frame after the first on
    /// a fixed cadence.
    ///
    /// The caller is expected to have sent `frames[0]` itself to create the
    /// message. After the last frame the task goes idle; edit failures are
    /// ignored because the animation is cosmetic.
    pub fn start(
        transport: Arc<dyn ChatTransport>,
        requester: RequesterId,
        message_id: MessageId,
        frames: &'static [&'static str],
        interval: Duration,
    ) -> ProgressHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            for frame in frames.iter().skip(1) {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = transport
                            .edit_message_text(requester, message_id, frame)
                            .await
                        {
                            debug!(%requester, error = %e, "progress edit failed");
                        }
                    }
                    _ = stop_rx.changed() => {
                        return;
                    }
                }
            }
        });

        ProgressHandle { stop_tx, task }
    }
}
