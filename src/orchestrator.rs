// Transformation orchestrator - drives one accepted request from staged
// source to delivered artifact, with guaranteed cleanup

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ObfusbotConfig;
use crate::engine::{ObfuscationEngine, ObfuscationProfile};
use crate::pending::PendingRequest;
use crate::progress::{ProgressHandle, ProgressReporter, PROGRESS_FRAMES};
use crate::staging::StagedSource;
use crate::telegram::{ChatTransport, MessageId, RequesterId};

const DONE_TEXT: &str = "✅ Encryption complete!";
const FAILURE_TEXT: &str = "❌ Obfuscation failed. Please try again later.";
const REQUESTER_CAPTION: &str = "🔒 Encrypted file generated.";

/// Terminal outcome of one transformation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Output delivered to the requester (operator delivery is best-effort
    /// and does not affect the outcome).
    Delivered,
    /// The engine rejected or failed on the staged source.
    EngineFailed,
    /// The engine succeeded but the output could not be delivered.
    DeliveryFailed,
}

pub struct Orchestrator {
    transport: Arc<dyn ChatTransport>,
    engine: Arc<dyn ObfuscationEngine>,
    config: Arc<ObfusbotConfig>,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        engine: Arc<dyn ObfuscationEngine>,
        config: Arc<ObfusbotConfig>,
    ) -> Self {
        Self {
            transport,
            engine,
            config,
        }
    }

    /// Run the pipeline for a record that has already been consumed from the
    /// pending store - consumption before this call is what makes each
    /// security code strictly single-use.
    ///
    /// The staged source is released on every exit path; a panic or task
    /// cancellation is covered by the staged file's drop backstop.
    pub async fn run(&self, record: PendingRequest, requested_by: &str) -> TransformOutcome {
        let PendingRequest {
            requester,
            file_name,
            staged,
            ..
        } = record;

        let outcome = self
            .execute(requester, &file_name, &staged, requested_by)
            .await;
        staged.release().await;

        info!(%requester, file = %file_name, ?outcome, "transformation finished");
        outcome
    }

    async fn execute(
        &self,
        requester: RequesterId,
        file_name: &str,
        staged: &StagedSource,
        requested_by: &str,
    ) -> TransformOutcome {
        let source = match staged.read().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(%requester, error = %e, "failed to read staged source");
                self.notify_requester(requester, FAILURE_TEXT).await;
                return TransformOutcome::EngineFailed;
            }
        };

        let progress = self.start_progress(requester).await;

        let result = self
            .engine
            .obfuscate(&source, &ObfuscationProfile::high())
            .await;

        let obfuscated = match result {
            Ok(output) => output,
            Err(e) => {
                warn!(%requester, error = %e, "obfuscation engine failed");
                self.finish_progress(requester, progress, FAILURE_TEXT).await;
                return TransformOutcome::EngineFailed;
            }
        };

        self.finish_progress(requester, progress, DONE_TEXT).await;

        let out_name = format!("enc_{file_name}");
        if let Err(e) = self
            .transport
            .send_document(
                requester,
                &out_name,
                obfuscated.clone().into_bytes(),
                REQUESTER_CAPTION,
            )
            .await
        {
            warn!(%requester, error = %e, "failed to deliver obfuscated file");
            self.notify_requester(requester, FAILURE_TEXT).await;
            return TransformOutcome::DeliveryFailed;
        }

        // Operator copy is best-effort: failures here must never surface to
        // the requester.
        if let Some(owner_id) = self.config.telegram.owner_id {
            let caption = format!("📢 Encrypted file from {requested_by}");
            if let Err(e) = self
                .transport
                .send_document(
                    RequesterId(owner_id),
                    &out_name,
                    obfuscated.into_bytes(),
                    &caption,
                )
                .await
            {
                warn!(owner_id, error = %e, "operator copy failed, ignoring");
            }
        }

        TransformOutcome::Delivered
    }

    /// Send the initial frame and spawn the reporter. A send failure only
    /// costs the animation, not the transformation.
    async fn start_progress(
        &self,
        requester: RequesterId,
    ) -> Option<(MessageId, ProgressHandle)> {
        match self.transport.send_message(requester, PROGRESS_FRAMES[0]).await {
            Ok(message_id) => {
                let handle = ProgressReporter::start(
                    self.transport.clone(),
                    requester,
                    message_id,
                    &PROGRESS_FRAMES,
                    Duration::from_millis(self.config.progress.interval_ms),
                );
                Some((message_id, handle))
            }
            Err(e) => {
                debug!(%requester, error = %e, "could not create progress message");
                None
            }
        }
    }

    /// Stop the animation and replace the progress message with the terminal
    /// status. Falls back to a plain message when the progress message never
    /// existed.
    async fn finish_progress(
        &self,
        requester: RequesterId,
        progress: Option<(MessageId, ProgressHandle)>,
        final_text: &str,
    ) {
        match progress {
            Some((message_id, handle)) => {
                handle.finish().await;
                if let Err(e) = self
                    .transport
                    .edit_message_text(requester, message_id, final_text)
                    .await
                {
                    debug!(%requester, error = %e, "failed to edit final progress status");
                }
            }
            None => self.notify_requester(requester, final_text).await,
        }
    }

    async fn notify_requester(&self, requester: RequesterId, text: &str) {
        if let Err(e) = self.transport.send_message(requester, text).await {
            warn!(%requester, error = %e, "failed to notify requester");
        }
    }
}
