//! Reconciliation of best-effort send steps
//!
//! Sending a message is not transactional: after the insert succeeds, the
//! conversation's last activity, the sender's own read receipt and the typing
//! row are written one by one, and a failure there only gets logged. Uploads
//! add the attachment row to that list. Each such
//! failure is recorded as a [`PendingRepair`]; every repair is idempotent, so
//! [`ReconciliationService::sweep`] can re-apply them any number of times.

use chrono::{DateTime, Utc};
use convo_core::traits::RepoResult;
use convo_core::{Attachment, Snowflake};
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use super::context::ServiceContext;
use super::error::ServiceResult;

/// A trailing write that failed and can be retried safely
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRepair {
    /// Move last activity forward to the newest message
    TouchConversation { conversation_id: Snowflake },
    /// Sender has implicitly read their own message
    SelfReceipt {
        message_id: Snowflake,
        user_id: Snowflake,
        at: DateTime<Utc>,
    },
    /// The sender stopped typing when the message went out
    ClearTyping {
        conversation_id: Snowflake,
        user_id: Snowflake,
    },
    /// Row of an uploaded file whose message already exists
    AttachmentRow { attachment: Attachment },
}

impl PendingRepair {
    pub fn step(&self) -> &'static str {
        match self {
            Self::TouchConversation { .. } => "touch_conversation",
            Self::SelfReceipt { .. } => "self_receipt",
            Self::ClearTyping { .. } => "clear_typing",
            Self::AttachmentRow { .. } => "attachment_row",
        }
    }
}

/// Repairs waiting for the next sweep
#[derive(Debug, Default)]
pub struct RepairLog {
    pending: Mutex<Vec<PendingRepair>>,
}

impl RepairLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a repair unless an identical one is already queued
    pub fn record(&self, repair: PendingRepair) {
        let mut pending = self.pending.lock();
        if !pending.contains(&repair) {
            pending.push(repair);
        }
    }

    pub fn snapshot(&self) -> Vec<PendingRepair> {
        self.pending.lock().clone()
    }

    fn drain(&self) -> Vec<PendingRepair> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub repaired: usize,
    /// Still failing; queued again
    pub failed: usize,
}

/// Reconciliation service
pub struct ReconciliationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReconciliationService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Re-apply every queued repair once
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for repair in self.ctx.repairs().drain() {
            match self.apply(&repair).await {
                Ok(()) => report.repaired += 1,
                Err(e) => {
                    warn!(error = %e, step = repair.step(), "Repair still failing");
                    report.failed += 1;
                    self.ctx.repairs().record(repair);
                }
            }
        }
        if report.repaired > 0 || report.failed > 0 {
            info!(repaired = report.repaired, failed = report.failed, "Reconciliation sweep finished");
        }
        report
    }

    /// Recompute last activity from the newest message; returns the value applied
    #[instrument(skip(self))]
    pub async fn repair_conversation(&self, conversation_id: Snowflake) -> ServiceResult<Option<DateTime<Utc>>> {
        Ok(self.touch_from_messages(conversation_id).await?)
    }

    async fn touch_from_messages(&self, conversation_id: Snowflake) -> RepoResult<Option<DateTime<Utc>>> {
        let latest = self.ctx.message_repo().latest_created_at(conversation_id).await?;
        if let Some(at) = latest {
            self.ctx
                .conversation_repo()
                .touch_last_message(conversation_id, at)
                .await?;
        }
        Ok(latest)
    }

    /// Insert the row unless an earlier attempt already landed
    async fn restore_attachment(&self, attachment: &Attachment) -> RepoResult<()> {
        let existing = self
            .ctx
            .attachment_repo()
            .find_by_messages(&[attachment.message_id])
            .await?;
        if existing.iter().any(|a| a.id == attachment.id) {
            return Ok(());
        }
        self.ctx.attachment_repo().create(attachment).await
    }

    async fn apply(&self, repair: &PendingRepair) -> RepoResult<()> {
        match *repair {
            PendingRepair::TouchConversation { conversation_id } => {
                self.touch_from_messages(conversation_id).await.map(|_| ())
            }
            PendingRepair::SelfReceipt {
                message_id,
                user_id,
                at,
            } => self.ctx.receipt_repo().record_read(message_id, user_id, at).await,
            PendingRepair::ClearTyping {
                conversation_id,
                user_id,
            } => self
                .ctx
                .typing_repo()
                .delete(conversation_id, user_id)
                .await
                .map(|_| ()),
            PendingRepair::AttachmentRow { ref attachment } => self.restore_attachment(attachment).await,
        }
    }
}
