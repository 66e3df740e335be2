//! Startup pass that reconciles sessions left `Active` by an ungraceful
//! prior exit.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::models::Session;
use crate::store::SessionStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Active sessions at least this old are abandoned scratch state: deleted
/// silently, never prompted.
const ABANDON_AFTER_HOURS: i64 = 24;
/// Active sessions at least this old (but younger than the abandon cutoff)
/// are stale and eligible for the single resolution prompt.
const STALE_AFTER_HOURS: i64 = 2;

/// The user's answer to the stale-session prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleResolution {
    /// Mark the session completed.
    EndSession,
    /// Navigate back into the session to resume it.
    Resume,
    /// Leave it untouched.
    Dismiss,
}

/// UI collaborator for the recovery pass.
#[async_trait]
pub trait StaleSessionPrompter: Send + Sync {
    async fn resolve_stale(&self, session: &Session) -> StaleResolution;

    /// User-visible alert when a recovery action fails. Raised at most
    /// once per pass; failures never abort the remaining scan.
    async fn notify_failure(&self, message: &str);
}

/// Outcome of one recovery pass.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Auto-deleted plus user-ended sessions.
    pub resolved: usize,
    /// Stale session the user chose to resume, for navigation.
    pub resume_session: Option<Session>,
    /// Most recent legitimately-active session, for banner display.
    pub active_session: Option<Session>,
}

enum ScanState {
    NotScanned,
    Scanned(RecoveryReport),
}

/// Runs at most once per application lifecycle; re-invocation (a caller
/// re-render) returns the cached report without rescanning. A pass that
/// fails outright (store read error) does not consume the latch.
pub struct OrphanedSessionRecovery {
    store: Arc<dyn SessionStore>,
    scan: Mutex<ScanState>,
}

impl OrphanedSessionRecovery {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            scan: Mutex::new(ScanState::NotScanned),
        }
    }

    pub async fn run(&self, prompter: &dyn StaleSessionPrompter) -> Result<RecoveryReport> {
        self.run_at(prompter, Utc::now()).await
    }

    pub async fn run_at(
        &self,
        prompter: &dyn StaleSessionPrompter,
        now: DateTime<Utc>,
    ) -> Result<RecoveryReport> {
        let mut scan = self.scan.lock().await;
        if let ScanState::Scanned(report) = &*scan {
            log_info!("orphan scan already completed this launch");
            return Ok(report.clone());
        }

        let report = self.scan_once(prompter, now).await?;
        *scan = ScanState::Scanned(report.clone());
        Ok(report)
    }

    async fn scan_once(
        &self,
        prompter: &dyn StaleSessionPrompter,
        now: DateTime<Utc>,
    ) -> Result<RecoveryReport> {
        let sessions = self.store.list_active_sessions_for_current_user().await?;
        log_info!("orphan scan over {} active session(s)", sessions.len());

        let mut report = RecoveryReport::default();
        let mut alerted = false;

        for session in sessions {
            let age = now.signed_duration_since(session.started_at);

            if age >= Duration::hours(ABANDON_AFTER_HOURS) {
                log_info!(
                    "deleting abandoned session {} ({}h old)",
                    session.id,
                    age.num_hours()
                );
                match self.store.delete_session(&session.id).await {
                    Ok(()) => report.resolved += 1,
                    Err(err) => {
                        log_error!("failed to delete session {}: {err:#}", session.id);
                        alert_once(prompter, &mut alerted, &session.id).await;
                    }
                }
            } else if age >= Duration::hours(STALE_AFTER_HOURS) {
                match prompter.resolve_stale(&session).await {
                    StaleResolution::EndSession => {
                        match self.store.end_session(&session.id).await {
                            Ok(()) => report.resolved += 1,
                            Err(err) => {
                                log_error!("failed to end session {}: {err:#}", session.id);
                                alert_once(prompter, &mut alerted, &session.id).await;
                            }
                        }
                    }
                    StaleResolution::Resume => report.resume_session = Some(session),
                    StaleResolution::Dismiss => {
                        log_info!("stale session {} left untouched", session.id)
                    }
                }
                // One prompt per launch; remaining sessions wait for a
                // future pass.
                break;
            } else {
                // Young enough to be legitimately live. A future
                // started_at (clock skew) lands here too.
                let newer = report
                    .active_session
                    .as_ref()
                    .map_or(true, |current| session.started_at > current.started_at);
                if newer {
                    report.active_session = Some(session);
                }
            }
        }

        log_info!(
            "orphan scan resolved {} session(s); active banner: {:?}",
            report.resolved,
            report.active_session.as_ref().map(|s| s.id.as_str())
        );
        Ok(report)
    }
}

async fn alert_once(prompter: &dyn StaleSessionPrompter, alerted: &mut bool, session_id: &str) {
    if *alerted {
        return;
    }
    *alerted = true;
    prompter
        .notify_failure(&format!(
            "Could not clean up training session {session_id}. It will be retried on the next launch."
        ))
        .await;
}
