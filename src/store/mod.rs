//! Persistence collaborator contract.
//!
//! The backing session table lives outside this subsystem; recovery and the
//! sync controller only read records and request lifecycle transitions.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Session;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Sessions owned by the current user with status `Active`, in the
    /// store's natural order. Recovery scans these once per launch.
    async fn list_active_sessions_for_current_user(&self) -> Result<Vec<Session>>;

    /// Marks the session completed.
    async fn end_session(&self, id: &str) -> Result<()>;

    async fn delete_session(&self, id: &str) -> Result<()>;
}
