//! Connector Framework traits
//!
//! The base connector trait and the change-synchronization contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConnectorResult;
use crate::operation::{ConnectorObject, Uid};

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Get the display name for this connector instance.
    fn display_name(&self) -> &str;

    /// Test the connection to the target system.
    ///
    /// Returns `Ok(())` if the connection is successful, or an error describing
    /// what went wrong.
    async fn test_connection(&self) -> ConnectorResult<()>;

    /// Dispose of connector resources.
    async fn dispose(&self) -> ConnectorResult<()>;

    /// Check if the connector is currently healthy.
    ///
    /// This is a lightweight health check, different from `test_connection`
    /// which may perform a more thorough validation.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Resumption point of a change synchronization.
///
/// Wraps the changelog sequence number of the last delivered change. Callers
/// persist it between runs and hand it back to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(i64);

impl SyncToken {
    /// Create a token for the given sequence number.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the sequence number.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for SyncToken {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SyncToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of change carried by a [`SyncDelta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDeltaType {
    /// The entry was added, modified or renamed.
    CreateOrUpdate,
    /// The entry was deleted.
    Delete,
}

impl std::fmt::Display for SyncDeltaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncDeltaType::CreateOrUpdate => write!(f, "create_or_update"),
            SyncDeltaType::Delete => write!(f, "delete"),
        }
    }
}

/// A single change detected in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDelta {
    /// Token to persist once this change has been handled.
    pub token: SyncToken,

    /// The type of change.
    pub delta_type: SyncDeltaType,

    /// Identifier of the changed entry, when one could be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,

    /// Identifier the entry had before a rename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_uid: Option<Uid>,

    /// The entry after the change. For deletes this only carries the
    /// naming attribute of the removed entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ConnectorObject>,

    /// Timestamp of the change (if provided by the directory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SyncDelta {
    /// Create a delta for an added, modified or renamed entry.
    #[must_use]
    pub fn create_or_update(token: SyncToken, object: ConnectorObject) -> Self {
        Self {
            token,
            delta_type: SyncDeltaType::CreateOrUpdate,
            uid: object.uid.clone(),
            previous_uid: None,
            object: Some(object),
            timestamp: None,
        }
    }

    /// Create a delta for a deleted entry.
    #[must_use]
    pub fn delete(token: SyncToken, object: ConnectorObject) -> Self {
        Self {
            token,
            delta_type: SyncDeltaType::Delete,
            uid: object.uid.clone(),
            previous_uid: None,
            object: Some(object),
            timestamp: None,
        }
    }

    /// Set the identifier the entry had before a rename.
    #[must_use]
    pub fn with_previous_uid(mut self, previous_uid: Option<Uid>) -> Self {
        self.previous_uid = previous_uid;
        self
    }

    /// Set the timestamp of the change.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Receiver of synchronized changes.
///
/// Returning `false` stops the synchronization immediately; no further
/// changes are delivered in that run.
pub trait SyncResultsHandler: Send {
    /// Handle one change.
    fn handle(&mut self, delta: SyncDelta) -> bool;
}

impl<F> SyncResultsHandler for F
where
    F: FnMut(SyncDelta) -> bool + Send,
{
    fn handle(&mut self, delta: SyncDelta) -> bool {
        self(delta)
    }
}

/// How a synchronization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCompletion {
    /// No more changes were available.
    #[default]
    Exhausted,
    /// The handler asked to stop.
    StoppedByHandler,
}

/// Counters for one synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Pages fetched from the changelog.
    pub pages: usize,
    /// Changelog records examined.
    pub examined: usize,
    /// Changes delivered to the handler.
    pub emitted: usize,
    /// Records skipped without delivering a change.
    pub skipped: usize,
    /// Token of the last delivered change.
    pub last_token: Option<SyncToken>,
    /// How the run ended.
    pub completion: SyncCompletion,
}

impl SyncSummary {
    /// Record a change handed to the handler.
    pub fn record_emitted(&mut self, token: SyncToken) {
        self.emitted += 1;
        self.last_token = Some(token);
    }

    /// Record a skipped changelog record.
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Whether the handler stopped the run.
    pub fn stopped(&self) -> bool {
        self.completion == SyncCompletion::StoppedByHandler
    }
}

/// Capability for incremental synchronization from a change log.
#[async_trait]
pub trait SyncOp: Send + Sync {
    /// Deliver every change starting at `token` to `handler`, in change order.
    ///
    /// The change numbered `token` itself is delivered again, so resuming
    /// with the last handled token repeats one change. Without a token, or
    /// with one older than the retained change log, synchronization starts
    /// at the oldest retained change.
    async fn sync(
        &self,
        token: Option<SyncToken>,
        handler: &mut dyn SyncResultsHandler,
    ) -> ConnectorResult<SyncSummary>;

    /// Get the token of the most recent change, without synchronizing.
    ///
    /// Callers use it to start synchronizing "from now".
    async fn latest_sync_token(&self) -> ConnectorResult<SyncToken>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct MockConnector {
        name: String,
        healthy: Arc<AtomicBool>,
    }

    impl MockConnector {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                healthy: Arc::new(AtomicBool::new(true)),
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        fn display_name(&self) -> &str {
            &self.name
        }

        async fn test_connection(&self) -> ConnectorResult<()> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(crate::error::ConnectorError::connection_failed(
                    "not healthy",
                ))
            }
        }

        async fn dispose(&self) -> ConnectorResult<()> {
            Ok(())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_mock_connector() {
        let connector = MockConnector::new("test");
        assert_eq!(connector.display_name(), "test");
        assert!(connector.is_healthy());
        assert!(connector.test_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_unhealthy_connector() {
        let connector = MockConnector::new("test");
        connector.healthy.store(false, Ordering::SeqCst);
        assert!(!connector.is_healthy());
        assert!(connector.test_connection().await.is_err());
    }

    #[test]
    fn test_sync_token_ordering_and_serde() {
        let a = SyncToken::new(10);
        let b = SyncToken::from(11);
        assert!(a < b);
        assert_eq!(b.to_string(), "11");
        assert_eq!(serde_json::to_string(&a).unwrap(), "10");
        let parsed: SyncToken = serde_json::from_str("42").unwrap();
        assert_eq!(parsed.value(), 42);
    }

    #[test]
    fn test_delete_delta_carries_uid() {
        let object = ConnectorObject::new("inetOrgPerson", "cn=bob,dc=example,dc=com")
            .with_uid(Some(Uid::from_dn("cn=bob,dc=example,dc=com")))
            .with_attribute("cn", "bob");
        let delta = SyncDelta::delete(SyncToken::new(7), object);

        assert_eq!(delta.delta_type, SyncDeltaType::Delete);
        assert_eq!(
            delta.uid.as_ref().map(Uid::value),
            Some("cn=bob,dc=example,dc=com")
        );
        assert!(delta.previous_uid.is_none());
    }

    #[test]
    fn test_closure_handler() {
        let mut seen = Vec::new();
        let mut handler = |delta: SyncDelta| {
            seen.push(delta.token.value());
            delta.token.value() < 2
        };

        let object = ConnectorObject::new("top", "cn=a");
        assert!(handler.handle(SyncDelta::create_or_update(
            SyncToken::new(1),
            object.clone()
        )));
        assert!(!handler.handle(SyncDelta::create_or_update(SyncToken::new(2), object)));
        drop(handler);
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_summary_counters() {
        let mut summary = SyncSummary::default();
        summary.record_emitted(SyncToken::new(3));
        summary.record_skip();
        summary.record_emitted(SyncToken::new(5));

        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.last_token, Some(SyncToken::new(5)));
        assert!(!summary.stopped());
    }
}
