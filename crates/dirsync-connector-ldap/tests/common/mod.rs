//! Integration test helpers for dirsync-connector-ldap.
//!
//! Provides an in-memory directory implementing the collaborator traits,
//! builders for changelog records and a handler recording delivered changes.
//!
//! # Usage
//!
//! ```ignore
//! use crate::common::{MockDirectory, RecordingHandler};
//!
//! #[tokio::test]
//! async fn my_sync_test() {
//!     let directory = MockDirectory::new().with_change_number_range(10, 15);
//!     let sync = ChangeLogSync::new(directory, test_config()).unwrap();
//!     let mut handler = RecordingHandler::default();
//!     sync.sync(None, &mut handler).await.unwrap();
//! }
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::operation::Filter;
use dirsync_connector::traits::{SyncDelta, SyncResultsHandler};
use dirsync_connector_ldap::dn::{dn_equals, parent};
use dirsync_connector_ldap::filter::filter_to_ldap;
use dirsync_connector_ldap::{
    DirectoryEntry, DirectorySearch, EntryLookup, LdapConfig, RootAttributes, SearchScope,
};

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub const BASE_DN: &str = "dc=example,dc=com";
pub const PEOPLE_DN: &str = "ou=People,dc=example,dc=com";
pub const ADMIN_DN: &str = "cn=admin,dc=example,dc=com";

/// Configuration used by the integration tests.
pub fn test_config() -> LdapConfig {
    LdapConfig::new("ldap.example.com", BASE_DN, ADMIN_DN).with_password("secret")
}

/// DN of a person under `ou=People`.
pub fn person_dn(uid: &str) -> String {
    format!("uid={uid},{PEOPLE_DN}")
}

/// A live person entry.
pub fn person(uid: &str, cn: &str, entry_uuid: &str) -> DirectoryEntry {
    DirectoryEntry::new(person_dn(uid))
        .with_attr("objectClass", ["top", "person", "inetOrgPerson"])
        .with_attr("uid", [uid])
        .with_attr("cn", [cn])
        .with_attr("mail", [format!("{uid}@example.com")])
        .with_attr("entryUUID", [entry_uuid])
        .with_attr("userPassword", ["{SSHA}secret"])
}

/// A changelog record.
pub fn change_record(number: i64, change_type: &str, target_dn: &str) -> DirectoryEntry {
    DirectoryEntry::new(format!("changeNumber={number},cn=changelog"))
        .with_attr("objectClass", ["top", "changeLogEntry"])
        .with_attr("changeNumber", [number.to_string()])
        .with_attr("changeType", [change_type])
        .with_attr("targetDN", [target_dn])
}

/// In-memory directory.
///
/// Searches ignore the requested attribute list and return entries in
/// insertion order.
#[derive(Default)]
pub struct MockDirectory {
    entries: Mutex<Vec<DirectoryEntry>>,
    root: Mutex<HashMap<String, String>>,
    fail_searches_from: Mutex<Option<usize>>,
    searches: AtomicUsize,
    lookups: AtomicUsize,
    root_reads: AtomicUsize,
    filters: Mutex<Vec<String>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish both change numbers on the root DSE.
    pub fn with_change_number_range(self, first: i64, last: i64) -> Self {
        self.with_root_attribute("firstChangeNumber", first.to_string())
            .with_root_attribute("lastChangeNumber", last.to_string())
    }

    pub fn with_root_attribute(self, name: &str, value: impl Into<String>) -> Self {
        self.root
            .lock()
            .unwrap()
            .insert(name.to_string(), value.into());
        self
    }

    pub fn with_entry(self, entry: DirectoryEntry) -> Self {
        self.add_entry(entry);
        self
    }

    pub fn with_entries(self, entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        for entry in entries {
            self.add_entry(entry);
        }
        self
    }

    pub fn add_entry(&self, entry: DirectoryEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Make the `n`th search (1-based) and every later one fail.
    pub fn fail_searches_from(self, n: usize) -> Self {
        *self.fail_searches_from.lock().unwrap() = Some(n);
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn root_read_count(&self) -> usize {
        self.root_reads.load(Ordering::SeqCst)
    }

    /// LDAP rendering of every search filter received.
    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().unwrap().clone()
    }

    fn matching(&self, base: &str, scope: SearchScope, filter: &Filter) -> Vec<DirectoryEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| in_scope(&entry.dn, base, scope))
            .filter(|entry| matches(entry, filter))
            .cloned()
            .collect()
    }
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn_equals(dn, base),
        SearchScope::OneLevel => parent(dn).is_some_and(|p| dn_equals(&p, base)),
        SearchScope::Subtree => {
            dn_equals(dn, base)
                || dn
                    .to_lowercase()
                    .ends_with(&format!(",{}", base.to_lowercase()))
        }
    }
}

/// Evaluate a filter against an entry.
pub fn matches(entry: &DirectoryEntry, filter: &Filter) -> bool {
    let values = |attribute: &str| entry.values(attribute).unwrap_or_default().to_vec();

    match filter {
        Filter::Equals { attribute, value } => values(attribute)
            .iter()
            .any(|v| v.eq_ignore_ascii_case(value)),
        Filter::GreaterThanOrEquals { attribute, value } => {
            values(attribute).iter().any(|v| compare(v, value).is_ge())
        }
        Filter::LessThanOrEquals { attribute, value } => {
            values(attribute).iter().any(|v| compare(v, value).is_le())
        }
        Filter::Present { attribute } => !values(attribute).is_empty(),
        Filter::And { filters } => filters.iter().all(|f| matches(entry, f)),
        Filter::Or { filters } => filters.iter().any(|f| matches(entry, f)),
    }
}

fn compare(left: &str, right: &str) -> std::cmp::Ordering {
    match (left.parse::<i64>(), right.parse::<i64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => left.cmp(right),
    }
}

#[async_trait]
impl DirectorySearch for MockDirectory {
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        _attributes: &[String],
        size_limit: usize,
    ) -> ConnectorResult<Vec<DirectoryEntry>> {
        let call = self.searches.fetch_add(1, Ordering::SeqCst) + 1;
        self.filters.lock().unwrap().push(filter_to_ldap(filter));

        if let Some(n) = *self.fail_searches_from.lock().unwrap() {
            if call >= n {
                return Err(ConnectorError::network(format!(
                    "connection reset during search #{call}"
                )));
            }
        }

        let mut entries = self.matching(base, scope, filter);
        if size_limit > 0 {
            entries.truncate(size_limit);
        }
        Ok(entries)
    }
}

#[async_trait]
impl EntryLookup for MockDirectory {
    async fn lookup(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        _attributes: &[String],
    ) -> ConnectorResult<Option<DirectoryEntry>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let mut entries = self.matching(base, scope, filter);
        if entries.len() > 1 {
            return Err(ConnectorError::AmbiguousEntry {
                base: base.to_string(),
                filter: filter_to_ldap(filter),
                count: entries.len(),
            });
        }
        Ok(entries.pop())
    }
}

#[async_trait]
impl RootAttributes for MockDirectory {
    async fn root_attributes(&self, names: &[String]) -> ConnectorResult<HashMap<String, String>> {
        self.root_reads.fetch_add(1, Ordering::SeqCst);

        let root = self.root.lock().unwrap();
        Ok(root
            .iter()
            .filter(|(name, _)| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }
}

/// Handler recording every delivered change.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub deltas: Vec<SyncDelta>,
    stop_after: Option<usize>,
}

impl RecordingHandler {
    /// Stop the synchronization once `n` changes were received.
    pub fn stopping_after(n: usize) -> Self {
        Self {
            deltas: Vec::new(),
            stop_after: Some(n),
        }
    }

    pub fn tokens(&self) -> Vec<i64> {
        self.deltas.iter().map(|delta| delta.token.value()).collect()
    }
}

impl SyncResultsHandler for RecordingHandler {
    fn handle(&mut self, delta: SyncDelta) -> bool {
        self.deltas.push(delta);
        self.stop_after.map_or(true, |n| self.deltas.len() < n)
    }
}
