//! Directory access used by change log synchronization.
//!
//! The synchronization engine reads the directory through three narrow
//! capabilities ([`DirectorySearch`], [`EntryLookup`], [`RootAttributes`]).
//! [`LdapDirectory`] implements them over `ldap3`.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use dirsync_connector::config::ConnectorConfig;
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::operation::{AttributeSet, AttributeValue, Filter};
use dirsync_connector::traits::Connector;

use crate::config::LdapConfig;
use crate::filter::filter_to_ldap;

/// LDAP result code: success.
const RC_SUCCESS: u32 = 0;
/// LDAP result code: size limit exceeded (partial result is still valid).
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
/// LDAP result code: no such object.
const RC_NO_SUCH_OBJECT: u32 = 32;
/// LDAP result code: invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// A raw entry as returned by a directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name.
    pub dn: String,
    /// Textual attribute values.
    pub attrs: HashMap<String, Vec<String>>,
    /// Binary attribute values.
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    /// Create an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Default::default()
        }
    }

    /// Add a textual attribute using builder pattern.
    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Get the DN.
    pub fn name(&self) -> &str {
        &self.dn
    }

    /// Get all textual values of an attribute, ignoring ASCII case of the name.
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attrs
            .get(name)
            .or_else(|| {
                self.attrs
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(Vec::as_slice)
    }

    /// Get the first textual value of an attribute.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Convert the entry to an attribute set.
    ///
    /// Single values become strings, several values become arrays, binary
    /// attributes keep their first value.
    pub fn to_attribute_set(&self) -> AttributeSet {
        let mut attrs = AttributeSet::new();

        for (name, values) in &self.attrs {
            match values.as_slice() {
                [] => {}
                [single] => attrs.set(name.clone(), single.clone()),
                many => attrs.set(
                    name.clone(),
                    AttributeValue::Array(
                        many.iter().cloned().map(AttributeValue::String).collect(),
                    ),
                ),
            }
        }

        for (name, values) in &self.bin_attrs {
            if let Some(first_value) = values.first() {
                attrs.set(name.clone(), AttributeValue::Binary(first_value.clone()));
            }
        }

        attrs
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
            bin_attrs: entry.bin_attrs,
        }
    }
}

/// Search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchScope {
    /// Only the base entry.
    Base,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and all its descendants.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// Bounded directory search.
#[async_trait]
pub trait DirectorySearch: Send + Sync {
    /// Search `base` and return at most `size_limit` entries (0 means no limit).
    ///
    /// An empty `attributes` list requests all user attributes. A missing
    /// base yields an empty result.
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        attributes: &[String],
        size_limit: usize,
    ) -> ConnectorResult<Vec<DirectoryEntry>>;
}

/// Resolution of a single entry.
#[async_trait]
pub trait EntryLookup: Send + Sync {
    /// Resolve the only entry matching `filter` under `base`.
    ///
    /// Returns `Ok(None)` when nothing matches and
    /// [`ConnectorError::AmbiguousEntry`] when more than one entry does.
    async fn lookup(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        attributes: &[String],
    ) -> ConnectorResult<Option<DirectoryEntry>>;
}

/// Access to attributes of the root DSE.
#[async_trait]
pub trait RootAttributes: Send + Sync {
    /// Fetch the named attributes of the root entry. Absent attributes are
    /// not present in the returned map.
    async fn root_attributes(&self, names: &[String]) -> ConnectorResult<HashMap<String, String>>;
}

/// Look up a root attribute by name, ignoring ASCII case.
pub fn root_attribute<'a>(attributes: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    attributes
        .get(name)
        .or_else(|| {
            attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// Directory accessed over LDAP.
///
/// A connection is opened and bound for every call and released afterwards;
/// no connection is held between changelog pages.
pub struct LdapDirectory {
    /// Configuration.
    config: LdapConfig,

    /// Display name for this connector instance.
    display_name: String,
}

impl LdapDirectory {
    /// Create a new directory client with the given configuration.
    pub fn new(config: LdapConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let display_name = format!("LDAP: {}", config.host);

        Ok(Self {
            config,
            display_name,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Open and bind a new LDAP connection.
    async fn connect(&self) -> ConnectorResult<Ldap> {
        let url = self.config.url();

        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection.connection_timeout())
            .set_starttls(self.config.use_starttls)
            .set_no_tls_verify(!self.config.tls.verify_certificate);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {url}"),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        let bind_password = self.config.bind_password.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let result = ldap
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("LDAP bind failed for {bind_dn}"),
                    e,
                )
            })?;

        match result.rc {
            RC_SUCCESS => Ok(ldap),
            RC_INVALID_CREDENTIALS => Err(ConnectorError::AuthenticationFailed),
            rc => Err(ConnectorError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                rc, result.text
            ))),
        }
    }

    /// Run one search on a fresh connection.
    async fn run_search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
        size_limit: usize,
    ) -> ConnectorResult<Vec<DirectoryEntry>> {
        let mut ldap = self.connect().await?;

        let attrs: Vec<&str> = if attributes.is_empty() {
            vec!["*"]
        } else {
            attributes.iter().map(String::as_str).collect()
        };
        let options = SearchOptions::new().sizelimit(i32::try_from(size_limit).unwrap_or(i32::MAX));

        let outcome = ldap
            .with_search_options(options)
            .with_timeout(self.config.connection.read_timeout())
            .search(base, scope.into(), filter, attrs)
            .await;

        if let Err(e) = ldap.unbind().await {
            warn!(error = %e, "Error during LDAP unbind");
        }

        let ldap3::SearchResult(entries, result) = outcome.map_err(|e| {
            ConnectorError::network_with_source(format!("LDAP search under '{base}' failed"), e)
        })?;

        match result.rc {
            RC_SUCCESS | RC_SIZE_LIMIT_EXCEEDED => Ok(entries
                .into_iter()
                .map(SearchEntry::construct)
                .map(DirectoryEntry::from)
                .collect()),
            RC_NO_SUCH_OBJECT => Ok(Vec::new()),
            RC_INVALID_CREDENTIALS => Err(ConnectorError::AuthenticationFailed),
            rc => Err(ConnectorError::operation_failed(format!(
                "LDAP search under '{}' failed with code {}: {}",
                base, rc, result.text
            ))),
        }
    }
}

#[async_trait]
impl DirectorySearch for LdapDirectory {
    #[instrument(skip(self, base, filter, attributes), fields(base = %base))]
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        attributes: &[String],
        size_limit: usize,
    ) -> ConnectorResult<Vec<DirectoryEntry>> {
        let ldap_filter = filter_to_ldap(filter);
        debug!(filter = %ldap_filter, size_limit, "Searching LDAP");

        let entries = self
            .run_search(base, scope, &ldap_filter, attributes, size_limit)
            .await?;

        debug!(returned = entries.len(), "LDAP search completed");
        Ok(entries)
    }
}

#[async_trait]
impl EntryLookup for LdapDirectory {
    #[instrument(skip(self, base, filter, attributes), fields(base = %base))]
    async fn lookup(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        attributes: &[String],
    ) -> ConnectorResult<Option<DirectoryEntry>> {
        let ldap_filter = filter_to_ldap(filter);
        let mut entries = self
            .run_search(base, scope, &ldap_filter, attributes, 2)
            .await?;

        if entries.len() > 1 {
            return Err(ConnectorError::AmbiguousEntry {
                base: base.to_string(),
                filter: ldap_filter,
                count: entries.len(),
            });
        }
        Ok(entries.pop())
    }
}

#[async_trait]
impl RootAttributes for LdapDirectory {
    #[instrument(skip(self))]
    async fn root_attributes(&self, names: &[String]) -> ConnectorResult<HashMap<String, String>> {
        let entries = self
            .run_search("", SearchScope::Base, "(objectClass=*)", names, 1)
            .await?;

        let mut attributes = HashMap::new();
        if let Some(root) = entries.into_iter().next() {
            for (name, values) in root.attrs {
                if let Some(first) = values.into_iter().next() {
                    attributes.insert(name, first);
                }
            }
        }
        Ok(attributes)
    }
}

#[async_trait]
impl Connector for LdapDirectory {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    #[instrument(skip(self))]
    async fn test_connection(&self) -> ConnectorResult<()> {
        let entries = self
            .run_search(
                &self.config.base_dn,
                SearchScope::Base,
                "(objectClass=*)",
                &["1.1".to_string()],
                1,
            )
            .await?;

        if entries.is_empty() {
            return Err(ConnectorError::connection_failed(format!(
                "Base DN '{}' not found or not accessible",
                self.config.base_dn
            )));
        }

        info!("LDAP connection test successful");
        Ok(())
    }

    async fn dispose(&self) -> ConnectorResult<()> {
        info!("LDAP directory disposed");
        Ok(())
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("display_name", &self.display_name)
            .field("config", &self.config.redacted())
            .finish()
    }
}
