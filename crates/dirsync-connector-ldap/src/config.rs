//! LDAP Connector configuration
//!
//! Configuration types for the directory connection and its change log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use dirsync_connector::config::{ConnectionSettings, ConnectorConfig, TlsConfig};
use dirsync_connector::error::{ConnectorError, ConnectorResult};

/// Attribute names that give an identifier Distinguished Name semantics.
const DN_IDENTIFIER_NAMES: &[&str] = &["dn", "distinguishedName", "entryDN", "__NAME__"];

/// Configuration for the LDAP connector.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server hostname or IP address.
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Base DN of the synchronized entries (e.g., "dc=example,dc=com").
    pub base_dn: String,

    /// Bind DN for authentication (e.g., "cn=admin,dc=example,dc=com").
    pub bind_dn: String,

    /// Bind password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Connection settings (timeouts).
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// TLS configuration.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Attribute used as the unique identifier of an entry.
    ///
    /// `dn` (or `distinguishedName`, `entryDN`) makes the DN the identifier.
    #[serde(default = "default_uid_attribute")]
    pub uid_attribute: String,

    /// Object class reported for resolved entries.
    #[serde(default = "default_account_object_class")]
    pub account_object_class: String,

    /// Name of the object class attribute.
    #[serde(default = "default_object_class_attribute")]
    pub object_class_attribute: String,

    /// Attribute flagging a disabled account (e.g., `ds-pwp-account-disabled`).
    /// A value of `TRUE` marks the account disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_attribute: Option<String>,

    /// Attribute holding the account password. Never returned by reads.
    #[serde(default = "default_password_attribute")]
    pub password_attribute: String,

    /// Attributes requested when resolving a changed entry. Empty means all
    /// user attributes.
    #[serde(default)]
    pub attributes_to_get: Vec<String>,

    /// Number of change numbers requested per changelog page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Change log layout of the directory.
    #[serde(default)]
    pub change_log: ChangeLogConfig,
}

impl fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("connection", &self.connection)
            .field("tls", &self.tls)
            .field("uid_attribute", &self.uid_attribute)
            .field("account_object_class", &self.account_object_class)
            .field("object_class_attribute", &self.object_class_attribute)
            .field("status_attribute", &self.status_attribute)
            .field("password_attribute", &self.password_attribute)
            .field("attributes_to_get", &self.attributes_to_get)
            .field("page_size", &self.page_size)
            .field("change_log", &self.change_log)
            .finish()
    }
}

fn default_ldap_port() -> u16 {
    389
}

fn default_uid_attribute() -> String {
    "entryUUID".to_string()
}

fn default_account_object_class() -> String {
    "inetOrgPerson".to_string()
}

fn default_object_class_attribute() -> String {
    "objectClass".to_string()
}

fn default_password_attribute() -> String {
    "userPassword".to_string()
}

fn default_page_size() -> u32 {
    100
}

impl LdapConfig {
    /// Create a new LDAP config with required fields.
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            base_dn: base_dn.into(),
            bind_dn: bind_dn.into(),
            bind_password: None,
            connection: ConnectionSettings::default(),
            tls: TlsConfig::default(),
            uid_attribute: default_uid_attribute(),
            account_object_class: default_account_object_class(),
            object_class_attribute: default_object_class_attribute(),
            status_attribute: None,
            password_attribute: default_password_attribute(),
            attributes_to_get: Vec::new(),
            page_size: default_page_size(),
            change_log: ChangeLogConfig::default(),
        }
    }

    /// Set bind password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Set the identifier attribute.
    pub fn with_uid_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.uid_attribute = attribute.into();
        self
    }

    /// Set the status attribute.
    pub fn with_status_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.status_attribute = Some(attribute.into());
        self
    }

    /// Set the changelog page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the change log layout.
    #[must_use]
    pub fn with_change_log(mut self, change_log: ChangeLogConfig) -> Self {
        self.change_log = change_log;
        self
    }

    /// Whether the identifier of an entry is its Distinguished Name.
    #[must_use]
    pub fn uses_dn_identifier(&self) -> bool {
        DN_IDENTIFIER_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&self.uid_attribute))
    }

    /// Whether the connection is encrypted, by LDAPS or STARTTLS.
    pub fn uses_tls(&self) -> bool {
        self.use_ssl || self.use_starttls
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl ConnectorConfig for LdapConfig {
    fn validate(&self) -> ConnectorResult<()> {
        if self.host.is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "host is required".to_string(),
            });
        }

        if self.base_dn.is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "base_dn is required".to_string(),
            });
        }

        if self.use_ssl && self.use_starttls {
            return Err(ConnectorError::InvalidConfiguration {
                message: "cannot use both SSL and STARTTLS".to_string(),
            });
        }

        if self.page_size == 0 {
            return Err(ConnectorError::InvalidConfiguration {
                message: "page_size must be greater than zero".to_string(),
            });
        }

        for (field, value) in [
            ("uid_attribute", &self.uid_attribute),
            ("object_class_attribute", &self.object_class_attribute),
            ("password_attribute", &self.password_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(ConnectorError::InvalidConfiguration {
                    message: format!("{field} must not be empty"),
                });
            }
        }

        self.tls.validate_security(self.uses_tls());
        self.change_log.validate()
    }

    fn get_credentials(&self) -> Vec<(&'static str, String)> {
        match &self.bind_password {
            Some(password) => vec![("bind_password", password.clone())],
            None => vec![],
        }
    }

    fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.bind_password.is_some() {
            config.bind_password = Some("***REDACTED***".to_string());
        }
        config
    }
}

/// Directory product, used to pick vendor-specific behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// Any RFC compliant directory.
    Any,
    /// Oracle Unified Directory.
    #[default]
    Oud,
    /// Oracle Internet Directory. Its root DSE has no first change number.
    Oid,
    /// Active Directory Domain Services.
    Ads,
    /// Active Directory Lightweight Directory Services.
    Lds,
    /// Oracle Directory Server Enterprise Edition.
    Dsee,
}

impl ServiceType {
    /// Whether the root DSE publishes the first change number.
    #[must_use]
    pub fn exposes_first_change_number(&self) -> bool {
        !matches!(self, ServiceType::Oid)
    }

    /// Get the configuration string for this service type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Any => "any",
            ServiceType::Oud => "oud",
            ServiceType::Oid => "oid",
            ServiceType::Ads => "ads",
            ServiceType::Lds => "lds",
            ServiceType::Dsee => "dsee",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(ServiceType::Any),
            "oud" => Ok(ServiceType::Oud),
            "oid" => Ok(ServiceType::Oid),
            "ads" => Ok(ServiceType::Ads),
            "lds" => Ok(ServiceType::Lds),
            "dsee" => Ok(ServiceType::Dsee),
            _ => Err(ConnectorError::InvalidConfiguration {
                message: format!(
                    "invalid service type '{s}', expected one of: any, oud, oid, ads, lds, dsee"
                ),
            }),
        }
    }
}

/// Layout of the directory change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogConfig {
    /// DN of the change log container.
    #[serde(default = "default_container")]
    pub container: String,

    /// Sequence number attribute of a change record.
    #[serde(default = "default_change_number_attribute")]
    pub change_number_attribute: String,

    /// Change type attribute of a change record.
    #[serde(default = "default_change_type_attribute")]
    pub change_type_attribute: String,

    /// Attribute naming the DN of the changed entry.
    #[serde(default = "default_target_dn_attribute")]
    pub target_dn_attribute: String,

    /// Attribute carrying the unique id of the changed entry.
    #[serde(default = "default_target_uid_attribute")]
    pub target_uid_attribute: String,

    /// Attribute carrying the LDIF of the change.
    #[serde(default = "default_changes_attribute")]
    pub changes_attribute: String,

    /// Attribute carrying the time of the change.
    #[serde(default = "default_change_time_attribute")]
    pub change_time_attribute: String,

    /// Root DSE attribute holding the oldest retained change number.
    #[serde(default = "default_first_change_number_attribute")]
    pub first_change_number_attribute: String,

    /// Root DSE attribute holding the newest change number.
    #[serde(default = "default_last_change_number_attribute")]
    pub last_change_number_attribute: String,

    /// New RDN attribute of a rename record.
    #[serde(default = "default_new_rdn_attribute")]
    pub new_rdn_attribute: String,

    /// New superior attribute of a rename record.
    #[serde(default = "default_new_superior_attribute")]
    pub new_superior_attribute: String,

    /// Directory product.
    #[serde(default)]
    pub service_type: ServiceType,

    /// Window filter as one equality clause per change number.
    /// `false` uses a `>=`/`<=` range instead.
    #[serde(default = "default_true")]
    pub filter_with_or: bool,

    /// Restrict the window filter to `(objectClass=changeLogEntry)`.
    #[serde(default = "default_true")]
    pub filter_with_object_class: bool,

    /// DNs whose changes are ignored.
    #[serde(default)]
    pub excluded_modifiers: Vec<String>,

    /// Change map attributes naming the author of a change.
    #[serde(default = "default_modifiers_attributes")]
    pub modifiers_attributes: Vec<String>,
}

fn default_container() -> String {
    "cn=changelog".to_string()
}

fn default_change_number_attribute() -> String {
    "changeNumber".to_string()
}

fn default_change_type_attribute() -> String {
    "changeType".to_string()
}

fn default_target_dn_attribute() -> String {
    "targetDN".to_string()
}

fn default_target_uid_attribute() -> String {
    "targetGUID".to_string()
}

fn default_changes_attribute() -> String {
    "changes".to_string()
}

fn default_change_time_attribute() -> String {
    "changeTime".to_string()
}

fn default_first_change_number_attribute() -> String {
    "firstChangeNumber".to_string()
}

fn default_last_change_number_attribute() -> String {
    "lastChangeNumber".to_string()
}

fn default_new_rdn_attribute() -> String {
    "newRDN".to_string()
}

fn default_new_superior_attribute() -> String {
    "newSuperior".to_string()
}

fn default_modifiers_attributes() -> Vec<String> {
    vec!["modifiersName".to_string(), "creatorsName".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for ChangeLogConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            change_number_attribute: default_change_number_attribute(),
            change_type_attribute: default_change_type_attribute(),
            target_dn_attribute: default_target_dn_attribute(),
            target_uid_attribute: default_target_uid_attribute(),
            changes_attribute: default_changes_attribute(),
            change_time_attribute: default_change_time_attribute(),
            first_change_number_attribute: default_first_change_number_attribute(),
            last_change_number_attribute: default_last_change_number_attribute(),
            new_rdn_attribute: default_new_rdn_attribute(),
            new_superior_attribute: default_new_superior_attribute(),
            service_type: ServiceType::default(),
            filter_with_or: true,
            filter_with_object_class: true,
            excluded_modifiers: Vec::new(),
            modifiers_attributes: default_modifiers_attributes(),
        }
    }
}

impl ChangeLogConfig {
    /// Set the directory product.
    #[must_use]
    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    /// Ignore changes made by the given DN.
    pub fn exclude_modifier(mut self, dn: impl Into<String>) -> Self {
        self.excluded_modifiers.push(dn.into());
        self
    }

    /// Validate the change log layout.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.container.trim().is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "change_log.container is required".to_string(),
            });
        }

        for (field, value) in [
            ("change_number_attribute", &self.change_number_attribute),
            ("change_type_attribute", &self.change_type_attribute),
            ("target_dn_attribute", &self.target_dn_attribute),
            ("target_uid_attribute", &self.target_uid_attribute),
            ("changes_attribute", &self.changes_attribute),
            (
                "first_change_number_attribute",
                &self.first_change_number_attribute,
            ),
            (
                "last_change_number_attribute",
                &self.last_change_number_attribute,
            ),
        ] {
            if value.trim().is_empty() {
                return Err(ConnectorError::InvalidConfiguration {
                    message: format!("change_log.{field} must not be empty"),
                });
            }
        }

        Ok(())
    }
}
