//! Rendering of [`Filter`] values as RFC 4515 filter strings.

use dirsync_connector::operation::Filter;

/// Convert a filter to its LDAP string form.
pub fn filter_to_ldap(filter: &Filter) -> String {
    match filter {
        Filter::And { filters } => {
            let inner: Vec<String> = filters.iter().map(filter_to_ldap).collect();
            format!("(&{})", inner.join(""))
        }
        Filter::Or { filters } => {
            let inner: Vec<String> = filters.iter().map(filter_to_ldap).collect();
            format!("(|{})", inner.join(""))
        }
        Filter::Equals { attribute, value } => {
            format!("({}={})", attribute, escape_ldap_value(value))
        }
        Filter::GreaterThanOrEquals { attribute, value } => {
            format!("({}>={})", attribute, escape_ldap_value(value))
        }
        Filter::LessThanOrEquals { attribute, value } => {
            format!("({}<={})", attribute, escape_ldap_value(value))
        }
        Filter::Present { attribute } => {
            format!("({}=*)", attribute)
        }
    }
}

/// Escape special characters in LDAP filter values (RFC 4515).
pub fn escape_ldap_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}
