//! Change number range of the directory change log.
//!
//! Most directories publish the oldest and newest retained change numbers on
//! the root DSE. Oracle Internet Directory only publishes the newest one, so
//! the oldest is read from the change log itself.

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::operation::Filter;

use crate::config::{ChangeLogConfig, ServiceType};
use crate::directory::{root_attribute, DirectorySearch, RootAttributes, SearchScope};

/// Object class of change log entries.
pub const CHANGE_LOG_ENTRY_CLASS: &str = "changeLogEntry";

/// Span of change numbers retained by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeNumberRange {
    /// Oldest retained change number.
    pub first: i64,
    /// Newest change number.
    pub last: i64,
}

impl ChangeNumberRange {
    /// Create a range.
    #[must_use]
    pub fn new(first: i64, last: i64) -> Self {
        Self { first, last }
    }
}

/// Parse a change number leniently.
///
/// Anything from the first `.` on is ignored. Values that still do not
/// parse yield `default`.
pub fn parse_change_number(value: &str, default: i64) -> i64 {
    let value = value.trim();
    let integral = match value.find('.') {
        Some(dot) if dot > 0 => &value[..dot],
        _ => value,
    };
    integral.parse().unwrap_or(default)
}

/// How the change number range is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorStrategy {
    /// Both numbers from the root DSE.
    Standard,
    /// Last number from the root DSE, first from the oldest change log entry.
    Fallback,
}

impl CursorStrategy {
    /// Pick the strategy for a directory product.
    #[must_use]
    pub fn for_service(service_type: ServiceType) -> Self {
        if service_type.exposes_first_change_number() {
            CursorStrategy::Standard
        } else {
            CursorStrategy::Fallback
        }
    }

    /// Compute the range with this strategy.
    pub async fn compute<D>(
        &self,
        directory: &D,
        config: &ChangeLogConfig,
    ) -> ConnectorResult<ChangeNumberRange>
    where
        D: DirectorySearch + RootAttributes + ?Sized,
    {
        match self {
            CursorStrategy::Standard => standard(directory, config).await,
            CursorStrategy::Fallback => fallback(directory, config).await,
        }
    }
}

/// Read both change numbers from the root DSE.
pub async fn standard<R>(root: &R, config: &ChangeLogConfig) -> ConnectorResult<ChangeNumberRange>
where
    R: RootAttributes + ?Sized,
{
    let names = vec![
        config.first_change_number_attribute.clone(),
        config.last_change_number_attribute.clone(),
    ];
    let attributes = root.root_attributes(&names).await?;

    let first = root_attribute(&attributes, &config.first_change_number_attribute)
        .ok_or_else(|| {
            ConnectorError::change_log_number_missing(&config.first_change_number_attribute)
        })?;
    let last = root_attribute(&attributes, &config.last_change_number_attribute)
        .ok_or_else(|| {
            ConnectorError::change_log_number_missing(&config.last_change_number_attribute)
        })?;

    Ok(ChangeNumberRange::new(
        parse_change_number(first, 0),
        parse_change_number(last, 0),
    ))
}

/// Read the last change number from the root DSE and the first one from the
/// oldest change log entry.
///
/// Servers do not return change log entries in any guaranteed order, so the
/// whole container is read with only the change number requested and the
/// lowest number wins.
pub async fn fallback<D>(directory: &D, config: &ChangeLogConfig) -> ConnectorResult<ChangeNumberRange>
where
    D: DirectorySearch + RootAttributes + ?Sized,
{
    let names = vec![config.last_change_number_attribute.clone()];
    let attributes = directory.root_attributes(&names).await?;
    let last = root_attribute(&attributes, &config.last_change_number_attribute)
        .ok_or_else(|| {
            ConnectorError::change_log_number_missing(&config.last_change_number_attribute)
        })?;

    let filter = Filter::eq("objectClass", CHANGE_LOG_ENTRY_CLASS);
    let entries = directory
        .search(
            &config.container,
            SearchScope::OneLevel,
            &filter,
            std::slice::from_ref(&config.change_number_attribute),
            0,
        )
        .await?;

    let first = entries
        .iter()
        .filter_map(|entry| entry.value(&config.change_number_attribute))
        .map(|value| parse_change_number(value, 0))
        .min()
        .ok_or_else(|| ConnectorError::change_log_number_missing(&config.change_number_attribute))?;

    Ok(ChangeNumberRange::new(first, parse_change_number(last, 0)))
}

/// Session cache of the change number range.
///
/// The range is computed on first use and kept until [`reset`](Self::reset).
/// The lock only guards populating the cache.
#[derive(Debug)]
pub struct ChangeNumberCursor {
    strategy: CursorStrategy,
    config: ChangeLogConfig,
    cached: Mutex<Option<ChangeNumberRange>>,
}

impl ChangeNumberCursor {
    /// Create a cursor using the strategy of the configured directory product.
    pub fn new(config: ChangeLogConfig) -> Self {
        let strategy = CursorStrategy::for_service(config.service_type);
        Self::with_strategy(config, strategy)
    }

    /// Create a cursor with an explicit strategy.
    pub fn with_strategy(config: ChangeLogConfig, strategy: CursorStrategy) -> Self {
        Self {
            strategy,
            config,
            cached: Mutex::new(None),
        }
    }

    /// Get the strategy in use.
    pub fn strategy(&self) -> CursorStrategy {
        self.strategy
    }

    /// Get the change number range, computing it on first use.
    #[instrument(skip(self, directory), fields(strategy = ?self.strategy))]
    pub async fn range<D>(&self, directory: &D) -> ConnectorResult<ChangeNumberRange>
    where
        D: DirectorySearch + RootAttributes + ?Sized,
    {
        let mut cached = self.cached.lock().await;
        if let Some(range) = *cached {
            debug!(first = range.first, last = range.last, "Using cached change number range");
            return Ok(range);
        }

        let range = self.strategy.compute(directory, &self.config).await?;
        info!(first = range.first, last = range.last, "Read change number range");
        *cached = Some(range);
        Ok(range)
    }

    /// Get the cached range without touching the directory.
    pub async fn cached(&self) -> Option<ChangeNumberRange> {
        *self.cached.lock().await
    }

    /// Forget the cached range.
    pub async fn reset(&self) {
        *self.cached.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_change_number() {
        assert_eq!(parse_change_number("42", 0), 42);
        assert_eq!(parse_change_number(" 42 ", 0), 42);
        assert_eq!(parse_change_number("42.0", 0), 42);
        assert_eq!(parse_change_number("17.9.3", 0), 17);
        assert_eq!(parse_change_number("abc", -1), -1);
        assert_eq!(parse_change_number("", 5), 5);
        assert_eq!(parse_change_number(".5", 3), 3);
    }

    #[test]
    fn test_strategy_for_service() {
        assert_eq!(CursorStrategy::for_service(ServiceType::Oid), CursorStrategy::Fallback);
        assert_eq!(CursorStrategy::for_service(ServiceType::Oud), CursorStrategy::Standard);
        assert_eq!(CursorStrategy::for_service(ServiceType::Dsee), CursorStrategy::Standard);
        assert_eq!(CursorStrategy::for_service(ServiceType::Any), CursorStrategy::Standard);
    }

    #[test]
    fn test_cursor_uses_configured_strategy() {
        let cursor = ChangeNumberCursor::new(
            ChangeLogConfig::default().with_service_type(ServiceType::Oid),
        );
        assert_eq!(cursor.strategy(), CursorStrategy::Fallback);
    }
}
