//! Change log synchronization.
//!
//! [`ChangeLogSync`] walks the change log in windows of `page_size` change
//! numbers, resolves every record against the current state of the directory
//! and hands the resulting [`SyncDelta`] values to the caller in change order.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use dirsync_connector::config::ConnectorConfig;
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::operation::{ConnectorObject, Filter, Uid};
use dirsync_connector::traits::{
    SyncCompletion, SyncDelta, SyncOp, SyncResultsHandler, SyncSummary, SyncToken,
};

use crate::changelog::changes::{interpret_change, ChangeMap, ChangeType};
use crate::changelog::cursor::{
    parse_change_number, ChangeNumberCursor, ChangeNumberRange, CursorStrategy,
    CHANGE_LOG_ENTRY_CLASS,
};
use crate::config::LdapConfig;
use crate::directory::{
    DirectoryEntry, DirectorySearch, EntryLookup, LdapDirectory, RootAttributes, SearchScope,
};
use crate::dn::{compose_moved_dn, dn_equals, Rdn};

/// Change map keys holding the new RDN of a renamed entry.
const CHANGES_NEW_RDN: &[&str] = &["newRdn"];
/// Change map keys holding the new parent of a moved entry.
const CHANGES_NEW_SUPERIOR: &[&str] = &["newSuperior", "newSupDN"];
/// Attribute list requesting all user attributes.
const ALL_USER_ATTRIBUTES: &str = "*";

/// Incremental synchronization over a directory change log.
#[derive(Debug)]
pub struct ChangeLogSync<D> {
    directory: D,
    config: LdapConfig,
    cursor: ChangeNumberCursor,
}

impl ChangeLogSync<LdapDirectory> {
    /// Synchronize from an LDAP directory.
    pub fn ldap(config: LdapConfig) -> ConnectorResult<Self> {
        let directory = LdapDirectory::new(config.clone())?;
        Self::new(directory, config)
    }
}

impl<D> ChangeLogSync<D>
where
    D: DirectorySearch + EntryLookup + RootAttributes,
{
    /// Create a synchronizer reading `directory`.
    ///
    /// The cursor strategy follows `config.change_log.service_type`.
    pub fn new(directory: D, config: LdapConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let cursor = ChangeNumberCursor::new(config.change_log.clone());
        Ok(Self {
            directory,
            config,
            cursor,
        })
    }

    /// Override the cursor strategy.
    #[must_use]
    pub fn with_cursor_strategy(mut self, strategy: CursorStrategy) -> Self {
        self.cursor = ChangeNumberCursor::with_strategy(self.config.change_log.clone(), strategy);
        self
    }

    /// Get the directory.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Get the configuration.
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Get the change number cursor.
    pub fn cursor(&self) -> &ChangeNumberCursor {
        &self.cursor
    }

    /// Get the change number range retained by the directory.
    pub async fn range(&self) -> ConnectorResult<ChangeNumberRange> {
        self.cursor.range(&self.directory).await
    }

    /// Build the filter selecting change numbers in `[start, end)`.
    pub fn window_filter(&self, start: i64, end: i64) -> Filter {
        let change_log = &self.config.change_log;
        let attribute = change_log.change_number_attribute.as_str();

        let window = if change_log.filter_with_or {
            Filter::or(
                (start..end)
                    .map(|number| Filter::eq(attribute, number.to_string()))
                    .collect(),
            )
        } else {
            Filter::and(vec![
                Filter::ge(attribute, start.to_string()),
                Filter::le(attribute, (end - 1).to_string()),
            ])
        };

        if change_log.filter_with_object_class {
            Filter::and(vec![
                Filter::eq("objectClass", CHANGE_LOG_ENTRY_CLASS),
                window,
            ])
        } else {
            window
        }
    }

    /// Attributes read from every change record.
    fn record_attributes(&self) -> Vec<String> {
        let change_log = &self.config.change_log;
        let mut attributes = vec![
            change_log.change_number_attribute.clone(),
            change_log.change_type_attribute.clone(),
            change_log.target_dn_attribute.clone(),
            change_log.target_uid_attribute.clone(),
            change_log.changes_attribute.clone(),
            change_log.change_time_attribute.clone(),
            change_log.new_rdn_attribute.clone(),
            change_log.new_superior_attribute.clone(),
        ];
        attributes.extend(change_log.modifiers_attributes.iter().cloned());
        attributes
    }

    /// Fetch the change records numbered in `[start, end)`.
    #[instrument(skip(self), fields(container = %self.config.change_log.container))]
    async fn fetch_page(&self, start: i64, end: i64) -> ConnectorResult<Vec<DirectoryEntry>> {
        let filter = self.window_filter(start, end);
        let entries = self
            .directory
            .search(
                &self.config.change_log.container,
                SearchScope::OneLevel,
                &filter,
                &self.record_attributes(),
                self.page_size(),
            )
            .await?;

        debug!(returned = entries.len(), "Fetched changelog page");
        Ok(entries)
    }

    fn page_size(&self) -> usize {
        usize::try_from(self.config.page_size).unwrap_or(usize::MAX)
    }

    /// Resolve one change record into a change event.
    ///
    /// Returns `Ok(None)` when the record is skipped: no target DN, a change
    /// of the change log itself, an excluded modifier, an unknown change type
    /// or an entry that no longer exists.
    #[instrument(skip(self, number, record), fields(change_number = number))]
    pub async fn resolve(
        &self,
        number: i64,
        record: &DirectoryEntry,
    ) -> ConnectorResult<Option<SyncDelta>> {
        let change_log = &self.config.change_log;
        let token = SyncToken::new(number);

        let Some(target_dn) = record.value(&change_log.target_dn_attribute) else {
            error!(
                attribute = %change_log.target_dn_attribute,
                "Changelog record has no target DN, skipping"
            );
            return Ok(None);
        };

        if dn_equals(target_dn, &change_log.container) {
            debug!(target_dn = %target_dn, "Skipping change of the changelog container");
            return Ok(None);
        }

        let raw_type = record
            .value(&change_log.change_type_attribute)
            .unwrap_or_default();
        let change_type = match raw_type.parse::<ChangeType>() {
            Ok(change_type) => change_type,
            Err(e) => {
                warn!(target_dn = %target_dn, error = %e, "Skipping changelog record");
                return Ok(None);
            }
        };
        let timestamp = record
            .value(&change_log.change_time_attribute)
            .and_then(parse_change_time);

        if change_type == ChangeType::Delete {
            let object = self.deleted_object(record, target_dn);
            return Ok(Some(SyncDelta::delete(token, object).with_timestamp(timestamp)));
        }

        let changes = interpret_change(change_type, &changes_text(record, &change_log.changes_attribute));

        if let Some(modifier) = self.excluded_modifier(record, &changes) {
            debug!(target_dn = %target_dn, modifier = %modifier, "Skipping change made by excluded modifier");
            return Ok(None);
        }

        let effective_dn = if change_type.is_rename() {
            self.renamed_dn(record, target_dn, &changes)
        } else {
            target_dn.to_string()
        };

        let Some(object) = self.fetch_object(record, &effective_dn).await? else {
            info!(
                target_dn = %target_dn,
                dn = %effective_dn,
                "Entry no longer exists, skipping"
            );
            return Ok(None);
        };

        let previous_uid = if !change_type.is_rename() {
            None
        } else if self.config.uses_dn_identifier() {
            Some(Uid::from_dn(target_dn))
        } else {
            object.uid.clone()
        };

        Ok(Some(
            SyncDelta::create_or_update(token, object)
                .with_previous_uid(previous_uid)
                .with_timestamp(timestamp),
        ))
    }

    /// Build the object reported for a deleted entry.
    fn deleted_object(&self, record: &DirectoryEntry, target_dn: &str) -> ConnectorObject {
        let uid = self.identifier(record, target_dn, None);
        let object = ConnectorObject::new(self.config.account_object_class.clone(), target_dn)
            .with_uid(uid);

        match Rdn::parse(target_dn) {
            Some(rdn) => object.with_attribute(rdn.attribute, rdn.value),
            None => object,
        }
    }

    /// Identifier of the entry named `dn`.
    ///
    /// DN identifiers use `dn`. Otherwise the target unique id of the record
    /// is used, then the identifier attribute of the resolved entry.
    fn identifier(
        &self,
        record: &DirectoryEntry,
        dn: &str,
        entry: Option<&DirectoryEntry>,
    ) -> Option<Uid> {
        if self.config.uses_dn_identifier() {
            return Some(Uid::from_dn(dn));
        }

        let uid_attribute = &self.config.uid_attribute;
        let value = record
            .value(&self.config.change_log.target_uid_attribute)
            .or_else(|| entry.and_then(|entry| entry.value(uid_attribute)));

        match value {
            Some(value) => Some(Uid::new(uid_attribute.clone(), value)),
            None => {
                warn!(
                    dn = %dn,
                    attribute = %self.config.change_log.target_uid_attribute,
                    "Cannot resolve identifier of changed entry"
                );
                None
            }
        }
    }

    /// DN of the author of a change when it is one of the excluded modifiers.
    fn excluded_modifier(&self, record: &DirectoryEntry, changes: &ChangeMap) -> Option<String> {
        let change_log = &self.config.change_log;
        if change_log.excluded_modifiers.is_empty() {
            return None;
        }

        change_log
            .modifiers_attributes
            .iter()
            .flat_map(|attribute| {
                let mut modifiers: Vec<String> =
                    record.values(attribute).map(<[String]>::to_vec).unwrap_or_default();
                if let Some(values) = changes.values(attribute) {
                    modifiers.extend(
                        values
                            .iter()
                            .filter_map(|value| value.as_string())
                            .map(str::to_string),
                    );
                }
                modifiers
            })
            .find(|modifier| {
                change_log
                    .excluded_modifiers
                    .iter()
                    .any(|excluded| dn_equals(excluded, modifier))
            })
    }

    /// DN of an entry after a rename or move.
    fn renamed_dn(&self, record: &DirectoryEntry, target_dn: &str, changes: &ChangeMap) -> String {
        let change_log = &self.config.change_log;

        let new_rdn = record
            .value(&change_log.new_rdn_attribute)
            .or_else(|| first_change_value(changes, CHANGES_NEW_RDN));
        let new_superior = record
            .value(&change_log.new_superior_attribute)
            .or_else(|| first_change_value(changes, CHANGES_NEW_SUPERIOR));

        match new_rdn {
            Some(new_rdn) => compose_moved_dn(target_dn, new_rdn, new_superior),
            None => {
                warn!(target_dn = %target_dn, "Rename record carries no new RDN");
                target_dn.to_string()
            }
        }
    }

    /// Read the current state of the entry named `dn`.
    async fn fetch_object(
        &self,
        record: &DirectoryEntry,
        dn: &str,
    ) -> ConnectorResult<Option<ConnectorObject>> {
        let request = AttributeRequest::new(&self.config);
        let filter = Filter::present(self.config.object_class_attribute.clone());

        let Some(entry) = self
            .directory
            .lookup(dn, SearchScope::Base, &filter, &request.attributes)
            .await?
        else {
            return Ok(None);
        };

        let uid = self.identifier(record, entry.name(), Some(&entry));
        let enabled = self
            .config
            .status_attribute
            .as_deref()
            .map(|attribute| !entry.value(attribute).is_some_and(|v| v.eq_ignore_ascii_case("TRUE")));

        let mut attributes = entry.to_attribute_set();
        for temporary in &request.temporary {
            attributes.remove_ignore_case(temporary);
        }
        attributes.remove_ignore_case(&self.config.password_attribute);
        if let Some(rdn) = Rdn::parse(entry.name()) {
            if !attributes.has_ignore_case(&rdn.attribute) {
                attributes.set(rdn.attribute, rdn.value);
            }
        }

        let mut object = ConnectorObject::new(self.object_class_of(&entry), entry.name())
            .with_uid(uid)
            .with_enabled(enabled);
        object.attributes = attributes;
        Ok(Some(object))
    }

    /// Object class reported for a resolved entry.
    fn object_class_of(&self, entry: &DirectoryEntry) -> String {
        let account_class = &self.config.account_object_class;
        match entry.values(&self.config.object_class_attribute) {
            Some(classes) if !classes.iter().any(|c| c.eq_ignore_ascii_case(account_class)) => {
                classes.last().cloned().unwrap_or_else(|| account_class.clone())
            }
            _ => account_class.clone(),
        }
    }
}

/// Attributes requested when resolving a changed entry.
#[derive(Debug, Default, PartialEq, Eq)]
struct AttributeRequest {
    /// Names sent to the directory.
    attributes: Vec<String>,
    /// Names requested only to evaluate the entry.
    temporary: Vec<String>,
}

impl AttributeRequest {
    fn new(config: &LdapConfig) -> Self {
        let mut request = AttributeRequest::default();
        let wildcard = config.attributes_to_get.is_empty();

        if wildcard {
            request.attributes.push(ALL_USER_ATTRIBUTES.to_string());
        } else {
            request.attributes.extend(
                config
                    .attributes_to_get
                    .iter()
                    .filter(|name| !name.eq_ignore_ascii_case(&config.password_attribute))
                    .cloned(),
            );
        }

        if !wildcard {
            request.add_temporary(&config.object_class_attribute);
        }
        if let Some(status) = &config.status_attribute {
            request.add_temporary(status);
        }
        if !config.uses_dn_identifier() {
            request.add_temporary(&config.uid_attribute);
        }

        request
    }

    fn add_temporary(&mut self, name: &str) {
        if self.attributes.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            return;
        }
        self.attributes.push(name.to_string());
        self.temporary.push(name.to_string());
    }
}

/// Text of the `changes` attribute, which some directories return as binary.
fn changes_text(record: &DirectoryEntry, attribute: &str) -> String {
    if let Some(text) = record.value(attribute) {
        return text.to_string();
    }
    record
        .bin_attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
        .and_then(|(_, values)| values.first())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

fn first_change_value<'a>(changes: &'a ChangeMap, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| changes.first_string(name))
}

/// Parse a generalized time such as `20240131154500Z` or `20240131154500.123Z`.
pub fn parse_change_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_end_matches(['Z', 'z']);
    let value = value.split(['.', ',']).next()?;
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S")
        .ok()
        .map(|time| time.and_utc())
}

#[async_trait]
impl<D> SyncOp for ChangeLogSync<D>
where
    D: DirectorySearch + EntryLookup + RootAttributes,
{
    #[instrument(skip(self, handler))]
    async fn sync(
        &self,
        token: Option<SyncToken>,
        handler: &mut dyn SyncResultsHandler,
    ) -> ConnectorResult<SyncSummary> {
        // A token older than the retained range resumes at the oldest change.
        let first = self.range().await?.first;
        let mut start = match token {
            Some(token) if token.value() < first => {
                warn!(token = token.value(), first, "Sync token precedes retained changelog");
                first
            }
            Some(token) => token.value(),
            None => first,
        };
        let page_size = i64::from(self.config.page_size);
        let mut summary = SyncSummary::default();

        info!(start, page_size, "Starting changelog synchronization");

        loop {
            let end = start.saturating_add(page_size);
            let page = match self.fetch_page(start, end).await {
                Ok(page) => page,
                Err(e) => {
                    error!(start, error = %e, "Changelog page fetch failed");
                    let last_token = summary.last_token.map(|t| t.value());
                    return Err(ConnectorError::sync_interrupted(last_token, e));
                }
            };
            summary.pages += 1;

            if page.is_empty() {
                break;
            }

            let mut records = Vec::with_capacity(page.len());
            for record in page {
                let number = record
                    .value(&self.config.change_log.change_number_attribute)
                    .map(|value| parse_change_number(value, i64::MIN))
                    .filter(|number| (start..end).contains(number));
                match number {
                    Some(number) => records.push((number, record)),
                    None => {
                        warn!(dn = %record.name(), start, end, "Skipping changelog record outside window");
                        summary.examined += 1;
                        summary.record_skip();
                    }
                }
            }
            records.sort_by_key(|(number, _)| *number);

            let mut advance: Option<i64> = None;
            for (number, record) in &records {
                advance = Some(advance.map_or(*number, |a| a.max(*number)));
                summary.examined += 1;

                let delta = match self.resolve(*number, record).await {
                    Ok(Some(delta)) => delta,
                    Ok(None) => {
                        summary.record_skip();
                        continue;
                    }
                    Err(e @ ConnectorError::AmbiguousEntry { .. }) => return Err(e),
                    Err(e) => {
                        error!(change_number = number, error = %e, "Changelog record resolution failed");
                        let last_token = summary.last_token.map(|t| t.value());
                        return Err(ConnectorError::sync_interrupted(last_token, e));
                    }
                };

                summary.record_emitted(delta.token);
                if !handler.handle(delta) {
                    info!(change_number = number, "Handler stopped synchronization");
                    summary.completion = SyncCompletion::StoppedByHandler;
                    return Ok(summary);
                }
            }

            match advance {
                Some(advance) if advance >= start => start = advance + 1,
                _ => break,
            }
        }

        info!(
            pages = summary.pages,
            examined = summary.examined,
            emitted = summary.emitted,
            skipped = summary.skipped,
            "Changelog synchronization completed"
        );
        Ok(summary)
    }

    #[instrument(skip(self))]
    async fn latest_sync_token(&self) -> ConnectorResult<SyncToken> {
        Ok(SyncToken::new(self.range().await?.last))
    }
}
