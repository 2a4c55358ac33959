//! Caller-facing operations
//!
//! [`CirculationDesk`] wires the locator and the services together and
//! exposes each operation by name. Every operation returns a [`Response`]
//! envelope instead of an error, so presentation layers can render results
//! uniformly; [`Response::into_result`] turns a failed envelope back into an
//! `Err` for callers that prefer one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::backend::{CsvCatalog, CsvWorkbook, ResourceCatalog, Workbook};
use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, LoanConfig};
use crate::error::{CirculationError, Result};
use crate::items::{ItemService, ItemUpdate, NewItem};
use crate::locator::{Discovery, ResourceLocator};
use crate::members::{MemberService, MemberUpdate, NewMember};
use crate::record::{Item, ItemStatus, Member, MemberStatus, Transaction};
use crate::schema::EntityKind;
use crate::settings::{ConfigStore, TomlConfigStore};
use crate::store::{HeaderRepair, RecordStore};
use crate::transactions::{LoanOutcome, TransactionService};

/// Envelope returned by every desk operation
#[derive(Debug, Clone, Serialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// A failed [`Response`] turned into an error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ResponseError {
    pub code: &'static str,
    pub message: String,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self::ok_with_warning(data, None)
    }

    pub fn ok_with_warning(data: T, warning: Option<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            warning,
        }
    }

    pub fn failed(err: &CirculationError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            code: Some(err.code()),
            warning: None,
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(&e),
        }
    }

    /// Data on success, the error message otherwise
    pub fn into_result(self) -> std::result::Result<T, ResponseError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) => Err(ResponseError {
                code: self.code.unwrap_or("UNKNOWN"),
                message: self.error.unwrap_or_else(|| "operation returned no data".to_string()),
            }),
        }
    }
}

impl Response<LoanOutcome> {
    /// Lift the outcome's warning into the envelope
    fn from_outcome(result: Result<LoanOutcome>) -> Self {
        match result {
            Ok(outcome) => {
                let warning = outcome.warning.clone();
                Self::ok_with_warning(outcome, warning)
            }
            Err(e) => Self::failed(&e),
        }
    }
}

/// Stored addresses and when they were last resolved
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryStatus {
    pub addresses: BTreeMap<EntityKind, Option<String>>,
    pub last_discovery: Option<DateTime<Utc>>,
}

pub struct CirculationDesk {
    locator: ResourceLocator,
    members: MemberService,
    items: ItemService,
    transactions: TransactionService,
    loans: LoanConfig,
}

impl CirculationDesk {
    /// Wire services over explicit backends
    pub fn new(
        workbook: Arc<dyn Workbook>,
        catalog: Arc<dyn ResourceCatalog>,
        settings: Arc<dyn ConfigStore>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        let locator = ResourceLocator::new(catalog, settings).with_clock(clock.clone());
        let locator = EntityKind::ALL.iter().fold(locator, |locator, kind| {
            locator.with_prefix(*kind, config.discovery.prefix(*kind))
        });
        let store = |kind| RecordStore::new(kind, locator.clone(), workbook.clone());

        let members = MemberService::new(store(EntityKind::Member), clock.clone());
        let items = ItemService::new(store(EntityKind::Item));
        let transactions = TransactionService::new(
            store(EntityKind::Transaction),
            members.clone(),
            items.clone(),
            clock,
        );

        Self {
            locator,
            members,
            items,
            transactions,
            loans: config.loans.clone(),
        }
    }

    /// Desk over the CSV directory and state file named in `config`
    pub fn open(config: &AppConfig) -> Result<Self> {
        let settings = TomlConfigStore::open(&config.state.path)?;
        info!(
            root = %config.storage.root.display(),
            state = %settings.path().display(),
            "opening circulation desk"
        );
        Ok(Self::new(
            Arc::new(CsvWorkbook::new(&config.storage.root)),
            Arc::new(CsvCatalog::new(&config.storage.root)),
            Arc::new(settings),
            Arc::new(SystemClock),
            config,
        ))
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    pub fn members(&self) -> &MemberService {
        &self.members
    }

    pub fn items(&self) -> &ItemService {
        &self.items
    }

    pub fn transactions(&self) -> &TransactionService {
        &self.transactions
    }

    // Discovery

    /// Resolve every kind. Succeeds when at least one kind resolves, with a
    /// warning naming any that did not.
    pub fn discover(&self) -> Response<Discovery> {
        let discovery = self.locator.locate_all(&EntityKind::ALL);
        if discovery.resolved.is_empty() {
            let message = discovery
                .warning()
                .unwrap_or_else(|| "No resources located".to_string());
            return Response {
                success: false,
                data: None,
                error: Some(message),
                code: Some("NOT_FOUND"),
                warning: None,
            };
        }
        let warning = discovery.warning();
        Response::ok_with_warning(discovery, warning)
    }

    pub fn discovery_status(&self) -> Response<DiscoveryStatus> {
        Response::from_result(self.locator.last_discovery().map(|last_discovery| {
            let addresses = EntityKind::ALL
                .iter()
                .map(|kind| (*kind, self.locator.address(*kind).ok()))
                .collect();
            DiscoveryStatus {
                addresses,
                last_discovery,
            }
        }))
    }

    /// Write or repair the header row of every resource
    pub fn ensure_headers(&self) -> Response<BTreeMap<EntityKind, HeaderRepair>> {
        Response::from_result(self.repair_headers())
    }

    fn repair_headers(&self) -> Result<BTreeMap<EntityKind, HeaderRepair>> {
        let mut repairs = BTreeMap::new();
        repairs.insert(EntityKind::Member, self.members.store().ensure_headers()?);
        repairs.insert(EntityKind::Item, self.items.store().ensure_headers()?);
        repairs.insert(
            EntityKind::Transaction,
            self.transactions.store().ensure_headers()?,
        );
        Ok(repairs)
    }

    pub fn has_access(&self, identity: &str, kind: EntityKind) -> Response<bool> {
        Response::from_result(self.locator.has_access(identity, kind))
    }

    // Members

    pub fn list_members(&self) -> Response<Vec<Member>> {
        Response::from_result(self.members.list())
    }

    pub fn get_member(&self, id: &str) -> Response<Member> {
        Response::from_result(self.members.get(id))
    }

    pub fn create_member(&self, new: NewMember) -> Response<Member> {
        Response::from_result(self.members.create(new))
    }

    pub fn update_member(&self, id: &str, changes: &MemberUpdate) -> Response<Member> {
        Response::from_result(self.members.update(id, changes))
    }

    pub fn delete_member(&self, id: &str) -> Response<()> {
        Response::from_result(self.members.delete(id))
    }

    pub fn search_members(&self, query: &str) -> Response<Vec<Member>> {
        Response::from_result(self.members.search(query))
    }

    pub fn members_by_status(&self, status: MemberStatus) -> Response<Vec<Member>> {
        Response::from_result(self.members.by_status(status))
    }

    pub fn member_in_good_standing(&self, id: &str) -> Response<bool> {
        Response::from_result(self.members.is_in_good_standing(id))
    }

    // Items

    pub fn list_items(&self) -> Response<Vec<Item>> {
        Response::from_result(self.items.list())
    }

    pub fn get_item(&self, id: &str) -> Response<Item> {
        Response::from_result(self.items.get(id))
    }

    pub fn create_item(&self, new: NewItem) -> Response<Item> {
        Response::from_result(self.items.create(new))
    }

    pub fn update_item(&self, id: &str, changes: &ItemUpdate) -> Response<Item> {
        Response::from_result(self.items.update(id, changes))
    }

    pub fn delete_item(&self, id: &str) -> Response<()> {
        Response::from_result(self.items.delete(id))
    }

    pub fn search_items(&self, query: &str) -> Response<Vec<Item>> {
        Response::from_result(self.items.search(query))
    }

    pub fn items_by_status(&self, status: ItemStatus) -> Response<Vec<Item>> {
        Response::from_result(self.items.by_status(status))
    }

    pub fn item_available(&self, id: &str) -> Response<bool> {
        Response::from_result(self.items.is_available(id))
    }

    // Loans

    /// Check out for `period_days`, or the configured default period
    pub fn checkout(&self, member_id: &str, item_id: &str, period_days: Option<u32>) -> Response<Transaction> {
        let days = period_days.unwrap_or(self.loans.default_period_days);
        Response::from_result(self.transactions.checkout(member_id, item_id, days))
    }

    pub fn process_return(&self, transaction_id: &str) -> Response<LoanOutcome> {
        Response::from_outcome(self.transactions.process_return(transaction_id))
    }

    /// Extend by `additional_days`, or the configured default extension
    pub fn extend(&self, transaction_id: &str, additional_days: Option<u32>) -> Response<Transaction> {
        let days = additional_days.unwrap_or(self.loans.default_extension_days);
        Response::from_result(self.transactions.extend(transaction_id, days))
    }

    pub fn mark_lost(&self, transaction_id: &str) -> Response<LoanOutcome> {
        Response::from_outcome(self.transactions.mark_lost(transaction_id))
    }

    pub fn update_overdue_statuses(&self) -> Response<usize> {
        Response::from_result(self.transactions.update_overdue_statuses())
    }

    pub fn list_transactions(&self) -> Response<Vec<Transaction>> {
        Response::from_result(self.transactions.list())
    }

    pub fn get_transaction(&self, id: &str) -> Response<Transaction> {
        Response::from_result(self.transactions.get(id))
    }

    pub fn active_loans(&self) -> Response<Vec<Transaction>> {
        Response::from_result(self.transactions.active())
    }

    pub fn overdue_loans(&self) -> Response<Vec<Transaction>> {
        Response::from_result(self.transactions.overdue())
    }

    pub fn member_loans(&self, member_id: &str) -> Response<Vec<Transaction>> {
        Response::from_result(self.transactions.open_for_member(member_id))
    }

    pub fn item_current_loan(&self, item_id: &str) -> Response<Option<Transaction>> {
        Response::from_result(self.transactions.current_for_item(item_id))
    }

    pub fn member_history(&self, member_id: &str) -> Response<Vec<Transaction>> {
        Response::from_result(self.transactions.history_for_member(member_id))
    }

    pub fn item_history(&self, item_id: &str) -> Response<Vec<Transaction>> {
        Response::from_result(self.transactions.history_for_item(item_id))
    }
}
