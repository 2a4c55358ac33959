//! Transaction Service
//!
//! Loans move through a small state machine:
//!
//! ```text
//! active ──return──▶ returned
//!   │  ╲
//!   │   ╲──sweep──▶ overdue ──return──▶ returned
//!   │                  │
//!   └──────lost────────┴──────────────▶ lost
//! ```
//!
//! `returned` and `lost` are terminal. Loans are only ever opened through
//! [`TransactionService::checkout`], which is where the availability rule is
//! enforced.
//!
//! Checkout writes two resources: the new loan row, then the item's status.
//! If the item write fails the loan row is deleted again and the item error
//! is returned. Return and lost-marking write the loan first and the item
//! second; an item failure there is reported as a warning and the loan
//! change stands.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{CirculationError, Result};
use crate::items::ItemService;
use crate::members::MemberService;
use crate::record::{format_date, Entity, ItemStatus, Record, Transaction, TransactionStatus};
use crate::store::RecordStore;
use crate::validator::Validator;

/// A loan state change plus any non-fatal problem on the item side
#[derive(Debug, Clone, Serialize)]
pub struct LoanOutcome {
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Clone)]
pub struct TransactionService {
    store: RecordStore,
    members: MemberService,
    items: ItemService,
    validator: Validator,
    clock: Arc<dyn Clock>,
}

impl TransactionService {
    pub fn new(
        store: RecordStore,
        members: MemberService,
        items: ItemService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            members,
            items,
            validator: Validator::new(),
            clock,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Lend `item_id` to `member_id` for `period_days` calendar days
    pub fn checkout(&self, member_id: &str, item_id: &str, period_days: u32) -> Result<Transaction> {
        let member = self.members.get(member_id)?;
        if !member.is_in_good_standing() {
            return Err(CirculationError::PreconditionFailed(format!(
                "Member '{}' is not in good standing (status: {})",
                member.name, member.status
            )));
        }

        let item = self.items.get(item_id)?;
        if !item.is_available() {
            return Err(CirculationError::PreconditionFailed(format!(
                "Item '{}' is not available (status: {})",
                item.title, item.status
            )));
        }

        let checkout_date = self.clock.today();
        let due_date = add_days(checkout_date, period_days)?;
        let record = Record::new()
            .with("memberId", member_id)
            .with("itemId", item_id)
            .with("checkoutDate", format_date(checkout_date))
            .with("dueDate", format_date(due_date))
            .with("returnDate", "")
            .with("status", TransactionStatus::Active.as_str());
        self.validator.validate_transaction(&record).into_result()?;

        let created = Transaction::from_record(&self.store.create(record)?)?;

        if let Err(e) = self.items.set_status(item_id, ItemStatus::OnLoan) {
            warn!(transaction = %created.id, item = %item_id, "item update failed, rolling back checkout: {}", e);
            if let Err(rollback) = self.store.delete(&created.id) {
                warn!(transaction = %created.id, "rollback delete failed: {}", rollback);
            }
            return Err(e);
        }

        info!(
            transaction = %created.id,
            member = %member_id,
            item = %item_id,
            due = %created.due_date,
            "checked out"
        );
        Ok(created)
    }

    /// Close a loan and put the item back on the shelf
    pub fn process_return(&self, transaction_id: &str) -> Result<LoanOutcome> {
        let current: Transaction = self.store.load(transaction_id)?;
        match current.status {
            TransactionStatus::Returned => {
                return Err(CirculationError::PreconditionFailed(format!(
                    "Transaction {} has already been returned",
                    transaction_id
                )))
            }
            TransactionStatus::Lost => {
                return Err(CirculationError::PreconditionFailed(format!(
                    "Transaction {} was marked lost and cannot be returned",
                    transaction_id
                )))
            }
            TransactionStatus::Active | TransactionStatus::Overdue => {}
        }

        let partial = Record::new()
            .with("returnDate", format_date(self.clock.today()))
            .with("status", TransactionStatus::Returned.as_str());
        let transaction = Transaction::from_record(&self.store.update(transaction_id, &partial)?)?;
        let warning = self.item_side(&transaction, ItemStatus::Available);

        info!(transaction = %transaction_id, "returned");
        Ok(LoanOutcome {
            transaction,
            warning,
        })
    }

    /// Push the due date of an active loan back by `additional_days`
    pub fn extend(&self, transaction_id: &str, additional_days: u32) -> Result<Transaction> {
        let current: Transaction = self.store.load(transaction_id)?;
        if current.status != TransactionStatus::Active {
            return Err(CirculationError::PreconditionFailed(format!(
                "Only active loans can be extended (transaction {} is {})",
                transaction_id, current.status
            )));
        }
        if additional_days == 0 {
            return Err(CirculationError::ValidationFailed(vec![
                "Additional days must be greater than zero".to_string(),
            ]));
        }

        let due_date = add_days(current.due_date, additional_days)?;
        let partial = Record::new().with("dueDate", format_date(due_date));
        let transaction = Transaction::from_record(&self.store.update(transaction_id, &partial)?)?;

        info!(transaction = %transaction_id, due = %transaction.due_date, "extended");
        Ok(transaction)
    }

    /// Close an open loan as lost and flag the item
    pub fn mark_lost(&self, transaction_id: &str) -> Result<LoanOutcome> {
        let current: Transaction = self.store.load(transaction_id)?;
        if current.status.is_terminal() {
            return Err(CirculationError::PreconditionFailed(format!(
                "Transaction {} is already closed ({})",
                transaction_id, current.status
            )));
        }

        let partial = Record::new().with("status", TransactionStatus::Lost.as_str());
        let transaction = Transaction::from_record(&self.store.update(transaction_id, &partial)?)?;
        let warning = self.item_side(&transaction, ItemStatus::Lost);

        info!(transaction = %transaction_id, "marked lost");
        Ok(LoanOutcome {
            transaction,
            warning,
        })
    }

    /// Move every active loan due before today to `overdue`. Returns how many
    /// rows were actually updated; a failing row is logged and skipped.
    pub fn update_overdue_statuses(&self) -> Result<usize> {
        let today = self.clock.today();
        let partial = Record::new().with("status", TransactionStatus::Overdue.as_str());

        let mut updated = 0;
        for transaction in self.list()? {
            if transaction.status != TransactionStatus::Active || transaction.due_date >= today {
                continue;
            }
            match self.store.update(&transaction.id, &partial) {
                Ok(_) => updated += 1,
                Err(e) => warn!(transaction = %transaction.id, "overdue update failed: {}", e),
            }
        }

        info!(updated, %today, "overdue sweep finished");
        Ok(updated)
    }

    pub fn get(&self, transaction_id: &str) -> Result<Transaction> {
        self.store.load(transaction_id)
    }

    pub fn list(&self) -> Result<Vec<Transaction>> {
        self.store.load_all()
    }

    pub fn by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        Ok(self.list()?.into_iter().filter(|t| t.status == status).collect())
    }

    pub fn active(&self) -> Result<Vec<Transaction>> {
        self.by_status(TransactionStatus::Active)
    }

    pub fn overdue(&self) -> Result<Vec<Transaction>> {
        self.by_status(TransactionStatus::Overdue)
    }

    /// Loans a member still holds (active or overdue)
    pub fn open_for_member(&self, member_id: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|t| t.member_id == member_id && !t.status.is_terminal())
            .collect())
    }

    /// The open loan on an item, if any. At most one should exist; the first
    /// found is returned.
    pub fn current_for_item(&self, item_id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|t| t.item_id == item_id && !t.status.is_terminal()))
    }

    pub fn history_for_member(&self, member_id: &str) -> Result<Vec<Transaction>> {
        Ok(self.list()?.into_iter().filter(|t| t.member_id == member_id).collect())
    }

    pub fn history_for_item(&self, item_id: &str) -> Result<Vec<Transaction>> {
        Ok(self.list()?.into_iter().filter(|t| t.item_id == item_id).collect())
    }

    fn item_side(&self, transaction: &Transaction, status: ItemStatus) -> Option<String> {
        match self.items.set_status(&transaction.item_id, status) {
            Ok(_) => None,
            Err(e) => {
                warn!(
                    transaction = %transaction.id,
                    item = %transaction.item_id,
                    "item status not updated: {}", e
                );
                Some(format!(
                    "Loan {} updated, but item {} could not be marked {}: {}",
                    transaction.id, transaction.item_id, status, e
                ))
            }
        }
    }
}

fn add_days(date: NaiveDate, days: u32) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(u64::from(days))).ok_or_else(|| {
        CirculationError::ValidationFailed(vec![format!(
            "{} days after {} is out of range",
            days, date
        )])
    })
}
