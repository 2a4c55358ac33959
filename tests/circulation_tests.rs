//! Circulation Desk Tests
//!
//! End-to-end behaviour of the desk over the in-memory backends, with the
//! calendar pinned by a `FixedClock`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;

use circulation_desk::backend::{MemoryCatalog, MemoryWorkbook};
use circulation_desk::schema::header_row;
use circulation_desk::settings::MemoryConfigStore;
use circulation_desk::{
    AppConfig, CirculationDesk, EntityKind, FixedClock, HeaderRepair, ItemStatus, ItemType,
    MemberStatus, MemberUpdate, NewItem, NewMember, Record, TransactionStatus, Validator,
};

const MEMBERS: &str = "doc-members";
const ITEMS: &str = "doc-items";
const TRANSACTIONS: &str = "doc-transactions";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap()
}

struct Fixture {
    desk: CirculationDesk,
    workbook: MemoryWorkbook,
    clock: Arc<FixedClock>,
}

impl Fixture {
    fn data_rows(&self, address: &str) -> usize {
        self.workbook.rows_of(address).unwrap().len() - 1
    }

    fn member(&self, name: &str) -> String {
        self.desk
            .create_member(NewMember {
                name: name.to_string(),
                email: format!("{}@example.org", name.to_lowercase()),
                ..Default::default()
            })
            .into_result()
            .unwrap()
            .id
    }

    fn item(&self, title: &str) -> String {
        self.desk
            .create_item(NewItem {
                title: title.to_string(),
                author: "Frank Herbert".to_string(),
                item_type: ItemType::Book,
                external_code: String::new(),
                notes: String::new(),
            })
            .into_result()
            .unwrap()
            .id
    }
}

/// Three discovered resources holding only their header rows, today = 2024-01-15
fn fixture() -> Fixture {
    let workbook = MemoryWorkbook::new();
    let catalog = MemoryCatalog::new();
    for (kind, address, name) in [
        (EntityKind::Member, MEMBERS, "Members"),
        (EntityKind::Item, ITEMS, "Items"),
        (EntityKind::Transaction, TRANSACTIONS, "Transactions"),
    ] {
        workbook.insert(address, vec![header_row(kind)]).unwrap();
        catalog.add(address, name, at(1)).unwrap();
    }

    let clock = Arc::new(FixedClock::new(date(2024, 1, 15)));
    let desk = CirculationDesk::new(
        Arc::new(workbook.clone()),
        Arc::new(catalog),
        Arc::new(MemoryConfigStore::new()),
        clock.clone(),
        &AppConfig::default(),
    );
    assert!(desk.discover().success);

    Fixture {
        desk,
        workbook,
        clock,
    }
}

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn test_discovery_prefers_newest_prefixed_candidate() {
    let catalog = MemoryCatalog::new();
    catalog.add("a", "Items", at(1)).unwrap();
    catalog.add("b", "Items-v2", at(20)).unwrap();
    catalog.add("c", "ItemsArchive", at(10)).unwrap();
    catalog.add("d", "Old Items", at(30)).unwrap();

    let desk = CirculationDesk::new(
        Arc::new(MemoryWorkbook::new()),
        Arc::new(catalog),
        Arc::new(MemoryConfigStore::new()),
        Arc::new(FixedClock::new(date(2024, 1, 15))),
        &AppConfig::default(),
    );

    // "Old Items" passes the catalog's substring search but not the prefix re-filter
    let listed = desk.locator().candidates(EntityKind::Item).unwrap();
    let names: Vec<_> = listed.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Items", "Items-v2", "ItemsArchive"]);

    let discovery = desk.discover().into_result().unwrap();
    assert_eq!(discovery.resolved.get(&EntityKind::Item).map(String::as_str), Some("b"));
}

#[test]
fn test_partial_discovery_is_success_with_warning() {
    let catalog = MemoryCatalog::new();
    catalog.add("m", "Members", at(1)).unwrap();
    let desk = CirculationDesk::new(
        Arc::new(MemoryWorkbook::new()),
        Arc::new(catalog),
        Arc::new(MemoryConfigStore::new()),
        Arc::new(FixedClock::new(date(2024, 1, 15))),
        &AppConfig::default(),
    );

    let response = desk.discover();
    assert!(response.success);
    let warning = response.warning.unwrap();
    assert!(warning.contains("item"));
    assert!(warning.contains("transaction"));

    let status = desk.discovery_status().into_result().unwrap();
    assert_eq!(status.addresses[&EntityKind::Member].as_deref(), Some("m"));
    assert_eq!(status.addresses[&EntityKind::Item], None);
    assert_eq!(
        status.last_discovery,
        Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
    );
}

#[test]
fn test_nothing_discovered_is_failure() {
    let desk = CirculationDesk::new(
        Arc::new(MemoryWorkbook::new()),
        Arc::new(MemoryCatalog::new()),
        Arc::new(MemoryConfigStore::new()),
        Arc::new(FixedClock::new(date(2024, 1, 15))),
        &AppConfig::default(),
    );

    let response = desk.discover();
    assert!(!response.success);
    assert_eq!(response.code, Some("NOT_FOUND"));

    let listing = desk.list_members();
    assert_eq!(listing.code, Some("RESOURCE_UNAVAILABLE"));
}

#[test]
fn test_vanished_resource_is_unavailable() {
    let fx = fixture();
    fx.workbook.remove(ITEMS).unwrap();

    let response = fx.desk.list_items();
    assert!(!response.success);
    assert_eq!(response.code, Some("RESOURCE_UNAVAILABLE"));
    assert!(response.error.unwrap().contains("Run discovery"));
}

// =============================================================================
// Records
// =============================================================================

#[test]
fn test_create_then_get_returns_same_member() {
    let fx = fixture();
    let created = fx
        .desk
        .create_member(NewMember {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.org".to_string(),
            phone: "555-0100".to_string(),
            notes: String::new(),
        })
        .into_result()
        .unwrap();

    assert_eq!(created.status, MemberStatus::Active);
    assert_eq!(created.join_date, Some(date(2024, 1, 15)));
    assert_eq!(fx.desk.get_member(&created.id).into_result().unwrap(), created);
}

#[test]
fn test_create_then_get_returns_same_item() {
    let fx = fixture();
    let id = fx.item("Dune");
    let item = fx.desk.get_item(&id).into_result().unwrap();
    assert_eq!(item.title, "Dune");
    assert_eq!(item.status, ItemStatus::Available);
    assert_eq!(fx.desk.list_items().into_result().unwrap(), vec![item]);
}

#[test]
fn test_create_on_headerless_resource_is_readable() {
    let fx = fixture();
    fx.workbook.insert(MEMBERS, Vec::new()).unwrap();

    let id = fx.member("Ada");
    let member = fx.desk.get_member(&id).into_result().unwrap();
    assert_eq!(member.name, "Ada");
    assert_eq!(fx.desk.list_members().into_result().unwrap(), vec![member]);
    assert_eq!(fx.workbook.rows_of(MEMBERS).unwrap()[0], header_row(EntityKind::Member));
}

#[test]
fn test_invalid_member_is_not_written() {
    let fx = fixture();
    let response = fx.desk.create_member(NewMember {
        name: "  ".to_string(),
        email: "not-an-email".to_string(),
        ..Default::default()
    });

    assert_eq!(response.code, Some("VALIDATION_FAILED"));
    let message = response.error.unwrap();
    assert!(message.contains("Name is required"));
    assert!(message.contains("Invalid email format"));
    assert_eq!(fx.data_rows(MEMBERS), 0);
}

#[test]
fn test_missing_id_is_not_found() {
    let fx = fixture();
    assert_eq!(fx.desk.get_member("nobody").code, Some("NOT_FOUND"));
    assert_eq!(fx.desk.delete_item("nothing").code, Some("NOT_FOUND"));
}

#[test]
fn test_update_and_search_members() {
    let fx = fixture();
    let id = fx.member("Grace");
    fx.member("Alan");

    let updated = fx
        .desk
        .update_member(
            &id,
            &MemberUpdate {
                phone: Some("555-0199".to_string()),
                ..Default::default()
            },
        )
        .into_result()
        .unwrap();
    assert_eq!(updated.phone, "555-0199");
    assert_eq!(updated.name, "Grace");

    let found = fx.desk.search_members("0199").into_result().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id);

    let rejected = fx.desk.update_member(
        &id,
        &MemberUpdate {
            email: Some(String::new()),
            ..Default::default()
        },
    );
    assert_eq!(rejected.code, Some("VALIDATION_FAILED"));
    assert_eq!(
        fx.desk.get_member(&id).into_result().unwrap().email,
        "grace@example.org"
    );
}

#[test]
fn test_short_rows_are_skipped() {
    let fx = fixture();
    let id = fx.member("Grace");
    let mut rows = fx.workbook.rows_of(MEMBERS).unwrap();
    rows.push(vec!["broken".to_string(), "Half a row".to_string()]);
    fx.workbook.insert(MEMBERS, rows).unwrap();

    let members = fx.desk.list_members().into_result().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, id);
    assert_eq!(fx.desk.get_member("broken").code, Some("NOT_FOUND"));
}

#[test]
fn test_ensure_headers_repairs_headerless_resource() {
    let fx = fixture();
    fx.workbook
        .insert(ITEMS, vec![vec!["x1".to_string(), "Orphan".to_string()]])
        .unwrap();
    fx.workbook.insert(TRANSACTIONS, Vec::new()).unwrap();

    let repairs = fx.desk.ensure_headers().into_result().unwrap();
    assert_eq!(repairs[&EntityKind::Member], HeaderRepair::Unchanged);
    assert_eq!(repairs[&EntityKind::Item], HeaderRepair::Inserted);
    assert_eq!(repairs[&EntityKind::Transaction], HeaderRepair::Written);

    let rows = fx.workbook.rows_of(ITEMS).unwrap();
    assert_eq!(rows[0], header_row(EntityKind::Item));
    assert_eq!(rows[1][0], "x1");
}

// =============================================================================
// Loans
// =============================================================================

#[test]
fn test_checkout_marks_item_on_loan() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");

    let loan = fx.desk.checkout(&member, &item, Some(14)).into_result().unwrap();
    assert_eq!(loan.status, TransactionStatus::Active);
    assert_eq!(loan.checkout_date, date(2024, 1, 15));
    assert_eq!(loan.due_date, date(2024, 1, 29));
    assert_eq!(loan.return_date, None);

    let item = fx.desk.get_item(&item).into_result().unwrap();
    assert_eq!(item.status, ItemStatus::OnLoan);
    assert_eq!(
        fx.desk.item_current_loan(&item.id).into_result().unwrap(),
        Some(loan)
    );
}

#[test]
fn test_checkout_uses_configured_default_period() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");

    let loan = fx.desk.checkout(&member, &item, None).into_result().unwrap();
    assert_eq!(loan.due_date, date(2024, 1, 29));
}

#[test]
fn test_checkout_refused_for_suspended_member() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");
    fx.desk
        .update_member(
            &member,
            &MemberUpdate {
                status: Some(MemberStatus::Suspended),
                ..Default::default()
            },
        )
        .into_result()
        .unwrap();

    let response = fx.desk.checkout(&member, &item, Some(14));
    assert_eq!(response.code, Some("PRECONDITION_FAILED"));
    assert!(response.error.unwrap().contains("not in good standing"));
    assert_eq!(fx.data_rows(TRANSACTIONS), 0);
    assert_eq!(
        fx.desk.get_item(&item).into_result().unwrap().status,
        ItemStatus::Available
    );
}

#[test]
fn test_checkout_refused_for_unavailable_item() {
    let fx = fixture();
    let first = fx.member("Ada");
    let second = fx.member("Grace");
    let item = fx.item("Dune");
    fx.desk.checkout(&first, &item, Some(14)).into_result().unwrap();

    let response = fx.desk.checkout(&second, &item, Some(14));
    assert_eq!(response.code, Some("PRECONDITION_FAILED"));
    assert!(response.error.unwrap().contains("not available"));
    assert_eq!(fx.data_rows(TRANSACTIONS), 1);
}

#[test]
fn test_checkout_against_headerless_transactions() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");
    fx.workbook.insert(TRANSACTIONS, Vec::new()).unwrap();

    let loan = fx.desk.checkout(&member, &item, Some(14)).into_result().unwrap();
    let rows = fx.workbook.rows_of(TRANSACTIONS).unwrap();
    assert_eq!(rows[0], header_row(EntityKind::Transaction));
    assert_eq!(fx.desk.get_transaction(&loan.id).into_result().unwrap(), loan);
    assert_eq!(
        fx.desk.item_current_loan(&item).into_result().unwrap(),
        Some(loan)
    );
}

#[test]
fn test_checkout_rolls_back_when_item_write_fails() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");
    fx.workbook.fail_writes(ITEMS, true).unwrap();

    let response = fx.desk.checkout(&member, &item, Some(14));
    assert!(!response.success);
    assert_eq!(response.code, Some("STORAGE"));
    assert_eq!(fx.data_rows(TRANSACTIONS), 0);

    fx.workbook.fail_writes(ITEMS, false).unwrap();
    assert_eq!(
        fx.desk.get_item(&item).into_result().unwrap().status,
        ItemStatus::Available
    );
}

#[test]
fn test_return_closes_loan_once() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");
    let loan = fx.desk.checkout(&member, &item, Some(14)).into_result().unwrap();

    fx.clock.set(date(2024, 1, 20));
    let outcome = fx.desk.process_return(&loan.id).into_result().unwrap();
    assert_eq!(outcome.transaction.status, TransactionStatus::Returned);
    assert_eq!(outcome.transaction.return_date, Some(date(2024, 1, 20)));
    assert_eq!(outcome.warning, None);
    assert_eq!(
        fx.desk.get_item(&item).into_result().unwrap().status,
        ItemStatus::Available
    );

    let before = fx.workbook.rows_of(TRANSACTIONS).unwrap();
    let again = fx.desk.process_return(&loan.id);
    assert_eq!(again.code, Some("PRECONDITION_FAILED"));
    assert_eq!(fx.workbook.rows_of(TRANSACTIONS).unwrap(), before);
}

#[test]
fn test_return_with_failing_item_write_warns() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");
    let loan = fx.desk.checkout(&member, &item, Some(14)).into_result().unwrap();
    fx.workbook.fail_writes(ITEMS, true).unwrap();

    let response = fx.desk.process_return(&loan.id);
    assert!(response.success);
    assert!(response.warning.unwrap().contains(&item));
    assert_eq!(
        fx.desk.get_transaction(&loan.id).into_result().unwrap().status,
        TransactionStatus::Returned
    );
}

#[test]
fn test_extend_moves_due_date() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");
    let loan = fx.desk.checkout(&member, &item, Some(14)).into_result().unwrap();

    let extended = fx.desk.extend(&loan.id, Some(14)).into_result().unwrap();
    assert_eq!(extended.due_date, date(2024, 2, 12));
    assert_eq!(extended.checkout_date, date(2024, 1, 15));

    assert_eq!(fx.desk.extend(&loan.id, Some(0)).code, Some("VALIDATION_FAILED"));

    fx.desk.process_return(&loan.id).into_result().unwrap();
    assert_eq!(fx.desk.extend(&loan.id, None).code, Some("PRECONDITION_FAILED"));
}

#[test]
fn test_overdue_sweep_touches_only_late_active_loans() {
    let fx = fixture();
    let member = fx.member("Ada");
    let late = fx.item("Dune");
    let returned = fx.item("Emma");
    let lost = fx.item("Ulysses");
    let current = fx.item("Middlemarch");

    fx.clock.set(date(2023, 12, 18));
    let late_loan = fx.desk.checkout(&member, &late, Some(14)).into_result().unwrap();
    assert_eq!(late_loan.due_date, date(2024, 1, 1));
    let returned_loan = fx.desk.checkout(&member, &returned, Some(14)).into_result().unwrap();
    let lost_loan = fx.desk.checkout(&member, &lost, Some(14)).into_result().unwrap();
    fx.desk.process_return(&returned_loan.id).into_result().unwrap();
    fx.desk.mark_lost(&lost_loan.id).into_result().unwrap();

    fx.clock.set(date(2024, 1, 25));
    let current_loan = fx.desk.checkout(&member, &current, Some(14)).into_result().unwrap();

    fx.clock.set(date(2024, 2, 1));
    assert_eq!(fx.desk.update_overdue_statuses().into_result().unwrap(), 1);

    let status = |id: &str| fx.desk.get_transaction(id).into_result().unwrap().status;
    assert_eq!(status(&late_loan.id), TransactionStatus::Overdue);
    assert_eq!(status(&returned_loan.id), TransactionStatus::Returned);
    assert_eq!(status(&lost_loan.id), TransactionStatus::Lost);
    assert_eq!(status(&current_loan.id), TransactionStatus::Active);

    assert_eq!(fx.desk.update_overdue_statuses().into_result().unwrap(), 0);

    let overdue = fx.desk.overdue_loans().into_result().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, late_loan.id);
    assert_eq!(fx.desk.extend(&late_loan.id, None).code, Some("PRECONDITION_FAILED"));
    assert!(fx.desk.process_return(&late_loan.id).success);
}

#[test]
fn test_mark_lost_flags_item_and_closes_loan() {
    let fx = fixture();
    let member = fx.member("Ada");
    let item = fx.item("Dune");
    let loan = fx.desk.checkout(&member, &item, Some(14)).into_result().unwrap();

    let outcome = fx.desk.mark_lost(&loan.id).into_result().unwrap();
    assert_eq!(outcome.transaction.status, TransactionStatus::Lost);
    assert_eq!(
        fx.desk.get_item(&item).into_result().unwrap().status,
        ItemStatus::Lost
    );
    assert!(fx.desk.member_loans(&member).into_result().unwrap().is_empty());
    assert_eq!(fx.desk.member_history(&member).into_result().unwrap().len(), 1);
    assert_eq!(fx.desk.process_return(&loan.id).code, Some("PRECONDITION_FAILED"));
    assert_eq!(fx.desk.mark_lost(&loan.id).code, Some("PRECONDITION_FAILED"));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_transaction_validation_aggregates_errors() {
    let validator = Validator::new();
    let record = Record::new()
        .with("memberId", "m1")
        .with("checkoutDate", "2024-01-15")
        .with("dueDate", "2024-01-10")
        .with("status", "borrowed");

    let result = validator.validate_transaction(&record);
    assert!(!result.valid);
    assert_eq!(
        result.errors,
        vec![
            "Item ID is required".to_string(),
            "Invalid transaction status: 'borrowed'. Must be one of: active, returned, overdue, lost"
                .to_string(),
            "Due date must be after checkout date".to_string(),
        ]
    );
}
