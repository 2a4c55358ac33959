//! Circulation Desk
//!
//! Keeps members, circulating items and loans in three flat tables that are
//! found by name rather than by a fixed address.
//!
//! ## Features
//!
//! - **Discovery**: each table is located by name prefix, newest first, and
//!   the resolved address is remembered
//! - **Record Store**: any header-plus-rows table becomes a typed record store
//! - **Loans**: checkout, return, extend and overdue sweeps keep loan rows and
//!   item availability in step, rolling back a half-finished checkout
//! - **Validation**: every rule a record breaks is reported at once
//!
//! ## Architecture
//!
//! ```text
//! CirculationDesk ─┬─ MemberService ──┐
//!                  ├─ ItemService ────┼─ RecordStore ─┬─ ResourceLocator ─┬─ ResourceCatalog
//!                  └─ TransactionService              │                   └─ ConfigStore
//!                     (members + items + own store)   └─ Workbook ── Table
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod desk;
pub mod error;
pub mod items;
pub mod locator;
pub mod members;
pub mod record;
pub mod schema;
pub mod settings;
pub mod store;
pub mod transactions;
pub mod validator;

pub use backend::{CatalogEntry, ResourceCatalog, Table, Workbook};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use desk::{CirculationDesk, Response, ResponseError};
pub use error::{CirculationError, Result};
pub use items::{ItemService, ItemUpdate, NewItem};
pub use locator::{Discovery, ResourceLocator};
pub use members::{MemberService, MemberUpdate, NewMember};
pub use record::{
    Entity, Item, ItemStatus, ItemType, Member, MemberStatus, Record, Transaction,
    TransactionStatus,
};
pub use schema::EntityKind;
pub use settings::ConfigStore;
pub use store::{HeaderRepair, RecordStore};
pub use transactions::{LoanOutcome, TransactionService};
pub use validator::{ValidationResult, Validator};
