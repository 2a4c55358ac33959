//! Entity kinds and their column layouts
//!
//! Every backing resource is a flat table whose header row holds the field
//! names below, in this exact order. Column 0 is always `id`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column order of the members resource
pub const MEMBER_FIELDS: &[&str] = &["id", "name", "email", "phone", "status", "joinDate", "notes"];

/// Column order of the items resource
pub const ITEM_FIELDS: &[&str] = &[
    "id",
    "title",
    "author",
    "type",
    "externalCode",
    "status",
    "notes",
];

/// Column order of the transactions resource
pub const TRANSACTION_FIELDS: &[&str] = &[
    "id",
    "memberId",
    "itemId",
    "checkoutDate",
    "dueDate",
    "returnDate",
    "status",
];

/// Key under which the time of the last discovery run is stored
pub const LAST_DISCOVERY_KEY: &str = "last_discovery";

/// The closed set of resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Member,
    Item,
    Transaction,
}

impl EntityKind {
    /// All kinds, in discovery order
    pub const ALL: [EntityKind; 3] = [EntityKind::Member, EntityKind::Item, EntityKind::Transaction];

    /// Ordered field list for this kind
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Member => MEMBER_FIELDS,
            EntityKind::Item => ITEM_FIELDS,
            EntityKind::Transaction => TRANSACTION_FIELDS,
        }
    }

    /// Name prefix a backing resource must carry to be discovered
    pub fn default_prefix(&self) -> &'static str {
        match self {
            EntityKind::Member => "Members",
            EntityKind::Item => "Items",
            EntityKind::Transaction => "Transactions",
        }
    }

    /// Durable configuration key holding the resolved address
    pub fn config_key(&self) -> &'static str {
        match self {
            EntityKind::Member => "members_resource",
            EntityKind::Item => "items_resource",
            EntityKind::Transaction => "transactions_resource",
        }
    }

    /// Singular label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Member => "Member",
            EntityKind::Item => "Item",
            EntityKind::Transaction => "Transaction",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Member => "member",
            EntityKind::Item => "item",
            EntityKind::Transaction => "transaction",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" | "members" => Ok(EntityKind::Member),
            "item" | "items" => Ok(EntityKind::Item),
            "transaction" | "transactions" | "loan" | "loans" => Ok(EntityKind::Transaction),
            other => Err(format!("Unknown resource kind '{}'", other)),
        }
    }
}

/// Header row for a kind, as owned strings
pub fn header_row(kind: EntityKind) -> Vec<String> {
    kind.fields().iter().map(|f| f.to_string()).collect()
}
