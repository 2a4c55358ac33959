//! Resource Locator
//!
//! Finds the backing resource for each entity kind by name prefix and
//! recency, and remembers the answer in the durable settings.
//!
//! Discovery runs in two stages:
//!
//! 1. the catalog is asked for every candidate whose name *contains* the
//!    kind's prefix (the catalog's own, coarse filter);
//! 2. that list is narrowed to untrashed candidates whose name *starts with*
//!    the prefix, and the most recently modified one wins.
//!
//! When two candidates share the newest timestamp the one listed first by
//! the catalog is kept. Catalog listing order is not guaranteed, so callers
//! must not rely on which of the tied candidates comes back.
//!
//! A stored address is never re-checked. If the resource behind it goes
//! away, the record stores report `ResourceUnavailable` until discovery is
//! run again.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{CatalogEntry, ResourceCatalog};
use crate::clock::{Clock, SystemClock};
use crate::error::{CirculationError, Result};
use crate::schema::{EntityKind, LAST_DISCOVERY_KEY};
use crate::settings::ConfigStore;

/// Outcome of resolving several kinds at once
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    /// Address per resolved kind
    pub resolved: BTreeMap<EntityKind, String>,
    /// Kinds that could not be resolved, with the reason
    pub unresolved: BTreeMap<EntityKind, String>,
}

impl Discovery {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Some but not all kinds resolved
    pub fn is_partial(&self) -> bool {
        !self.resolved.is_empty() && !self.unresolved.is_empty()
    }

    /// Message naming the gaps, if there are any
    pub fn warning(&self) -> Option<String> {
        if self.unresolved.is_empty() {
            return None;
        }
        let gaps: Vec<String> = self
            .unresolved
            .iter()
            .map(|(kind, reason)| format!("{} ({})", kind, reason))
            .collect();
        Some(format!("Could not locate: {}", gaps.join(", ")))
    }
}

/// Resolves entity kinds to backing resource addresses
#[derive(Clone)]
pub struct ResourceLocator {
    catalog: Arc<dyn ResourceCatalog>,
    settings: Arc<dyn ConfigStore>,
    prefixes: BTreeMap<EntityKind, String>,
    clock: Arc<dyn Clock>,
}

impl ResourceLocator {
    /// Locator using each kind's default prefix
    pub fn new(catalog: Arc<dyn ResourceCatalog>, settings: Arc<dyn ConfigStore>) -> Self {
        let prefixes = EntityKind::ALL
            .iter()
            .map(|kind| (*kind, kind.default_prefix().to_string()))
            .collect();
        Self {
            catalog,
            settings,
            prefixes,
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp discoveries with `clock` instead of the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the prefix for one kind
    pub fn with_prefix(mut self, kind: EntityKind, prefix: impl Into<String>) -> Self {
        self.prefixes.insert(kind, prefix.into());
        self
    }

    pub fn prefix(&self, kind: EntityKind) -> &str {
        self.prefixes
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_prefix())
    }

    /// Untrashed catalog entries whose name starts with the kind's prefix
    pub fn candidates(&self, kind: EntityKind) -> Result<Vec<CatalogEntry>> {
        let prefix = self.prefix(kind);
        let listed = self.catalog.search(prefix)?;
        debug!(kind = %kind, listed = listed.len(), "catalog search");
        Ok(listed
            .into_iter()
            .filter(|entry| !entry.trashed && entry.name.starts_with(prefix))
            .collect())
    }

    /// Resolve `kind` and store the address
    pub fn locate(&self, kind: EntityKind) -> Result<String> {
        let chosen = select_latest(self.candidates(kind)?).ok_or_else(|| {
            CirculationError::ResourceNotFound {
                kind,
                prefix: self.prefix(kind).to_string(),
            }
        })?;

        self.settings.set(kind.config_key(), &chosen.address)?;
        self.settings
            .set(LAST_DISCOVERY_KEY, &self.clock.now().to_rfc3339())?;

        info!(kind = %kind, name = %chosen.name, address = %chosen.address, "resource located");
        Ok(chosen.address)
    }

    /// Resolve every kind in `kinds`, carrying on past failures
    pub fn locate_all(&self, kinds: &[EntityKind]) -> Discovery {
        let mut discovery = Discovery::default();
        for kind in kinds {
            match self.locate(*kind) {
                Ok(address) => {
                    discovery.resolved.insert(*kind, address);
                }
                Err(e) => {
                    warn!(kind = %kind, "discovery failed: {}", e);
                    discovery.unresolved.insert(*kind, e.to_string());
                }
            }
        }
        discovery
    }

    /// Stored address for `kind`
    pub fn address(&self, kind: EntityKind) -> Result<String> {
        match self.settings.get(kind.config_key()) {
            Ok(Some(address)) if !address.is_empty() => Ok(address),
            Ok(_) => Err(CirculationError::unavailable(kind, "no address configured")),
            Err(e) => Err(CirculationError::unavailable(
                kind,
                format!("settings unreadable: {}", e),
            )),
        }
    }

    /// Drop the stored address for `kind`
    pub fn forget(&self, kind: EntityKind) -> Result<()> {
        self.settings.delete(kind.config_key())
    }

    /// When a kind was last resolved successfully
    pub fn last_discovery(&self) -> Result<Option<DateTime<Utc>>> {
        let stamp = match self.settings.get(LAST_DISCOVERY_KEY)? {
            Some(stamp) => stamp,
            None => return Ok(None),
        };
        DateTime::parse_from_rfc3339(&stamp)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| CirculationError::Storage(format!("bad discovery timestamp '{}': {}", stamp, e)))
    }

    /// Whether `identity` may edit the resource behind `kind`. Identities are
    /// compared case-insensitively.
    pub fn has_access(&self, identity: &str, kind: EntityKind) -> Result<bool> {
        let address = self.address(kind)?;
        let editors = self.catalog.editors(&address)?;
        Ok(editors.iter().any(|e| e.eq_ignore_ascii_case(identity.trim())))
    }
}

/// Most recently modified entry; the first listed wins a tie
pub fn select_latest(candidates: Vec<CatalogEntry>) -> Option<CatalogEntry> {
    candidates.into_iter().fold(None, |best, entry| match best {
        Some(current) if current.modified >= entry.modified => Some(current),
        _ => Some(entry),
    })
}
