//! Item service

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::{Entity, Item, ItemStatus, ItemType, Record};
use crate::store::RecordStore;
use crate::validator::Validator;

/// Fields supplied when cataloguing an item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub external_code: String,
    #[serde(default)]
    pub notes: String,
}

/// Partial item edit; `None` leaves a field as stored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub external_code: Option<String>,
    pub status: Option<ItemStatus>,
    pub notes: Option<String>,
}

impl ItemUpdate {
    fn to_record(&self) -> Record {
        let mut record = Record::new();
        if let Some(title) = &self.title {
            record.set("title", title.trim());
        }
        if let Some(author) = &self.author {
            record.set("author", author.trim());
        }
        if let Some(item_type) = self.item_type {
            record.set("type", item_type.as_str());
        }
        if let Some(code) = &self.external_code {
            record.set("externalCode", code.trim());
        }
        if let Some(status) = self.status {
            record.set("status", status.as_str());
        }
        if let Some(notes) = &self.notes {
            record.set("notes", notes);
        }
        record
    }
}

#[derive(Clone)]
pub struct ItemService {
    store: RecordStore,
    validator: Validator,
}

impl ItemService {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            validator: Validator::new(),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Catalogue an item. New items are `available`.
    pub fn create(&self, new: NewItem) -> Result<Item> {
        let record = Record::new()
            .with("title", new.title.trim())
            .with("author", new.author.trim())
            .with("type", new.item_type.as_str())
            .with("externalCode", new.external_code.trim())
            .with("status", ItemStatus::Available.as_str())
            .with("notes", new.notes);
        self.validator.validate_item(&record).into_result()?;
        Item::from_record(&self.store.create(record)?)
    }

    pub fn get(&self, id: &str) -> Result<Item> {
        self.store.load(id)
    }

    pub fn list(&self) -> Result<Vec<Item>> {
        self.store.load_all()
    }

    pub fn by_status(&self, status: ItemStatus) -> Result<Vec<Item>> {
        Ok(self.list()?.into_iter().filter(|i| i.status == status).collect())
    }

    /// Case-insensitive substring match over title, author and external code
    pub fn search(&self, query: &str) -> Result<Vec<Item>> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|i| {
                [&i.title, &i.author, &i.external_code]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Apply `changes`; the merged item must still validate
    pub fn update(&self, id: &str, changes: &ItemUpdate) -> Result<Item> {
        let partial = changes.to_record();
        let mut merged = self.store.get_by_id(id)?;
        merged.merge(&partial, self.store.fields());
        self.validator.validate_item(&merged).into_result()?;
        Item::from_record(&self.store.update(id, &partial)?)
    }

    /// Write the status column only
    pub fn set_status(&self, id: &str, status: ItemStatus) -> Result<Item> {
        let partial = Record::new().with("status", status.as_str());
        Item::from_record(&self.store.update(id, &partial)?)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    pub fn is_available(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_available())
    }
}
