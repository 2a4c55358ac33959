//! Member service

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;
use crate::record::{format_date, Entity, Member, MemberStatus, Record};
use crate::store::RecordStore;
use crate::validator::Validator;

/// Fields supplied when registering a member
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

/// Partial member edit; `None` leaves a field as stored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<MemberStatus>,
    pub notes: Option<String>,
}

impl MemberUpdate {
    fn to_record(&self) -> Record {
        let mut record = Record::new();
        if let Some(name) = &self.name {
            record.set("name", name.trim());
        }
        if let Some(email) = &self.email {
            record.set("email", email.trim());
        }
        if let Some(phone) = &self.phone {
            record.set("phone", phone.trim());
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
pub struct MemberService {
    store: RecordStore,
    validator: Validator,
    clock: Arc<dyn Clock>,
}

impl MemberService {
    pub fn new(store: RecordStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            validator: Validator::new(),
            clock,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Register a member. New members are `active` and joined today.
    pub fn create(&self, new: NewMember) -> Result<Member> {
        let record = Record::new()
            .with("name", new.name.trim())
            .with("email", new.email.trim())
            .with("phone", new.phone.trim())
            .with("status", MemberStatus::Active.as_str())
            .with("joinDate", format_date(self.clock.today()))
            .with("notes", new.notes);
        self.validator.validate_member(&record).into_result()?;
        Member::from_record(&self.store.create(record)?)
    }

    pub fn get(&self, id: &str) -> Result<Member> {
        self.store.load(id)
    }

    pub fn list(&self) -> Result<Vec<Member>> {
        self.store.load_all()
    }

    pub fn by_status(&self, status: MemberStatus) -> Result<Vec<Member>> {
        Ok(self.list()?.into_iter().filter(|m| m.status == status).collect())
    }

    /// Case-insensitive substring match over name, email and phone
    pub fn search(&self, query: &str) -> Result<Vec<Member>> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|m| {
                [&m.name, &m.email, &m.phone]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Apply `changes`; the merged member must still validate
    pub fn update(&self, id: &str, changes: &MemberUpdate) -> Result<Member> {
        let partial = changes.to_record();
        let mut merged = self.store.get_by_id(id)?;
        merged.merge(&partial, self.store.fields());
        self.validator.validate_member(&merged).into_result()?;
        Member::from_record(&self.store.update(id, &partial)?)
    }

    pub fn set_status(&self, id: &str, status: MemberStatus) -> Result<Member> {
        self.update(
            id,
            &MemberUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    /// Only `active` members may borrow
    pub fn is_in_good_standing(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_in_good_standing())
    }
}
