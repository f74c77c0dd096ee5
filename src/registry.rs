use log::info;

use crate::error::{AppError, AppResult};
use crate::models::{Member, NewMember};
use crate::store::TableStore;

/// Creates and lists member records
///
/// Every call goes to the store: the tables are loaded fresh, and `add`
/// writes both of them back.
pub struct MemberRegistry<'a> {
    store: &'a dyn TableStore,
}

impl<'a> MemberRegistry<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        MemberRegistry { store }
    }

    /// Store a new member and return the id it was given
    ///
    /// The id is one more than the largest id in the table, or 1 for an empty
    /// table.
    pub fn add(&self, member: NewMember) -> AppResult<u32> {
        let mut tables = self.store.load()?;
        let id = next_id(tables.members.iter().map(|m| m.id))?;

        tables.members.push(member.into_member(id));
        self.store.save(&tables)?;

        info!("Member added with ID: {}", id);
        Ok(id)
    }

    /// All members in insertion order
    pub fn list(&self) -> AppResult<Vec<Member>> {
        Ok(self.store.load()?.members)
    }

    pub fn get(&self, id: u32) -> AppResult<Option<Member>> {
        Ok(self.store.load()?.members.into_iter().find(|m| m.id == id))
    }
}

/// `max(ids) + 1`, or 1 when there are none
///
/// Fails once the largest id is `u32::MAX`; ids are never reused.
pub(crate) fn next_id(ids: impl Iterator<Item = u32>) -> AppResult<u32> {
    match ids.max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| AppError::storage("id space exhausted")),
    }
}
