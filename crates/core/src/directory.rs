use crate::record::OwnerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label shown for records without an owner.
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// The signed-in user as supplied by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: OwnerId,
    pub display_name: String,
}

impl CurrentUser {
    pub fn new(id: impl Into<OwnerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Owner id to display name lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerDirectory {
    names: HashMap<OwnerId, String>,
}

impl OwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory knowing only the current user.
    pub fn seeded(user: &CurrentUser) -> Self {
        let mut directory = Self::new();
        directory.insert(user.id.clone(), user.display_name.clone());
        directory
    }

    /// Blank names and the unassigned sentinel are ignored.
    pub fn insert(&mut self, id: OwnerId, name: impl Into<String>) {
        let name = name.into();
        if id.is_unassigned() || name.trim().is_empty() {
            return;
        }
        self.names.insert(id, name);
    }

    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (OwnerId, String)>,
    {
        for (id, name) in entries {
            self.insert(id, name);
        }
    }

    pub fn name(&self, id: &OwnerId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn display_name(&self, id: &OwnerId) -> String {
        if id.is_unassigned() {
            return UNASSIGNED_LABEL.to_string();
        }
        match self.names.get(id) {
            Some(name) => name.clone(),
            None => format!("User {id}"),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &OwnerId> {
        self.names.keys()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
