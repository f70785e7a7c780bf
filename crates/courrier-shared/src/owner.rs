//! Resolved conversation participants: users and communities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PeerId;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An individual participant.  The id is always positive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub screen_name: Option<String>,
    pub avatar_url: Option<String>,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: i64, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            screen_name: None,
            avatar_url: None,
            online: false,
            last_seen: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ---------------------------------------------------------------------------
// Community
// ---------------------------------------------------------------------------

/// A collective participant.  The stored id is positive; the signed owner id
/// (as used in peer ids and sender ids) is its negation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub screen_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Community {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            screen_name: None,
            avatar_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Owner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Owner {
    User(User),
    Community(Community),
}

impl Owner {
    /// Signed owner id: positive for users, negative for communities.
    pub fn id(&self) -> PeerId {
        match self {
            Owner::User(u) => u.id,
            Owner::Community(c) => -c.id,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Owner::User(u) => u.full_name(),
            Owner::Community(c) => c.name.clone(),
        }
    }

    pub fn avatar_url(&self) -> Option<&str> {
        match self {
            Owner::User(u) => u.avatar_url.as_deref(),
            Owner::Community(c) => c.avatar_url.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// OwnersBundle
// ---------------------------------------------------------------------------

/// Request-scoped, append-only map from signed owner id to resolved record.
///
/// A bundle lives for one synchronization pass and is discarded afterwards;
/// it exists to avoid redundant resolution within that pass and is never
/// persisted.
#[derive(Debug, Default)]
pub struct OwnersBundle {
    map: HashMap<PeerId, Owner>,
}

impl OwnersBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn put(&mut self, owner: Owner) {
        self.map.insert(owner.id(), owner);
    }

    pub fn put_all<I: IntoIterator<Item = Owner>>(&mut self, owners: I) {
        for owner in owners {
            self.put(owner);
        }
    }

    pub fn get(&self, id: PeerId) -> Option<&Owner> {
        self.map.get(&id)
    }

    /// Ids from `ids` that the bundle does not hold yet.
    pub fn missing(&self, ids: &[PeerId]) -> Vec<PeerId> {
        ids.iter()
            .copied()
            .filter(|id| !self.map.contains_key(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_ids() {
        let user = Owner::User(User::new(5, "Ada", "L"));
        let community = Owner::Community(Community::new(9, "Rustaceans"));
        assert_eq!(user.id(), 5);
        assert_eq!(community.id(), -9);
    }

    #[test]
    fn bundle_missing() {
        let mut bundle = OwnersBundle::new();
        bundle.put(Owner::User(User::new(1, "A", "B")));
        bundle.put(Owner::Community(Community::new(2, "C")));
        assert_eq!(bundle.missing(&[1, -2, 3, -4]), vec![3, -4]);
    }
}
