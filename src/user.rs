//! User records as supplied by callers and as sent to the identity API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw user record: attribute name → value.
///
/// Records come from the test-user generator or from callers; nothing about
/// their shape is guaranteed, so accessors default missing keys to "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(BTreeMap<String, String>);

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value for `key`, or "" when absent.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn email(&self) -> &str {
        self.get_or_empty("email")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// User in the canonical shape the identity API consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedUser {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub title: String,
    pub department: String,
    pub employee_id: String,
    pub status: String,
    pub display_name: String,
    pub created_at: String,
}

impl MappedUser {
    /// Project a raw record into the canonical shape, stamped with `now`.
    pub fn from_record(record: &UserRecord, now: DateTime<Utc>) -> Self {
        let email = record.email().to_string();
        let firstname = record.get_or_empty("firstname").to_string();
        let lastname = record.get_or_empty("lastname").to_string();
        let username = email.split('@').next().unwrap_or("").to_string();
        let display_name = format!("{} {}", firstname, lastname);

        Self {
            username,
            title: record.get_or_empty("role").to_string(),
            department: record.get_or_empty("department").to_string(),
            employee_id: record.get_or_empty("employee_id").to_string(),
            status: record.get("status").unwrap_or("active").to_string(),
            display_name,
            created_at: now.to_rfc3339(),
            email,
            firstname,
            lastname,
        }
    }

    /// Flatten into an attribute map (used as session attributes).
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        [
            ("email", &self.email),
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("username", &self.username),
            ("title", &self.title),
            ("department", &self.department),
            ("employee_id", &self.employee_id),
            ("status", &self.status),
            ("display_name", &self.display_name),
            ("created_at", &self.created_at),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}
