//! Account model shared by the three account collections.
//!
//! Users, staff and doctors are structurally the same record stored in
//! separate collections. Only users carry a membership.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Avatar assigned to accounts and patients created without a picture.
pub const DEFAULT_AVATAR: &str = "https://storage.googleapis.com/medicare-assets/default-avatar.jpg";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Staff,
    Doctor,
}

impl AccountKind {
    /// Order in which collections are searched when only an id is known.
    pub const LOOKUP_ORDER: [AccountKind; 3] =
        [AccountKind::User, AccountKind::Staff, AccountKind::Doctor];

    pub fn collection(self) -> &'static str {
        match self {
            AccountKind::User => "users",
            AccountKind::Staff => "staffs",
            AccountKind::Doctor => "doctors",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::User => "user",
            AccountKind::Staff => "staff",
            AccountKind::Doctor => "doctor",
        }
    }

    /// Capitalized name used in history summaries
    pub fn label(self) -> &'static str {
        match self {
            AccountKind::User => "User",
            AccountKind::Staff => "Staff",
            AccountKind::Doctor => "Doctor",
        }
    }

    pub fn from_collection(collection: &str) -> Option<Self> {
        Self::LOOKUP_ORDER
            .into_iter()
            .find(|kind| kind.collection() == collection)
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    #[serde(rename = "passwordHash")]
    pub password_hash: String,
    #[serde(default)]
    pub sessions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Profile {
    pub avatar: String,
    pub phone: String,
    pub gender: String,
    pub birthday: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            avatar: DEFAULT_AVATAR.to_string(),
            phone: String::new(),
            gender: String::new(),
            birthday: String::new(),
            about: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub rfid: String,
    pub since: String,
    /// `YYYY-MM-DD`
    pub until: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub name: String,
    pub credentials: Credentials,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<Membership>,
}

impl Account {
    pub fn new(id: String, email: String, name: String, password_hash: String) -> Self {
        Self {
            id,
            email,
            name,
            credentials: Credentials {
                password_hash,
                sessions: Vec::new(),
            },
            profile: Profile::default(),
            membership: None,
        }
    }

    /// Whether the token is in the persisted session list
    pub fn has_session(&self, token: &str) -> bool {
        self.credentials.sessions.iter().any(|s| s == token)
    }

    pub fn add_session(&mut self, token: String) {
        if !self.has_session(&token) {
            self.credentials.sessions.push(token);
        }
    }

    /// Remove a token, returning whether it was present.
    pub fn remove_session(&mut self, token: &str) -> bool {
        let before = self.credentials.sessions.len();
        self.credentials.sessions.retain(|s| s != token);
        self.credentials.sessions.len() != before
    }

    /// Account as exposed over HTTP: everything except credentials.
    pub fn public_view(&self) -> Value {
        let mut view = json!({
            "id": self.id,
            "email": self.email,
            "name": self.name,
            "profile": self.profile,
        });
        if let Some(membership) = &self.membership {
            view["membership"] = json!(membership);
        }
        view
    }

    /// Public view tagged with the collection it came from.
    pub fn typed_view(&self, kind: AccountKind) -> Value {
        let mut view = self.public_view();
        view["type"] = json!(kind.as_str());
        view
    }
}
