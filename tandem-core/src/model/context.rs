use serde::{Deserialize, Serialize};

/// Stable application identity of the local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Session state handed to every component that talks to the outside world.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub user: Option<UserIdentity>,
    pub auth_token: Option<String>,
}

impl SessionContext {
    pub fn new(user: UserIdentity, auth_token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            auth_token: Some(auth_token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}
