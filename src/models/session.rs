use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConsoleError, ConsoleResult};

/// The staff member signed in to the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// Who a request is being made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    Admin(AdminUser),
}

impl Default for Session {
    fn default() -> Self {
        Self::Anonymous
    }
}

impl Session {
    /// The request header carrying the signed-in admin record as JSON.
    pub const HEADER: &'static str = "x-admin-user";

    /// Reads the session from the value of the admin header. A missing or
    /// blank header means nobody is signed in; anything else has to parse.
    pub fn from_header(value: Option<&str>) -> ConsoleResult<Self> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::Anonymous),
            Some(raw) => serde_json::from_str(raw)
                .map(Self::Admin)
                .map_err(|err| ConsoleError::InvalidSessionHeader(err.to_string())),
        }
    }

    /// Reads the session from a subscription's `connection_init` payload.
    /// The admin record sits under the same key as the HTTP header, either
    /// as a JSON string or as an object.
    pub fn from_init_payload(payload: &Value) -> ConsoleResult<Self> {
        match payload.get(Self::HEADER) {
            None | Some(Value::Null) => Ok(Self::Anonymous),
            Some(Value::String(raw)) => Self::from_header(Some(raw.as_str())),
            Some(record) => serde_json::from_value(record.clone())
                .map(Self::Admin)
                .map_err(|err| ConsoleError::InvalidSessionHeader(err.to_string())),
        }
    }

    pub fn admin(&self) -> Option<&AdminUser> {
        match self {
            Self::Admin(admin) => Some(admin),
            Self::Anonymous => None,
        }
    }

    pub fn require_admin(&self) -> ConsoleResult<&AdminUser> {
        self.admin().ok_or(ConsoleError::SessionRequired)
    }
}
