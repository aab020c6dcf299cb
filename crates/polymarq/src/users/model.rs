use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MarketError;
use crate::geo::Coordinates;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_client: bool,
    pub is_technician: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub is_client: bool,
    #[serde(default)]
    pub is_technician: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// The authenticated caller, resolved once per request.
#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    Client(User),
    Technician(User),
    Both(User),
}

impl Principal {
    pub fn from_user(user: Option<User>) -> Self {
        match user {
            None => Principal::Anonymous,
            Some(u) => match (u.is_client, u.is_technician) {
                (true, true) => Principal::Both(u),
                (false, true) => Principal::Technician(u),
                // Accounts with neither flag are treated as clients.
                _ => Principal::Client(u),
            },
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::Client(u) | Principal::Technician(u) | Principal::Both(u) => Some(u),
        }
    }

    pub fn require_user(&self) -> Result<&User, MarketError> {
        self.user().ok_or(MarketError::Unauthorized)
    }

    pub fn require_client(&self) -> Result<&User, MarketError> {
        match self {
            Principal::Client(u) | Principal::Both(u) => Ok(u),
            Principal::Technician(_) => Err(MarketError::Forbidden(
                "Only clients can perform this action".into(),
            )),
            Principal::Anonymous => Err(MarketError::Unauthorized),
        }
    }

    pub fn require_technician(&self) -> Result<&User, MarketError> {
        match self {
            Principal::Technician(u) | Principal::Both(u) => Ok(u),
            Principal::Client(_) => Err(MarketError::Forbidden(
                "Only technicians can perform this action".into(),
            )),
            Principal::Anonymous => Err(MarketError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn user(is_client: bool, is_technician: bool) -> User {
        User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            full_name: "Ada Obi".into(),
            is_client,
            is_technician,
            latitude: Some(6.5244),
            longitude: None,
            api_token: "t".into(),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn flags_pick_the_variant() {
        assert!(matches!(Principal::from_user(None), Principal::Anonymous));
        assert!(matches!(Principal::from_user(Some(user(true, false))), Principal::Client(_)));
        assert!(matches!(
            Principal::from_user(Some(user(false, true))),
            Principal::Technician(_)
        ));
        assert!(matches!(Principal::from_user(Some(user(true, true))), Principal::Both(_)));
    }

    #[test]
    fn role_guards() {
        let tech = Principal::from_user(Some(user(false, true)));
        assert!(tech.require_technician().is_ok());
        assert_eq!(tech.require_client().unwrap_err().code(), ErrorCode::Forbidden);

        let both = Principal::from_user(Some(user(true, true)));
        assert!(both.require_client().is_ok());
        assert!(both.require_technician().is_ok());

        let anon = Principal::Anonymous;
        assert_eq!(anon.require_user().unwrap_err().code(), ErrorCode::Unauthorized);
        assert_eq!(anon.require_client().unwrap_err().code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn coordinates_need_both_halves() {
        assert!(user(true, false).coordinates().is_none());
        let mut u = user(true, false);
        u.longitude = Some(3.3792);
        assert_eq!(u.coordinates(), Some(Coordinates::new(6.5244, 3.3792)));
    }
}
