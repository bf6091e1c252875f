//! User records exchanged with clients and the data platform

use serde::{Deserialize, Serialize};
use userbridge_core::{UserId, ValidateInput, ValidationError};

/// User record as returned by the user lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Fields returned by the update mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedUser {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Partial update; only provided fields are sent upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self == &UserUpdate::default()
    }

    fn check(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::new("Update must contain at least one field"));
        }

        if let Some(latitude) = self.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(ValidationError::new(format!(
                    "Latitude {latitude} is out of range [-90, 90]"
                )));
            }
        }

        if let Some(longitude) = self.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(ValidationError::new(format!(
                    "Longitude {longitude} is out of range [-180, 180]"
                )));
            }
        }

        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(ValidationError::new(format!("Invalid email address: '{email}'")));
            }
        }

        Ok(())
    }
}

/// Update request as received: raw path id plus body
#[derive(Debug, Clone)]
pub struct UpdateUserRequest {
    pub id: String,
    pub changes: UserUpdate,
}

/// Update request whose id and body passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct UserChange {
    pub id: UserId,
    pub changes: UserUpdate,
}

impl ValidateInput for UpdateUserRequest {
    type Validated = UserChange;

    fn validate(self) -> Result<UserChange, ValidationError> {
        let id = UserId::parse(&self.id)?;
        self.changes.check()?;
        Ok(UserChange {
            id,
            changes: self.changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "6f1c2a8e-3c1b-4f8e-9a43-0d1e5b7c9a10";

    fn request(changes: UserUpdate) -> UpdateUserRequest {
        UpdateUserRequest {
            id: ID.to_string(),
            changes,
        }
    }

    #[test]
    fn test_only_provided_fields_serialize() {
        let update = UserUpdate {
            first_name: Some("Ada".into()),
            latitude: Some(51.5),
            ..UserUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "first_name": "Ada", "latitude": 51.5 })
        );
    }

    #[test]
    fn test_valid_update() {
        let change = request(UserUpdate {
            email: Some("ada@example.com".into()),
            ..UserUpdate::default()
        })
        .validate()
        .unwrap();
        assert_eq!(change.id.to_string(), ID);
    }

    #[test]
    fn test_rejects_empty_update() {
        let err = request(UserUpdate::default()).validate().unwrap_err();
        assert!(err.reason().contains("at least one field"));
    }

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        assert!(request(UserUpdate {
            latitude: Some(91.0),
            ..UserUpdate::default()
        })
        .validate()
        .is_err());

        assert!(request(UserUpdate {
            longitude: Some(-180.5),
            ..UserUpdate::default()
        })
        .validate()
        .is_err());
    }

    #[test]
    fn test_rejects_malformed_email() {
        let err = request(UserUpdate {
            email: Some("ada.example.com".into()),
            ..UserUpdate::default()
        })
        .validate()
        .unwrap_err();
        assert!(err.reason().contains("email"));
    }

    #[test]
    fn test_rejects_bad_id_before_body() {
        let err = UpdateUserRequest {
            id: "abc".into(),
            changes: UserUpdate::default(),
        }
        .validate()
        .unwrap_err();
        assert!(err.reason().contains("not a valid UUID"));
    }
}
