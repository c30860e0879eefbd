use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::password::{self, PasswordHash, MIN_PASSWORD_LENGTH},
    db::admin::{Admin, NewAdmin, DEFAULT_ADMIN_ROLE},
};

/// Raw admin credentials, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AdminCredentials {
    /// Reject credentials with a missing field.
    pub fn require_fields(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(Error::bad_request("Username and password required"));
        }
        Ok(())
    }
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = Error;

    /// Convert [`AdminCredentials`] to a new [`Admin`] by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self> {
        cred.require_fields()?;
        if !password::is_acceptable(&cred.password) {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        Ok(Self {
            username: cred.username.trim().to_string(),
            password_hash: PasswordHash::new(&cred.password)?,
            role: DEFAULT_ADMIN_ROLE.to_string(),
        })
    }
}

/// A request to change an admin's password.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdate {
    pub username: String,
    pub current_password: String,
    pub new_password: String,
}

impl PasswordUpdate {
    /// Check all fields are present and the new password is acceptable.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty()
            || self.current_password.is_empty()
            || self.new_password.is_empty()
        {
            return Err(Error::bad_request(
                "Username, current password and new password are required",
            ));
        }
        if !password::is_acceptable(&self.new_password) {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Public view of an admin account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AdminDescription {
    pub id: ApiId,
    pub username: String,
    pub role: String,
}

impl From<Admin> for AdminDescription {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id.into(),
            username: admin.admin.username,
            role: admin.admin.role,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_to_admin() {
        let admin = NewAdmin::try_from(AdminCredentials::example2()).unwrap();
        assert_eq!(admin.username, "returning-officer");
        assert!(admin.verify_password("totallysecurepassword"));
        assert_eq!(admin.role, DEFAULT_ADMIN_ROLE);

        assert!(NewAdmin::try_from(AdminCredentials::empty()).is_err());
        let short = AdminCredentials {
            username: "shorty".into(),
            password: "1234567".into(),
        };
        assert!(NewAdmin::try_from(short).is_err());
    }

    #[test]
    fn password_update_validation() {
        let mut update = PasswordUpdate {
            username: "coordinator".into(),
            current_password: "coordinator-password".into(),
            new_password: "brand-new-password".into(),
        };
        assert!(update.validate().is_ok());
        update.new_password = "short".into();
        assert!(update.validate().is_err());
        update.current_password = "".into();
        assert!(update.validate().is_err());
    }
}
