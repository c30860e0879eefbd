use std::ops::{Deref, DerefMut};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::password::PasswordHash,
    mongodb::{Coll, Id},
};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_ROLE: &str = "admin";

fn default_role() -> String {
    DEFAULT_ADMIN_ROLE.to_string()
}

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCore {
    pub username: String,
    pub password_hash: PasswordHash,
    #[serde(default = "default_role")]
    pub role: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password(&self, password: &str) -> bool {
        self.password_hash.verify(password)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Ensure there is at least one admin, creating the default admin with the given
/// password if the collection is empty.
pub async fn ensure_admin_exists(admins: &Coll<NewAdmin>, default_password: &str) -> Result<()> {
    let count = admins.count_documents(None, None).await?;
    if count > 0 {
        return Ok(());
    }

    warn!("No admins found, creating default admin '{DEFAULT_ADMIN_USERNAME}'");
    let admin = NewAdmin {
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        password_hash: PasswordHash::new(default_password)?,
        role: default_role(),
    };
    admins.insert_one(admin, None).await?;
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCore {
        pub fn example() -> Self {
            Self {
                username: "coordinator".to_string(),
                password_hash: PasswordHash::new("coordinator-password").unwrap(),
                role: default_role(),
            }
        }
    }
}
