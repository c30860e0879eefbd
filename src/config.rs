use std::path::{Path, PathBuf};

use chrono::Duration;
use log::{error, info};
use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    fs::FileServer,
    Build, Rocket,
};
use serde::Deserialize;

use crate::error::Result;
use crate::model::{
    db::admin::ensure_admin_exists,
    mongodb::{ensure_indexes_exist, Coll},
    photo::UPLOADS_ROUTE,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    upload_dir: PathBuf,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Directory candidate photos are stored in.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
pub(crate) struct DbConfig {
    // non-secrets
    db_name: String,
    // secrets
    db_uri: String,
    default_admin_password: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(&config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes and at least one admin exist.
        if let Err(e) = prepare_database(&db, &config.default_admin_password).await {
            error!("Failed to prepare database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Ensure the indexes exist and there is an admin who can log in.
pub(crate) async fn prepare_database(db: &Database, default_admin_password: &str) -> Result<()> {
    ensure_indexes_exist(db).await?;
    ensure_admin_exists(&Coll::from_db(db), default_admin_password).await
}

/// The default admin password, for setting up databases outside of [`DatabaseFairing`].
#[cfg(test)]
pub(crate) fn default_admin_password(rocket: &Rocket<Build>) -> String {
    rocket
        .figment()
        .extract::<DbConfig>()
        .map(|config| config.default_admin_password)
        .unwrap_or_else(|_| "change-me-immediately".to_string())
}

/// A fairing that makes sure the photo upload directory exists and serves its
/// contents. Must be attached after [`ConfigFairing`].
pub struct UploadsFairing;

#[rocket::async_trait]
impl Fairing for UploadsFairing {
    fn info(&self) -> Info {
        Info {
            name: "Uploads",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let upload_dir = match rocket.state::<Config>() {
            Some(config) => config.upload_dir().to_path_buf(),
            None => {
                error!("Application config must be loaded before the uploads directory");
                return Err(rocket);
            }
        };

        if let Err(e) = rocket::tokio::fs::create_dir_all(&upload_dir).await {
            error!(
                "Failed to create uploads directory {}: {e}",
                upload_dir.display()
            );
            return Err(rocket);
        }
        info!("Serving uploads from {}", upload_dir.display());

        Ok(rocket.mount(UPLOADS_ROUTE, FileServer::from(upload_dir)))
    }
}
