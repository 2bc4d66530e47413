use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sns::{
    config::{Credentials, Region},
    Client as SnsClient,
};
use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::db::user::ensure_admin_exists;
use crate::notify::{LogNotifier, Postman, SnsNotifier};
use crate::store::{MemoryStore, MongoStore, Repo};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default = "default_password_reset_ttl")]
    password_reset_ttl: u32,
    admin_email: String,
    // secrets
    jwt_secret: String,
    admin_password: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// How long an emailed password reset token stays usable.
    pub fn password_reset_ttl(&self) -> Duration {
        Duration::seconds(self.password_reset_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Email of the administrator created when none exists.
    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    /// Initial password of that administrator.
    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }
}

fn default_password_reset_ttl() -> u32 {
    8 * 60 * 60
}

/// A fairing that loads the application config and puts it in managed state.
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

/// Where entities are kept.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Storage {
    #[default]
    Mongo,
    Memory,
}

fn default_db_name() -> String {
    "evote".to_string()
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    #[serde(default)]
    storage: Storage,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

/// A fairing that opens the configured store, performs any setup
/// necessary, and places a [`Repo`] into managed state. Must be attached
/// after [`ConfigFairing`].
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let repo = match config.storage {
            Storage::Memory => {
                warn!("Using in-memory storage, nothing will persist");
                Repo::new(MemoryStore::new())
            }
            Storage::Mongo => {
                let Some(uri) = config.db_uri else {
                    error!("`db_uri` must be set when `storage` is \"mongo\"");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&uri, &config.db_name).await {
                    Ok(store) => Repo::new(store),
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        // Ensure there is at least one admin user.
        let Some(app_config) = rocket.state::<Config>() else {
            error!("Application config must be loaded before the store");
            return Err(rocket);
        };
        if let Err(e) = ensure_admin_exists(
            &*repo,
            app_config.admin_email(),
            app_config.admin_password(),
        )
        .await
        {
            error!("Failed to set up store: {e}");
            return Err(rocket);
        }
        info!("...store online!");

        // Manage the state.
        rocket = rocket.manage(repo);
        Ok(rocket)
    }
}

/// Configuration for the AWS connection. Everything is optional; without it
/// notifications are only logged.
#[derive(Deserialize)]
struct NotifierConfig {
    // non-secrets
    aws_region: Option<String>,
    aws_access_key_id: Option<String>,
    notification_topic_arn: Option<String>,
    // secrets
    aws_secret_access_key: Option<String>,
}

/// A fairing that loads the AWS config and places a [`Postman`] into managed
/// state.
pub struct NotifierFairing;

#[rocket::async_trait]
impl Fairing for NotifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Notifier",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<NotifierConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load AWS config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let postman = match config {
            NotifierConfig {
                aws_region: Some(region),
                aws_access_key_id: Some(key_id),
                aws_secret_access_key: Some(secret),
                notification_topic_arn: Some(topic_arn),
            } => {
                // Construct the connection.
                let aws_config = SdkConfig::builder()
                    .region(Region::new(region))
                    .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                        key_id,
                        secret,
                        None,
                        None,
                        "rocket config",
                    )))
                    .behavior_version(BehaviorVersion::latest())
                    .build();
                info!("Loaded Amazon SNS config");
                Postman::new(SnsNotifier::new(SnsClient::new(&aws_config), topic_arn))
            }
            _ => {
                warn!("No Amazon SNS config, notifications will only be logged");
                Postman::new(LogNotifier)
            }
        };

        // Manage the state.
        rocket = rocket.manage(postman);
        Ok(rocket)
    }
}
