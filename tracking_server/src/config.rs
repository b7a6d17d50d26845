use std::{env, io::Write, time::Duration};

use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use tempfile::NamedTempFile;

use crate::helpers::Secret;

const DEFAULT_DTS_HOST: &str = "127.0.0.1";
const DEFAULT_DTS_PORT: u16 = 8470;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Optional per-order floor on the interval between accepted location updates from one
    /// connection. `None` disables throttling (the default); it is a hardening knob, not part of
    /// the protocol contract.
    pub min_update_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DTS_HOST.to_string(),
            port: DEFAULT_DTS_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            min_update_interval: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DTS_HOST").ok().unwrap_or_else(|| DEFAULT_DTS_HOST.into());
        let port = env::var("DTS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DTS_PORT. {e} Using the default, {DEFAULT_DTS_PORT}, instead."
                    );
                    DEFAULT_DTS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DTS_PORT);
        let database_url = env::var("DTS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ DTS_DATABASE_URL is not set. Please set it to the URL for the tracking database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration from the environment. {e} Reverting to the \
                 default configuration.");
            AuthConfig::default()
        });
        let min_update_interval = env::var("DTS_MIN_UPDATE_INTERVAL_MS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid value for DTS_MIN_UPDATE_INTERVAL_MS. {e} Throttling disabled."))
                    .ok()
            })
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        Self { host, port, database_url, auth, min_update_interval }
    }
}

//-------------------------------------------------  AuthConfig  -----------------------------------------------------

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to verify access tokens minted by the identity service.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT verification secret has not been set. I'm using a random value for this session. DO NOT \
             operate in production like this, since no externally-issued token will validate. 🚨️🚨️🚨️"
        );
        let secret: String = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        let tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        match tmpfile {
            Some((mut f, p)) => {
                let key_data = json!({ "jwt_secret": &secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the DTS_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret.");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, env::VarError> {
        let secret = env::var("DTS_JWT_SECRET")?;
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}
