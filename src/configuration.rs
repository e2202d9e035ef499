use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;

pub const DEFAULT_REGION: &str = "dev";

#[derive(serde::Deserialize, Debug, Clone)]
pub struct Settings {
    pub db_name: String,
    pub db_url: String,
    pub fly_auth_token: String,
    pub fly_image_id: String,
    pub sui_pk: String,
    #[serde(default = "default_region")]
    pub fly_region: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub database_name: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Settings {
    /// Reads `.env` if present, then the optional `configuration` file, then the process
    /// environment. Later sources win.
    pub fn from_configuration() -> Result<Self, config::ConfigError> {
        // A missing .env file is fine, the variables may already be exported
        let _ = dotenvy::dotenv();
        let mut settings = config::Config::default();
        settings.merge(config::File::with_name("configuration").required(false))?;
        settings.merge(config::Environment::new())?;
        Self::from_config(settings)
    }

    pub fn from_config(mut settings: config::Config) -> Result<Self, config::ConfigError> {
        settings.set_default("fly_region", DEFAULT_REGION)?;
        settings.try_into()
    }

    pub fn database(&self) -> DatabaseSettings {
        DatabaseSettings {
            url: self.db_url.clone(),
            database_name: self.db_name.clone(),
        }
    }
}

impl DatabaseSettings {
    pub fn with_db(&self) -> Result<PgConnectOptions, sqlx::Error> {
        Ok(PgConnectOptions::from_str(&self.url)?.database(&self.database_name))
    }
}
