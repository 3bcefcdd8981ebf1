use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Address the web server listens on.
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Path of the `sqlite3` database file.
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    /// Directory student photos are saved into.
    pub dir: String,
    /// Largest accepted registration form, photo included.
    pub max_bytes: usize,
}

impl Settings {
    /// Loads settings from built-in defaults, then the optional `<name>.toml` file, then
    /// `ATTENDANCE__<SECTION>__<KEY>` environment variables.
    ///
    /// `DATABASE_URL`, from the environment or a `.env` file, overrides `database.url`.
    pub fn load(name: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            .set_default("server.bind", "127.0.0.1:5000")?
            .set_default("database.url", "smart_attendance.db")?
            .set_default("database.pool_size", 8_i64)?
            .set_default("uploads.dir", "static/uploads")?
            .set_default("uploads.max_bytes", 10_485_760_i64)?
            .add_source(File::with_name(name).required(false))
            .add_source(
                Environment::with_prefix("ATTENDANCE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.toml");
        std::fs::write(
            &path,
            "[server]\nbind = \"0.0.0.0:8080\"\n\n[uploads]\ndir = \"/srv/photos\"\n",
        )
        .unwrap();

        let name = dir.path().join("attendance");
        let settings = Settings::load(name.to_str().unwrap()).unwrap();

        assert_eq!(settings.server.bind, "0.0.0.0:8080");
        assert_eq!(settings.uploads.dir, "/srv/photos");
        assert_eq!(settings.uploads.max_bytes, 10_485_760);
    }
}
