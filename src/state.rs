use crate::config::Settings;
use crate::db::Database;
use crate::error::AppResult;
use crate::uploads::UploadStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub uploads: UploadStore,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(db: Database, uploads: UploadStore, max_upload_bytes: usize) -> Self {
        Self {
            db,
            uploads,
            max_upload_bytes,
        }
    }

    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        let db = Database::connect(&settings.database.url, settings.database.pool_size)?;
        let uploads = UploadStore::open(&settings.uploads.dir)?;

        Ok(Self::new(db, uploads, settings.uploads.max_bytes))
    }
}
