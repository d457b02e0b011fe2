//! Router state shared by every handler.

use crate::{config::ConfigError, errors::AppError, services::photo_service::PhotoService};
use std::sync::Arc;

/// Either a ready `PhotoService` or the configuration error that prevented
/// building one. Cloned per request; both variants are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    photos: Result<PhotoService, Arc<ConfigError>>,
}

impl AppState {
    pub fn new(photos: PhotoService) -> Self {
        Self { photos: Ok(photos) }
    }

    pub fn unconfigured(err: ConfigError) -> Self {
        Self {
            photos: Err(Arc::new(err)),
        }
    }

    /// The photo service, or a 500 configuration error.
    pub fn photos(&self) -> Result<&PhotoService, AppError> {
        self.photos
            .as_ref()
            .map_err(|err| AppError::configuration(err))
    }

    pub fn config_error(&self) -> Option<&ConfigError> {
        self.photos.as_ref().err().map(|err| err.as_ref())
    }
}
