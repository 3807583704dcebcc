//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;
use std::time::Duration;

use crate::application::services::DocumentService;
use crate::application::Finalizer;
use crate::config::Settings;
use crate::infrastructure::traits::{AddressCreator, FileSystem, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    documents: DocumentService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let documents = DocumentService::new(fs.clone());

        Self {
            settings,
            fs,
            documents,
        }
    }

    pub fn documents(&self) -> &DocumentService {
        &self.documents
    }

    /// Finalizer over `creator`, bounded by the configured creation timeout.
    pub fn finalizer(&self, creator: Arc<dyn AddressCreator>) -> Finalizer {
        Finalizer::new(creator).with_timeout(Duration::from_secs(self.settings.creation_timeout_secs))
    }
}
