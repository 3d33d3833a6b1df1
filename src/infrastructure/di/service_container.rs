//! Service container for dependency injection
//!
//! Wires the document service to settings and the filesystem.

use std::sync::Arc;

use crate::application::services::DocumentService;
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    pub documents: DocumentService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let documents = DocumentService::new(Arc::clone(&settings), Arc::clone(&fs));

        Self {
            settings,
            fs,
            documents,
        }
    }
}
