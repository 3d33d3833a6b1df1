//! Document service
//!
//! Builds documents from settings and drives them with edit scripts.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::script::{EditScript, ScriptRunner};
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{Document, DocumentConfig, NodeId};
use crate::infrastructure::traits::FileSystem;

/// Result of running a script: the edited document and its label bindings.
#[derive(Debug)]
pub struct ScriptOutcome {
    pub document: Document,
    pub labels: BTreeMap<String, NodeId>,
}

/// Service for creating and scripting documents.
pub struct DocumentService {
    settings: Arc<Settings>,
    fs: Arc<dyn FileSystem>,
}

impl DocumentService {
    pub fn new(settings: Arc<Settings>, fs: Arc<dyn FileSystem>) -> Self {
        Self { settings, fs }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Read and parse a script file.
    pub fn load_script(&self, path: &Path) -> ApplicationResult<EditScript> {
        if !self.fs.exists(path) {
            return Err(ApplicationError::OperationFailed {
                context: format!("script not found: {}", path.display()),
                source: "file does not exist".into(),
            });
        }
        let source =
            self.fs
                .read_to_string(path)
                .map_err(|e| ApplicationError::OperationFailed {
                    context: format!("read script {}", path.display()),
                    source: Box::new(e),
                })?;
        EditScript::parse(&source)
    }

    /// Run the script at `path` against a fresh document.
    #[instrument(level = "debug", skip(self))]
    pub fn run_file(&self, path: &Path) -> ApplicationResult<ScriptOutcome> {
        let script = self.load_script(path)?;
        self.run_script(&script)
    }

    /// Like [`run_file`](Self::run_file), but every edit is followed by the
    /// full invariant sweep regardless of settings, and the final snapshot
    /// is swept once more.
    #[instrument(level = "debug", skip(self))]
    pub fn check_file(&self, path: &Path) -> ApplicationResult<ScriptOutcome> {
        let script = self.load_script(path)?;
        let mut config = self.settings.document_config();
        config.verify_invariants = true;
        let outcome = self.run_script_with(&script, config)?;
        outcome.document.snapshot().check_invariants()?;
        Ok(outcome)
    }

    /// Run script source against a fresh document.
    pub fn run_source(&self, source: &str) -> ApplicationResult<ScriptOutcome> {
        let script = EditScript::parse(source)?;
        self.run_script(&script)
    }

    fn run_script(&self, script: &EditScript) -> ApplicationResult<ScriptOutcome> {
        self.run_script_with(script, self.settings.document_config())
    }

    fn run_script_with(
        &self,
        script: &EditScript,
        config: DocumentConfig,
    ) -> ApplicationResult<ScriptOutcome> {
        debug!(
            "new document: root_type={} verify={}",
            config.root_type, config.verify_invariants
        );
        let mut document = Document::with_config(self.settings.catalogue.clone(), config)?;
        let mut runner = ScriptRunner::new();
        runner.run(&mut document, script)?;
        info!(
            "script finished: {} nodes, undo depth {}",
            document.snapshot().len(),
            document.history().undo_depth()
        );
        debug!("labels: {:?}", runner.labels());
        Ok(ScriptOutcome {
            document,
            labels: runner.into_labels(),
        })
    }
}
