//! Tree document persistence
//!
//! Reads and writes [`TreeDocument`] JSON through the [`FileSystem`] trait.
//! Loading is structural only; [`DocumentService::import`] additionally
//! refuses trees that fail validation.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::validator::validate;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{SplitTree, TreeDocument};
use crate::infrastructure::traits::FileSystem;

/// Service for moving split trees in and out of JSON documents.
pub struct DocumentService {
    fs: Arc<dyn FileSystem>,
}

impl DocumentService {
    /// Create a new document service.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Pretty-printed JSON of the whole tree including metadata.
    pub fn export_json(&self, tree: &SplitTree) -> ApplicationResult<String> {
        serde_json::to_string_pretty(&tree.to_document()).map_err(|e| ApplicationError::Document {
            message: format!("cannot serialize tree: {}", e),
        })
    }

    /// Parse a document, checking structure but not basis points or addresses.
    pub fn load_unchecked(&self, json: &str) -> ApplicationResult<SplitTree> {
        let document: TreeDocument =
            serde_json::from_str(json).map_err(|e| ApplicationError::Document {
                message: format!("malformed tree document: {}", e),
            })?;
        Ok(document.into_tree()?)
    }

    /// Parse a document and accept it only if it validates.
    pub fn import(&self, json: &str) -> ApplicationResult<SplitTree> {
        let tree = self.load_unchecked(json)?;
        let report = validate(&tree);
        if !report.valid {
            return Err(ApplicationError::InvalidTree {
                errors: report.errors,
            });
        }
        debug!("imported tree {} with {} branches", tree.metadata.name, tree.len());
        Ok(tree)
    }

    /// Read a tree file without validating it, so broken trees can still be repaired.
    pub fn load_file(&self, path: &Path) -> ApplicationResult<SplitTree> {
        if !self.fs.exists(path) {
            return Err(ApplicationError::Document {
                message: format!("tree file not found: {}", path.display()),
            });
        }
        let json = self
            .fs
            .read_to_string(path)
            .with_path_context("read tree", path)?;
        self.load_unchecked(&json)
    }

    pub fn save_file(&self, tree: &SplitTree, path: &Path) -> ApplicationResult<()> {
        let json = self.export_json(tree)?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create directory for", path)?;
        self.fs
            .write(path, &json)
            .with_path_context("write tree", path)?;
        info!("saved {} to {}", tree.metadata.name, path.display());
        Ok(())
    }
}
