//! Path context for tree document I/O

use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Turns a bare `io::Error` from the [`FileSystem`] boundary into an
/// [`ApplicationError::OperationFailed`] naming the tree file involved.
///
/// ```ignore
/// let json = fs.read_to_string(path).with_path_context("read tree", path)?;
/// ```
///
/// [`FileSystem`]: crate::infrastructure::traits::FileSystem
pub trait IoResultExt<T> {
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{} {}", action, path.display()),
            source: Box::new(e),
        })
    }
}
