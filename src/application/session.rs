//! Shared editing session around one split tree
//!
//! Edits and finalization are serialized through an async mutex: a
//! finalization pass holds the lock for its whole run, so concurrent edits
//! either wait ([`SplitSession::edit`]) or fail fast with
//! [`ApplicationError::Busy`] ([`SplitSession::try_edit`]). Listeners are
//! notified after every change with the tree as it is now.

use std::sync::RwLock;

use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::application::finalize::{FinalizationReport, Finalizer};
use crate::application::validator::{validate, ValidationReport};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::SplitTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    Replaced,
    Edited,
    Finalized { success: bool },
}

type Listener = Box<dyn Fn(&TreeEvent, &SplitTree) + Send + Sync>;

pub struct SplitSession {
    tree: Mutex<SplitTree>,
    listeners: RwLock<Vec<Listener>>,
}

impl SplitSession {
    pub fn new(tree: SplitTree) -> Self {
        Self {
            tree: Mutex::new(tree),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&TreeEvent, &SplitTree) + Send + Sync + 'static) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(Box::new(listener)),
            Err(_) => warn!("listener registry poisoned, subscription dropped"),
        }
    }

    /// Copy of the current tree, waiting for any running edit or pass.
    pub async fn snapshot(&self) -> SplitTree {
        self.tree.lock().await.clone()
    }

    pub async fn validate(&self) -> ValidationReport {
        validate(&*self.tree.lock().await)
    }

    /// Apply `f` once the tree is free. Domain errors leave the tree as `f` left it.
    pub async fn edit<T, F>(&self, f: F) -> ApplicationResult<T>
    where
        F: FnOnce(&mut SplitTree) -> ApplicationResult<T>,
    {
        let mut tree = self.tree.lock().await;
        self.apply(&mut tree, f)
    }

    /// Apply `f` only if no edit or finalization pass currently holds the tree.
    pub fn try_edit<T, F>(&self, f: F) -> ApplicationResult<T>
    where
        F: FnOnce(&mut SplitTree) -> ApplicationResult<T>,
    {
        let mut tree = self.tree.try_lock().map_err(|_| ApplicationError::Busy)?;
        self.apply(&mut tree, f)
    }

    pub async fn replace(&self, tree: SplitTree) {
        let mut current = self.tree.lock().await;
        *current = tree;
        self.notify(&TreeEvent::Replaced, &current);
    }

    /// Finalize under the lock; edits are rejected or queued until the pass ends.
    pub async fn finalize(&self, finalizer: &Finalizer) -> ApplicationResult<FinalizationReport> {
        let (_keep_open, shutdown) = watch::channel(false);
        self.finalize_until(finalizer, shutdown).await
    }

    pub async fn finalize_until(
        &self,
        finalizer: &Finalizer,
        shutdown: watch::Receiver<bool>,
    ) -> ApplicationResult<FinalizationReport> {
        let mut tree = self.tree.lock().await;
        let report = finalizer.finalize_until(&mut tree, shutdown).await?;
        self.notify(
            &TreeEvent::Finalized {
                success: report.success,
            },
            &tree,
        );
        Ok(report)
    }

    fn apply<T, F>(&self, tree: &mut SplitTree, f: F) -> ApplicationResult<T>
    where
        F: FnOnce(&mut SplitTree) -> ApplicationResult<T>,
    {
        let result = f(tree)?;
        tree.touch();
        self.notify(&TreeEvent::Edited, tree);
        Ok(result)
    }

    fn notify(&self, event: &TreeEvent, tree: &SplitTree) {
        debug!(?event, "notify");
        if let Ok(listeners) = self.listeners.read() {
            for listener in listeners.iter() {
                listener(event, tree);
            }
        }
    }
}
