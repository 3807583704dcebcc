use std::collections::HashMap;

use chrono::Utc;
use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::basis_points::MAX_BASIS_POINTS;
use crate::domain::entities::{
    Branch, BranchId, Recipient, RecipientId, TreeMetadata, ADDRESS_SENTINEL,
};
use crate::domain::error::{DomainError, DomainResult};

/// Branch plus its position in the arena.
#[derive(Debug, Clone)]
pub(crate) struct BranchNode {
    pub(crate) branch: Branch,
    pub(crate) parent: Option<Index>,
    pub(crate) children: Vec<Index>,
}

/// Arena-based split tree.
///
/// Branches live in a generational arena and are addressed by their stable
/// [`BranchId`]; all traversal goes through id/index lookup, so no branch is
/// ever aliased. Traversals use an explicit stack and are safe for
/// arbitrarily deep nesting.
#[derive(Debug, Clone)]
pub struct SplitTree {
    arena: Arena<BranchNode>,
    root: Index,
    ids: HashMap<BranchId, Index>,
    pub metadata: TreeMetadata,
}

impl SplitTree {
    /// New tree whose root holds two 50/50 wallet recipients and a placeholder address.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut root = Branch::new(name.clone(), MAX_BASIS_POINTS);
        root.recipients = vec![
            Recipient::fixed_wallet("Recipient 1", ADDRESS_SENTINEL, MAX_BASIS_POINTS / 2),
            Recipient::fixed_wallet("Recipient 2", ADDRESS_SENTINEL, MAX_BASIS_POINTS / 2),
        ];
        Self::with_root(root, TreeMetadata::new(name))
    }

    /// Tree consisting of `root` only.
    pub fn with_root(root: Branch, metadata: TreeMetadata) -> Self {
        let mut arena = Arena::new();
        let id = root.id.clone();
        let root_idx = arena.insert(BranchNode {
            branch: root,
            parent: None,
            children: Vec::new(),
        });
        let mut ids = HashMap::new();
        ids.insert(id, root_idx);
        Self {
            arena,
            root: root_idx,
            ids,
            metadata,
        }
    }

    /// Attach `branch` under `parent`.
    #[instrument(level = "trace", skip(self, branch), fields(branch = %branch.id))]
    pub(crate) fn insert_branch(&mut self, parent: &BranchId, branch: Branch) -> DomainResult<()> {
        if self.ids.contains_key(&branch.id) {
            return Err(DomainError::DuplicateId(branch.id));
        }
        let parent_idx = self.index_of(parent)?;
        let id = branch.id.clone();
        let idx = self.arena.insert(BranchNode {
            branch,
            parent: Some(parent_idx),
            children: Vec::new(),
        });
        if let Some(parent) = self.arena.get_mut(parent_idx) {
            parent.children.push(idx);
        }
        self.ids.insert(id, idx);
        Ok(())
    }

    /// Detach the subtree rooted at `id` and return the ids of every removed branch.
    pub(crate) fn detach_subtree(&mut self, id: &BranchId) -> DomainResult<Vec<BranchId>> {
        let idx = self.index_of(id)?;
        if idx == self.root {
            return Err(DomainError::RootRemoval);
        }
        let parent_idx = self.arena.get(idx).and_then(|n| n.parent);
        if let Some(parent) = parent_idx.and_then(|p| self.arena.get_mut(p)) {
            parent.children.retain(|&c| c != idx);
        }

        let mut removed = Vec::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.remove(current) {
                stack.extend(node.children);
                self.ids.remove(&node.branch.id);
                removed.push(node.branch.id);
            }
        }
        Ok(removed)
    }

    fn index_of(&self, id: &BranchId) -> DomainResult<Index> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::BranchNotFound(id.clone()))
    }

    pub fn root(&self) -> &Branch {
        &self.arena[self.root].branch
    }

    pub fn root_id(&self) -> &BranchId {
        &self.root().id
    }

    pub fn contains(&self, id: &BranchId) -> bool {
        self.ids.contains_key(id)
    }

    /// Number of branches, root included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn branch(&self, id: &BranchId) -> DomainResult<&Branch> {
        let idx = self.index_of(id)?;
        Ok(&self.arena[idx].branch)
    }

    pub fn branch_mut(&mut self, id: &BranchId) -> DomainResult<&mut Branch> {
        let idx = self.index_of(id)?;
        Ok(&mut self.arena[idx].branch)
    }

    /// Parent id of `id`; `None` for the root.
    pub fn parent_id(&self, id: &BranchId) -> DomainResult<Option<&BranchId>> {
        let idx = self.index_of(id)?;
        Ok(self.arena[idx]
            .parent
            .and_then(|p| self.arena.get(p))
            .map(|n| &n.branch.id))
    }

    /// Direct children of `id`, in insertion order.
    pub fn children(&self, id: &BranchId) -> DomainResult<Vec<&Branch>> {
        let idx = self.index_of(id)?;
        Ok(self.arena[idx]
            .children
            .iter()
            .filter_map(|&c| self.arena.get(c))
            .map(|n| &n.branch)
            .collect())
    }

    /// True if `ancestor` lies on the path from the root to `id` (inclusive).
    pub fn is_ancestor_or_self(&self, ancestor: &BranchId, id: &BranchId) -> DomainResult<bool> {
        let target = self.index_of(ancestor)?;
        let mut current = Some(self.index_of(id)?);
        while let Some(idx) = current {
            if idx == target {
                return Ok(true);
            }
            current = self.arena.get(idx).and_then(|n| n.parent);
        }
        Ok(false)
    }

    /// Locate a recipient anywhere in the tree.
    pub fn find_recipient(&self, id: &RecipientId) -> Option<(&Branch, &Recipient)> {
        self.iter()
            .find_map(|b| b.recipient(id).map(|r| (b, r)))
    }

    /// Pre-order traversal (parents before children, left to right).
    #[instrument(level = "trace", skip(self))]
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    /// Post-order traversal (children before parents, left to right).
    #[instrument(level = "trace", skip(self))]
    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self)
    }

    /// Pre-order traversal that also yields each branch's depth (root = 0).
    pub fn iter_with_depth(&self) -> impl Iterator<Item = (usize, &Branch)> + '_ {
        let mut stack = vec![(self.root, 0usize)];
        std::iter::from_fn(move || {
            let (idx, depth) = stack.pop()?;
            let node = self.arena.get(idx)?;
            for &child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
            Some((depth, &node.branch))
        })
    }

    /// Number of branch levels, the root counting as one.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.iter_with_depth()
            .map(|(depth, _)| depth + 1)
            .max()
            .unwrap_or(0)
    }

    /// Mutable access to every branch, in no particular order.
    pub(crate) fn branches_mut(&mut self) -> impl Iterator<Item = &mut Branch> {
        self.arena.iter_mut().map(|(_, node)| &mut node.branch)
    }

    /// Record a structural change.
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}

pub struct TreeIterator<'a> {
    tree: &'a SplitTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a SplitTree) -> Self {
        Self {
            tree,
            stack: vec![tree.root],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = &'a Branch;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some(&node.branch);
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a SplitTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a SplitTree) -> Self {
        Self {
            tree,
            stack: vec![(tree.root, false)],
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = &'a Branch;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some(&node.branch);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(it: impl Iterator<Item = &'a Branch>) -> Vec<String> {
        it.map(|b| b.name.clone()).collect()
    }

    fn sample() -> SplitTree {
        let mut tree = SplitTree::new("root");
        let root = tree.root_id().clone();
        let a = Branch::new("a", 5000);
        let a_id = a.id.clone();
        tree.insert_branch(&root, a).unwrap();
        tree.insert_branch(&a_id, Branch::new("a1", 10_000)).unwrap();
        tree.insert_branch(&root, Branch::new("b", 5000)).unwrap();
        tree
    }

    #[test]
    fn given_new_tree_then_root_has_default_recipients() {
        let tree = SplitTree::new("Main");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root().recipients.len(), 2);
        assert!(tree.root().recipients.iter().all(|r| r.basis_points == 5000));
        assert!(!tree.root().address.is_real());
        assert_eq!(tree.parent_id(tree.root_id()).unwrap(), None);
    }

    #[test]
    fn test_preorder_and_postorder() {
        let tree = sample();
        assert_eq!(names(tree.iter()), vec!["root", "a", "a1", "b"]);
        assert_eq!(names(tree.iter_postorder()), vec!["a1", "a", "b", "root"]);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn given_subtree_when_detaching_then_all_descendants_removed() {
        let mut tree = sample();
        let a_id = tree.iter().find(|b| b.name == "a").unwrap().id.clone();
        let removed = tree.detach_subtree(&a_id).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(names(tree.iter()), vec!["root", "b"]);
        assert!(!tree.contains(&a_id));
    }

    #[test]
    fn given_root_when_detaching_then_rejected() {
        let mut tree = sample();
        let root = tree.root_id().clone();
        assert_eq!(tree.detach_subtree(&root), Err(DomainError::RootRemoval));
    }

    #[test]
    fn given_deep_chain_when_traversing_then_no_stack_overflow() {
        let mut tree = SplitTree::new("root");
        let mut parent = tree.root_id().clone();
        for i in 0..20_000 {
            let child = Branch::new(format!("level{i}"), 10_000);
            let id = child.id.clone();
            tree.insert_branch(&parent, child).unwrap();
            parent = id;
        }
        assert_eq!(tree.depth(), 20_001);
        assert_eq!(tree.iter_postorder().count(), 20_001);
    }
}
