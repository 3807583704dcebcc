//! Tree display via termtree

use std::collections::HashMap;

use termtree::Tree;

use crate::domain::basis_points::format_basis_points;
use crate::domain::{AddressType, Branch, BranchId, Recipient, SplitTree};

fn branch_label(branch: &Branch) -> String {
    let kind = if branch.is_resolvable { "split" } else { "group" };
    format!(
        "{} [{} bp, {}] ({}) {}",
        branch.name,
        branch.basis_points,
        format_basis_points(branch.basis_points as u64, 2),
        kind,
        branch.address.as_str()
    )
}

fn recipient_label(tree: &SplitTree, recipient: &Recipient) -> String {
    let target = match (&recipient.address_type, &recipient.branch_ref) {
        (AddressType::FixedWallet, _) => recipient.address.clone(),
        (_, Some(id)) => match tree.branch(id) {
            Ok(branch) => format!("-> {}", branch.name),
            Err(_) => format!("-> missing {}", id),
        },
        (_, None) => "-> ?".to_string(),
    };
    format!(
        "{} {} bp ({}) {} <{}>",
        recipient.name,
        recipient.basis_points,
        format_basis_points(recipient.basis_points as u64, 2),
        target,
        recipient.id
    )
}

/// Children are complete before their parent in post-order, so each
/// rendered subtree is moved into its parent.
pub fn to_tree_string(tree: &SplitTree) -> Tree<String> {
    let mut finished: HashMap<BranchId, Tree<String>> = HashMap::new();
    for branch in tree.iter_postorder() {
        let mut node = Tree::new(branch_label(branch));
        for recipient in &branch.recipients {
            node.push(Tree::new(recipient_label(tree, recipient)));
        }
        for child in tree.children(&branch.id).unwrap_or_default() {
            if let Some(subtree) = finished.remove(&child.id) {
                node.push(subtree);
            }
        }
        finished.insert(branch.id.clone(), node);
    }
    finished
        .remove(tree.root_id())
        .unwrap_or_else(|| Tree::new(branch_label(tree.root())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_nested_tree_when_rendering_then_children_below_parent() {
        let mut tree = SplitTree::new("Main");
        let root = tree.root_id().clone();
        let child = tree.add_nested_branch(&root, "Team", 2000).unwrap();
        tree.add_fixed_wallet_recipient(&child, "Dana", "xch1dana", 10_000)
            .unwrap();

        let rendered = to_tree_string(&tree).to_string();
        let lines: Vec<&str> = rendered.lines().collect();

        assert!(lines[0].starts_with("Main [10000 bp, 100.00%] (split)"));
        let team = lines.iter().position(|l| l.contains("Team [2000 bp")).unwrap();
        let dana = lines.iter().position(|l| l.contains("Dana 10000 bp")).unwrap();
        assert!(team < dana);
        assert_eq!(lines.len(), 5);
    }
}
