//! Tests for structural edits on a split tree

use rstest::rstest;

use splittree::domain::{
    AddressType, BranchPatch, DomainError, RecipientId, RecipientPatch, SplitTree,
};

fn empty_root() -> SplitTree {
    let mut tree = SplitTree::new("Main");
    let root = tree.root_id().clone();
    let defaults: Vec<_> = tree.root().recipients.iter().map(|r| r.id.clone()).collect();
    for id in defaults {
        tree.remove_recipient(&root, &id).unwrap();
    }
    tree
}

#[test]
fn given_new_tree_when_created_then_two_half_shares_and_placeholder_address() {
    let tree = SplitTree::new("Payroll");

    assert_eq!(tree.metadata.name, "Payroll");
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root().recipients.len(), 2);
    assert!(tree.root().recipients.iter().all(|r| r.basis_points == 5000));
    assert!(!tree.root().address.is_real());
    assert!(tree.has_placeholders());
}

#[test]
fn given_referenced_branch_when_removed_then_referencing_recipients_dropped() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let keep = tree.add_nested_branch(&root, "keep", 5000).unwrap();
    let gone = tree.add_nested_branch(&root, "gone", 5000).unwrap();
    let inner = tree.add_nested_branch(&gone, "inner", 10_000).unwrap();
    let to_gone = tree.add_branch_recipient(&keep, "to gone", &gone, 5000).unwrap();
    let to_inner = tree.add_branch_recipient(&keep, "to inner", &inner, 5000).unwrap();
    let before = tree.metadata.updated_at;

    let dropped = tree.remove_branch(&root, &gone).unwrap();

    assert_eq!(dropped, vec![to_gone, to_inner]);
    assert!(!tree.contains(&gone));
    assert!(!tree.contains(&inner));
    assert!(tree.branch(&keep).unwrap().recipients.is_empty());
    assert!(tree
        .iter()
        .flat_map(|b| b.recipients.iter())
        .all(|r| r.branch_ref.is_none()));
    assert!(tree.metadata.updated_at >= before);
}

#[test]
fn given_root_when_removing_then_root_removal_error() {
    let mut tree = SplitTree::new("Main");
    let root = tree.root_id().clone();
    assert_eq!(
        tree.remove_branch(&root, &root),
        Err(DomainError::RootRemoval)
    );
}

#[test]
fn given_grandchild_when_removing_from_root_then_not_a_child() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let child = tree.add_nested_branch(&root, "child", 10_000).unwrap();
    let grandchild = tree.add_nested_branch(&child, "grandchild", 10_000).unwrap();

    assert!(matches!(
        tree.remove_branch(&root, &grandchild),
        Err(DomainError::NotAChild { .. })
    ));
    assert!(tree.contains(&grandchild));
}

#[test]
fn given_unknown_ids_when_mutating_then_not_found() {
    let mut tree = SplitTree::new("Main");
    let root = tree.root_id().clone();
    let missing = "id_missing".into();

    assert!(matches!(
        tree.add_fixed_wallet_recipient(&missing, "A", "xch1a", 100),
        Err(DomainError::BranchNotFound(_))
    ));
    assert!(matches!(
        tree.remove_recipient(&root, &RecipientId::from("id_nobody")),
        Err(DomainError::RecipientNotFound { .. })
    ));
    assert!(matches!(
        tree.add_branch_recipient(&root, "ref", &missing, 100),
        Err(DomainError::BranchNotFound(_))
    ));
}

#[test]
fn given_grouping_branch_when_referencing_then_not_resolvable() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let group = tree.add_nested_branch(&root, "group", 5000).unwrap();
    let other = tree.add_nested_branch(&root, "other", 5000).unwrap();
    tree.update_branch(
        &group,
        BranchPatch {
            is_resolvable: Some(false),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(
        tree.add_branch_recipient(&other, "to group", &group, 100),
        Err(DomainError::NotResolvable(group))
    );
}

#[rstest]
#[case::self_reference(true)]
#[case::ancestor_reference(false)]
fn given_reference_up_the_tree_when_adding_then_cycle_rejected(#[case] to_self: bool) {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let child = tree.add_nested_branch(&root, "child", 10_000).unwrap();
    let target = if to_self { child.clone() } else { root.clone() };

    assert!(matches!(
        tree.add_branch_recipient(&child, "loop", &target, 100),
        Err(DomainError::CycleDetected { .. })
    ));
}

#[test]
fn given_referenced_branch_when_made_grouping_then_rejected() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let a = tree.add_nested_branch(&root, "a", 5000).unwrap();
    let b = tree.add_nested_branch(&root, "b", 5000).unwrap();
    tree.add_branch_recipient(&a, "to b", &b, 100).unwrap();

    let result = tree.update_branch(
        &b,
        BranchPatch {
            is_resolvable: Some(false),
            ..Default::default()
        },
    );

    assert_eq!(result, Err(DomainError::NotResolvable(b.clone())));
    assert!(tree.branch(&b).unwrap().is_resolvable);
}

#[rstest]
#[case(10_000, true)]
#[case(10_001, false)]
fn given_basis_points_when_adding_wallet_then_range_checked(#[case] bp: u32, #[case] ok: bool) {
    let mut tree = SplitTree::new("Main");
    let root = tree.root_id().clone();
    assert_eq!(
        tree.add_fixed_wallet_recipient(&root, "A", "xch1a", bp).is_ok(),
        ok
    );
}

#[test]
fn given_branch_reference_when_patching_address_then_invalid_recipient() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let child = tree.add_nested_branch(&root, "child", 5000).unwrap();
    let reference = tree.add_branch_recipient(&root, "to child", &child, 5000).unwrap();

    let result = tree.update_recipient(
        &root,
        &reference,
        RecipientPatch {
            address: Some("xch1manual".to_string()),
            ..Default::default()
        },
    );

    assert!(matches!(result, Err(DomainError::InvalidRecipient { .. })));
}

#[test]
fn given_real_address_when_assigned_then_references_flip_to_real() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let child = tree.add_nested_branch(&root, "child", 5000).unwrap();
    let reference = tree.add_branch_recipient(&root, "to child", &child, 5000).unwrap();
    assert_eq!(
        tree.root().recipient(&reference).unwrap().address_type,
        AddressType::PlaceholderBranch
    );

    tree.assign_real_address(&child, "xch1child").unwrap();

    let recipient = tree.root().recipient(&reference).unwrap();
    assert_eq!(recipient.address_type, AddressType::RealBranch);
    assert_eq!(recipient.address, "xch1child");
    assert_eq!(tree.branch(&child).unwrap().address.real(), Some("xch1child"));
}

#[test]
fn given_fee_when_annotating_then_only_resolvable_branches_get_net_share() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let child = tree.add_nested_branch(&root, "child", 4000).unwrap();
    let group = tree.add_nested_branch(&root, "group", 6000).unwrap();
    tree.update_branch(
        &group,
        BranchPatch {
            is_resolvable: Some(false),
            ..Default::default()
        },
    )
    .unwrap();

    tree.annotate_fees(25);

    let child = tree.branch(&child).unwrap();
    assert_eq!(child.fee_basis_points, Some(25));
    assert_eq!(child.net_basis_points, Some(3975));
    assert_eq!(tree.branch(&group).unwrap().fee_basis_points, None);
}

#[test]
fn given_deep_chain_when_iterating_postorder_then_children_before_parents() {
    let mut tree = empty_root();
    let mut parent = tree.root_id().clone();
    let mut ids = vec![parent.clone()];
    for i in 0..50 {
        parent = tree.add_nested_branch(&parent, format!("level {}", i), 10_000).unwrap();
        ids.push(parent.clone());
    }

    let order: Vec<_> = tree.iter_postorder().map(|b| b.id.clone()).collect();
    ids.reverse();
    assert_eq!(order, ids);
    assert_eq!(tree.depth(), 51);
}

#[test]
fn given_finalized_tree_when_child_share_changes_then_parent_address_reset() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let child = tree.add_nested_branch(&root, "child", 6000).unwrap();
    let wallet = tree.add_fixed_wallet_recipient(&root, "Ann", "xch1ann", 4000).unwrap();
    tree.add_fixed_wallet_recipient(&child, "Cy", "xch1cy", 10_000).unwrap();
    tree.assign_real_address(&child, "xch1child").unwrap();
    tree.assign_real_address(&root, "xch1root").unwrap();
    tree.metadata.is_finalized = true;

    // names are not part of any payout
    tree.rename_branch(&child, "renamed").unwrap();
    tree.update_recipient(
        &root,
        &wallet,
        RecipientPatch {
            name: Some("Anna".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(tree.metadata.is_finalized);
    assert!(tree.root().address.is_real());

    tree.update_branch(
        &child,
        BranchPatch {
            basis_points: Some(5000),
            ..Default::default()
        },
    )
    .unwrap();

    assert!(!tree.metadata.is_finalized);
    assert!(!tree.root().address.is_real());
    assert_eq!(tree.branch(&child).unwrap().address.real(), Some("xch1child"));
}

#[test]
fn given_real_reference_when_target_edited_then_reference_and_holder_reset() {
    let mut tree = empty_root();
    let root = tree.root_id().clone();
    let a = tree.add_nested_branch(&root, "a", 5000).unwrap();
    let b = tree.add_nested_branch(&root, "b", 5000).unwrap();
    tree.add_fixed_wallet_recipient(&b, "Bo", "xch1bo", 10_000).unwrap();
    let reference = tree.add_branch_recipient(&a, "to b", &b, 10_000).unwrap();
    tree.assign_real_address(&b, "xch1b").unwrap();
    tree.assign_real_address(&a, "xch1a").unwrap();
    tree.assign_real_address(&root, "xch1root").unwrap();

    tree.add_fixed_wallet_recipient(&b, "Bea", "xch1bea", 0).unwrap();

    for id in [&a, &b, &root] {
        assert!(!tree.branch(id).unwrap().address.is_real(), "{} kept its address", id);
    }
    let recipient = tree.branch(&a).unwrap().recipient(&reference).unwrap();
    assert_eq!(recipient.address_type, AddressType::PlaceholderBranch);
    assert_eq!(recipient.address, tree.branch(&b).unwrap().address.as_str());
}
