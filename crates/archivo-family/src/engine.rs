use std::collections::HashSet;

use uuid::Uuid;

use crate::edge::{Edge, NewEdge};
use crate::index::RelationIndex;
use crate::relation::RelationType;

/// What the other endpoint of `edge` is to `viewpoint`.
///
/// Returns `None` when `viewpoint` is not an endpoint of the edge.
pub fn label_for(edge: &Edge, viewpoint: Uuid) -> Option<RelationType> {
    if edge.from_user_id == viewpoint {
        Some(edge.relation_type)
    } else if edge.to_user_id == viewpoint {
        Some(edge.relation_type.inverse())
    } else {
        None
    }
}

/// The endpoint of `edge` that is not `viewpoint`.
pub fn counterpart(edge: &Edge, viewpoint: Uuid) -> Option<Uuid> {
    if edge.from_user_id == viewpoint {
        Some(edge.to_user_id)
    } else if edge.to_user_id == viewpoint {
        Some(edge.from_user_id)
    } else {
        None
    }
}

/// Every relative of `user_id` reachable through one edge, labelled from
/// `user_id`'s side, in edge order.
pub fn relatives<'a>(
    index: &'a RelationIndex<'a>,
    user_id: Uuid,
) -> impl Iterator<Item = (Uuid, RelationType, &'a Edge)> + 'a {
    index.edges_of(user_id).filter_map(move |edge| {
        let other = counterpart(edge, user_id)?;
        let label = label_for(edge, user_id)?;
        Some((other, label, edge))
    })
}

/// Splits a parent/child edge into `(parent, child)`.
fn parent_and_child(edge: &NewEdge) -> Option<(Uuid, Uuid)> {
    match edge.relation_type {
        RelationType::Parent => Some((edge.to_user_id, edge.from_user_id)),
        RelationType::Child => Some((edge.from_user_id, edge.to_user_id)),
        _ => None,
    }
}

/// Edges implied by adding `new_edge` on top of `existing`.
///
/// Only parent/child edges propagate: the new parent also becomes the
/// parent of every existing sibling of the child. Siblings already joined
/// to the parent by any edge are left alone. Other relation types derive
/// nothing.
///
/// `existing` must contain the edges of both the child and the parent for
/// the duplicate check to see everything.
pub fn derive_secondary_relations(new_edge: &NewEdge, existing: &[Edge]) -> Vec<NewEdge> {
    let Some((parent, child)) = parent_and_child(new_edge) else {
        return Vec::new();
    };

    let index = RelationIndex::new(existing);
    let mut seen = HashSet::new();
    let mut derived = Vec::new();

    for (sibling, label, _) in relatives(&index, child) {
        if label != RelationType::Sibling || sibling == parent || sibling == child {
            continue;
        }
        if index.are_connected(sibling, parent) || !seen.insert(sibling) {
            continue;
        }
        derived.push(NewEdge {
            from_user_id: sibling,
            to_user_id: parent,
            relation_type: RelationType::Parent,
        });
    }

    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: Uuid, to: Uuid, kind: RelationType) -> Edge {
        Edge {
            id: Uuid::new_v4(),
            from_user_id: from,
            to_user_id: to,
            relation_type: kind,
        }
    }

    #[test]
    fn label_from_each_endpoint() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let e = edge(a, b, RelationType::Parent);

        assert_eq!(label_for(&e, a), Some(RelationType::Parent));
        assert_eq!(label_for(&e, b), Some(RelationType::Child));
        assert_eq!(label_for(&e, Uuid::new_v4()), None);
    }

    #[test]
    fn target_label_is_inverse_of_source_label() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for kind in RelationType::ALL {
            let e = edge(a, b, kind);
            let from_side = label_for(&e, a).unwrap();
            assert_eq!(label_for(&e, b), Some(from_side.inverse()));
        }
    }

    #[test]
    fn spouse_reads_the_same_both_ways() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let e = edge(a, b, RelationType::Spouse);
        assert_eq!(label_for(&e, b), Some(RelationType::Spouse));
    }

    #[test]
    fn counterpart_picks_the_other_endpoint() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let e = edge(a, b, RelationType::Cousin);
        assert_eq!(counterpart(&e, a), Some(b));
        assert_eq!(counterpart(&e, b), Some(a));
        assert_eq!(counterpart(&e, Uuid::new_v4()), None);
    }

    #[test]
    fn new_parent_is_shared_with_siblings() {
        let (child, parent, s1, s2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        // s1 recorded from the child's side, s2 from the sibling's side
        let existing = vec![
            edge(child, s1, RelationType::Sibling),
            edge(s2, child, RelationType::Sibling),
        ];
        let new_edge = NewEdge::new(child, parent, RelationType::Parent).unwrap();

        let derived = derive_secondary_relations(&new_edge, &existing);
        assert_eq!(
            derived,
            vec![
                NewEdge { from_user_id: s1, to_user_id: parent, relation_type: RelationType::Parent },
                NewEdge { from_user_id: s2, to_user_id: parent, relation_type: RelationType::Parent },
            ]
        );
    }

    #[test]
    fn child_edge_propagates_the_same_way() {
        let (child, parent, sibling) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![edge(child, sibling, RelationType::Sibling)];
        let new_edge = NewEdge::new(parent, child, RelationType::Child).unwrap();

        let derived = derive_secondary_relations(&new_edge, &existing);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].from_user_id, sibling);
        assert_eq!(derived[0].to_user_id, parent);
        assert_eq!(derived[0].relation_type, RelationType::Parent);
    }

    #[test]
    fn already_connected_siblings_are_skipped() {
        let (child, parent, s1, s2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![
            edge(child, s1, RelationType::Sibling),
            edge(child, s2, RelationType::Sibling),
            edge(parent, s1, RelationType::Child),
        ];
        let new_edge = NewEdge::new(child, parent, RelationType::Parent).unwrap();

        let derived = derive_secondary_relations(&new_edge, &existing);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].from_user_id, s2);
    }

    #[test]
    fn non_sibling_relatives_do_not_inherit() {
        let (child, parent, spouse) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![edge(child, spouse, RelationType::Spouse)];
        let new_edge = NewEdge::new(child, parent, RelationType::Parent).unwrap();

        assert!(derive_secondary_relations(&new_edge, &existing).is_empty());
    }

    #[test]
    fn other_relation_types_derive_nothing() {
        let (a, b, sibling) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![edge(a, sibling, RelationType::Sibling)];
        for kind in [RelationType::Spouse, RelationType::Sibling, RelationType::Grandparent, RelationType::Cousin] {
            let new_edge = NewEdge::new(a, b, kind).unwrap();
            assert!(derive_secondary_relations(&new_edge, &existing).is_empty(), "{kind}");
        }
    }

    #[test]
    fn self_relation_is_rejected() {
        let a = Uuid::new_v4();
        assert_eq!(
            NewEdge::new(a, a, RelationType::Parent),
            Err(crate::FamilyError::SelfRelation(a))
        );
    }
}
