use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::edge::Edge;
use crate::engine::relatives;
use crate::index::RelationIndex;
use crate::relation::RelationType;

/// One relative placed in a tree bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeMember {
    pub user_id: Uuid,
    /// The edge joining this relative to the root; `None` when inferred.
    pub relation_id: Option<Uuid>,
    pub inferred: bool,
}

/// The root's relatives grouped by how they relate to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyTree {
    pub root: Uuid,
    pub buckets: BTreeMap<RelationType, Vec<TreeMember>>,
}

impl FamilyTree {
    /// Classify the root's neighbours in `edges`.
    ///
    /// Direct edges are bucketed by their label from the root's side.
    /// Grandparents are also inferred through each direct parent's own
    /// parents, and grandchildren through each direct child's children.
    /// A user lands in at most one bucket; direct placement wins.
    pub fn project(root: Uuid, edges: &[Edge]) -> Self {
        let index = RelationIndex::new(edges);
        let mut placed = HashSet::from([root]);
        let mut buckets: BTreeMap<RelationType, Vec<TreeMember>> = BTreeMap::new();

        for (other, label, edge) in relatives(&index, root) {
            if !placed.insert(other) {
                continue;
            }
            buckets.entry(label).or_default().push(TreeMember {
                user_id: other,
                relation_id: Some(edge.id),
                inferred: false,
            });
        }

        for (via, hop, bucket) in [
            (RelationType::Parent, RelationType::Parent, RelationType::Grandparent),
            (RelationType::Child, RelationType::Child, RelationType::Grandchild),
        ] {
            let direct: Vec<Uuid> = buckets
                .get(&via)
                .map(|members| members.iter().map(|m| m.user_id).collect())
                .unwrap_or_default();

            for relative in direct {
                for (other, label, _) in relatives(&index, relative) {
                    if label != hop || !placed.insert(other) {
                        continue;
                    }
                    buckets.entry(bucket).or_default().push(TreeMember {
                        user_id: other,
                        relation_id: None,
                        inferred: true,
                    });
                }
            }
        }

        Self { root, buckets }
    }

    pub fn bucket(&self, kind: RelationType) -> &[TreeMember] {
        self.buckets.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn user_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.buckets.values().flatten().map(|m| m.user_id)
    }
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

    fn ids(members: &[TreeMember]) -> Vec<Uuid> {
        members.iter().map(|m| m.user_id).collect()
    }

    #[test]
    fn parent_and_sibling_from_both_viewpoints() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![
            edge(a, b, RelationType::Parent),
            edge(a, c, RelationType::Sibling),
        ];

        let from_a = FamilyTree::project(a, &edges);
        assert_eq!(ids(from_a.bucket(RelationType::Parent)), vec![b]);
        assert_eq!(ids(from_a.bucket(RelationType::Sibling)), vec![c]);
        assert_eq!(from_a.buckets.len(), 2);

        let from_b = FamilyTree::project(b, &edges);
        assert_eq!(ids(from_b.bucket(RelationType::Child)), vec![a]);
        assert_eq!(from_b.bucket(RelationType::Child)[0].relation_id, Some(edges[0].id));
        // c is not adjacent to b
        assert_eq!(from_b.user_ids().count(), 1);
    }

    #[test]
    fn grandparents_are_inferred_through_parents() {
        let (me, mom, grandma, uncle) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![
            edge(me, mom, RelationType::Parent),
            edge(grandma, mom, RelationType::Child),
            edge(mom, uncle, RelationType::Sibling),
        ];

        let tree = FamilyTree::project(me, &edges);
        let grandparents = tree.bucket(RelationType::Grandparent);
        assert_eq!(ids(grandparents), vec![grandma]);
        assert!(grandparents[0].inferred);
        assert_eq!(grandparents[0].relation_id, None);
        // only one hop beyond the parent, and only through parent edges
        assert!(!tree.user_ids().any(|id| id == uncle));
    }

    #[test]
    fn grandchildren_are_inferred_through_children() {
        let (me, son, grandson) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![
            edge(son, me, RelationType::Parent),
            edge(grandson, son, RelationType::Parent),
        ];

        let tree = FamilyTree::project(me, &edges);
        assert_eq!(ids(tree.bucket(RelationType::Child)), vec![son]);
        assert_eq!(ids(tree.bucket(RelationType::Grandchild)), vec![grandson]);
    }

    #[test]
    fn direct_grandparent_edge_is_not_duplicated() {
        let (me, dad, grandpa) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![
            edge(me, dad, RelationType::Parent),
            edge(dad, grandpa, RelationType::Parent),
            edge(me, grandpa, RelationType::Grandparent),
        ];

        let tree = FamilyTree::project(me, &edges);
        let grandparents = tree.bucket(RelationType::Grandparent);
        assert_eq!(grandparents.len(), 1);
        assert!(!grandparents[0].inferred);
    }

    #[test]
    fn extended_kinds_get_their_own_buckets() {
        let (me, aunt, nephew, cousin, wife) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let edges = vec![
            edge(nephew, me, RelationType::AuntUncle),
            edge(me, aunt, RelationType::AuntUncle),
            edge(cousin, me, RelationType::Cousin),
            edge(wife, me, RelationType::Spouse),
        ];

        let tree = FamilyTree::project(me, &edges);
        assert_eq!(ids(tree.bucket(RelationType::NieceNephew)), vec![nephew]);
        assert_eq!(ids(tree.bucket(RelationType::AuntUncle)), vec![aunt]);
        assert_eq!(ids(tree.bucket(RelationType::Cousin)), vec![cousin]);
        assert_eq!(ids(tree.bucket(RelationType::Spouse)), vec![wife]);
    }

    #[test]
    fn isolated_root_has_no_buckets() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![edge(b, c, RelationType::Spouse)];
        let tree = FamilyTree::project(a, &edges);
        assert!(tree.buckets.is_empty());
    }

    #[test]
    fn serializes_buckets_by_token() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let tree = FamilyTree::project(a, &[edge(a, b, RelationType::NieceNephew)]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["buckets"]["niece_nephew"][0]["user_id"], b.to_string());
    }
}
