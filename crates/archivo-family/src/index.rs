use std::collections::HashMap;

use uuid::Uuid;

use crate::edge::Edge;

/// Adjacency lookup over a borrowed edge list: user id -> incident edges,
/// in the order they appear in the list.
pub struct RelationIndex<'a> {
    edges: &'a [Edge],
    incident: HashMap<Uuid, Vec<usize>>,
}

impl<'a> RelationIndex<'a> {
    pub fn new(edges: &'a [Edge]) -> Self {
        let mut incident: HashMap<Uuid, Vec<usize>> = HashMap::new();
        for (pos, edge) in edges.iter().enumerate() {
            incident.entry(edge.from_user_id).or_default().push(pos);
            if edge.to_user_id != edge.from_user_id {
                incident.entry(edge.to_user_id).or_default().push(pos);
            }
        }
        Self { edges, incident }
    }

    pub fn edges_of(&self, user_id: Uuid) -> impl Iterator<Item = &'a Edge> + '_ {
        let edges = self.edges;
        self.incident
            .get(&user_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &edges[pos])
    }

    pub fn are_connected(&self, a: Uuid, b: Uuid) -> bool {
        self.edges_of(a).any(|edge| edge.connects(a, b))
    }
}
