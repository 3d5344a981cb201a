use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FamilyError;
use crate::relation::RelationType;

/// A stored family relation: `to_user_id` is `from_user_id`'s `relation_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub relation_type: RelationType,
}

/// An edge that has not been persisted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEdge {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub relation_type: RelationType,
}

impl NewEdge {
    pub fn new(from_user_id: Uuid, to_user_id: Uuid, relation_type: RelationType) -> Result<Self, FamilyError> {
        if from_user_id == to_user_id {
            return Err(FamilyError::SelfRelation(from_user_id));
        }
        Ok(Self { from_user_id, to_user_id, relation_type })
    }

    pub fn with_id(self, id: Uuid) -> Edge {
        Edge {
            id,
            from_user_id: self.from_user_id,
            to_user_id: self.to_user_id,
            relation_type: self.relation_type,
        }
    }
}

impl Edge {
    pub fn touches(&self, user_id: Uuid) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }

    /// True if this edge joins `a` and `b`, in either direction.
    pub fn connects(&self, a: Uuid, b: Uuid) -> bool {
        (self.from_user_id == a && self.to_user_id == b)
            || (self.from_user_id == b && self.to_user_id == a)
    }
}
