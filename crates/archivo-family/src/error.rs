use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FamilyError {
    #[error("invalid relation type: {0:?}")]
    InvalidRelationType(String),

    #[error("user {0} cannot be related to themselves")]
    SelfRelation(Uuid),
}
