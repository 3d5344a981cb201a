//! Archivo family model
//!
//! The relation vocabulary and everything computed from a set of stored
//! family edges: viewpoint labels, secondary-edge propagation and the
//! tree projection. Pure functions only; persistence lives in archivo-db.

pub mod edge;
pub mod engine;
pub mod error;
pub mod index;
pub mod relation;
pub mod tree;

pub use edge::{Edge, NewEdge};
pub use error::FamilyError;
pub use relation::RelationType;
pub use tree::{FamilyTree, TreeMember};
