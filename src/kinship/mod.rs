//! Person records and the relationship inference built on top of them.
//!
//! The stored model is deliberately small: every [`Person`] points at an
//! optional father and mother, and only spouse [`Relationship`]s are stored
//! explicitly. [`resolve`] derives everything else (children, siblings,
//! co-parents, ancestors, descendants and generation numbers).

mod resolve;
mod types;

pub use resolve::{ExtendedPerson, Kinship, KinshipMap, derive_persons, filter_by_search, full_name, resolve};
pub use types::{
	Gender, NEW_PERSON_ID, Person, PersonId, Position, Registry, RegistryError, Relationship, RelationshipKind,
};
