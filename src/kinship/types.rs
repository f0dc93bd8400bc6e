use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque person identifier.
pub type PersonId = String;

/// Id carried by a person that has not been saved yet.
pub const NEW_PERSON_ID: &str = "new";

/// Biological gender as stored on a person record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
	/// Male.
	Male,
	/// Female.
	Female,
}

/// A single person in the tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
	/// Unique id.
	pub id: PersonId,
	/// Given name.
	pub first_name: String,
	/// Family name.
	pub last_name: String,
	/// Biological gender.
	pub biological_gender: Gender,
	/// Id of the father, if known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub father_id: Option<PersonId>,
	/// Id of the mother, if known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mother_id: Option<PersonId>,
	/// Free-text biography.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub biography: Option<String>,
	/// Free-text notes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

impl Person {
	/// Father id, treating an empty string as absent.
	pub fn father(&self) -> Option<&str> {
		self.father_id.as_deref().filter(|id| !id.is_empty())
	}

	/// Mother id, treating an empty string as absent.
	pub fn mother(&self) -> Option<&str> {
		self.mother_id.as_deref().filter(|id| !id.is_empty())
	}
}

/// Kind of a stored relationship.
///
/// Only `Spouse` is ever stored in practice; parent/child links are implied
/// by `fatherId`/`motherId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
	/// Marriage or partnership.
	Spouse,
	/// Blood relation.
	Blood,
}

/// An undirected relationship between two persons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
	/// Unique id.
	pub id: String,
	/// The two persons involved, in no particular order.
	pub persons: [PersonId; 2],
	/// Relationship kind.
	#[serde(rename = "relationshipType")]
	pub kind: RelationshipKind,
}

impl Relationship {
	/// Whether `id` is one of the two persons.
	pub fn involves(&self, id: &str) -> bool {
		self.persons.iter().any(|p| p == id)
	}

	/// The person on the other side of `id`, if `id` is involved.
	pub fn other(&self, id: &str) -> Option<&str> {
		match &self.persons {
			[a, b] if a == id => Some(b.as_str()),
			[a, b] if b == id => Some(a.as_str()),
			_ => None,
		}
	}
}

/// A persisted node coordinate, keyed by person or union id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
	/// Person id or union id.
	pub id: String,
	/// Model-space x of the box origin.
	pub x: f64,
	/// Model-space y of the box origin.
	pub y: f64,
}

/// Errors reading or writing a registry snapshot.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RegistryError {
	/// The snapshot was not valid JSON or did not match the registry shape.
	#[error("invalid registry snapshot: {0}")]
	Parse(#[source] Arc<serde_json::Error>),
	/// The registry could not be serialised.
	#[error("failed to serialise registry: {0}")]
	Serialise(#[source] Arc<serde_json::Error>),
}

/// The persisted snapshot `{persons, relationships, positions}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
	/// All persons.
	pub persons: Vec<Person>,
	/// Explicit relationships.
	#[serde(default)]
	pub relationships: Vec<Relationship>,
	/// Saved node positions.
	#[serde(default)]
	pub positions: Vec<Position>,
}

impl Registry {
	/// Parse a JSON snapshot.
	pub fn from_json(json: &str) -> Result<Self, RegistryError> {
		serde_json::from_str(json).map_err(|err| RegistryError::Parse(Arc::new(err)))
	}

	/// Serialise to pretty-printed JSON.
	pub fn to_json(&self) -> Result<String, RegistryError> {
		serde_json::to_string_pretty(self).map_err(|err| RegistryError::Serialise(Arc::new(err)))
	}

	/// Find a person by id.
	pub fn person(&self, id: &str) -> Option<&Person> {
		self.persons.iter().find(|p| p.id == id)
	}

	/// Insert or replace a person and return their id.
	///
	/// A person carrying [`NEW_PERSON_ID`] (or an empty id) gets a fresh uuid.
	/// An existing id is replaced in place. With `position`, the person's saved
	/// coordinate is set as well.
	pub fn add_person(&mut self, mut person: Person, position: Option<(f64, f64)>) -> PersonId {
		if person.id.is_empty() || person.id == NEW_PERSON_ID {
			person.id = Uuid::new_v4().to_string();
		}
		let id = person.id.clone();

		match self.persons.iter_mut().find(|p| p.id == id) {
			Some(existing) => *existing = person,
			None => self.persons.push(person),
		}

		if let Some((x, y)) = position {
			match self.positions.iter_mut().find(|p| p.id == id) {
				Some(saved) => (saved.x, saved.y) = (x, y),
				None => self.positions.push(Position { id: id.clone(), x, y }),
			}
		}
		id
	}

	/// Drop every person, relationship and position.
	pub fn clear(&mut self) {
		self.persons.clear();
		self.relationships.clear();
		self.positions.clear();
	}

	/// Remove a person together with everything pointing at them.
	///
	/// Children lose the matching parent pointer, relationships mentioning the
	/// person are dropped and so is their saved position. Returns `false` if
	/// no such person existed.
	pub fn remove_person(&mut self, id: &str) -> bool {
		let before = self.persons.len();
		self.persons.retain(|p| p.id != id);
		if self.persons.len() == before {
			return false;
		}

		for person in &mut self.persons {
			if person.father_id.as_deref() == Some(id) {
				person.father_id = None;
			}
			if person.mother_id.as_deref() == Some(id) {
				person.mother_id = None;
			}
		}
		self.relationships.retain(|r| !r.involves(id));
		self.positions.retain(|p| p.id != id);
		true
	}

	/// Replace the saved positions.
	pub fn update_positions(&mut self, positions: Vec<Position>) {
		self.positions = positions;
	}
}
