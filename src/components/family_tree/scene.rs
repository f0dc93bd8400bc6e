use std::collections::{HashMap, HashSet};

use super::types::{BoxId, BoxMeta, Connection, ConnectionKind, pair_id};
use crate::kinship::{ExtendedPerson, Relationship, RelationshipKind};

/// Registry of boxes and the connections between them, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
	boxes: Vec<BoxMeta>,
	index: HashMap<BoxId, usize>,
	connections: Vec<Connection>,
	connection_ids: HashSet<String>,
	selected: Option<BoxId>,
}

impl SceneGraph {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a box, or replace the fields of the box with the same id while
	/// keeping its place in the draw order.
	pub fn add_box(&mut self, meta: BoxMeta) {
		match self.index.get(&meta.id) {
			Some(&i) => self.boxes[i] = meta,
			None => {
				self.index.insert(meta.id.clone(), self.boxes.len());
				self.boxes.push(meta);
			}
		}
	}

	/// Connect two existing boxes. Duplicate pairs (in either order) and
	/// pairs with a missing endpoint are ignored. Returns whether a new
	/// connection was added.
	pub fn add_connection(&mut self, first: &str, second: &str, kind: ConnectionKind) -> bool {
		if !self.index.contains_key(first) || !self.index.contains_key(second) {
			return false;
		}
		let id = pair_id(first, second);
		if !self.connection_ids.insert(id.clone()) {
			return false;
		}

		self.connections.push(Connection {
			id,
			first: first.to_owned(),
			second: second.to_owned(),
			kind,
		});
		true
	}

	pub fn get(&self, id: &str) -> Option<&BoxMeta> {
		self.index.get(id).map(|&i| &self.boxes[i])
	}

	pub fn boxes(&self) -> &[BoxMeta] {
		&self.boxes
	}

	pub fn connections(&self) -> &[Connection] {
		&self.connections
	}

	pub fn set_selected_box_id(&mut self, id: Option<BoxId>) {
		self.selected = id;
	}

	pub fn selected_box(&self) -> Option<&BoxMeta> {
		self.selected.as_deref().and_then(|id| self.get(id))
	}

	/// Drop all boxes, connections and the selection.
	pub fn reset(&mut self) {
		self.boxes.clear();
		self.index.clear();
		self.connections.clear();
		self.connection_ids.clear();
		self.selected = None;
	}

	/// Add one box per person and one union box per couple, then wire them.
	///
	/// Children hang off their parents' union with a blood edge and both
	/// parents join the union with spouse edges. A child with a single known
	/// parent is linked straight to that parent. Stored blood relationships
	/// become `Other` edges.
	pub fn populate(&mut self, persons: &[ExtendedPerson], relationships: &[Relationship], search: &str) {
		let present: HashSet<&str> = persons.iter().map(ExtendedPerson::id).collect();

		for p in persons {
			let highlight = !search.is_empty() && p.matches_search(search);
			self.add_box(BoxMeta::person(
				p.id(),
				format!("{} ({})", p.full_name, p.generation),
				p.generation,
				highlight,
			));
		}

		for p in persons {
			if let Some((father, mother)) = couple(p, &present) {
				self.add_box(BoxMeta::union(pair_id(father, mother)));
			}
			for spouse in p.spouses.iter().filter(|s| present.contains(s.as_str())) {
				self.add_box(BoxMeta::union(pair_id(p.id(), spouse)));
			}
		}

		for p in persons {
			let id = p.id();
			match couple(p, &present) {
				Some((father, mother)) => {
					let union = pair_id(father, mother);
					self.add_connection(id, &union, ConnectionKind::Blood);
					self.add_connection(father, &union, ConnectionKind::Spouse);
					self.add_connection(mother, &union, ConnectionKind::Spouse);
				}
				None => {
					let parent = [p.person.father(), p.person.mother()]
						.into_iter()
						.flatten()
						.find(|parent| *parent != id && present.contains(parent));
					if let Some(parent) = parent {
						self.add_connection(id, parent, ConnectionKind::Blood);
					}
				}
			}

			for spouse in p.spouses.iter().filter(|s| present.contains(s.as_str())) {
				let union = pair_id(id, spouse);
				self.add_connection(id, &union, ConnectionKind::Spouse);
				self.add_connection(spouse, &union, ConnectionKind::Spouse);
			}
		}

		for relationship in relationships.iter().filter(|r| r.kind == RelationshipKind::Blood) {
			let [a, b] = &relationship.persons;
			if a != b {
				self.add_connection(a, b, ConnectionKind::Other);
			}
		}
	}
}

/// Both parents, when both are known, distinct and drawn.
fn couple<'a>(person: &'a ExtendedPerson, present: &HashSet<&str>) -> Option<(&'a str, &'a str)> {
	match (person.person.father(), person.person.mother()) {
		(Some(father), Some(mother))
			if father != mother && present.contains(father) && present.contains(mother) =>
		{
			Some((father, mother))
		}
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::kinship::{Gender, Person, derive_persons};

	fn person(id: &str, father: Option<&str>, mother: Option<&str>) -> Person {
		Person {
			id: id.into(),
			first_name: id.into(),
			last_name: "Vale".into(),
			biological_gender: Gender::Male,
			father_id: father.map(Into::into),
			mother_id: mother.map(Into::into),
			biography: None,
			notes: None,
		}
	}

	#[test]
	fn add_box_upserts_in_place() {
		let mut scene = SceneGraph::new();
		scene.add_box(BoxMeta::person("a", "Ann", 1, false));
		scene.add_box(BoxMeta::person("b", "Bob", 1, false));
		scene.add_box(BoxMeta::person("a", "Ann Vale", 2, true));

		assert_eq!(scene.boxes().len(), 2);
		assert_eq!(scene.boxes()[0].text, "Ann Vale");
		assert_eq!(scene.get("a").unwrap().generation, Some(2));
		assert!(scene.get("a").unwrap().highlight);
	}

	#[test]
	fn add_connection_is_idempotent_and_order_independent() {
		let mut scene = SceneGraph::new();
		scene.add_box(BoxMeta::person("a", "Ann", 1, false));
		scene.add_box(BoxMeta::person("b", "Bob", 1, false));

		assert!(scene.add_connection("a", "b", ConnectionKind::Spouse));
		assert!(!scene.add_connection("a", "b", ConnectionKind::Spouse));
		assert!(!scene.add_connection("b", "a", ConnectionKind::Blood));
		assert_eq!(scene.connections().len(), 1);
		assert_eq!(scene.connections()[0].id, "a-b");
		assert_eq!(scene.connections()[0].kind, ConnectionKind::Spouse);
	}

	#[test]
	fn connection_to_missing_box_is_dropped() {
		let mut scene = SceneGraph::new();
		scene.add_box(BoxMeta::person("a", "Ann", 1, false));

		assert!(!scene.add_connection("a", "ghost", ConnectionKind::Blood));
		assert!(scene.connections().is_empty());

		scene.add_box(BoxMeta::person("ghost", "Gus", 1, false));
		assert!(scene.add_connection("a", "ghost", ConnectionKind::Blood));
	}

	#[test]
	fn selection_and_reset() {
		let mut scene = SceneGraph::new();
		scene.add_box(BoxMeta::person("a", "Ann", 1, false));
		scene.set_selected_box_id(Some("a".into()));
		assert_eq!(scene.selected_box().map(|b| b.id.as_str()), Some("a"));

		scene.set_selected_box_id(Some("missing".into()));
		assert!(scene.selected_box().is_none());

		scene.set_selected_box_id(Some("a".into()));
		scene.reset();
		assert!(scene.boxes().is_empty());
		assert!(scene.connections().is_empty());
		assert!(scene.selected_box().is_none());
	}

	#[test]
	fn populate_builds_unions_and_edges() {
		let persons = vec![
			person("F", None, None),
			person("M", None, None),
			person("C", Some("F"), Some("M")),
			person("S", Some("F"), None),
		];
		let derived = derive_persons(&persons, &[]);
		let mut scene = SceneGraph::new();
		scene.populate(&derived, &[], "c vale");

		let union = scene.get("F-M").unwrap();
		assert!(union.is_union());
		assert_eq!(scene.boxes().iter().filter(|b| b.is_union()).count(), 1);

		let child = scene.get("C").unwrap();
		assert_eq!(child.text, "C Vale (2)");
		assert_eq!(child.generation, Some(2));
		assert!(child.highlight);
		assert!(!scene.get("F").unwrap().highlight);

		let edges: Vec<(&str, ConnectionKind)> = scene
			.connections()
			.iter()
			.map(|c| (c.id.as_str(), c.kind))
			.collect();
		assert!(edges.contains(&("C-F-M", ConnectionKind::Blood)));
		assert!(edges.contains(&("F-F-M", ConnectionKind::Spouse)));
		assert!(edges.contains(&("F-M-M", ConnectionKind::Spouse)));
		assert!(edges.contains(&("F-S", ConnectionKind::Blood)));
		assert_eq!(edges.len(), 4);
	}

	#[test]
	fn populate_skips_unions_with_missing_parent() {
		let persons = vec![person("M", None, None), person("C", Some("ghost"), Some("M"))];
		let derived = derive_persons(&persons, &[]);
		let mut scene = SceneGraph::new();
		scene.populate(&derived, &[], "");

		assert!(scene.boxes().iter().all(|b| !b.is_union()));
		assert_eq!(scene.connections().len(), 1);
		assert_eq!(scene.connections()[0].kind, ConnectionKind::Blood);
		assert_eq!(scene.connections()[0].second, "M");
	}

	#[test]
	fn childless_spouses_share_a_union() {
		let persons = vec![person("A", None, None), person("B", None, None)];
		let relationships = vec![Relationship {
			id: "wed".into(),
			persons: ["B".into(), "A".into()],
			kind: RelationshipKind::Spouse,
		}];
		let derived = derive_persons(&persons, &relationships);
		let mut scene = SceneGraph::new();
		scene.populate(&derived, &relationships, "");

		let unions: Vec<&str> = scene
			.boxes()
			.iter()
			.filter(|b| b.is_union())
			.map(|b| b.id.as_str())
			.collect();
		assert_eq!(unions, ["A-B"]);

		let edges: Vec<(&str, ConnectionKind)> = scene
			.connections()
			.iter()
			.map(|c| (c.id.as_str(), c.kind))
			.collect();
		assert_eq!(edges.len(), 2);
		assert!(edges.contains(&("A-A-B", ConnectionKind::Spouse)));
		assert!(edges.contains(&("A-B-B", ConnectionKind::Spouse)));
		assert!(edges.iter().all(|(_, kind)| *kind != ConnectionKind::Blood));
	}

	#[test]
	fn stored_blood_relationships_become_other_edges() {
		let persons = vec![person("A", None, None), person("B", None, None)];
		let relationships = vec![Relationship {
			id: "r".into(),
			persons: ["B".into(), "A".into()],
			kind: RelationshipKind::Blood,
		}];
		let derived = derive_persons(&persons, &relationships);
		let mut scene = SceneGraph::new();
		scene.populate(&derived, &relationships, "");

		assert_eq!(scene.connections().len(), 1);
		assert_eq!(scene.connections()[0].id, "A-B");
		assert_eq!(scene.connections()[0].kind, ConnectionKind::Other);
	}
}
