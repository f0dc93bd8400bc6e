use std::collections::{HashMap, HashSet, VecDeque};

use super::types::{Person, PersonId, Relationship, RelationshipKind};

/// Everything derived about one person.
///
/// All lists are free of duplicates and ordered by discovery, which follows
/// the order of the input person list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Kinship {
	/// Father and mother that exist in the person list.
	pub parents: Vec<PersonId>,
	/// Explicit spouses plus co-parents of shared children.
	pub spouses: Vec<PersonId>,
	/// Persons naming this one as father or mother.
	pub children: Vec<PersonId>,
	/// Persons sharing a father or a mother.
	pub siblings: Vec<PersonId>,
	/// Transitive parents.
	pub ancestors: Vec<PersonId>,
	/// Transitive children.
	pub descendants: Vec<PersonId>,
	/// 1 for root ancestors, otherwise one more than the older parent.
	pub generation: u32,
}

/// Result of [`resolve`], iterable in input order.
#[derive(Clone, Debug, Default)]
pub struct KinshipMap {
	order: Vec<PersonId>,
	entries: HashMap<PersonId, Kinship>,
}

impl KinshipMap {
	/// Kinship of a single person.
	pub fn get(&self, id: &str) -> Option<&Kinship> {
		self.entries.get(id)
	}

	/// Generation of a single person.
	pub fn generation(&self, id: &str) -> Option<u32> {
		self.entries.get(id).map(|k| k.generation)
	}

	/// Entries in input order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Kinship)> {
		self.order
			.iter()
			.filter_map(|id| self.entries.get(id).map(|k| (id.as_str(), k)))
	}

	/// Number of resolved persons.
	pub fn len(&self) -> usize {
		self.order.len()
	}

	/// Whether no person was resolved.
	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}
}

fn push_unique(list: &mut Vec<PersonId>, id: &str) {
	if !list.iter().any(|existing| existing == id) {
		list.push(id.to_owned());
	}
}

/// Derive parents, spouses, children, siblings, ancestors, descendants and
/// generations from the person list and the explicit relationships.
///
/// Dangling parent or relationship ids are ignored. Cyclic parent chains
/// terminate with bounded results.
pub fn resolve(persons: &[Person], relationships: &[Relationship]) -> KinshipMap {
	let by_id: HashMap<&str, &Person> = persons.iter().map(|p| (p.id.as_str(), p)).collect();
	let mut order: Vec<PersonId> = Vec::with_capacity(persons.len());
	let mut entries: HashMap<PersonId, Kinship> = HashMap::with_capacity(persons.len());

	for person in persons {
		if entries.contains_key(&person.id) {
			continue;
		}
		let id = person.id.as_str();
		let mut kin = Kinship::default();

		for parent in [person.father(), person.mother()].into_iter().flatten() {
			if parent != id && by_id.contains_key(parent) {
				push_unique(&mut kin.parents, parent);
			}
		}

		for other in persons {
			if other.id == id
				|| person.father() == Some(other.id.as_str())
				|| person.mother() == Some(other.id.as_str())
			{
				continue;
			}

			let is_father = other.father() == Some(id);
			let is_mother = other.mother() == Some(id);
			if is_father || is_mother {
				push_unique(&mut kin.children, &other.id);

				if let (Some(father), Some(mother)) = (other.father(), other.mother()) {
					let co_parent = if is_father { mother } else { father };
					if co_parent != id && by_id.contains_key(co_parent) {
						push_unique(&mut kin.spouses, co_parent);
					}
				}
			}

			let same_father = other.father().is_some() && other.father() == person.father();
			let same_mother = other.mother().is_some() && other.mother() == person.mother();
			if same_father || same_mother {
				push_unique(&mut kin.siblings, &other.id);
			}
		}

		for relationship in relationships.iter().filter(|r| r.kind == RelationshipKind::Spouse) {
			if let Some(other) = relationship.other(id) {
				if other != id && by_id.contains_key(other) {
					push_unique(&mut kin.spouses, other);
				}
			}
		}

		order.push(person.id.clone());
		entries.insert(person.id.clone(), kin);
	}

	let closures: Vec<(Vec<PersonId>, Vec<PersonId>)> = order
		.iter()
		.map(|id| {
			(
				transitive(&entries, id, |k| k.parents.as_slice()),
				transitive(&entries, id, |k| k.children.as_slice()),
			)
		})
		.collect();
	for (id, (ancestors, descendants)) in order.iter().zip(closures) {
		if let Some(kin) = entries.get_mut(id) {
			kin.ancestors = ancestors;
			kin.descendants = descendants;
		}
	}

	let generations = generations(persons, &by_id, &entries);
	for (id, kin) in entries.iter_mut() {
		kin.generation = generations.get(id.as_str()).copied().unwrap_or(1);
	}

	KinshipMap { order, entries }
}

/// Breadth-first closure over `next`, never revisiting an id and never
/// including `start` itself.
fn transitive<'a>(
	entries: &'a HashMap<PersonId, Kinship>,
	start: &'a str,
	next: impl Fn(&'a Kinship) -> &'a [PersonId],
) -> Vec<PersonId> {
	let mut seen: HashSet<&str> = HashSet::from([start]);
	let mut queue: VecDeque<&str> = VecDeque::from([start]);
	let mut found = Vec::new();

	while let Some(current) = queue.pop_front() {
		let Some(kin) = entries.get(current) else {
			continue;
		};
		for id in next(kin) {
			if seen.insert(id.as_str()) {
				found.push(id.clone());
				queue.push_back(id.as_str());
			}
		}
	}
	found
}

/// Recursive base generation, memoised, with a guard against cyclic ancestry.
fn base_generation<'a>(
	id: &'a str,
	by_id: &HashMap<&'a str, &'a Person>,
	memo: &mut HashMap<&'a str, u32>,
	visiting: &mut HashSet<&'a str>,
) -> u32 {
	if let Some(&generation) = memo.get(id) {
		return generation;
	}
	let Some(person) = by_id.get(id).copied() else {
		return 0;
	};
	if !visiting.insert(id) {
		return 0;
	}

	let generation = match (person.father(), person.mother()) {
		(None, None) => 1,
		(father, mother) => {
			let father = father.map_or(0, |f| base_generation(f, by_id, memo, visiting));
			let mother = mother.map_or(0, |m| base_generation(m, by_id, memo, visiting));
			father.max(mother) + 1
		}
	};

	visiting.remove(id);
	memo.insert(id, generation);
	generation
}

/// Base generations followed by spouse alignment.
///
/// Alignment is iterated until spouses agree and every child is younger
/// than both parents, bounded by the person count so cyclic or
/// self-contradicting data still terminates.
fn generations<'a>(
	persons: &'a [Person],
	by_id: &HashMap<&'a str, &'a Person>,
	entries: &HashMap<PersonId, Kinship>,
) -> HashMap<&'a str, u32> {
	let mut memo = HashMap::with_capacity(persons.len());
	let mut visiting = HashSet::new();
	for person in persons {
		base_generation(&person.id, by_id, &mut memo, &mut visiting);
	}

	let pairs: Vec<(&'a str, &'a str)> = persons
		.iter()
		.filter_map(|p| entries.get(&p.id).map(|kin| (p, kin)))
		.flat_map(|(p, kin)| {
			kin.spouses.iter().filter_map(move |s| {
				by_id
					.get(s.as_str())
					.copied()
					.map(|spouse| (p.id.as_str(), spouse.id.as_str()))
			})
		})
		.filter(|(a, b)| a < b)
		.collect();

	for _ in 0..=persons.len() {
		let mut changed = false;

		for &(a, b) in &pairs {
			let (Some(&ga), Some(&gb)) = (memo.get(a), memo.get(b)) else {
				continue;
			};
			if ga != gb {
				let aligned = ga.max(gb);
				memo.insert(a, aligned);
				memo.insert(b, aligned);
				changed = true;
			}
		}

		for person in persons {
			let oldest_parent = [person.father(), person.mother()]
				.into_iter()
				.flatten()
				.filter_map(|p| memo.get(p).copied())
				.max();
			let Some(parent) = oldest_parent else {
				continue;
			};
			let current = memo.get(person.id.as_str()).copied().unwrap_or(1);
			if current <= parent {
				memo.insert(&person.id, parent + 1);
				changed = true;
			}
		}

		if !changed {
			break;
		}
	}

	memo
}

/// Display name of `person`, shortened to the first name when `relative_to`
/// shares the same last name.
pub fn full_name(person: &Person, relative_to: Option<&Person>) -> String {
	if let Some(other) = relative_to {
		if other.last_name == person.last_name && !person.first_name.is_empty() {
			return person.first_name.clone();
		}
	}

	[person.first_name.as_str(), person.last_name.as_str()]
		.into_iter()
		.filter(|part| !part.is_empty())
		.collect::<Vec<_>>()
		.join(" ")
}

fn join_names(ids: &[PersonId], by_id: &HashMap<&str, &Person>, relative_to: &Person) -> String {
	ids.iter()
		.filter_map(|id| by_id.get(id.as_str()))
		.map(|p| full_name(p, Some(relative_to)))
		.filter(|name| !name.is_empty())
		.collect::<Vec<_>>()
		.join(", ")
}

/// A person together with the derived fields shown in lists and on the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtendedPerson {
	/// The stored record.
	pub person: Person,
	/// Derived generation.
	pub generation: u32,
	/// Spouse ids.
	pub spouses: Vec<PersonId>,
	/// Ancestor ids.
	pub ancestors: Vec<PersonId>,
	/// Descendant ids.
	pub descendants: Vec<PersonId>,
	/// "First Last".
	pub full_name: String,
	/// Comma separated parent names.
	pub parents_names: String,
	/// Comma separated spouse names.
	pub spouses_names: String,
	/// Comma separated children names.
	pub children_names: String,
	/// Comma separated sibling names.
	pub siblings_names: String,
}

impl ExtendedPerson {
	/// Person id.
	pub fn id(&self) -> &str {
		&self.person.id
	}

	/// Case-insensitive substring match on the full name. An empty search
	/// matches everyone.
	pub fn matches_search(&self, search: &str) -> bool {
		self.full_name
			.to_lowercase()
			.contains(&search.to_lowercase())
	}
}

/// Resolve kinship and build the display records, sorted by generation and
/// then by full name.
pub fn derive_persons(persons: &[Person], relationships: &[Relationship]) -> Vec<ExtendedPerson> {
	let by_id: HashMap<&str, &Person> = persons.iter().map(|p| (p.id.as_str(), p)).collect();
	let kinship = resolve(persons, relationships);

	let mut extended: Vec<ExtendedPerson> = kinship
		.iter()
		.filter_map(|(id, kin)| by_id.get(id).map(|person| (*person, kin)))
		.map(|(person, kin)| ExtendedPerson {
			person: person.clone(),
			generation: kin.generation,
			spouses: kin.spouses.clone(),
			ancestors: kin.ancestors.clone(),
			descendants: kin.descendants.clone(),
			full_name: full_name(person, None),
			parents_names: join_names(&kin.parents, &by_id, person),
			spouses_names: join_names(&kin.spouses, &by_id, person),
			children_names: join_names(&kin.children, &by_id, person),
			siblings_names: join_names(&kin.siblings, &by_id, person),
		})
		.collect();

	extended.sort_by(|a, b| {
		a.generation
			.cmp(&b.generation)
			.then_with(|| a.full_name.cmp(&b.full_name))
	});
	extended
}

/// Keep only the persons whose full name matches `search`.
pub fn filter_by_search(persons: Vec<ExtendedPerson>, search: &str) -> Vec<ExtendedPerson> {
	if search.is_empty() {
		return persons;
	}
	persons.into_iter().filter(|p| p.matches_search(search)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::kinship::Gender;

	fn person(id: &str, last: &str, father: Option<&str>, mother: Option<&str>) -> Person {
		Person {
			id: id.into(),
			first_name: id.into(),
			last_name: last.into(),
			biological_gender: Gender::Female,
			father_id: father.map(Into::into),
			mother_id: mother.map(Into::into),
			biography: None,
			notes: None,
		}
	}

	fn spouse(id: &str, a: &str, b: &str) -> Relationship {
		Relationship {
			id: id.into(),
			persons: [a.into(), b.into()],
			kind: RelationshipKind::Spouse,
		}
	}

	/// Three generations: grandparents G1/G2, their children F and U, F
	/// married to M (no parents), grandchildren C1/C2, and a half sibling H
	/// of C1 through M and a second partner P.
	fn dynasty() -> (Vec<Person>, Vec<Relationship>) {
		let persons = vec![
			person("G1", "Stone", None, None),
			person("G2", "Stone", None, None),
			person("F", "Stone", Some("G1"), Some("G2")),
			person("U", "Stone", Some("G1"), Some("G2")),
			person("M", "Reed", None, None),
			person("C1", "Stone", Some("F"), Some("M")),
			person("C2", "Stone", Some("F"), Some("M")),
			person("P", "Hill", None, None),
			person("H", "Hill", Some("P"), Some("M")),
		];
		(persons, vec![spouse("r1", "G1", "G2")])
	}

	fn ids(list: &[PersonId]) -> Vec<&str> {
		let mut out: Vec<&str> = list.iter().map(String::as_str).collect();
		out.sort_unstable();
		out
	}

	#[test]
	fn nuclear_family() {
		let persons = vec![
			person("F", "Doe", None, None),
			person("M", "Doe", None, None),
			person("C", "Doe", Some("F"), Some("M")),
		];
		let map = resolve(&persons, &[]);

		assert_eq!(map.generation("F"), Some(1));
		assert_eq!(map.generation("M"), Some(1));
		assert_eq!(map.generation("C"), Some(2));
		assert_eq!(map.get("F").unwrap().spouses, vec!["M"]);
		assert_eq!(map.get("M").unwrap().spouses, vec!["F"]);
		assert_eq!(map.get("F").unwrap().children, vec!["C"]);
		assert_eq!(map.get("C").unwrap().parents, vec!["F", "M"]);
	}

	#[test]
	fn relations_are_symmetric() {
		let (persons, relationships) = dynasty();
		let map = resolve(&persons, &relationships);

		for (a, kin) in map.iter() {
			for b in &kin.children {
				assert!(map.get(b).unwrap().parents.iter().any(|p| p == a), "{a} parent of {b}");
			}
			for b in &kin.siblings {
				assert!(map.get(b).unwrap().siblings.iter().any(|s| s == a), "{a} sibling of {b}");
			}
			for b in &kin.spouses {
				assert!(map.get(b).unwrap().spouses.iter().any(|s| s == a), "{a} spouse of {b}");
			}
		}
	}

	#[test]
	fn half_siblings_share_one_parent() {
		let (persons, relationships) = dynasty();
		let map = resolve(&persons, &relationships);

		assert_eq!(ids(&map.get("C1").unwrap().siblings), vec!["C2", "H"]);
		assert_eq!(ids(&map.get("H").unwrap().siblings), vec!["C1", "C2"]);
		assert_eq!(ids(&map.get("M").unwrap().spouses), vec!["F", "P"]);
		assert!(map.get("M").unwrap().siblings.is_empty());
	}

	#[test]
	fn generations_follow_parents_and_spouses() {
		let (persons, relationships) = dynasty();
		let map = resolve(&persons, &relationships);

		for person in &persons {
			let own = map.generation(&person.id).unwrap();
			for parent in [person.father(), person.mother()].into_iter().flatten() {
				assert!(own > map.generation(parent).unwrap(), "{} older than parent", person.id);
			}
			for s in &map.get(&person.id).unwrap().spouses {
				assert_eq!(own, map.generation(s).unwrap(), "{} and {s}", person.id);
			}
		}
		// M has no parents but marries into generation 2.
		assert_eq!(map.generation("M"), Some(2));
		assert_eq!(map.generation("P"), Some(2));
		assert_eq!(map.generation("H"), Some(3));
	}

	#[test]
	fn spouse_alignment_reaches_fixpoint_across_chains() {
		// A (gen 3) married to B (gen 1), B married to C (gen 1): all three end at 3.
		let persons = vec![
			person("R", "X", None, None),
			person("S", "X", Some("R"), None),
			person("A", "X", Some("S"), None),
			person("B", "X", None, None),
			person("C", "X", None, None),
		];
		let relationships = vec![spouse("r1", "B", "C"), spouse("r2", "A", "B")];
		let map = resolve(&persons, &relationships);

		assert_eq!(map.generation("A"), Some(3));
		assert_eq!(map.generation("B"), Some(3));
		assert_eq!(map.generation("C"), Some(3));
	}

	#[test]
	fn ancestors_and_descendants_are_transitive() {
		let (persons, relationships) = dynasty();
		let map = resolve(&persons, &relationships);

		assert_eq!(ids(&map.get("C1").unwrap().ancestors), vec!["F", "G1", "G2", "M"]);
		assert_eq!(
			ids(&map.get("G1").unwrap().descendants),
			vec!["C1", "C2", "F", "U"]
		);
		assert!(map.get("G1").unwrap().ancestors.is_empty());
	}

	#[test]
	fn cyclic_ancestry_terminates() {
		let persons = vec![
			person("A", "X", Some("B"), None),
			person("B", "X", Some("C"), None),
			person("C", "X", Some("A"), None),
			person("D", "X", Some("D"), None),
		];
		let map = resolve(&persons, &[]);

		assert_eq!(ids(&map.get("A").unwrap().ancestors), vec!["B", "C"]);
		assert_eq!(ids(&map.get("A").unwrap().descendants), vec!["B", "C"]);
		assert!(map.get("D").unwrap().ancestors.is_empty());
		assert!(map.get("D").unwrap().parents.is_empty());
		assert_eq!(map.len(), 4);
	}

	#[test]
	fn dangling_references_are_ignored() {
		let persons = vec![person("C", "X", Some("ghost"), None)];
		let relationships = vec![spouse("r1", "C", "nobody")];
		let map = resolve(&persons, &relationships);

		let kin = map.get("C").unwrap();
		assert!(kin.parents.is_empty());
		assert!(kin.spouses.is_empty());
		assert!(kin.ancestors.is_empty());
		assert_eq!(kin.generation, 1);
	}

	#[test]
	fn explicit_spouses_without_children() {
		let persons = vec![person("A", "X", None, None), person("B", "Y", None, None)];
		let map = resolve(&persons, &[spouse("r1", "B", "A"), spouse("r2", "A", "B")]);

		assert_eq!(map.get("A").unwrap().spouses, vec!["B"]);
		assert_eq!(map.get("B").unwrap().spouses, vec!["A"]);
	}

	#[test]
	fn names_shorten_for_shared_last_name() {
		let ann = person("Ann", "Lee", None, None);
		let bob = person("Bob", "Lee", None, None);
		let cy = person("Cy", "Park", None, None);

		assert_eq!(full_name(&ann, None), "Ann Lee");
		assert_eq!(full_name(&ann, Some(&bob)), "Ann");
		assert_eq!(full_name(&ann, Some(&cy)), "Ann Lee");
	}

	#[test]
	fn derived_persons_sorted_with_names() {
		let (persons, relationships) = dynasty();
		let derived = derive_persons(&persons, &relationships);

		let order: Vec<&str> = derived.iter().map(ExtendedPerson::id).collect();
		assert_eq!(order, vec!["G1", "G2", "F", "M", "P", "U", "C1", "C2", "H"]);

		let c1 = derived.iter().find(|p| p.id() == "C1").unwrap();
		assert_eq!(c1.full_name, "C1 Stone");
		assert_eq!(c1.parents_names, "F, M Reed");
		assert_eq!(c1.siblings_names, "C2, H Hill");

		let m = derived.iter().find(|p| p.id() == "M").unwrap();
		assert_eq!(m.children_names, "C1 Stone, C2 Stone, H Hill");
	}

	#[test]
	fn search_is_case_insensitive() {
		let (persons, relationships) = dynasty();
		let derived = derive_persons(&persons, &relationships);

		let hits = filter_by_search(derived.clone(), "hILL");
		let hit_ids: Vec<&str> = hits.iter().map(ExtendedPerson::id).collect();
		assert_eq!(hit_ids, vec!["P", "H"]);
		assert_eq!(filter_by_search(derived.clone(), "").len(), derived.len());
	}
}
