use leptos::prelude::*;
use log::{error, info, warn};

use crate::components::family_tree::FamilyTreeCanvas;
use crate::kinship::{
	ExtendedPerson, Gender, NEW_PERSON_ID, Person, Position, Registry, RegistryError, Relationship,
	RelationshipKind, derive_persons, filter_by_search,
};

fn person(id: &str, first: &str, last: &str, gender: Gender, father: Option<&str>, mother: Option<&str>) -> Person {
	Person {
		id: id.into(),
		first_name: first.into(),
		last_name: last.into(),
		biological_gender: gender,
		father_id: father.map(Into::into),
		mother_id: mother.map(Into::into),
		biography: None,
		notes: None,
	}
}

/// Three generations of the Stone family and the Reeds and Hills who married in.
fn sample_registry() -> Registry {
	use Gender::{Female, Male};

	Registry {
		persons: vec![
			person("arthur", "Arthur", "Stone", Male, None, None),
			person("edith", "Edith", "Stone", Female, None, None),
			person("walter", "Walter", "Reed", Male, None, None),
			person("june", "June", "Reed", Female, None, None),
			person("frank", "Frank", "Stone", Male, Some("arthur"), Some("edith")),
			person("mabel", "Mabel", "Reed", Female, Some("walter"), Some("june")),
			person("ruth", "Ruth", "Stone", Female, Some("arthur"), Some("edith")),
			person("leo", "Leo", "Stone", Male, Some("frank"), Some("mabel")),
			person("ivy", "Ivy", "Stone", Female, Some("frank"), Some("mabel")),
			person("owen", "Owen", "Hill", Male, None, None),
			person("nora", "Nora", "Hill", Female, Some("owen"), Some("ivy")),
		],
		relationships: vec![Relationship {
			id: "ruth-marriage".into(),
			persons: ["ruth".into(), "owen".into()],
			kind: RelationshipKind::Spouse,
		}],
		positions: Vec::new(),
	}
}

fn details(person: ExtendedPerson, on_remove: impl Fn(String) + 'static) -> impl IntoView {
	let id = person.id().to_owned();
	let row = |label: &'static str, value: String| {
		(!value.is_empty()).then(|| view! { <li>{label}": "{value}</li> })
	};

	view! {
		<div class="person-details">
			<h2>{person.full_name.clone()}</h2>
			<ul>
				<li>"Generation: "{person.generation}</li>
				{row("Parents", person.parents_names)}
				{row("Spouses", person.spouses_names)}
				{row("Children", person.children_names)}
				{row("Siblings", person.siblings_names)}
			</ul>
			<button on:click=move |_| on_remove(id.clone())>"Remove"</button>
		</div>
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let registry = RwSignal::new(sample_registry());
	let (search, set_search) = signal(String::new());
	let (layout_requests, set_layout_requests) = signal(0u32);
	let (selected, set_selected) = signal(None::<String>);
	let (first_name, set_first_name) = signal(String::new());
	let (last_name, set_last_name) = signal(String::new());
	let (gender, set_gender) = signal(Gender::Female);
	let (snapshot, set_snapshot) = signal(String::new());
	let load_result = RwSignal::new(None::<Result<usize, RegistryError>>);

	// Position reports only touch `positions`, so they never re-derive kinship.
	let people = Memo::new(move |_| registry.with(|r| (r.persons.clone(), r.relationships.clone())));
	let persons = Memo::new(move |_| people.with(|(persons, relationships)| derive_persons(persons, relationships)));
	let relationships = Signal::derive(move || people.with(|(_, relationships)| relationships.clone()));
	let positions = Memo::new(move |_| registry.with(|r| r.positions.clone()));
	let match_count = Memo::new(move |_| filter_by_search(persons.get(), &search.get()).len());
	let selected_person = Memo::new(move |_| {
		let id = selected.get()?;
		persons.with(|all| all.iter().find(|p| p.id() == id).cloned())
	});

	let on_activate = Callback::new(move |id: String| {
		info!("opened {id}");
		set_selected.set(Some(id));
	});
	let on_positions_change = Callback::new(move |positions: Vec<Position>| {
		registry.update(|r| r.update_positions(positions));
	});
	let remove = move |id: String| {
		let removed = registry.try_update(|r| r.remove_person(&id)).unwrap_or(false);
		if !removed {
			warn!("no person with id {id}");
		}
		set_selected.set(None);
	};
	let add = move |ev: leptos::ev::SubmitEvent| {
		ev.prevent_default();
		let (first, last) = (first_name.get_untracked(), last_name.get_untracked());
		if first.trim().is_empty() || last.trim().is_empty() {
			warn!("a new person needs a first and last name");
			return;
		}
		// The open person becomes the parent matching their gender.
		let parent = selected_person.get_untracked();
		let parent_of = |g: Gender| {
			parent
				.as_ref()
				.filter(|p| p.person.biological_gender == g)
				.map(|p| p.id().to_owned())
		};
		let person = Person {
			id: NEW_PERSON_ID.into(),
			first_name: first.trim().into(),
			last_name: last.trim().into(),
			biological_gender: gender.get_untracked(),
			father_id: parent_of(Gender::Male),
			mother_id: parent_of(Gender::Female),
			biography: None,
			notes: None,
		};
		let id = registry.try_update(|r| r.add_person(person, None));
		info!("added {id:?}");
		set_first_name.set(String::new());
		set_last_name.set(String::new());
	};
	let load_snapshot = move |_: leptos::ev::MouseEvent| {
		let result = Registry::from_json(&snapshot.get_untracked()).map(|loaded| {
			let count = loaded.persons.len();
			registry.set(loaded);
			set_selected.set(None);
			count
		});
		if let Err(err) = &result {
			error!("{err}");
		}
		load_result.set(Some(result));
	};
	let clear = move |_: leptos::ev::MouseEvent| {
		registry.update(Registry::clear);
		set_selected.set(None);
		load_result.set(None);
	};
	let log_snapshot = move |_: leptos::ev::MouseEvent| match registry.with(Registry::to_json) {
		Ok(json) => info!("{json}"),
		Err(err) => error!("{err}"),
	};

	view! {
		<div class="fullscreen-graph">
			<FamilyTreeCanvas
				persons=persons
				relationships=relationships
				positions=positions
				search=search
				layout_requests=layout_requests
				on_activate=on_activate
				on_positions_change=on_positions_change
				fullscreen=true
			/>
			<div class="graph-overlay">
				<h1>"Family Tree"</h1>
				<p class="subtitle">
					"Drag people to move them. Scroll to zoom. Drag the background to pan. Double click a person for details."
				</p>
				<input
					type="search"
					placeholder="Search by name"
					prop:value=move || search.get()
					on:input=move |ev| set_search.set(event_target_value(&ev))
				/>
				<p>{move || format!("{} of {} people match", match_count.get(), persons.with(Vec::len))}</p>
				<button on:click=move |_| set_layout_requests.update(|n| *n += 1)>"Auto layout"</button>
				<button on:click=log_snapshot>"Log snapshot"</button>
				<button on:click=clear>"Clear"</button>

				<form class="add-person" on:submit=add>
					<input
						placeholder="First name"
						prop:value=move || first_name.get()
						on:input=move |ev| set_first_name.set(event_target_value(&ev))
					/>
					<input
						placeholder="Last name"
						prop:value=move || last_name.get()
						on:input=move |ev| set_last_name.set(event_target_value(&ev))
					/>
					<select on:change=move |ev| {
						set_gender.set(if event_target_value(&ev) == "male" { Gender::Male } else { Gender::Female })
					}>
						<option value="female">"Female"</option>
						<option value="male">"Male"</option>
					</select>
					<button type="submit">"Add person"</button>
				</form>

				<textarea
					placeholder="Paste a snapshot"
					prop:value=move || snapshot.get()
					on:input=move |ev| set_snapshot.set(event_target_value(&ev))
				/>
				<button on:click=load_snapshot>"Load snapshot"</button>
				<ErrorBoundary fallback=|errors| {
					view! {
						<p>"Errors: "</p>
						<ul>
							{move || {
								errors
									.get()
									.into_iter()
									.map(|(_, e)| view! { <li>{e.to_string()}</li> })
									.collect_view()
							}}
						</ul>
					}
				}>
					{move || {
						load_result.get().map(|result| result.map(|count| view! { <p>{format!("Loaded {count} people")}</p> }))
					}}
				</ErrorBoundary>

				{move || selected_person.get().map(|p| details(p, remove))}
			</div>
		</div>
	}
}
