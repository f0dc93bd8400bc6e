use std::collections::{BTreeMap, HashMap};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::{BoxCoordinates, BoxId, BoxMeta, Connection, ConnectionKind};
use crate::kinship::Position;

/// Tunables for placement, optimisation and auto-layout. All distances are in
/// model units.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
	/// Snap unit for box centers and row offsets.
	pub grid: f64,
	pub box_height: f64,
	/// Horizontal padding on each side of a label.
	pub text_padding: f64,
	/// Width and height of a union marker.
	pub union_size: f64,
	pub row_height: f64,
	pub top_margin: f64,
	/// Gap between unrelated boxes in a row.
	pub box_gap: f64,
	/// Gap between spouses in a row.
	pub spouse_gap: f64,
	/// Distance between the bottom of a couple and their union marker.
	pub union_offset: f64,
	/// Extra margin used by the random placement overlap test.
	pub overlap_padding: f64,
	pub placement_margin_x: f64,
	pub placement_margin_y: f64,
	pub placement_attempts: usize,
	/// Largest offset tried by the local optimisation pass.
	pub nudge_radius: f64,
	pub nudge_step: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			grid: 10.0,
			box_height: 40.0,
			text_padding: 10.0,
			union_size: 10.0,
			row_height: 120.0,
			top_margin: 40.0,
			box_gap: 40.0,
			spouse_gap: 20.0,
			union_offset: 20.0,
			overlap_padding: 10.0,
			placement_margin_x: 100.0,
			placement_margin_y: 50.0,
			placement_attempts: 1000,
			nudge_radius: 10.0,
			nudge_step: 5.0,
		}
	}
}

impl LayoutConfig {
	pub fn snap(&self, value: f64) -> f64 {
		if self.grid <= 0.0 {
			return value;
		}
		(value / self.grid).round() * self.grid
	}

	fn snap_up(&self, value: f64) -> f64 {
		if self.grid <= 0.0 {
			return value;
		}
		(value / self.grid).ceil() * self.grid
	}
}

/// Owns the coordinate of every box. Coordinates are computed lazily on first
/// request and cached until the box is moved or the engine is reset.
pub struct LayoutEngine {
	config: LayoutConfig,
	coordinates: HashMap<BoxId, BoxCoordinates>,
	order: Vec<BoxId>,
	initial_positions: HashMap<String, (f64, f64)>,
	/// Model-space top-left corner of the visible canvas.
	origin: (f64, f64),
	rng: StdRng,
}

impl LayoutEngine {
	pub fn new(config: LayoutConfig) -> Self {
		Self::with_rng(config, StdRng::from_entropy())
	}

	pub fn with_rng(config: LayoutConfig, rng: StdRng) -> Self {
		Self {
			config,
			coordinates: HashMap::new(),
			order: Vec::new(),
			initial_positions: HashMap::new(),
			origin: (0.0, 0.0),
			rng,
		}
	}

	pub fn config(&self) -> &LayoutConfig {
		&self.config
	}

	/// Where the visible canvas starts in model space. Random placement draws
	/// from `origin + [0, canvas size]`.
	pub fn set_origin(&mut self, x: f64, y: f64) {
		self.origin = (x, y);
	}

	/// Persisted coordinates used verbatim the first time a box is placed.
	/// Boxes that already have coordinates are not affected.
	pub fn set_initial_positions(&mut self, positions: &[Position]) {
		self.initial_positions = positions
			.iter()
			.map(|p| (p.id.clone(), (p.x, p.y)))
			.collect();
	}

	/// Width and height for a box. Unions are fixed squares; person boxes are
	/// as wide as their label plus padding, rounded up to the grid.
	pub fn box_size(&self, meta: &BoxMeta, measure: &dyn Fn(&str) -> f64) -> (f64, f64) {
		if meta.is_union() {
			return (self.config.union_size, self.config.union_size);
		}
		let width = self.config.snap_up(measure(&meta.text) + 2.0 * self.config.text_padding);
		(width, self.config.box_height)
	}

	/// Coordinates of `id`, placing it on first request.
	///
	/// A cached box keeps its origin and only takes the new size. A new box
	/// starts at its persisted position if there is one, otherwise at a random
	/// free spot on the canvas, and is then nudged away from its neighbours.
	pub fn get_box_coordinates(
		&mut self,
		id: &str,
		width: f64,
		height: f64,
		canvas_width: f64,
		canvas_height: f64,
	) -> BoxCoordinates {
		if let Some(coords) = self.coordinates.get_mut(id) {
			coords.width = width;
			coords.height = height;
			return *coords;
		}

		let (x, y) = match self.initial_positions.get(id) {
			Some(&origin) => origin,
			None => self.random_position(width, height, canvas_width, canvas_height),
		};
		self.insert(id, BoxCoordinates { x, y, width, height });
		self.optimize_box(id);
		self.coordinates.get(id).copied().unwrap_or_default()
	}

	pub fn coordinates(&self, id: &str) -> Option<BoxCoordinates> {
		self.coordinates.get(id).copied()
	}

	/// Move a box so its origin is at `(x, y)`, then snap its center to the
	/// grid. Returns `false` for an unplaced box.
	pub fn move_box(&mut self, id: &str, x: f64, y: f64) -> bool {
		let config = &self.config;
		let Some(coords) = self.coordinates.get_mut(id) else {
			return false;
		};
		coords.x = config.snap(x + coords.width / 2.0) - coords.width / 2.0;
		coords.y = config.snap(y + coords.height / 2.0) - coords.height / 2.0;
		true
	}

	/// Put a placed box at `(x, y)` exactly. Returns `false` for an unplaced
	/// box.
	pub fn place_box(&mut self, id: &str, x: f64, y: f64) -> bool {
		let Some(coords) = self.coordinates.get_mut(id) else {
			return false;
		};
		(coords.x, coords.y) = (x, y);
		true
	}

	/// Forget every placed box.
	pub fn reset(&mut self) {
		self.coordinates.clear();
		self.order.clear();
	}

	/// Drop cached coordinates for boxes that no longer exist.
	pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
		self.order.retain(|id| keep(id));
		self.coordinates.retain(|id, _| keep(id));
	}

	/// Every placed box as `{id, x, y}`, in placement order.
	pub fn get_all_positions(&self) -> Vec<Position> {
		self.order
			.iter()
			.filter_map(|id| {
				self.coordinates.get(id).map(|c| Position {
					id: id.clone(),
					x: c.x,
					y: c.y,
				})
			})
			.collect()
	}

	/// Sum of pairwise overlap areas across all placed boxes.
	pub fn total_overlap(&self) -> f64 {
		let boxes: Vec<&BoxCoordinates> = self.order.iter().filter_map(|id| self.coordinates.get(id)).collect();
		let mut total = 0.0;
		for (i, a) in boxes.iter().enumerate() {
			for b in &boxes[i + 1..] {
				total += a.overlap_area(b);
			}
		}
		total
	}

	/// Try small offsets around the current origin of `id` and keep the one
	/// with the least overlap against every other box. Ties keep the earlier
	/// candidate, and the current origin wins unless something is strictly
	/// better.
	pub fn optimize_box(&mut self, id: &str) {
		let Some(origin) = self.coordinates.get(id).copied() else {
			return;
		};
		let (radius, step) = (self.config.nudge_radius, self.config.nudge_step);
		if step <= 0.0 || radius <= 0.0 {
			return;
		}

		let mut best = origin;
		let mut min_overlap = self.overlap_with(id, &origin);
		if min_overlap == 0.0 {
			return;
		}

		let steps = (radius / step).floor() as i32;
		for i in -steps..=steps {
			for j in -steps..=steps {
				let candidate = BoxCoordinates {
					x: origin.x + f64::from(i) * step,
					y: origin.y + f64::from(j) * step,
					..origin
				};
				let overlap = self.overlap_with(id, &candidate);
				if overlap < min_overlap {
					min_overlap = overlap;
					best = candidate;
				}
			}
		}
		self.coordinates.insert(id.to_owned(), best);
	}

	/// Arrange boxes in generation rows, keep couples side by side and hang
	/// each union marker under its couple. Returns the new positions.
	pub fn auto_layout(
		&mut self,
		boxes: &[BoxMeta],
		connections: &[Connection],
		canvas_width: f64,
		measure: &dyn Fn(&str) -> f64,
	) -> Vec<Position> {
		let is_union: HashMap<&str, bool> = boxes.iter().map(|b| (b.id.as_str(), b.is_union())).collect();
		let family = Family::from_connections(connections, &is_union);

		let mut rows: BTreeMap<u32, Vec<&BoxMeta>> = BTreeMap::new();
		for meta in boxes.iter().filter(|b| !b.is_union()) {
			rows.entry(meta.generation.unwrap_or(1)).or_default().push(meta);
		}

		for (row_index, row) in rows.values().enumerate() {
			let ordered = self.order_row(row, &family);
			let y = self.config.snap(row_index as f64 * self.config.row_height + self.config.top_margin);

			let mut placed = Vec::with_capacity(ordered.len());
			let mut cursor = 0.0;
			for (i, meta) in ordered.iter().enumerate() {
				if i > 0 {
					let previous = ordered[i - 1].id.as_str();
					cursor += if family.are_spouses(previous, &meta.id) {
						self.config.spouse_gap
					} else {
						self.config.box_gap
					};
				}
				let (width, height) = self.box_size(meta, measure);
				placed.push((meta.id.as_str(), cursor, width, height));
				cursor += width;
			}

			let offset = (canvas_width - cursor) / 2.0;
			for (id, x, width, height) in placed {
				let center = self.config.snap(offset + x + width / 2.0);
				self.insert(id, BoxCoordinates {
					x: center - width / 2.0,
					y,
					width,
					height,
				});
			}
		}

		for meta in boxes.iter().filter(|b| b.is_union()) {
			let members: Vec<BoxCoordinates> = family
				.members(&meta.id)
				.iter()
				.filter_map(|id| self.coordinates(id))
				.collect();
			if members.is_empty() {
				continue;
			}
			let center_x = members.iter().map(|c| c.center().0).sum::<f64>() / members.len() as f64;
			let top = members.iter().map(|c| c.y).fold(f64::INFINITY, f64::min);
			let center_y = top + self.config.box_height + self.config.union_offset;

			let (width, height) = self.box_size(meta, measure);
			let coords = BoxCoordinates {
				x: self.config.snap(center_x) - width / 2.0,
				y: self.config.snap(center_y) - height / 2.0,
				width,
				height,
			};
			self.insert(&meta.id, coords);
		}

		debug!(
			"auto layout placed {} boxes in {} rows, overlap {}",
			boxes.len(),
			rows.len(),
			self.total_overlap()
		);
		self.get_all_positions()
	}

	/// Sort a row by the mean x of each box's placed parents (boxes without
	/// placed parents go last), then pull spouses in right after their partner.
	fn order_row<'a>(&self, row: &[&'a BoxMeta], family: &Family) -> Vec<&'a BoxMeta> {
		let mut keyed: Vec<(Option<f64>, &'a BoxMeta)> = row
			.iter()
			.map(|meta| {
				let centers: Vec<f64> = family
					.parents(&meta.id)
					.iter()
					.filter_map(|id| self.coordinates(id))
					.map(|c| c.center().0)
					.collect();
				let key = (!centers.is_empty()).then(|| centers.iter().sum::<f64>() / centers.len() as f64);
				(key, *meta)
			})
			.collect();
		keyed.sort_by(|(a, _), (b, _)| match (a, b) {
			(Some(a), Some(b)) => a.total_cmp(b),
			(Some(_), None) => std::cmp::Ordering::Less,
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(None, None) => std::cmp::Ordering::Equal,
		});

		let mut ordered: Vec<&'a BoxMeta> = Vec::with_capacity(row.len());
		for &(_, meta) in &keyed {
			if ordered.iter().any(|m| m.id == meta.id) {
				continue;
			}
			ordered.push(meta);
			for &(_, other) in &keyed {
				if family.are_spouses(&meta.id, &other.id) && !ordered.iter().any(|m| m.id == other.id) {
					ordered.push(other);
				}
			}
		}
		ordered
	}

	fn insert(&mut self, id: &str, coords: BoxCoordinates) {
		if self.coordinates.insert(id.to_owned(), coords).is_none() {
			self.order.push(id.to_owned());
		}
	}

	fn overlap_with(&self, id: &str, rect: &BoxCoordinates) -> f64 {
		self.coordinates
			.iter()
			.filter(|(other, _)| other.as_str() != id)
			.map(|(_, c)| rect.overlap_area(c))
			.sum()
	}

	fn random_position(&mut self, width: f64, height: f64, canvas_width: f64, canvas_height: f64) -> (f64, f64) {
		let max_x = (canvas_width - self.config.placement_margin_x).max(0.0);
		let max_y = (canvas_height - self.config.placement_margin_y).max(0.0);

		let (ox, oy) = self.origin;

		let mut candidate = (ox, oy);
		for _ in 0..self.config.placement_attempts.max(1) {
			candidate = (ox + self.rng.gen_range(0.0..=max_x), oy + self.rng.gen_range(0.0..=max_y));
			let rect = BoxCoordinates {
				x: candidate.0,
				y: candidate.1,
				width,
				height,
			};
			if !self
				.coordinates
				.values()
				.any(|c| rect.intersects(c, self.config.overlap_padding))
			{
				return candidate;
			}
		}
		debug!(
			"no free spot for a {width}x{height} box after {} attempts",
			self.config.placement_attempts
		);
		candidate
	}
}

/// Couples and parentage read back from the scene's connections.
#[derive(Default)]
struct Family {
	/// Union id to the persons joined by it.
	unions: HashMap<String, Vec<String>>,
	/// Child id to union ids or parent ids.
	parent_links: HashMap<String, Vec<String>>,
}

impl Family {
	fn from_connections(connections: &[Connection], is_union: &HashMap<&str, bool>) -> Self {
		let union = |id: &str| is_union.get(id).copied().unwrap_or(false);
		let mut family = Family::default();

		for c in connections {
			match c.kind {
				ConnectionKind::Spouse => {
					let (person, union_id) = if union(&c.second) {
						(&c.first, &c.second)
					} else if union(&c.first) {
						(&c.second, &c.first)
					} else {
						continue;
					};
					family.unions.entry(union_id.clone()).or_default().push(person.clone());
				}
				ConnectionKind::Blood => {
					let (child, parent) = if union(&c.first) {
						(&c.second, &c.first)
					} else {
						(&c.first, &c.second)
					};
					family.parent_links.entry(child.clone()).or_default().push(parent.clone());
				}
				ConnectionKind::Other => {}
			}
		}
		family
	}

	fn members(&self, union_id: &str) -> &[String] {
		self.unions.get(union_id).map(Vec::as_slice).unwrap_or(&[])
	}

	fn parents(&self, child: &str) -> Vec<&str> {
		let Some(links) = self.parent_links.get(child) else {
			return Vec::new();
		};
		links
			.iter()
			.flat_map(|link| match self.unions.get(link) {
				Some(members) => members.iter().map(String::as_str).collect::<Vec<_>>(),
				None => vec![link.as_str()],
			})
			.collect()
	}

	fn are_spouses(&self, a: &str, b: &str) -> bool {
		a != b
			&& self
				.unions
				.values()
				.any(|members| members.iter().any(|m| m == a) && members.iter().any(|m| m == b))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::family_tree::types::pair_id;

	fn engine() -> LayoutEngine {
		LayoutEngine::with_rng(LayoutConfig::default(), StdRng::seed_from_u64(7))
	}

	fn measure(text: &str) -> f64 {
		text.chars().count() as f64 * 8.0
	}

	fn connection(first: &str, second: &str, kind: ConnectionKind) -> Connection {
		Connection {
			id: pair_id(first, second),
			first: first.into(),
			second: second.into(),
			kind,
		}
	}

	#[test]
	fn cached_coordinates_are_stable() {
		let mut layout = engine();
		let first = layout.get_box_coordinates("a", 80.0, 40.0, 960.0, 480.0);
		let second = layout.get_box_coordinates("a", 80.0, 40.0, 960.0, 480.0);
		assert_eq!(first, second);

		let resized = layout.get_box_coordinates("a", 120.0, 40.0, 960.0, 480.0);
		assert_eq!((resized.x, resized.y), (first.x, first.y));
		assert_eq!(resized.width, 120.0);
	}

	#[test]
	fn initial_position_is_used_verbatim() {
		let mut layout = engine();
		layout.set_initial_positions(&[Position {
			id: "a".into(),
			x: 123.0,
			y: 45.0,
		}]);
		let coords = layout.get_box_coordinates("a", 80.0, 40.0, 960.0, 480.0);
		assert_eq!((coords.x, coords.y), (123.0, 45.0));
	}

	#[test]
	fn random_placement_stays_near_canvas() {
		let mut layout = engine();
		for i in 0..20 {
			let c = layout.get_box_coordinates(&i.to_string(), 60.0, 40.0, 960.0, 480.0);
			assert!(c.x >= -10.0 && c.x <= 860.0 + 10.0, "x = {}", c.x);
			assert!(c.y >= -10.0 && c.y <= 430.0 + 10.0, "y = {}", c.y);
		}
	}

	#[test]
	fn random_placement_follows_origin() {
		let mut layout = engine();
		layout.set_origin(500.0, -300.0);
		for i in 0..20 {
			let c = layout.get_box_coordinates(&i.to_string(), 60.0, 40.0, 960.0, 480.0);
			assert!(c.x >= 490.0 && c.x <= 500.0 + 860.0 + 10.0, "x = {}", c.x);
			assert!(c.y >= -310.0 && c.y <= -300.0 + 430.0 + 10.0, "y = {}", c.y);
		}
	}

	#[test]
	fn exhausted_budget_still_places_box() {
		let mut layout = LayoutEngine::with_rng(
			LayoutConfig {
				placement_attempts: 3,
				..LayoutConfig::default()
			},
			StdRng::seed_from_u64(1),
		);
		// Canvas no larger than the margins: every candidate is (0, 0).
		let a = layout.get_box_coordinates("a", 80.0, 40.0, 100.0, 50.0);
		let b = layout.get_box_coordinates("b", 80.0, 40.0, 100.0, 50.0);
		assert_eq!((a.x, a.y), (0.0, 0.0));
		assert_ne!((a.x, a.y), (b.x, b.y));
		assert_eq!(layout.get_all_positions().len(), 2);
	}

	#[test]
	fn optimisation_separates_coincident_boxes() {
		let mut layout = engine();
		layout.set_initial_positions(&[
			Position {
				id: "A".into(),
				x: 100.0,
				y: 100.0,
			},
			Position {
				id: "B".into(),
				x: 100.0,
				y: 100.0,
			},
		]);
		let a = layout.get_box_coordinates("A", 80.0, 40.0, 960.0, 480.0);
		let b = layout.get_box_coordinates("B", 80.0, 40.0, 960.0, 480.0);

		assert_eq!((a.x, a.y), (100.0, 100.0));
		assert_eq!((b.x, b.y), (90.0, 90.0));
		assert!(a.overlap_area(&b) < 80.0 * 40.0);
		assert_eq!(layout.total_overlap(), 70.0 * 30.0);
	}

	#[test]
	fn move_box_snaps_center_to_grid() {
		let mut layout = engine();
		layout.get_box_coordinates("a", 80.0, 40.0, 960.0, 480.0);
		assert!(layout.move_box("a", 13.0, 27.0));
		let c = layout.coordinates("a").unwrap();
		assert_eq!((c.x, c.y), (10.0, 30.0));
		assert!(!layout.move_box("missing", 0.0, 0.0));
	}

	#[test]
	fn positions_export_in_placement_order_and_reset() {
		let mut layout = engine();
		layout.get_box_coordinates("b", 10.0, 10.0, 960.0, 480.0);
		layout.get_box_coordinates("a", 10.0, 10.0, 960.0, 480.0);
		let ids: Vec<String> = layout.get_all_positions().into_iter().map(|p| p.id).collect();
		assert_eq!(ids, ["b", "a"]);

		layout.retain(|id| id == "a");
		assert_eq!(layout.get_all_positions().len(), 1);

		layout.reset();
		assert!(layout.get_all_positions().is_empty());
		assert!(layout.coordinates("a").is_none());
	}

	#[test]
	fn auto_layout_rows_couples_and_unions() {
		let boxes = vec![
			BoxMeta::person("C", "Cleo", 2, false),
			BoxMeta::person("F", "Fred", 1, false),
			BoxMeta::person("M", "Mary", 1, false),
			BoxMeta::union("F-M"),
		];
		let connections = vec![
			connection("C", "F-M", ConnectionKind::Blood),
			connection("F", "F-M", ConnectionKind::Spouse),
			connection("M", "F-M", ConnectionKind::Spouse),
		];
		let mut layout = engine();
		let positions = layout.auto_layout(&boxes, &connections, 600.0, &measure);
		assert_eq!(positions.len(), 4);

		// "Fred" is 32 wide, plus padding, rounded up to 60.
		let at = |id: &str| {
			let c = layout.coordinates(id).unwrap();
			(c.x, c.y)
		};
		assert_eq!(at("F"), (230.0, 40.0));
		assert_eq!(at("M"), (310.0, 40.0));
		assert_eq!(at("C"), (270.0, 160.0));
		assert_eq!(at("F-M"), (295.0, 95.0));
	}

	#[test]
	fn auto_layout_orders_children_under_parents() {
		let boxes = vec![
			BoxMeta::person("A", "Anna", 1, false),
			BoxMeta::person("B", "Bert", 1, false),
			BoxMeta::person("X", "Xena", 2, false),
			BoxMeta::person("Y", "Yves", 2, false),
			BoxMeta::person("Z", "Zoe", 2, false),
		];
		// X belongs to B, Y to A, Z has no parents.
		let connections = vec![
			connection("X", "B", ConnectionKind::Blood),
			connection("Y", "A", ConnectionKind::Blood),
		];
		let mut layout = engine();
		layout.auto_layout(&boxes, &connections, 800.0, &measure);

		let x = |id: &str| layout.coordinates(id).unwrap().x;
		assert!(x("A") < x("B"));
		assert!(x("Y") < x("X"));
		assert!(x("X") < x("Z"));
	}

	#[test]
	fn auto_layout_keeps_spouses_adjacent() {
		let boxes = vec![
			BoxMeta::person("A", "Anna", 1, false),
			BoxMeta::person("B", "Bert", 1, false),
			BoxMeta::person("C", "Carl", 1, false),
			BoxMeta::union("A-C"),
		];
		let connections = vec![
			connection("A", "A-C", ConnectionKind::Spouse),
			connection("C", "A-C", ConnectionKind::Spouse),
		];
		let mut layout = engine();
		layout.auto_layout(&boxes, &connections, 800.0, &measure);

		let a = layout.coordinates("A").unwrap();
		let c = layout.coordinates("C").unwrap();
		let b = layout.coordinates("B").unwrap();
		assert_eq!(c.x - (a.x + a.width), 20.0);
		assert!(b.x > c.x);
	}
}
