use super::layout::{LayoutConfig, LayoutEngine};
use super::scene::SceneGraph;
use super::types::{BoxId, PlacedBox};
use crate::kinship::{ExtendedPerson, Position, Relationship};

/// Zoom behaviour for wheel input.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewConfig {
	/// Exponent applied per wheel notch.
	pub zoom_intensity: f64,
	pub min_scale: f64,
	pub max_scale: f64,
}

impl Default for ViewConfig {
	fn default() -> Self {
		Self {
			zoom_intensity: 0.1,
			min_scale: 0.1,
			max_scale: 10.0,
		}
	}
}

/// Screen = model * k + (x, y).
#[derive(Clone, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self { x: 0.0, y: 0.0, k: 1.0 }
	}
}

impl ViewTransform {
	pub fn screen_to_model(&self, sx: f64, sy: f64) -> (f64, f64) {
		((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	pub fn model_to_screen(&self, mx: f64, my: f64) -> (f64, f64) {
		(mx * self.k + self.x, my * self.k + self.y)
	}

	pub fn pan(&mut self, dx: f64, dy: f64) {
		self.x += dx;
		self.y += dy;
	}

	/// Zoom around a screen point so the model point under it stays put.
	/// Negative `delta_y` zooms in. Returns `false` when the scale did not
	/// change (zero delta, or already at a limit).
	pub fn zoom_at(&mut self, sx: f64, sy: f64, delta_y: f64, view: &ViewConfig) -> bool {
		let factor = if delta_y < 0.0 {
			view.zoom_intensity.exp()
		} else if delta_y > 0.0 {
			(-view.zoom_intensity).exp()
		} else {
			return false;
		};

		let new_k = (self.k * factor).clamp(view.min_scale, view.max_scale);
		if new_k == self.k {
			return false;
		}
		let ratio = new_k / self.k;
		self.x = sx - (sx - self.x) * ratio;
		self.y = sy - (sy - self.y) * ratio;
		self.k = new_k;
		true
	}
}

/// Pointer state machine.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Interaction {
	#[default]
	Idle,
	/// Dragging empty canvas; last pointer position in screen space.
	PanningCanvas { last_x: f64, last_y: f64 },
	/// Dragging a box; offset is pointer minus box origin in model space.
	DraggingBox { id: BoxId, offset_x: f64, offset_y: f64 },
}

/// What a pointer move did.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerMove {
	Ignored,
	Panned,
	/// A box moved; carries every box position after the move.
	BoxMoved(Vec<Position>),
}

/// Everything a tree view owns: the scene, the layout cache, the view
/// transform and the pointer state.
pub struct FamilyTreeState {
	pub scene: SceneGraph,
	pub layout: LayoutEngine,
	pub transform: ViewTransform,
	pub interaction: Interaction,
	pub view: ViewConfig,
	pub width: f64,
	pub height: f64,
}

impl FamilyTreeState {
	pub fn new(layout: LayoutConfig, view: ViewConfig, width: f64, height: f64) -> Self {
		Self::with_layout(LayoutEngine::new(layout), view, width, height)
	}

	pub fn with_layout(layout: LayoutEngine, view: ViewConfig, width: f64, height: f64) -> Self {
		Self {
			scene: SceneGraph::new(),
			layout,
			transform: ViewTransform::default(),
			interaction: Interaction::Idle,
			view,
			width,
			height,
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	/// Rebuild the scene from scratch. Cached coordinates survive for boxes
	/// that still exist; the rest are dropped.
	pub fn load(
		&mut self,
		persons: &[ExtendedPerson],
		relationships: &[Relationship],
		positions: &[Position],
		search: &str,
	) {
		self.layout.set_initial_positions(positions);
		self.scene.reset();
		self.scene.populate(persons, relationships, search);

		let scene = &self.scene;
		self.layout.retain(|id| scene.get(id).is_some());

		let dragged = match &self.interaction {
			Interaction::DraggingBox { id, .. } => Some(id.clone()),
			_ => None,
		};
		if let Some(id) = dragged {
			if self.scene.get(&id).is_some() {
				self.scene.set_selected_box_id(Some(id));
			} else {
				self.interaction = Interaction::Idle;
			}
		}
	}

	/// Move placed boxes to the given positions and seed the rest. Returns
	/// `true` if any placed box changed, so echoes of our own reports are
	/// no-ops.
	pub fn apply_positions(&mut self, positions: &[Position]) -> bool {
		self.layout.set_initial_positions(positions);
		let mut changed = false;
		for p in positions {
			let moved = self
				.layout
				.coordinates(&p.id)
				.is_some_and(|c| (c.x, c.y) != (p.x, p.y));
			if moved {
				changed |= self.layout.place_box(&p.id, p.x, p.y);
			}
		}
		changed
	}

	/// Every box with resolved coordinates, in draw order. Boxes seen for the
	/// first time are placed within the visible area.
	pub fn placed_boxes(&mut self, measure: &dyn Fn(&str) -> f64) -> Vec<PlacedBox> {
		let (canvas_width, canvas_height) = (self.width / self.transform.k, self.height / self.transform.k);
		let (left, top) = self.transform.screen_to_model(0.0, 0.0);
		self.layout.set_origin(left, top);
		let selected = self.scene.selected_box().map(|b| b.id.clone());

		self.scene
			.boxes()
			.iter()
			.map(|meta| {
				let (width, height) = self.layout.box_size(meta, measure);
				let coords = self
					.layout
					.get_box_coordinates(&meta.id, width, height, canvas_width, canvas_height);
				PlacedBox {
					meta: meta.clone(),
					coords,
					selected: selected.as_deref() == Some(meta.id.as_str()),
				}
			})
			.collect()
	}

	/// Topmost placed box containing the model-space point.
	pub fn box_at(&self, mx: f64, my: f64) -> Option<BoxId> {
		self.scene
			.boxes()
			.iter()
			.rev()
			.find(|meta| {
				self.layout
					.coordinates(&meta.id)
					.is_some_and(|c| c.contains(mx, my))
			})
			.map(|meta| meta.id.clone())
	}

	/// Start dragging the box under the pointer, or start panning.
	pub fn pointer_down(&mut self, sx: f64, sy: f64) {
		let (mx, my) = self.transform.screen_to_model(sx, sy);
		let hit = self
			.box_at(mx, my)
			.and_then(|id| self.layout.coordinates(&id).map(|c| (id, c)));

		self.interaction = match hit {
			Some((id, coords)) => {
				self.scene.set_selected_box_id(Some(id.clone()));
				Interaction::DraggingBox {
					id,
					offset_x: mx - coords.x,
					offset_y: my - coords.y,
				}
			}
			None => Interaction::PanningCanvas { last_x: sx, last_y: sy },
		};
	}

	pub fn pointer_move(&mut self, sx: f64, sy: f64) -> PointerMove {
		match &mut self.interaction {
			Interaction::Idle => PointerMove::Ignored,
			Interaction::PanningCanvas { last_x, last_y } => {
				self.transform.pan(sx - *last_x, sy - *last_y);
				(*last_x, *last_y) = (sx, sy);
				PointerMove::Panned
			}
			Interaction::DraggingBox { id, offset_x, offset_y } => {
				let (mx, my) = self.transform.screen_to_model(sx, sy);
				if !self.layout.move_box(id, mx - *offset_x, my - *offset_y) {
					return PointerMove::Ignored;
				}
				PointerMove::BoxMoved(self.layout.get_all_positions())
			}
		}
	}

	/// End any drag or pan. Returns `true` if a box was being dragged.
	pub fn pointer_up(&mut self) -> bool {
		self.scene.set_selected_box_id(None);
		let was_dragging = matches!(self.interaction, Interaction::DraggingBox { .. });
		self.interaction = Interaction::Idle;
		was_dragging
	}

	/// Id of the box under a double click, if any.
	pub fn double_click(&self, sx: f64, sy: f64) -> Option<BoxId> {
		let (mx, my) = self.transform.screen_to_model(sx, sy);
		self.box_at(mx, my)
	}

	pub fn wheel(&mut self, sx: f64, sy: f64, delta_y: f64) -> bool {
		self.transform.zoom_at(sx, sy, delta_y, &self.view)
	}

	/// Lay the whole scene out in generation rows across the visible width.
	pub fn auto_layout(&mut self, measure: &dyn Fn(&str) -> f64) -> Vec<Position> {
		let canvas_width = self.width / self.transform.k;
		self.layout
			.auto_layout(self.scene.boxes(), self.scene.connections(), canvas_width, measure)
	}
}
