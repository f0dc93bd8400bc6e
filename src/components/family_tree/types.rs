/// Box identifier: a person id, or a union id built with [`pair_id`].
pub type BoxId = String;

/// Drawable node registered in the scene graph.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxMeta {
	pub id: BoxId,
	/// Label. Empty for union (marriage) boxes.
	pub text: String,
	pub generation: Option<u32>,
	pub highlight: bool,
}

impl BoxMeta {
	pub fn person(id: impl Into<BoxId>, text: impl Into<String>, generation: u32, highlight: bool) -> Self {
		Self {
			id: id.into(),
			text: text.into(),
			generation: Some(generation),
			highlight,
		}
	}

	pub fn union(id: impl Into<BoxId>) -> Self {
		Self {
			id: id.into(),
			text: String::new(),
			generation: None,
			highlight: false,
		}
	}

	pub fn is_union(&self) -> bool {
		self.text.is_empty()
	}
}

/// Model-space rectangle of a box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoxCoordinates {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl BoxCoordinates {
	pub fn center(&self) -> (f64, f64) {
		(self.x + self.width / 2.0, self.y + self.height / 2.0)
	}

	pub fn contains(&self, x: f64, y: f64) -> bool {
		x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
	}

	/// Bounding-box intersection, each side grown by `padding`.
	pub fn intersects(&self, other: &BoxCoordinates, padding: f64) -> bool {
		self.x - padding < other.x + other.width
			&& self.x + self.width + padding > other.x
			&& self.y - padding < other.y + other.height
			&& self.y + self.height + padding > other.y
	}

	pub fn overlap_area(&self, other: &BoxCoordinates) -> f64 {
		let dx = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
		let dy = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
		dx.max(0.0) * dy.max(0.0)
	}
}

/// A box with its resolved coordinates, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedBox {
	pub meta: BoxMeta,
	pub coords: BoxCoordinates,
	pub selected: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionKind {
	Blood,
	Spouse,
	Other,
}

/// Undirected edge between two boxes.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
	pub id: String,
	pub first: BoxId,
	pub second: BoxId,
	pub kind: ConnectionKind,
}

/// Order-independent id for a pair of ids: `"{min}-{max}"`.
pub fn pair_id(a: &str, b: &str) -> String {
	if a <= b {
		format!("{a}-{b}")
	} else {
		format!("{b}-{a}")
	}
}
