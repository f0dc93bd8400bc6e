use std::collections::HashMap;
use std::f64::consts::PI;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, TouchEvent};

use super::state::FamilyTreeState;
use super::types::{ConnectionKind, PlacedBox};

pub const FONT: &str = "12px Inter, sans-serif";
const BOX_FILL: &str = "#aaf";
const BOX_STROKE: &str = "#000";
const HIGHLIGHT_FILL: &str = "#ffeb3b";
const HIGHLIGHT_STROKE: &str = "#f57f17";
const TEXT_COLOR: &str = "#000";
const LINE_COLOR: &str = "#000";
const LINE_WIDTH: f64 = 2.0;
const CORNER_RADIUS: f64 = 8.0;
const UNION_RADIUS: f64 = 6.0;
const SOLID: &[f64] = &[];
const DASHED: &[f64] = &[6.0, 4.0];

/// Per-character width used when the context cannot measure text.
pub const FALLBACK_CHAR_WIDTH: f64 = 8.0;
pub const DEFAULT_WIDTH: f64 = 960.0;
pub const DEFAULT_HEIGHT: f64 = 480.0;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
	#[error("canvas has no 2d context")]
	NoContext,
	#[error("canvas context is not a CanvasRenderingContext2d")]
	WrongContext,
	#[error("canvas call failed: {0}")]
	Js(String),
}

impl From<JsValue> for SurfaceError {
	fn from(value: JsValue) -> Self {
		Self::Js(value.as_string().unwrap_or_else(|| format!("{value:?}")))
	}
}

/// A canvas and its 2D context.
pub struct Surface {
	canvas: HtmlCanvasElement,
	ctx: CanvasRenderingContext2d,
}

impl Surface {
	pub fn new(canvas: HtmlCanvasElement) -> Result<Self, SurfaceError> {
		let ctx = canvas
			.get_context("2d")?
			.ok_or(SurfaceError::NoContext)?
			.dyn_into::<CanvasRenderingContext2d>()
			.map_err(|_| SurfaceError::WrongContext)?;
		ctx.set_font(FONT);
		Ok(Self { canvas, ctx })
	}

	/// Match the backing store to the displayed size and return it. Fixed
	/// dimensions win over the measured ones; a canvas with no layout yet
	/// falls back to 960x480.
	pub fn update_canvas_size(&self, fullscreen: bool, width: Option<f64>, height: Option<f64>) -> (f64, f64) {
		let (measured_w, measured_h) = if fullscreen {
			let window = web_sys::window();
			let read = |v: Option<Result<JsValue, JsValue>>| v.and_then(Result::ok).and_then(|v| v.as_f64());
			(
				read(window.as_ref().map(|w| w.inner_width())),
				read(window.as_ref().map(|w| w.inner_height())),
			)
		} else {
			let rect = self.canvas.get_bounding_client_rect();
			(Some(rect.width()), Some(rect.height()))
		};

		let pick = |fixed: Option<f64>, measured: Option<f64>, default: f64| {
			fixed.or(measured).filter(|v| *v > 0.0).unwrap_or(default)
		};
		let w = pick(width, measured_w, DEFAULT_WIDTH);
		let h = pick(height, measured_h, DEFAULT_HEIGHT);

		self.canvas.set_width(w as u32);
		self.canvas.set_height(h as u32);
		// Resizing the backing store resets context state.
		self.ctx.set_font(FONT);
		(w, h)
	}

	/// Pointer position relative to the canvas, in screen pixels.
	pub fn mouse_point(&self, ev: &MouseEvent) -> (f64, f64) {
		self.client_to_local(ev.client_x() as f64, ev.client_y() as f64)
	}

	/// First touch relative to the canvas. Falls back to the changed touches
	/// so `touchend` still has a point.
	pub fn touch_point(&self, ev: &TouchEvent) -> Option<(f64, f64)> {
		let touch = ev.touches().get(0).or_else(|| ev.changed_touches().get(0))?;
		Some(self.client_to_local(touch.client_x() as f64, touch.client_y() as f64))
	}

	fn client_to_local(&self, client_x: f64, client_y: f64) -> (f64, f64) {
		let rect = self.canvas.get_bounding_client_rect();
		(client_x - rect.left(), client_y - rect.top())
	}

	pub fn text_width(&self, text: &str) -> f64 {
		self.ctx.set_font(FONT);
		self.ctx
			.measure_text(text)
			.ok()
			.map(|m| m.width())
			.filter(|w| *w > 0.0)
			.unwrap_or_else(|| estimate_text_width(text))
	}

	/// Clear, apply the view transform, then draw connections under boxes.
	pub fn draw(&self, state: &mut FamilyTreeState) -> Result<(), SurfaceError> {
		let measure = |text: &str| self.text_width(text);
		let boxes = state.placed_boxes(&measure);
		let text_padding = state.layout.config().text_padding;

		self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
		self.ctx.clear_rect(0.0, 0.0, state.width, state.height);
		let t = &state.transform;
		self.ctx.set_transform(t.k, 0.0, 0.0, t.k, t.x, t.y)?;

		let by_id: HashMap<&str, &PlacedBox> = boxes.iter().map(|b| (b.meta.id.as_str(), b)).collect();
		for connection in state.scene.connections() {
			let (Some(first), Some(second)) = (
				by_id.get(connection.first.as_str()),
				by_id.get(connection.second.as_str()),
			) else {
				continue;
			};
			self.draw_angled_line(first.coords.center(), second.coords.center(), None, connection.kind)?;
		}

		for placed in &boxes {
			self.draw_box(placed, text_padding)?;
		}
		Ok(())
	}

	/// Unions are small dots; persons are rounded, shadowed rectangles with the
	/// label left aligned and vertically centered.
	pub fn draw_box(&self, placed: &PlacedBox, text_padding: f64) -> Result<(), SurfaceError> {
		let ctx = &self.ctx;
		let c = &placed.coords;
		ctx.save();

		if placed.meta.is_union() {
			let (cx, cy) = c.center();
			ctx.begin_path();
			ctx.arc(cx, cy, UNION_RADIUS, 0.0, 2.0 * PI)?;
			ctx.set_fill_style_str(BOX_STROKE);
			ctx.fill();
			ctx.restore();
			return Ok(());
		}

		ctx.set_shadow_color("rgba(0, 0, 0, 0.1)");
		ctx.set_shadow_blur(4.0);
		ctx.set_shadow_offset_y(2.0);
		self.rounded_rect(c.x, c.y, c.width, c.height, CORNER_RADIUS);
		ctx.set_fill_style_str(if placed.meta.highlight { HIGHLIGHT_FILL } else { BOX_FILL });
		ctx.fill();

		let emphasised = placed.meta.highlight || placed.selected;
		ctx.set_shadow_color("transparent");
		ctx.set_stroke_style_str(if emphasised { HIGHLIGHT_STROKE } else { BOX_STROKE });
		ctx.set_line_width(if emphasised { LINE_WIDTH * 1.5 } else { LINE_WIDTH });
		ctx.stroke();

		ctx.set_font(FONT);
		ctx.set_fill_style_str(TEXT_COLOR);
		ctx.set_text_align("left");
		ctx.set_text_baseline("middle");
		let drawn = ctx.fill_text(&placed.meta.text, c.x + text_padding, c.y + c.height / 2.0);
		ctx.restore();
		drawn.map_err(Into::into)
	}

	/// Vertical, horizontal, vertical connector between two points.
	pub fn draw_angled_line(
		&self,
		start: (f64, f64),
		end: (f64, f64),
		mid_y: Option<f64>,
		kind: ConnectionKind,
	) -> Result<(), SurfaceError> {
		let ctx = &self.ctx;
		let (width, dash) = line_style(kind);
		let pattern = js_sys::Array::new();
		for segment in dash {
			pattern.push(&JsValue::from_f64(*segment));
		}

		ctx.save();
		let styled = ctx.set_line_dash(&pattern);
		ctx.set_line_width(width);
		ctx.set_stroke_style_str(LINE_COLOR);
		ctx.begin_path();
		for (i, (x, y)) in elbow_points(start, end, mid_y).into_iter().enumerate() {
			if i == 0 {
				ctx.move_to(x, y);
			} else {
				ctx.line_to(x, y);
			}
		}
		ctx.stroke();
		ctx.restore();
		styled.map_err(Into::into)
	}

	fn rounded_rect(&self, x: f64, y: f64, width: f64, height: f64, radius: f64) {
		let ctx = &self.ctx;
		let r = radius.min(width / 2.0).min(height / 2.0);
		ctx.begin_path();
		ctx.move_to(x + r, y);
		ctx.line_to(x + width - r, y);
		ctx.quadratic_curve_to(x + width, y, x + width, y + r);
		ctx.line_to(x + width, y + height - r);
		ctx.quadratic_curve_to(x + width, y + height, x + width - r, y + height);
		ctx.line_to(x + r, y + height);
		ctx.quadratic_curve_to(x, y + height, x, y + height - r);
		ctx.line_to(x, y + r);
		ctx.quadratic_curve_to(x, y, x + r, y);
		ctx.close_path();
	}
}

pub fn estimate_text_width(text: &str) -> f64 {
	text.chars().count() as f64 * FALLBACK_CHAR_WIDTH
}

/// Corner points of an elbow connector. The horizontal run sits at `mid_y`,
/// or halfway between the endpoints.
pub fn elbow_points(start: (f64, f64), end: (f64, f64), mid_y: Option<f64>) -> [(f64, f64); 4] {
	let mid_y = mid_y.unwrap_or(start.1 + (end.1 - start.1) / 2.0);
	[start, (start.0, mid_y), (end.0, mid_y), end]
}

/// Stroke width and dash pattern for a connection kind.
pub fn line_style(kind: ConnectionKind) -> (f64, &'static [f64]) {
	match kind {
		ConnectionKind::Spouse => (3.0, SOLID),
		ConnectionKind::Blood => (1.5, DASHED),
		ConnectionKind::Other => (LINE_WIDTH, SOLID),
	}
}
