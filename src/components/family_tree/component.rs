use std::cell::RefCell;
use std::rc::Rc;

use leptos::ev;
use leptos::prelude::*;
use log::{debug, error};
use web_sys::{HtmlCanvasElement, MouseEvent, TouchEvent, WheelEvent};

use super::debounce::Debouncer;
use super::layout::LayoutConfig;
use super::render::{Surface, SurfaceError};
use super::state::{FamilyTreeState, PointerMove, ViewConfig};
use crate::kinship::{ExtendedPerson, Position, Relationship};

struct Tree {
	state: FamilyTreeState,
	surface: Surface,
}

type SharedTree = Rc<RefCell<Option<Tree>>>;

impl Tree {
	fn mount(
		canvas: HtmlCanvasElement,
		config: LayoutConfig,
		view: ViewConfig,
		size: (bool, Option<f64>, Option<f64>),
	) -> Result<Self, SurfaceError> {
		let surface = Surface::new(canvas)?;
		let (w, h) = surface.update_canvas_size(size.0, size.1, size.2);
		debug!("family tree canvas mounted at {w}x{h}");
		Ok(Self {
			state: FamilyTreeState::new(config, view, w, h),
			surface,
		})
	}

	fn redraw(&mut self) {
		if let Err(err) = self.surface.draw(&mut self.state) {
			error!("failed to draw family tree: {err}");
		}
	}

	fn resize(&mut self, size: (bool, Option<f64>, Option<f64>)) {
		let (w, h) = self.surface.update_canvas_size(size.0, size.1, size.2);
		self.state.resize(w, h);
		self.redraw();
	}

	fn pressed(&mut self, x: f64, y: f64) {
		self.state.pointer_down(x, y);
		self.redraw();
	}

	fn moved(&mut self, x: f64, y: f64) -> Option<Vec<Position>> {
		match self.state.pointer_move(x, y) {
			PointerMove::Ignored => None,
			PointerMove::Panned => {
				self.redraw();
				None
			}
			PointerMove::BoxMoved(positions) => {
				self.redraw();
				Some(positions)
			}
		}
	}

	fn released(&mut self) {
		if self.state.pointer_up() {
			self.redraw();
		}
	}

	fn auto_layout(&mut self) -> Vec<Position> {
		let surface = &self.surface;
		let positions = self.state.auto_layout(&|text: &str| surface.text_width(text));
		self.redraw();
		positions
	}
}

fn with_tree<R>(tree: &SharedTree, f: impl FnOnce(&mut Tree) -> R) -> Option<R> {
	tree.borrow_mut().as_mut().map(f)
}

/// Interactive family tree drawn on a canvas.
///
/// Boxes can be dragged, the background pans, the wheel zooms around the
/// pointer and double clicking a box reports its id through `on_activate`.
/// Position changes are reported through `on_positions_change`, debounced by
/// `positions_debounce_ms`.
#[component]
pub fn FamilyTreeCanvas(
	/// Derived person records to draw.
	#[prop(into)]
	persons: Signal<Vec<ExtendedPerson>>,
	/// Stored relationships.
	#[prop(into, default = Signal::stored(Vec::new()))]
	relationships: Signal<Vec<Relationship>>,
	/// Persisted coordinates. Boxes not yet placed start here; placed boxes
	/// move when an entry differs from their current spot.
	#[prop(into, default = Signal::stored(Vec::new()))]
	positions: Signal<Vec<Position>>,
	/// Boxes whose full name contains this text are highlighted.
	#[prop(into, default = Signal::stored(String::new()))]
	search: Signal<String>,
	/// Every change re-runs the generation-row layout.
	#[prop(into, default = Signal::stored(0))]
	layout_requests: Signal<u32>,
	#[prop(optional)] on_activate: Option<Callback<String>>,
	#[prop(optional)] on_positions_change: Option<Callback<Vec<Position>>>,
	#[prop(optional)] config: LayoutConfig,
	#[prop(optional)] view_config: ViewConfig,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
	#[prop(default = 100)] positions_debounce_ms: u64,
	#[prop(default = 5)] resize_debounce_ms: u64,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let tree: SharedTree = Rc::new(RefCell::new(None));
	let (failure, set_failure) = signal(None::<String>);
	let size = (fullscreen, width, height);

	let positions_debounce = Rc::new(Debouncer::new(positions_debounce_ms));
	let resize_debounce = Rc::new(Debouncer::new(resize_debounce_ms));
	let debouncers = StoredValue::new_local([positions_debounce.clone(), resize_debounce.clone()]);

	let report: Rc<dyn Fn(Vec<Position>)> = Rc::new(move |positions: Vec<Position>| {
		if let Some(callback) = on_positions_change {
			positions_debounce.call(move || callback.run(positions));
		}
	});

	let tree_load = tree.clone();
	Effect::new(move |_| {
		let persons = persons.get();
		let relationships = relationships.get();
		let positions = positions.get_untracked();
		let search = search.get();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};

		let mut slot = tree_load.borrow_mut();
		if slot.is_none() {
			match Tree::mount(canvas.into(), config.clone(), view_config.clone(), size) {
				Ok(mounted) => *slot = Some(mounted),
				Err(err) => {
					error!("family tree canvas unavailable: {err}");
					set_failure.set(Some(err.to_string()));
					return;
				}
			}
		}
		if let Some(t) = slot.as_mut() {
			t.state.load(&persons, &relationships, &positions, &search);
			t.redraw();
		}
	});

	let tree_positions = tree.clone();
	Effect::new(move |_| {
		let positions = positions.get();
		with_tree(&tree_positions, |t| {
			if t.state.apply_positions(&positions) {
				t.redraw();
			}
		});
	});

	let (tree_layout, report_layout) = (tree.clone(), report.clone());
	Effect::new(move |previous: Option<u32>| {
		let request = layout_requests.get();
		if previous.is_some_and(|p| p != request) {
			if let Some(positions) = with_tree(&tree_layout, Tree::auto_layout) {
				report_layout(positions);
			}
		}
		request
	});

	let tree_resize = tree.clone();
	let resize_handle = window_event_listener(ev::resize, move |_| {
		let tree = tree_resize.clone();
		resize_debounce.call(move || {
			with_tree(&tree, |t| t.resize(size));
		});
	});
	let tree_release = tree.clone();
	let release_handle = window_event_listener(ev::mouseup, move |_| {
		with_tree(&tree_release, Tree::released);
	});
	on_cleanup(move || {
		resize_handle.remove();
		release_handle.remove();
		debouncers.try_with_value(|pending| pending.iter().for_each(|d| d.close()));
	});

	let tree_md = tree.clone();
	let on_mousedown = move |ev: MouseEvent| {
		with_tree(&tree_md, |t| {
			let (x, y) = t.surface.mouse_point(&ev);
			t.pressed(x, y);
		});
	};

	let (tree_mm, report_mm) = (tree.clone(), report.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let moved = with_tree(&tree_mm, |t| {
			let (x, y) = t.surface.mouse_point(&ev);
			t.moved(x, y)
		});
		if let Some(Some(positions)) = moved {
			report_mm(positions);
		}
	};

	let tree_mu = tree.clone();
	let on_mouseup = move |_: MouseEvent| {
		with_tree(&tree_mu, Tree::released);
	};

	let tree_ml = tree.clone();
	let on_mouseleave = move |_: MouseEvent| {
		with_tree(&tree_ml, Tree::released);
	};

	let tree_dc = tree.clone();
	let on_dblclick = move |ev: MouseEvent| {
		let hit = with_tree(&tree_dc, |t| {
			let (x, y) = t.surface.mouse_point(&ev);
			t.state.double_click(x, y)
		})
		.flatten();
		if let (Some(id), Some(callback)) = (hit, on_activate) {
			callback.run(id);
		}
	};

	let tree_wh = tree.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		with_tree(&tree_wh, |t| {
			let (x, y) = t.surface.mouse_point(&ev);
			if t.state.wheel(x, y, ev.delta_y()) {
				t.redraw();
			}
		});
	};

	let tree_ts = tree.clone();
	let on_touchstart = move |ev: TouchEvent| {
		ev.prevent_default();
		with_tree(&tree_ts, |t| {
			if let Some((x, y)) = t.surface.touch_point(&ev) {
				t.pressed(x, y);
			}
		});
	};

	let (tree_tm, report_tm) = (tree.clone(), report);
	let on_touchmove = move |ev: TouchEvent| {
		ev.prevent_default();
		let moved = with_tree(&tree_tm, |t| {
			let (x, y) = t.surface.touch_point(&ev)?;
			t.moved(x, y)
		});
		if let Some(Some(positions)) = moved {
			report_tm(positions);
		}
	};

	let tree_te = tree;
	let on_touchend = move |_: TouchEvent| {
		with_tree(&tree_te, Tree::released);
	};

	view! {
		{move || {
			failure
				.get()
				.map(|message| {
					view! { <p class="family-tree-error">"Unable to draw the family tree: " {message}</p> }
				})
		}}
		<canvas
			node_ref=canvas_ref
			class="family-tree-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:dblclick=on_dblclick
			on:wheel=on_wheel
			on:touchstart=on_touchstart
			on:touchmove=on_touchmove
			on:touchend=on_touchend
			style=move || {
				if failure.get().is_some() {
					"display: none;"
				} else {
					"display: block; cursor: grab; touch-action: none;"
				}
			}
		/>
	}
}
