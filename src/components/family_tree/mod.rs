//! Canvas view of a family tree.
//!
//! [`SceneGraph`] holds the boxes and connections built from the kinship
//! data, [`LayoutEngine`] owns their coordinates, and [`FamilyTreeState`]
//! ties both to the view transform and pointer handling. The Leptos
//! component drives all of it against a 2D canvas.

mod component;
mod debounce;
mod layout;
mod render;
mod scene;
mod state;
mod types;

pub use component::FamilyTreeCanvas;
pub use layout::{LayoutConfig, LayoutEngine};
pub use render::{Surface, SurfaceError};
pub use scene::SceneGraph;
pub use state::{FamilyTreeState, Interaction, PointerMove, ViewConfig, ViewTransform};
pub use types::{BoxCoordinates, BoxId, BoxMeta, Connection, ConnectionKind, PlacedBox, pair_id};
