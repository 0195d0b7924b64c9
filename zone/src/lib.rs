//! Zone grid and interest window tracking for zonecast.
//!
//! The world is cut into axis-aligned cells ([`ZoneKey`]) by a [`ZoneGrid`].
//! A connection is interested in every zone within a fixed radius of its
//! center zone; [`ZoneCenterTracker`] follows that center and reports which
//! zones entered or left the window. Zone managers push one [`StateBlock`]
//! per zone per tick into a [`FrameListener`].
//!
//! # Design Principles
//!
//! - **Geometry only** - Nothing here knows how state is encoded or sent.
//! - **Stable ids within a tick** - Zone ids only change when the center moves,
//!   and the center only moves at the end of a frame.

mod block;
mod error;
mod grid;
mod key;
mod listener;
mod tracker;
mod types;

pub use block::{StateBlock, StateEntry};
pub use error::{ZoneError, ZoneResult};
pub use glam::{DQuat, DVec3};
pub use grid::ZoneGrid;
pub use key::ZoneKey;
pub use listener::FrameListener;
pub use tracker::ZoneCenterTracker;
pub use types::EntityId;
