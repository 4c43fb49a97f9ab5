//! libVLC 3.x binding
//!
//! Symbols are resolved at runtime from the root chosen by the resolver, so
//! the binary carries no link-time dependency on libvlc.

mod events;
mod ffi;
mod instance;
mod library;
mod player;

pub use instance::{VlcEngine, VlcLoader, VlcMedia};
pub use player::VlcPlayer;
