// List views: load a remote collection, derive filtered/sorted/grouped rows,
// apply optimistic edits. One `ListController` per resource, configured by
// the presets; the transport is injected.

pub mod collection;
pub mod compare;
pub mod config;
pub mod controller;
pub mod filter;
pub mod handlers;
pub mod loader;
pub mod mutation;
pub mod presets;
pub mod projector;
pub mod registry;

pub use controller::ListController;
pub use presets::Resource;
pub use registry::ViewRegistry;
