//! Configuration loading, merging and the `Configuration` type

pub mod configuration;
pub mod loader;
pub mod merge;

pub use configuration::{pretty_json, Configuration, Metadata, Pipeline};
pub use loader::{load, Format, Loaded, Loader};
pub use merge::deep_merge;
