#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod document;
pub mod elements;
pub mod layout;
pub mod positions;
pub mod registry;
pub mod render;
pub mod scene;
pub mod schema;
pub mod viewport;

#[cfg(feature = "cli")]
pub use cli::run;
