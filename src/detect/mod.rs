//! Change detection: which modules and build inputs changed since the
//! last successful deployment

pub mod build;
pub mod modules;

pub use build::{file_mtime, needs_rebuild, BuildDecision};
pub use modules::{detect_module_changes, list_catalog_modules, DetectedModules};
