//! Suffix-convention passes over a configuration tree
//!
//! | Suffix | Pass | Effect |
//! |---|---|---|
//! | `_path` | [`paths`] | value rewritten to an absolute path |
//! | `_module_path` | [`modules`] | value bound into the module side table |
//! | `_load_url` | [`remote`] | descriptor fetched to its sink |

pub mod modules;
pub mod paths;
pub mod remote;

pub use modules::{bind_modules, FileModuleLoader, ModuleHandle, ModuleLoader, ModuleTable};
pub use paths::{make_paths_absolute, PathResolver};
pub use remote::{materialize, parse_descriptor};
