//! CLI command handling

pub mod action;
pub mod context;
pub mod endpoint;
pub mod history;
pub mod notify;
pub mod output;
pub mod prefs;
pub mod run;
pub mod templates;

pub use action::*;
pub use context::*;
pub use endpoint::*;
pub use history::*;
pub use notify::*;
pub use output::*;
pub use prefs::*;
pub use run::*;
pub use templates::*;
