//! Configuration for the enricher binary.

mod dependencies;
mod settings;

pub use dependencies::{build_enricher, Dependencies};
pub use settings::Settings;
