//! Output layer: flat-file exports and the terminal summary.

pub mod console;
pub mod export;

pub use console::render_summary;
pub use export::{export_results, ExportManifest};
