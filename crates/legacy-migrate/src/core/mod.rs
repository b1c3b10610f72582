//! Core abstractions shared by every pipeline stage.
//!
//! - [`record`]: the ordered row type and value helpers
//! - [`schema`]: column metadata dumped next to exported data
//! - [`traits`]: the legacy source / target store seam

pub mod record;
pub mod schema;
pub mod traits;

pub use record::Record;
pub use schema::ColumnInfo;
pub use traits::{LegacySource, TargetStore};
