//! # Interchange-atlas Library
//!
//! Builds a catalog of motorway interchanges from OpenStreetMap ramp data.
//!
//! Motorway-link ways are contracted into ramps, ramps are linked into a
//! DAG and split into branches, branches are clustered spatially into
//! interchanges, and interchanges are named, corrected, annotated with the
//! roads their ramps lead to and ordered along the freeway routes.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use interchange_atlas::{run_pipeline, InputBundle, PipelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bundle = InputBundle::load(Path::new("bundle.json"))?;
//!     let interchanges = run_pipeline(&bundle, &PipelineConfig::default())?;
//!     for ic in &interchanges {
//!         println!("{} {} ({} ramps)", ic.id, ic.name, ic.ramps.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Fetching the bundle (Overpass queries, wiki and government tables) is
//! left to the caller; the library only consumes the element sets.

pub use crate::core::{
    run_pipeline, run_pipeline_with_progress, Destination, DirectionType, InputBundle, Interchange,
    PipelineConfig, Ramp, Stage,
};
pub use interchange_common::{Error, Result};

pub mod core;

/// Write interchanges as the pretty-printed JSON catalog
pub fn write_catalog<W: std::io::Write>(writer: W, interchanges: &[Interchange]) -> Result<()> {
    serde_json::to_writer_pretty(writer, interchanges)?;
    Ok(())
}
