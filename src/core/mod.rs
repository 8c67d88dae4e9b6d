//! Core library modules for interchange-atlas
//!
//! Bottom to top: raw OSM elements, segments, ramps and their DAG, spatial
//! clustering, the naming lifecycle, destination annotation and route
//! ordering, tied together by [`pipeline`].

pub mod annotate;
pub mod clustering;
pub mod config;
pub mod dag;
pub mod external;
pub mod freeway;
pub mod geometry;
pub mod lifecycle;
pub mod linearize;
pub mod model;
pub mod naming;
pub mod osm;
pub mod pipeline;
pub mod ramp_graph;
pub mod relations;
pub mod segments;

// Re-export main types for internal use
pub use config::PipelineConfig;
pub use model::{Destination, DirectionType, Interchange, Ramp};
pub use osm::InputBundle;
pub use pipeline::{run_pipeline, run_pipeline_with_progress, Stage};
