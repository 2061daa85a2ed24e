//! # photoatlas
//!
//! A command-line tool that publishes geotagged photo collections to
//! Cloudinary and builds the JSON manifest behind a static map gallery.
//!
//! Each named collection maps 1:1 to a local directory of JPEGs and a
//! remote tag. The tool extracts GPS and capture-time metadata from each
//! photo's EXIF block, uploads the file with that metadata attached,
//! ranks every collection chronologically, and writes the ordered
//! `photo-data.json` the front end renders.
//!
//! ## Features
//!
//! - EXIF extraction of position, altitude, and capture time
//! - Metadata-carrying uploads, tagged per collection
//! - Stable chronological ranking with deterministic tie-breaks
//! - Wholesale manifest rebuilds, committed collection by collection
//! - A bandwidth-capping resize pass over already-uploaded assets
//! - CSV and HTML gallery exports from local directories

// Export modules for integration testing
pub mod cloudinary;
pub mod config;
pub mod exif;
pub mod ingest;
pub mod manifest;
pub mod mock;
pub mod rank;
pub mod report;
pub mod resize;
