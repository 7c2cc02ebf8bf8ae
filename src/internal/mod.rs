//! Internal numerical routines.
//!
//! - kmeans: Lloyd's k-means with k-means++ seeding

pub mod kmeans;
