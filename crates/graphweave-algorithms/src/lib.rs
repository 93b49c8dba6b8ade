//! Clustering and layout algorithms for Graphweave
//!
//! Everything here works on dense integer indices (`0..n`) and plain 3D
//! points. The `graphweave` crate maps its string-keyed nodes onto these
//! views and back.

pub mod common;
pub mod kmeans;
pub mod agglomerative;
pub mod layout;

pub use common::{centroid, distance, distance_squared, is_finite, GraphView, Point3, ORIGIN};
pub use kmeans::{kmeans, KMeansConfig, KMeansResult};
pub use agglomerative::{average_linkage, AgglomerativeConfig};
pub use layout::{circular, concentric_levels, force_directed, ForceLayoutConfig};
