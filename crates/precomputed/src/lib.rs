//! Mesh-only "precomputed" segmentation datasets.
//!
//! A dataset is a directory that a volumetric viewer can open as a segmentation
//! layer even though it carries no voxel data. Every object is shipped as a
//! single legacy mesh fragment and the top-level manifest declares one synthetic
//! scale large enough to hold all of the meshes.
//!
//! Directory layout (relative to the dataset root):
//!   info               : top-level manifest (one `uint64` segmentation scale)
//!   mesh/info          : {"@type": "neuroglancer_legacy_mesh"}
//!   mesh/<id>:0        : {"fragments": ["<id>.frag"]}
//!   mesh/<id>.frag     : binary fragment (see [`codec`])
//!   seg_props/info     : segment properties, only when labels exist
//!
//! The top-level `info` is always written last. A dataset without it is an
//! incomplete build.

pub mod build;
pub mod codec;
pub mod error;
pub mod extent;
pub mod manifest;
pub mod mesh;
pub mod registry;

pub use build::{BuildConfig, BuildReport, BuildState, DatasetBuilder, MeshEntry, MeshLoader};
pub use codec::{decode, encode, read_fragment};
pub use error::{Error, Result};
pub use extent::{Extent, ExtentCalculator, ExtentMode};
pub use manifest::{
    build_fragment_pointer, build_mesh_info, build_segment_properties, build_top_level,
    FragmentPointer, MeshInfo, Scale, SegmentProperties, TopLevelInfo,
};
pub use mesh::Mesh;
pub use registry::{IdRegistry, SegmentId};
