//! JSON documents of a precomputed dataset.
//!
//! Builders here only assemble values; the orchestrator serializes and writes them.

use serde::{Deserialize, Serialize};

use crate::extent::Extent;
use crate::registry::SegmentId;

/// Key of the single synthetic scale. No chunk data ever exists under it.
pub const SCALE_KEY: &str = "fake";
pub const CHUNK_SIZE_HINT: [u64; 3] = [256, 256, 16];
pub const MESH_DIR: &str = "mesh";
pub const SEGMENT_PROPERTIES_DIR: &str = "seg_props";
pub const INFO_FILE: &str = "info";

pub const LEGACY_MESH_TYPE: &str = "neuroglancer_legacy_mesh";
pub const SEGMENT_PROPERTIES_TYPE: &str = "neuroglancer_segment_properties";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopLevelInfo {
    pub data_type: String,
    pub scales: Vec<Scale>,
    pub mesh: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_properties: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub num_channels: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub key: String,
    pub encoding: String,
    pub voxel_offset: [i64; 3],
    pub resolution: [f64; 3],
    pub size: [u64; 3],
    pub chunk_sizes: Vec<[u64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshInfo {
    #[serde(rename = "@type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentPointer {
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentProperties {
    #[serde(rename = "@type")]
    pub kind: String,
    pub inline: InlineProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineProperties {
    /// Decimal strings; the format does not accept numeric ids here.
    pub ids: Vec<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub values: Vec<String>,
}

/// `<id>.frag`
pub fn fragment_file_name(id: SegmentId) -> String {
    format!("{id}.frag")
}

/// `<id>:0`, the manifest the viewer requests for a segment's mesh.
pub fn pointer_file_name(id: SegmentId) -> String {
    format!("{id}:0")
}

pub fn build_top_level(extent: &Extent, has_labels: bool) -> TopLevelInfo {
    TopLevelInfo {
        data_type: "uint64".to_string(),
        scales: vec![Scale {
            key: SCALE_KEY.to_string(),
            encoding: "raw".to_string(),
            voxel_offset: [0, 0, 0],
            resolution: extent.resolution,
            size: extent.volume_size,
            chunk_sizes: vec![CHUNK_SIZE_HINT],
        }],
        mesh: MESH_DIR.to_string(),
        segment_properties: has_labels.then(|| SEGMENT_PROPERTIES_DIR.to_string()),
        kind: "segmentation".to_string(),
        num_channels: 1,
    }
}

pub fn build_mesh_info() -> MeshInfo {
    MeshInfo {
        kind: LEGACY_MESH_TYPE.to_string(),
    }
}

pub fn build_fragment_pointer(id: SegmentId) -> FragmentPointer {
    FragmentPointer {
        fragments: vec![fragment_file_name(id)],
    }
}

/// One inline `label` property named `source`, parallel to the id list.
pub fn build_segment_properties(entries: &[(SegmentId, String)]) -> SegmentProperties {
    let (ids, values): (Vec<String>, Vec<String>) = entries
        .iter()
        .map(|(id, label)| (id.to_string(), label.clone()))
        .unzip();

    SegmentProperties {
        kind: SEGMENT_PROPERTIES_TYPE.to_string(),
        inline: InlineProperties {
            ids,
            properties: vec![Property {
                id: "source".to_string(),
                kind: "label".to_string(),
                values,
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extent() -> Extent {
        Extent {
            resolution: [3.0, 5.0, 8.0],
            volume_size: [1, 1, 1],
        }
    }

    #[test]
    fn top_level_json_shape() {
        let value = serde_json::to_value(build_top_level(&extent(), true)).unwrap();
        assert_eq!(
            value,
            json!({
                "data_type": "uint64",
                "scales": [{
                    "key": "fake",
                    "encoding": "raw",
                    "voxel_offset": [0, 0, 0],
                    "resolution": [3.0, 5.0, 8.0],
                    "size": [1, 1, 1],
                    "chunk_sizes": [[256, 256, 16]]
                }],
                "mesh": "mesh",
                "segment_properties": "seg_props",
                "type": "segmentation",
                "num_channels": 1
            })
        );
    }

    #[test]
    fn top_level_without_labels_omits_segment_properties() {
        let value = serde_json::to_value(build_top_level(&extent(), false)).unwrap();
        assert!(value.get("segment_properties").is_none());
    }

    #[test]
    fn top_level_is_deterministic() {
        let a = serde_json::to_string(&build_top_level(&extent(), true)).unwrap();
        let b = serde_json::to_string(&build_top_level(&extent(), true)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mesh_info_is_legacy() {
        assert_eq!(
            serde_json::to_value(build_mesh_info()).unwrap(),
            json!({"@type": "neuroglancer_legacy_mesh"})
        );
    }

    #[test]
    fn fragment_pointer_names_one_fragment() {
        assert_eq!(
            serde_json::to_value(build_fragment_pointer(17)).unwrap(),
            json!({"fragments": ["17.frag"]})
        );
        assert_eq!(pointer_file_name(17), "17:0");
    }

    #[test]
    fn segment_properties_use_string_ids() {
        let props = build_segment_properties(&[(1, "cube.obj".into()), (20, "sphere".into())]);
        assert_eq!(
            serde_json::to_value(&props).unwrap(),
            json!({
                "@type": "neuroglancer_segment_properties",
                "inline": {
                    "ids": ["1", "20"],
                    "properties": [{
                        "id": "source",
                        "type": "label",
                        "values": ["cube.obj", "sphere"]
                    }]
                }
            })
        );
    }

    #[test]
    fn empty_segment_properties_are_parallel() {
        let props = build_segment_properties(&[]);
        assert!(props.inline.ids.is_empty());
        assert!(props.inline.properties[0].values.is_empty());
    }
}
