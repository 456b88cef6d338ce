//! In-memory lesson records exchanged with the host.
//!
//! The stage reads [`Step`]s and appends [`Annotation`]s to them; loading and
//! saving lessons is the host's job. Field names on the wire follow the lesson
//! files written by the authoring tool (`file_data`, `type`, `objectId`).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub meta: LessonMeta,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Lesson {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One lesson page. Carries at most one asset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub asset: Option<Asset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// An embedded model. Never mutated by the stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    /// MIME tagged, base64 encoded mesh bundle.
    #[serde(rename = "file_data")]
    pub payload: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A point note placed on the model.
///
/// `position` is in world space at the time of creation and is never
/// re-projected onto a later model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub position: [f32; 3],
    #[serde(default)]
    pub text: String,
    #[serde(rename = "objectId", default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_authoring_tool_lesson() {
        let json = r#"{
            "meta": { "title": "Default", "version": "1.0", "created_at": "2025-01-01T00:00:00Z" },
            "steps": [
                {
                    "title": "Page 1",
                    "description": "This is a cube",
                    "asset": { "name": "asset_1_cube", "file_data": "data:model/gltf-binary;base64,AAAA", "type": "glb" }
                },
                { "description": "Nothing to see", "asset": null }
            ]
        }"#;
        let lesson = Lesson::from_json_str(json).unwrap();
        assert_eq!(lesson.steps.len(), 2);
        let asset = lesson.steps[0].asset.as_ref().unwrap();
        assert_eq!(asset.kind, "glb");
        assert!(asset.payload.starts_with("data:model/gltf-binary"));
        assert!(lesson.steps[1].asset.is_none());
        assert!(lesson.steps[1].annotations.is_empty());
    }

    #[test]
    fn annotation_uses_object_id_key() {
        let annotation = Annotation {
            id: "a".into(),
            position: [1.0, 2.0, 3.0],
            text: "New annotation".into(),
            object_id: Some("object-7".into()),
        };
        let json = serde_json::to_value(&annotation).unwrap();
        assert_eq!(json["objectId"], "object-7");
        let back: Annotation = serde_json::from_value(json).unwrap();
        assert_eq!(back, annotation);
    }
}
