use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MeshError;
use crate::LANDMARK_COUNT;

/// Named landmark groups reported by the detector, in detector order.
pub const MESH_ANNOTATIONS: &[(&str, &[u32])] = &[
    (
        "silhouette",
        &[
            10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400,
            377, 152, 148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67,
            109,
        ],
    ),
    ("lipsUpperOuter", &[61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291]),
    ("lipsLowerOuter", &[146, 91, 181, 84, 17, 314, 405, 321, 375, 291]),
    ("lipsUpperInner", &[78, 191, 80, 81, 82, 13, 312, 311, 310, 415, 308]),
    ("lipsLowerInner", &[78, 95, 88, 178, 87, 14, 317, 402, 318, 324, 308]),
    ("rightEyeUpper0", &[246, 161, 160, 159, 158, 157, 173]),
    ("rightEyeLower0", &[33, 7, 163, 144, 145, 153, 154, 155, 133]),
    ("rightEyeUpper1", &[247, 30, 29, 27, 28, 56, 190]),
    ("rightEyeLower1", &[130, 25, 110, 24, 23, 22, 26, 112, 243]),
    ("rightEyeUpper2", &[113, 225, 224, 223, 222, 221, 189]),
    ("rightEyeLower2", &[226, 31, 228, 229, 230, 231, 232, 233, 244]),
    ("rightEyeLower3", &[143, 111, 117, 118, 119, 120, 121, 128, 245]),
    ("rightEyebrowUpper", &[156, 70, 63, 105, 66, 107, 55, 193]),
    ("rightEyebrowLower", &[35, 124, 46, 53, 52, 65]),
    ("leftEyeUpper0", &[466, 388, 387, 386, 385, 384, 398]),
    ("leftEyeLower0", &[263, 249, 390, 373, 374, 380, 381, 382, 362]),
    ("leftEyeUpper1", &[467, 260, 259, 257, 258, 286, 414]),
    ("leftEyeLower1", &[359, 255, 339, 254, 253, 252, 256, 341, 463]),
    ("leftEyeUpper2", &[342, 445, 444, 443, 442, 441, 413]),
    ("leftEyeLower2", &[446, 261, 448, 449, 450, 451, 452, 453, 464]),
    ("leftEyeLower3", &[372, 340, 346, 347, 348, 349, 350, 357, 465]),
    ("leftEyebrowUpper", &[383, 300, 293, 334, 296, 336, 285, 417]),
    ("leftEyebrowLower", &[265, 353, 276, 283, 282, 295]),
    ("midwayBetweenEyes", &[168]),
    ("noseTip", &[1]),
    ("noseBottom", &[2]),
    ("noseRightCorner", &[98]),
    ("noseLeftCorner", &[327]),
    ("rightCheek", &[205]),
    ("leftCheek", &[425]),
];

/// Group name to ordered landmark indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationGroups {
    groups: BTreeMap<String, Vec<u32>>,
}

impl AnnotationGroups {
    pub fn canonical() -> Self {
        MESH_ANNOTATIONS
            .iter()
            .map(|(name, indices)| (name.to_string(), indices.to_vec()))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, indices: Vec<u32>) {
        self.groups.insert(name.into(), indices);
    }

    pub fn get(&self, name: &str) -> Option<&[u32]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u32])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        for (name, indices) in self.iter() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= LANDMARK_COUNT) {
                return Err(MeshError::IndexOutOfRange {
                    table: format!("annotation group {}", name),
                    index,
                    bound: LANDMARK_COUNT,
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Vec<u32>)> for AnnotationGroups {
    fn from_iter<T: IntoIterator<Item = (String, Vec<u32>)>>(iter: T) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_groups_validate() {
        let groups = AnnotationGroups::canonical();
        assert_eq!(groups.len(), MESH_ANNOTATIONS.len());
        assert!(groups.validate().is_ok());
    }

    #[test]
    fn test_iris_indices_are_rejected() {
        let mut groups = AnnotationGroups::canonical();
        groups.insert("rightEyeIris", vec![473, 474, 475, 476, 477]);
        let err = groups.validate().unwrap_err();
        assert_eq!(
            err,
            MeshError::IndexOutOfRange {
                table: "annotation group rightEyeIris".to_string(),
                index: 473,
                bound: LANDMARK_COUNT,
            }
        );
    }

    #[test]
    fn test_groups_deserialize_from_json_map() {
        let groups: AnnotationGroups =
            serde_json::from_str(r#"{"noseTip": [1], "lipsUpperOuter": [61, 185]}"#).unwrap();
        assert_eq!(groups.get("noseTip"), Some(&[1][..]));
        assert_eq!(groups.get("lipsUpperOuter"), Some(&[61, 185][..]));
        assert_eq!(groups.get("missing"), None);
    }
}
