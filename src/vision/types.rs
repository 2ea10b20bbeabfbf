// Detection result types
// Mirrors the Watson Visual Recognition v3 detect_faces response shape,
// narrowed to the fields the gateway forwards

use serde::Deserialize;

/// Top-level detection result: one entry per submitted image
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DetectFacesResult {
    #[serde(default)]
    pub images: Vec<DetectedImage>,
}

/// Faces found in a single image
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DetectedImage {
    #[serde(default)]
    pub faces: Vec<Face>,
}

/// A single detected face
///
/// Only the bounding box is kept. The service also reports per-face
/// attributes (confidence, age, gender); discarding them is an intentional
/// narrowing of the response, so deserialization ignores everything else.
/// `face_location` stays raw JSON and is returned to clients verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct Face {
    pub face_location: serde_json::Value,
}

impl DetectFacesResult {
    /// Bounding boxes of the first image's faces, in service order
    ///
    /// The gateway submits exactly one image per call, so only the first
    /// entry matters; a missing or empty `images` array yields no faces.
    pub fn first_image_locations(&self) -> Vec<serde_json::Value> {
        self.images
            .first()
            .map(|image| image.faces.iter().map(|f| f.face_location.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_narrowing_keeps_location_only() {
        let raw = json!({
            "images": [{
                "faces": [{
                    "face_location": {"top": 10, "left": 20, "width": 30, "height": 40},
                    "age": {"min": 20, "max": 30, "score": 0.5},
                    "gender": {"gender": "FEMALE", "score": 0.9}
                }],
                "image": "image.jpg"
            }],
            "images_processed": 1
        });

        let result: DetectFacesResult = serde_json::from_value(raw).unwrap();
        let locations = result.first_image_locations();
        assert_eq!(locations.len(), 1);
        assert_eq!(
            locations[0],
            json!({"top": 10, "left": 20, "width": 30, "height": 40})
        );
    }

    #[test]
    fn test_face_order_preserved() {
        let raw = json!({
            "images": [{
                "faces": [
                    {"face_location": {"left": 1}},
                    {"face_location": {"left": 2}},
                    {"face_location": {"left": 3}}
                ]
            }]
        });

        let result: DetectFacesResult = serde_json::from_value(raw).unwrap();
        let locations = result.first_image_locations();
        assert_eq!(locations.len(), 3);
        assert_eq!(locations[1], json!({"left": 2}));
    }

    #[test]
    fn test_empty_images_yields_no_faces() {
        let result: DetectFacesResult = serde_json::from_value(json!({"images": []})).unwrap();
        assert!(result.first_image_locations().is_empty());
    }

    #[test]
    fn test_missing_images_field() {
        let result: DetectFacesResult = serde_json::from_value(json!({})).unwrap();
        assert!(result.first_image_locations().is_empty());
    }

    #[test]
    fn test_only_first_image_is_read() {
        let raw = json!({
            "images": [
                {"faces": [{"face_location": {"left": 1}}]},
                {"faces": [{"face_location": {"left": 99}}]}
            ]
        });

        let result: DetectFacesResult = serde_json::from_value(raw).unwrap();
        let locations = result.first_image_locations();
        assert_eq!(locations, vec![json!({"left": 1})]);
    }
}
