mod download;
mod model;
mod names;

pub use download::ensure_model;
pub use model::{BoundingBox, Detection, DetectorError, YoloModel, INPUT_SIZE};
pub use names::NAMES;

use serde::Serialize;

/// A distinct detected label with its occurrence count, e.g. two apples in
/// one photo become `{"name": "apple", "count": 2}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngredientCount {
    pub name: String,
    pub count: usize,
}

/// Collapses raw detections into per-label counts, keeping labels in the
/// order they were first detected.
pub fn count_ingredients(detections: &[Detection]) -> Vec<IngredientCount> {
    let mut counts: Vec<IngredientCount> = Vec::new();
    for detection in detections {
        match counts.iter_mut().find(|c| c.name == detection.label) {
            Some(entry) => entry.count += 1,
            None => counts.push(IngredientCount {
                name: detection.label.to_string(),
                count: 1,
            }),
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: &'static str) -> Detection {
        Detection {
            label,
            confidence: 0.9,
            bbox: BoundingBox {
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 10.0,
            },
        }
    }

    #[test]
    fn counts_repeated_labels() {
        let detections = vec![
            detection("apple"),
            detection("banana"),
            detection("apple"),
            detection("apple"),
        ];
        let counts = count_ingredients(&detections);
        assert_eq!(
            counts,
            vec![
                IngredientCount {
                    name: "apple".to_string(),
                    count: 3
                },
                IngredientCount {
                    name: "banana".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn preserves_first_seen_order() {
        let detections = vec![
            detection("carrot"),
            detection("apple"),
            detection("carrot"),
        ];
        let counts = count_ingredients(&detections);
        let names: Vec<&str> = counts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["carrot", "apple"]);
    }

    #[test]
    fn no_detections_means_no_ingredients() {
        assert!(count_ingredients(&[]).is_empty());
    }

    #[test]
    fn serializes_to_name_and_count() {
        let counts = count_ingredients(&[detection("pizza")]);
        let value = serde_json::to_value(&counts).unwrap();
        assert_eq!(value[0]["name"], "pizza");
        assert_eq!(value[0]["count"], 1);
    }
}
