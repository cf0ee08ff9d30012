use std::path::Path;

use image::imageops::FilterType;
use image::{imageops, DynamicImage, GenericImageView, Rgb, RgbImage};
use thiserror::Error;
use tract_onnx::prelude::*;

use super::names::NAMES;

/// Side length of the square input the yolov8 graph was exported with.
pub const INPUT_SIZE: u32 = 640;

/// Gray value ultralytics pads letterboxed borders with.
const PAD_COLOR: u8 = 114;

type YoloPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Model file not found: {0}")]
    ModelMissing(String),
    #[error("Failed to load detection model: {0}")]
    ModelLoad(String),
    #[error("Failed to read image: {0}")]
    ImageRead(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model download failed: {0}")]
    Download(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// One detected object, with its box in original-image pixel coordinates.
#[derive(Debug, Clone)]
pub struct Detection {
    pub label: &'static str,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A detection candidate still in letterbox coordinates, before NMS.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// How an image was fitted into the square model input: uniform scale plus
/// centered padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub new_w: u32,
    pub new_h: u32,
    pub pad_x: u32,
    pub pad_y: u32,
}

pub(crate) fn letterbox_params(orig_w: u32, orig_h: u32, target: u32) -> Letterbox {
    let scale = (target as f32 / orig_w as f32).min(target as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target);
    Letterbox {
        scale,
        new_w,
        new_h,
        pad_x: (target - new_w) / 2,
        pad_y: (target - new_h) / 2,
    }
}

fn letterbox_image(img: &DynamicImage, lb: &Letterbox) -> RgbImage {
    let resized = img
        .resize_exact(lb.new_w, lb.new_h, FilterType::Triangle)
        .to_rgb8();
    let mut canvas = RgbImage::from_pixel(INPUT_SIZE, INPUT_SIZE, Rgb([PAD_COLOR; 3]));
    imageops::overlay(&mut canvas, &resized, lb.pad_x as i64, lb.pad_y as i64);
    canvas
}

/// Decodes the raw `1x84x8400` yolov8 output head: four box values
/// (center x, center y, width, height) followed by one score per class, for
/// each anchor column. Anchors below the confidence threshold are dropped.
pub(crate) fn decode_output(
    view: &tract_ndarray::ArrayViewD<'_, f32>,
    confidence_threshold: f32,
) -> Result<Vec<Candidate>, DetectorError> {
    let shape = view.shape();
    if shape.len() != 3 || shape[1] != 4 + NAMES.len() {
        return Err(DetectorError::Inference(format!(
            "unexpected output shape {:?}, want [1, {}, N]",
            shape,
            4 + NAMES.len()
        )));
    }

    let anchors = shape[2];
    let mut candidates = Vec::new();
    for i in 0..anchors {
        let mut class_id = 0usize;
        let mut confidence = 0.0f32;
        for c in 0..NAMES.len() {
            let score = view[[0, 4 + c, i]];
            if score > confidence {
                confidence = score;
                class_id = c;
            }
        }
        if confidence < confidence_threshold {
            continue;
        }

        let cx = view[[0, 0, i]];
        let cy = view[[0, 1, i]];
        let w = view[[0, 2, i]];
        let h = view[[0, 3, i]];
        candidates.push(Candidate {
            class_id,
            confidence,
            bbox: BoundingBox {
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
            },
        });
    }
    Ok(candidates)
}

pub(crate) fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);
    let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Class-wise greedy non-maximum suppression. Candidates come back sorted by
/// descending confidence.
pub(crate) fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Maps a kept candidate from letterbox coordinates back onto the original
/// image and attaches its class name.
fn to_detection(candidate: Candidate, lb: &Letterbox, orig_w: u32, orig_h: u32) -> Detection {
    let unmap_x = |x: f32| ((x - lb.pad_x as f32) / lb.scale).clamp(0.0, orig_w as f32);
    let unmap_y = |y: f32| ((y - lb.pad_y as f32) / lb.scale).clamp(0.0, orig_h as f32);
    Detection {
        label: NAMES[candidate.class_id],
        confidence: candidate.confidence,
        bbox: BoundingBox {
            x1: unmap_x(candidate.bbox.x1),
            y1: unmap_y(candidate.bbox.y1),
            x2: unmap_x(candidate.bbox.x2),
            y2: unmap_y(candidate.bbox.y2),
        },
    }
}

pub struct YoloModel {
    plan: YoloPlan,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl YoloModel {
    /// Loads and optimizes the ONNX graph. Called once at startup; the loaded
    /// model is shared behind an `Arc` for the lifetime of the process.
    pub fn load(
        path: &Path,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> Result<Self, DetectorError> {
        if !path.exists() {
            return Err(DetectorError::ModelMissing(path.display().to_string()));
        }

        let side = INPUT_SIZE as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?
            .into_optimized()
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?
            .into_runnable()
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?;

        Ok(Self {
            plan,
            confidence_threshold,
            iou_threshold,
        })
    }

    pub fn detect_file(&self, path: &Path) -> Result<Vec<Detection>, DetectorError> {
        let img = image::open(path).map_err(|e| DetectorError::ImageRead(e.to_string()))?;
        self.detect_image(&img)
    }

    pub fn detect_image(&self, img: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        let (orig_w, orig_h) = img.dimensions();
        let lb = letterbox_params(orig_w, orig_h, INPUT_SIZE);
        let canvas = letterbox_image(img, &lb);

        let side = INPUT_SIZE as usize;
        let input: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
                canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
            })
            .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| DetectorError::Inference(e.to_string()))?;
        let view = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let candidates = decode_output(&view, self.confidence_threshold)?;
        let kept = non_max_suppression(candidates, self.iou_threshold);
        Ok(kept
            .into_iter()
            .map(|c| to_detection(c, &lb, orig_w, orig_h))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox { x1, y1, x2, y2 }
    }

    fn candidate(class_id: usize, confidence: f32, b: BoundingBox) -> Candidate {
        Candidate {
            class_id,
            confidence,
            bbox: b,
        }
    }

    #[test]
    fn letterbox_wide_image_pads_vertically() {
        let lb = letterbox_params(1280, 720, 640);
        assert!((lb.scale - 0.5).abs() < f32::EPSILON);
        assert_eq!((lb.new_w, lb.new_h), (640, 360));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 140));
    }

    #[test]
    fn letterbox_tall_image_pads_horizontally() {
        let lb = letterbox_params(480, 640, 640);
        assert_eq!((lb.new_w, lb.new_h), (480, 640));
        assert_eq!((lb.pad_x, lb.pad_y), (80, 0));
    }

    #[test]
    fn letterbox_square_image_fills_the_input() {
        let lb = letterbox_params(640, 640, 640);
        assert!((lb.scale - 1.0).abs() < f32::EPSILON);
        assert_eq!((lb.pad_x, lb.pad_y), (0, 0));
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = bbox(10.0, 10.0, 50.0, 50.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 30.0, 30.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn iou_of_half_overlapping_boxes() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 15.0, 10.0);
        // intersection 50, union 150
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn nms_keeps_highest_confidence_of_overlapping_same_class() {
        let candidates = vec![
            candidate(46, 0.6, bbox(0.0, 0.0, 100.0, 100.0)),
            candidate(46, 0.9, bbox(5.0, 5.0, 105.0, 105.0)),
            candidate(46, 0.5, bbox(2.0, 2.0, 98.0, 98.0)),
        ];
        let kept = non_max_suppression(candidates, 0.45);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn nms_does_not_suppress_across_classes() {
        let candidates = vec![
            candidate(46, 0.9, bbox(0.0, 0.0, 100.0, 100.0)),
            candidate(47, 0.8, bbox(0.0, 0.0, 100.0, 100.0)),
        ];
        let kept = non_max_suppression(candidates, 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn nms_keeps_distant_boxes_of_the_same_class() {
        let candidates = vec![
            candidate(46, 0.9, bbox(0.0, 0.0, 50.0, 50.0)),
            candidate(46, 0.8, bbox(300.0, 300.0, 350.0, 350.0)),
        ];
        let kept = non_max_suppression(candidates, 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn decode_reads_boxes_and_picks_best_class() {
        let mut output = tract_ndarray::ArrayD::<f32>::zeros(tract_ndarray::IxDyn(&[
            1,
            4 + NAMES.len(),
            2,
        ]));
        // anchor 0: a confident banana (class 46) centered at (320, 320)
        output[[0, 0, 0]] = 320.0;
        output[[0, 1, 0]] = 320.0;
        output[[0, 2, 0]] = 100.0;
        output[[0, 3, 0]] = 50.0;
        output[[0, 4 + 46, 0]] = 0.95;
        output[[0, 4 + 47, 0]] = 0.10;
        // anchor 1: nothing above threshold
        output[[0, 4 + 51, 1]] = 0.05;

        let candidates = decode_output(&output.view(), 0.25).unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.class_id, 46);
        assert!((c.confidence - 0.95).abs() < f32::EPSILON);
        assert_eq!(c.bbox, bbox(270.0, 295.0, 370.0, 345.0));
    }

    #[test]
    fn decode_rejects_unexpected_shapes() {
        let output = tract_ndarray::ArrayD::<f32>::zeros(tract_ndarray::IxDyn(&[1, 10, 2]));
        let err = decode_output(&output.view(), 0.25).unwrap_err();
        assert!(matches!(err, DetectorError::Inference(_)));
    }

    #[test]
    fn detections_are_mapped_back_through_the_letterbox() {
        // 1280x720 source: scale 0.5, 140px vertical padding.
        let lb = letterbox_params(1280, 720, 640);
        let c = candidate(46, 0.9, bbox(0.0, 140.0, 640.0, 500.0));
        let d = to_detection(c, &lb, 1280, 720);
        assert_eq!(d.label, "banana");
        assert_eq!(d.bbox, bbox(0.0, 0.0, 1280.0, 720.0));
    }

    #[test]
    fn mapped_boxes_are_clamped_to_the_image() {
        let lb = letterbox_params(1280, 720, 640);
        let c = candidate(46, 0.9, bbox(-20.0, 100.0, 700.0, 600.0));
        let d = to_detection(c, &lb, 1280, 720);
        assert!(d.bbox.x1 >= 0.0);
        assert!(d.bbox.x2 <= 1280.0);
        assert!(d.bbox.y1 >= 0.0);
        assert!(d.bbox.y2 <= 720.0);
    }
}
