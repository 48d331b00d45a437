use std::collections::HashMap;
use std::path::Path;

use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use ndarray::{Array4, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info, warn};

use crate::detector::{
    BoundingBox, DetectError, Detector, ImageResult, PredictRequest, RawDetection,
};

const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.45;
const BOX_COLOR: Rgb<u8> = Rgb([220, 40, 40]);

/// ONNX YOLO detector. Expects the usual single `[1, 4+nc, anchors]` output
/// head with xywh box coordinates in input-tensor pixels.
pub struct YoloDetector {
    session: Session,
    names: HashMap<usize, String>,
}

impl YoloDetector {
    pub fn new(model_path: &Path, labels_path: &Path) -> Result<Self, DetectError> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)?;
        info!(?model_path, "loaded YOLO ONNX model");

        let names = load_labels(labels_path);
        Ok(Self { session, names })
    }

    fn run_session(
        &self,
        input: Array4<f32>,
    ) -> Result<Vec<(usize, f32, BoundingBox)>, DetectError> {
        let value = Value::from_array(input)?;
        let outputs = self.session.run(ort::inputs![value]?)?;
        let output = outputs
            .iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| DetectError::Output("model produced no outputs".to_string()))?;

        let view = output.try_extract_tensor::<f32>()?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(DetectError::Output(format!(
                "expected [1, 4+nc, anchors], got {shape:?}"
            )));
        }
        let features = shape[1];
        let anchors = shape[2];
        let grid = view.index_axis(Axis(0), 0);

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let mut class_id = 0usize;
            let mut score = 0.0f32;
            for c in 4..features {
                let s = grid[[c, a]];
                if s > score {
                    score = s;
                    class_id = c - 4;
                }
            }
            if !score.is_finite() {
                continue;
            }
            let cx = grid[[0, a]];
            let cy = grid[[1, a]];
            let w = grid[[2, a]];
            let h = grid[[3, a]];
            candidates.push((
                class_id,
                score,
                BoundingBox {
                    x1: cx - w / 2.0,
                    y1: cy - h / 2.0,
                    x2: cx + w / 2.0,
                    y2: cy + h / 2.0,
                },
            ));
        }
        Ok(candidates)
    }
}

impl Detector for YoloDetector {
    fn predict(&self, request: &PredictRequest) -> Result<Vec<ImageResult>, DetectError> {
        let original = image::open(&request.source)?.to_rgb8();
        let (orig_w, orig_h) = original.dimensions();

        let resized =
            image::imageops::resize(&original, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let input = Array4::from_shape_fn(
            (1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
            |(_, c, y, x)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
        );

        let candidates = self.run_session(input)?;

        let sx = orig_w as f32 / INPUT_SIZE as f32;
        let sy = orig_h as f32 / INPUT_SIZE as f32;
        let detections: Vec<RawDetection> = candidates
            .into_iter()
            .filter(|(_, score, _)| *score >= request.conf)
            .map(|(class_id, confidence, b)| RawDetection {
                class_id,
                confidence,
                bbox: BoundingBox {
                    x1: (b.x1 * sx).clamp(0.0, orig_w as f32),
                    y1: (b.y1 * sy).clamp(0.0, orig_h as f32),
                    x2: (b.x2 * sx).clamp(0.0, orig_w as f32),
                    y2: (b.y2 * sy).clamp(0.0, orig_h as f32),
                },
            })
            .collect();
        let boxes = non_max_suppression(detections, IOU_THRESHOLD);
        debug!(kept = boxes.len(), "postprocessed detections");

        if request.save {
            save_annotated(&original, &boxes, request)?;
        }

        Ok(vec![ImageResult { boxes }])
    }

    fn names(&self) -> &HashMap<usize, String> {
        &self.names
    }
}

/// One class name per line, line number = class id. A missing file is not
/// fatal; ids then render through the `Class <id>` fallback.
fn load_labels(path: &Path) -> HashMap<usize, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(?path, %err, "no labels file, falling back to numeric class names");
            return HashMap::new();
        }
    };
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(id, name)| (id, name.to_string()))
        .collect()
}

/// Greedy IoU suppression, highest confidence first.
fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if kept
            .iter()
            .all(|k| iou(&k.bbox, &candidate.bbox) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = ix * iy;
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Draws the kept boxes on a copy of the source image and writes it to
/// `<project>/<name>/<source filename>`.
fn save_annotated(
    original: &RgbImage,
    boxes: &[RawDetection],
    request: &PredictRequest,
) -> Result<(), DetectError> {
    let mut annotated = original.clone();
    for detection in boxes {
        let b = &detection.bbox;
        let w = (b.x2 - b.x1).max(1.0) as u32;
        let h = (b.y2 - b.y1).max(1.0) as u32;
        // three nested rects for a visible stroke
        for t in 0..3i32 {
            if w <= 2 * t as u32 || h <= 2 * t as u32 {
                break;
            }
            let rect = Rect::at(b.x1 as i32 + t, b.y1 as i32 + t)
                .of_size(w - 2 * t as u32, h - 2 * t as u32);
            draw_hollow_rect_mut(&mut annotated, rect, BOX_COLOR);
        }
    }

    let dir = request.project.join(&request.name);
    std::fs::create_dir_all(&dir)?;
    let filename = request
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "annotated.jpg".to_string());
    let out = dir.join(filename);
    annotated.save(&out)?;
    debug!(?out, "saved annotated image");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn det(class_id: usize, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox { x1, y1, x2, y2 },
        }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
        };
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
        };
        let b = BoundingBox {
            x1: 20.0,
            y1: 20.0,
            x2: 30.0,
            y2: 30.0,
        };
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn nms_suppresses_overlapping_lower_confidence() {
        let detections = vec![
            det(0, 0.9, 0.0, 0.0, 10.0, 10.0),
            det(0, 0.8, 1.0, 1.0, 11.0, 11.0),
            det(1, 0.7, 50.0, 50.0, 60.0, 60.0),
        ];
        let kept = non_max_suppression(detections, 0.45);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(kept[1].class_id, 1);
    }

    #[test]
    fn nms_keeps_everything_when_disjoint() {
        let detections = vec![
            det(0, 0.5, 0.0, 0.0, 5.0, 5.0),
            det(0, 0.6, 100.0, 100.0, 105.0, 105.0),
        ];
        assert_eq!(non_max_suppression(detections, 0.45).len(), 2);
    }

    #[test]
    fn labels_load_by_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "milco").unwrap();
        writeln!(file, "nombo").unwrap();
        let names = load_labels(file.path());
        assert_eq!(names.get(&0).map(String::as_str), Some("milco"));
        assert_eq!(names.get(&1).map(String::as_str), Some("nombo"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn missing_labels_file_is_empty_map() {
        assert!(load_labels(Path::new("/nonexistent/labels.txt")).is_empty());
    }
}
