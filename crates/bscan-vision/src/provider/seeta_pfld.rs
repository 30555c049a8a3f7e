//! Bundled landmark provider: SeetaFace detection + ONNX landmark regression.
//!
//! Face localization uses the `rustface` crate (pure-Rust SeetaFace frontal
//! detector) directly on the grayscale buffer. Landmarks come from a
//! PFLD-style ONNX regression network run through ONNX Runtime: input is a
//! square face crop resized to 112x112, three replicated gray channels,
//! CHW, normalized to [0,1]; output `output` is 136 floats of (x, y) pairs
//! normalized to the crop square.
//!
//! # Model files
//!
//! Neither model ships in the repository. Place them under `./models/` or
//! `/app/models/`:
//! - `seeta_fd_frontal_v1.0.bin` (SeetaFace frontal detection)
//! - `pfld_68_landmarks.onnx` (68-point landmark regression)

use std::path::Path;
use std::sync::OnceLock;

use bscan_models::{BoundingBox, LandmarkSet, Point};
use image::imageops::{self, FilterType};
use image::GrayImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info, warn};

use crate::error::{VisionError, VisionResult};
use crate::provider::LandmarkProvider;

/// Global provider availability flag
static MODELS_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// SeetaFace detection model paths in preference order
const FACE_MODEL_PATHS: &[&str] = &[
    "./models/seeta_fd_frontal_v1.0.bin",
    "/app/models/seeta_fd_frontal_v1.0.bin",
    "/usr/share/blinkscan/seeta_fd_frontal_v1.0.bin",
];

/// Landmark regression model paths in preference order
const LANDMARK_MODEL_PATHS: &[&str] = &[
    "./models/pfld_68_landmarks.onnx",
    "/app/models/pfld_68_landmarks.onnx",
    "/usr/share/blinkscan/pfld_68_landmarks.onnx",
];

/// Network input edge for the landmark crop
const LANDMARK_INPUT_SIZE: u32 = 112;

/// Padding added around the detection box before cropping
const CROP_PAD_RATIO: f64 = 0.25;

/// Check whether both model files are present, logging the outcome once.
pub fn is_available() -> bool {
    *MODELS_AVAILABLE.get_or_init(|| {
        match (find_model(FACE_MODEL_PATHS), find_model(LANDMARK_MODEL_PATHS)) {
            (Some(face), Some(landmark)) => {
                info!(face, landmark, "SeetaFace + landmark models found");
                true
            }
            (face, landmark) => {
                warn!(
                    face_found = face.is_some(),
                    landmark_found = landmark.is_some(),
                    "Landmark provider models missing; inject a provider or \
                     place models under ./models/"
                );
                false
            }
        }
    })
}

fn find_model(candidates: &[&'static str]) -> Option<&'static str> {
    candidates.iter().find(|p| Path::new(p).exists()).copied()
}

/// Face + landmark provider backed by SeetaFace and ONNX Runtime.
pub struct SeetaPfldProvider {
    /// SeetaFace model; a detector is instantiated per call since detection
    /// state is not reusable across differently-sized inputs
    face_model: rustface::Model,
    session: Session,
}

impl SeetaPfldProvider {
    /// Load both models from explicit paths.
    pub fn new(face_model: &Path, landmark_model: &Path) -> VisionResult<Self> {
        let face_bytes = std::fs::read(face_model)
            .map_err(|_| VisionError::model_not_found(face_model.display().to_string()))?;
        let face_model = rustface::read_model(std::io::Cursor::new(face_bytes))
            .map_err(|e| VisionError::detection_failed(format!("SeetaFace model: {e}")))?;

        let landmark_meta = std::fs::metadata(landmark_model)
            .map_err(|_| VisionError::model_not_found(landmark_model.display().to_string()))?;
        if landmark_meta.len() < 50_000 {
            return Err(VisionError::detection_failed(format!(
                "Landmark model file appears corrupted (size: {} bytes)",
                landmark_meta.len()
            )));
        }

        let model_bytes = std::fs::read(landmark_model)
            .map_err(|e| VisionError::detection_failed(format!("ORT read model file: {e}")))?;

        let session = Session::builder()
            .map_err(|e| VisionError::detection_failed(format!("ORT session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VisionError::detection_failed(format!("ORT opt level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| VisionError::detection_failed(format!("ORT load model: {e}")))?;

        Ok(Self {
            face_model,
            session,
        })
    }

    /// Load both models from the default search paths.
    pub fn from_default_paths() -> VisionResult<Self> {
        let face = find_model(FACE_MODEL_PATHS)
            .ok_or_else(|| VisionError::model_not_found("seeta_fd_frontal_v1.0.bin"))?;
        let landmark = find_model(LANDMARK_MODEL_PATHS)
            .ok_or_else(|| VisionError::model_not_found("pfld_68_landmarks.onnx"))?;
        Self::new(Path::new(face), Path::new(landmark))
    }

    fn run_landmark_net(&mut self, crop: &GrayImage, rect: &CropRect) -> VisionResult<LandmarkSet> {
        let tensor = gray_to_chw_tensor(crop)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| VisionError::detection_failed(format!("ORT run failed: {e}")))?;

        let output = outputs
            .get("output")
            .ok_or_else(|| VisionError::detection_failed("ORT returned no `output` tensor"))?;

        extract_landmarks(output, rect)
    }
}

impl LandmarkProvider for SeetaPfldProvider {
    fn detect_faces(&mut self, frame: &GrayImage) -> Vec<BoundingBox> {
        let (width, height) = frame.dimensions();

        let mut detector = rustface::create_detector_with_model(self.face_model.clone());
        detector.set_min_face_size(20);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let mut faces = detector.detect(&rustface::ImageData::new(frame.as_raw(), width, height));

        // Most confident first; the pipeline analyzes only the leading face.
        faces.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(count = faces.len(), width, height, "SeetaFace detections");

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox::new(
                    bbox.x() as f64,
                    bbox.y() as f64,
                    bbox.width() as f64,
                    bbox.height() as f64,
                )
            })
            .collect()
    }

    fn landmarks(&mut self, frame: &GrayImage, face: &BoundingBox) -> Option<LandmarkSet> {
        let rect = square_crop(frame, face, CROP_PAD_RATIO)?;

        let crop = imageops::crop_imm(frame, rect.x, rect.y, rect.size, rect.size).to_image();
        let crop = imageops::resize(
            &crop,
            LANDMARK_INPUT_SIZE,
            LANDMARK_INPUT_SIZE,
            FilterType::Triangle,
        );

        match self.run_landmark_net(&crop, &rect) {
            Ok(landmarks) => Some(landmarks),
            Err(e) => {
                warn!(error = %e, "Landmark regression failed for face region");
                None
            }
        }
    }
}

/// Square pixel region used for the landmark crop.
struct CropRect {
    x: u32,
    y: u32,
    size: u32,
}

/// Expand the face box, square it, and clamp to the frame.
///
/// Returns `None` when the clamped region is too small to measure.
fn square_crop(frame: &GrayImage, face: &BoundingBox, pad_ratio: f64) -> Option<CropRect> {
    let size = face.width.max(face.height) * (1.0 + pad_ratio);

    let mut x = face.cx() - size / 2.0;
    let mut y = face.cy() - size / 2.0;
    let mut s = size;

    let frame_w = frame.width() as f64;
    let frame_h = frame.height() as f64;

    if x < 0.0 {
        s += x;
        x = 0.0;
    }
    if y < 0.0 {
        s += y;
        y = 0.0;
    }
    if x + s > frame_w {
        s = frame_w - x;
    }
    if y + s > frame_h {
        s = frame_h - y;
    }

    if s < 8.0 {
        return None;
    }

    Some(CropRect {
        x: x.round() as u32,
        y: y.round() as u32,
        size: s.round() as u32,
    })
}

/// Convert a grayscale crop to a (1,3,H,W) tensor normalized to [0,1],
/// replicating the single channel.
fn gray_to_chw_tensor(crop: &GrayImage) -> VisionResult<Value> {
    let (w, h) = crop.dimensions();
    let plane: Vec<f32> = crop.as_raw().iter().map(|&v| v as f32 / 255.0).collect();

    let mut chw = Vec::with_capacity(plane.len() * 3);
    for _ in 0..3 {
        chw.extend_from_slice(&plane);
    }

    let shape = vec![1usize, 3, h as usize, w as usize];
    let boxed = chw.into_boxed_slice();
    Tensor::from_array((shape, boxed))
        .map(Value::from)
        .map_err(|e| VisionError::detection_failed(format!("ORT tensor: {e}")))
}

/// Map the 136-float network output back to frame coordinates.
fn extract_landmarks(output: &Value, rect: &CropRect) -> VisionResult<LandmarkSet> {
    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| VisionError::detection_failed(format!("ORT extract: {e}")))?;

    // Accept [1,136] or [136]
    let count = match shape.len() {
        2 if shape[0] == 1 => shape[1] as usize,
        1 => shape[0] as usize,
        _ => {
            return Err(VisionError::detection_failed(format!(
                "Unexpected landmark output shape: {:?}",
                shape
            )))
        }
    };

    if count < 136 || data.len() < 136 {
        return Err(VisionError::detection_failed(format!(
            "Landmark output too short: {count} values"
        )));
    }

    let scale = rect.size as f64;
    let points: Vec<Point> = (0..68)
        .map(|i| {
            let nx = data[i * 2] as f64;
            let ny = data[i * 2 + 1] as f64;
            Point::new(rect.x as f64 + nx * scale, rect.y as f64 + ny * scale)
        })
        .collect();

    LandmarkSet::new(points).map_err(|e| VisionError::detection_failed(e.to_string()))
}
