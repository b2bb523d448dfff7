//! YOLO face detection on still images via ONNX Runtime.
//!
//! Only bounding boxes are needed for matching, so keypoints in the model
//! output are ignored.

use std::path::Path;

use image::RgbImage;

use crate::matching::infrastructure::execution_provider::load_session;

/// Fallback input resolution when the model reports a dynamic shape.
const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox fill value (YOLO convention: gray 114).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// A detected face in source image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

impl FaceBox {
    pub fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Integer crop rectangle `(x, y, w, h)` clamped to the image, or `None` if empty.
    pub fn crop_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x1.max(0.0).floor() as u32;
        let y1 = self.y1.max(0.0).floor() as u32;
        let x2 = (self.x2.min(width as f64).ceil().max(0.0) as u32).min(width);
        let y2 = (self.y2.min(height as f64).ceil().max(0.0) as u32).min(height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }

    fn iou(&self, other: &FaceBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

pub struct YoloFaceDetector {
    session: ort::session::Session,
    input_size: u32,
    confidence: f64,
}

impl YoloFaceDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;

        // NCHW: [1, 3, H, W]; square input assumed.
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            input_size,
            confidence,
        })
    }

    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let Letterboxed { tensor, placement } = letterbox(image, self.input_size);
        let input = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input])?;
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected detector output shape: {shape:?}").into());
        }
        let data = tensor.as_slice().ok_or("Cannot read detector output")?;

        let boxes = decode_rows(data, shape[1], shape[2], self.confidence, &placement);
        Ok(non_max_suppression(boxes, NMS_IOU_THRESH))
    }
}

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    placement: Placement,
}

/// Where the source image sits inside the letterboxed square.
struct Placement {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

/// Scales `image` to fit a `size`×`size` square, centered with gray padding, as NCHW floats.
fn letterbox(image: &RgbImage, size: u32) -> Letterboxed {
    let (w, h) = image.dimensions();
    let scale = (size as f64 / w as f64).min(size as f64 / h as f64);
    let new_w = ((w as f64 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f64 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let resized =
        image::imageops::resize(image, new_w, new_h, image::imageops::FilterType::Triangle);
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, size as usize, size as usize), PAD_VALUE);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (pad_x + x) as usize;
        let ty = (pad_y + y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
        }
    }

    Letterboxed {
        tensor,
        placement: Placement {
            scale,
            pad_x: pad_x as f64,
            pad_y: pad_y as f64,
        },
    }
}

/// Parses `[cx, cy, w, h, conf, ...]` rows from either output layout
/// (`[1, features, detections]` or `[1, detections, features]`).
fn decode_rows(
    data: &[f32],
    dim1: usize,
    dim2: usize,
    confidence: f64,
    placement: &Placement,
) -> Vec<FaceBox> {
    let transposed = dim1 < dim2;
    let (num_dets, num_feats) = if transposed { (dim2, dim1) } else { (dim1, dim2) };
    if num_feats < 5 {
        return Vec::new();
    }
    let value = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data.get(idx).copied().unwrap_or(0.0) as f64
    };

    let unmap_x = |x: f64| (x - placement.pad_x) / placement.scale;
    let unmap_y = |y: f64| (y - placement.pad_y) / placement.scale;

    (0..num_dets)
        .filter_map(|i| {
            let conf = value(i, 4);
            if conf < confidence {
                return None;
            }
            let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
            Some(FaceBox {
                x1: unmap_x(cx - w / 2.0),
                y1: unmap_y(cy - h / 2.0),
                x2: unmap_x(cx + w / 2.0),
                y2: unmap_y(cy + h / 2.0),
                confidence: conf,
            })
        })
        .collect()
}

/// Greedy NMS: highest confidence first, dropping boxes that overlap a kept one.
fn non_max_suppression(mut boxes: Vec<FaceBox>, iou_thresh: f64) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut keep: Vec<FaceBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if keep.iter().all(|kept| kept.iou(&candidate) <= iou_thresh) {
            keep.push(candidate);
        }
    }
    keep
}
