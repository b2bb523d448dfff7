use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::matching::domain::face_matcher::{FaceMatcher, FrameDistance};
use crate::matching::infrastructure::face_detection::{FaceBox, YoloFaceDetector};
use crate::matching::infrastructure::face_embedding::{euclidean_distance, ArcFaceEmbedder};
use crate::publishing::domain::frame_publisher::FrameHandle;
use crate::shared::cancellation::RunControl;
use crate::shared::model_resolver::{self, ModelSpec, ProgressFn, DETECTOR_MODEL, EMBEDDING_MODEL};

/// Where a model file comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSource {
    /// A model file already on disk.
    File(PathBuf),
    /// Looked up in the cache and bundled dir, downloaded if absent.
    Resolve {
        spec: ModelSpec,
        bundled_dir: Option<PathBuf>,
    },
}

impl ModelSource {
    fn locate(&self, progress: Option<&ProgressFn>) -> Result<PathBuf, Box<dyn std::error::Error>> {
        match self {
            Self::File(path) => Ok(path.clone()),
            Self::Resolve { spec, bundled_dir } => {
                let path = model_resolver::resolve(*spec, bundled_dir.as_deref(), progress)
                    .map_err(|e| format!("model {}: {e}", spec.name))?;
                Ok(path)
            }
        }
    }
}

struct LoadedModels {
    detector: YoloFaceDetector,
    embedder: ArcFaceEmbedder,
}

/// Face matcher backed by a YOLO face detector and an ArcFace embedder.
///
/// A frame's distance is that of its closest face to the reference face.
/// Models are located and loaded on `open` and dropped on `close`, so a
/// run that fails before matching never downloads them.
pub struct OnnxFaceMatcher {
    detector_model: ModelSource,
    embedding_model: ModelSource,
    confidence: f64,
    progress: Option<ProgressFn>,
    models: Option<LoadedModels>,
    /// Descriptor of the reference face, keyed by handle URL.
    reference: Option<(String, Vec<f32>)>,
}

impl OnnxFaceMatcher {
    pub fn new(detector_model: &Path, embedding_model: &Path, confidence: f64) -> Self {
        Self::from_sources(
            ModelSource::File(detector_model.to_path_buf()),
            ModelSource::File(embedding_model.to_path_buf()),
            confidence,
        )
    }

    /// Matcher using the default models, resolved when the session opens.
    pub fn with_default_models(bundled_dir: Option<&Path>, confidence: f64) -> Self {
        let source = |spec| ModelSource::Resolve {
            spec,
            bundled_dir: bundled_dir.map(Path::to_path_buf),
        };
        Self::from_sources(source(DETECTOR_MODEL), source(EMBEDDING_MODEL), confidence)
    }

    pub fn from_sources(
        detector_model: ModelSource,
        embedding_model: ModelSource,
        confidence: f64,
    ) -> Self {
        Self {
            detector_model,
            embedding_model,
            confidence,
            progress: None,
            models: None,
            reference: None,
        }
    }

    /// Reports model download progress while opening.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn models(&mut self) -> Result<&mut LoadedModels, Box<dyn std::error::Error>> {
        self.models
            .as_mut()
            .ok_or_else(|| "Face matcher is not open".into())
    }

    /// Descriptors of every face found in `path`, in detection order.
    fn describe_faces(
        &mut self,
        path: &Path,
    ) -> Result<Vec<(FaceBox, Vec<f32>)>, Box<dyn std::error::Error>> {
        let image = image::open(path)
            .map_err(|e| format!("Cannot decode {}: {e}", path.display()))?
            .to_rgb8();
        let models = self.models()?;
        let faces = models.detector.detect(&image)?;

        let mut described = Vec::with_capacity(faces.len());
        for face in faces {
            let Some(crop) = crop_face(&image, &face) else {
                continue;
            };
            described.push((face, models.embedder.embed(&crop)?));
        }
        Ok(described)
    }

    fn reference_descriptor(
        &mut self,
        reference: &FrameHandle,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        if let Some((url, descriptor)) = &self.reference {
            if url == reference.url() {
                return Ok(descriptor.clone());
            }
        }

        let path = reference.resolve()?.to_path_buf();
        let faces = self.describe_faces(&path)?;
        let (face, descriptor) = largest_face(faces)
            .ok_or_else(|| format!("No face detected in reference image {}", reference.url()))?;
        log::debug!(
            "Reference face at ({:.0}, {:.0})-({:.0}, {:.0}), confidence {:.2}",
            face.x1,
            face.y1,
            face.x2,
            face.y2,
            face.confidence
        );
        self.reference = Some((reference.url().to_string(), descriptor.clone()));
        Ok(descriptor)
    }
}

impl FaceMatcher for OnnxFaceMatcher {
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.models.is_some() {
            return Ok(());
        }
        let detector_path = self.detector_model.locate(self.progress.as_ref())?;
        let embedding_path = self.embedding_model.locate(self.progress.as_ref())?;
        let detector = YoloFaceDetector::new(&detector_path, self.confidence)?;
        let embedder = ArcFaceEmbedder::new(&embedding_path)?;
        self.models = Some(LoadedModels { detector, embedder });
        log::info!("Face matcher ready");
        Ok(())
    }

    fn warm_up(
        &mut self,
        reference: &FrameHandle,
        control: &RunControl,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.models()?;
        if control.checkpoint().is_err() {
            return Err("Warm-up interrupted".into());
        }
        self.reference_descriptor(reference).map(|_| ())
    }

    fn match_batch(
        &mut self,
        reference: &FrameHandle,
        frames: &[FrameHandle],
        control: &RunControl,
    ) -> Result<Vec<FrameDistance>, Box<dyn std::error::Error>> {
        self.models()?;
        let target = self.reference_descriptor(reference)?;

        let mut distances = Vec::with_capacity(frames.len());
        for frame in frames {
            if control.checkpoint().is_err() {
                return Err("Face matching interrupted".into());
            }
            let path = frame.resolve()?.to_path_buf();
            let descriptors: Vec<Vec<f32>> = self
                .describe_faces(&path)?
                .into_iter()
                .map(|(_, descriptor)| descriptor)
                .collect();
            match closest_distance(&target, &descriptors) {
                Some(distance) => distances.push(FrameDistance {
                    frame: frame.clone(),
                    distance,
                }),
                None => log::trace!("No face in {}", frame.url()),
            }
        }
        Ok(distances)
    }

    fn close(&mut self) {
        self.reference = None;
        if self.models.take().is_some() {
            log::debug!("Face matcher closed");
        }
    }
}

/// Crops `face` out of `image`, clamped to its bounds.
fn crop_face(image: &RgbImage, face: &FaceBox) -> Option<RgbImage> {
    let (x, y, w, h) = face.crop_rect(image.width(), image.height())?;
    Some(image::imageops::crop_imm(image, x, y, w, h).to_image())
}

fn largest_face<T>(faces: Vec<(FaceBox, T)>) -> Option<(FaceBox, T)> {
    faces
        .into_iter()
        .reduce(|best, next| if next.0.area() > best.0.area() { next } else { best })
}

fn closest_distance(target: &[f32], descriptors: &[Vec<f32>]) -> Option<f64> {
    descriptors
        .iter()
        .map(|d| euclidean_distance(target, d))
        .min_by(|a, b| a.total_cmp(b))
}
