//! ArcFace face descriptors using ONNX Runtime.

use std::path::Path;

use image::RgbImage;

use crate::matching::infrastructure::execution_provider::load_session;

const INPUT_SIZE: u32 = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct ArcFaceEmbedder {
    session: ort::session::Session,
}

impl ArcFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: load_session(model_path)?,
        })
    }

    /// L2-normalized descriptor of a face crop.
    pub fn embed(&mut self, crop: &RgbImage) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(preprocess(crop))?;
        let outputs = self.session.run(ort::inputs![input])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Resize crop to 112x112, normalize, NCHW layout.
fn preprocess(crop: &RgbImage) -> ndarray::Array4<f32> {
    let resized = image::imageops::resize(
        crop,
        INPUT_SIZE,
        INPUT_SIZE,
        image::imageops::FilterType::Triangle,
    );
    let size = INPUT_SIZE as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - NORM_MEAN) / NORM_STD;
        }
    }
    tensor
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Euclidean distance between two descriptors. For unit vectors this lies in `[0, 2]`.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_l2_normalize_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_abs_diff_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(v[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_euclidean_distance_identical_is_zero() {
        let v = [0.6, 0.8];
        assert_eq!(euclidean_distance(&v, &v), 0.0);
    }

    #[test]
    fn test_euclidean_distance_opposite_unit_vectors() {
        assert_abs_diff_eq!(euclidean_distance(&[1.0, 0.0], &[-1.0, 0.0]), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            euclidean_distance(&[1.0, 0.0], &[0.0, 1.0]),
            2f64.sqrt(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_preprocess_shape() {
        let crop = RgbImage::new(40, 60);
        assert_eq!(preprocess(&crop).shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization_bounds() {
        let white = preprocess(&RgbImage::from_pixel(10, 10, image::Rgb([255, 255, 255])));
        let black = preprocess(&RgbImage::from_pixel(10, 10, image::Rgb([0, 0, 0])));
        assert_abs_diff_eq!(white[[0, 2, 50, 50]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(black[[0, 0, 50, 50]], -1.0, epsilon = 1e-6);
    }
}
