mod execution_provider;
pub mod face_detection;
pub mod face_embedding;
pub mod onnx_face_matcher;
