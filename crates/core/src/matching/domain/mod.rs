pub mod face_matcher;
pub mod match_aggregator;
