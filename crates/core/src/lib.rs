pub mod matching;
pub mod pipeline;
pub mod publishing;
pub mod shared;
pub mod video;
