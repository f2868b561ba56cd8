pub mod engine;
pub mod job;
pub mod payload;
pub mod quality;
pub mod scene;
pub mod status;
