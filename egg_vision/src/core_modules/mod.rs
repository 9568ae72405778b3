pub mod classifier;
pub mod color_profiler;
pub mod contour;
pub mod ellipse;
pub mod frame;
pub mod locator;
pub mod pixel;
pub mod region;
pub mod segmenter;
pub mod size_estimator;
pub mod stabilizer;
pub mod utils;
