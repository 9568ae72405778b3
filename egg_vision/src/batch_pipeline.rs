// THEORY:
// Still images, unlike video frames, are independent of each other: there is no
// stabilizer between them. The batch runner therefore fans them out over a
// bounded pool of blocking workers (one per CPU by default) and collects the
// results back in input order.
//
// Image decoding, segmentation and ellipse fitting are CPU-bound, so each item
// runs under `spawn_blocking` rather than on the async executor threads. A
// failing item produces an error report for that item and the batch goes on.

use crate::config::EggVisionConfig;
use crate::core_modules::frame::Frame;
use crate::core_modules::size_estimator::{SizeEstimate, SizeEstimator};
use crate::core_modules::utils::image_helper::image_helper::list_images;
use crate::error::{Result, SizeError, VisionError};
use crate::pipeline::{EggPipeline, FrameAnalysis};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Which analyses to run on every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub classify: bool,
    pub estimate_size: bool,
    /// Concurrent workers; zero means one per CPU.
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            classify: true,
            estimate_size: true,
            workers: 0,
        }
    }
}

/// Results for one readable image. A `None` field was not requested.
#[derive(Debug)]
pub struct StillOutcome {
    pub classification: Option<Result<FrameAnalysis>>,
    pub size: Option<std::result::Result<SizeEstimate, SizeError>>,
}

#[derive(Debug)]
pub struct StillReport {
    pub path: PathBuf,
    /// `Err` when the image itself could not be processed.
    pub outcome: Result<StillOutcome>,
}

pub struct StillBatch {
    pipeline: Arc<EggPipeline>,
    size_estimator: Arc<SizeEstimator>,
    options: BatchOptions,
}

impl StillBatch {
    pub fn new(config: &EggVisionConfig, options: BatchOptions) -> Result<Self> {
        Ok(Self {
            pipeline: Arc::new(EggPipeline::new(config)?),
            size_estimator: Arc::new(SizeEstimator::new(config.size_estimation.clone())),
            options,
        })
    }

    fn worker_count(&self) -> usize {
        match self.options.workers {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    /// Processes every still image in `dir`, in file-name order.
    pub async fn run_dir(&self, dir: &Path) -> Result<Vec<StillReport>> {
        let paths = list_images(dir)?;
        Ok(self.run(paths).await)
    }

    /// Processes `paths`; the reports come back in the same order.
    pub async fn run(&self, paths: Vec<PathBuf>) -> Vec<StillReport> {
        let workers = self.worker_count();
        debug!(images = paths.len(), workers, "starting still batch");

        stream::iter(paths)
            .map(|path| {
                let pipeline = Arc::clone(&self.pipeline);
                let size_estimator = Arc::clone(&self.size_estimator);
                let options = self.options;
                async move {
                    let task_path = path.clone();
                    let joined = tokio::task::spawn_blocking(move || {
                        process_still(&task_path, &pipeline, &size_estimator, options)
                    })
                    .await;
                    let outcome = joined.unwrap_or_else(|e| Err(VisionError::Worker(e.to_string())));
                    if let Err(e) = &outcome {
                        warn!(path = %path.display(), error = %e, "skipping image");
                    }
                    StillReport { path, outcome }
                }
            })
            .buffered(workers)
            .collect()
            .await
    }
}

fn process_still(
    path: &Path,
    pipeline: &EggPipeline,
    size_estimator: &SizeEstimator,
    options: BatchOptions,
) -> Result<StillOutcome> {
    let image = image::open(path)
        .map_err(|source| VisionError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let frame = Frame::from(&image);

    let classification = options.classify.then(|| pipeline.analyze(&frame));
    let size = options.estimate_size.then(|| size_estimator.estimate(&frame));
    Ok(StillOutcome { classification, size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::classifier::Label;
    use crate::core_modules::locator::RoiMode;
    use crate::core_modules::segmenter::SegmenterConfig;
    use crate::core_modules::utils::image_helper::image_helper::save_png;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_ellipse_mut;

    fn batch() -> StillBatch {
        let mut config = EggVisionConfig::default();
        config.roi = RoiMode::AutoDetect;
        config.size_estimation.segmentation = SegmenterConfig::video();
        StillBatch::new(
            &config,
            BatchOptions {
                workers: 2,
                ..BatchOptions::default()
            },
        )
        .unwrap()
    }

    fn egg_image() -> RgbImage {
        let mut image = RgbImage::from_pixel(200, 160, Rgb([10, 10, 10]));
        draw_filled_ellipse_mut(&mut image, (100, 80), 50, 35, Rgb([220, 203, 170]));
        image
    }

    #[tokio::test]
    async fn reports_keep_input_order_and_skip_bad_items() {
        let dir = std::env::temp_dir().join(format!("egg_vision_batch_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        save_png(&dir.join("a_egg.png"), &egg_image()).unwrap();
        std::fs::write(dir.join("b_broken.png"), b"not an image").unwrap();
        save_png(&dir.join("c_empty.png"), &RgbImage::new(200, 160)).unwrap();

        let reports = batch().run_dir(&dir).await.unwrap();
        let names: Vec<_> = reports
            .iter()
            .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_egg.png", "b_broken.png", "c_empty.png"]);

        let egg = reports[0].outcome.as_ref().unwrap();
        let analysis = egg.classification.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(analysis.label, Label::GoodEgg);
        let size = egg.size.as_ref().unwrap().as_ref().unwrap();
        assert!(size.major_axis_px > size.minor_axis_px);

        assert!(matches!(reports[1].outcome, Err(VisionError::ImageLoad { .. })));

        let empty = reports[2].outcome.as_ref().unwrap();
        let analysis = empty.classification.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(analysis.label, Label::NoEgg);
        assert!(matches!(empty.size, Some(Err(SizeError::NoContour(_)))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_paths_fail_individually() {
        let reports = batch()
            .run(vec![PathBuf::from("/nonexistent/one.png"), PathBuf::from("/nonexistent/two.jpg")])
            .await;
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.outcome.is_err()));
    }
}
