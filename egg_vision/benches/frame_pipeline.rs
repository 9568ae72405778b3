use criterion::{black_box, criterion_group, criterion_main, Criterion};
use egg_vision::core_modules::segmenter::SegmenterConfig;
use egg_vision::{EggPipeline, EggVisionConfig, Frame, RoiMode, SizeEstimationConfig, SizeEstimator};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_ellipse_mut;

fn scene() -> RgbImage {
    let mut image = RgbImage::from_pixel(640, 480, Rgb([12, 12, 14]));
    draw_filled_ellipse_mut(&mut image, (320, 240), 110, 80, Rgb([220, 203, 170]));
    image
}

fn pipeline_for(roi: RoiMode) -> EggPipeline {
    let mut config = EggVisionConfig::default();
    config.roi = roi;
    EggPipeline::new(&config).expect("default config is valid")
}

fn bench_frames(c: &mut Criterion) {
    let image = scene();

    let mut fixed = pipeline_for(RoiMode::default());
    c.bench_function("process_frame centered roi 640x480", |b| {
        b.iter(|| fixed.process_frame(black_box(&Frame::from(&image))).unwrap())
    });

    let mut auto = pipeline_for(RoiMode::AutoDetect);
    c.bench_function("process_frame auto detect 640x480", |b| {
        b.iter(|| auto.process_frame(black_box(&Frame::from(&image))).unwrap())
    });

    let estimator = SizeEstimator::new(SizeEstimationConfig {
        segmentation: SegmenterConfig::video(),
    });
    c.bench_function("size estimate 640x480", |b| {
        b.iter(|| estimator.estimate_image(black_box(&image)).unwrap())
    });
}

criterion_group!(benches, bench_frames);
criterion_main!(benches);
