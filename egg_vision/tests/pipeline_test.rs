use egg_vision::core_modules::segmenter::SegmenterConfig;
use egg_vision::{
    ColorProfile, EggPipeline, EggVisionConfig, Frame, Label, OwnedFrame, Region, RoiMode, SizeEstimationConfig,
    SizeEstimator, ThresholdProfile,
};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_ellipse_mut;

fn config_with(roi: RoiMode) -> EggVisionConfig {
    let mut config = EggVisionConfig::default();
    config.roi = roi;
    config
}

/// A warm, pale egg on a near-black conveyor.
fn egg_scene(width: u32, height: u32, shell: Rgb<u8>) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, Rgb([6, 6, 6]));
    draw_filled_ellipse_mut(
        &mut image,
        (width as i32 / 2, height as i32 / 2),
        width as i32 / 5,
        height as i32 / 4,
        shell,
    );
    image
}

#[test]
fn same_image_gives_the_same_label_twice() {
    let image = egg_scene(320, 240, Rgb([220, 203, 170]));
    for roi in [RoiMode::Centered { width: 100, height: 80 }, RoiMode::AutoDetect] {
        let pipeline = EggPipeline::new(&config_with(roi)).unwrap();
        let first = pipeline.analyze(&Frame::from(&image)).unwrap();
        let second = pipeline.analyze(&Frame::from(&image)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.label, Label::GoodEgg);
    }
}

#[test]
fn black_region_is_no_egg_in_every_profile() {
    let image = RgbImage::from_pixel(200, 200, Rgb([15, 15, 15]));
    for profile in [ThresholdProfile::Canonical, ThresholdProfile::BrownShell, ThresholdProfile::GreenCast] {
        let mut config = config_with(RoiMode::Centered { width: 100, height: 100 });
        config.classifier.profile = profile;
        let analysis = EggPipeline::new(&config).unwrap().analyze(&Frame::from(&image)).unwrap();
        assert_eq!(analysis.color, ColorProfile::Empty);
        assert_eq!(analysis.label, Label::NoEgg);
    }
}

#[test]
fn bgr_frames_classify_like_rgb_frames() {
    let image = egg_scene(320, 240, Rgb([220, 203, 170]));
    let bgr: Vec<u8> = image.pixels().flat_map(|p| [p.0[2], p.0[1], p.0[0]]).collect();
    let bgr_frame = OwnedFrame::new(320, 240, egg_vision::ChannelOrder::Bgr, bgr).unwrap();

    let pipeline = EggPipeline::new(&config_with(RoiMode::Centered { width: 100, height: 80 })).unwrap();
    let from_rgb = pipeline.analyze(&Frame::from(&image)).unwrap();
    let from_bgr = pipeline.analyze(&bgr_frame.as_frame()).unwrap();
    assert_eq!(from_rgb, from_bgr);
}

#[test]
fn stabilized_stream_switches_only_after_the_window() {
    let mut config = config_with(RoiMode::Fixed { x1: 110, y1: 80, x2: 210, y2: 160 });
    config.stabilizer.consecutive_frames = 4;
    let mut pipeline = EggPipeline::new(&config).unwrap();

    let egg = egg_scene(320, 240, Rgb([220, 203, 170]));
    let empty = RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]));
    let stream = [&egg, &egg, &empty, &egg, &egg, &egg, &egg, &empty];

    let committed: Vec<_> = stream
        .iter()
        .map(|image| pipeline.process_frame(&Frame::from(*image)).unwrap().committed_label())
        .collect();
    assert_eq!(
        committed,
        vec![
            Label::NoEgg,
            Label::NoEgg,
            Label::NoEgg,
            Label::NoEgg,
            Label::NoEgg,
            Label::NoEgg,
            Label::GoodEgg,
            Label::GoodEgg,
        ]
    );
}

#[test]
fn auto_detect_region_hugs_the_egg() {
    let image = egg_scene(320, 240, Rgb([220, 203, 170]));
    let pipeline = EggPipeline::new(&config_with(RoiMode::AutoDetect)).unwrap();
    let region = pipeline.analyze(&Frame::from(&image)).unwrap().region.unwrap();

    // Egg spans 129 x 121 around (160, 120); cleanup dilation adds a few pixels.
    let egg = Region::new(96, 60, 129, 121);
    assert!(region.x <= egg.x && region.y <= egg.y);
    assert!(region.right() >= egg.right() && region.bottom() >= egg.bottom());
    assert!(region.width < egg.width + 16 && region.height < egg.height + 16);
}

#[test]
fn size_of_a_synthetic_egg() {
    let mut image = RgbImage::from_pixel(400, 300, Rgb([20, 22, 25]));
    draw_filled_ellipse_mut(&mut image, (200, 150), 90, 60, Rgb([235, 220, 195]));

    let estimator = SizeEstimator::new(SizeEstimationConfig {
        segmentation: SegmenterConfig::video(),
    });
    let estimate = estimator.estimate_image(&image).unwrap();

    assert!(estimate.major_axis_px >= estimate.minor_axis_px);
    assert!((estimate.major_axis_px - 181.0).abs() < 12.0, "{estimate:?}");
    assert!((estimate.minor_axis_px - 121.0).abs() < 12.0, "{estimate:?}");
    let bbox = estimate.bounding_box;
    assert!(bbox.contains(200, 150));
    assert!((bbox.width as f64 - estimate.major_axis_px).abs() <= 2.0, "{estimate:?}");
}

/// Pale egg with a shaded dome on a grainy belt, closer to a real photograph than a flat fill.
fn shaded_egg_scene(width: u32, height: u32) -> RgbImage {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (rx, ry) = (width as f64 * 0.225, height as f64 * 0.2);
    RgbImage::from_fn(width, height, |x, y| {
        let d = ((x as f64 - cx) / rx).powi(2) + ((y as f64 - cy) / ry).powi(2);
        let level = if d <= 1.0 {
            (230.0 - 80.0 * d) as u8
        } else {
            let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
            h ^= h >> 15;
            h = h.wrapping_mul(0x2C1B_3C6D);
            h ^= h >> 12;
            20 + (h % 30) as u8
        };
        Rgb([level, level, level])
    })
}

#[test]
fn default_size_settings_measure_a_shaded_egg() {
    // Semi-axes 90 x 60 around (200, 150).
    let image = shaded_egg_scene(400, 300);
    let config = EggVisionConfig::default();
    assert_eq!(config.size_estimation.segmentation, SegmenterConfig::still());

    let estimate = SizeEstimator::new(config.size_estimation).estimate_image(&image).unwrap();
    assert!((estimate.major_axis_px - 181.0).abs() < 14.0, "{estimate:?}");
    assert!((estimate.minor_axis_px - 121.0).abs() < 14.0, "{estimate:?}");
    assert!(estimate.bounding_box.contains(200, 150));
    assert!(estimate.major_axis_px / estimate.minor_axis_px > 1.3, "{estimate:?}");
}
