// THEORY:
// The `ColorProfiler` summarizes a region as one representative HSV color.
//
// Key principles:
// 1.  **Background Rejection**: near-black pixels (every HSV channel at or below
//     the noise floor) are the empty conveyor or a dark backdrop, not egg. They
//     are discarded before any statistics are taken.
// 2.  **Single-Cluster Centroid**: the dominant color is the centroid of a
//     one-cluster fit. Under squared error a single cluster's centroid is just the
//     sample mean, so it is computed directly as the per-channel arithmetic mean.
//     There is no iterative clustering and no random initialization, so the same
//     pixels always produce the same color.
// 3.  **Empty Is Meaningful**: a region with nothing left after filtering is not an
//     error. It is reported as `ColorProfile::Empty`, which classifies as "No Egg".
// 4.  **Integer Accumulation**: channel sums are accumulated as integers and only
//     divided at the end, so the result does not depend on pixel order.

use crate::core_modules::frame::Frame;
use crate::core_modules::pixel::pixel::Hsv;
use crate::core_modules::region::Region;
use crate::error::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Default noise floor on the 8-bit scale.
pub const DEFAULT_NOISE_FLOOR: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Pixels with every HSV channel at or below this value are discarded.
    pub noise_floor: u8,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            noise_floor: DEFAULT_NOISE_FLOOR,
        }
    }
}

/// The mean HSV of the retained pixels of a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DominantColor {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
    /// How many pixels survived the noise floor.
    pub samples: u64,
}

/// Result of profiling one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorProfile {
    Dominant(DominantColor),
    /// Nothing survived the noise floor.
    Empty,
}

impl ColorProfile {
    pub fn dominant(&self) -> Option<DominantColor> {
        match self {
            ColorProfile::Dominant(color) => Some(*color),
            ColorProfile::Empty => None,
        }
    }
}

#[derive(Debug, Default)]
struct HsvAccumulator {
    hue: u64,
    saturation: u64,
    value: u64,
    count: u64,
}

impl HsvAccumulator {
    fn push(&mut self, hsv: Hsv) {
        self.hue += hsv.hue as u64;
        self.saturation += hsv.saturation as u64;
        self.value += hsv.value as u64;
        self.count += 1;
    }

    fn centroid(&self) -> ColorProfile {
        if self.count == 0 {
            return ColorProfile::Empty;
        }
        let n = self.count as f64;
        ColorProfile::Dominant(DominantColor {
            hue: self.hue as f64 / n,
            saturation: self.saturation as f64 / n,
            value: self.value as f64 / n,
            samples: self.count,
        })
    }
}

/// Computes the dominant color of a region.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorProfiler {
    config: ProfilerConfig,
}

impl ColorProfiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    pub fn noise_floor(&self) -> u8 {
        self.config.noise_floor
    }

    /// Profiles an arbitrary collection of HSV samples.
    pub fn profile_samples<I>(&self, samples: I) -> ColorProfile
    where
        I: IntoIterator<Item = Hsv>,
    {
        let floor = self.config.noise_floor;
        let mut accumulator = HsvAccumulator::default();
        for hsv in samples.into_iter().filter(|hsv| !hsv.is_below_floor(floor)) {
            accumulator.push(hsv);
        }
        accumulator.centroid()
    }

    /// Profiles every pixel of `region`. Fails if `region` leaves the frame.
    pub fn profile(&self, frame: &Frame<'_>, region: Region) -> Result<ColorProfile> {
        let region = region.validate(frame.width(), frame.height())?;
        Ok(self.profile_samples(frame.region_pixels(region).map(|(_, _, pixel)| pixel.hsv())))
    }

    /// Profiles only the pixels of `region` that are foreground in `mask`.
    /// The mask is in frame coordinates.
    pub fn profile_masked(&self, frame: &Frame<'_>, region: Region, mask: &GrayImage) -> Result<ColorProfile> {
        let region = region.validate(frame.width(), frame.height())?;
        Ok(self.profile_samples(
            frame
                .region_pixels(region)
                .filter(|&(x, y, _)| mask.get_pixel_checked(x, y).is_some_and(|m| m.0[0] > 0))
                .map(|(_, _, pixel)| pixel.hsv()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn all_dark_region_is_empty() {
        let image = RgbImage::from_pixel(40, 40, Rgb([12, 12, 12]));
        let frame = Frame::from(&image);
        let profile = ColorProfiler::default().profile(&frame, frame.bounds()).unwrap();
        assert_eq!(profile, ColorProfile::Empty);
    }

    #[test]
    fn centroid_is_the_channel_mean() {
        let profiler = ColorProfiler::default();
        let profile = profiler.profile_samples([Hsv::new(10, 100, 200), Hsv::new(30, 50, 100)]);
        let color = profile.dominant().unwrap();
        assert_eq!((color.hue, color.saturation, color.value), (20.0, 75.0, 150.0));
        assert_eq!(color.samples, 2);
    }

    #[test]
    fn background_pixels_do_not_shift_the_mean() {
        let mut image = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        for x in 5..15 {
            for y in 5..15 {
                image.put_pixel(x, y, Rgb([200, 170, 120]));
            }
        }
        let frame = Frame::from(&image);
        let color = ColorProfiler::default().profile(&frame, frame.bounds()).unwrap().dominant().unwrap();
        assert_eq!(color.samples, 100);
        assert_eq!((color.hue, color.saturation, color.value), (19.0, 102.0, 200.0));
    }

    #[test]
    fn pixel_order_does_not_matter() {
        let samples: Vec<Hsv> = (0..255u8).map(|i| Hsv::new(i % 180, i, 255 - i)).collect();
        let profiler = ColorProfiler::default();
        let forward = profiler.profile_samples(samples.iter().copied());
        let backward = profiler.profile_samples(samples.iter().rev().copied());
        assert_eq!(forward, backward);
    }

    #[test]
    fn mask_restricts_sampling() {
        let mut image = RgbImage::from_pixel(10, 10, Rgb([200, 170, 120]));
        image.put_pixel(0, 0, Rgb([0, 0, 255]));
        let frame = Frame::from(&image);
        let mut mask = GrayImage::from_pixel(10, 10, Luma([255]));
        mask.put_pixel(0, 0, Luma([0]));
        let color = ColorProfiler::default()
            .profile_masked(&frame, frame.bounds(), &mask)
            .unwrap()
            .dominant()
            .unwrap();
        assert_eq!(color.samples, 99);
        assert_eq!(color.hue, 19.0);
    }

    #[test]
    fn region_past_the_frame_edge_is_rejected() {
        let image = RgbImage::from_pixel(10, 10, Rgb([200, 170, 120]));
        let frame = Frame::from(&image);
        let profiler = ColorProfiler::default();
        let overhanging = Region::new(5, 5, 10, 10);

        assert!(matches!(
            profiler.profile(&frame, overhanging),
            Err(crate::error::VisionError::InvalidRegion { .. })
        ));
        let mask = GrayImage::from_pixel(10, 10, Luma([255]));
        assert!(profiler.profile_masked(&frame, overhanging, &mask).is_err());
        assert!(profiler.profile(&frame, Region::new(5, 5, 5, 5)).is_ok());
    }
}
