// THEORY:
// A `Frame` is a borrowed view over one interleaved 3-channel image buffer. It is
// owned by the caller for the duration of a single processing step; the engine
// only reads from it. Keeping the buffer borrowed lets the video path hand over
// decoder memory without copying it first.
//
// `OwnedFrame` is the same data with an owned buffer, used where frames have to
// outlive the call that produced them (frame sources, snapshots).

use crate::core_modules::pixel::pixel::{ChannelOrder, Pixel};
use crate::core_modules::region::Region;
use crate::error::{Result, VisionError};
use image::{GrayImage, Luma, RgbImage};

pub const CHANNELS: usize = 3;

/// A read-only view of a single video frame or still image.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Wraps a raw buffer, checking that it holds exactly `width * height` pixels.
    pub fn new(width: u32, height: u32, order: ChannelOrder, data: &'a [u8]) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected || width == 0 || height == 0 {
            return Err(VisionError::FrameShape {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, order, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// The full frame as a region.
    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    /// Reads one pixel. Coordinates must be inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        let index = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let bytes = [self.data[index], self.data[index + 1], self.data[index + 2]];
        Pixel::from_ordered(bytes, self.order)
    }

    /// Iterates the pixels of a region row by row, yielding `(x, y, pixel)`.
    pub fn region_pixels(&self, region: Region) -> impl Iterator<Item = (u32, u32, Pixel)> + '_ {
        (region.y..region.bottom())
            .flat_map(move |y| (region.x..region.right()).map(move |x| (x, y, self.pixel(x, y))))
    }

    /// Rec. 601 grayscale copy of the whole frame.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| Luma([self.pixel(x, y).gray()]))
    }

    /// RGB copy of the whole frame, for drawing and encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let pixel = self.pixel(x, y);
            image::Rgb([pixel.red, pixel.green, pixel.blue])
        })
    }
}

impl<'a> From<&'a RgbImage> for Frame<'a> {
    fn from(image: &'a RgbImage) -> Self {
        Frame {
            width: image.width(),
            height: image.height(),
            order: ChannelOrder::Rgb,
            data: image.as_raw(),
        }
    }
}

/// A frame that owns its buffer.
#[derive(Debug, Clone)]
pub struct OwnedFrame {
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl OwnedFrame {
    pub fn new(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Result<Self> {
        Frame::new(width, height, order, &data)?;
        Ok(Self { width, height, order, data })
    }

    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            width: self.width,
            height: self.height,
            order: self.order,
            data: &self.data,
        }
    }
}

impl From<RgbImage> for OwnedFrame {
    fn from(image: RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            order: ChannelOrder::Rgb,
            data: image.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        let data = vec![0u8; 10];
        let err = Frame::new(2, 2, ChannelOrder::Bgr, &data).unwrap_err();
        assert!(matches!(err, VisionError::FrameShape { expected: 12, actual: 10, .. }));
    }

    #[test]
    fn bgr_frame_reads_rgb_pixels() {
        // One blue pixel followed by one red pixel, stored BGR.
        let data = vec![255, 0, 0, 0, 0, 255];
        let frame = Frame::new(2, 1, ChannelOrder::Bgr, &data).unwrap();
        assert_eq!(frame.pixel(0, 0), Pixel::new(0, 0, 255));
        assert_eq!(frame.pixel(1, 0), Pixel::new(255, 0, 0));
        let rgb = frame.to_rgb_image();
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn region_pixels_walk_rows() {
        let image = RgbImage::from_fn(4, 3, |x, y| image::Rgb([x as u8, y as u8, 0]));
        let frame = Frame::from(&image);
        let coords: Vec<(u32, u32)> = frame
            .region_pixels(Region::new(1, 1, 2, 2))
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(coords, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }
}
