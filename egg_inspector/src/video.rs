// OpenCV-backed frame source and sink for video files.
//
// Decoded frames are BGR, which `Frame` reads natively, so the source hands the
// decoder buffer over without a color conversion. The sink receives RGB images
// from the session and swaps them back to BGR for the encoder.

use egg_vision::core_modules::utils::image_helper::image_helper::TAG_HEIGHT;
use egg_vision::{ChannelOrder, FrameSink, FrameSource, Overlay, OwnedFrame, VisionError};
use image::RgbImage;
use opencv::{
    core::{self, Mat, Point, Scalar},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::Path;

fn video_error(e: opencv::Error) -> VisionError {
    VisionError::Video(e.to_string())
}

pub struct VideoFileSource {
    capture: VideoCapture,
    frame: Mat,
    frame_rate: f64,
    width: u32,
    height: u32,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> egg_vision::Result<Self> {
        let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY).map_err(video_error)?;
        if !capture.is_opened().map_err(video_error)? {
            return Err(VisionError::Video(format!("cannot open video {}", path.display())));
        }
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(video_error)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(video_error)? as u32;
        let frame_rate = capture.get(videoio::CAP_PROP_FPS).map_err(video_error)?;
        Ok(Self {
            capture,
            frame: Mat::default(),
            frame_rate,
            width,
            height,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for VideoFileSource {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn next_frame(&mut self) -> egg_vision::Result<Option<OwnedFrame>> {
        if !self.capture.read(&mut self.frame).map_err(video_error)? || self.frame.empty() {
            return Ok(None);
        }
        let size = self.frame.size().map_err(video_error)?;
        let bytes = self.frame.data_bytes().map_err(video_error)?.to_vec();
        OwnedFrame::new(size.width as u32, size.height as u32, ChannelOrder::Bgr, bytes).map(Some)
    }
}

pub struct VideoFileSink {
    writer: VideoWriter,
}

impl VideoFileSink {
    /// Opens an mp4v writer; failure here aborts the session before any frame is read.
    pub fn create(path: &Path, frame_rate: f64, width: u32, height: u32) -> egg_vision::Result<Self> {
        let rate = if frame_rate > 0.0 { frame_rate } else { egg_vision::session::FALLBACK_FRAME_RATE };
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v').map_err(video_error)?;
        let writer = VideoWriter::new(
            &path.to_string_lossy(),
            fourcc,
            rate,
            core::Size::new(width as i32, height as i32),
            true,
        )
        .map_err(video_error)?;
        if !writer.is_opened().map_err(video_error)? {
            return Err(VisionError::Video(format!("cannot open output {}", path.display())));
        }
        Ok(Self { writer })
    }
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &RgbImage, overlay: Option<Overlay>) -> egg_vision::Result<()> {
        let mut mat = Mat::new_rows_cols_with_default(
            frame.height() as i32,
            frame.width() as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(video_error)?;
        {
            let bytes = mat.data_bytes_mut().map_err(video_error)?;
            for (bgr, rgb) in bytes.chunks_exact_mut(3).zip(frame.pixels()) {
                bgr[0] = rgb.0[2];
                bgr[1] = rgb.0[1];
                bgr[2] = rgb.0[0];
            }
        }

        // The library already drew the box and tag strip; the label text goes on the strip.
        if let Some(overlay) = overlay {
            let region = overlay.region;
            let strip_top = if region.y >= TAG_HEIGHT { region.y - TAG_HEIGHT } else { region.y };
            let origin = Point::new(region.x as i32 + 2, (strip_top + TAG_HEIGHT - 2) as i32);
            imgproc::put_text(
                &mut mat,
                overlay.label.as_str(),
                origin,
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.4,
                Scalar::new(255.0, 255.0, 255.0, 0.0),
                1,
                imgproc::LINE_AA,
                false,
            )
            .map_err(video_error)?;
        }

        self.writer.write(&mat).map_err(video_error)
    }

    fn finish(&mut self) -> egg_vision::Result<()> {
        self.writer.release().map_err(video_error)
    }
}
