// THEORY:
// A `VideoSession` drives one `EggPipeline` over one stream of frames. The stream
// and its output are abstracted behind `FrameSource` and `FrameSink` so the same
// loop runs over a decoded video file, a directory of stills, or an in-memory
// buffer in tests.
//
// Key principles:
// 1.  **Strict Order**: frames are processed one at a time, in source order. The
//     stabilizer depends on it, so nothing here is parallel.
// 2.  **Stop Between Frames**: a shared flag is checked before each frame. A stop
//     never interrupts a frame half-way, and whatever was already written stays
//     written.
// 3.  **Change-Driven Snapshots**: when the committed label changes to an egg
//     label, the annotated frame is saved and one row is appended to the log.
// 4.  **Session-Scoped Failure**: an unreadable frame is skipped with a warning.
//     Anything else (an output that cannot be written, a dead decoder) ends the
//     session with an error, and the caller decides what to do next.

use crate::core_modules::classifier::Label;
use crate::core_modules::frame::OwnedFrame;
use crate::core_modules::region::Region;
use crate::core_modules::utils::image_helper::image_helper::{annotate, list_images, save_png};
use crate::error::{Result, VisionError};
use crate::pipeline::EggPipeline;
use image::RgbImage;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Frame rate assumed when a source reports none.
pub const FALLBACK_FRAME_RATE: f64 = 30.0;

pub const SNAPSHOT_LOG_HEADER: &str = "frame,elapsed,label,snapshot";

/// A stream of frames, read in order.
pub trait FrameSource {
    /// Frames per second; non-positive when unknown.
    fn frame_rate(&self) -> f64;

    /// The next frame, or `None` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<OwnedFrame>>;
}

/// The box and committed label drawn onto an output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    pub region: Region,
    pub label: Label,
}

/// Receives every processed frame, in order. `frame` already carries the box;
/// sinks that can render text add the label from `overlay`.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage, overlay: Option<Overlay>) -> Result<()>;

    /// Called once after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Elapsed stream time of a frame as `H:MM:SS`.
pub fn format_elapsed(frame_index: u64, frame_rate: f64) -> String {
    let rate = if frame_rate.is_finite() && frame_rate > 0.0 {
        frame_rate
    } else {
        FALLBACK_FRAME_RATE
    };
    let seconds = (frame_index as f64 / rate).floor() as u64;
    format!("{}:{:02}:{:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60)
}

/// Reads the still images of a directory as frames, in file-name order.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    frame_rate: f64,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>, frame_rate: f64) -> Self {
        Self {
            paths,
            next: 0,
            frame_rate,
        }
    }

    pub fn from_dir(dir: &Path, frame_rate: f64) -> Result<Self> {
        Ok(Self::new(list_images(dir)?, frame_rate))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn next_frame(&mut self) -> Result<Option<OwnedFrame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let image = image::open(path).map_err(|source| VisionError::ImageLoad {
            path: path.clone(),
            source,
        })?;
        Ok(Some(OwnedFrame::from(image.to_rgb8())))
    }
}

/// Writes each frame as a numbered PNG into a directory.
pub struct ImageSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl ImageSequenceSink {
    /// Creates the output directory if needed.
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &RgbImage, _overlay: Option<Overlay>) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        save_png(&path, frame)?;
        self.written += 1;
        Ok(())
    }
}

/// Snapshot images plus a CSV row per committed-label change.
pub struct SnapshotLog {
    writer: BufWriter<File>,
    snapshot_dir: PathBuf,
}

impl SnapshotLog {
    /// Creates (or truncates) the log file and writes its header.
    pub fn create(log_path: &Path, snapshot_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(snapshot_dir)?;
        let mut writer = BufWriter::new(File::create(log_path)?);
        writeln!(writer, "{SNAPSHOT_LOG_HEADER}")?;
        writer.flush()?;
        Ok(Self {
            writer,
            snapshot_dir: snapshot_dir.to_path_buf(),
        })
    }

    /// Saves `image` and appends its row. Returns the snapshot path.
    pub fn record(&mut self, frame_index: u64, frame_rate: f64, label: Label, image: &RgbImage) -> Result<PathBuf> {
        let slug = label.as_str().to_lowercase().replace(' ', "_");
        let name = format!("snapshot_{frame_index:06}_{slug}.png");
        let path = self.snapshot_dir.join(&name);
        save_png(&path, image)?;

        writeln!(
            self.writer,
            "{},{},{},{}",
            frame_index,
            format_elapsed(frame_index, frame_rate),
            label,
            name
        )?;
        self.writer.flush()?;
        Ok(path)
    }
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub frames_processed: u64,
    /// Frames that could not be read or analyzed and were passed over.
    pub frames_skipped: u64,
    pub snapshots_written: u64,
    pub final_label: Label,
    /// True when the stop flag ended the session before the source did.
    pub stopped_early: bool,
}

pub struct VideoSession {
    pipeline: EggPipeline,
    snapshot_log: Option<SnapshotLog>,
    stop: Arc<AtomicBool>,
}

impl VideoSession {
    pub fn new(pipeline: EggPipeline) -> Self {
        Self {
            pipeline,
            snapshot_log: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_snapshot_log(mut self, log: SnapshotLog) -> Self {
        self.snapshot_log = Some(log);
        self
    }

    /// Setting the returned flag stops the session before its next frame.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn pipeline(&self) -> &EggPipeline {
        &self.pipeline
    }

    pub fn run(&mut self, source: &mut dyn FrameSource, sink: &mut dyn FrameSink) -> Result<SessionSummary> {
        self.pipeline.reset();
        let frame_rate = source.frame_rate();
        let mut summary = SessionSummary {
            frames_processed: 0,
            frames_skipped: 0,
            snapshots_written: 0,
            final_label: Label::NoEgg,
            stopped_early: false,
        };
        info!(frame_rate, "session started");

        let mut index = 0u64;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                summary.stopped_early = true;
                break;
            }

            // --- 1. Read ---
            let owned = match source.next_frame() {
                Ok(Some(owned)) => owned,
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    warn!(frame = index, error = %e, "skipping unreadable frame");
                    summary.frames_skipped += 1;
                    index += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let frame = owned.as_frame();
            let mut image = frame.to_rgb_image();
            let mut overlay = None;

            // --- 2. Analyze and stabilize ---
            match self.pipeline.process_frame(&frame) {
                Ok(report) => {
                    let committed = report.committed_label();
                    if committed.is_egg() {
                        if let Some(region) = report.analysis.region {
                            annotate(&mut image, region, committed);
                            overlay = Some(Overlay { region, label: committed });
                        }
                    }

                    // --- 3. Snapshot on change ---
                    if report.changed() {
                        info!(frame = index, label = %committed, "committed label changed");
                        if let Some(log) = self.snapshot_log.as_mut().filter(|_| committed.is_egg()) {
                            log.record(index, frame_rate, committed, &image)?;
                            summary.snapshots_written += 1;
                        }
                    }
                    summary.frames_processed += 1;
                }
                Err(e) if e.is_recoverable() => {
                    warn!(frame = index, error = %e, "frame could not be analyzed");
                    summary.frames_skipped += 1;
                }
                Err(e) => return Err(e),
            }

            // --- 4. Write ---
            sink.write_frame(&image, overlay)?;
            index += 1;
        }

        sink.finish()?;
        summary.final_label = self.pipeline.stabilizer().committed();
        info!(
            frames = summary.frames_processed,
            skipped = summary.frames_skipped,
            snapshots = summary.snapshots_written,
            label = %summary.final_label,
            stopped_early = summary.stopped_early,
            "session finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EggVisionConfig;
    use crate::core_modules::locator::RoiMode;
    use image::Rgb;
    use std::collections::VecDeque;

    struct MemorySource {
        frames: VecDeque<Result<OwnedFrame>>,
    }

    impl FrameSource for MemorySource {
        fn frame_rate(&self) -> f64 {
            10.0
        }

        fn next_frame(&mut self) -> Result<Option<OwnedFrame>> {
            self.frames.pop_front().transpose()
        }
    }

    #[derive(Default)]
    struct MemorySink {
        frames: Vec<RgbImage>,
        overlays: Vec<Option<Overlay>>,
        finished: bool,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, frame: &RgbImage, overlay: Option<Overlay>) -> Result<()> {
            self.frames.push(frame.clone());
            self.overlays.push(overlay);
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("egg_vision_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn session(window: u32) -> VideoSession {
        let mut config = EggVisionConfig::default();
        config.roi = RoiMode::Centered { width: 40, height: 40 };
        config.stabilizer.consecutive_frames = window;
        VideoSession::new(EggPipeline::new(&config).unwrap())
    }

    fn good() -> OwnedFrame {
        OwnedFrame::from(RgbImage::from_pixel(80, 60, Rgb([220, 203, 170])))
    }

    fn empty() -> OwnedFrame {
        OwnedFrame::from(RgbImage::from_pixel(80, 60, Rgb([0, 0, 0])))
    }

    #[test]
    fn elapsed_is_hours_minutes_seconds() {
        assert_eq!(format_elapsed(0, 30.0), "0:00:00");
        assert_eq!(format_elapsed(95, 1.0), "0:01:35");
        assert_eq!(format_elapsed(3_725 * 25, 25.0), "1:02:05");
        // Unknown rate falls back to 30 fps.
        assert_eq!(format_elapsed(90, 0.0), "0:00:03");
        assert_eq!(format_elapsed(90, -5.0), "0:00:03");
    }

    #[test]
    fn snapshots_follow_committed_changes() {
        let dir = temp_dir("snapshots");
        let log_path = dir.join("log.csv");
        let mut session = session(2).with_snapshot_log(SnapshotLog::create(&log_path, &dir.join("snaps")).unwrap());

        let frames = [good(), good(), good(), empty(), empty(), good(), good()];
        let mut source = MemorySource {
            frames: frames.into_iter().map(Ok).collect(),
        };
        let mut sink = MemorySink::default();
        let summary = session.run(&mut source, &mut sink).unwrap();

        assert_eq!(summary.frames_processed, 7);
        assert_eq!(summary.snapshots_written, 2);
        assert_eq!(summary.final_label, Label::GoodEgg);
        assert!(!summary.stopped_early);
        assert_eq!(sink.frames.len(), 7);
        assert!(sink.finished);

        let log = std::fs::read_to_string(&log_path).unwrap();
        let rows: Vec<_> = log.lines().collect();
        assert_eq!(rows[0], SNAPSHOT_LOG_HEADER);
        assert_eq!(rows[1], "1,0:00:00,Good Egg,snapshot_000001_good_egg.png");
        assert_eq!(rows[2], "6,0:00:00,Good Egg,snapshot_000006_good_egg.png");
        assert!(dir.join("snaps/snapshot_000006_good_egg.png").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn committed_frames_are_annotated() {
        let mut session = session(1);
        let mut source = MemorySource {
            frames: [empty(), good()].into_iter().map(Ok).collect(),
        };
        let mut sink = MemorySink::default();
        session.run(&mut source, &mut sink).unwrap();

        // Centered 40x40 box in 80x60 starts at (20, 10).
        assert_eq!(*sink.frames[0].get_pixel(20, 30), Rgb([0, 0, 0]));
        assert_ne!(*sink.frames[1].get_pixel(20, 30), Rgb([220, 203, 170]));
        assert_eq!(sink.overlays[0], None);
        assert_eq!(
            sink.overlays[1],
            Some(Overlay {
                region: Region::new(20, 10, 40, 40),
                label: Label::GoodEgg,
            })
        );
    }

    #[test]
    fn unreadable_frames_are_skipped() {
        let mut session = session(1);
        let broken = VisionError::FrameShape {
            width: 2,
            height: 2,
            expected: 12,
            actual: 1,
        };
        let mut source = MemorySource {
            frames: [Ok(good()), Err(broken), Ok(good())].into_iter().collect(),
        };
        let mut sink = MemorySink::default();
        let summary = session.run(&mut source, &mut sink).unwrap();
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.frames_skipped, 1);
        assert_eq!(sink.frames.len(), 2);
    }

    #[test]
    fn fatal_source_error_ends_the_session() {
        let mut session = session(1);
        let mut source = MemorySource {
            frames: [Ok(good()), Err(VisionError::Video("decoder lost".into()))].into_iter().collect(),
        };
        let mut sink = MemorySink::default();
        assert!(session.run(&mut source, &mut sink).is_err());
        assert_eq!(sink.frames.len(), 1);
    }

    #[test]
    fn stop_flag_halts_before_the_next_frame() {
        let mut session = session(1);
        session.stop_handle().store(true, Ordering::Relaxed);
        let mut source = MemorySource {
            frames: [good(), good()].into_iter().map(Ok).collect(),
        };
        let mut sink = MemorySink::default();
        let summary = session.run(&mut source, &mut sink).unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.frames_processed, 0);
        assert!(sink.finished);
    }

    #[test]
    fn image_sequence_round_trip() {
        let input = temp_dir("seq_in");
        let output = input.join("out");
        for i in 0..3 {
            save_png(&input.join(format!("{i:02}.png")), &RgbImage::from_pixel(80, 60, Rgb([220, 203, 170]))).unwrap();
        }

        let mut source = ImageSequenceSource::from_dir(&input, 0.0).unwrap();
        assert_eq!(source.len(), 3);
        let mut sink = ImageSequenceSink::create(&output).unwrap();
        let summary = session(2).run(&mut source, &mut sink).unwrap();

        assert_eq!(summary.frames_processed, 3);
        assert_eq!(sink.frames_written(), 3);
        assert!(output.join("frame_000002.png").exists());
        std::fs::remove_dir_all(&input).ok();
    }
}
