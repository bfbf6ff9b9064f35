//! Fluent construction of a [`Segment`].
//!
//! The builder covers the common one-video-one-audio setup; callers that
//! need more tracks or per-track metadata construct a [`Segment`] directly
//! and use its track methods before the first frame.

use crate::error::{MuxError, Result};
use crate::segment::{Segment, SegmentMode};
use crate::writer::Writer;

/// Builder for a [`Segment`].
///
/// Each method returns the modified builder for chaining. Tracks are added
/// in call-independent order: video first, so a configured video track is
/// always track 1.
pub struct SegmentBuilder<W> {
    writer: W,
    mode: SegmentMode,
    video: Option<(u64, u64)>,
    audio: Option<(f64, u64)>,
    timecode_scale: Option<u64>,
    max_cluster_duration: u64,
    max_cluster_size: u64,
    output_cues: bool,
    writing_app: Option<String>,
}

impl<W: Writer> SegmentBuilder<W> {
    /// Creates a builder writing into `writer`, in file mode.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            mode: SegmentMode::File,
            video: None,
            audio: None,
            timecode_scale: None,
            max_cluster_duration: 0,
            max_cluster_size: 0,
            output_cues: true,
            writing_app: None,
        }
    }

    /// Selects file or live mode. Live mode never seeks back.
    pub fn mode(mut self, mode: SegmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Configures a VP8 video track.
    pub fn video(mut self, width: u64, height: u64) -> Self {
        self.video = Some((width, height));
        self
    }

    /// Configures a Vorbis audio track.
    pub fn audio(mut self, sample_rate: f64, channels: u64) -> Self {
        self.audio = Some((sample_rate, channels));
        self
    }

    /// Overrides the default 1 ms timecode scale (nanoseconds per tick).
    pub fn timecode_scale(mut self, scale: u64) -> Self {
        self.timecode_scale = Some(scale);
        self
    }

    /// Caps cluster spans at `nanoseconds`; 0 (the default) disables it.
    pub fn max_cluster_duration(mut self, nanoseconds: u64) -> Self {
        self.max_cluster_duration = nanoseconds;
        self
    }

    /// Caps cluster payloads at `bytes`; 0 (the default) disables it.
    pub fn max_cluster_size(mut self, bytes: u64) -> Self {
        self.max_cluster_size = bytes;
        self
    }

    /// Turns the Cues index on or off. Defaults to on.
    pub fn output_cues(mut self, output_cues: bool) -> Self {
        self.output_cues = output_cues;
        self
    }

    /// Overrides the WritingApp string embedded in SegmentInfo.
    pub fn writing_app(mut self, app: impl Into<String>) -> Self {
        self.writing_app = Some(app.into());
        self
    }

    /// Produces the configured [`Segment`].
    ///
    /// # Errors
    ///
    /// Fails with [`MuxError::NoTracks`] when neither a video nor an audio
    /// track was configured.
    pub fn build(self) -> Result<Segment<W>> {
        if self.video.is_none() && self.audio.is_none() {
            return Err(MuxError::NoTracks);
        }

        let mut segment = Segment::with_mode(self.writer, self.mode);
        if let Some(scale) = self.timecode_scale {
            segment.set_timecode_scale(scale)?;
        }
        if let Some(app) = self.writing_app {
            segment.set_writing_app(app)?;
        }
        if let Some((width, height)) = self.video {
            segment.add_video_track(width, height)?;
        }
        if let Some((sample_rate, channels)) = self.audio {
            segment.add_audio_track(sample_rate, channels)?;
        }
        segment.set_max_cluster_duration(self.max_cluster_duration);
        segment.set_max_cluster_size(self.max_cluster_size);
        segment.set_output_cues(self.output_cues);
        Ok(segment)
    }
}
