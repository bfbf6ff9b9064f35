//! The Segment orchestrator.
//!
//! Owns the track table, SeekHead, SegmentInfo, Cues and the cluster list,
//! and drives the frame pipeline: queueing audio around video keyframes,
//! deciding cluster boundaries, latching cue points and back-patching every
//! reserved size field on finalize.

use crate::cluster::Cluster;
use crate::cues::{CuePoint, Cues};
use crate::element_id::{CLUSTER, CUES, INFO, SEGMENT, TRACKS};
use crate::error::{MuxError, Result};
use crate::info::SegmentInfo;
use crate::seek::SeekHead;
use crate::track::{AudioSettings, Track, TrackKind, Tracks, VideoSettings};
use crate::writer::Writer;
use crate::ebml;

/// File mode back-patches sizes, duration and cues on finalize; live mode
/// streams forward only and leaves every reserved size at the unknown
/// marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentMode {
    #[default]
    File,
    Live,
}

/// Summary counters returned by [`Segment::finalize_with_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentStats {
    pub clusters: u64,
    pub cue_points: u64,
    /// Duration in timecode-scale ticks.
    pub duration_ticks: u64,
    pub bytes_written: u64,
}

/// An audio frame held back until the next video keyframe's timestamp is
/// known. Owns a copy of the caller's bytes.
#[derive(Debug)]
struct QueuedFrame {
    data: Vec<u8>,
    track_number: u64,
    timestamp: u64,
    is_key: bool,
}

/// A muxer for one WebM Segment writing into `W`.
///
/// Tracks are added first, then frames in timestamp order per track;
/// [`Segment::finalize`] closes the stream. All entry points are
/// sequential; the writer is exclusively borrowed for the segment's
/// lifetime.
pub struct Segment<W> {
    writer: W,
    mode: SegmentMode,
    tracks: Tracks,
    seek_head: SeekHead,
    info: SegmentInfo,
    cues: Cues,
    clusters: Vec<Cluster>,
    queued_frames: Vec<QueuedFrame>,
    has_video: bool,
    header_written: bool,
    finalized: bool,
    new_cluster: bool,
    new_cuepoint: bool,
    /// Where the Segment's reserved 8-byte size slot starts.
    size_position: u64,
    /// Start of the Segment payload; SeekHead offsets and cue cluster
    /// positions are relative to this.
    payload_pos: u64,
    /// Nanoseconds; 0 disables the duration boundary.
    max_cluster_duration: u64,
    /// Payload bytes; 0 disables the size boundary.
    max_cluster_size: u64,
    last_timestamp: u64,
    output_cues: bool,
    cues_track: u64,
}

impl<W: Writer> Segment<W> {
    pub fn new(writer: W) -> Self {
        Self::with_mode(writer, SegmentMode::File)
    }

    pub fn with_mode(writer: W, mode: SegmentMode) -> Self {
        Self {
            writer,
            mode,
            tracks: Tracks::default(),
            seek_head: SeekHead::default(),
            info: SegmentInfo::default(),
            cues: Cues::default(),
            clusters: Vec::new(),
            queued_frames: Vec::new(),
            has_video: false,
            header_written: false,
            finalized: false,
            new_cluster: true,
            new_cuepoint: false,
            size_position: 0,
            payload_pos: 0,
            max_cluster_duration: 0,
            max_cluster_size: 0,
            last_timestamp: 0,
            output_cues: true,
            cues_track: 0,
        }
    }

    pub fn mode(&self) -> SegmentMode {
        self.mode
    }

    /// Opens a new cluster once the current one spans at least this many
    /// nanoseconds. 0 turns the boundary off.
    pub fn set_max_cluster_duration(&mut self, nanoseconds: u64) {
        self.max_cluster_duration = nanoseconds;
    }

    /// Opens a new cluster once the current payload reaches this many
    /// bytes. 0 turns the boundary off.
    pub fn set_max_cluster_size(&mut self, bytes: u64) {
        self.max_cluster_size = bytes;
    }

    /// Whether cue points are recorded and a Cues element written.
    pub fn set_output_cues(&mut self, output_cues: bool) {
        self.output_cues = output_cues;
    }

    /// Selects the track the cue points index. Defaults to the first video
    /// track, or track 1 when there is none.
    pub fn set_cues_track(&mut self, track_number: u64) -> Result<()> {
        if self.tracks.get(track_number).is_none() {
            return Err(MuxError::UnknownTrack(track_number));
        }
        self.cues_track = track_number;
        Ok(())
    }

    /// Sets the nanoseconds-per-tick constant. Must be called before the
    /// first frame.
    pub fn set_timecode_scale(&mut self, scale: u64) -> Result<()> {
        if self.header_written {
            return Err(MuxError::HeaderAlreadyWritten);
        }
        self.info.set_timecode_scale(scale);
        Ok(())
    }

    /// Overrides the WritingApp string.
    pub fn set_writing_app(&mut self, app: impl Into<String>) -> Result<()> {
        if self.header_written {
            return Err(MuxError::HeaderAlreadyWritten);
        }
        self.info.set_writing_app(app);
        Ok(())
    }

    /// Adds a VP8 video track and returns its track number.
    pub fn add_video_track(&mut self, width: u64, height: u64) -> Result<u64> {
        if self.header_written {
            return Err(MuxError::HeaderAlreadyWritten);
        }
        let mut track = Track::new(TrackKind::Video(VideoSettings::new(width, height)));
        track.set_codec_id("V_VP8");
        self.has_video = true;
        Ok(self.tracks.add_track(track))
    }

    /// Adds a Vorbis audio track and returns its track number.
    pub fn add_audio_track(&mut self, sample_rate: f64, channels: u64) -> Result<u64> {
        if self.header_written {
            return Err(MuxError::HeaderAlreadyWritten);
        }
        let mut track = Track::new(TrackKind::Audio(AudioSettings::new(sample_rate, channels)));
        track.set_codec_id("A_VORBIS");
        Ok(self.tracks.add_track(track))
    }

    /// Adds a fully caller-configured track and returns its track number.
    pub fn add_track(&mut self, track: Track) -> Result<u64> {
        if self.header_written {
            return Err(MuxError::HeaderAlreadyWritten);
        }
        if track.is_video() {
            self.has_video = true;
        }
        Ok(self.tracks.add_track(track))
    }

    pub fn track(&self, track_number: u64) -> Option<&Track> {
        self.tracks.get(track_number)
    }

    /// Mutable track access for metadata setters (codec private, language,
    /// display size, ...). Tracks freeze once the header is written.
    pub fn track_mut(&mut self, track_number: u64) -> Result<&mut Track> {
        if self.header_written {
            return Err(MuxError::HeaderAlreadyWritten);
        }
        self.tracks
            .get_mut(track_number)
            .ok_or(MuxError::UnknownTrack(track_number))
    }

    /// Adds one compressed frame. `timestamp` is in nanoseconds since the
    /// start of the stream; frames must arrive in timestamp order per
    /// track. The bytes are copied only when the frame has to be queued.
    pub fn add_frame(
        &mut self,
        frame: &[u8],
        track_number: u64,
        timestamp: u64,
        is_key: bool,
    ) -> Result<()> {
        if self.finalized {
            return Err(MuxError::AlreadyFinalized);
        }
        if self.tracks.is_empty() {
            return Err(MuxError::NoTracks);
        }
        if self.tracks.get(track_number).is_none() {
            return Err(MuxError::UnknownTrack(track_number));
        }

        if !self.header_written {
            self.write_segment_header()?;

            self.seek_head
                .add_entry(CLUSTER, self.writer.position() - self.payload_pos);

            if self.output_cues && self.cues_track == 0 {
                let video = self.tracks.iter().find(|t| t.is_video());
                self.cues_track = match video {
                    Some(track) => track.number(),
                    // No video track: index the first track added.
                    None => 1,
                };
            }
        }

        // Audio that temporally surrounds a video keyframe must ship in the
        // same cluster as that keyframe, so on video segments audio is held
        // until the next keyframe's timestamp is known.
        if self.has_video && self.tracks.is_audio(track_number) {
            self.queued_frames.push(QueuedFrame {
                data: frame.to_vec(),
                track_number,
                timestamp,
                is_key,
            });
            return Ok(());
        }

        // Cluster boundary policy. A keyframe on a non-video track does not
        // open a cluster.
        if is_key && self.tracks.is_video(track_number) {
            self.new_cluster = true;
        } else if let Some(cluster) = self.clusters.last() {
            let scale = self.info.timecode_scale();
            let cluster_ts = cluster.timecode() * scale;
            if self.max_cluster_duration > 0
                && timestamp.saturating_sub(cluster_ts) >= self.max_cluster_duration
            {
                self.new_cluster = true;
            } else if self.max_cluster_size > 0
                && cluster.payload_size() >= self.max_cluster_size
            {
                self.new_cluster = true;
            }
        }

        if self.new_cluster {
            // Queued audio that belongs to the closing cluster goes out
            // before the boundary.
            self.write_frames_less_than(timestamp)?;

            let scale = self.info.timecode_scale();
            let mut timecode = timestamp / scale;
            if let Some(first) = self.queued_frames.first() {
                // The cluster opens at the earliest frame it will contain.
                let audio_timecode = first.timestamp / scale;
                if audio_timecode < timecode {
                    timecode = audio_timecode;
                }
            }

            self.clusters
                .push(Cluster::new(timecode, self.writer.position()));

            if self.mode == SegmentMode::File {
                let count = self.clusters.len();
                if count > 1 {
                    if let Some(previous) = self.clusters.get_mut(count - 2) {
                        previous.finalize(&mut self.writer)?;
                    }
                }
                if self.output_cues {
                    self.new_cuepoint = true;
                }
            }

            self.new_cluster = false;
        }

        // Whatever audio is still queued lands in the now-current cluster.
        self.write_frames_all()?;

        let scale = self.info.timecode_scale();
        let cluster = self
            .clusters
            .last_mut()
            .expect("new_cluster starts latched, so a cluster exists here");
        let relative = relative_timecode(timestamp, scale, cluster.timecode())?;

        if self.new_cuepoint && self.cues_track == track_number {
            self.cues.add(CuePoint::new(
                timestamp / scale,
                self.cues_track,
                cluster.position() - self.payload_pos,
                cluster.blocks_added() + 1,
            ));
            self.new_cuepoint = false;
        }

        cluster.add_frame(&mut self.writer, frame, track_number, relative, is_key)?;

        if timestamp > self.last_timestamp {
            self.last_timestamp = timestamp;
        }
        Ok(())
    }

    /// Closes the stream: drains the audio queue, finalizes the last
    /// cluster, patches Duration, writes Cues, back-patches the SeekHead
    /// and the Segment size, and restores the write position. In live mode
    /// only the queue drain happens.
    pub fn finalize(&mut self) -> Result<()> {
        self.finalize_with_stats().map(|_| ())
    }

    /// Like [`Segment::finalize`], returning summary counters.
    pub fn finalize_with_stats(&mut self) -> Result<SegmentStats> {
        if self.finalized {
            return Err(MuxError::AlreadyFinalized);
        }
        if !self.header_written {
            // A frameless segment still yields a valid, clusterless file.
            self.write_segment_header()?;
        }

        if !self.queued_frames.is_empty() && self.clusters.is_empty() {
            // Only queued audio ever arrived; open a cluster for it.
            let scale = self.info.timecode_scale();
            let timecode = self.queued_frames[0].timestamp / scale;
            self.clusters
                .push(Cluster::new(timecode, self.writer.position()));
            if self.mode == SegmentMode::File && self.output_cues {
                self.new_cuepoint = true;
            }
        }
        self.write_frames_all()?;

        if self.mode == SegmentMode::File {
            if let Some(last) = self.clusters.last_mut() {
                last.finalize(&mut self.writer)?;
            }

            let scale = self.info.timecode_scale();
            let duration = self.last_timestamp as f64 / scale as f64;
            self.info.set_duration(duration);
            self.info.finalize(&mut self.writer)?;

            self.seek_head
                .add_entry(CUES, self.writer.position() - self.payload_pos);
            self.cues.write(&mut self.writer)?;

            self.seek_head.finalize(&mut self.writer)?;

            if self.writer.seekable() {
                let pos = self.writer.position();
                // -8 for the size slot itself.
                let segment_size = pos - self.size_position - 8;
                self.writer.set_position(self.size_position)?;
                ebml::write_uint_width(&mut self.writer, segment_size, 8)?;
                self.writer.set_position(pos)?;
            }
        }

        self.finalized = true;
        Ok(SegmentStats {
            clusters: self.clusters.len() as u64,
            cue_points: self.cues.len() as u64,
            duration_ticks: self.last_timestamp / self.info.timecode_scale(),
            bytes_written: self.writer.position(),
        })
    }

    /// Returns the underlying writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn write_segment_header(&mut self) -> Result<()> {
        ebml::write_ebml_header(&mut self.writer)?;

        ebml::serialize_int(&mut self.writer, SEGMENT as u64, 4)?;

        // Save for later; the payload size is unknown until finalize.
        self.size_position = self.writer.position();
        ebml::serialize_int(&mut self.writer, ebml::UNKNOWN_SIZE, 8)?;

        self.payload_pos = self.writer.position();

        if self.mode == SegmentMode::File && self.writer.seekable() {
            // Reserve the Duration slot now so finalize can patch it, and
            // the SeekHead region ahead of Info/Tracks.
            self.info.set_duration(1.0);
            self.seek_head.write(&mut self.writer)?;
        }

        self.seek_head
            .add_entry(INFO, self.writer.position() - self.payload_pos);
        self.info.write(&mut self.writer)?;

        self.seek_head
            .add_entry(TRACKS, self.writer.position() - self.payload_pos);
        self.tracks.write(&mut self.writer)?;

        self.header_written = true;
        Ok(())
    }

    /// Drains the whole audio queue into the current cluster, emitting the
    /// pending cue point if one of the queued frames is on the cue track.
    fn write_frames_all(&mut self) -> Result<()> {
        if self.queued_frames.is_empty() {
            return Ok(());
        }
        let Some(cluster) = self.clusters.last_mut() else {
            return Ok(());
        };
        let scale = self.info.timecode_scale();

        for frame in self.queued_frames.drain(..) {
            let relative = relative_timecode(frame.timestamp, scale, cluster.timecode())?;

            if self.new_cuepoint && self.cues_track == frame.track_number {
                self.cues.add(CuePoint::new(
                    frame.timestamp / scale,
                    self.cues_track,
                    cluster.position() - self.payload_pos,
                    cluster.blocks_added() + 1,
                ));
                self.new_cuepoint = false;
            }

            cluster.add_frame(
                &mut self.writer,
                &frame.data,
                frame.track_number,
                relative,
                frame.is_key,
            )?;

            if frame.timestamp > self.last_timestamp {
                self.last_timestamp = frame.timestamp;
            }
        }
        Ok(())
    }

    /// Flushes leading queued frames into the *current* cluster before a
    /// boundary at `timestamp`.
    ///
    /// A queued frame is flushed only when the frame after it has a
    /// timestamp at or below the boundary; the tail frame therefore always
    /// stays queued (its end time might cross into the new cluster) and is
    /// written by [`Segment::write_frames_all`] after the boundary.
    fn write_frames_less_than(&mut self, timestamp: u64) -> Result<()> {
        if self.queued_frames.is_empty() {
            return Ok(());
        }
        let Some(cluster) = self.clusters.last_mut() else {
            // No open cluster yet; everything queued belongs to the first
            // cluster and is flushed after it is allocated.
            return Ok(());
        };
        let scale = self.info.timecode_scale();

        let mut flushed = 0;
        for i in 1..self.queued_frames.len() {
            if self.queued_frames[i].timestamp > timestamp {
                break;
            }
            let frame = &self.queued_frames[i - 1];
            let relative = relative_timecode(frame.timestamp, scale, cluster.timecode())?;

            if self.new_cuepoint && self.cues_track == frame.track_number {
                self.cues.add(CuePoint::new(
                    frame.timestamp / scale,
                    self.cues_track,
                    cluster.position() - self.payload_pos,
                    cluster.blocks_added() + 1,
                ));
                self.new_cuepoint = false;
            }

            cluster.add_frame(
                &mut self.writer,
                &frame.data,
                frame.track_number,
                relative,
                frame.is_key,
            )?;

            if frame.timestamp > self.last_timestamp {
                self.last_timestamp = frame.timestamp;
            }
            flushed += 1;
        }

        self.queued_frames.drain(..flushed);
        Ok(())
    }
}

/// Converts an absolute timestamp to a cluster-relative timecode, checking
/// the signed 16-bit SimpleBlock range.
fn relative_timecode(timestamp: u64, scale: u64, cluster_timecode: u64) -> Result<i16> {
    let timecode = (timestamp / scale) as i64 - cluster_timecode as i64;
    i16::try_from(timecode).map_err(|_| MuxError::RelativeTimecodeOutOfRange {
        timecode,
        cluster_timecode,
    })
}
