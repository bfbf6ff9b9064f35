//! The track model: common metadata plus a video- or audio-specific payload.
//!
//! The wire format's TrackEntry is polymorphic; here that is a tagged
//! variant ([`TrackKind`]) whose `size`/`write` dispatch appends the
//! type-specific sub-master after the shared fields. The TrackEntry
//! master size declared up front covers the variant additions.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::element_id::*;
use crate::error::{MuxError, Result};
use crate::{assert_invariant, ebml};
use crate::writer::Writer;

/// Matroska track type discriminants.
pub const VIDEO_TRACK_TYPE: u64 = 1;
pub const AUDIO_TRACK_TYPE: u64 = 2;

// Track UIDs only need to be unique within a segment; a process-wide
// wall-clock-seeded non-crypto generator is sufficient and matches common
// muxer practice. Reseedable so tests get reproducible output.
static UID_RNG: Lazy<Mutex<SmallRng>> = Lazy::new(|| {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    Mutex::new(SmallRng::seed_from_u64(seed))
});

/// Reseeds the process-global UID generator. Intended for tests that need
/// byte-identical output across runs.
pub fn reseed_uid_rng(seed: u64) {
    let mut rng = UID_RNG.lock().unwrap_or_else(|e| e.into_inner());
    *rng = SmallRng::seed_from_u64(seed);
}

/// Builds a 56-bit track UID: seven bytes of `(rand >> 4) & 0xFF`. The top
/// byte stays zero so the value never resembles an EBML length marker.
fn make_uid() -> u64 {
    let mut rng = UID_RNG.lock().unwrap_or_else(|e| e.into_inner());
    let mut uid: u64 = 0;
    for _ in 0..7 {
        uid <<= 8;
        // Throw away the low-order bits.
        uid |= u64::from((rng.gen::<u32>() >> 4) & 0xFF);
    }
    uid
}

/// Video-specific track settings, serialized as the Video sub-master.
#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub pixel_width: u64,
    pub pixel_height: u64,
    pub display_width: Option<u64>,
    pub display_height: Option<u64>,
    pub frame_rate: Option<f64>,
    stereo_mode: Option<u64>,
}

impl VideoSettings {
    pub fn new(pixel_width: u64, pixel_height: u64) -> Self {
        Self {
            pixel_width,
            pixel_height,
            display_width: None,
            display_height: None,
            frame_rate: None,
            stereo_mode: None,
        }
    }

    /// Sets the stereo mode. Only 0 (mono), 1 (side-by-side), 2 (top-bottom),
    /// 3 (top-bottom right-eye-first) and 11 (side-by-side right-eye-first)
    /// are valid in WebM.
    pub fn set_stereo_mode(&mut self, stereo_mode: u64) -> Result<()> {
        match stereo_mode {
            0 | 1 | 2 | 3 | 11 => {
                self.stereo_mode = Some(stereo_mode);
                Ok(())
            }
            other => Err(MuxError::UnsupportedStereoMode(other)),
        }
    }

    pub fn stereo_mode(&self) -> Option<u64> {
        self.stereo_mode
    }

    fn payload_size(&self) -> u64 {
        let mut size = ebml::uint_element_size(PIXEL_WIDTH, self.pixel_width);
        size += ebml::uint_element_size(PIXEL_HEIGHT, self.pixel_height);
        if let Some(display_width) = self.display_width {
            size += ebml::uint_element_size(DISPLAY_WIDTH, display_width);
        }
        if let Some(display_height) = self.display_height {
            size += ebml::uint_element_size(DISPLAY_HEIGHT, display_height);
        }
        if let Some(stereo_mode) = self.stereo_mode {
            size += ebml::uint_element_size(STEREO_MODE, stereo_mode);
        }
        if self.frame_rate.is_some() {
            size += ebml::float_element_size(FRAME_RATE);
        }
        size
    }

    fn write<W: Writer>(&self, w: &mut W) -> Result<()> {
        let size = self.payload_size();
        ebml::write_master(w, VIDEO, size)?;
        let payload_start = w.position();

        ebml::write_uint_element(w, PIXEL_WIDTH, self.pixel_width)?;
        ebml::write_uint_element(w, PIXEL_HEIGHT, self.pixel_height)?;
        if let Some(display_width) = self.display_width {
            ebml::write_uint_element(w, DISPLAY_WIDTH, display_width)?;
        }
        if let Some(display_height) = self.display_height {
            ebml::write_uint_element(w, DISPLAY_HEIGHT, display_height)?;
        }
        if let Some(stereo_mode) = self.stereo_mode {
            ebml::write_uint_element(w, STEREO_MODE, stereo_mode)?;
        }
        if let Some(frame_rate) = self.frame_rate {
            ebml::write_float_element(w, FRAME_RATE, frame_rate as f32)?;
        }

        assert_invariant!(
            w.position() - payload_start == size,
            "video settings payload must match its declared size",
            "track::video"
        );
        Ok(())
    }
}

/// Audio-specific track settings, serialized as the Audio sub-master.
#[derive(Debug, Clone)]
pub struct AudioSettings {
    /// Sample rate in Hz, stored as a 4-byte float on the wire.
    pub sample_rate: f64,
    pub channels: u64,
    pub bit_depth: Option<u64>,
}

impl AudioSettings {
    pub fn new(sample_rate: f64, channels: u64) -> Self {
        Self {
            sample_rate,
            channels,
            bit_depth: None,
        }
    }

    fn payload_size(&self) -> u64 {
        let mut size = ebml::float_element_size(SAMPLING_FREQUENCY);
        size += ebml::uint_element_size(CHANNELS, self.channels);
        if let Some(bit_depth) = self.bit_depth {
            size += ebml::uint_element_size(BIT_DEPTH, bit_depth);
        }
        size
    }

    fn write<W: Writer>(&self, w: &mut W) -> Result<()> {
        let size = self.payload_size();
        ebml::write_master(w, AUDIO, size)?;
        let payload_start = w.position();

        ebml::write_float_element(w, SAMPLING_FREQUENCY, self.sample_rate as f32)?;
        ebml::write_uint_element(w, CHANNELS, self.channels)?;
        if let Some(bit_depth) = self.bit_depth {
            ebml::write_uint_element(w, BIT_DEPTH, bit_depth)?;
        }

        assert_invariant!(
            w.position() - payload_start == size,
            "audio settings payload must match its declared size",
            "track::audio"
        );
        Ok(())
    }
}

/// Type-specific half of a track.
#[derive(Debug, Clone)]
pub enum TrackKind {
    Video(VideoSettings),
    Audio(AudioSettings),
}

impl TrackKind {
    fn track_type(&self) -> u64 {
        match self {
            TrackKind::Video(_) => VIDEO_TRACK_TYPE,
            TrackKind::Audio(_) => AUDIO_TRACK_TYPE,
        }
    }

    fn size(&self) -> u64 {
        let payload = match self {
            TrackKind::Video(video) => video.payload_size(),
            TrackKind::Audio(audio) => audio.payload_size(),
        };
        let id = match self {
            TrackKind::Video(_) => VIDEO,
            TrackKind::Audio(_) => AUDIO,
        };
        ebml::master_size(id, payload) + payload
    }

    fn write<W: Writer>(&self, w: &mut W) -> Result<()> {
        match self {
            TrackKind::Video(video) => video.write(w),
            TrackKind::Audio(audio) => audio.write(w),
        }
    }
}

/// One TrackEntry: shared metadata plus the [`TrackKind`] payload.
///
/// The number is assigned when the track is added to a segment and equals
/// its 1-based insertion index.
#[derive(Debug, Clone)]
pub struct Track {
    number: u64,
    uid: u64,
    kind: TrackKind,
    codec_id: Option<String>,
    codec_private: Option<Vec<u8>>,
    language: Option<String>,
    name: Option<String>,
}

impl Track {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            number: 0,
            uid: make_uid(),
            kind,
            codec_id: None,
            codec_private: None,
            language: None,
            name: None,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub(crate) fn set_number(&mut self, number: u64) {
        self.number = number;
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, TrackKind::Video(_))
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, TrackKind::Audio(_))
    }

    pub fn video_mut(&mut self) -> Option<&mut VideoSettings> {
        match &mut self.kind {
            TrackKind::Video(video) => Some(video),
            TrackKind::Audio(_) => None,
        }
    }

    pub fn audio_mut(&mut self) -> Option<&mut AudioSettings> {
        match &mut self.kind {
            TrackKind::Audio(audio) => Some(audio),
            TrackKind::Video(_) => None,
        }
    }

    pub fn set_codec_id(&mut self, codec_id: impl Into<String>) {
        self.codec_id = Some(codec_id.into());
    }

    pub fn codec_id(&self) -> Option<&str> {
        self.codec_id.as_deref()
    }

    pub fn set_codec_private(&mut self, codec_private: impl Into<Vec<u8>>) {
        self.codec_private = Some(codec_private.into());
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = Some(language.into());
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    fn payload_size(&self) -> u64 {
        let mut size = ebml::uint_element_size(TRACK_NUMBER, self.number);
        size += ebml::uint_element_size(TRACK_UID, self.uid);
        size += ebml::uint_element_size(TRACK_TYPE, self.kind.track_type());
        if let Some(codec_id) = &self.codec_id {
            size += ebml::str_element_size(CODEC_ID, codec_id);
        }
        if let Some(codec_private) = &self.codec_private {
            size += ebml::bin_element_size(CODEC_PRIVATE, codec_private);
        }
        if let Some(language) = &self.language {
            size += ebml::str_element_size(LANGUAGE, language);
        }
        if let Some(name) = &self.name {
            size += ebml::str_element_size(NAME, name);
        }
        size + self.kind.size()
    }

    /// Full TrackEntry size including its master header.
    pub(crate) fn size(&self) -> u64 {
        let payload = self.payload_size();
        ebml::master_size(TRACK_ENTRY, payload) + payload
    }

    pub(crate) fn write<W: Writer>(&self, w: &mut W) -> Result<()> {
        let size = self.payload_size();
        ebml::write_master(w, TRACK_ENTRY, size)?;
        let payload_start = w.position();

        ebml::write_uint_element(w, TRACK_NUMBER, self.number)?;
        ebml::write_uint_element(w, TRACK_UID, self.uid)?;
        ebml::write_uint_element(w, TRACK_TYPE, self.kind.track_type())?;
        if let Some(codec_id) = &self.codec_id {
            ebml::write_str_element(w, CODEC_ID, codec_id)?;
        }
        if let Some(codec_private) = &self.codec_private {
            ebml::write_bin_element(w, CODEC_PRIVATE, codec_private)?;
        }
        if let Some(language) = &self.language {
            ebml::write_str_element(w, LANGUAGE, language)?;
        }
        if let Some(name) = &self.name {
            ebml::write_str_element(w, NAME, name)?;
        }
        self.kind.write(w)?;

        assert_invariant!(
            w.position() - payload_start == size,
            "track entry payload must match its declared size",
            "track::write"
        );
        Ok(())
    }
}

/// The segment's track table.
#[derive(Debug, Default)]
pub(crate) struct Tracks {
    entries: Vec<Track>,
}

impl Tracks {
    pub(crate) fn add_track(&mut self, mut track: Track) -> u64 {
        let number = self.entries.len() as u64 + 1;
        track.set_number(number);
        self.entries.push(track);
        number
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, number: u64) -> Option<&Track> {
        self.entries.iter().find(|t| t.number() == number)
    }

    pub(crate) fn get_mut(&mut self, number: u64) -> Option<&mut Track> {
        self.entries.iter_mut().find(|t| t.number() == number)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Track> {
        self.entries.iter()
    }

    pub(crate) fn is_audio(&self, number: u64) -> bool {
        self.get(number).map(Track::is_audio).unwrap_or(false)
    }

    pub(crate) fn is_video(&self, number: u64) -> bool {
        self.get(number).map(Track::is_video).unwrap_or(false)
    }

    pub(crate) fn write<W: Writer>(&self, w: &mut W) -> Result<()> {
        let size: u64 = self.entries.iter().map(Track::size).sum();
        ebml::write_master(w, TRACKS, size)?;
        let payload_start = w.position();

        for track in &self.entries {
            track.write(w)?;
        }

        assert_invariant!(
            w.position() - payload_start == size,
            "tracks payload must match its declared size",
            "tracks::write"
        );
        Ok(())
    }
}
