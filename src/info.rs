//! The SegmentInfo element.

use crate::element_id::*;
use crate::error::Result;
use crate::{assert_invariant, ebml};
use crate::writer::Writer;

const APP_NAME: &str = concat!("webmux-", env!("CARGO_PKG_VERSION"));

/// Stream-level metadata: timecode scale, duration, app strings.
///
/// The duration is unknown while muxing, so file mode writes a placeholder
/// and records its position; [`SegmentInfo::finalize`] overwrites it once
/// the last timestamp is known.
#[derive(Debug)]
pub(crate) struct SegmentInfo {
    /// Nanoseconds per timecode tick.
    timecode_scale: u64,
    /// Duration in ticks; `None` until set, which omits the element.
    duration: Option<f64>,
    muxing_app: String,
    writing_app: String,
    /// Where the Duration element was written, for back-patching.
    duration_pos: Option<u64>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timecode_scale: 1_000_000,
            duration: None,
            muxing_app: APP_NAME.to_string(),
            writing_app: APP_NAME.to_string(),
            duration_pos: None,
        }
    }
}

impl SegmentInfo {
    pub(crate) fn timecode_scale(&self) -> u64 {
        self.timecode_scale
    }

    pub(crate) fn set_timecode_scale(&mut self, scale: u64) {
        self.timecode_scale = scale;
    }

    pub(crate) fn set_duration(&mut self, duration: f64) {
        self.duration = Some(duration);
    }

    pub(crate) fn set_writing_app(&mut self, app: impl Into<String>) {
        self.writing_app = app.into();
    }

    fn payload_size(&self) -> u64 {
        let mut size = ebml::uint_element_size(TIMECODE_SCALE, self.timecode_scale);
        if self.duration.is_some() {
            size += ebml::float_element_size(DURATION);
        }
        size += ebml::str_element_size(MUXING_APP, &self.muxing_app);
        size += ebml::str_element_size(WRITING_APP, &self.writing_app);
        size
    }

    pub(crate) fn write<W: Writer>(&mut self, w: &mut W) -> Result<()> {
        let size = self.payload_size();
        ebml::write_master(w, INFO, size)?;
        let payload_start = w.position();

        ebml::write_uint_element(w, TIMECODE_SCALE, self.timecode_scale)?;
        if let Some(duration) = self.duration {
            // Save for later.
            self.duration_pos = Some(w.position());
            ebml::write_float_element(w, DURATION, duration as f32)?;
        }
        ebml::write_str_element(w, MUXING_APP, &self.muxing_app)?;
        ebml::write_str_element(w, WRITING_APP, &self.writing_app)?;

        assert_invariant!(
            w.position() - payload_start == size,
            "info payload must match its declared size",
            "info::write"
        );
        Ok(())
    }

    /// Overwrites the reserved Duration element with the final value, then
    /// restores the write position. No-op on non-seekable writers and when
    /// no slot was reserved.
    pub(crate) fn finalize<W: Writer>(&self, w: &mut W) -> Result<()> {
        if !w.seekable() {
            return Ok(());
        }
        if let (Some(duration), Some(duration_pos)) = (self.duration, self.duration_pos) {
            let pos = w.position();
            w.set_position(duration_pos)?;
            ebml::write_float_element(w, DURATION, duration as f32)?;
            w.set_position(pos)?;
        }
        Ok(())
    }
}
