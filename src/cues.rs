//! The Cues index: one seek target per cluster/track pair.

use crate::element_id::*;
use crate::error::Result;
use crate::{assert_invariant, ebml};
use crate::writer::Writer;

/// One index entry pointing a (time, track) pair at a cluster.
#[derive(Debug, Clone)]
pub(crate) struct CuePoint {
    /// In timecode-scale units.
    time: u64,
    track: u64,
    /// Offset of the cluster's ID byte from the Segment payload start.
    cluster_pos: u64,
    /// 1-based block index within the cluster.
    block_number: u64,
    output_block_number: bool,
}

impl CuePoint {
    pub(crate) fn new(time: u64, track: u64, cluster_pos: u64, block_number: u64) -> Self {
        Self {
            time,
            track,
            cluster_pos,
            block_number,
            output_block_number: true,
        }
    }

    fn track_positions_payload(&self) -> u64 {
        let mut size = ebml::uint_element_size(CUE_TRACK, self.track);
        size += ebml::uint_element_size(CUE_CLUSTER_POSITION, self.cluster_pos);
        if self.output_block_number && self.block_number > 1 {
            size += ebml::uint_element_size(CUE_BLOCK_NUMBER, self.block_number);
        }
        size
    }

    fn payload_size(&self) -> u64 {
        let track_pos = self.track_positions_payload();
        ebml::uint_element_size(CUE_TIME, self.time)
            + ebml::master_size(CUE_TRACK_POSITIONS, track_pos)
            + track_pos
    }

    fn size(&self) -> u64 {
        let payload = self.payload_size();
        ebml::master_size(CUE_POINT, payload) + payload
    }

    fn write<W: Writer>(&self, w: &mut W) -> Result<()> {
        assert_invariant!(
            self.track > 0 && self.cluster_pos > 0,
            "cue points must carry a track and a cluster position",
            "cues::write"
        );

        let payload_size = self.payload_size();
        let track_pos = self.track_positions_payload();

        ebml::write_master(w, CUE_POINT, payload_size)?;
        let payload_start = w.position();

        ebml::write_uint_element(w, CUE_TIME, self.time)?;
        ebml::write_master(w, CUE_TRACK_POSITIONS, track_pos)?;
        ebml::write_uint_element(w, CUE_TRACK, self.track)?;
        ebml::write_uint_element(w, CUE_CLUSTER_POSITION, self.cluster_pos)?;
        if self.output_block_number && self.block_number > 1 {
            ebml::write_uint_element(w, CUE_BLOCK_NUMBER, self.block_number)?;
        }

        assert_invariant!(
            w.position() - payload_start == payload_size,
            "cue point payload must match its declared size",
            "cues::write"
        );
        Ok(())
    }
}

/// Append-only, time-ordered list of cue points, written in one pass at
/// end of stream.
#[derive(Debug)]
pub(crate) struct Cues {
    entries: Vec<CuePoint>,
    output_block_number: bool,
}

impl Default for Cues {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            output_block_number: true,
        }
    }
}

impl Cues {
    pub(crate) fn add(&mut self, mut cue: CuePoint) {
        cue.output_block_number = self.output_block_number;
        self.entries.push(cue);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Omits CueBlockNumber from every entry written afterwards.
    pub(crate) fn set_output_block_number(&mut self, output: bool) {
        self.output_block_number = output;
    }

    pub(crate) fn write<W: Writer>(&self, w: &mut W) -> Result<()> {
        let size: u64 = self.entries.iter().map(CuePoint::size).sum();
        ebml::write_master(w, CUES, size)?;
        let payload_start = w.position();

        for cue in &self.entries {
            cue.write(w)?;
        }

        assert_invariant!(
            w.position() - payload_start == size,
            "cues payload must match its declared size",
            "cues::write"
        );
        Ok(())
    }
}
