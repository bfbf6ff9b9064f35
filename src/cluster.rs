//! Clusters and SimpleBlock serialization.
//!
//! A cluster streams its blocks straight to the sink. Because the payload
//! size is only known once the next cluster begins (or the stream ends),
//! the header reserves an 8-byte size slot that `finalize` overwrites; on
//! non-seekable sinks the slot keeps the "unknown size" marker, which is
//! what live WebM clients expect.

use crate::element_id::*;
use crate::error::{MuxError, Result};
use crate::ebml;
use crate::writer::Writer;

/// Serializes one SimpleBlock: a 4-byte size field (fixed width, for
/// streamability), the one-byte track var-int, the signed 16-bit relative
/// timecode, a flags byte (bit 7 = keyframe) and the frame payload.
/// No lacing. Returns the total element size.
pub(crate) fn write_simple_block<W: Writer>(
    w: &mut W,
    frame: &[u8],
    track_number: u64,
    timecode: i16,
    is_key: bool,
) -> Result<u64> {
    if !(1..=127).contains(&track_number) {
        return Err(MuxError::TrackNumberOutOfRange(track_number));
    }

    ebml::write_id(w, SIMPLE_BLOCK)?;
    let payload_size = frame.len() as u64 + 4;
    ebml::write_uint_width(w, payload_size, 4)?;
    ebml::serialize_int(w, 0x80 | track_number, 1)?;
    w.write(&timecode.to_be_bytes())?;
    let flags: u8 = if is_key { 0x80 } else { 0x00 };
    w.write(&[flags])?;
    w.write(frame)?;

    Ok(ebml::id_size(SIMPLE_BLOCK) + 4 + payload_size)
}

/// A time-bounded container of SimpleBlocks sharing a base timecode.
///
/// Lifecycle: Fresh (allocated) → HeaderWritten (first frame) → Finalized
/// (next cluster begins or the segment ends).
#[derive(Debug)]
pub(crate) struct Cluster {
    /// Base timecode in timecode-scale units.
    timecode: u64,
    /// Writer offset of the Cluster ID byte, for cue positions.
    position: u64,
    finalized: bool,
    header_written: bool,
    payload_size: u64,
    /// Where the reserved 8-byte size slot starts.
    size_position: Option<u64>,
    blocks_added: u64,
}

impl Cluster {
    pub(crate) fn new(timecode: u64, position: u64) -> Self {
        Self {
            timecode,
            position,
            finalized: false,
            header_written: false,
            payload_size: 0,
            size_position: None,
            blocks_added: 0,
        }
    }

    pub(crate) fn timecode(&self) -> u64 {
        self.timecode
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn payload_size(&self) -> u64 {
        self.payload_size
    }

    pub(crate) fn blocks_added(&self) -> u64 {
        self.blocks_added
    }

    /// Appends a frame. `timecode` is relative to the cluster base and the
    /// caller has already checked it fits a signed 16-bit integer.
    pub(crate) fn add_frame<W: Writer>(
        &mut self,
        w: &mut W,
        frame: &[u8],
        track_number: u64,
        timecode: i16,
        is_key: bool,
    ) -> Result<()> {
        if self.finalized {
            return Err(MuxError::ClusterAlreadyFinalized);
        }
        if !self.header_written {
            self.write_header(w)?;
        }

        let element_size = write_simple_block(w, frame, track_number, timecode, is_key)?;
        self.payload_size += element_size;
        self.blocks_added += 1;
        Ok(())
    }

    fn write_header<W: Writer>(&mut self, w: &mut W) -> Result<()> {
        ebml::serialize_int(w, CLUSTER as u64, 4)?;

        // Save for later; the payload size is unknown until the cluster
        // closes, so reserve the full 8-byte var-int range.
        self.size_position = Some(w.position());
        ebml::serialize_int(w, ebml::UNKNOWN_SIZE, 8)?;

        ebml::write_uint_element(w, TIMECODE, self.timecode)?;
        self.payload_size += ebml::uint_element_size(TIMECODE, self.timecode);
        self.header_written = true;
        Ok(())
    }

    /// Overwrites the reserved size slot with the accumulated payload size
    /// and restores the write position. On non-seekable writers the slot
    /// keeps the unknown-size marker. A second finalize fails.
    pub(crate) fn finalize<W: Writer>(&mut self, w: &mut W) -> Result<()> {
        if self.finalized {
            return Err(MuxError::ClusterAlreadyFinalized);
        }

        if w.seekable() {
            if let Some(size_position) = self.size_position {
                let pos = w.position();
                w.set_position(size_position)?;
                ebml::write_uint_width(w, self.payload_size, 8)?;
                w.set_position(pos)?;
            }
        }

        self.finalized = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn simple_block_layout() {
        let mut w = Cursor::new(Vec::new());
        let size = write_simple_block(&mut w, &[0xDE, 0xAD], 2, -3, true).unwrap();
        let bytes = w.into_inner();
        assert_eq!(
            bytes,
            [
                0xA3, // SimpleBlock ID
                0x10, 0x00, 0x00, 0x06, // 4-byte size: payload 2 + 4
                0x82, // track 2 var-int
                0xFF, 0xFD, // relative timecode -3
                0x80, // keyframe flag
                0xDE, 0xAD,
            ]
        );
        assert_eq!(size, bytes.len() as u64);
    }

    #[test]
    fn simple_block_rejects_track_numbers_beyond_one_byte() {
        let mut w = Cursor::new(Vec::new());
        assert!(matches!(
            write_simple_block(&mut w, &[0], 200, 0, false),
            Err(MuxError::TrackNumberOutOfRange(200))
        ));
        assert!(matches!(
            write_simple_block(&mut w, &[0], 0, 0, false),
            Err(MuxError::TrackNumberOutOfRange(0))
        ));
        assert!(w.into_inner().is_empty(), "nothing written on rejection");
    }

    #[test]
    fn header_is_written_on_first_frame_and_patched_on_finalize() {
        let mut w = Cursor::new(Vec::new());
        let mut cluster = Cluster::new(1000, 0);
        cluster.add_frame(&mut w, &[1, 2, 3], 1, 0, true).unwrap();
        cluster.add_frame(&mut w, &[4, 5], 1, 40, false).unwrap();

        {
            let bytes = w.get_ref();
            assert_eq!(&bytes[..4], [0x1F, 0x43, 0xB6, 0x75]);
            assert_eq!(
                &bytes[4..12],
                [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
                "size slot holds the unknown marker until finalize"
            );
            // Timecode element: 0xE7, 2-byte value 1000.
            assert_eq!(&bytes[12..16], [0xE7, 0x82, 0x03, 0xE8]);
        }

        let end = w.position();
        cluster.finalize(&mut w).unwrap();
        assert_eq!(w.position(), end, "write position must be restored");

        let bytes = w.into_inner();
        let expected_payload = bytes.len() as u64 - 12;
        assert_eq!(cluster.payload_size(), expected_payload);
        let mut slot = [0u8; 8];
        slot.copy_from_slice(&bytes[4..12]);
        assert_eq!(
            u64::from_be_bytes(slot),
            (1u64 << 56) | expected_payload,
            "slot is patched with an 8-byte var-int of the payload size"
        );
        assert_eq!(cluster.blocks_added(), 2);
    }

    #[test]
    fn finalize_twice_fails() {
        let mut w = Cursor::new(Vec::new());
        let mut cluster = Cluster::new(0, 0);
        cluster.add_frame(&mut w, &[0], 1, 0, true).unwrap();
        cluster.finalize(&mut w).unwrap();
        assert!(matches!(
            cluster.finalize(&mut w),
            Err(MuxError::ClusterAlreadyFinalized)
        ));
        assert!(matches!(
            cluster.add_frame(&mut w, &[0], 1, 1, false),
            Err(MuxError::ClusterAlreadyFinalized)
        ));
    }

    #[test]
    fn non_seekable_sink_keeps_unknown_size() {
        use crate::writer::StreamWriter;
        let mut w = StreamWriter::new(Vec::new());
        let mut cluster = Cluster::new(0, 0);
        cluster.add_frame(&mut w, &[9], 1, 0, true).unwrap();
        cluster.finalize(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(&bytes[4..12], [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
