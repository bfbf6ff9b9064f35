//! The SeekHead directory.
//!
//! A fixed-capacity table of (element ID, offset) pairs near the start of
//! the Segment. Space for the worst-case encoding of every entry is
//! reserved as a Void element up front; finalize seeks back, writes the
//! real SeekHead and pads the tail with another Void so the Info/Tracks
//! that follow never move.

use crate::element_id::*;
use crate::error::Result;
use crate::ebml;
use crate::writer::Writer;

const SEEK_ENTRY_COUNT: usize = 4;

#[derive(Debug)]
pub(crate) struct SeekHead {
    /// Element IDs per slot; 0 marks an unused slot.
    entry_ids: [u32; SEEK_ENTRY_COUNT],
    /// Offsets from the start of the Segment payload.
    entry_positions: [u64; SEEK_ENTRY_COUNT],
    /// Where the reserved region starts.
    start_pos: Option<u64>,
}

impl Default for SeekHead {
    fn default() -> Self {
        Self {
            entry_ids: [0; SEEK_ENTRY_COUNT],
            entry_positions: [0; SEEK_ENTRY_COUNT],
            start_pos: None,
        }
    }
}

impl SeekHead {
    /// Records `id` at offset `pos` in the first free slot. Returns false
    /// when all slots are taken.
    pub(crate) fn add_entry(&mut self, id: u32, pos: u64) -> bool {
        for i in 0..SEEK_ENTRY_COUNT {
            if self.entry_ids[i] == 0 {
                self.entry_ids[i] = id;
                self.entry_positions[i] = pos;
                return true;
            }
        }
        false
    }

    /// Reserves the full worst-case footprint as a single Void element.
    pub(crate) fn write<W: Writer>(&mut self, w: &mut W) -> Result<()> {
        self.start_pos = Some(w.position());
        ebml::write_void(w, self.reserved_size())?;
        Ok(())
    }

    /// Seeks back to the reserved region, writes the populated entries and
    /// pads the remainder so the footprint stays exactly as reserved.
    /// No-op on non-seekable writers or when nothing was recorded.
    pub(crate) fn finalize<W: Writer>(&self, w: &mut W) -> Result<()> {
        if !w.seekable() {
            return Ok(());
        }
        let Some(start_pos) = self.start_pos else {
            return Ok(());
        };

        let mut entry_sizes = [0u64; SEEK_ENTRY_COUNT];
        let mut payload_size = 0u64;
        for i in 0..SEEK_ENTRY_COUNT {
            if self.entry_ids[i] != 0 {
                entry_sizes[i] = ebml::uint_element_size(SEEK_ID, self.entry_ids[i] as u64)
                    + ebml::uint_element_size(SEEK_POSITION, self.entry_positions[i]);
                payload_size += ebml::master_size(SEEK, entry_sizes[i]) + entry_sizes[i];
            }
        }
        if payload_size == 0 {
            return Ok(());
        }

        // The tail Void needs at least two bytes; widen the size field when
        // the leftover would be exactly one.
        let reserved = self.reserved_size();
        let mut size_width = ebml::coded_size(payload_size);
        let header = ebml::id_size(SEEK_HEAD) + size_width;
        if reserved - (header + payload_size) == 1 {
            size_width += 1;
        }

        let pos = w.position();
        w.set_position(start_pos)?;

        ebml::write_id(w, SEEK_HEAD)?;
        ebml::write_uint_width(w, payload_size, size_width)?;
        for i in 0..SEEK_ENTRY_COUNT {
            if self.entry_ids[i] != 0 {
                ebml::write_master(w, SEEK, entry_sizes[i])?;
                ebml::write_uint_element(w, SEEK_ID, self.entry_ids[i] as u64)?;
                ebml::write_uint_element(w, SEEK_POSITION, self.entry_positions[i])?;
            }
        }

        let size_left = reserved - (w.position() - start_pos);
        if size_left > 0 {
            ebml::write_void(w, size_left)?;
        }

        w.set_position(pos)?;
        Ok(())
    }

    /// Worst-case footprint: header plus `SEEK_ENTRY_COUNT` maximal entries.
    fn reserved_size(&self) -> u64 {
        let entry_space = SEEK_ENTRY_COUNT as u64 * Self::max_entry_size();
        ebml::master_size(SEEK_HEAD, entry_space) + entry_space
    }

    /// Size of one Seek entry with a 4-byte ID and an 8-byte position.
    fn max_entry_size() -> u64 {
        let max_payload = ebml::uint_element_size(SEEK_ID, 0xFFFF_FFFF)
            + ebml::uint_element_size(SEEK_POSITION, u64::MAX);
        ebml::master_size(SEEK, max_payload) + max_payload
    }
}
