//! EBML serialization primitives.
//!
//! Every writer in this module has a size predictor next to it that returns
//! exactly the number of bytes the writer will emit for identical arguments.
//! Upper layers rely on this to declare master-element payload sizes before
//! any child is serialized, so the two must never drift; composite writers
//! assert the contract against a saved start position after every master.

use crate::element_id::*;
use crate::error::Result;
use crate::writer::Writer;

/// The 8-byte var-int pattern meaning "size unknown". Written into reserved
/// size slots and left in place when the sink cannot seek.
pub(crate) const UNKNOWN_SIZE: u64 = 0x01FF_FFFF_FFFF_FFFF;

/// Bytes needed to store `value` as a plain big-endian unsigned integer.
pub(crate) fn uint_size(value: u64) -> u64 {
    let mut size = 1;
    let mut rest = value >> 8;
    while rest > 0 {
        size += 1;
        rest >>= 8;
    }
    size
}

/// Bytes needed to store `value` as an EBML var-int.
///
/// The comparison is strict: the all-ones payload of each width is reserved
/// for the "unknown size" marker, so e.g. 0x7F already needs two bytes.
pub(crate) fn coded_size(value: u64) -> u64 {
    let mut width = 1u64;
    while width < 8 {
        if value < (1u64 << (7 * width)) - 1 {
            return width;
        }
        width += 1;
    }
    8
}

/// Bytes occupied by an element ID. IDs carry their own length marker and
/// are serialized verbatim.
pub(crate) fn id_size(id: u32) -> u64 {
    uint_size(id as u64)
}

/// Total size of an unsigned-integer element (ID + size field + payload).
pub(crate) fn uint_element_size(id: u32, value: u64) -> u64 {
    let payload = uint_size(value);
    id_size(id) + coded_size(payload) + payload
}

/// Total size of a float element. Floats are always stored as 4-byte
/// IEEE-754 big-endian.
pub(crate) fn float_element_size(id: u32) -> u64 {
    id_size(id) + 1 + 4
}

/// Total size of a UTF-8 string element (no terminator on the wire).
pub(crate) fn str_element_size(id: u32, value: &str) -> u64 {
    let payload = value.len() as u64;
    id_size(id) + coded_size(payload) + payload
}

/// Total size of a binary element.
pub(crate) fn bin_element_size(id: u32, value: &[u8]) -> u64 {
    let payload = value.len() as u64;
    id_size(id) + coded_size(payload) + payload
}

/// Header size of a master element: the ID plus the minimal var-int
/// encoding of `payload_size`. The payload itself is not included.
pub(crate) fn master_size(id: u32, payload_size: u64) -> u64 {
    id_size(id) + coded_size(payload_size)
}

/// Writes `width` big-endian bytes of `value`, most significant first.
pub(crate) fn serialize_int<W: Writer>(w: &mut W, value: u64, width: u64) -> Result<()> {
    debug_assert!((1..=8).contains(&width));
    let bytes = value.to_be_bytes();
    w.write(&bytes[(8 - width as usize)..])
}

/// Writes `value` as an EBML var-int of exactly `width` bytes: the length
/// marker occupies bit `7 * width` and the payload fills the rest.
///
/// Fixed widths are used when reserving slots that will be overwritten
/// later; `width = 8` addresses the full 56-bit size range.
pub(crate) fn write_uint_width<W: Writer>(w: &mut W, value: u64, width: u64) -> Result<()> {
    debug_assert!((1..=8).contains(&width));
    debug_assert!(width == 8 || value < (1u64 << (7 * width)));
    let marked = value | (1u64 << (7 * width));
    serialize_int(w, marked, width)
}

/// Writes `value` as a minimal-width EBML var-int.
pub(crate) fn write_uint<W: Writer>(w: &mut W, value: u64) -> Result<()> {
    write_uint_width(w, value, coded_size(value))
}

/// Writes an element ID verbatim.
pub(crate) fn write_id<W: Writer>(w: &mut W, id: u32) -> Result<()> {
    serialize_int(w, id as u64, id_size(id))
}

/// Writes a complete unsigned-integer element.
pub(crate) fn write_uint_element<W: Writer>(w: &mut W, id: u32, value: u64) -> Result<()> {
    write_id(w, id)?;
    let payload = uint_size(value);
    write_uint(w, payload)?;
    serialize_int(w, value, payload)
}

/// Writes a complete float element (4-byte IEEE-754 big-endian).
pub(crate) fn write_float_element<W: Writer>(w: &mut W, id: u32, value: f32) -> Result<()> {
    write_id(w, id)?;
    write_uint(w, 4)?;
    w.write(&value.to_be_bytes())
}

/// Writes a complete UTF-8 string element.
pub(crate) fn write_str_element<W: Writer>(w: &mut W, id: u32, value: &str) -> Result<()> {
    write_id(w, id)?;
    write_uint(w, value.len() as u64)?;
    w.write(value.as_bytes())
}

/// Writes a complete binary element.
pub(crate) fn write_bin_element<W: Writer>(w: &mut W, id: u32, value: &[u8]) -> Result<()> {
    write_id(w, id)?;
    write_uint(w, value.len() as u64)?;
    w.write(value)
}

/// Writes a master-element header: ID followed by the minimal var-int
/// encoding of `payload_size`. Children follow at the caller's discretion.
pub(crate) fn write_master<W: Writer>(w: &mut W, id: u32, payload_size: u64) -> Result<()> {
    write_id(w, id)?;
    write_uint(w, payload_size)
}

/// Writes a Void element whose total footprint is exactly `total_size`
/// bytes (ID + size field + zeroed content). `total_size` must be >= 2.
///
/// SeekHead uses this to pad reserved regions so that nothing downstream
/// ever shifts.
pub(crate) fn write_void<W: Writer>(w: &mut W, total_size: u64) -> Result<u64> {
    debug_assert!(total_size >= 2);
    // Pick the size-field width that makes the footprint come out exact.
    // Near a var-int boundary this needs a non-minimal width, which is
    // still valid EBML.
    let mut width = 1u64;
    while width < 8 && coded_size(total_size - 1 - width) > width {
        width += 1;
    }
    let content = total_size - 1 - width;
    write_id(w, VOID)?;
    write_uint_width(w, content, width)?;
    const ZEROS: [u8; 64] = [0u8; 64];
    let mut left = content as usize;
    while left > 0 {
        let chunk = left.min(ZEROS.len());
        w.write(&ZEROS[..chunk])?;
        left -= chunk;
    }
    Ok(1 + width + content)
}

/// Writes the EBML document header that opens every WebM stream.
pub(crate) fn write_ebml_header<W: Writer>(w: &mut W) -> Result<()> {
    let mut size = uint_element_size(EBML_VERSION, 1);
    size += uint_element_size(EBML_READ_VERSION, 1);
    size += uint_element_size(EBML_MAX_ID_LENGTH, 4);
    size += uint_element_size(EBML_MAX_SIZE_LENGTH, 8);
    size += str_element_size(DOC_TYPE, "webm");
    size += uint_element_size(DOC_TYPE_VERSION, 2);
    size += uint_element_size(DOC_TYPE_READ_VERSION, 2);

    write_master(w, EBML, size)?;
    write_uint_element(w, EBML_VERSION, 1)?;
    write_uint_element(w, EBML_READ_VERSION, 1)?;
    write_uint_element(w, EBML_MAX_ID_LENGTH, 4)?;
    write_uint_element(w, EBML_MAX_SIZE_LENGTH, 8)?;
    write_str_element(w, DOC_TYPE, "webm")?;
    write_uint_element(w, DOC_TYPE_VERSION, 2)?;
    write_uint_element(w, DOC_TYPE_READ_VERSION, 2)?;
    Ok(())
}
