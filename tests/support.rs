use std::sync::{Arc, Mutex};

use webmux::error::{MuxError, Result};
use webmux::Writer;

/// Thread-safe capturing sink that implements the muxer's writer contract,
/// with overwrite-at-position semantics so back-patching is observable.
pub struct SharedSink {
    inner: Arc<Mutex<Vec<u8>>>,
    pos: u64,
    seekable: bool,
}

impl SharedSink {
    /// A seekable sink plus a handle to the stored bytes.
    #[allow(dead_code)]
    pub fn seekable() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let inner = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner: inner.clone(),
                pos: 0,
                seekable: true,
            },
            inner,
        )
    }

    /// A forward-only sink plus a handle to the stored bytes.
    #[allow(dead_code)]
    pub fn streaming() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let inner = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner: inner.clone(),
                pos: 0,
                seekable: false,
            },
            inner,
        )
    }
}

impl Writer for SharedSink {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let pos = self.pos as usize;
        if pos + buf.len() > guard.len() {
            guard.resize(pos + buf.len(), 0);
        }
        guard[pos..pos + buf.len()].copy_from_slice(buf);
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        if !self.seekable {
            return Err(MuxError::NotSeekable);
        }
        self.pos = pos;
        Ok(())
    }

    fn seekable(&self) -> bool {
        self.seekable
    }
}

/// One parsed EBML element: ID (with its length marker), declared size
/// (`None` for the unknown-size pattern) and payload location.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub id: u64,
    pub size: Option<u64>,
    /// Offset of the element's first ID byte.
    pub offset: usize,
    /// Offset of the first payload byte.
    pub data_offset: usize,
}

#[allow(dead_code)]
impl Element {
    pub fn data_end(&self, total_len: usize) -> usize {
        match self.size {
            Some(size) => self.data_offset + size as usize,
            None => total_len,
        }
    }

    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.data_offset..self.data_end(data.len())]
    }
}

/// Parses the element starting at `offset`.
#[allow(dead_code)]
pub fn parse_element(data: &[u8], offset: usize) -> Element {
    let first = data[offset];
    let id_len = match first {
        b if b & 0x80 == 0x80 => 1,
        b if b & 0xC0 == 0x40 => 2,
        b if b & 0xE0 == 0x20 => 3,
        b if b & 0xF0 == 0x10 => 4,
        b => panic!("invalid EBML ID byte {:#04x} at offset {}", b, offset),
    };
    let mut id = 0u64;
    for i in 0..id_len {
        id = (id << 8) | u64::from(data[offset + i]);
    }

    let size_offset = offset + id_len;
    let size_first = data[size_offset];
    let size_len = size_first.leading_zeros() as usize + 1;
    assert!(
        (1..=8).contains(&size_len),
        "invalid EBML size byte {:#04x} at offset {}",
        size_first,
        size_offset
    );
    let mut size = u64::from(size_first) & (0xFFu64 >> size_len);
    let mut all_ones = size == (0xFFu64 >> size_len);
    for i in 1..size_len {
        let byte = data[size_offset + i];
        all_ones &= byte == 0xFF;
        size = (size << 8) | u64::from(byte);
    }

    Element {
        id,
        size: if all_ones { None } else { Some(size) },
        offset,
        data_offset: size_offset + size_len,
    }
}

/// Sequentially parses sibling elements in `data[start..end]`.
///
/// An unknown-size element (only Segment and Cluster in this muxer's
/// output) swallows the rest of the range.
#[allow(dead_code)]
pub fn parse_siblings(data: &[u8], start: usize, end: usize) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let element = parse_element(data, cursor);
        cursor = element.data_end(end);
        elements.push(element);
    }
    elements
}

/// The direct children of a master element.
#[allow(dead_code)]
pub fn children(data: &[u8], parent: &Element) -> Vec<Element> {
    parse_siblings(data, parent.data_offset, parent.data_end(data.len()))
}

/// The first direct child with the given ID, if any.
#[allow(dead_code)]
pub fn find_child(data: &[u8], parent: &Element, id: u64) -> Option<Element> {
    children(data, parent).into_iter().find(|e| e.id == id)
}

/// All direct children with the given ID.
#[allow(dead_code)]
pub fn find_children(data: &[u8], parent: &Element, id: u64) -> Vec<Element> {
    children(data, parent)
        .into_iter()
        .filter(|e| e.id == id)
        .collect()
}

/// Reads an unsigned-integer element payload.
#[allow(dead_code)]
pub fn read_uint(data: &[u8], element: &Element) -> u64 {
    element
        .payload(data)
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Reads a 4-byte float element payload.
#[allow(dead_code)]
pub fn read_float(data: &[u8], element: &Element) -> f32 {
    let payload = element.payload(data);
    f32::from_be_bytes(payload.try_into().expect("4-byte float payload"))
}

/// Reads a string element payload.
#[allow(dead_code)]
pub fn read_string(data: &[u8], element: &Element) -> String {
    String::from_utf8(element.payload(data).to_vec()).expect("valid UTF-8")
}

// Element IDs the tests care about.
#[allow(dead_code)]
pub mod id {
    pub const EBML: u64 = 0x1A45DFA3;
    pub const DOC_TYPE: u64 = 0x4282;
    pub const SEGMENT: u64 = 0x18538067;
    pub const SEEK_HEAD: u64 = 0x114D9B74;
    pub const SEEK: u64 = 0x4DBB;
    pub const SEEK_ID: u64 = 0x53AB;
    pub const SEEK_POSITION: u64 = 0x53AC;
    pub const VOID: u64 = 0xEC;
    pub const INFO: u64 = 0x1549A966;
    pub const TIMECODE_SCALE: u64 = 0x2AD7B1;
    pub const DURATION: u64 = 0x4489;
    pub const MUXING_APP: u64 = 0x4D80;
    pub const WRITING_APP: u64 = 0x5741;
    pub const TRACKS: u64 = 0x1654AE6B;
    pub const TRACK_ENTRY: u64 = 0xAE;
    pub const TRACK_NUMBER: u64 = 0xD7;
    pub const TRACK_UID: u64 = 0x73C5;
    pub const TRACK_TYPE: u64 = 0x83;
    pub const CODEC_ID: u64 = 0x86;
    pub const VIDEO: u64 = 0xE0;
    pub const PIXEL_WIDTH: u64 = 0xB0;
    pub const PIXEL_HEIGHT: u64 = 0xBA;
    pub const AUDIO: u64 = 0xE1;
    pub const SAMPLING_FREQUENCY: u64 = 0xB5;
    pub const CHANNELS: u64 = 0x9F;
    pub const CLUSTER: u64 = 0x1F43B675;
    pub const TIMECODE: u64 = 0xE7;
    pub const SIMPLE_BLOCK: u64 = 0xA3;
    pub const CUES: u64 = 0x1C53BB6B;
    pub const CUE_POINT: u64 = 0xBB;
    pub const CUE_TIME: u64 = 0xB3;
    pub const CUE_TRACK_POSITIONS: u64 = 0xB7;
    pub const CUE_TRACK: u64 = 0xF7;
    pub const CUE_CLUSTER_POSITION: u64 = 0xF1;
    pub const CUE_BLOCK_NUMBER: u64 = 0x5378;
}

/// A decoded SimpleBlock.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleBlock {
    pub track_number: u64,
    pub relative_timecode: i16,
    pub is_key: bool,
    pub payload_len: usize,
}

/// Decodes the SimpleBlocks of a parsed cluster, in order.
#[allow(dead_code)]
pub fn simple_blocks(data: &[u8], cluster: &Element) -> Vec<SimpleBlock> {
    children(data, cluster)
        .iter()
        .filter(|e| e.id == id::SIMPLE_BLOCK)
        .map(|e| {
            let payload = e.payload(data);
            assert!(payload[0] & 0x80 == 0x80, "one-byte track var-int expected");
            SimpleBlock {
                track_number: u64::from(payload[0] & 0x7F),
                relative_timecode: i16::from_be_bytes([payload[1], payload[2]]),
                is_key: payload[3] & 0x80 != 0,
                payload_len: payload.len() - 4,
            }
        })
        .collect()
}

/// Parses a finished file into (EBML header, Segment).
#[allow(dead_code)]
pub fn parse_file(data: &[u8]) -> (Element, Element) {
    let top = parse_siblings(data, 0, data.len());
    assert_eq!(top.len(), 2, "expected EBML header followed by Segment");
    assert_eq!(top[0].id, id::EBML);
    assert_eq!(top[1].id, id::SEGMENT);
    (top[0], top[1])
}

/// The clusters of a segment, in stream order.
#[allow(dead_code)]
pub fn clusters(data: &[u8], segment: &Element) -> Vec<Element> {
    find_children(data, segment, id::CLUSTER)
}
