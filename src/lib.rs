//! # Webmux
//!
//! **Pure-Rust streaming WebM (VP8/Vorbis) muxer.**
//!
//! ## Core Invariant
//!
//! > Webmux guarantees that any **correctly-timestamped**, **already-encoded**
//! > VP8/Vorbis stream can be turned into a **valid, seekable WebM file** —
//! > or, on a forward-only sink, a **legal live WebM stream** — without
//! > external tooling.
//!
//! ## What Webmux Does
//!
//! - Accepts compressed VP8 video and Vorbis audio frames with nanosecond
//!   timestamps and keyframe flags
//! - Writes the EBML/Matroska structure of the WebM profile: header,
//!   SeekHead, Info, Tracks, Clusters of SimpleBlocks, Cues
//! - Interleaves audio around video keyframes so seeking lands on a
//!   cluster that carries both
//! - Back-patches every reserved size field, the duration and the seek
//!   index on finalize; on non-seekable sinks it emits the open-ended
//!   layout live WebM clients consume
//!
//! ## What Webmux Does NOT Do
//!
//! - Encode, decode or parse codec bitstreams (frames are opaque bytes)
//! - Read or demux WebM files
//! - Matroska features outside the WebM profile: lacing, BlockGroups,
//!   chapters, tags, attachments, encryption
//! - Reorder frames; the caller feeds each track in timestamp order
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use webmux::{SeekWriter, Segment};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = File::create("out.webm")?;
//! let mut segment = Segment::new(SeekWriter::new(file));
//! let video = segment.add_video_track(640, 480)?;
//!
//! // Frames come from an encoder elsewhere.
//! // segment.add_frame(&vp8_bytes, video, timestamp_ns, is_keyframe)?;
//!
//! segment.finalize()?;
//! # Ok(())
//! # }
//! ```

mod cluster;
mod cues;
mod ebml;
mod element_id;
mod info;
mod seek;
mod segment;
mod track;

// Re-exported as modules so users can `use webmux::api::...` etc.
pub mod api;
pub mod error;
pub mod writer;

// Invariant PPT testing framework backing the size-contract asserts.
pub mod invariant_ppt;

pub use api::SegmentBuilder;
pub use error::{MuxError, Result};
pub use segment::{Segment, SegmentMode, SegmentStats};
pub use track::{
    reseed_uid_rng, AudioSettings, Track, TrackKind, VideoSettings, AUDIO_TRACK_TYPE,
    VIDEO_TRACK_TYPE,
};
pub use writer::{SeekWriter, StreamWriter, Writer};
