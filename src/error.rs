//! Muxing errors.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MuxError>;

/// Errors that can occur while muxing a WebM stream.
///
/// Failures are not rolled back: a failed [`Segment::add_frame`] may have
/// advanced the writer cursor. The stream then needs either finalization or
/// abandonment by the caller.
///
/// [`Segment::add_frame`]: crate::Segment::add_frame
#[derive(Debug)]
pub enum MuxError {
    /// The underlying writer reported an error.
    Io(std::io::Error),
    /// A seek was requested on a writer that is not seekable.
    NotSeekable,
    /// Stereo mode must be one of 0, 1, 2, 3 or 11.
    UnsupportedStereoMode(u64),
    /// SimpleBlock track numbers are encoded in a single-byte var-int and
    /// must lie in 1..=127.
    TrackNumberOutOfRange(u64),
    /// No track with this number was added to the segment.
    UnknownTrack(u64),
    /// SimpleBlock relative timecodes must fit a signed 16-bit integer.
    RelativeTimecodeOutOfRange { timecode: i64, cluster_timecode: u64 },
    /// Tracks cannot be added or modified after the segment header
    /// (which contains the serialized Tracks element) has been written.
    HeaderAlreadyWritten,
    /// The segment needs at least one track before frames can be added.
    NoTracks,
    /// The segment has already been finalized.
    AlreadyFinalized,
    /// The cluster has already been finalized.
    ClusterAlreadyFinalized,
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxError::Io(err) => write!(f, "writer error: {}", err),
            MuxError::NotSeekable => {
                write!(f, "writer is not seekable")
            }
            MuxError::UnsupportedStereoMode(mode) => {
                write!(
                    f,
                    "stereo mode {} is not supported: must be 0, 1, 2, 3 or 11",
                    mode
                )
            }
            MuxError::TrackNumberOutOfRange(number) => {
                write!(
                    f,
                    "track number {} cannot be stored in a one-byte var-int: must be 1..=127",
                    number
                )
            }
            MuxError::UnknownTrack(number) => {
                write!(f, "no track with number {} in this segment", number)
            }
            MuxError::RelativeTimecodeOutOfRange {
                timecode,
                cluster_timecode,
            } => {
                write!(
                    f,
                    "relative timecode {} (cluster base {}) does not fit a signed 16-bit integer",
                    timecode, cluster_timecode
                )
            }
            MuxError::HeaderAlreadyWritten => {
                write!(f, "tracks are frozen once the segment header is written")
            }
            MuxError::NoTracks => {
                write!(f, "add at least one track before adding frames")
            }
            MuxError::AlreadyFinalized => {
                write!(f, "segment already finalized")
            }
            MuxError::ClusterAlreadyFinalized => {
                write!(f, "cluster already finalized")
            }
        }
    }
}

impl std::error::Error for MuxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MuxError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MuxError {
    fn from(err: std::io::Error) -> MuxError {
        MuxError::Io(err)
    }
}
