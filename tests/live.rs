mod support;

use support::{find_child, id, parse_element, parse_siblings, simple_blocks, SharedSink};
use webmux::{Segment, SegmentBuilder, SegmentMode};

const MS: u64 = 1_000_000;
const UNKNOWN: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

#[test]
fn non_seekable_sink_leaves_open_ended_sizes() -> Result<(), Box<dyn std::error::Error>> {
    let (writer, buffer) = SharedSink::streaming();
    let mut segment = Segment::new(writer);
    let video = segment.add_video_track(640, 480)?;
    segment.add_frame(&[0x9Du8; 100], video, 0, true)?;
    segment.finalize()?;

    let data = buffer.lock().unwrap().clone();
    let top = parse_siblings(&data, 0, data.len());
    assert_eq!(top[0].id, id::EBML);
    let segment_elem = top[1];
    assert_eq!(segment_elem.id, id::SEGMENT);

    // Segment and cluster sizes keep the unknown pattern.
    assert_eq!(segment_elem.size, None);
    assert_eq!(
        &data[segment_elem.offset + 4..segment_elem.offset + 12],
        UNKNOWN
    );

    // File mode on a non-seekable sink: no SeekHead reservation, no
    // Duration slot, but the stream still parses and carries the frame.
    let info = find_child(&data, &segment_elem, id::INFO).expect("Info");
    assert!(find_child(&data, &info, id::DURATION).is_none());
    assert!(find_child(&data, &segment_elem, id::SEEK_HEAD).is_none());

    let cluster = find_child(&data, &segment_elem, id::CLUSTER).expect("Cluster");
    assert_eq!(cluster.size, None);
    assert_eq!(
        &data[cluster.offset + 4..cluster.offset + 12],
        UNKNOWN
    );
    let blocks = simple_blocks(&data, &cluster);
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].is_key);
    assert_eq!(blocks[0].payload_len, 100);
    Ok(())
}

#[test]
fn live_mode_skips_cues_and_finalization() -> Result<(), Box<dyn std::error::Error>> {
    let (writer, buffer) = SharedSink::streaming();
    let mut segment = SegmentBuilder::new(writer)
        .mode(SegmentMode::Live)
        .video(640, 480)
        .build()?;

    segment.add_frame(&[1u8; 50], 1, 0, true)?;
    segment.add_frame(&[2u8; 50], 1, 33 * MS, false)?;
    let stats = segment.finalize_with_stats()?;
    assert_eq!(stats.cue_points, 0);

    let data = buffer.lock().unwrap().clone();
    let top = parse_siblings(&data, 0, data.len());
    let segment_elem = top[1];
    assert_eq!(segment_elem.size, None);

    // No Cues element and no duration; the stream just ends.
    assert!(find_child(&data, &segment_elem, id::CUES).is_none());
    let info = find_child(&data, &segment_elem, id::INFO).expect("Info");
    assert!(find_child(&data, &info, id::DURATION).is_none());

    let cluster = find_child(&data, &segment_elem, id::CLUSTER).expect("Cluster");
    assert_eq!(simple_blocks(&data, &cluster).len(), 2);
    Ok(())
}

#[test]
fn live_mode_on_a_seekable_sink_still_streams_forward(
) -> Result<(), Box<dyn std::error::Error>> {
    let (writer, buffer) = SharedSink::seekable();
    let mut segment = SegmentBuilder::new(writer)
        .mode(SegmentMode::Live)
        .video(640, 480)
        .build()?;
    segment.add_frame(&[1u8; 50], 1, 0, true)?;
    segment.finalize()?;

    let data = buffer.lock().unwrap().clone();
    let segment_elem = parse_element(&data, children_offset(&data));
    assert_eq!(segment_elem.id, id::SEGMENT);
    assert_eq!(segment_elem.size, None, "live mode never patches sizes");
    Ok(())
}

fn children_offset(data: &[u8]) -> usize {
    // Skip the EBML header element.
    let ebml = parse_element(data, 0);
    ebml.data_end(data.len())
}
