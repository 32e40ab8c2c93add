use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use pretty_assertions::assert_eq;
use qgraphic::{
    ExcKind, Frame, QGC_MAGIC, RAW_FRAME_SIZE, decode_qgc, decode_rgb565, encode_qgc, frame_to_rgb565, load_qgc,
    save_qgc,
};

fn sample_frame() -> Frame {
    let mut frame = Frame::new();
    frame.set_color(0, 0, 31, 63, 31).unwrap();
    frame.set_color(63, 31, 1, 2, 3).unwrap();
    frame.make_line(0, 0, 63, 31, 17, 33, 9);
    frame
}

fn scratch_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("qgraphic-codec-{name}-{}-{nanos}", std::process::id()))
}

/// Compresses a JSON payload the way a `.qgc` writer would.
fn qgc_bytes_for_payload(json: &str) -> Vec<u8> {
    let mut out = QGC_MAGIC.to_vec();
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(6));
    encoder.write_all(json.as_bytes()).unwrap();
    out.extend_from_slice(&encoder.finish().unwrap());
    out
}

#[test]
fn qgc_round_trips_pixel_for_pixel() {
    let frame = sample_frame();
    let decoded = decode_qgc(&encode_qgc(&frame).unwrap()).unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn qgc_file_round_trips() {
    let path = scratch_path("file.qgc");
    let frame = sample_frame();
    save_qgc(&frame, &path).unwrap();
    let loaded = load_qgc(&path).unwrap();
    assert_eq!(loaded, frame);
    std::fs::remove_file(&path).ok();
}

#[test]
fn qgc_starts_with_the_magic_bytes() {
    let data = encode_qgc(&Frame::new()).unwrap();
    assert_eq!(&data[..4], QGC_MAGIC);
}

#[test]
fn missing_magic_is_invalid_frame_format() {
    let err = decode_qgc(b"NOPE....").unwrap_err();
    assert_eq!(err.kind(), ExcKind::InvalidFrameFormat);
    assert!(err.message().contains("magic"));
}

#[test]
fn corrupt_stream_is_invalid_frame_format() {
    let mut data = QGC_MAGIC.to_vec();
    data.extend_from_slice(b"this is not zlib");
    let err = decode_qgc(&data).unwrap_err();
    assert_eq!(err.kind(), ExcKind::InvalidFrameFormat);
}

#[test]
fn wrong_declared_size_is_rejected() {
    let row: Vec<[i64; 3]> = vec![[0, 0, 0]; 64];
    let pixels: Vec<_> = (0..32).map(|_| row.clone()).collect();
    let json = serde_json::json!({ "w": 32, "h": 32, "pixels": pixels }).to_string();
    let err = decode_qgc(&qgc_bytes_for_payload(&json)).unwrap_err();
    assert_eq!(err.kind(), ExcKind::InvalidFrameFormat);
    assert!(err.message().contains("32x32"));
}

#[test]
fn wrong_grid_shape_is_rejected() {
    let row: Vec<[i64; 3]> = vec![[0, 0, 0]; 64];
    let pixels: Vec<_> = (0..31).map(|_| row.clone()).collect();
    let json = serde_json::json!({ "w": 64, "h": 32, "pixels": pixels }).to_string();
    let err = decode_qgc(&qgc_bytes_for_payload(&json)).unwrap_err();
    assert_eq!(err.kind(), ExcKind::InvalidFrameFormat);
}

#[test]
fn qgc_preserves_out_of_range_components() {
    let mut frame = Frame::new();
    frame.set_color(10, 10, 999, -5, 70).unwrap();
    let decoded = decode_qgc(&encode_qgc(&frame).unwrap()).unwrap();
    assert_eq!(decoded.get_pixel(10, 10), Ok((999, -5, 70)));
}

#[test]
fn rgb565_buffer_is_4096_bytes_row_major_little_endian() {
    let mut frame = Frame::new();
    frame.set_color(0, 0, 31, 0, 0).unwrap();
    frame.set_color(1, 0, 0, 63, 0).unwrap();
    frame.set_color(0, 1, 0, 0, 31).unwrap();
    let data = frame_to_rgb565(&frame);
    assert_eq!(data.len(), RAW_FRAME_SIZE);
    // (31,0,0) -> 0xF800 little-endian.
    assert_eq!(&data[0..2], &[0x00, 0xF8]);
    // (0,63,0) -> 0x07E0.
    assert_eq!(&data[2..4], &[0xE0, 0x07]);
    // Row 1 starts at byte 128; (0,0,31) -> 0x001F.
    assert_eq!(&data[128..130], &[0x1F, 0x00]);
}

#[test]
fn rgb565_round_trips_in_range_components() {
    let mut frame = Frame::new();
    let samples = [(0, 0, 0), (31, 63, 31), (17, 33, 9), (1, 2, 3), (30, 1, 19)];
    for (i, &(r, g, b)) in samples.iter().enumerate() {
        frame.set_color(i as i64, 0, r, g, b).unwrap();
    }
    let decoded = decode_rgb565(&frame_to_rgb565(&frame)).unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn rgb565_masks_out_of_range_components() {
    let mut frame = Frame::new();
    frame.set_color(0, 0, 999, 70, -5).unwrap();
    let decoded = decode_rgb565(&frame_to_rgb565(&frame)).unwrap();
    assert_eq!(decoded.get_pixel(0, 0), Ok((999 & 0x1F, 70 & 0x3F, -5_i64 & 0x1F)));
}

#[test]
fn wrong_raw_length_is_invalid_raw_frame_size() {
    let err = decode_rgb565(&[0u8; 100]).unwrap_err();
    assert_eq!(err.kind(), ExcKind::InvalidRawFrameSize);
    assert!(err.message().contains("100"));

    let err = decode_rgb565(&vec![0u8; RAW_FRAME_SIZE + 2]).unwrap_err();
    assert_eq!(err.kind(), ExcKind::InvalidRawFrameSize);
}
