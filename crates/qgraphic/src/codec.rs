//! The `.qgc` frame codec and the raw RGB565 frame buffer format.
//!
//! A `.qgc` file is the four magic bytes `QGC1` followed by a
//! zlib-compressed (level 6) UTF-8 JSON payload
//! `{"w":64,"h":32,"pixels":[...]}` where `pixels` is 32 rows of 64
//! `[r,g,b]` triples. Readers reject a missing magic and any size other
//! than 64x32.
//!
//! A raw frame is 4096 bytes, row-major, each pixel packed little-endian
//! as `(r & 0x1F) << 11 | (g & 0x3F) << 5 | (b & 0x1F)`.

use std::{
    io::{Read, Write},
    path::Path,
};

use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};
use serde::{Deserialize, Serialize};

use crate::{
    exception::Exception,
    frame::{FRAME_HEIGHT, FRAME_WIDTH, Frame, Pixel},
};

/// Magic header of a `.qgc` file.
pub const QGC_MAGIC: &[u8; 4] = b"QGC1";

/// Exact byte length of a raw RGB565 frame (32 rows x 64 columns x 2).
pub const RAW_FRAME_SIZE: usize = FRAME_WIDTH * FRAME_HEIGHT * 2;

/// zlib level used by `.qgc` writers.
const QGC_COMPRESSION_LEVEL: u32 = 6;

#[derive(Serialize, Deserialize)]
struct QgcPayload {
    w: u32,
    h: u32,
    pixels: Vec<Vec<Pixel>>,
}

/// Encodes a frame as `.qgc` bytes.
pub fn encode_qgc(frame: &Frame) -> Result<Vec<u8>, Exception> {
    let payload = QgcPayload {
        w: FRAME_WIDTH as u32,
        h: FRAME_HEIGHT as u32,
        pixels: frame.pixels().to_vec(),
    };
    let json = serde_json::to_vec(&payload)
        .map_err(|err| Exception::runtime(format!("failed to encode frame payload: {err}")))?;

    let mut out = QGC_MAGIC.to_vec();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(QGC_COMPRESSION_LEVEL));
    encoder
        .write_all(&json)
        .and_then(|()| encoder.finish())
        .map(|compressed| {
            out.extend_from_slice(&compressed);
            out
        })
        .map_err(|err| Exception::runtime(format!("failed to compress frame payload: {err}")))
}

/// Decodes `.qgc` bytes into a frame.
///
/// # Errors
/// `InvalidFrameFormat` when the magic is missing, the stream does not
/// decompress, the payload is not the expected JSON shape, or the declared
/// size is not 64x32.
pub fn decode_qgc(data: &[u8]) -> Result<Frame, Exception> {
    if !data.starts_with(QGC_MAGIC) {
        return Err(Exception::frame_format("missing QGC1 magic"));
    }
    let mut json = Vec::new();
    ZlibDecoder::new(&data[QGC_MAGIC.len()..])
        .read_to_end(&mut json)
        .map_err(|err| Exception::frame_format(format!("corrupt compressed payload: {err}")))?;
    let payload: QgcPayload =
        serde_json::from_slice(&json).map_err(|err| Exception::frame_format(format!("invalid payload: {err}")))?;
    if payload.w != FRAME_WIDTH as u32 || payload.h != FRAME_HEIGHT as u32 {
        return Err(Exception::frame_format(format!(
            "unsupported frame size {}x{}",
            payload.w, payload.h
        )));
    }
    Frame::from_pixels(payload.pixels).map_err(Exception::frame_format)
}

/// Writes a frame to a `.qgc` file.
pub fn save_qgc(frame: &Frame, path: &Path) -> Result<(), Exception> {
    let data = encode_qgc(frame)?;
    std::fs::write(path, data).map_err(|err| Exception::runtime(format!("failed to write {}: {err}", path.display())))
}

/// Reads a frame from a `.qgc` file.
pub fn load_qgc(path: &Path) -> Result<Frame, Exception> {
    let data =
        std::fs::read(path).map_err(|err| Exception::runtime(format!("failed to read {}: {err}", path.display())))?;
    decode_qgc(&data)
}

/// Packs a frame into the raw 4096-byte RGB565 buffer.
#[must_use]
pub fn frame_to_rgb565(frame: &Frame) -> Vec<u8> {
    let mut data = Vec::with_capacity(RAW_FRAME_SIZE);
    for row in frame.pixels() {
        for &(r, g, b) in row {
            let value = ((r & 0x1F) << 11 | (g & 0x3F) << 5 | (b & 0x1F)) as u16;
            data.push((value & 0xFF) as u8);
            data.push((value >> 8) as u8);
        }
    }
    data
}

/// Unpacks a raw 4096-byte RGB565 buffer into a frame.
///
/// # Errors
/// `InvalidRawFrameSize` when the buffer is not exactly 4096 bytes.
pub fn decode_rgb565(data: &[u8]) -> Result<Frame, Exception> {
    if data.len() != RAW_FRAME_SIZE {
        return Err(Exception::raw_frame_size(format!(
            "Expected {RAW_FRAME_SIZE} bytes, got {} bytes",
            data.len()
        )));
    }
    let mut frame = Frame::new();
    for (index, pair) in data.chunks_exact(2).enumerate() {
        let value = u16::from_le_bytes([pair[0], pair[1]]);
        let x = (index % FRAME_WIDTH) as i64;
        let y = (index / FRAME_WIDTH) as i64;
        let r = i64::from(value >> 11) & 0x1F;
        let g = i64::from(value >> 5) & 0x3F;
        let b = i64::from(value) & 0x1F;
        // In-range by construction; the error path is unreachable.
        frame.set_color(x, y, r, g, b).map_err(|err| Exception::runtime(err.to_string()))?;
    }
    Ok(frame)
}
