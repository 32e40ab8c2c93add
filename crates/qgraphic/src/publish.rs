//! Where `Publish` and `Send` deliver their output.
//!
//! The interpreter never talks to a display or the filesystem directly: it
//! hands every published frame and every sent path to a [`PublishHandler`].
//! The headless default is [`FilePublish`], which packs frames to raw
//! RGB565 and atomically replaces the destination file so consumers never
//! observe a torn frame. The graphical editor installs its own handler.

use std::{
    env,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    codec::{RAW_FRAME_SIZE, frame_to_rgb565, load_qgc},
    exception::Exception,
    frame::Frame,
};

/// Destination used when neither environment variable is set.
pub const DEFAULT_FRAME_FILE: &str = "latest_frame.bin";

/// Receives the output of `Publish` and `Send` statements.
pub trait PublishHandler {
    /// Called with the frame value of a `Publish` statement.
    fn publish(&mut self, frame: &Frame) -> Result<(), Exception>;

    /// Called with the path value of a `Send` statement.
    fn send(&mut self, path: &str) -> Result<(), Exception>;
}

/// The frame publish destination: `QGRAPHIC_FRAME_PATH`, then
/// `QGRAPHIC_FRAME_FILE`, then `latest_frame.bin`.
#[must_use]
pub fn default_frame_path() -> PathBuf {
    env::var_os("QGRAPHIC_FRAME_PATH")
        .or_else(|| env::var_os("QGRAPHIC_FRAME_FILE"))
        .map_or_else(|| PathBuf::from(DEFAULT_FRAME_FILE), PathBuf::from)
}

/// Reads a raw RGB565 frame from disk, validating its length.
pub fn read_frame_file(path: &Path) -> Result<Vec<u8>, Exception> {
    let data =
        fs::read(path).map_err(|err| Exception::runtime(format!("failed to read {}: {err}", path.display())))?;
    if data.len() != RAW_FRAME_SIZE {
        return Err(Exception::raw_frame_size(format!(
            "Expected {RAW_FRAME_SIZE} bytes, got {} bytes: {}",
            data.len(),
            path.display()
        )));
    }
    Ok(data)
}

/// Writes one raw frame to `out_path` (or the configured default) via an
/// atomic replace.
pub fn send_frame_bytes(frame_bytes: &[u8], out_path: Option<&Path>) -> Result<(), Exception> {
    if frame_bytes.len() != RAW_FRAME_SIZE {
        return Err(Exception::raw_frame_size(format!(
            "Expected {RAW_FRAME_SIZE} bytes, got {} bytes",
            frame_bytes.len()
        )));
    }
    let path = out_path.map_or_else(default_frame_path, Path::to_path_buf);
    atomic_write_bytes(&path, frame_bytes)
        .map_err(|err| Exception::runtime(format!("failed to publish frame to {}: {err}", path.display())))
}

/// Write-to-temp-sibling, flush, fsync, rename-over-destination.
///
/// The temp name includes the process id and a nanosecond timestamp so
/// concurrent publishers never collide. fsync failure is tolerated (some
/// filesystems refuse it); the rename is the atomicity guarantee.
fn atomic_write_bytes(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    let tmp_path = path.with_file_name(format!("{name}.tmp.{}.{nanos}", std::process::id()));

    let mut file = File::create(&tmp_path)?;
    file.write_all(data)?;
    file.flush()?;
    let _ = file.sync_all();
    drop(file);
    fs::rename(&tmp_path, path)
}

/// Headless handler: `Publish` packs the frame to RGB565 and atomically
/// replaces the destination file; `Send` loads the named `.qgc` file and
/// does the same.
#[derive(Debug, Default)]
pub struct FilePublish {
    destination: Option<PathBuf>,
}

impl FilePublish {
    /// Publishes to the environment-configured destination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes to a fixed destination, ignoring the environment.
    #[must_use]
    pub fn with_destination(path: impl Into<PathBuf>) -> Self {
        Self {
            destination: Some(path.into()),
        }
    }
}

impl PublishHandler for FilePublish {
    fn publish(&mut self, frame: &Frame) -> Result<(), Exception> {
        send_frame_bytes(&frame_to_rgb565(frame), self.destination.as_deref())
    }

    fn send(&mut self, path: &str) -> Result<(), Exception> {
        let frame = load_qgc(Path::new(path))?;
        send_frame_bytes(&frame_to_rgb565(&frame), self.destination.as_deref())
    }
}

/// Handler that records published frames and sent paths.
///
/// Useful for tests and for drivers that want the frames in memory.
#[derive(Debug, Default)]
pub struct CollectPublish {
    published: Vec<Frame>,
    sent: Vec<String>,
}

impl CollectPublish {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame published so far, in order.
    #[must_use]
    pub fn published(&self) -> &[Frame] {
        &self.published
    }

    /// Every path sent so far, in order.
    #[must_use]
    pub fn sent_paths(&self) -> &[String] {
        &self.sent
    }
}

impl PublishHandler for CollectPublish {
    fn publish(&mut self, frame: &Frame) -> Result<(), Exception> {
        self.published.push(frame.clone());
        Ok(())
    }

    fn send(&mut self, path: &str) -> Result<(), Exception> {
        self.sent.push(path.to_owned());
        Ok(())
    }
}

/// Handler that discards all output.
#[derive(Debug, Default)]
pub struct NoPublish;

impl PublishHandler for NoPublish {
    fn publish(&mut self, _frame: &Frame) -> Result<(), Exception> {
        Ok(())
    }

    fn send(&mut self, _path: &str) -> Result<(), Exception> {
        Ok(())
    }
}
