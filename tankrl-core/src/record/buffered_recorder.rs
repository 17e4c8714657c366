use super::{EpisodeRecord, Recorder};
use anyhow::Result;

/// Buffered recorder.
///
/// This is used for recording sequences of records in tests and evaluation.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<EpisodeRecord>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<EpisodeRecord> {
        self.buf.iter()
    }

    /// The number of records written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Recorder for BufferedRecorder {
    /// Write a [`EpisodeRecord`] to the buffer.
    fn write(&mut self, record: EpisodeRecord) -> Result<()> {
        self.buf.push(record);
        Ok(())
    }
}
