use super::EpisodeRecord;
use anyhow::Result;

/// Writes [`EpisodeRecord`]s somewhere.
pub trait Recorder {
    /// Appends a record.
    fn write(&mut self, record: EpisodeRecord) -> Result<()>;

    /// Flushes buffered records, if any.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
