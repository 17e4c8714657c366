use super::{EpisodeRecord, Recorder};
use anyhow::{Context, Result};
use chrono::Local;
use csv::{Writer, WriterBuilder};
use log::info;
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

/// Header of the persisted log.
pub const HEADER: [&str; 8] = [
    "Episode",
    "Step",
    "Reward",
    "Total_reward",
    "Action",
    "Epsilon",
    "Done",
    "Termination_Code",
];

/// Appends [`EpisodeRecord`]s to a CSV file.
///
/// The header is written once when the file is created. Every row is flushed
/// right away, so the file of an interrupted run can still be inspected.
pub struct CsvRecorder {
    path: PathBuf,
    writer: Writer<File>,
}

impl CsvRecorder {
    /// Creates `data_<YYYYmmdd-HHMM>.csv` in `log_dir`, named by the current time.
    ///
    /// If a file of the same name exists, a numeric suffix is appended
    /// instead of overwriting it.
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
        let stem = format!("data_{}", Local::now().format("%Y%m%d-%H%M"));
        let mut path = log_dir.join(format!("{}.csv", stem));
        let mut n = 1;
        while path.exists() {
            path = log_dir.join(format!("{}-{}.csv", stem, n));
            n += 1;
        }
        Self::create(path)
    }

    /// Creates the log file at the given path.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("Failed to create log file {:?}", path))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(HEADER)?;
        writer.flush()?;
        info!("Training log is written to {:?}", path);

        Ok(Self { path, writer })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Recorder for CsvRecorder {
    fn write(&mut self, record: EpisodeRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }
}
