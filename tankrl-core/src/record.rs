//! Types and traits for recording per-step training logs.
//!
//! The [`Trainer`](crate::Trainer) appends one [`EpisodeRecord`] per step
//! to a [`Recorder`]. Records are append-only and never modified after they
//! have been written.
//!
//! * [`CsvRecorder`] - writes records to a CSV file created per run
//! * [`BufferedRecorder`] - keeps records in memory
mod base;
mod buffered_recorder;
mod csv_recorder;
mod recorder;

pub use base::EpisodeRecord;
pub use buffered_recorder::BufferedRecorder;
pub use csv_recorder::CsvRecorder;
pub use recorder::Recorder;
