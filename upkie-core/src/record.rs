//! Types and traits for recording per-step diagnostics.
//!
//! Environments return a [`Record`] next to every [`Step`](crate::Step):
//! loop slack, measured period, base pitch and the like. Records can be
//! handed to a [`Recorder`] to be kept or discarded.
//!
//! ```rust
//! use upkie_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("pitch", RecordValue::Scalar(0.02));
//! record.insert("observation", RecordValue::Array1(vec![0.02, 0.0, 0.1, 0.0]));
//! assert_eq!(record.get_scalar("pitch").unwrap(), 0.02);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
