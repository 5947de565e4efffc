pub mod error;
pub mod geometry;
pub mod ingest;
pub mod list;
pub mod model;
pub mod packed;
pub mod record;
pub mod snapshot;
pub mod store;
pub mod sweeper;

pub use error::{Result, TrackError};
pub use geometry::{angle, delta, moved, MotionDelta, METERS_PER_UNIT};
pub use ingest::{IngestReport, Ingestor};
pub use list::DeviceList;
pub use model::Device;
pub use packed::{get_digit, set_digit, DigitCode};
pub use record::{utc_offset, ReportRecord, ReportTime};
pub use store::{DeviceSet, DeviceTable, TierOutcome, TimeField, UNSET_TIME};
pub use sweeper::{DeviceSweeper, SweepPolicy, SweepReport};
