pub mod init;

pub use init::{build_filter, init, LoggingError};
