/// Task identifiers are opaque strings (UUID v4 at creation).
pub type TaskId = String;

/// Worker identifiers are opaque strings supplied by the worker process.
pub type WorkerId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
