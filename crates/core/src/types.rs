/// Stories are identified by a random UUID generated at submission time.
pub type StoryId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
