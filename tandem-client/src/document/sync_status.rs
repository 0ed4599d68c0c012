use std::time::SystemTime;

/// What the editor chrome shows: loading, "Saving..." / "Saved".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// The persisted snapshot has been fetched (or the fetch gave up).
    pub loaded: bool,
    /// A snapshot was sent within the last saving-indicator period.
    pub saving: bool,
    pub last_saved: Option<SystemTime>,
}
