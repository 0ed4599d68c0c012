/// Public STUN servers used when no ICE configuration is supplied.
pub const DEFAULT_STUN_ADDR: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun2.l.google.com:19302";

/// Interval between two full-content snapshots, in milliseconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_MS: u64 = 2000;
