/// Stable numeric identifier for a replicated entity. Persists across delta
/// updates; remote peers address entities exclusively by this.
pub type Sid = u32;

/// Numeric tag mapping to a registered entity constructor.
pub type ClassId = u32;

/// Wrap-around simulation tick counter, bumped once per scene tick.
pub type UpdateCount = u16;

/// Index of a tracked field within its owning field set.
pub type FieldIndex = u8;

/// Sentinel sid. Carried by a delete watched-event to mean "delete everything".
pub const SID_NONE: Sid = Sid::MAX;

/// Sentinel latency value on the wire meaning "not yet measured".
pub const LATENCY_UNKNOWN: u16 = u16::MAX;
