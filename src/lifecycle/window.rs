//! Recovery window evaluation. Pure computation, no side effects.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive time range within which a soft-deleted record may be
/// restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WindowRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Options accepted by restore operations.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Cascade the restore through dependent-destroy associations.
    pub recursive: bool,
    /// Duration window anchored at the record's own deletion timestamp.
    pub recovery_window: Option<Duration>,
    /// Explicit window; takes precedence over `recovery_window`.
    pub recovery_window_range: Option<WindowRange>,
}

impl RestoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn recovery_window(mut self, window: Duration) -> Self {
        self.recovery_window = Some(window);
        self
    }

    pub fn recovery_window_range(mut self, range: WindowRange) -> Self {
        self.recovery_window_range = Some(range);
        self
    }
}

/// Resolves the effective window for a record deleted at `deleted_at`.
///
/// An explicit range is used as-is; a duration is anchored on both sides of
/// the deletion timestamp, saturating at the ends of the timeline; otherwise
/// there is no window and restore is unbounded on this axis.
pub fn resolve(opts: &RestoreOptions, deleted_at: DateTime<Utc>) -> Option<WindowRange> {
    if let Some(range) = &opts.recovery_window_range {
        return Some(range.clone());
    }
    let window = opts.recovery_window?;
    let start = deleted_at
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = deleted_at
        .checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    Some(WindowRange::new(start, end))
}

/// Membership check: no window means always within; otherwise the record's
/// own deletion timestamp must fall inside, inclusive.
pub fn within(range: Option<&WindowRange>, deleted_at: DateTime<Utc>) -> bool {
    match range {
        None => true,
        Some(range) => range.contains(deleted_at),
    }
}
