use std::time::Duration;

use crate::reactor::Poller;
use crate::reactor::TimeProc;
use crate::reactor::TimerFinalizer;

// -----------------------------------------------------------------------------
// Timer Identifiers
// -----------------------------------------------------------------------------

/// Identifier of a registered timer, unique for the lifetime of its
/// loop.
pub type TimerId = i64;

/// Returned by a timer callback to retire the timer instead of
/// rescheduling it.
pub const NOMORE: i64 = -1;

/// Marks a timer as logically deleted ahead of its physical release.
pub const DELETED_EVENT_ID: TimerId = -1;

// -----------------------------------------------------------------------------
// Timer Entry
// -----------------------------------------------------------------------------

/// A registered timer.
///
/// Entries live behind shared handles so a timer stays valid while its
/// own callback runs, even if that callback (or a nested dispatch)
/// deletes it: deletion only rewrites `id` to [`DELETED_EVENT_ID`], and
/// the entry is physically released by the sweep at the end of the
/// outermost dispatch pass, once no handle but the list's own remains.
pub(super) struct TimerEntry<P: Poller> {
  /// Timer identifier; [`DELETED_EVENT_ID`] once logically deleted.
  pub(super) id: TimerId,
  /// Wall-clock deadline, as a duration since the Unix epoch.
  pub(super) when: Duration,
  /// The timer callback.
  pub(super) handler: TimeProc<P>,
  /// Runs exactly once when the timer is released.
  pub(super) finalizer: Option<TimerFinalizer<P>>,
}
