//! Tuning constants and default values.
//!
//! This module defines the fixed limits and tuning parameters shared by
//! the reactor and the dictionary. These constants control table sizing,
//! rehash pacing, and sampling behavior.
//!
//! # Categories
//!
//! - **Dictionary Sizing**: initial capacity and growth pressure
//! - **Rehash Pacing**: how much migration work a single call may do
//! - **Sampling**: pool sizes for approximately-uniform key selection

// -----------------------------------------------------------------------------
// Dictionary - Sizing
// -----------------------------------------------------------------------------

/// Initial size of every hash table, in buckets.
///
/// Tables are lazily allocated at this size on first insert and only ever
/// grow to larger powers of two.
pub const HT_INITIAL_SIZE: usize = 4;

/// Load factor at which growth becomes unconditional.
///
/// Ordinarily a table grows once `used >= size`, but only while resizing
/// is enabled (see [`Dict::disable_resize`]). Once the ratio of entries to
/// buckets exceeds this value, chains are long enough that lookups degrade
/// badly, and the table grows even while resizing is disabled.
///
/// [`Dict::disable_resize`]: crate::dict::Dict::disable_resize
pub const FORCE_RESIZE_RATIO: usize = 5;

// -----------------------------------------------------------------------------
// Dictionary - Rehash Pacing
// -----------------------------------------------------------------------------

/// Number of buckets migrated per batch by [`Dict::rehash_for`].
///
/// The millisecond-budgeted rehash loop checks the clock between batches
/// of this many buckets.
///
/// [`Dict::rehash_for`]: crate::dict::Dict::rehash_for
pub const REHASH_BATCH_BUCKETS: usize = 100;

/// Multiplier bounding empty-bucket visits during a rehash step.
///
/// A rehash step asked to migrate `n` buckets gives up after visiting
/// `n * REHASH_EMPTY_VISITS_RATIO` empty buckets, so a sparse table cannot
/// stall a caller for an unbounded amount of time.
pub const REHASH_EMPTY_VISITS_RATIO: usize = 10;

// -----------------------------------------------------------------------------
// Dictionary - Sampling
// -----------------------------------------------------------------------------

/// Pool size used by [`Dict::fair_random_entry`].
///
/// The fair variant samples this many entries via bucket walking and then
/// picks one uniformly, trading a little work for far less bias toward
/// long chains than plain bucket selection.
///
/// [`Dict::fair_random_entry`]: crate::dict::Dict::fair_random_entry
pub const FAIR_RANDOM_SAMPLE_SIZE: usize = 15;

/// Multiplier bounding bucket visits in [`Dict::some_entries`].
///
/// Sampling `count` entries gives up after `count * SOME_ENTRIES_MAX_STEPS`
/// bucket visits even if fewer entries were found.
///
/// [`Dict::some_entries`]: crate::dict::Dict::some_entries
pub const SOME_ENTRIES_MAX_STEPS: usize = 10;

// -----------------------------------------------------------------------------
// Dictionary - Maintenance
// -----------------------------------------------------------------------------

/// Bucket interval at which [`Dict::clear_with`] reports progress.
///
/// The drain callback runs once every this many buckets (the interval is
/// a power-of-two mask, so the check is a single AND).
///
/// [`Dict::clear_with`]: crate::dict::Dict::clear_with
pub const CLEAR_CALLBACK_INTERVAL: usize = 65_535;
