//! In-memory associative map with incremental rehashing.
//!
//! This module provides [`Dict`], an open-chained hash table that grows
//! and shrinks by migrating buckets from an old table to a new table in
//! bounded steps interleaved with ordinary operations. A dictionary
//! therefore owns *two* tables: `ht[0]` holds all entries in the steady
//! state, and `ht[1]` exists only while a rehash is in progress.
//!
//! # Incremental Rehashing
//!
//! Growing a table all at once stalls the caller for as long as it takes
//! to move every entry. Instead, [`Dict::expand`] only allocates the new
//! table and records that a migration is pending; every subsequent
//! mutating operation and lookup then moves a single bucket before doing
//! its own work, amortizing the migration over the workload that caused
//! the growth. [`Dict::rehash`] and [`Dict::rehash_for`] let callers with
//! idle time drive the migration explicitly.
//!
//! # Invariants
//!
//! - When not rehashing, `ht[1]` is unallocated and every live entry is
//!   in `ht[0]`.
//! - During rehashing, buckets `[0, rehash_index)` of `ht[0]` are empty;
//!   all live entries occupy either `ht[0]` at indices `>= rehash_index`
//!   or `ht[1]`.
//! - Table sizes are zero or a power of two.
//! - Open safe iterators (see [`DictIterator`]) suspend rehash steps and
//!   the opportunistic resize trigger.

mod entry;
mod iter;
mod random;
mod scan;
mod table;
mod types;

pub use self::entry::Entry;
pub use self::iter::DictIterator;
pub use self::types::DefaultDictType;
pub use self::types::DictType;

pub(crate) use self::table::Bucket;
pub(crate) use self::table::Table;

use std::cell::Cell;
use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::time::Instant;

use crate::consts::CLEAR_CALLBACK_INTERVAL;
use crate::consts::FORCE_RESIZE_RATIO;
use crate::consts::HT_INITIAL_SIZE;
use crate::consts::REHASH_BATCH_BUCKETS;
use crate::consts::REHASH_EMPTY_VISITS_RATIO;

// -----------------------------------------------------------------------------
// Dictionary Error
// -----------------------------------------------------------------------------

/// Errors returned from dictionary insertion or resizing operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DictError {
  /// An [`add`] found the key already present.
  ///
  /// This is not fatal: the existing entry is untouched and the rejected
  /// key and value are returned to the caller.
  ///
  /// [`add`]: Dict::add
  DuplicateKey,
  /// A table resize was requested while a migration is in progress.
  RehashInProgress,
  /// A resize was requested that would not change the table size.
  InvalidSize,
  /// A [`resize`] was requested while resizing is disabled.
  ///
  /// [`resize`]: Dict::resize
  ResizeDisabled,
}

impl Display for DictError {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self {
      Self::DuplicateKey => f.write_str("duplicate key"),
      Self::RehashInProgress => f.write_str("rehash in progress"),
      Self::InvalidSize => f.write_str("invalid table size"),
      Self::ResizeDisabled => f.write_str("resize disabled"),
    }
  }
}

impl Error for DictError {}

// -----------------------------------------------------------------------------
// Dictionary Statistics
// -----------------------------------------------------------------------------

/// Structural snapshot of one backing table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableStats {
  /// Number of buckets.
  pub size: usize,
  /// Number of live entries.
  pub used: usize,
  /// Number of buckets with at least one entry.
  pub nonempty_buckets: usize,
  /// Length of the longest chain.
  pub max_chain_length: usize,
}

/// Structural snapshot of a dictionary.
///
/// Returned by [`Dict::stats`]; useful for observability and for tests
/// asserting sizing invariants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DictStats {
  /// Per-table statistics (`ht[0]`, `ht[1]`).
  pub tables: [TableStats; 2],
  /// `true` if an incremental rehash is in progress.
  pub rehashing: bool,
}

// -----------------------------------------------------------------------------
// Raw Insertion
// -----------------------------------------------------------------------------

/// The result of a low-level [`Dict::add_raw`] probe.
pub enum RawEntry<'d, K, V, T = DefaultDictType> {
  /// The key is absent. Supplying a value completes the insertion.
  Vacant(VacantSlot<'d, K, V, T>),
  /// The key is present. The probe key is handed back untouched.
  Existing {
    /// The entry currently holding the key.
    current: &'d mut Entry<K, V>,
    /// The key that was passed to [`Dict::add_raw`].
    key: K,
  },
}

impl<'d, K, V, T: DictType<K>> RawEntry<'d, K, V, T> {
  /// Returns the entry for the key, inserting `value` if absent.
  #[inline]
  pub fn or_insert(self, value: V) -> &'d mut Entry<K, V> {
    self.or_insert_with(|| value)
  }

  /// Returns the entry for the key, inserting a computed value if absent.
  pub fn or_insert_with<F>(self, value: F) -> &'d mut Entry<K, V>
  where
    F: FnOnce() -> V,
  {
    match self {
      Self::Vacant(slot) => slot.insert(value()),
      Self::Existing { current, .. } => current,
    }
  }
}

/// A claim on the bucket position where an absent key will be inserted.
///
/// Produced by [`Dict::add_raw`] when the key is not present: the key is
/// already owned by the slot, and [`insert`] links a new entry at the
/// head of its chain once the caller supplies the value.
///
/// [`insert`]: VacantSlot::insert
pub struct VacantSlot<'d, K, V, T = DefaultDictType> {
  dict: &'d mut Dict<K, V, T>,
  key: K,
  hash: u64,
}

impl<'d, K, V, T: DictType<K>> VacantSlot<'d, K, V, T> {
  /// Returns a reference to the key awaiting insertion.
  #[inline]
  pub fn key(&self) -> &K {
    &self.key
  }

  /// Completes the insertion, linking the entry at its bucket head.
  pub fn insert(self, value: V) -> &'d mut Entry<K, V> {
    let VacantSlot { dict, key, hash } = self;

    // While rehashing, new entries go straight to the destination table
    // so the migration front never has to revisit them.
    let target: usize = if dict.rehash_index.is_some() { 1 } else { 0 };
    let table: &mut Table<K, V> = &mut dict.ht[target];
    let index: usize = hash as usize & table.sizemask();

    table.used += 1;

    let bucket: &mut Bucket<K, V> = table.bucket_mut(index);
    let chain: Bucket<K, V> = bucket.take();

    bucket.insert(Entry::new(key, value, chain))
  }
}

// -----------------------------------------------------------------------------
// Dictionary
// -----------------------------------------------------------------------------

/// An open-chained hash table with two-table incremental rehashing.
///
/// Keys and values are owned by the dictionary; hashing and equality are
/// supplied by the [`DictType`] parameter, which defaults to standard
/// `Hash + Eq` semantics with a per-dictionary random seed.
///
/// All operations are single-threaded and non-blocking. Mutating
/// operations and lookups each advance a pending rehash by one bucket
/// (see the [module docs](self)), unless a safe iterator is open.
pub struct Dict<K, V, T = DefaultDictType> {
  ops: T,
  ht: [Table<K, V>; 2],
  rehash_index: Option<usize>,
  iterators: Cell<usize>,
  resize_enabled: bool,
}

impl<K, V> Dict<K, V> {
  /// Creates an empty dictionary with default key semantics.
  ///
  /// No buckets are allocated until the first insertion.
  #[inline]
  pub fn new() -> Self {
    Self::with_type(DefaultDictType::default())
  }
}

impl<K, V, T> Dict<K, V, T> {
  /// Creates an empty dictionary with the given key capabilities.
  pub fn with_type(ops: T) -> Self {
    Self {
      ops,
      ht: [Table::new(), Table::new()],
      rehash_index: None,
      iterators: Cell::new(0),
      resize_enabled: true,
    }
  }
}

impl<K, V, T: DictType<K>> Dict<K, V, T> {
  // ---------------------------------------------------------------------------
  // Introspection
  // ---------------------------------------------------------------------------

  /// Returns the number of live entries across both tables.
  #[inline]
  pub fn len(&self) -> usize {
    self.ht[0].used + self.ht[1].used
  }

  /// Returns `true` if the dictionary contains no entries.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns the total number of buckets across both tables.
  #[inline]
  pub fn slots(&self) -> usize {
    self.ht[0].size() + self.ht[1].size()
  }

  /// Returns `true` if an incremental rehash is in progress.
  #[inline]
  pub fn is_rehashing(&self) -> bool {
    self.rehash_index.is_some()
  }

  /// Returns the hash of `key` under this dictionary's key semantics.
  #[inline]
  pub fn hash_key(&self, key: &K) -> u64 {
    self.ops.hash(key)
  }

  /// Returns a structural snapshot of both tables.
  pub fn stats(&self) -> DictStats {
    fn table_stats<K, V>(table: &Table<K, V>) -> TableStats {
      let mut stats: TableStats = TableStats {
        size: table.size(),
        used: table.used,
        ..TableStats::default()
      };

      for bucket in &table.buckets {
        let mut length: usize = 0;
        let mut cursor: Option<&Entry<K, V>> = bucket.as_deref();

        while let Some(entry) = cursor {
          length += 1;
          cursor = entry.next.as_deref();
        }

        if length > 0 {
          stats.nonempty_buckets += 1;
          stats.max_chain_length = stats.max_chain_length.max(length);
        }
      }

      stats
    }

    DictStats {
      tables: [table_stats(&self.ht[0]), table_stats(&self.ht[1])],
      rehashing: self.is_rehashing(),
    }
  }

  // ---------------------------------------------------------------------------
  // Resize Policy
  // ---------------------------------------------------------------------------

  /// Permits opportunistic growth once `used >= size`.
  ///
  /// This is the default.
  #[inline]
  pub fn enable_resize(&mut self) {
    self.resize_enabled = true;
  }

  /// Suspends opportunistic growth.
  ///
  /// While disabled, the table still grows unconditionally once the load
  /// factor exceeds [`FORCE_RESIZE_RATIO`], at which point chains are too
  /// long to be usable. Typical use is suppressing table churn while an
  /// external observer walks the dictionary's memory.
  #[inline]
  pub fn disable_resize(&mut self) {
    self.resize_enabled = false;
  }

  // ---------------------------------------------------------------------------
  // Sizing
  // ---------------------------------------------------------------------------

  /// Grows (or initially allocates) the table to hold at least `size`
  /// entries at load factor one.
  ///
  /// The new table size is the smallest power of two at or above
  /// `max(size, used)`. On a populated dictionary this allocates `ht[1]`
  /// and arms incremental migration; the first allocation installs
  /// `ht[0]` directly.
  ///
  /// # Errors
  ///
  /// Returns [`DictError::RehashInProgress`] if a migration is already
  /// running, or [`DictError::InvalidSize`] if the computed size equals
  /// the current one.
  pub fn expand(&mut self, size: usize) -> Result<(), DictError> {
    if self.is_rehashing() {
      return Err(DictError::RehashInProgress);
    }

    let target: usize = size.max(self.ht[0].used);
    let realsize: usize = next_power(target);

    if realsize == self.ht[0].size() {
      return Err(DictError::InvalidSize);
    }

    tracing::debug!(
      size = realsize,
      used = self.ht[0].used,
      "allocating hash table"
    );

    let table: Table<K, V> = Table::with_size(realsize);

    if self.ht[0].size() == 0 {
      // First allocation: nothing to migrate.
      self.ht[0] = table;
    } else {
      self.ht[1] = table;
      self.rehash_index = Some(0);
    }

    Ok(())
  }

  /// Shrinks (or grows) the table to the current entry count, targeting
  /// a load factor of one.
  ///
  /// The result is never below [`HT_INITIAL_SIZE`] buckets.
  ///
  /// # Errors
  ///
  /// Returns [`DictError::ResizeDisabled`] if resizing is disabled,
  /// [`DictError::RehashInProgress`] if a migration is running, or
  /// [`DictError::InvalidSize`] if the table is already minimal.
  pub fn resize(&mut self) -> Result<(), DictError> {
    if !self.resize_enabled {
      return Err(DictError::ResizeDisabled);
    }

    if self.is_rehashing() {
      return Err(DictError::RehashInProgress);
    }

    self.expand(self.ht[0].used.max(HT_INITIAL_SIZE))
  }

  /// Grows the table if the load factor calls for it.
  ///
  /// Growth triggers at `used >= size` while resizing is enabled, and
  /// unconditionally once `used / size` exceeds [`FORCE_RESIZE_RATIO`].
  /// Suppressed entirely while a safe iterator is open.
  fn expand_if_needed(&mut self) {
    if self.is_rehashing() {
      return;
    }

    // Initial allocation moves no entries, so open cursors don't block it.
    if self.ht[0].size() == 0 {
      let _unused: Result<(), DictError> = self.expand(HT_INITIAL_SIZE);
      return;
    }

    if self.iterators.get() > 0 {
      return;
    }

    let used: usize = self.ht[0].used;
    let size: usize = self.ht[0].size();

    if used >= size && (self.resize_enabled || used / size > FORCE_RESIZE_RATIO) {
      let _unused: Result<(), DictError> = self.expand(used + 1);
    }
  }

  // ---------------------------------------------------------------------------
  // Rehashing
  // ---------------------------------------------------------------------------

  /// Migrates up to `steps` non-empty buckets from `ht[0]` to `ht[1]`.
  ///
  /// Empty buckets are skipped without counting against `steps`, bounded
  /// by [`REHASH_EMPTY_VISITS_RATIO`]` * steps` visits so a sparse table
  /// cannot stall the caller. Once `ht[0]` drains completely, `ht[1]` is
  /// swapped into its place and the migration ends.
  ///
  /// Returns `true` if migration work remains, `false` once the
  /// dictionary is fully rehashed (or was not rehashing at all).
  pub fn rehash(&mut self, steps: usize) -> bool {
    let Some(mut index) = self.rehash_index else {
      return false;
    };

    let mut empty_visits: usize = steps.saturating_mul(REHASH_EMPTY_VISITS_RATIO);
    let mut remaining: usize = steps;

    while remaining > 0 && self.ht[0].used > 0 {
      debug_assert!(index < self.ht[0].size());

      while self.ht[0].bucket(index).is_none() {
        index += 1;
        empty_visits -= 1;

        if empty_visits == 0 {
          self.rehash_index = Some(index);
          return true;
        }
      }

      // Move every entry of this bucket to its position in ht[1].
      let mut chain: Bucket<K, V> = self.ht[0].bucket_mut(index).take();

      while let Some(mut entry) = chain {
        chain = entry.next.take();

        let hash: u64 = self.ops.hash(&entry.key);
        let target: usize = hash as usize & self.ht[1].sizemask();

        entry.next = self.ht[1].bucket_mut(target).take();
        *self.ht[1].bucket_mut(target) = Some(entry);

        self.ht[0].used -= 1;
        self.ht[1].used += 1;
      }

      index += 1;
      remaining -= 1;
    }

    if self.ht[0].used == 0 {
      self.ht[0] = std::mem::take(&mut self.ht[1]);
      self.rehash_index = None;

      tracing::debug!(size = self.ht[0].size(), "rehash complete");

      return false;
    }

    self.rehash_index = Some(index);

    true
  }

  /// Drives migration in batches until roughly `millis` milliseconds of
  /// wall time have been spent.
  ///
  /// Returns the number of buckets offered for migration. The budget is
  /// checked between batches of [`REHASH_BATCH_BUCKETS`], so the overrun
  /// is bounded by one batch.
  pub fn rehash_for(&mut self, millis: u64) -> usize {
    let start: Instant = Instant::now();
    let mut buckets: usize = 0;

    while self.rehash(REHASH_BATCH_BUCKETS) {
      buckets += REHASH_BATCH_BUCKETS;

      if start.elapsed().as_millis() as u64 > millis {
        break;
      }
    }

    buckets
  }

  /// Performs a single bucket's worth of migration, unless a safe
  /// iterator has the table pinned.
  #[inline]
  fn rehash_step(&mut self) {
    if self.iterators.get() == 0 {
      self.rehash(1);
    }
  }

  // ---------------------------------------------------------------------------
  // Insertion
  // ---------------------------------------------------------------------------

  /// Probes for `key`, preparing an insertion if it is absent.
  ///
  /// This is the primitive under [`add`], [`replace`], and
  /// [`add_or_find`]: it advances a pending rehash by one step, grows
  /// the table if the load factor calls for it, and then either locates
  /// the existing entry or claims the bucket position where the new
  /// entry will be linked.
  ///
  /// [`add`]: Dict::add
  /// [`replace`]: Dict::replace
  /// [`add_or_find`]: Dict::add_or_find
  pub fn add_raw(&mut self, key: K) -> RawEntry<'_, K, V, T> {
    if self.is_rehashing() {
      self.rehash_step();
    }

    self.expand_if_needed();

    let hash: u64 = self.ops.hash(&key);

    match self.locate(&key, hash) {
      Some(table) => {
        let index: usize = hash as usize & self.ht[table].sizemask();
        let Self { ops, ht, .. } = self;

        match chain_find_mut(ht[table].bucket_mut(index), |entry| {
          ops.key_eq(&entry.key, &key)
        }) {
          Some(current) => RawEntry::Existing { current, key },
          None => unreachable!("located entry vanished"),
        }
      }
      None => RawEntry::Vacant(VacantSlot {
        dict: self,
        key,
        hash,
      }),
    }
  }

  /// Inserts a key-value pair.
  ///
  /// # Errors
  ///
  /// Returns [`DictError::DuplicateKey`] if the key is already present;
  /// the existing entry is left untouched.
  pub fn add(&mut self, key: K, value: V) -> Result<(), DictError> {
    match self.add_raw(key) {
      RawEntry::Vacant(slot) => {
        slot.insert(value);
        Ok(())
      }
      RawEntry::Existing { .. } => Err(DictError::DuplicateKey),
    }
  }

  /// Inserts a key-value pair, or updates the value in place if the key
  /// is present.
  ///
  /// Returns `true` if the key was newly inserted. On update the new
  /// value is installed before the old one is dropped, so values that
  /// reference their predecessor stay coherent.
  pub fn replace(&mut self, key: K, value: V) -> bool {
    match self.add_raw(key) {
      RawEntry::Vacant(slot) => {
        slot.insert(value);
        true
      }
      RawEntry::Existing { current, .. } => {
        drop(current.set_value(value));
        false
      }
    }
  }

  /// Returns the entry for `key`, inserting `value` if absent.
  pub fn add_or_find(&mut self, key: K, value: V) -> &mut Entry<K, V> {
    self.add_raw(key).or_insert(value)
  }

  // ---------------------------------------------------------------------------
  // Removal
  // ---------------------------------------------------------------------------

  /// Removes the entry for `key` and drops it.
  ///
  /// Returns `true` if an entry was removed.
  #[inline]
  pub fn delete(&mut self, key: &K) -> bool {
    self.generic_delete(key).is_some()
  }

  /// Detaches the entry for `key` from its chain without dropping it.
  ///
  /// The detached entry can be inspected before being released with
  /// [`free_unlinked`]. This two-step form exists for callers that need
  /// the key or value after the dictionary no longer tracks them.
  ///
  /// [`free_unlinked`]: Dict::free_unlinked
  #[inline]
  pub fn unlink(&mut self, key: &K) -> Option<Box<Entry<K, V>>> {
    self.generic_delete(key)
  }

  /// Releases an entry previously detached by [`unlink`].
  ///
  /// [`unlink`]: Dict::unlink
  #[inline]
  pub fn free_unlinked(&mut self, entry: Box<Entry<K, V>>) {
    drop(entry);
  }

  fn generic_delete(&mut self, key: &K) -> Option<Box<Entry<K, V>>> {
    if self.is_empty() {
      return None;
    }

    if self.is_rehashing() {
      self.rehash_step();
    }

    let hash: u64 = self.ops.hash(key);
    let rehashing: bool = self.is_rehashing();
    let Self { ops, ht, .. } = self;

    for table in 0..2 {
      if ht[table].size() == 0 {
        break;
      }

      let index: usize = hash as usize & ht[table].sizemask();

      if let Some(entry) = chain_unlink(ht[table].bucket_mut(index), |entry| {
        ops.key_eq(&entry.key, key)
      }) {
        ht[table].used -= 1;
        return Some(entry);
      }

      if !rehashing {
        break;
      }
    }

    None
  }

  /// Drops every entry and deallocates both tables.
  #[inline]
  pub fn clear(&mut self) {
    self.clear_with(|_| {});
  }

  /// Drops every entry, invoking `progress` with the bucket index every
  /// [`CLEAR_CALLBACK_INTERVAL`] buckets.
  ///
  /// The callback gives long-running drains of huge tables a chance to
  /// keep the rest of the application responsive (flush output, touch a
  /// watchdog) between batches.
  pub fn clear_with<F>(&mut self, mut progress: F)
  where
    F: FnMut(usize),
  {
    for table in &mut self.ht {
      for index in 0..table.size() {
        if index & CLEAR_CALLBACK_INTERVAL == 0 {
          progress(index);
        }

        if table.used == 0 {
          break;
        }

        let mut cursor: Bucket<K, V> = table.bucket_mut(index).take();

        while let Some(mut entry) = cursor {
          cursor = entry.next.take();
          table.used -= 1;
          drop(entry);
        }
      }

      *table = Table::new();
    }

    self.rehash_index = None;
    self.iterators.set(0);
  }

  // ---------------------------------------------------------------------------
  // Lookup
  // ---------------------------------------------------------------------------

  /// Returns the entry for `key`, advancing a pending rehash one step.
  pub fn find(&mut self, key: &K) -> Option<&Entry<K, V>> {
    if self.is_empty() {
      return None;
    }

    if self.is_rehashing() {
      self.rehash_step();
    }

    let hash: u64 = self.ops.hash(key);
    let table: usize = self.locate(key, hash)?;
    let index: usize = hash as usize & self.ht[table].sizemask();

    chain_find(self.ht[table].bucket(index), |entry| {
      self.ops.key_eq(&entry.key, key)
    })
  }

  /// Returns the entry for `key` mutably, advancing a pending rehash one
  /// step.
  pub fn find_mut(&mut self, key: &K) -> Option<&mut Entry<K, V>> {
    if self.is_empty() {
      return None;
    }

    if self.is_rehashing() {
      self.rehash_step();
    }

    let hash: u64 = self.ops.hash(key);
    let table: usize = self.locate(key, hash)?;
    let index: usize = hash as usize & self.ht[table].sizemask();
    let Self { ops, ht, .. } = self;

    chain_find_mut(ht[table].bucket_mut(index), |entry| {
      ops.key_eq(&entry.key, key)
    })
  }

  /// Returns the value stored for `key`.
  #[inline]
  pub fn fetch_value(&mut self, key: &K) -> Option<&V> {
    self.find(key).map(Entry::value)
  }

  /// Returns the index of the table whose chain holds `key`, searching
  /// `ht[0]` first and `ht[1]` only while rehashing.
  fn locate(&self, key: &K, hash: u64) -> Option<usize> {
    if self.is_empty() {
      return None;
    }

    for table in 0..2 {
      if self.ht[table].size() == 0 {
        break;
      }

      let index: usize = hash as usize & self.ht[table].sizemask();

      let found: Option<&Entry<K, V>> = chain_find(self.ht[table].bucket(index), |entry| {
        self.ops.key_eq(&entry.key, key)
      });

      if found.is_some() {
        return Some(table);
      }

      if !self.is_rehashing() {
        break;
      }
    }

    None
  }
}

impl<K, V> Default for Dict<K, V> {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, T> Debug for Dict<K, V, T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Dict")
      .field("len", &(self.ht[0].used + self.ht[1].used))
      .field("slots", &(self.ht[0].size() + self.ht[1].size()))
      .field("rehashing", &self.rehash_index.is_some())
      .field("iterators", &self.iterators.get())
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Chain Helpers
// -----------------------------------------------------------------------------

/// Returns the smallest valid table size at or above `size`.
fn next_power(size: usize) -> usize {
  size.next_power_of_two().max(HT_INITIAL_SIZE)
}

/// Returns the first entry in `bucket` matching `pred`.
fn chain_find<K, V, F>(bucket: &Bucket<K, V>, pred: F) -> Option<&Entry<K, V>>
where
  F: Fn(&Entry<K, V>) -> bool,
{
  let mut cursor: Option<&Entry<K, V>> = bucket.as_deref();

  while let Some(entry) = cursor {
    if pred(entry) {
      return Some(entry);
    }

    cursor = entry.next.as_deref();
  }

  None
}

/// Returns the first entry in `bucket` matching `pred`, mutably.
fn chain_find_mut<K, V, F>(bucket: &mut Bucket<K, V>, pred: F) -> Option<&mut Entry<K, V>>
where
  F: Fn(&Entry<K, V>) -> bool,
{
  let mut cursor: &mut Bucket<K, V> = bucket;

  while let Some(entry) = cursor {
    if pred(entry) {
      return Some(entry);
    }

    cursor = &mut entry.next;
  }

  None
}

/// Detaches and returns the first entry in `bucket` matching `pred`,
/// splicing its successor into its place.
fn chain_unlink<K, V, F>(bucket: &mut Bucket<K, V>, pred: F) -> Option<Box<Entry<K, V>>>
where
  F: Fn(&Entry<K, V>) -> bool,
{
  let mut cursor: &mut Bucket<K, V> = bucket;

  loop {
    let matched: bool = match cursor.as_deref() {
      Some(entry) => pred(entry),
      None => return None,
    };

    if matched {
      let mut taken: Box<Entry<K, V>> = cursor.take()?;
      *cursor = taken.next.take();
      return Some(taken);
    }

    let Some(entry) = cursor else {
      return None;
    };

    cursor = &mut entry.next;
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  type Dict = super::Dict<String, usize>;

  fn filled(count: usize) -> Dict {
    let mut dict: Dict = Dict::new();

    for index in 0..count {
      dict.add(format!("k{index}"), index).unwrap();
    }

    dict
  }

  #[test]
  fn test_new() {
    let dict: Dict = Dict::new();

    assert_eq!(dict.len(), 0);
    assert_eq!(dict.slots(), 0);
    assert!(dict.is_empty());
    assert!(!dict.is_rehashing());
  }

  #[test]
  fn test_add_and_find() {
    let mut dict: Dict = Dict::new();

    dict.add("alpha".into(), 1).unwrap();
    dict.add("beta".into(), 2).unwrap();

    assert_eq!(dict.len(), 2);
    assert_eq!(dict.fetch_value(&"alpha".into()), Some(&1));
    assert_eq!(dict.fetch_value(&"beta".into()), Some(&2));
    assert_eq!(dict.fetch_value(&"gamma".into()), None);
  }

  #[test]
  fn test_add_duplicate() {
    let mut dict: Dict = Dict::new();

    dict.add("alpha".into(), 1).unwrap();

    assert_eq!(
      dict.add("alpha".into(), 2),
      Err(DictError::DuplicateKey),
      "duplicate insert must be rejected",
    );

    assert_eq!(dict.fetch_value(&"alpha".into()), Some(&1));
  }

  #[test]
  fn test_first_insert_allocates_initial_size() {
    let mut dict: Dict = Dict::new();

    dict.add("alpha".into(), 1).unwrap();

    assert_eq!(dict.stats().tables[0].size, crate::consts::HT_INITIAL_SIZE);
  }

  #[test]
  fn test_replace_inserts_and_updates() {
    let mut dict: Dict = Dict::new();

    assert!(dict.replace("alpha".into(), 1));
    assert!(!dict.replace("alpha".into(), 2));
    assert_eq!(dict.fetch_value(&"alpha".into()), Some(&2));
    assert_eq!(dict.len(), 1);
  }

  #[test]
  fn test_add_or_find() {
    let mut dict: Dict = Dict::new();

    assert_eq!(*dict.add_or_find("alpha".into(), 7).value(), 7);
    assert_eq!(*dict.add_or_find("alpha".into(), 9).value(), 7);
    assert_eq!(dict.len(), 1);
  }

  #[test]
  fn test_delete() {
    let mut dict: Dict = filled(8);

    assert!(dict.delete(&"k3".into()));
    assert!(!dict.delete(&"k3".into()));
    assert_eq!(dict.len(), 7);
    assert_eq!(dict.fetch_value(&"k3".into()), None);
  }

  #[test]
  fn test_unlink_then_free() {
    let mut dict: Dict = filled(8);

    let entry: Box<Entry<String, usize>> = dict.unlink(&"k5".into()).unwrap();

    assert_eq!(entry.key(), "k5");
    assert_eq!(*entry.value(), 5);
    assert_eq!(dict.len(), 7);

    dict.free_unlinked(entry);

    assert_eq!(dict.fetch_value(&"k5".into()), None);
  }

  #[test]
  fn test_len_tracks_adds_and_deletes() {
    let mut dict: Dict = Dict::new();

    for index in 0..64 {
      dict.add(format!("k{index}"), index).unwrap();
      assert_eq!(dict.len(), index + 1);
    }

    for index in 0..64 {
      assert!(dict.delete(&format!("k{index}")));
      assert_eq!(dict.len(), 63 - index);
    }
  }

  #[test]
  fn test_table_sizes_are_powers_of_two() {
    let mut dict: Dict = Dict::new();

    for index in 0..1000 {
      dict.add(format!("k{index}"), index).unwrap();

      let stats: DictStats = dict.stats();

      assert!(stats.tables[0].size.is_power_of_two());
      assert!(stats.tables[1].size == 0 || stats.tables[1].size.is_power_of_two());
    }
  }

  #[test]
  fn test_expand_arms_rehash() {
    let mut dict: Dict = filled(4);

    dict.expand(64).unwrap();

    assert!(dict.is_rehashing());
    assert_eq!(dict.stats().tables[1].size, 64);
  }

  #[test]
  fn test_expand_while_rehashing() {
    let mut dict: Dict = filled(4);

    dict.expand(64).unwrap();

    assert_eq!(dict.expand(128), Err(DictError::RehashInProgress));
  }

  #[test]
  fn test_expand_same_size() {
    let mut dict: Dict = filled(1);

    assert_eq!(dict.expand(3), Err(DictError::InvalidSize));
  }

  #[test]
  fn test_rehash_to_completion() {
    let mut dict: Dict = filled(4);

    dict.expand(64).unwrap();

    while dict.rehash(8) {}

    let stats: DictStats = dict.stats();

    assert!(!dict.is_rehashing());
    assert_eq!(stats.tables[0].size, 64);
    assert_eq!(stats.tables[1].size, 0);
    assert_eq!(stats.tables[1].used, 0);

    for index in 0..4 {
      assert_eq!(dict.fetch_value(&format!("k{index}")), Some(&index));
    }
  }

  #[test]
  fn test_find_during_rehash() {
    let mut dict: Dict = filled(100);

    // Growth from 100 inserts leaves a migration in flight at some point;
    // force one deterministically.
    if !dict.is_rehashing() {
      dict.expand(512).unwrap();
    }

    for index in 0..100 {
      assert_eq!(
        dict.fetch_value(&format!("k{index}")),
        Some(&index),
        "key k{index} must be reachable mid-rehash",
      );
    }
  }

  #[test]
  fn test_mutations_advance_rehash() {
    let mut dict: Dict = filled(4);

    dict.expand(256).unwrap();
    assert!(dict.is_rehashing());

    // Each lookup migrates one bucket; 256 old buckets is plenty.
    for _ in 0..512 {
      let _unused: Option<&usize> = dict.fetch_value(&"k0".into());
    }

    assert!(!dict.is_rehashing());
  }

  #[test]
  fn test_rehash_for_spends_budget() {
    let mut dict: Dict = filled(500);

    while dict.rehash(1024) {}

    dict.expand(1 << 16).unwrap();

    // The old table holds 512 buckets, so the migration spans several
    // batches before the budget check can observe completion.
    let buckets: usize = dict.rehash_for(1000);

    assert!(buckets > 0);
    assert!(!dict.is_rehashing());
  }

  #[test]
  fn test_resize_shrinks_after_deletes() {
    let mut dict: Dict = filled(1000);

    while dict.rehash(1024) {}

    for index in 0..990 {
      dict.delete(&format!("k{index}"));
    }

    dict.resize().unwrap();

    while dict.rehash(1024) {}

    let stats: DictStats = dict.stats();

    assert_eq!(stats.tables[0].size, 16);
    assert_eq!(dict.len(), 10);
  }

  #[test]
  fn test_resize_disabled() {
    let mut dict: Dict = filled(8);

    dict.disable_resize();

    assert_eq!(dict.resize(), Err(DictError::ResizeDisabled));
  }

  #[test]
  fn test_disable_resize_defers_growth() {
    let mut dict: Dict = Dict::new();

    dict.disable_resize();

    // Load factor may exceed one, but not the forced ratio.
    for index in 0..16 {
      dict.add(format!("k{index}"), index).unwrap();
    }

    assert_eq!(dict.stats().tables[0].size, 4);

    // Past used/size > FORCE_RESIZE_RATIO growth happens regardless.
    for index in 16..64 {
      dict.add(format!("k{index}"), index).unwrap();
    }

    assert!(dict.slots() > 4);
  }

  #[test]
  fn test_clear() {
    let mut dict: Dict = filled(100);

    dict.clear();

    assert_eq!(dict.len(), 0);
    assert_eq!(dict.slots(), 0);
    assert!(!dict.is_rehashing());
    assert_eq!(dict.fetch_value(&"k0".into()), None);
  }

  #[test]
  fn test_clear_with_reports_progress() {
    let mut dict: Dict = filled(10);
    let mut calls: usize = 0;

    dict.clear_with(|_| calls += 1);

    assert!(calls > 0);
  }

  #[test]
  fn test_value_replace_order() {
    // The old value must survive until after the new one is installed.
    let mut dict: super::Dict<String, Vec<usize>> = super::Dict::new();

    dict.add("k".into(), vec![1, 2, 3]).unwrap();

    let entry: &mut Entry<String, Vec<usize>> = dict.find_mut(&"k".into()).unwrap();
    let mut next: Vec<usize> = entry.value().clone();

    next.push(4);

    let old: Vec<usize> = entry.set_value(next);

    assert_eq!(old, vec![1, 2, 3]);
    assert_eq!(dict.fetch_value(&"k".into()), Some(&vec![1, 2, 3, 4]));
  }

  #[test]
  fn test_stats_chain_shape() {
    let dict: Dict = filled(100);
    let stats: DictStats = dict.stats();

    assert_eq!(stats.tables[0].used + stats.tables[1].used, 100);
    assert!(stats.tables[0].max_chain_length >= 1);
    assert!(stats.tables[0].nonempty_buckets <= stats.tables[0].size);
  }
}
