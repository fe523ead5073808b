use crate::dict::Entry;

/// A bucket: the owned head of an entry chain, or empty.
pub(crate) type Bucket<K, V> = Option<Box<Entry<K, V>>>;

// -----------------------------------------------------------------------------
// Hash Table
// -----------------------------------------------------------------------------

/// One of the two tables backing a dictionary.
///
/// The bucket array length is always zero or a power of two, so the
/// index mask is `size - 1` by construction. `used` counts live entries
/// across all chains, which may exceed the bucket count while growth is
/// pending.
pub(crate) struct Table<K, V> {
  pub(super) buckets: Vec<Bucket<K, V>>,
  pub(super) used: usize,
}

impl<K, V> Table<K, V> {
  /// Creates an unallocated table.
  #[inline]
  pub(super) const fn new() -> Self {
    Self {
      buckets: Vec::new(),
      used: 0,
    }
  }

  /// Creates a table with `size` empty buckets.
  ///
  /// `size` must be a power of two.
  pub(super) fn with_size(size: usize) -> Self {
    debug_assert!(size.is_power_of_two());

    let mut buckets: Vec<Bucket<K, V>> = Vec::with_capacity(size);

    buckets.resize_with(size, || None);

    Self { buckets, used: 0 }
  }

  /// Returns the number of buckets.
  #[inline]
  pub(super) fn size(&self) -> usize {
    self.buckets.len()
  }

  /// Returns the bucket index mask (`size - 1`).
  ///
  /// Only meaningful while the table is allocated.
  #[inline]
  pub(super) fn sizemask(&self) -> usize {
    debug_assert!(!self.buckets.is_empty());
    self.buckets.len() - 1
  }

  /// Returns the bucket for `hash`.
  #[inline]
  pub(super) fn bucket(&self, index: usize) -> &Bucket<K, V> {
    &self.buckets[index]
  }

  /// Returns the bucket for `hash`, mutably.
  #[inline]
  pub(super) fn bucket_mut(&mut self, index: usize) -> &mut Bucket<K, V> {
    &mut self.buckets[index]
  }

  /// Returns the address of the bucket array, for fingerprinting.
  #[inline]
  pub(super) fn fingerprint_addr(&self) -> u64 {
    if self.buckets.is_empty() {
      0
    } else {
      self.buckets.as_ptr() as u64
    }
  }
}

impl<K, V> Default for Table<K, V> {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}
