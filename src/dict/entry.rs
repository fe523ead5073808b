use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::mem;

// -----------------------------------------------------------------------------
// Entry
// -----------------------------------------------------------------------------

/// A single key-value node in a bucket chain.
///
/// Entries are owned links: each entry owns its successor through `next`,
/// and the bucket array owns the chain head. New entries are linked at
/// the head of their bucket, so a chain lists entries in reverse
/// insertion order.
pub struct Entry<K, V> {
  pub(super) key: K,
  pub(super) value: V,
  pub(super) next: Option<Box<Entry<K, V>>>,
}

impl<K, V> Entry<K, V> {
  #[inline]
  pub(super) fn new(key: K, value: V, next: Option<Box<Entry<K, V>>>) -> Box<Self> {
    Box::new(Self { key, value, next })
  }

  /// Returns a reference to the entry key.
  #[inline]
  pub fn key(&self) -> &K {
    &self.key
  }

  /// Returns a reference to the entry value.
  #[inline]
  pub fn value(&self) -> &V {
    &self.value
  }

  /// Returns a mutable reference to the entry value.
  #[inline]
  pub fn value_mut(&mut self) -> &mut V {
    &mut self.value
  }

  /// Installs `value` and returns the previous value.
  ///
  /// The new value is in place before the old one is handed back, so a
  /// replacement computed from the old value stays valid for as long as
  /// the caller keeps the returned one alive.
  #[inline]
  pub fn set_value(&mut self, value: V) -> V {
    mem::replace(&mut self.value, value)
  }
}

impl<K, V> Drop for Entry<K, V> {
  fn drop(&mut self) {
    // Unlink successors iteratively so dropping a long chain cannot
    // overflow the stack on recursive box drops.
    let mut cursor: Option<Box<Entry<K, V>>> = self.next.take();

    while let Some(mut entry) = cursor {
      cursor = entry.next.take();
    }
  }
}

impl<K: Debug, V: Debug> Debug for Entry<K, V> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Entry")
      .field("key", &self.key)
      .field("value", &self.value)
      .finish_non_exhaustive()
  }
}
