use std::marker::PhantomData;
use std::ptr;
use std::ptr::NonNull;

use crate::core::fatal;
use crate::dict::DefaultDictType;
use crate::dict::Dict;
use crate::dict::DictType;
use crate::dict::Entry;

// -----------------------------------------------------------------------------
// Fingerprint
// -----------------------------------------------------------------------------

impl<K, V, T: DictType<K>> Dict<K, V, T> {
  /// Returns a 64-bit digest of the dictionary's structural state.
  ///
  /// The digest covers the bucket array addresses, sizes, and entry
  /// counts of both tables, folded through an integer mix so that any
  /// single-field change flips the result. Unchecked cursors compare the
  /// digest taken at creation against the one at release to detect
  /// mutations that happened in between.
  pub(super) fn fingerprint(&self) -> u64 {
    let integers: [u64; 6] = [
      self.ht[0].fingerprint_addr(),
      self.ht[0].size() as u64,
      self.ht[0].used as u64,
      self.ht[1].fingerprint_addr(),
      self.ht[1].size() as u64,
      self.ht[1].used as u64,
    ];

    let mut hash: u64 = 0;

    for value in integers {
      hash = hash.wrapping_add(value);
      hash = (!hash).wrapping_add(hash << 21);
      hash ^= hash >> 24;
      hash = hash.wrapping_add(hash << 3).wrapping_add(hash << 8);
      hash ^= hash >> 14;
      hash = hash.wrapping_add(hash << 2).wrapping_add(hash << 4);
      hash ^= hash >> 28;
      hash = hash.wrapping_add(hash << 31);
    }

    hash
  }

  /// Creates an unchecked cursor over every entry.
  ///
  /// The dictionary must not be mutated, directly or through any
  /// operation that advances rehashing, until the cursor is
  /// [`released`]; release re-derives the structural fingerprint and
  /// aborts the process on a mismatch.
  ///
  /// [`released`]: DictIterator::release
  #[inline]
  pub fn iterator(&self) -> DictIterator<K, V, T> {
    DictIterator::new(self, false)
  }

  /// Creates a safe cursor over every entry.
  ///
  /// From the first [`next`] until [`release`], the dictionary counts
  /// the cursor as open, which suspends incremental rehash steps and the
  /// opportunistic resize trigger so bucket positions stay put. The
  /// dictionary may be mutated while the cursor is open, with one
  /// restriction: the only entry that may be removed is the one most
  /// recently yielded (its successor is cached, so unlinking it never
  /// strands the cursor).
  ///
  /// [`next`]: DictIterator::next
  /// [`release`]: DictIterator::release
  #[inline]
  pub fn safe_iterator(&self) -> DictIterator<K, V, T> {
    DictIterator::new(self, true)
  }
}

// -----------------------------------------------------------------------------
// Dictionary Iterator
// -----------------------------------------------------------------------------

/// A detached cursor over the entries of a [`Dict`].
///
/// The cursor does not borrow the dictionary; instead, every call to
/// [`next`] and [`release`] takes the dictionary as an argument, which is
/// what allows the safe kind to interleave with mutating operations. Both
/// kinds walk `ht[0]` in ascending bucket order and continue into `ht[1]`
/// while a rehash is in progress; entries within a bucket are yielded in
/// chain order.
///
/// # Contract
///
/// The cursor is bound to the dictionary that created it: passing any
/// other dictionary to [`next`] or [`release`] aborts the process, and
/// the dictionary must not be moved or dropped while a cursor is open.
/// Cursors must be released; a safe cursor dropped without release keeps
/// the dictionary's rehashing paused indefinitely.
///
/// [`next`]: DictIterator::next
/// [`release`]: DictIterator::release
pub struct DictIterator<K, V, T = DefaultDictType> {
  origin: *const Dict<K, V, T>,
  table: usize,
  index: Option<usize>,
  entry: Option<NonNull<Entry<K, V>>>,
  next_entry: Option<NonNull<Entry<K, V>>>,
  fingerprint: u64,
  safe: bool,
  started: bool,
  released: bool,
  _marker: PhantomData<*const ()>,
}

impl<K, V, T: DictType<K>> DictIterator<K, V, T> {
  fn new(dict: &Dict<K, V, T>, safe: bool) -> Self {
    Self {
      origin: dict,
      table: 0,
      index: None,
      entry: None,
      next_entry: None,
      fingerprint: if safe { 0 } else { dict.fingerprint() },
      safe,
      started: false,
      released: false,
      _marker: PhantomData,
    }
  }

  /// Returns the next entry, or `None` once the walk is complete.
  ///
  /// The successor of the yielded entry is cached before returning, so a
  /// caller holding a safe cursor may unlink the yielded entry without
  /// losing its place.
  pub fn next<'d>(&mut self, dict: &'d Dict<K, V, T>) -> Option<&'d Entry<K, V>> {
    self.check_origin(dict);

    loop {
      let candidate: Option<NonNull<Entry<K, V>>> = if self.entry.is_some() {
        self.next_entry
      } else {
        // Advance to the next bucket, crossing into the second table at
        // the end of the first while a rehash is in progress.
        if !self.started {
          self.started = true;

          if self.safe {
            dict.iterators.set(dict.iterators.get() + 1);
          }
        }

        let mut index: usize = self.index.map_or(0, |index| index + 1);

        if index >= dict.ht[self.table].size() {
          if dict.is_rehashing() && self.table == 0 {
            self.table = 1;
            index = 0;
          } else {
            return None;
          }
        }

        self.index = Some(index);

        dict.ht[self.table].bucket(index).as_deref().map(NonNull::from)
      };

      self.entry = candidate;

      if let Some(pointer) = candidate {
        // SAFETY: The pointer was derived from `dict` (checked against
        // `origin` above) either this call or, for a cached successor,
        // while the cursor held the chain stable: safe cursors suspend
        // rehashing and forbid removing anything but the yielded entry,
        // and unchecked cursors forbid mutation outright.
        let entry: &'d Entry<K, V> = unsafe { &*pointer.as_ptr() };

        self.next_entry = entry.next.as_deref().map(NonNull::from);

        return Some(entry);
      }
    }
  }

  /// Releases the cursor.
  ///
  /// A safe cursor un-pins the dictionary, re-enabling incremental
  /// rehashing. An unchecked cursor verifies the structural fingerprint
  /// and aborts the process if the dictionary was mutated during the
  /// walk.
  pub fn release(mut self, dict: &Dict<K, V, T>) {
    self.check_origin(dict);

    if self.safe {
      if self.started {
        dict.iterators.set(dict.iterators.get() - 1);
      }
    } else if dict.fingerprint() != self.fingerprint {
      fatal!("dictionary mutated during unchecked iteration");
    }

    self.released = true;
  }

  fn check_origin(&self, dict: &Dict<K, V, T>) {
    if !ptr::eq(self.origin, dict) {
      fatal!("cursor passed a dictionary other than its origin");
    }
  }
}

impl<K, V, T> Drop for DictIterator<K, V, T> {
  fn drop(&mut self) {
    if self.started && !self.released {
      tracing::warn!(
        safe = self.safe,
        "dictionary cursor dropped without release"
      );
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
