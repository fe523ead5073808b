use crate::dict::Dict;
use crate::dict::DictType;
use crate::dict::Entry;
use crate::dict::Table;

// -----------------------------------------------------------------------------
// Scan
// -----------------------------------------------------------------------------

impl<K, V, T: DictType<K>> Dict<K, V, T> {
  /// Visits one cursor position's worth of entries.
  ///
  /// See [`scan_buckets`] for the full protocol; this variant omits the
  /// per-bucket callback.
  ///
  /// [`scan_buckets`]: Dict::scan_buckets
  #[inline]
  pub fn scan<F>(&self, cursor: u64, mut entry_fn: F) -> u64
  where
    F: FnMut(&Entry<K, V>),
  {
    self.scan_buckets(cursor, |_| {}, &mut entry_fn)
  }

  /// Visits one cursor position's worth of buckets and entries, and
  /// returns the cursor to pass to the next call.
  ///
  /// The caller threads the returned cursor through repeated calls,
  /// starting from `0`; the scan is complete when a call returns `0`
  /// again. `bucket_fn` receives each visited bucket's chain head before
  /// `entry_fn` receives its entries.
  ///
  /// Because the cursor stays in the caller's hands between calls, the
  /// dictionary may grow, shrink, or rehash between them. The cursor
  /// advances by incrementing the bits above the bucket mask in reversed
  /// order, which keeps the visited/unvisited split meaningful across
  /// table-size changes: every entry present for the whole scan is
  /// visited at least once, entries added or removed mid-scan may or may
  /// not be, and no entry present throughout is reported more than
  /// twice. Replacing the dictionary mid-scan invalidates the cursor
  /// outright.
  ///
  /// While a rehash is in progress, each call visits the matching bucket
  /// of the smaller table plus every bucket of the larger table whose
  /// index expands it.
  pub fn scan_buckets<B, F>(&self, mut cursor: u64, mut bucket_fn: B, mut entry_fn: F) -> u64
  where
    B: FnMut(Option<&Entry<K, V>>),
    F: FnMut(&Entry<K, V>),
  {
    if self.is_empty() {
      return 0;
    }

    if !self.is_rehashing() {
      let table: &Table<K, V> = &self.ht[0];
      let mask: u64 = table.sizemask() as u64;

      emit_bucket(table, (cursor & mask) as usize, &mut bucket_fn, &mut entry_fn);

      cursor |= !mask;
      cursor = cursor.reverse_bits();
      cursor = cursor.wrapping_add(1);
      cursor = cursor.reverse_bits();

      return cursor;
    }

    let (small, large): (&Table<K, V>, &Table<K, V>) = if self.ht[0].size() > self.ht[1].size() {
      (&self.ht[1], &self.ht[0])
    } else {
      (&self.ht[0], &self.ht[1])
    };

    let small_mask: u64 = small.sizemask() as u64;
    let large_mask: u64 = large.sizemask() as u64;

    emit_bucket(
      small,
      (cursor & small_mask) as usize,
      &mut bucket_fn,
      &mut entry_fn,
    );

    // Visit every bucket of the larger table whose low bits expand the
    // small-table index, then advance over the larger mask.
    loop {
      emit_bucket(
        large,
        (cursor & large_mask) as usize,
        &mut bucket_fn,
        &mut entry_fn,
      );

      cursor |= !large_mask;
      cursor = cursor.reverse_bits();
      cursor = cursor.wrapping_add(1);
      cursor = cursor.reverse_bits();

      if cursor & (small_mask ^ large_mask) == 0 {
        break;
      }
    }

    cursor
  }
}

fn emit_bucket<K, V, B, F>(table: &Table<K, V>, index: usize, bucket_fn: &mut B, entry_fn: &mut F)
where
  B: FnMut(Option<&Entry<K, V>>),
  F: FnMut(&Entry<K, V>),
{
  let head: Option<&Entry<K, V>> = table.bucket(index).as_deref();

  bucket_fn(head);

  let mut cursor: Option<&Entry<K, V>> = head;

  while let Some(entry) = cursor {
    entry_fn(entry);
    cursor = entry.next.as_deref();
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::collections::HashMap;
  use std::collections::HashSet;

  use crate::dict::Dict;

  fn filled(count: usize) -> Dict<String, usize> {
    let mut dict: Dict<String, usize> = Dict::new();

    for index in 0..count {
      dict.add(format!("k{index}"), index).unwrap();
    }

    dict
  }

  fn scan_all(dict: &Dict<String, usize>) -> HashMap<String, usize> {
    let mut visits: HashMap<String, usize> = HashMap::new();
    let mut cursor: u64 = 0;

    loop {
      cursor = dict.scan(cursor, |entry| {
        *visits.entry(entry.key().clone()).or_insert(0) += 1;
      });

      if cursor == 0 {
        break;
      }
    }

    visits
  }

  #[test]
  fn test_scan_empty() {
    let dict: Dict<String, usize> = Dict::new();

    assert_eq!(dict.scan(0, |_| {}), 0);
  }

  #[test]
  fn test_scan_visits_every_key() {
    let dict: Dict<String, usize> = filled(500);
    let visits: HashMap<String, usize> = scan_all(&dict);

    assert_eq!(visits.len(), 500);

    for (key, count) in &visits {
      assert!(
        *count <= 2,
        "key {key} visited {count} times in a single pass",
      );
    }
  }

  #[test]
  fn test_scan_during_rehash() {
    let mut dict: Dict<String, usize> = filled(64);

    while dict.rehash(64) {}

    dict.expand(1024).unwrap();
    dict.rehash(8);
    assert!(dict.is_rehashing());

    let visits: HashMap<String, usize> = scan_all(&dict);

    assert_eq!(visits.len(), 64);

    for count in visits.values() {
      assert!(*count <= 2);
    }
  }

  #[test]
  fn test_scan_with_interleaved_growth() {
    // Keys present for the whole scan must be seen even if the table
    // grows between cursor calls.
    let mut dict: Dict<String, usize> = filled(32);
    let mut seen: HashSet<String> = HashSet::new();
    let mut cursor: u64 = 0;
    let mut extra: usize = 0;

    loop {
      let mut chunk: Vec<String> = Vec::new();

      cursor = dict.scan(cursor, |entry| chunk.push(entry.key().clone()));
      seen.extend(chunk);

      // Grow the dictionary mid-scan.
      dict.add(format!("extra{extra}"), extra).unwrap();
      extra += 1;

      if cursor == 0 {
        break;
      }
    }

    for index in 0..32 {
      assert!(
        seen.contains(&format!("k{index}")),
        "k{index} missed by scan despite being present throughout",
      );
    }
  }

  #[test]
  fn test_scan_buckets_reports_heads() {
    let dict: Dict<String, usize> = filled(16);
    let mut buckets: usize = 0;
    let mut entries: usize = 0;
    let mut cursor: u64 = 0;

    loop {
      cursor = dict.scan_buckets(
        cursor,
        |_head| buckets += 1,
        |_entry| entries += 1,
      );

      if cursor == 0 {
        break;
      }
    }

    assert!(buckets >= dict.stats().tables[0].nonempty_buckets);
    assert_eq!(entries, 16);
  }
}
