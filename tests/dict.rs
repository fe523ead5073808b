//! End-to-end dictionary tests.

use std::collections::HashSet;

use vela::consts::HT_INITIAL_SIZE;
use vela::dict::Dict;
use vela::dict::DictError;
use vela::dict::DictIterator;
use vela::dict::DictStats;
use vela::dict::Entry;

fn filled(count: usize) -> Dict<String, usize> {
  let mut dict: Dict<String, usize> = Dict::new();

  for index in 0..count {
    dict.add(format!("k{index}"), index).unwrap();
  }

  dict
}

// -----------------------------------------------------------------------------
// Growth
// -----------------------------------------------------------------------------

#[test]
fn test_bulk_insert_invariants() {
  let mut dict: Dict<String, usize> = Dict::new();

  for index in 0..1000 {
    dict.add(format!("k{index}"), index).unwrap();

    if (index + 1) % 50 == 0 {
      let stats: DictStats = dict.stats();

      assert_eq!(dict.len(), index + 1);

      assert!(stats.tables[0].size.is_power_of_two());
      assert!(stats.tables[1].size == 0 || stats.tables[1].size.is_power_of_two());

      let largest: usize = stats.tables[0].size.max(stats.tables[1].size);

      assert!(
        largest >= dict.len(),
        "largest table ({largest}) below population ({})",
        dict.len(),
      );
    }
  }
}

#[test]
fn test_growth_from_minimal_table_keeps_keys_reachable() {
  let mut dict: Dict<String, usize> = Dict::new();

  dict.expand(HT_INITIAL_SIZE).unwrap();

  for index in 0..100 {
    dict.add(format!("k{index}"), index).unwrap();
  }

  // The hundredth insert into a four-bucket table leaves migrations in
  // flight repeatedly; every key must stay reachable regardless.
  for index in 0..100 {
    assert_eq!(dict.fetch_value(&format!("k{index}")), Some(&index));
  }

  assert_eq!(dict.len(), 100);
}

#[test]
fn test_explicit_rehash_drains_second_table() {
  let mut dict: Dict<String, usize> = filled(4);

  dict.expand(256).unwrap();
  assert!(dict.is_rehashing());

  while dict.rehash(16) {}

  let stats: DictStats = dict.stats();

  assert!(!dict.is_rehashing());
  assert_eq!(stats.tables[1].size, 0);
  assert_eq!(stats.tables[1].used, 0);

  for index in 0..4 {
    assert!(dict.find(&format!("k{index}")).is_some());
  }
}

// -----------------------------------------------------------------------------
// Iterators
// -----------------------------------------------------------------------------

#[test]
fn test_unchecked_iterator_full_pass() {
  let dict: Dict<String, usize> = filled(257);
  let mut iter: DictIterator<String, usize> = dict.iterator();
  let mut seen: HashSet<String> = HashSet::new();

  while let Some(entry) = iter.next(&dict) {
    assert!(seen.insert(entry.key().clone()));
  }

  iter.release(&dict);

  assert_eq!(seen.len(), 257);
}

#[test]
fn test_safe_iterator_drain() {
  let mut dict: Dict<String, usize> = filled(1000);
  let mut iter: DictIterator<String, usize> = dict.safe_iterator();
  let mut seen: HashSet<String> = HashSet::new();

  loop {
    let Some(entry) = iter.next(&dict) else {
      break;
    };

    let key: String = entry.key().clone();

    assert!(seen.insert(key.clone()));

    let unlinked: Box<Entry<String, usize>> = dict.unlink(&key).unwrap();

    assert_eq!(unlinked.key(), &key);

    dict.free_unlinked(unlinked);
  }

  iter.release(&dict);

  assert_eq!(seen.len(), 1000);
  assert_eq!(dict.len(), 0);
}

// -----------------------------------------------------------------------------
// Scan
// -----------------------------------------------------------------------------

#[test]
fn test_scan_full_pass_counts() {
  let dict: Dict<String, usize> = filled(313);
  let mut visits: Vec<String> = Vec::new();
  let mut cursor: u64 = 0;

  loop {
    cursor = dict.scan(cursor, |entry| visits.push(entry.key().clone()));

    if cursor == 0 {
      break;
    }
  }

  let unique: HashSet<&String> = visits.iter().collect();

  assert_eq!(unique.len(), 313);
  assert!(visits.len() <= 2 * 313);
}

// -----------------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------------

#[test]
fn test_duplicate_key_is_distinct_error() {
  let mut dict: Dict<String, usize> = filled(1);

  let error: DictError = dict.add("k0".into(), 99).unwrap_err();

  assert_eq!(error, DictError::DuplicateKey);
  assert_eq!(error.to_string(), "duplicate key");
}

// -----------------------------------------------------------------------------
// Mixed Workload
// -----------------------------------------------------------------------------

#[test]
fn test_interleaved_workload() {
  let mut dict: Dict<String, usize> = Dict::new();

  for round in 0..10 {
    for index in 0..200 {
      dict.replace(format!("k{index}"), round * 1000 + index);
    }

    for index in (0..200).step_by(3) {
      dict.delete(&format!("k{index}"));
    }

    for index in (0..200).step_by(3) {
      dict.add(format!("k{index}"), round).unwrap();
    }
  }

  assert_eq!(dict.len(), 200);

  for index in 0..200 {
    assert!(dict.find(&format!("k{index}")).is_some());
  }
}
