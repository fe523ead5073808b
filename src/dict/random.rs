use rand::Rng;
use rand::RngCore;
use rand::rngs::ThreadRng;

use crate::consts::FAIR_RANDOM_SAMPLE_SIZE;
use crate::consts::SOME_ENTRIES_MAX_STEPS;
use crate::dict::Dict;
use crate::dict::DictType;
use crate::dict::Entry;

// -----------------------------------------------------------------------------
// Random Sampling
// -----------------------------------------------------------------------------

impl<K, V, T: DictType<K>> Dict<K, V, T> {
  /// Returns a random entry.
  ///
  /// Selection picks a non-empty bucket uniformly and then a position
  /// within its chain uniformly, which biases the result toward entries
  /// in long chains: a lone entry in its bucket is more likely than any
  /// single entry sharing a chain of five. Use [`fair_random_entry`]
  /// when that bias matters.
  ///
  /// [`fair_random_entry`]: Dict::fair_random_entry
  pub fn random_entry(&mut self) -> Option<&Entry<K, V>> {
    if self.is_empty() {
      return None;
    }

    if self.is_rehashing() {
      self.rehash_step();
    }

    let mut rng: ThreadRng = rand::thread_rng();

    let head: &Entry<K, V> = if let Some(front) = self.rehash_index {
      loop {
        // Buckets below the migration front are already drained, so draw
        // from the combined span of both tables above it.
        let slot: usize = front + rng.gen_range(0..self.slots() - front);

        let bucket: Option<&Entry<K, V>> = if slot >= self.ht[0].size() {
          self.ht[1].bucket(slot - self.ht[0].size()).as_deref()
        } else {
          self.ht[0].bucket(slot).as_deref()
        };

        if let Some(entry) = bucket {
          break entry;
        }
      }
    } else {
      loop {
        let slot: usize = rng.next_u64() as usize & self.ht[0].sizemask();

        if let Some(entry) = self.ht[0].bucket(slot).as_deref() {
          break entry;
        }
      }
    };

    // Uniform position within the selected chain.
    let mut length: usize = 0;
    let mut cursor: Option<&Entry<K, V>> = Some(head);

    while let Some(entry) = cursor {
      length += 1;
      cursor = entry.next.as_deref();
    }

    let mut chosen: &Entry<K, V> = head;

    for _ in 0..rng.gen_range(0..length) {
      if let Some(next) = chosen.next.as_deref() {
        chosen = next;
      }
    }

    Some(chosen)
  }

  /// Returns a random entry with approximately uniform selection over
  /// entries rather than buckets.
  ///
  /// A pool of [`FAIR_RANDOM_SAMPLE_SIZE`] entries is gathered by bucket
  /// walking and one is picked uniformly from it; this does not make
  /// every entry exactly equally likely, but avoids the long-chain bias
  /// of [`random_entry`] at a small constant cost.
  ///
  /// [`random_entry`]: Dict::random_entry
  pub fn fair_random_entry(&mut self) -> Option<&Entry<K, V>> {
    let pool: usize = FAIR_RANDOM_SAMPLE_SIZE.min(self.len());

    self.sampling_rehash_steps(pool);

    let mut rng: ThreadRng = rand::thread_rng();
    let entries: Vec<&Entry<K, V>> = self.sample_entries(pool, &mut rng);

    if entries.is_empty() {
      drop(entries);
      return self.random_entry();
    }

    let pick: usize = rng.gen_range(0..entries.len());

    Some(entries[pick])
  }

  /// Returns up to `count` entries sampled from random positions.
  ///
  /// The sample walks consecutive buckets from a random starting point,
  /// so it is neither uniform nor deduplicated across calls; it is
  /// suited to jobs that want "a few random elements" cheaply, like
  /// eviction candidate pools. Fewer than `count` entries may be
  /// returned, and continuous runs of the table may be over-represented.
  pub fn some_entries(&mut self, count: usize) -> Vec<&Entry<K, V>> {
    let count: usize = count.min(self.len());

    self.sampling_rehash_steps(count);

    let mut rng: ThreadRng = rand::thread_rng();

    self.sample_entries(count, &mut rng)
  }

  /// Advances a pending migration by up to `count` bucket steps, in
  /// return for the sampling work the caller is about to do.
  fn sampling_rehash_steps(&mut self, count: usize) {
    for _ in 0..count {
      if self.is_rehashing() {
        self.rehash_step();
      } else {
        break;
      }
    }
  }

  fn sample_entries(&self, count: usize, rng: &mut ThreadRng) -> Vec<&Entry<K, V>> {
    let mut stored: Vec<&Entry<K, V>> = Vec::with_capacity(count);

    if count == 0 {
      return stored;
    }

    let tables: usize = if self.is_rehashing() { 2 } else { 1 };
    let mut maxsizemask: usize = self.ht[0].sizemask();

    if tables > 1 && self.ht[1].sizemask() > maxsizemask {
      maxsizemask = self.ht[1].sizemask();
    }

    let mut index: usize = rng.next_u64() as usize & maxsizemask;
    let mut maxsteps: usize = count.saturating_mul(SOME_ENTRIES_MAX_STEPS);
    let mut emptylen: usize = 0;

    while stored.len() < count && maxsteps > 0 {
      maxsteps -= 1;

      for table in 0..tables {
        // Buckets of the old table below the migration front are
        // drained; redirect the walk into the indices that still matter.
        if tables == 2 && table == 0 {
          if let Some(front) = self.rehash_index {
            if index < front {
              if index >= self.ht[1].size() {
                index = front;
              } else {
                continue;
              }
            }
          }
        }

        if index >= self.ht[table].size() {
          continue;
        }

        let mut cursor: Option<&Entry<K, V>> = self.ht[table].bucket(index).as_deref();

        if cursor.is_none() {
          emptylen += 1;

          // Long empty runs mean the random start was unlucky; jump.
          if emptylen >= 5 && emptylen > count {
            index = rng.next_u64() as usize & maxsizemask;
            emptylen = 0;
          }
        } else {
          emptylen = 0;

          while let Some(entry) = cursor {
            stored.push(entry);

            if stored.len() == count {
              return stored;
            }

            cursor = entry.next.as_deref();
          }
        }
      }

      index = (index + 1) & maxsizemask;
    }

    stored
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
