use hashbrown::DefaultHashBuilder;
use std::hash::BuildHasher;
use std::hash::Hash;

// -----------------------------------------------------------------------------
// Dictionary Type
// -----------------------------------------------------------------------------

/// Key capabilities of a [`Dict`].
///
/// A `DictType` supplies the two behaviors the dictionary cannot derive
/// from ownership alone: hashing a key to 64 bits and deciding key
/// equality. Everything the original capability record expressed through
/// optional function pointers — key/value duplication, destruction, a
/// private-data pointer — is carried by Rust ownership instead: keys and
/// values are moved in, dropped on removal, and any state the implementor
/// needs lives in the implementing struct itself.
///
/// Implementations must be consistent: keys that compare equal must hash
/// to the same value for the lifetime of the dictionary.
///
/// [`Dict`]: crate::dict::Dict
pub trait DictType<K> {
  /// Returns the 64-bit hash of `key`.
  fn hash(&self, key: &K) -> u64;

  /// Returns `true` if the two keys are equal.
  fn key_eq(&self, a: &K, b: &K) -> bool;
}

// -----------------------------------------------------------------------------
// Dictionary Type - Default
// -----------------------------------------------------------------------------

/// The identity [`DictType`]: hash with the standard hasher, compare
/// with [`Eq`].
///
/// This is what a dictionary degrades to when the caller has no custom
/// key semantics. The hasher is randomly seeded per dictionary, so two
/// dictionaries never share a hash sequence.
#[derive(Clone, Debug, Default)]
pub struct DefaultDictType<S = DefaultHashBuilder> {
  hasher: S,
}

impl<S> DefaultDictType<S> {
  /// Creates a new default type using `hasher` for key hashing.
  #[inline]
  pub const fn with_hasher(hasher: S) -> Self {
    Self { hasher }
  }
}

impl<K, S> DictType<K> for DefaultDictType<S>
where
  K: Hash + Eq,
  S: BuildHasher,
{
  #[inline]
  fn hash(&self, key: &K) -> u64 {
    self.hasher.hash_one(key)
  }

  #[inline]
  fn key_eq(&self, a: &K, b: &K) -> bool {
    a == b
  }
}
