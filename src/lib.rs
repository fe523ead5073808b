//! Vela - foundational building blocks for an in-memory data store.
//!
//! Two independent components compose: [`reactor`], a single-threaded
//! event loop multiplexing file-descriptor readiness with time-driven
//! callbacks, and [`dict`], an associative map that grows by migrating
//! buckets between two tables in bounded steps interleaved with ordinary
//! operations. Neither depends on the other; both run in a cooperative
//! single-threaded model with no internal locking.
//!
//! The reactor's polling backend targets Unix hosts (epoll on Linux,
//! kqueue on the BSDs).

mod core;
mod utils;

pub mod consts;
pub mod dict;
pub mod reactor;

pub mod types {
  //! Curated re-exports of the crate's primary types.

  pub use crate::dict::DefaultDictType;
  pub use crate::dict::Dict;
  pub use crate::dict::DictError;
  pub use crate::dict::DictIterator;
  pub use crate::dict::DictStats;
  pub use crate::dict::DictType;
  pub use crate::dict::Entry;
  pub use crate::dict::RawEntry;
  pub use crate::dict::TableStats;
  pub use crate::dict::VacantSlot;

  pub use crate::reactor::DispatchFlags;
  pub use crate::reactor::EventLoop;
  pub use crate::reactor::EventMask;
  pub use crate::reactor::Fired;
  pub use crate::reactor::Poller;
  pub use crate::reactor::SysPoller;
  pub use crate::reactor::TimerId;
}
