//! Single-threaded reactor-style event loop.
//!
//! This module provides [`EventLoop`], which multiplexes readiness of
//! registered file descriptors with time-driven callbacks on one thread.
//! The polling primitive is pluggable through the [`Poller`] trait, with
//! [`SysPoller`] (epoll/kqueue via `mio`) as the production backend.
//!
//! # Iteration
//!
//! One pass of the loop is strictly ordered: pre-sleep hook, poll,
//! post-sleep hook, file dispatch in backend order (write-before-read
//! for descriptors registered with [`EventMask::BARRIER`]), then timer
//! dispatch bounded by the timer-id horizon captured at entry.
//!
//! # Concurrency
//!
//! Everything runs cooperatively on the calling thread. The only
//! suspension point is the poll itself; callbacks must not block.
//! Cancellation is cooperative as well: [`EventLoop::stop`] ends
//! [`EventLoop::run`] after the current iteration, and deleted timers
//! are released only once the dispatch pass that may still reference
//! them has unwound.

mod event;
mod event_loop;
mod poller;
mod timer;
mod wait;

pub use self::event::DispatchFlags;
pub use self::event::EventMask;
pub use self::event::FileProc;
pub use self::event::Fired;
pub use self::event::SleepHook;
pub use self::event::TimeProc;
pub use self::event::TimerFinalizer;
pub use self::event_loop::EventLoop;
pub use self::poller::Poller;
pub use self::poller::SysPoller;
pub use self::timer::DELETED_EVENT_ID;
pub use self::timer::NOMORE;
pub use self::timer::TimerId;
pub use self::wait::wait;
