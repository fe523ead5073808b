use mio::Events;
use mio::Interest;
use mio::Poll;
use mio::Token;
use mio::unix::SourceFd;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::reactor::EventMask;
use crate::reactor::Fired;
use crate::reactor::Poller;

// -----------------------------------------------------------------------------
// System Poller
// -----------------------------------------------------------------------------

/// The production [`Poller`], backed by the operating system's readiness
/// facility (epoll on Linux, kqueue on the BSDs) through `mio`.
///
/// Descriptors are registered with their fd number as the token, so no
/// translation table is needed between the backend and the loop's
/// fd-indexed registration array.
pub struct SysPoller {
  poll: Poll,
  events: Events,
}

impl SysPoller {
  /// Maps a registration mask to backend interest, if it names any
  /// readiness direction at all.
  fn interest(mask: EventMask) -> Option<Interest> {
    let readable: bool = mask.contains(EventMask::READABLE);
    let writable: bool = mask.contains(EventMask::WRITABLE);

    match (readable, writable) {
      (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
      (true, false) => Some(Interest::READABLE),
      (false, true) => Some(Interest::WRITABLE),
      (false, false) => None,
    }
  }

  fn update(&mut self, fd: RawFd, old: EventMask, new: EventMask) -> io::Result<()> {
    let mut source: SourceFd<'_> = SourceFd(&fd);
    let token: Token = Token(fd as usize);

    match (Self::interest(old), Self::interest(new)) {
      (None, Some(interest)) => self.poll.registry().register(&mut source, token, interest),
      (Some(_), Some(interest)) => self.poll.registry().reregister(&mut source, token, interest),
      (Some(_), None) => self.poll.registry().deregister(&mut source),
      (None, None) => Ok(()),
    }
  }
}

impl Poller for SysPoller {
  fn create(setsize: usize) -> io::Result<Self> {
    Ok(Self {
      poll: Poll::new()?,
      events: Events::with_capacity(setsize.max(1)),
    })
  }

  fn resize(&mut self, setsize: usize) -> io::Result<()> {
    self.events = Events::with_capacity(setsize.max(1));

    Ok(())
  }

  #[inline]
  fn add(&mut self, fd: RawFd, old: EventMask, new: EventMask) -> io::Result<()> {
    self.update(fd, old, new)
  }

  #[inline]
  fn del(&mut self, fd: RawFd, old: EventMask, new: EventMask) -> io::Result<()> {
    self.update(fd, old, new)
  }

  fn poll(&mut self, fired: &mut Vec<Fired>, timeout: Option<Duration>) -> io::Result<usize> {
    fired.clear();

    self.poll.poll(&mut self.events, timeout)?;

    for event in self.events.iter() {
      let mut mask: EventMask = EventMask::NONE;

      // Errors and half-closed peers surface as readiness in both
      // directions so the owning callbacks observe the failure from
      // their read or write attempt.
      if event.is_readable() || event.is_read_closed() || event.is_error() {
        mask |= EventMask::READABLE;
      }

      if event.is_writable() || event.is_write_closed() || event.is_error() {
        mask |= EventMask::WRITABLE;
      }

      if !mask.is_empty() {
        fired.push(Fired {
          fd: event.token().0 as RawFd,
          mask,
        });
      }
    }

    Ok(fired.len())
  }

  fn name(&self) -> &'static str {
    "mio"
  }
}
