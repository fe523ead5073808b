use std::io;
use std::os::fd::RawFd;

use crate::reactor::EventMask;

// -----------------------------------------------------------------------------
// One-shot Wait
// -----------------------------------------------------------------------------

/// Waits up to `millis` milliseconds for `fd` to become ready in the
/// requested directions, independent of any event loop.
///
/// Returns the directions that became ready, which is empty on timeout.
/// Error conditions on the descriptor are reported as writability so the
/// caller's next write observes the failure. A negative `millis` blocks
/// indefinitely.
///
/// # Errors
///
/// Propagates the OS error if the underlying `poll(2)` fails.
pub fn wait(fd: RawFd, mask: EventMask, millis: i64) -> io::Result<EventMask> {
  let mut pfd: libc::pollfd = libc::pollfd {
    fd,
    events: 0,
    revents: 0,
  };

  if mask.contains(EventMask::READABLE) {
    pfd.events |= libc::POLLIN;
  }

  if mask.contains(EventMask::WRITABLE) {
    pfd.events |= libc::POLLOUT;
  }

  // SAFETY: `pfd` is a valid pollfd array of length one for the duration
  // of the call.
  let retval: libc::c_int = unsafe { libc::poll(&mut pfd, 1, millis as libc::c_int) };

  if retval < 0 {
    return Err(io::Error::last_os_error());
  }

  let mut ready: EventMask = EventMask::NONE;

  if retval > 0 {
    if pfd.revents & libc::POLLIN != 0 {
      ready |= EventMask::READABLE;
    }

    if pfd.revents & libc::POLLOUT != 0 {
      ready |= EventMask::WRITABLE;
    }

    if pfd.revents & libc::POLLERR != 0 {
      ready |= EventMask::WRITABLE;
    }

    if pfd.revents & libc::POLLHUP != 0 {
      ready |= EventMask::WRITABLE;
    }
  }

  Ok(ready)
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::io::Write;
  use std::os::fd::AsRawFd;
  use std::os::unix::net::UnixStream;

  use super::*;

  #[test]
  fn test_wait_writable() {
    let (left, _right): (UnixStream, UnixStream) = UnixStream::pair().unwrap();

    let ready: EventMask = wait(left.as_raw_fd(), EventMask::WRITABLE, 100).unwrap();

    assert!(ready.contains(EventMask::WRITABLE));
  }

  #[test]
  fn test_wait_readable_after_write() {
    let (left, mut right): (UnixStream, UnixStream) = UnixStream::pair().unwrap();

    right.write_all(b"ping").unwrap();

    let ready: EventMask = wait(left.as_raw_fd(), EventMask::READABLE, 1000).unwrap();

    assert!(ready.contains(EventMask::READABLE));
  }

  #[test]
  fn test_wait_timeout() {
    let (left, _right): (UnixStream, UnixStream) = UnixStream::pair().unwrap();

    let ready: EventMask = wait(left.as_raw_fd(), EventMask::READABLE, 10).unwrap();

    assert_eq!(ready, EventMask::NONE);
  }
}
