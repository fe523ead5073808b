use std::cell::RefCell;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Duration;

use crate::reactor::DELETED_EVENT_ID;
use crate::reactor::DispatchFlags;
use crate::reactor::EventMask;
use crate::reactor::FileProc;
use crate::reactor::Fired;
use crate::reactor::NOMORE;
use crate::reactor::Poller;
use crate::reactor::SleepHook;
use crate::reactor::SysPoller;
use crate::reactor::TimeProc;
use crate::reactor::TimerFinalizer;
use crate::reactor::TimerId;
use crate::reactor::event::FileEvent;
use crate::reactor::timer::TimerEntry;
use crate::utils::time;

// -----------------------------------------------------------------------------
// Event Loop
// -----------------------------------------------------------------------------

/// A single-threaded reactor multiplexing file-descriptor readiness with
/// time-driven callbacks.
///
/// One iteration of the loop is: compute the sleep deadline from the
/// nearest timer, invoke the pre-sleep hook, poll the backend, invoke
/// the post-sleep hook, dispatch file events in the order the backend
/// reported them (honoring per-descriptor [`BARRIER`] ordering), then
/// fire matured timers. Everything runs on the calling thread; callbacks
/// receive the loop itself and may freely register, unregister, and
/// create or delete timers from within a dispatch.
///
/// Registrations are indexed directly by file descriptor, so the loop
/// has a fixed capacity (`setsize`) chosen at creation and adjustable
/// with [`resize_set_size`].
///
/// [`BARRIER`]: EventMask::BARRIER
/// [`resize_set_size`]: EventLoop::resize_set_size
pub struct EventLoop<P: Poller = SysPoller> {
  setsize: usize,
  maxfd: RawFd,
  events: Vec<FileEvent<P>>,
  fired: Vec<Fired>,
  timers: Vec<Rc<RefCell<TimerEntry<P>>>>,
  timer_next_id: TimerId,
  timer_depth: u32,
  last_time: u64,
  poller: P,
  before_sleep: Option<SleepHook<P>>,
  after_sleep: Option<SleepHook<P>>,
  stopped: bool,
  flags: DispatchFlags,
}

impl EventLoop<SysPoller> {
  /// Creates a loop able to track descriptors `0..setsize` with the
  /// system polling backend.
  ///
  /// # Errors
  ///
  /// Propagates backend creation failure.
  #[inline]
  pub fn new(setsize: usize) -> io::Result<Self> {
    Self::with_poller(setsize)
  }
}

impl<P: Poller> EventLoop<P> {
  /// Creates a loop able to track descriptors `0..setsize` with a
  /// caller-chosen polling backend.
  ///
  /// # Errors
  ///
  /// Propagates backend creation failure.
  pub fn with_poller(setsize: usize) -> io::Result<Self> {
    let poller: P = P::create(setsize)?;

    let mut events: Vec<FileEvent<P>> = Vec::with_capacity(setsize);

    events.resize_with(setsize, FileEvent::empty);

    let this: Self = Self {
      setsize,
      maxfd: -1,
      events,
      fired: Vec::with_capacity(setsize),
      timers: Vec::new(),
      timer_next_id: 0,
      timer_depth: 0,
      last_time: time::unix().as_secs(),
      poller,
      before_sleep: None,
      after_sleep: None,
      stopped: false,
      flags: DispatchFlags::empty(),
    };

    tracing::debug!(setsize, backend = this.poller.name(), "event loop created");

    Ok(this)
  }

  // ---------------------------------------------------------------------------
  // Capacity
  // ---------------------------------------------------------------------------

  /// Returns the number of descriptors the loop can track.
  #[inline]
  pub fn get_set_size(&self) -> usize {
    self.setsize
  }

  /// Returns the highest currently registered descriptor, or `-1`.
  #[inline]
  pub fn max_fd(&self) -> RawFd {
    self.maxfd
  }

  /// Changes the number of descriptors the loop can track.
  ///
  /// # Errors
  ///
  /// Fails with [`io::ErrorKind::InvalidInput`] if a descriptor at or
  /// above the new capacity is still registered, leaving the loop
  /// untouched. Backend errors propagate.
  pub fn resize_set_size(&mut self, setsize: usize) -> io::Result<()> {
    if setsize == self.setsize {
      return Ok(());
    }

    if self.maxfd >= setsize as RawFd {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "registered descriptor above requested capacity",
      ));
    }

    self.poller.resize(setsize)?;
    self.events.resize_with(setsize, FileEvent::empty);
    self.fired = Vec::with_capacity(setsize);
    self.setsize = setsize;

    Ok(())
  }

  /// Sets or clears the loop-level no-wait flag.
  ///
  /// While set, every iteration polls without blocking even when no
  /// timer is due, as if [`DONT_WAIT`] were passed to each
  /// [`process_events`] call.
  ///
  /// [`DONT_WAIT`]: DispatchFlags::DONT_WAIT
  /// [`process_events`]: EventLoop::process_events
  #[inline]
  pub fn set_dont_wait(&mut self, dont_wait: bool) {
    self.flags.set(DispatchFlags::DONT_WAIT, dont_wait);
  }

  /// Returns the polling backend's human-readable tag.
  #[inline]
  pub fn backend_name(&self) -> &'static str {
    self.poller.name()
  }

  // ---------------------------------------------------------------------------
  // File Events
  // ---------------------------------------------------------------------------

  /// Registers `handler` for the directions in `mask` on `fd`.
  ///
  /// The mask is or-combined into any existing registration, and the
  /// handler is stored for each direction requested here: registering
  /// `READABLE | WRITABLE` in one call makes a single closure serve both
  /// directions, which dispatch recognizes to avoid invoking it twice in
  /// one iteration.
  ///
  /// # Errors
  ///
  /// Fails with [`io::ErrorKind::InvalidInput`] if `fd` is outside
  /// `0..setsize`. Backend errors propagate and leave the registration
  /// unchanged.
  pub fn register<F>(&mut self, fd: RawFd, mask: EventMask, handler: F) -> io::Result<()>
  where
    F: FnMut(&mut EventLoop<P>, RawFd, EventMask) + 'static,
  {
    if fd < 0 || fd as usize >= self.setsize {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "descriptor outside loop capacity",
      ));
    }

    let old: EventMask = self.events[fd as usize].mask;

    self
      .poller
      .add(fd, old & !EventMask::BARRIER, (old | mask) & !EventMask::BARRIER)?;

    let shared: FileProc<P> = Rc::new(RefCell::new(handler));
    let event: &mut FileEvent<P> = &mut self.events[fd as usize];

    event.mask |= mask;

    if mask.contains(EventMask::READABLE) {
      event.rfile = Some(Rc::clone(&shared));
    }

    if mask.contains(EventMask::WRITABLE) {
      event.wfile = Some(Rc::clone(&shared));
    }

    if fd > self.maxfd {
      self.maxfd = fd;
    }

    tracing::trace!(fd, mask = ?event.mask, "file event registered");

    Ok(())
  }

  /// Clears the directions in `mask` from the registration on `fd`.
  ///
  /// Silently a no-op for unregistered descriptors. Once no direction
  /// remains, the backend watch is dropped and `maxfd` adjusts downward.
  pub fn unregister(&mut self, fd: RawFd, mask: EventMask) {
    if fd < 0 || fd as usize >= self.setsize {
      return;
    }

    let old: EventMask = self.events[fd as usize].mask;

    if old == EventMask::NONE {
      return;
    }

    // A barrier only means something while writes are registered.
    let mask: EventMask = if mask.contains(EventMask::WRITABLE) {
      mask | EventMask::BARRIER
    } else {
      mask
    };

    let event: &mut FileEvent<P> = &mut self.events[fd as usize];

    event.mask &= !mask;

    if !event.mask.contains(EventMask::READABLE) {
      event.rfile = None;
    }

    if !event.mask.contains(EventMask::WRITABLE) {
      event.wfile = None;
    }

    if fd == self.maxfd && event.mask == EventMask::NONE {
      self.maxfd = (0..fd)
        .rev()
        .find(|&prior| self.events[prior as usize].mask != EventMask::NONE)
        .unwrap_or(-1);
    }

    let new: EventMask = self.events[fd as usize].mask;
    let _ignore: io::Result<()> = self.poller.del(
      fd,
      old & !EventMask::BARRIER,
      new & !EventMask::BARRIER,
    );

    tracing::trace!(fd, mask = ?new, "file event unregistered");
  }

  /// Returns the registered mask for `fd`, or [`EventMask::NONE`].
  #[inline]
  pub fn get_mask(&self, fd: RawFd) -> EventMask {
    if fd < 0 || fd as usize >= self.setsize {
      return EventMask::NONE;
    }

    self.events[fd as usize].mask
  }

  // ---------------------------------------------------------------------------
  // Time Events
  // ---------------------------------------------------------------------------

  /// Creates a timer firing `after_millis` from now.
  ///
  /// The handler's return value reschedules the timer that many
  /// milliseconds ahead, or retires it when equal to [`NOMORE`]. The
  /// finalizer, if any, runs exactly once when the retired timer is
  /// released.
  pub fn create_timer<F>(
    &mut self,
    after_millis: u64,
    handler: F,
    finalizer: Option<TimerFinalizer<P>>,
  ) -> TimerId
  where
    F: FnMut(&mut EventLoop<P>, TimerId) -> i64 + 'static,
  {
    let id: TimerId = self.timer_next_id;

    self.timer_next_id += 1;

    let handler: TimeProc<P> = Rc::new(RefCell::new(handler));

    self.timers.push(Rc::new(RefCell::new(TimerEntry {
      id,
      when: time::unix() + Duration::from_millis(after_millis),
      handler,
      finalizer,
    })));

    tracing::trace!(id, after_millis, "timer created");

    id
  }

  /// Marks the timer `id` as deleted.
  ///
  /// The entry is physically released (and its finalizer run) by the
  /// sweep at the end of the next timer dispatch, which makes deletion
  /// safe from within any callback, including the timer's own.
  ///
  /// Returns `false` if no live timer has this id.
  pub fn delete_timer(&mut self, id: TimerId) -> bool {
    if id == DELETED_EVENT_ID {
      return false;
    }

    for timer in &self.timers {
      let mut entry = timer.borrow_mut();

      if entry.id == id {
        entry.id = DELETED_EVENT_ID;

        tracing::trace!(id, "timer deleted");

        return true;
      }
    }

    false
  }

  /// Returns the deadline of the nearest live timer.
  fn search_nearest_timer(&self) -> Option<Duration> {
    self
      .timers
      .iter()
      .filter_map(|timer| {
        let entry = timer.borrow();

        (entry.id != DELETED_EVENT_ID).then_some(entry.when)
      })
      .min()
  }

  /// Dispatches matured timers.
  ///
  /// The id horizon is captured at entry so timers created by handlers
  /// during this pass wait for the next one. Entries marked deleted are
  /// unlinked at the end of the outermost pass, once no transient handle
  /// to them remains.
  fn process_time_events(&mut self) -> usize {
    let mut processed: usize = 0;

    self.timer_depth += 1;

    // A wall clock that moved backwards would strand every deadline in
    // the future; force them due instead, which is the harmless failure
    // mode.
    let now_seconds: u64 = time::unix().as_secs();

    if now_seconds < self.last_time {
      tracing::warn!("system clock moved backwards, forcing timers due");

      for timer in &self.timers {
        timer.borrow_mut().when = Duration::ZERO;
      }
    }

    self.last_time = now_seconds;

    let max_id: TimerId = self.timer_next_id - 1;
    let mut index: usize = 0;

    while index < self.timers.len() {
      let timer: Rc<RefCell<TimerEntry<P>>> = Rc::clone(&self.timers[index]);

      index += 1;

      let (id, when): (TimerId, Duration) = {
        let entry = timer.borrow();

        (entry.id, entry.when)
      };

      if id == DELETED_EVENT_ID || id > max_id {
        continue;
      }

      if time::unix() < when {
        continue;
      }

      let handler: TimeProc<P> = Rc::clone(&timer.borrow().handler);

      // A nested dispatch can reach a timer whose handler is already on
      // the stack; skip it rather than re-entering.
      let Ok(mut guard) = handler.try_borrow_mut() else {
        continue;
      };

      let retval: i64 = (&mut *guard)(self, id);

      drop(guard);

      processed += 1;

      let mut entry = timer.borrow_mut();

      if retval != NOMORE {
        entry.when = time::unix() + Duration::from_millis(retval.max(0) as u64);
      } else {
        entry.id = DELETED_EVENT_ID;
      }
    }

    self.timer_depth -= 1;

    if self.timer_depth == 0 {
      self.sweep_timers();
    }

    processed
  }

  /// Unlinks and releases every timer marked deleted, running
  /// finalizers.
  fn sweep_timers(&mut self) {
    let mut index: usize = 0;

    while index < self.timers.len() {
      let deleted: bool = self.timers[index].borrow().id == DELETED_EVENT_ID;

      if deleted && Rc::strong_count(&self.timers[index]) == 1 {
        let timer: Rc<RefCell<TimerEntry<P>>> = self.timers.remove(index);
        let finalizer: Option<TimerFinalizer<P>> = timer.borrow_mut().finalizer.take();

        if let Some(finalizer) = finalizer {
          finalizer(self);
        }
      } else {
        index += 1;
      }
    }
  }

  // ---------------------------------------------------------------------------
  // Dispatch
  // ---------------------------------------------------------------------------

  /// Runs one iteration of the loop, returning the number of file and
  /// time events dispatched.
  ///
  /// `flags` selects which event classes to dispatch, whether the poll
  /// may block, and whether the pre/post-sleep hooks run; see
  /// [`DispatchFlags`]. With neither event class requested this returns
  /// immediately.
  ///
  /// # Errors
  ///
  /// Fatal backend poll errors propagate. An interrupted poll is not an
  /// error; it counts as zero fired descriptors and the iteration
  /// proceeds to timers.
  pub fn process_events(&mut self, flags: DispatchFlags) -> io::Result<usize> {
    let mut processed: usize = 0;

    if !flags.intersects(DispatchFlags::ALL_EVENTS) {
      return Ok(0);
    }

    // Poll even with no registered descriptors when a blocking wait on
    // the nearest timer is wanted.
    if self.maxfd != -1
      || (flags.contains(DispatchFlags::TIME_EVENTS) && !flags.contains(DispatchFlags::DONT_WAIT))
    {
      let mut timeout: Option<Duration> = None;

      if flags.contains(DispatchFlags::TIME_EVENTS) && !flags.contains(DispatchFlags::DONT_WAIT) {
        timeout = self.search_nearest_timer().map(|when| {
          when.checked_sub(time::unix()).unwrap_or(Duration::ZERO)
        });
      }

      if timeout.is_none()
        && (flags.contains(DispatchFlags::DONT_WAIT) || self.flags.contains(DispatchFlags::DONT_WAIT))
      {
        timeout = Some(Duration::ZERO);
      }

      if flags.contains(DispatchFlags::CALL_BEFORE_SLEEP) {
        self.run_sleep_hook(true);
      }

      let fired_count: usize = {
        let Self { poller, fired, .. } = self;

        match poller.poll(fired, timeout) {
          Ok(count) => count,
          Err(error) if error.kind() == io::ErrorKind::Interrupted => 0,
          Err(error) => return Err(error),
        }
      };

      if flags.contains(DispatchFlags::CALL_AFTER_SLEEP) {
        self.run_sleep_hook(false);
      }

      for position in 0..fired_count {
        // A callback may recurse into the loop and repopulate the fired
        // buffer; re-check bounds and copy out before dispatching.
        let Some(&Fired { fd, mask }) = self.fired.get(position) else {
          break;
        };

        self.dispatch_file_event(fd, mask);
        processed += 1;
      }
    }

    if flags.contains(DispatchFlags::TIME_EVENTS) {
      processed += self.process_time_events();
    }

    Ok(processed)
  }

  /// Dispatches the callbacks of one fired descriptor.
  ///
  /// Normal order is read-then-write so a handler can respond to a
  /// query within the same iteration. A registration carrying
  /// [`BARRIER`] inverts that to write-then-read. When one closure
  /// serves both directions, it fires at most once per iteration.
  ///
  /// [`BARRIER`]: EventMask::BARRIER
  fn dispatch_file_event(&mut self, fd: RawFd, mask: EventMask) {
    if fd < 0 || fd as usize >= self.setsize {
      return;
    }

    let invert: bool = self.events[fd as usize].mask.contains(EventMask::BARRIER);
    let mut fired: usize = 0;

    if !invert {
      if (self.events[fd as usize].mask & mask).contains(EventMask::READABLE)
        && let Some(rfile) = self.events[fd as usize].rfile.clone()
      {
        self.invoke_file_proc(&rfile, fd, mask);
        fired += 1;
      }
    }

    // Registration state is re-read between callbacks: the previous one
    // may have unregistered or replaced this descriptor's handlers.
    if (self.events[fd as usize].mask & mask).contains(EventMask::WRITABLE)
      && let Some(wfile) = self.events[fd as usize].wfile.clone()
    {
      let same: bool = match self.events[fd as usize].rfile {
        Some(ref rfile) => Rc::ptr_eq(rfile, &wfile),
        None => false,
      };

      if fired == 0 || !same {
        self.invoke_file_proc(&wfile, fd, mask);
        fired += 1;
      }
    }

    if invert
      && (self.events[fd as usize].mask & mask).contains(EventMask::READABLE)
      && let Some(rfile) = self.events[fd as usize].rfile.clone()
    {
      let same: bool = match self.events[fd as usize].wfile {
        Some(ref wfile) => Rc::ptr_eq(wfile, &rfile),
        None => false,
      };

      if fired == 0 || !same {
        self.invoke_file_proc(&rfile, fd, mask);
      }
    }
  }

  fn invoke_file_proc(&mut self, handler: &FileProc<P>, fd: RawFd, mask: EventMask) {
    // A recursive dispatch can reach a handler already on the stack;
    // skip it rather than re-entering.
    if let Ok(mut guard) = handler.try_borrow_mut() {
      (&mut *guard)(self, fd, mask);
    }
  }

  fn run_sleep_hook(&mut self, before: bool) {
    let hook: Option<SleepHook<P>> = if before {
      self.before_sleep.clone()
    } else {
      self.after_sleep.clone()
    };

    if let Some(hook) = hook
      && let Ok(mut guard) = hook.try_borrow_mut()
    {
      (&mut *guard)(self);
    }
  }

  // ---------------------------------------------------------------------------
  // Main Loop
  // ---------------------------------------------------------------------------

  /// Installs the hook invoked just before each blocking poll.
  ///
  /// This is where an application flushes pending output so descriptors
  /// go idle before the loop sleeps on them.
  pub fn set_before_sleep<F>(&mut self, hook: F)
  where
    F: FnMut(&mut EventLoop<P>) + 'static,
  {
    self.before_sleep = Some(Rc::new(RefCell::new(hook)));
  }

  /// Removes the before-sleep hook.
  #[inline]
  pub fn clear_before_sleep(&mut self) {
    self.before_sleep = None;
  }

  /// Installs the hook invoked just after each poll returns.
  pub fn set_after_sleep<F>(&mut self, hook: F)
  where
    F: FnMut(&mut EventLoop<P>) + 'static,
  {
    self.after_sleep = Some(Rc::new(RefCell::new(hook)));
  }

  /// Removes the after-sleep hook.
  #[inline]
  pub fn clear_after_sleep(&mut self) {
    self.after_sleep = None;
  }

  /// Requests that [`run`] return after the current iteration.
  ///
  /// [`run`]: EventLoop::run
  #[inline]
  pub fn stop(&mut self) {
    self.stopped = true;
  }

  /// Runs iterations with all event classes and both sleep hooks
  /// enabled until [`stop`] is called.
  ///
  /// # Errors
  ///
  /// Returns the first fatal backend error.
  ///
  /// [`stop`]: EventLoop::stop
  pub fn run(&mut self) -> io::Result<()> {
    self.stopped = false;

    while !self.stopped {
      self.process_events(
        DispatchFlags::ALL_EVENTS
          | DispatchFlags::CALL_BEFORE_SLEEP
          | DispatchFlags::CALL_AFTER_SLEEP,
      )?;
    }

    Ok(())
  }
}

impl<P: Poller> Debug for EventLoop<P> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("EventLoop")
      .field("setsize", &self.setsize)
      .field("maxfd", &self.maxfd)
      .field("timers", &self.timers.len())
      .field("backend", &self.poller.name())
      .field("stopped", &self.stopped)
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  fn event_loop(setsize: usize) -> EventLoop {
    EventLoop::new(setsize).unwrap()
  }

  #[test]
  fn test_new() {
    let ev: EventLoop = event_loop(64);

    assert_eq!(ev.get_set_size(), 64);
    assert_eq!(ev.max_fd(), -1);
    assert_eq!(ev.backend_name(), "mio");
  }

  #[test]
  fn test_register_out_of_range() {
    let mut ev: EventLoop = event_loop(8);

    let result: io::Result<()> = ev.register(8, EventMask::READABLE, |_, _, _| {});

    assert_eq!(result.unwrap_err().kind(), io::ErrorKind::InvalidInput);
    assert_eq!(ev.get_mask(8), EventMask::NONE);
  }

  #[test]
  fn test_get_mask_unregistered() {
    let ev: EventLoop = event_loop(8);

    assert_eq!(ev.get_mask(3), EventMask::NONE);
    assert_eq!(ev.get_mask(-1), EventMask::NONE);
    assert_eq!(ev.get_mask(1000), EventMask::NONE);
  }

  #[test]
  fn test_unregister_unregistered_is_noop() {
    let mut ev: EventLoop = event_loop(8);

    ev.unregister(3, EventMask::READABLE);
    ev.unregister(1000, EventMask::READABLE);

    assert_eq!(ev.max_fd(), -1);
  }

  #[test]
  fn test_process_events_no_classes() {
    let mut ev: EventLoop = event_loop(8);

    assert_eq!(ev.process_events(DispatchFlags::empty()).unwrap(), 0);
    assert_eq!(ev.process_events(DispatchFlags::DONT_WAIT).unwrap(), 0);
  }

  #[test]
  fn test_create_timer_ids_increase() {
    let mut ev: EventLoop = event_loop(8);

    let first: TimerId = ev.create_timer(1000, |_, _| NOMORE, None);
    let second: TimerId = ev.create_timer(1000, |_, _| NOMORE, None);

    assert!(first >= 0);
    assert_eq!(second, first + 1);
  }

  #[test]
  fn test_delete_timer() {
    let mut ev: EventLoop = event_loop(8);

    let id: TimerId = ev.create_timer(1000, |_, _| NOMORE, None);

    assert!(ev.delete_timer(id));
    assert!(!ev.delete_timer(id), "double delete must fail");
    assert!(!ev.delete_timer(12345));
  }

  #[test]
  fn test_deleted_timer_never_fires() {
    let mut ev: EventLoop = event_loop(8);

    let id: TimerId = ev.create_timer(0, |_, _| panic!("deleted timer fired"), None);

    ev.delete_timer(id);

    let processed: usize = ev
      .process_events(DispatchFlags::TIME_EVENTS | DispatchFlags::DONT_WAIT)
      .unwrap();

    assert_eq!(processed, 0);
  }

  #[test]
  fn test_resize_set_size() {
    let mut ev: EventLoop = event_loop(8);

    ev.resize_set_size(64).unwrap();
    assert_eq!(ev.get_set_size(), 64);

    ev.resize_set_size(16).unwrap();
    assert_eq!(ev.get_set_size(), 16);
  }
}
