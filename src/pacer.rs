use std::fmt::Debug;
use std::time::Duration;

use likely_stable::unlikely;
use tracing::{debug, trace};

use crate::{Clock, DueTime, StdClock};

/// Identifies one armed flush timer.
///
/// Returned by [`Pacer::on_next`] when a flush has to be scheduled, and
/// presented back to [`Pacer::flush`] when the timer fires. Only the most
/// recently armed ticket is honoured, so a timer that outlived a newer
/// schedule (or a reset) is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTicket(u64);

/// What the caller has to do with an element handed to [`Pacer::on_next`].
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict<T> {
    /// The element is eligible. Deliver it, then call [`Pacer::emitted`].
    Emit(T),
    /// The element is held back as the pending element. Arm a one-shot timer
    /// for `delay`, replacing any previous one, and call [`Pacer::flush`]
    /// with `ticket` when it fires.
    Schedule { delay: Duration, ticket: FlushTicket },
    /// The element replaced an older pending element, which is returned. The
    /// flush armed for the current window will deliver the new one.
    Superseded(T),
    /// The element arrived too early and trailing flushes are disabled.
    Dropped(T),
}

/// Output of a flush or a reset.
#[derive(Debug, PartialEq, Eq)]
pub struct Flush<T> {
    /// Element to deliver downstream, if any.
    pub item: Option<T>,
    /// Whether downstream must complete, after `item` if there is one.
    pub complete: bool,
}

impl<T> Flush<T> {
    const fn idle() -> Self {
        Self {
            item: None,
            complete: false,
        }
    }

    /// True if the flush has nothing to deliver and does not complete.
    pub fn is_idle(&self) -> bool {
        self.item.is_none() && !self.complete
    }
}

/// An adaptive pacer: the state machine behind the smart throttle.
///
/// The pacer decides, element by element, whether an element may pass now.
/// After every emission the minimum spacing to the next one is recomputed by
/// a [`DueTime`] policy from the emitted element and the previous spacing, so
/// the pacer can implement fixed throttling, linear or exponential backoff,
/// or anything else expressible as such a function.
///
/// The pacer does not own a timer. When latest mode is enabled and an element
/// must be held back, [`on_next`](Self::on_next) asks the caller to arm one
/// and the caller reports back through [`flush`](Self::flush). The stream
/// adapters in the `futures` module do this with tokio timers.
///
/// # Type Parameters
///
/// - `T`: element type
/// - `F`: the [`DueTime`] policy
/// - `C`: clock implementation (default: [`StdClock`])
///
/// # Examples
///
/// ```rust
/// use lento::{ManualClock, Pacer, Verdict};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::default());
/// let mut pacer = Pacer::with_clock(
///     |_: &&str, previous: Duration| (previous * 2).max(Duration::from_millis(100)),
///     Arc::clone(&clock),
/// )
/// .latest(true);
///
/// // the first element always passes
/// assert_eq!(pacer.on_next("a"), Verdict::Emit("a"));
/// pacer.emitted();
///
/// clock.advance(Duration::from_millis(40));
/// let Verdict::Schedule { delay, ticket } = pacer.on_next("b") else {
///     unreachable!()
/// };
/// assert_eq!(delay, Duration::from_millis(60));
/// // a newer element replaces the pending one
/// assert_eq!(pacer.on_next("c"), Verdict::Superseded("b"));
///
/// clock.advance(delay);
/// let flush = pacer.flush(ticket);
/// assert_eq!(flush.item, Some("c"));
/// pacer.emitted();
/// assert_eq!(pacer.interval(), Duration::from_millis(200));
/// ```
pub struct Pacer<T, F, C = StdClock> {
    due_time: F,
    clock: C,
    latest: bool,
    flush_on_reset: bool,
    advance_on_flush: bool,
    pending: Option<T>,
    last_emission: Option<Duration>,
    interval: Duration,
    completion_pending: bool,
    // an element was handed out but its emission time is not recorded yet
    unstamped: bool,
    armed: Option<FlushTicket>,
    next_ticket: u64,
}

impl<T, F: DueTime<T>> Pacer<T, F, StdClock> {
    /// Creates a pacer driven by the standard clock.
    ///
    /// Latest mode is disabled; see [`latest`](Self::latest).
    pub fn new(due_time: F) -> Self {
        Self::with_clock(due_time, StdClock::default())
    }
}

#[cfg(feature = "tokio")]
impl<T, F: DueTime<T>> Pacer<T, F, crate::TokioClock> {
    /// Creates a pacer that follows tokio's clock.
    ///
    /// This is the pacer to hand to the stream adapters.
    pub fn tokio(due_time: F) -> Self {
        Self::with_clock(due_time, crate::TokioClock::default())
    }
}

impl<T, F, C> Pacer<T, F, C>
where
    F: DueTime<T>,
    C: Clock,
{
    /// Creates a pacer with a custom clock implementation.
    pub fn with_clock(due_time: F, clock: C) -> Self {
        Self {
            due_time,
            clock,
            latest: false,
            flush_on_reset: true,
            advance_on_flush: true,
            pending: None,
            last_emission: None,
            interval: Duration::ZERO,
            completion_pending: false,
            unstamped: false,
            armed: None,
            next_ticket: 0,
        }
    }

    /// Whether the most recent element suppressed in a window is retained and
    /// flushed once the window closes (leading and trailing edge), instead of
    /// being dropped (leading edge only). Defaults to `false`.
    pub fn latest(mut self, latest: bool) -> Self {
        self.latest = latest;
        self
    }

    /// Whether a reset delivers the pending element before clearing the
    /// pacing state, rather than discarding it. Defaults to `true`.
    pub fn flush_on_reset(mut self, flush_on_reset: bool) -> Self {
        self.flush_on_reset = flush_on_reset;
        self
    }

    /// Whether elements delivered by a trailing flush advance the interval
    /// through the due-time policy. Defaults to `true`.
    ///
    /// When disabled, a flushed element keeps the interval that was in effect
    /// for its window, so only leading-edge emissions grow the spacing.
    pub fn advance_on_flush(mut self, advance_on_flush: bool) -> Self {
        self.advance_on_flush = advance_on_flush;
        self
    }

    /// Spacing currently required between the last emission and the next.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The element waiting for a flush, if any.
    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// Clock reading of the last recorded emission.
    pub fn last_emission(&self) -> Option<Duration> {
        self.last_emission
    }

    /// Whether latest mode (trailing flushes) is enabled.
    pub fn is_latest(&self) -> bool {
        self.latest
    }

    /// True if upstream completed while an element was pending.
    pub fn is_completion_pending(&self) -> bool {
        self.completion_pending
    }

    /// The clock emissions are timed with.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Judges an element that just arrived from upstream.
    ///
    /// An element is eligible once the current interval has elapsed since
    /// the last emission; before the first emission (and right after a reset)
    /// every element is eligible.
    pub fn on_next(&mut self, item: T) -> Verdict<T> {
        self.emitted();
        let elapsed = match self.last_emission {
            Some(last) => self.clock.now().saturating_sub(last),
            None => self.interval,
        };

        if elapsed >= self.interval {
            self.interval = self.due_time.next_interval(&item, self.interval);
            // an eligible element supersedes whatever was waiting
            self.pending = None;
            self.unstamped = true;
            trace!(interval = ?self.interval, "element eligible");
            return Verdict::Emit(item);
        }

        if !self.latest {
            trace!(?elapsed, interval = ?self.interval, "element dropped");
            return Verdict::Dropped(item);
        }

        match self.pending.replace(item) {
            Some(previous) => {
                trace!("pending element superseded");
                Verdict::Superseded(previous)
            }
            None => {
                let delay = self.interval - elapsed;
                let ticket = self.arm();
                trace!(?delay, "element suppressed; flush scheduled");
                Verdict::Schedule { delay, ticket }
            }
        }
    }

    /// Records that the element returned by the last emission has been
    /// delivered downstream.
    ///
    /// The emission time is taken now, after delivery, so that slow
    /// downstream processing counts towards the next interval. Calling this
    /// when nothing is awaiting a timestamp is a no-op.
    pub fn emitted(&mut self) {
        if self.unstamped {
            self.unstamped = false;
            self.last_emission = Some(self.clock.now());
        }
    }

    /// Handles the firing of the flush timer armed with `ticket`.
    ///
    /// Delivers the pending element, if any, followed by completion when
    /// upstream has already completed. A ticket that is no longer armed
    /// yields an idle flush.
    pub fn flush(&mut self, ticket: FlushTicket) -> Flush<T> {
        if unlikely(self.armed != Some(ticket)) {
            trace!(?ticket, "ignoring stale flush");
            return Flush::idle();
        }
        self.armed = None;

        let item = self.pending.take();
        if let Some(item) = item.as_ref() {
            if self.advance_on_flush {
                self.interval = self.due_time.next_interval(item, self.interval);
            }
            self.unstamped = true;
            trace!(interval = ?self.interval, "flushing pending element");
        }
        Flush {
            item,
            complete: std::mem::take(&mut self.completion_pending),
        }
    }

    /// Handles a signal from the reset stream.
    ///
    /// In latest mode the pending element is delivered first (unless
    /// [`flush_on_reset`](Self::flush_on_reset) is disabled). The pacing state
    /// is then cleared so the next element is eligible whatever the time since
    /// the last emission. Any armed flush is disarmed.
    pub fn reset(&mut self) -> Flush<T> {
        let pending = self.pending.take();
        let item = match pending {
            Some(item) if self.flush_on_reset => Some(item),
            Some(_) => {
                debug!("pending element discarded by reset");
                None
            }
            None => None,
        };

        self.interval = Duration::ZERO;
        self.last_emission = None;
        self.unstamped = false;
        self.armed = None;
        debug!(flushed = item.is_some(), "pacing state reset");

        Flush {
            item,
            complete: std::mem::take(&mut self.completion_pending),
        }
    }

    /// Handles upstream completion.
    ///
    /// Returns `true` if downstream may complete right away. Otherwise an
    /// element is pending and completion follows its flush.
    pub fn complete(&mut self) -> bool {
        if self.pending.is_some() {
            debug!("completion deferred until the pending element is flushed");
            self.completion_pending = true;
            false
        } else {
            true
        }
    }

    /// Handles an upstream error.
    ///
    /// Errors are terminal and take priority over pacing: the pending element
    /// is discarded (and returned), and any armed flush is disarmed.
    pub fn on_error(&mut self) -> Option<T> {
        self.armed = None;
        self.completion_pending = false;
        let discarded = self.pending.take();
        if discarded.is_some() {
            debug!("pending element discarded by upstream error");
        }
        discarded
    }

    fn arm(&mut self) -> FlushTicket {
        self.next_ticket = self.next_ticket.wrapping_add(1);
        let ticket = FlushTicket(self.next_ticket);
        self.armed = Some(ticket);
        ticket
    }
}

impl<T, F, C> Debug for Pacer<T, F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("interval", &self.interval)
            .field("last_emission", &self.last_emission)
            .field("pending", &self.pending.is_some())
            .field("latest", &self.latest)
            .field("completion_pending", &self.completion_pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fixed, ManualClock};
    use std::sync::Arc;

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn doubling(_: &i32, previous: Duration) -> Duration {
        (previous * 2).max(ms(100))
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Next(i32),
        Completed,
        Error,
    }

    enum Input {
        Next(i32),
        Completed,
        Error,
    }

    /// Drives a pacer in virtual time. At equal timestamps upstream events
    /// go first, then resets, then the flush timer.
    fn simulate<F: DueTime<i32>>(
        pacer: impl FnOnce(Arc<ManualClock>) -> Pacer<i32, F, Arc<ManualClock>>,
        upstream: &[(u64, Input)],
        resets: &[u64],
    ) -> Vec<(u64, Event)> {
        let clock = Arc::new(ManualClock::default());
        let mut pacer = pacer(Arc::clone(&clock));
        let mut upstream = upstream.iter().peekable();
        let mut resets = resets.iter().copied().peekable();
        let mut timer: Option<(u64, FlushTicket)> = None;
        let mut out = vec![];

        loop {
            let next_up = upstream.peek().map(|(t, _)| *t);
            let next_reset = resets.peek().copied();
            let next_timer = timer.map(|(t, _)| t);
            let Some(now) = [next_up, next_reset, next_timer].into_iter().flatten().min() else {
                return out;
            };
            clock.set(ms(now));

            let release = |pacer: &mut Pacer<i32, F, _>, flush: Flush<i32>, out: &mut Vec<_>| {
                if let Some(item) = flush.item {
                    out.push((now, Event::Next(item)));
                    pacer.emitted();
                }
                if flush.complete {
                    out.push((now, Event::Completed));
                }
                flush.complete
            };

            if next_up == Some(now) {
                let (_, input) = upstream.next().unwrap();
                match input {
                    Input::Next(item) => match pacer.on_next(*item) {
                        Verdict::Emit(item) => {
                            out.push((now, Event::Next(item)));
                            pacer.emitted();
                        }
                        Verdict::Schedule { delay, ticket } => {
                            timer = Some((now + delay.as_millis() as u64, ticket));
                        }
                        Verdict::Superseded(_) | Verdict::Dropped(_) => {}
                    },
                    Input::Completed => {
                        if pacer.complete() {
                            out.push((now, Event::Completed));
                            return out;
                        }
                    }
                    Input::Error => {
                        pacer.on_error();
                        out.push((now, Event::Error));
                        return out;
                    }
                }
            } else if next_reset == Some(now) {
                resets.next();
                let flush = pacer.reset();
                if release(&mut pacer, flush, &mut out) {
                    return out;
                }
            } else if let Some((_, ticket)) = timer.take() {
                let flush = pacer.flush(ticket);
                if release(&mut pacer, flush, &mut out) {
                    return out;
                }
            }
        }
    }

    fn scenario() -> Vec<(u64, Input)> {
        vec![
            (210, Input::Next(2)),
            (250, Input::Next(3)),
            (310, Input::Next(4)),
            (350, Input::Next(5)),
            (570, Input::Next(6)),
            (960, Input::Next(7)),
            (1000, Input::Completed),
        ]
    }

    #[test]
    fn first_element_passes_immediately() {
        let clock = ManualClock::new(ms(5_000));
        let mut pacer = Pacer::with_clock(Fixed(ms(100)), &clock);
        assert_eq!(pacer.on_next(1), Verdict::Emit(1));
        assert_eq!(pacer.interval(), ms(100));
        assert_eq!(pacer.last_emission(), None);
        pacer.emitted();
        assert_eq!(pacer.last_emission(), Some(ms(5_000)));
    }

    #[test]
    fn emission_is_stamped_after_delivery() {
        let clock = ManualClock::default();
        let mut pacer = Pacer::with_clock(Fixed(ms(100)), &clock);
        assert_eq!(pacer.on_next(1), Verdict::Emit(1));
        // downstream takes 30ms to process the element
        clock.advance(ms(30));
        pacer.emitted();
        pacer.emitted();
        assert_eq!(pacer.last_emission(), Some(ms(30)));

        clock.advance(ms(90));
        assert_eq!(pacer.on_next(2), Verdict::Dropped(2));
        clock.advance(ms(10));
        assert_eq!(pacer.on_next(3), Verdict::Emit(3));
    }

    #[test]
    fn leading_edge_only_drops_suppressed() {
        let out = simulate(|clock| Pacer::with_clock(doubling, clock), &scenario(), &[]);
        assert_eq!(
            out,
            vec![
                (210, Event::Next(2)),
                (310, Event::Next(4)),
                (570, Event::Next(6)),
                (1000, Event::Completed),
            ]
        );
    }

    #[test]
    fn latest_flushes_advance_the_interval() {
        let out = simulate(
            |clock| Pacer::with_clock(doubling, clock).latest(true),
            &scenario(),
            &[],
        );
        assert_eq!(
            out,
            vec![
                (210, Event::Next(2)),
                (310, Event::Next(4)),
                (510, Event::Next(5)),
                (910, Event::Next(6)),
                (1710, Event::Next(7)),
                (1710, Event::Completed),
            ]
        );
    }

    #[test]
    fn latest_flushes_keep_the_window() {
        let out = simulate(
            |clock| {
                Pacer::with_clock(doubling, clock)
                    .latest(true)
                    .advance_on_flush(false)
            },
            &scenario(),
            &[],
        );
        assert_eq!(
            out,
            vec![
                (210, Event::Next(2)),
                (310, Event::Next(4)),
                (510, Event::Next(5)),
                (710, Event::Next(6)),
                (960, Event::Next(7)),
                (1000, Event::Completed),
            ]
        );
    }

    fn reset_scenario() -> Vec<(u64, Input)> {
        vec![
            (210, Input::Next(2)),
            (250, Input::Next(3)),
            (310, Input::Next(4)),
            (350, Input::Next(5)),
            (570, Input::Next(6)),
            (580, Input::Next(7)),
            (960, Input::Next(8)),
            (1000, Input::Completed),
        ]
    }

    #[test]
    fn reset_flushes_pending_and_restarts_pacing() {
        let out = simulate(
            |clock| Pacer::with_clock(doubling, clock).latest(true),
            &reset_scenario(),
            &[500],
        );
        assert_eq!(
            out,
            vec![
                (210, Event::Next(2)),
                (310, Event::Next(4)),
                (500, Event::Next(5)),
                (570, Event::Next(6)),
                (670, Event::Next(7)),
                (960, Event::Next(8)),
                (1000, Event::Completed),
            ]
        );
    }

    #[test]
    fn reset_can_discard_pending() {
        let out = simulate(
            |clock| {
                Pacer::with_clock(doubling, clock)
                    .latest(true)
                    .flush_on_reset(false)
            },
            &reset_scenario(),
            &[500],
        );
        assert_eq!(
            out,
            vec![
                (210, Event::Next(2)),
                (310, Event::Next(4)),
                (570, Event::Next(6)),
                (670, Event::Next(7)),
                (960, Event::Next(8)),
                (1000, Event::Completed),
            ]
        );
    }

    #[test]
    fn reset_makes_next_element_eligible() {
        let clock = ManualClock::default();
        let mut pacer = Pacer::with_clock(Fixed(ms(1_000)), &clock);
        assert_eq!(pacer.on_next(1), Verdict::Emit(1));
        pacer.emitted();
        clock.advance(ms(1));
        assert_eq!(pacer.on_next(2), Verdict::Dropped(2));
        assert!(pacer.reset().is_idle());
        assert_eq!(pacer.interval(), Duration::ZERO);
        assert_eq!(pacer.on_next(3), Verdict::Emit(3));
    }

    #[test]
    fn latest_wins_within_a_window() {
        let upstream = vec![
            (0, Input::Next(1)),
            (10, Input::Next(2)),
            (20, Input::Next(3)),
            (30, Input::Next(4)),
            (500, Input::Completed),
        ];
        let out = simulate(
            |clock| Pacer::with_clock(Fixed(ms(100)), clock).latest(true),
            &upstream,
            &[],
        );
        assert_eq!(
            out,
            vec![
                (0, Event::Next(1)),
                (100, Event::Next(4)),
                (500, Event::Completed),
            ]
        );
    }

    #[test]
    fn completion_waits_for_pending_flush() {
        let upstream = vec![
            (0, Input::Next(1)),
            (10, Input::Next(2)),
            (20, Input::Completed),
        ];
        let out = simulate(
            |clock| Pacer::with_clock(Fixed(ms(100)), clock).latest(true),
            &upstream,
            &[],
        );
        assert_eq!(
            out,
            vec![
                (0, Event::Next(1)),
                (100, Event::Next(2)),
                (100, Event::Completed),
            ]
        );
    }

    #[test]
    fn reset_while_completion_pending_completes() {
        let upstream = vec![
            (0, Input::Next(1)),
            (10, Input::Next(2)),
            (20, Input::Completed),
        ];
        let out = simulate(
            |clock| {
                Pacer::with_clock(Fixed(ms(100)), clock)
                    .latest(true)
                    .flush_on_reset(false)
            },
            &upstream,
            &[50],
        );
        assert_eq!(out, vec![(0, Event::Next(1)), (50, Event::Completed)]);
    }

    #[test]
    fn error_discards_pending() {
        let upstream = vec![
            (0, Input::Next(1)),
            (10, Input::Next(2)),
            (20, Input::Error),
        ];
        let out = simulate(
            |clock| Pacer::with_clock(Fixed(ms(100)), clock).latest(true),
            &upstream,
            &[],
        );
        assert_eq!(out, vec![(0, Event::Next(1)), (20, Event::Error)]);
    }

    #[test]
    fn error_disarms_flush() {
        let clock = ManualClock::default();
        let mut pacer = Pacer::with_clock(Fixed(ms(100)), &clock).latest(true);
        assert_eq!(pacer.on_next(1), Verdict::Emit(1));
        pacer.emitted();
        let Verdict::Schedule { ticket, .. } = pacer.on_next(2) else {
            panic!("expected a scheduled flush");
        };
        assert_eq!(pacer.on_error(), Some(2));
        clock.advance(ms(100));
        assert!(pacer.flush(ticket).is_idle());
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let clock = ManualClock::default();
        let mut pacer = Pacer::with_clock(Fixed(ms(100)), &clock).latest(true);
        assert_eq!(pacer.on_next(1), Verdict::Emit(1));
        pacer.emitted();

        clock.advance(ms(10));
        let Verdict::Schedule { ticket: first, .. } = pacer.on_next(2) else {
            panic!("expected a scheduled flush");
        };
        // the window closes and an eligible element clears the pending one
        clock.advance(ms(90));
        assert_eq!(pacer.on_next(3), Verdict::Emit(3));
        pacer.emitted();
        // a new element in the next window arms a fresh flush
        let Verdict::Schedule { ticket: second, delay } = pacer.on_next(4) else {
            panic!("expected a scheduled flush");
        };
        assert_eq!(delay, ms(100));
        assert_ne!(first, second);

        // the old timer firing late must not release element 4 early
        assert!(pacer.flush(first).is_idle());
        assert_eq!(pacer.pending(), Some(&4));

        clock.advance(delay);
        assert_eq!(pacer.flush(second).item, Some(4));
    }

    #[test]
    fn spacing_holds_for_every_emission() {
        let clock = Arc::new(ManualClock::default());
        let mut pacer = Pacer::with_clock(doubling, Arc::clone(&clock)).latest(true);
        let mut timer: Option<(u64, FlushTicket)> = None;
        let mut emissions: Vec<(u64, Duration)> = vec![];

        // an element every 7ms for two seconds
        for now in 0..2_000u64 {
            clock.set(ms(now));
            if now % 7 == 0 {
                match pacer.on_next(now as i32) {
                    Verdict::Emit(_) => {
                        pacer.emitted();
                        emissions.push((now, pacer.interval()));
                    }
                    Verdict::Schedule { delay, ticket } => {
                        timer = Some((now + delay.as_millis() as u64, ticket));
                    }
                    _ => {}
                }
            }
            if let Some((due, ticket)) = timer {
                if due == now {
                    timer = None;
                    if pacer.flush(ticket).item.is_some() {
                        pacer.emitted();
                        emissions.push((now, pacer.interval()));
                    }
                }
            }
        }

        assert!(emissions.len() > 3);
        for pair in emissions.windows(2) {
            let (a, interval) = pair[0];
            let (b, _) = pair[1];
            assert!(ms(b - a) >= interval, "{a} -> {b} violates {interval:?}");
        }
    }
}
