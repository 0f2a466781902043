use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use futures::stream::FusedStream;
use likely_stable::unlikely;
use pin_project_lite::pin_project;

use super::gate::{Gate, POLL_BUDGET};
use crate::{Clock, DueTime, Pacer};

pin_project! {
    /// A stream that paces the items of another stream with a [`Pacer`].
    ///
    /// An item is yielded as soon as the pacer's current interval has elapsed
    /// since the previous one; after every yielded item the interval is
    /// recomputed by the pacer's due-time policy. Items arriving too early are
    /// dropped, or with [`Pacer::latest`] the most recent of them is held and
    /// yielded once the interval has elapsed.
    ///
    /// Every item of the `reset` stream clears the pacing state: a held item
    /// is yielded right away (see [`Pacer::flush_on_reset`]) and the next
    /// upstream item passes regardless of timing. The reset stream ending
    /// does not end the output.
    ///
    /// The output ends when upstream ends and no item is held. Dropping it
    /// drops upstream, the reset stream and any armed timer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(all(feature = "async", feature = "tokio"))]
    /// # {
    /// use futures::{StreamExt, stream};
    /// use lento::futures::SmartThrottleExt;
    /// use lento::{Exponential, Pacer};
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let backoff =
    ///     Exponential::new(Duration::from_millis(100), 2.0, Duration::from_secs(5)).unwrap();
    /// let pacer = Pacer::tokio(backoff).latest(true);
    ///
    /// let mut throttled = std::pin::pin!(stream::iter(0..100).smart_throttle(pacer));
    /// while let Some(item) = throttled.next().await {
    ///     println!("{item}");
    /// }
    /// # }
    /// # }
    /// ```
    #[must_use = "streams do nothing unless polled"]
    pub struct SmartThrottle<S, R, F, C>
    where
        S: Stream,
        R: Stream,
        F: DueTime<S::Item>,
        C: Clock,
    {
        #[pin]
        stream: Option<S>,
        #[pin]
        gate: Gate<S::Item, R, F, C>,
    }
}

impl<S, R, F, C> SmartThrottle<S, R, F, C>
where
    S: Stream,
    R: Stream,
    F: DueTime<S::Item>,
    C: Clock,
{
    /// Creates a paced stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - The underlying stream to pace
    /// * `pacer` - The pacer deciding when items may pass; its clock should
    ///   follow tokio time (`TokioClock`)
    /// * `reset` - A stream whose items reset the pacing state
    pub fn new(stream: S, pacer: Pacer<S::Item, F, C>, reset: R) -> Self {
        Self {
            stream: Some(stream),
            gate: Gate::new(pacer, reset),
        }
    }

    /// Returns the pacer driving this stream.
    pub fn pacer(&self) -> &Pacer<S::Item, F, C> {
        self.gate.pacer()
    }

    /// Spacing currently required before the next item.
    pub fn interval(&self) -> Duration {
        self.gate.pacer().interval()
    }

    /// Returns the upstream, or `None` once it has ended.
    pub fn get_ref(&self) -> Option<&S> {
        self.stream.as_ref()
    }
}

impl<S, R, F, C> Stream for SmartThrottle<S, R, F, C>
where
    S: Stream,
    R: Stream,
    F: DueTime<S::Item>,
    C: Clock,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if unlikely(this.gate.is_finished()) {
            return Poll::Ready(None);
        }
        // the previous item has been consumed by now
        this.gate.as_mut().stamp();

        let mut budget = POLL_BUDGET;
        loop {
            if let Some(release) = this.gate.as_mut().poll_reset(cx) {
                return Poll::Ready(release.into_item());
            }

            if let Some(stream) = this.stream.as_mut().as_pin_mut() {
                match stream.poll_next(cx) {
                    Poll::Ready(Some(item)) => {
                        if let Some(item) = this.gate.as_mut().admit(item) {
                            return Poll::Ready(Some(item));
                        }
                        budget -= 1;
                        if budget > 0 {
                            continue;
                        }
                        // upstream is always ready; give the timer and other tasks a turn
                        if let Some(release) = this.gate.as_mut().poll_flush(cx) {
                            return Poll::Ready(release.into_item());
                        }
                        cx.waker().wake_by_ref();
                        return Poll::Pending;
                    }
                    Poll::Ready(None) => {
                        this.stream.set(None);
                        if this.gate.as_mut().complete() {
                            return Poll::Ready(None);
                        }
                        continue;
                    }
                    Poll::Pending => {}
                }
            }

            return match this.gate.as_mut().poll_flush(cx) {
                Some(release) => Poll::Ready(release.into_item()),
                None => Poll::Pending,
            };
        }
    }
}

impl<S, R, F, C> FusedStream for SmartThrottle<S, R, F, C>
where
    S: Stream,
    R: Stream,
    F: DueTime<S::Item>,
    C: Clock,
{
    fn is_terminated(&self) -> bool {
        self.gate.is_finished()
    }
}
