use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::FusedStream;
use futures::{Stream, TryStream};
use likely_stable::unlikely;
use pin_project_lite::pin_project;

use super::gate::{Gate, POLL_BUDGET};
use crate::{Clock, DueTime, Pacer};

pin_project! {
    /// A fallible stream paced by a [`Pacer`].
    ///
    /// `Ok` items are paced exactly like [`SmartThrottle`](super::SmartThrottle)
    /// paces items. The first `Err` is yielded immediately, discards any held
    /// item, and ends the stream.
    #[must_use = "streams do nothing unless polled"]
    pub struct TrySmartThrottle<S, R, F, C>
    where
        S: TryStream,
        R: Stream,
        F: DueTime<S::Ok>,
        C: Clock,
    {
        #[pin]
        stream: Option<S>,
        #[pin]
        gate: Gate<S::Ok, R, F, C>,
    }
}

impl<S, R, F, C> TrySmartThrottle<S, R, F, C>
where
    S: TryStream,
    R: Stream,
    F: DueTime<S::Ok>,
    C: Clock,
{
    /// Creates a paced fallible stream.
    pub fn new(stream: S, pacer: Pacer<S::Ok, F, C>, reset: R) -> Self {
        Self {
            stream: Some(stream),
            gate: Gate::new(pacer, reset),
        }
    }

    pub fn pacer(&self) -> &Pacer<S::Ok, F, C> {
        self.gate.pacer()
    }

    pub fn interval(&self) -> Duration {
        self.gate.pacer().interval()
    }
}

impl<S, R, F, C> Stream for TrySmartThrottle<S, R, F, C>
where
    S: TryStream,
    R: Stream,
    F: DueTime<S::Ok>,
    C: Clock,
{
    type Item = Result<S::Ok, S::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if unlikely(this.gate.is_finished()) {
            return Poll::Ready(None);
        }
        this.gate.as_mut().stamp();

        let mut budget = POLL_BUDGET;
        loop {
            if let Some(release) = this.gate.as_mut().poll_reset(cx) {
                return Poll::Ready(release.into_item().map(Ok));
            }

            if let Some(stream) = this.stream.as_mut().as_pin_mut() {
                match stream.try_poll_next(cx) {
                    Poll::Ready(Some(Ok(item))) => {
                        if let Some(item) = this.gate.as_mut().admit(item) {
                            return Poll::Ready(Some(Ok(item)));
                        }
                        budget -= 1;
                        if budget > 0 {
                            continue;
                        }
                        if let Some(release) = this.gate.as_mut().poll_flush(cx) {
                            return Poll::Ready(release.into_item().map(Ok));
                        }
                        cx.waker().wake_by_ref();
                        return Poll::Pending;
                    }
                    Poll::Ready(Some(Err(err))) => {
                        // terminal, and never delayed by pacing
                        this.stream.set(None);
                        this.gate.as_mut().abort();
                        return Poll::Ready(Some(Err(err)));
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
                Some(release) => Poll::Ready(release.into_item().map(Ok)),
                None => Poll::Pending,
            };
        }
    }
}

impl<S, R, F, C> FusedStream for TrySmartThrottle<S, R, F, C>
where
    S: TryStream,
    R: Stream,
    F: DueTime<S::Ok>,
    C: Clock,
{
    fn is_terminated(&self) -> bool {
        self.gate.is_finished()
    }
}
