use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;

use super::timer::{Sleep, sleep};
use crate::pacer::{Flush, FlushTicket, Verdict};
use crate::{Clock, DueTime, Pacer};

/// Upstream items a single poll may consume without yielding before it
/// hands control back to the executor.
pub(crate) const POLL_BUDGET: usize = 32;

/// What a throttled stream yields after a flush or a reset.
pub(crate) enum Release<T> {
    Item(T),
    End,
}

impl<T> Release<T> {
    pub(crate) fn into_item(self) -> Option<T> {
        match self {
            Release::Item(item) => Some(item),
            Release::End => None,
        }
    }
}

pin_project! {
    /// The part of a throttled stream that does not depend on how upstream
    /// reports errors: the pacer, the reset signal and the flush timer.
    pub(crate) struct Gate<T, R, F, C> {
        #[pin]
        reset: Option<R>,
        #[pin]
        delay: Option<Sleep>,
        ticket: Option<FlushTicket>,
        pacer: Pacer<T, F, C>,
        finished: bool,
    }
}

impl<T, R, F, C> Gate<T, R, F, C>
where
    R: Stream,
    F: DueTime<T>,
    C: Clock,
{
    pub(crate) fn new(pacer: Pacer<T, F, C>, reset: R) -> Self {
        Self {
            reset: Some(reset),
            delay: None,
            ticket: None,
            pacer,
            finished: false,
        }
    }

    pub(crate) fn pacer(&self) -> &Pacer<T, F, C> {
        &self.pacer
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Records the delivery of the previously yielded element, if any.
    pub(crate) fn stamp(self: Pin<&mut Self>) {
        self.project().pacer.emitted();
    }

    /// Drains the reset signal. Returns what to yield if a reset released
    /// the pending element or completed the output.
    pub(crate) fn poll_reset(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Option<Release<T>> {
        let mut this = self.project();
        loop {
            let reset = this.reset.as_mut().as_pin_mut()?;
            match reset.poll_next(cx) {
                Poll::Ready(Some(_)) => {
                    // the pending flush, if any, is released or dropped below
                    this.delay.set(None);
                    *this.ticket = None;
                    let flush = this.pacer.reset();
                    if let Some(release) = settle(flush, this.finished) {
                        if *this.finished {
                            this.reset.set(None);
                        }
                        return Some(release);
                    }
                }
                Poll::Ready(None) => {
                    // the reset signal is auxiliary; its end only stops resets
                    this.reset.set(None);
                    return None;
                }
                Poll::Pending => return None,
            }
        }
    }

    /// Judges an upstream element. Returns it if it may be yielded now.
    pub(crate) fn admit(self: Pin<&mut Self>, item: T) -> Option<T> {
        let mut this = self.project();
        match this.pacer.on_next(item) {
            Verdict::Emit(item) => Some(item),
            Verdict::Schedule { delay, ticket } => {
                this.delay.set(Some(sleep(delay)));
                *this.ticket = Some(ticket);
                None
            }
            Verdict::Superseded(_) | Verdict::Dropped(_) => None,
        }
    }

    /// Upstream completed. Returns true if the output ends right away.
    pub(crate) fn complete(mut self: Pin<&mut Self>) -> bool {
        if self.as_mut().project().pacer.complete() {
            self.finish();
            true
        } else {
            false
        }
    }

    /// Upstream failed; the pending element is discarded.
    pub(crate) fn abort(mut self: Pin<&mut Self>) {
        self.as_mut().project().pacer.on_error();
        self.finish();
    }

    /// Polls the flush timer. Returns what to yield if it fired with
    /// something to release.
    pub(crate) fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Option<Release<T>> {
        let mut this = self.project();
        let delay = this.delay.as_mut().as_pin_mut()?;
        if delay.poll(cx).is_pending() {
            return None;
        }
        this.delay.set(None);
        let ticket = this.ticket.take()?;
        let flush = this.pacer.flush(ticket);
        let release = settle(flush, this.finished);
        if *this.finished {
            this.reset.set(None);
        }
        release
    }

    fn finish(self: Pin<&mut Self>) {
        let mut this = self.project();
        *this.finished = true;
        *this.ticket = None;
        this.delay.set(None);
        this.reset.set(None);
    }
}

fn settle<T>(flush: Flush<T>, finished: &mut bool) -> Option<Release<T>> {
    if flush.complete {
        *finished = true;
    }
    match flush.item {
        Some(item) => Some(Release::Item(item)),
        None if flush.complete => Some(Release::End),
        None => None,
    }
}
