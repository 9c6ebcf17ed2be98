//! Cross-store composition
//!
//! Joins the projections of several containers (possibly owned by different
//! registries) into one stream of tuples:
//!
//! ```text
//!   co_host.watch(connected) ──┐
//!                              ├──► combine_latest2 ──► (connected, is_battling)
//!   battle.watch(is_battling) ─┘
//! ```
//!
//! Nothing is emitted until every input has delivered once. After that, every
//! single input delivery yields one tuple carrying the latest value of each
//! input.

mod sink;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

pub use sink::observe;

/// One input of a combinator and its latest item
struct Input<S: Stream> {
    stream: S,
    latest: Option<S::Item>,
    done: bool,
}

// Items are stored by value and never pinned
impl<S: Stream + Unpin> Unpin for Input<S> {}

impl<S: Stream + Unpin> Input<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            latest: None,
            done: false,
        }
    }

    /// `Ready(Some(()))` when a new item was stored, `Ready(None)` once ended
    fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Option<()>> {
        if self.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.stream).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                self.latest = Some(item);
                Poll::Ready(Some(()))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Ended without ever delivering; the join can never complete
    fn starved(&self) -> bool {
        self.done && self.latest.is_none()
    }
}

/// Stream returned by [`combine_latest2`]
#[must_use = "streams do nothing unless polled"]
pub struct CombineLatest2<A: Stream, B: Stream> {
    a: Input<A>,
    b: Input<B>,
    next: usize,
}

/// Combine two streams into a stream of their latest items
pub fn combine_latest2<A, B>(a: A, b: B) -> CombineLatest2<A, B>
where
    A: Stream + Unpin,
    B: Stream + Unpin,
{
    CombineLatest2 {
        a: Input::new(a),
        b: Input::new(b),
        next: 0,
    }
}

impl<A, B> CombineLatest2<A, B>
where
    A: Stream + Unpin,
    B: Stream + Unpin,
    A::Item: Clone,
    B::Item: Clone,
{
    fn poll_input(&mut self, i: usize, cx: &mut Context<'_>) -> Poll<Option<()>> {
        match i {
            0 => self.a.poll(cx),
            _ => self.b.poll(cx),
        }
    }

    fn joined(&self) -> Option<(A::Item, B::Item)> {
        Some((self.a.latest.clone()?, self.b.latest.clone()?))
    }

    fn finished(&self) -> bool {
        (self.a.done && self.b.done) || self.a.starved() || self.b.starved()
    }
}

impl<A, B> Stream for CombineLatest2<A, B>
where
    A: Stream + Unpin,
    B: Stream + Unpin,
    A::Item: Clone,
    B::Item: Clone,
{
    type Item = (A::Item, B::Item);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let mut progressed = false;
            let start = this.next;

            for offset in 0..2 {
                let i = (start + offset) % 2;
                if let Poll::Ready(Some(())) = this.poll_input(i, cx) {
                    // Start after the input that just delivered
                    this.next = (i + 1) % 2;
                    if let Some(item) = this.joined() {
                        return Poll::Ready(Some(item));
                    }
                    progressed = true;
                }
            }

            if this.finished() {
                return Poll::Ready(None);
            }
            if !progressed {
                return Poll::Pending;
            }
        }
    }
}

/// Stream returned by [`combine_latest3`]
#[must_use = "streams do nothing unless polled"]
pub struct CombineLatest3<A: Stream, B: Stream, C: Stream> {
    a: Input<A>,
    b: Input<B>,
    c: Input<C>,
    next: usize,
}

/// Combine three streams into a stream of their latest items
pub fn combine_latest3<A, B, C>(a: A, b: B, c: C) -> CombineLatest3<A, B, C>
where
    A: Stream + Unpin,
    B: Stream + Unpin,
    C: Stream + Unpin,
{
    CombineLatest3 {
        a: Input::new(a),
        b: Input::new(b),
        c: Input::new(c),
        next: 0,
    }
}

impl<A, B, C> CombineLatest3<A, B, C>
where
    A: Stream + Unpin,
    B: Stream + Unpin,
    C: Stream + Unpin,
    A::Item: Clone,
    B::Item: Clone,
    C::Item: Clone,
{
    fn poll_input(&mut self, i: usize, cx: &mut Context<'_>) -> Poll<Option<()>> {
        match i {
            0 => self.a.poll(cx),
            1 => self.b.poll(cx),
            _ => self.c.poll(cx),
        }
    }

    fn joined(&self) -> Option<(A::Item, B::Item, C::Item)> {
        Some((
            self.a.latest.clone()?,
            self.b.latest.clone()?,
            self.c.latest.clone()?,
        ))
    }

    fn finished(&self) -> bool {
        (self.a.done && self.b.done && self.c.done)
            || self.a.starved()
            || self.b.starved()
            || self.c.starved()
    }
}

impl<A, B, C> Stream for CombineLatest3<A, B, C>
where
    A: Stream + Unpin,
    B: Stream + Unpin,
    C: Stream + Unpin,
    A::Item: Clone,
    B::Item: Clone,
    C::Item: Clone,
{
    type Item = (A::Item, B::Item, C::Item);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let mut progressed = false;
            let start = this.next;

            for offset in 0..3 {
                let i = (start + offset) % 3;
                if let Poll::Ready(Some(())) = this.poll_input(i, cx) {
                    this.next = (i + 1) % 3;
                    if let Some(item) = this.joined() {
                        return Poll::Ready(Some(item));
                    }
                    progressed = true;
                }
            }

            if this.finished() {
                return Poll::Ready(None);
            }
            if !progressed {
                return Poll::Pending;
            }
        }
    }
}
