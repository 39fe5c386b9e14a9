//! Communications: payloads, rendezvous channels, and the handles actors wait on.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::channel::oneshot;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::platform::HostId;
use crate::sim::engine::{Context, Shared};
use crate::sim::fluid::Delivery;
use crate::units::Bytes;

/// The unit of data moved by one communication. It carries its own size, so a receiver learns
/// how much arrived from the payload rather than from the sender's plan.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct Payload {
    flow: usize,
    size: Bytes,
}

impl Payload {
    /// Index of the flow this payload belongs to.
    pub fn flow(&self) -> usize {
        self.flow
    }

    pub fn size(&self) -> Bytes {
        self.size
    }
}

/// A handle on an in-flight communication. Resolves once the transfer is delivered.
#[derive(Debug)]
#[must_use = "a communication handle does nothing unless awaited"]
pub struct Comm<T> {
    done: oneshot::Receiver<T>,
}

impl<T> Future for Comm<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<T> {
        match Pin::new(&mut self.done).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            // A dropped engine never resumes the actor.
            Poll::Ready(Err(oneshot::Canceled)) | Poll::Pending => Poll::Pending,
        }
    }
}

/// The set of communications an actor has issued and not yet seen complete.
///
/// Each actor owns its own set. Completed handles leave the set in completion order, which need
/// not match the order they were pushed in.
#[derive(Debug)]
pub struct ActivitySet<T> {
    pending: FuturesUnordered<Comm<T>>,
}

impl<T> Default for ActivitySet<T> {
    fn default() -> Self {
        Self {
            pending: FuturesUnordered::new(),
        }
    }
}

impl<T> ActivitySet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, comm: Comm<T>) {
        self.pending.push(comm);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Waits until every pending communication has completed and returns their results in
    /// completion order. The set is empty afterwards.
    pub async fn wait_all(&mut self) -> Vec<T> {
        let mut done = Vec::with_capacity(self.len());
        while let Some(value) = self.pending.next().await {
            done.push(value);
        }
        done
    }
}

/// A posted send waiting for a receiver.
#[derive(Debug)]
pub(crate) struct PendingSend {
    pub(crate) from: HostId,
    pub(crate) payload: Payload,
    pub(crate) sent: oneshot::Sender<()>,
}

/// A posted receive waiting for a sender.
#[derive(Debug)]
pub(crate) struct PendingRecv {
    pub(crate) to: HostId,
    pub(crate) received: oneshot::Sender<Payload>,
}

/// Sends and receives posted on one channel that have not been matched yet.
#[derive(Debug)]
pub(crate) struct Rendezvous {
    pub(crate) name: String,
    pub(crate) sends: VecDeque<PendingSend>,
    pub(crate) recvs: VecDeque<PendingRecv>,
}

impl Rendezvous {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            sends: VecDeque::new(),
            recvs: VecDeque::new(),
        }
    }
}

/// A rendezvous channel. Sends and receives are matched first-come first-served, and a transfer
/// starts only once both sides have been posted.
///
/// A channel is handed explicitly to the actors that use it; the name only labels diagnostics.
#[derive(Clone)]
pub struct Channel {
    index: usize,
    name: Arc<str>,
    shared: Arc<Shared>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("name", &self.name).finish()
    }
}

impl Channel {
    pub(crate) fn new(index: usize, name: &str, shared: Arc<Shared>) -> Self {
        Self {
            index,
            name: name.into(),
            shared,
        }
    }

    /// Posts a non-blocking send of `payload` from the calling actor's host.
    pub fn put_async(&self, ctx: &Context, payload: Payload) -> Comm<()> {
        let (sent, done) = oneshot::channel();
        let from = ctx.host();
        self.shared.with_state(|state| {
            match state.channels[self.index].recvs.pop_front() {
                Some(PendingRecv { to, received }) => state.start_transfer(
                    &self.shared.platform,
                    from,
                    to,
                    Delivery {
                        payload,
                        sent,
                        received,
                    },
                ),
                None => state.channels[self.index].sends.push_back(PendingSend {
                    from,
                    payload,
                    sent,
                }),
            }
        });
        Comm { done }
    }

    /// Posts a non-blocking receive into the calling actor's host.
    pub fn get_async(&self, ctx: &Context) -> Comm<Payload> {
        let (received, done) = oneshot::channel();
        let to = ctx.host();
        self.shared.with_state(|state| {
            match state.channels[self.index].sends.pop_front() {
                Some(PendingSend {
                    from,
                    payload,
                    sent,
                }) => state.start_transfer(
                    &self.shared.platform,
                    from,
                    to,
                    Delivery {
                        payload,
                        sent,
                        received,
                    },
                ),
                None => state.channels[self.index]
                    .recvs
                    .push_back(PendingRecv { to, received }),
            }
        });
        Comm { done }
    }
}
