//! Interaction collector.
//!
//! A process-wide registry of predicate-filtered subscriptions. Every
//! published interaction is delivered to *every* subscription whose
//! predicate matches; isolation between workflows comes from narrow
//! predicates (a per-prompt token in the custom id), never from the hub.

use futures::stream::Stream;
use hourbook_core::interaction::Interaction;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type Predicate = Arc<dyn Fn(&Interaction) -> bool + Send + Sync>;

struct Subscriber {
    predicate: Predicate,
    tx: mpsc::UnboundedSender<Interaction>,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
}

impl HubInner {
    fn unregister(&self, id: u64) -> bool {
        match self.subscribers.lock() {
            Ok(mut subs) => subs.remove(&id).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(&id).is_some(),
        }
    }
}

/// Shared subscription registry. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct InteractionHub {
    inner: Arc<HubInner>,
}

impl InteractionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate. The subscription is removed when it is
    /// cancelled or dropped, whichever happens first.
    pub fn subscribe<P>(&self, predicate: P) -> Subscription
    where
        P: Fn(&Interaction) -> bool + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            predicate: Arc::new(predicate),
            tx,
        };
        match self.inner.subscribers.lock() {
            Ok(mut subs) => subs.insert(id, subscriber),
            Err(poisoned) => poisoned.into_inner().insert(id, subscriber),
        };
        tracing::debug!("📡 Subscription {id} registered");
        Subscription {
            id,
            rx,
            hub: Arc::clone(&self.inner),
            active: true,
        }
    }

    /// Deliver an interaction to every matching subscription.
    /// Returns how many subscriptions received it.
    pub fn publish(&self, interaction: &Interaction) -> usize {
        let mut subs = match self.inner.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sub) in subs.iter() {
            if !(sub.predicate)(interaction) {
                continue;
            }
            if sub.tx.send(interaction.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*id);
            }
        }
        for id in closed {
            subs.remove(&id);
        }
        delivered
    }

    /// Number of live subscriptions.
    pub fn active(&self) -> usize {
        match self.inner.subscribers.lock() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Wait in the background for one matching interaction.
    ///
    /// The subscription is registered before this returns, so nothing
    /// published afterwards can be missed. Exactly one of `on_match` or
    /// `on_timeout` runs; the subscription is gone by the time it does.
    pub fn wait_for<P, M, FM, T, FT, R>(
        &self,
        predicate: P,
        timeout: Duration,
        on_match: M,
        on_timeout: T,
    ) -> JoinHandle<R>
    where
        P: Fn(&Interaction) -> bool + Send + Sync + 'static,
        M: FnOnce(Interaction) -> FM + Send + 'static,
        FM: Future<Output = R> + Send + 'static,
        T: FnOnce() -> FT + Send + 'static,
        FT: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.subscribe(predicate).wait(timeout, on_match, on_timeout)
    }
}

/// One live subscription. Implements [`Stream`] over its matches.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Interaction>,
    hub: Arc<HubInner>,
    active: bool,
}

impl Subscription {
    /// Next match, or `None` once `timeout` elapses.
    pub async fn next_within(&mut self, timeout: Duration) -> Option<Interaction> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next match, or `None` once `deadline` passes.
    pub async fn next_before(&mut self, deadline: Instant) -> Option<Interaction> {
        tokio::time::timeout_at(deadline, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Consume this subscription in the background: exactly one of
    /// `on_match` or `on_timeout` runs, after the subscription is gone.
    pub fn wait<M, FM, T, FT, R>(
        mut self,
        timeout: Duration,
        on_match: M,
        on_timeout: T,
    ) -> JoinHandle<R>
    where
        M: FnOnce(Interaction) -> FM + Send + 'static,
        FM: Future<Output = R> + Send + 'static,
        T: FnOnce() -> FT + Send + 'static,
        FT: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        tokio::spawn(async move {
            let outcome = self.next_within(timeout).await;
            self.cancel();
            match outcome {
                Some(interaction) => on_match(interaction).await,
                None => on_timeout().await,
            }
        })
    }

    /// Unregister. Safe to call more than once.
    pub fn cancel(&mut self) {
        if self.active {
            self.active = false;
            self.hub.unregister(self.id);
            self.rx.close();
            tracing::debug!("📡 Subscription {} cancelled", self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Stream for Subscription {
    type Item = Interaction;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use hourbook_core::interaction::InteractionKind;
    use hourbook_core::types::{ChannelId, UserId};
    use std::sync::atomic::AtomicUsize;

    fn button(custom_id: &str) -> Interaction {
        Interaction {
            id: format!("i-{custom_id}"),
            user: UserId(1),
            channel: ChannelId(10),
            message: None,
            kind: InteractionKind::Button {
                custom_id: custom_id.into(),
            },
        }
    }

    fn with_prefix(prefix: &'static str) -> impl Fn(&Interaction) -> bool + Send + Sync {
        move |i: &Interaction| i.custom_id().is_some_and(|id| id.starts_with(prefix))
    }

    #[tokio::test]
    async fn test_publish_is_broadcast_to_all_matches() {
        let hub = InteractionHub::new();
        let mut a = hub.subscribe(with_prefix("nav:"));
        let mut b = hub.subscribe(with_prefix("nav:"));
        let _other = hub.subscribe(with_prefix("confirm:"));

        assert_eq!(hub.publish(&button("nav:1:next")), 2);
        assert_eq!(a.next().await.unwrap().custom_id(), Some("nav:1:next"));
        assert_eq!(b.next().await.unwrap().custom_id(), Some("nav:1:next"));
    }

    #[tokio::test]
    async fn test_cancel_and_drop_unregister() {
        let hub = InteractionHub::new();
        let mut a = hub.subscribe(|_| true);
        let b = hub.subscribe(|_| true);
        assert_eq!(hub.active(), 2);

        a.cancel();
        a.cancel();
        drop(b);
        assert_eq!(hub.active(), 0);
        assert_eq!(hub.publish(&button("x")), 0);
    }

    #[tokio::test]
    async fn test_press_before_wait_starts_is_kept() {
        let hub = InteractionHub::new();
        let sub = hub.subscribe(with_prefix("confirm:"));
        assert_eq!(hub.publish(&button("confirm:t:yes")), 1);

        let handle = sub.wait(
            Duration::from_secs(5),
            |i: Interaction| async move { i.custom_id().map(str::to_string) },
            || async { None },
        );
        assert_eq!(handle.await.unwrap().as_deref(), Some("confirm:t:yes"));
        assert_eq!(hub.active(), 0);
    }

    #[tokio::test]
    async fn test_next_within_times_out() {
        let hub = InteractionHub::new();
        let mut sub = hub.subscribe(|_| true);
        assert!(sub.next_within(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_match_consumes_exactly_one() {
        let hub = InteractionHub::new();
        let timeouts = Arc::new(AtomicUsize::new(0));
        let t = timeouts.clone();

        let handle = hub.wait_for(
            with_prefix("tok:"),
            Duration::from_secs(5),
            |i| async move { i.custom_id().map(String::from) },
            move || async move {
                t.fetch_add(1, Ordering::SeqCst);
                None
            },
        );

        assert_eq!(hub.publish(&button("other")), 0);
        assert_eq!(hub.publish(&button("tok:first")), 1);
        let got = handle.await.unwrap();
        assert_eq!(got.as_deref(), Some("tok:first"));
        assert_eq!(timeouts.load(Ordering::SeqCst), 0);

        // Unsubscribed after the first match.
        assert_eq!(hub.publish(&button("tok:second")), 0);
        assert_eq!(hub.active(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_timeout_fires_only_timeout() {
        let hub = InteractionHub::new();
        let matches = Arc::new(AtomicUsize::new(0));
        let m = matches.clone();

        let handle = hub.wait_for(
            with_prefix("tok:"),
            Duration::from_millis(20),
            move |_| async move {
                m.fetch_add(1, Ordering::SeqCst);
                "matched"
            },
            || async { "expired" },
        );

        assert_eq!(handle.await.unwrap(), "expired");
        assert_eq!(matches.load(Ordering::SeqCst), 0);
        assert_eq!(hub.publish(&button("tok:late")), 0);
    }

    #[tokio::test]
    async fn test_concurrent_waits_are_isolated_by_predicate() {
        let hub = InteractionHub::new();
        let first = hub.wait_for(
            with_prefix("a:"),
            Duration::from_secs(5),
            |i| async move { i.custom_id().map(String::from) },
            || async { None },
        );
        let second = hub.wait_for(
            with_prefix("b:"),
            Duration::from_secs(5),
            |i| async move { i.custom_id().map(String::from) },
            || async { None },
        );

        hub.publish(&button("b:yes"));
        hub.publish(&button("a:no"));
        assert_eq!(first.await.unwrap().as_deref(), Some("a:no"));
        assert_eq!(second.await.unwrap().as_deref(), Some("b:yes"));
    }
}
