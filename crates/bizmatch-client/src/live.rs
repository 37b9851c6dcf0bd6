//! Lists kept fresh in the background.
//!
//! A [`LiveList`] fetches once, then re-fetches the whole list whenever the
//! backend pushes a matching change, the refresh interval elapses, or
//! [`LiveList::refresh`] is called. Dropping it stops the task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::backend::{ChangeEvent, Subscription};
use crate::error::Result;
use crate::scope::TaskScope;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

pub struct LiveList<T> {
    rx: watch::Receiver<ListState<T>>,
    refresh: Arc<Notify>,
    _scope: TaskScope,
}

impl<T> LiveList<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn spawn<F, Fut>(
        name: &'static str,
        subscription: Option<Subscription>,
        interval: Option<Duration>,
        fetch: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(ListState::default());
        let refresh = Arc::new(Notify::new());
        let scope = TaskScope::new();

        let trigger = Arc::clone(&refresh);
        scope.spawn(async move {
            let mut subscription = subscription;
            let mut ticker = interval.map(|period| {
                let mut t = interval_at(Instant::now() + period, period);
                t.set_missed_tick_behavior(MissedTickBehavior::Delay);
                t
            });

            loop {
                tx.send_modify(|s| s.loading = true);
                match fetch().await {
                    Ok(items) => {
                        debug!(list = name, count = items.len(), "Live list refreshed");
                        tx.send_replace(ListState {
                            items,
                            loading: false,
                            error: None,
                        });
                    }
                    Err(e) => {
                        warn!(list = name, error = %e, "Live list fetch failed");
                        tx.send_modify(|s| {
                            s.loading = false;
                            s.error = Some(e.to_string());
                        });
                    }
                }

                tokio::select! {
                    change = next_change(&mut subscription) => {
                        if change.is_none() {
                            debug!(list = name, "Change feed closed");
                            subscription = None;
                        }
                    }
                    _ = next_tick(&mut ticker) => {}
                    _ = trigger.notified() => {}
                    _ = tx.closed() => break,
                }
            }
        });

        Self {
            rx,
            refresh,
            _scope: scope,
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ListState<T> {
        self.rx.borrow().clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.rx.borrow().items.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<T>> {
        self.rx.clone()
    }

    /// Ask for an immediate re-fetch.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Wait until the state satisfies `predicate`, returning a snapshot.
    pub async fn wait_for(&self, predicate: impl FnMut(&ListState<T>) -> bool) -> ListState<T> {
        let mut rx = self.rx.clone();
        let snapshot = match rx.wait_for(predicate).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        snapshot
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}
