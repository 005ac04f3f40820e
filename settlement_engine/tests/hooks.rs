mod common;

use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use common::*;
use futures_util::FutureExt;
use log::*;
use settlement_common::Money;
use settlement_engine::{
    db_types::MembershipTier,
    events::{EventHandlers, EventHooks, SettlementFailedEvent},
};

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

/// Gives the handler tasks a chance to drain their queues.
async fn settle_down() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn on_settlement_completed() {
    let event = HookCalled::default();
    let event_copy = event.clone();
    let mut hooks = EventHooks::default();
    hooks.on_settlement_completed(move |ev| {
        info!("🪝️ {:?}", ev.outcome);
        event_copy.called();
        async {}.boxed()
    });
    let handlers = EventHandlers::new(16, hooks);
    let (env, api) = setup_with_producers(handlers.producers()).await;
    handlers.start_handlers().await;

    seed_product(&env.db, "p1", "V1", 5).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 1)).await;
    seed_order(&env.db, simple_order("O2", "p1", "V1", 1)).await;
    api.settle(paid("O1", units(100))).await.unwrap();
    api.settle(paid("O2", units(100))).await.unwrap();
    // Duplicates do not fire the hook
    let _ = api.settle(paid("O2", units(100))).await;
    settle_down().await;
    assert_eq!(event.count(), 2);
}

#[tokio::test]
async fn on_settlement_failed() {
    let failures = Arc::new(Mutex::new(Vec::<SettlementFailedEvent>::new()));
    let failures_copy = Arc::clone(&failures);
    let mut hooks = EventHooks::default();
    hooks.on_settlement_failed(move |ev| {
        let failures = Arc::clone(&failures_copy);
        async move {
            if let Ok(mut f) = failures.lock() {
                f.push(ev);
            }
        }
        .boxed()
    });
    let handlers = EventHandlers::new(16, hooks);
    let (env, api) = setup_with_producers(handlers.producers()).await;
    handlers.start_handlers().await;

    seed_product(&env.db, "p1", "V1", 1).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 2)).await;
    let _ = api.settle(paid("O1", units(200))).await;
    settle_down().await;

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, "insufficient_stock");
    assert!(failures[0].canceled);
}

#[tokio::test]
async fn on_tier_promoted() {
    let event = HookCalled::default();
    let event_copy = event.clone();
    let mut hooks = EventHooks::default();
    hooks.on_tier_promoted(move |ev| {
        info!("🪝️ {} promoted to {}", ev.change.user_id, ev.change.to);
        assert_eq!(ev.change.to, MembershipTier::Gold);
        event_copy.called();
        async {}.boxed()
    });
    let handlers = EventHandlers::new(16, hooks);
    let (env, api) = setup_with_producers(handlers.producers()).await;
    handlers.start_handlers().await;

    seed_product(&env.db, "p1", "V1", 5).await;
    seed_user(&env.db, "alice", units(9_950), MembershipTier::Silver).await;
    seed_user(&env.db, "bob", Money::zero(), MembershipTier::Silver).await;
    seed_order(&env.db, simple_order("O1", "p1", "V1", 1).for_user("alice")).await;
    seed_order(&env.db, simple_order("O2", "p1", "V1", 1).for_user("bob")).await;
    api.settle(paid("O1", units(100))).await.unwrap();
    api.settle(paid("O2", units(100))).await.unwrap();
    settle_down().await;
    assert_eq!(event.count(), 1);
}
