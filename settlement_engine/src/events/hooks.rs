use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    SettlementCompletedEvent,
    SettlementFailedEvent,
    TierPromotedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub settlement_completed_producer: Vec<EventProducer<SettlementCompletedEvent>>,
    pub settlement_failed_producer: Vec<EventProducer<SettlementFailedEvent>>,
    pub tier_promoted_producer: Vec<EventProducer<TierPromotedEvent>>,
}

pub struct EventHandlers {
    pub on_settlement_completed: Option<EventHandler<SettlementCompletedEvent>>,
    pub on_settlement_failed: Option<EventHandler<SettlementFailedEvent>>,
    pub on_tier_promoted: Option<EventHandler<TierPromotedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_settlement_completed = hooks.on_settlement_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_settlement_failed = hooks.on_settlement_failed.map(|f| EventHandler::new(buffer_size, f));
        let on_tier_promoted = hooks.on_tier_promoted.map(|f| EventHandler::new(buffer_size, f));
        Self { on_settlement_completed, on_settlement_failed, on_tier_promoted }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_settlement_completed {
            result.settlement_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_settlement_failed {
            result.settlement_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_tier_promoted {
            result.tier_promoted_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_settlement_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_settlement_failed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_tier_promoted {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

type BoxedHandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_settlement_completed: Option<Handler<SettlementCompletedEvent>>,
    pub on_settlement_failed: Option<Handler<SettlementFailedEvent>>,
    pub on_tier_promoted: Option<Handler<TierPromotedEvent>>,
}

impl EventHooks {
    pub fn on_settlement_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SettlementCompletedEvent) -> BoxedHandlerFuture) + Send + Sync + 'static {
        self.on_settlement_completed = Some(Arc::new(f));
        self
    }

    pub fn on_settlement_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SettlementFailedEvent) -> BoxedHandlerFuture) + Send + Sync + 'static {
        self.on_settlement_failed = Some(Arc::new(f));
        self
    }

    pub fn on_tier_promoted<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(TierPromotedEvent) -> BoxedHandlerFuture) + Send + Sync + 'static {
        self.on_tier_promoted = Some(Arc::new(f));
        self
    }
}
