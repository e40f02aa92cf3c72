//! Goldrush job engine.
//!
//! Everything between the HTTP layer and the worker pool: the in-memory
//! stores, the bounded priority [`Dispatcher`], the [`AdmissionController`],
//! plan and subscription lookups, the job event bus, the reservation sweeper
//! and startup recovery.

pub mod admission;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod memory;
pub mod plans;
pub mod recovery;
pub mod stores;
pub mod subscription;
pub mod sweeper;

use std::sync::Arc;

pub use admission::AdmissionController;
pub use config::EngineConfig;
pub use dispatcher::Dispatcher;
pub use events::{JobEvent, JobEventBus};
pub use plans::PlanService;
pub use stores::Stores;
pub use subscription::{Subscription, SubscriptionService};
pub use sweeper::ReservationSweeper;

/// The engine services wired together over one set of stores.
#[derive(Clone)]
pub struct Engine {
    pub stores: Stores,
    pub plans: Arc<PlanService>,
    pub dispatcher: Arc<Dispatcher>,
    pub events: Arc<JobEventBus>,
    pub admission: Arc<AdmissionController>,
    pub subscriptions: Arc<SubscriptionService>,
}

impl Engine {
    pub fn new(stores: Stores, plans: PlanService, config: &EngineConfig) -> Self {
        let plans = Arc::new(plans);
        let dispatcher = Arc::new(Dispatcher::new(config.queue_capacity));
        let events = Arc::new(JobEventBus::default());
        let admission = Arc::new(AdmissionController::new(
            stores.clone(),
            Arc::clone(&plans),
            Arc::clone(&dispatcher),
            Arc::clone(&events),
            config.reservation_hold(),
        ));
        let subscriptions = Arc::new(SubscriptionService::new(
            stores.clone(),
            Arc::clone(&dispatcher),
        ));

        Self {
            stores,
            plans,
            dispatcher,
            events,
            admission,
            subscriptions,
        }
    }

    /// Sweeper over this engine's ledger.
    pub fn sweeper(&self, config: &EngineConfig) -> ReservationSweeper {
        ReservationSweeper::new(Arc::clone(&self.stores.ledger), config.sweep_interval)
    }
}
