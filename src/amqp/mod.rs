//! AMQP transport layer
//!
//! Inbound facts arrive on two queue subscriptions (matchmaking facts and
//! the wildcard game-events topic); each subscription feeds one dedicated
//! worker which invokes the dispatcher sequentially, so per-instance game
//! mutation needs no per-game lock. Outbound events go through the
//! `EventPublisher` trait.

pub mod connection;
pub mod consumer;
pub mod messages;
pub mod publisher;

pub use connection::{AmqpConfig, AmqpConnection};
pub use consumer::{spawn_fact_worker, FactConsumer};
pub use publisher::{AmqpEventPublisher, EventPublisher, MockEventPublisher};
