//! Port trait definitions for the relay subsystem.

pub mod broker;

pub use broker::{
    Acknowledger, Broker, BrokerError, BrokerResult, Delivery, DeliveryStream, ExchangeKind,
};
