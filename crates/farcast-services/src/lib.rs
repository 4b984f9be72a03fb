//! farcast-services — the routing and store-and-forward engine and the
//! collaborators it drives: geometry, link tables, bundle queues,
//! transmission simulation and delivery.

pub mod bundle_store;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod link_table;
pub mod scheduler;
pub mod transmission;

pub use bundle_store::BundleStore;
pub use delivery::{DeliveredBundle, DeliveryLog, DeliverySink, DEFAULT_DELIVERY_CAPACITY};
pub use engine::{now_ms, Engine, EngineHandle, EngineStats, NetworkStatus, TickReport};
pub use error::EngineError;
pub use geometry::{
    Body, BodyOcclusion, ConfiguredGeometry, GeometryError, GeometryProvider, Occlusion,
    ScriptedVisibility, Unobstructed,
};
pub use link_table::{LinkSnapshot, LinkTableBuilder, RoutingTable};
pub use scheduler::Scheduler;
pub use transmission::{LossySimulator, ScriptedSimulator, TransmissionSimulator};
