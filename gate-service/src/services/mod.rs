pub mod approval;
pub mod database;
pub mod gate;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod routes;
pub mod session;
pub mod store;
