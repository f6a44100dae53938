pub mod clock;
pub mod config;
pub mod engine;
pub mod http;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod planner;
pub mod requests;
pub mod source;
pub mod store;
