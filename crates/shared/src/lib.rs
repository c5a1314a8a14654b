//! Domain model, persistence, and command/query handlers shared by the
//! API server and worker binaries.

pub mod commands;
pub mod config;
pub mod config_env;
pub mod domain;
pub mod event_dispatch;
pub mod gateways;
pub mod ids;
pub mod llm;
pub mod pubsub;
pub mod queries;
pub mod reactive;
pub mod repos;
pub mod timezone;
pub mod uow;
