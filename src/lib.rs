//! Humblebrag API: career-onboarding and weather agents over HTTP.

pub mod agent;
pub mod auth;
pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod logging;
pub mod profile;
pub mod rpc;
pub mod server;
pub mod store;
pub mod todos;
pub mod tools;
