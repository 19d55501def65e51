//! Career profile: model, storage service, and REST route.

pub mod model;
pub mod routes;
pub mod service;

pub use model::{CareerTrack, CompanySize, Industry, Profile, Region};
pub use service::ProfileService;
