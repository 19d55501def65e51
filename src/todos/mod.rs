//! Todo list: model and REST routes.

pub mod model;
pub mod routes;

pub use model::{CreateTodo, Todo};
