pub mod app;
pub mod controllers;
pub mod routers;

pub use app::app;
