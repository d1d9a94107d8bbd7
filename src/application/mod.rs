//! Process wiring: settings in, running HTTP server out

pub mod app;

pub use app::Application;
