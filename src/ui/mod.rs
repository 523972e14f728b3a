pub mod app;
pub mod render;
pub mod state;

pub use app::ShellApp;
