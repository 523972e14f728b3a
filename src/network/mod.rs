pub mod api;
pub mod rest;
pub mod wire;

pub use api::ApiClient;
pub use rest::RestClient;
