// Collaborator HTTP endpoints
pub mod client;

pub use client::ApiClient;
