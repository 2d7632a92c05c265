pub mod client;
pub mod credential;
pub mod models;
pub mod poller;
pub mod resources;
