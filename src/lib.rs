pub mod api;
pub mod cli;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod paths;
pub mod persist;
pub mod routes;
pub mod state;
pub mod workbench;
