pub mod config;
pub mod controller;
pub mod io;
pub mod notify;
pub mod permission;
pub mod power;
pub mod runtime;
pub mod state;
pub mod store;
pub mod types;
