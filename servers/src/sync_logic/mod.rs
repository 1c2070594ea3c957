pub mod config;
pub mod frontdoor;
pub mod logger;
pub mod state;
