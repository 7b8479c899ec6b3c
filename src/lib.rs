pub mod collector;
pub mod config;
pub mod energy;
pub mod exposition;
pub mod health;
pub mod logging;
pub mod parser;
pub mod registry;
