pub mod config;
pub mod env;
pub mod geo;
pub mod logging;
pub mod reveal;
pub mod session;
pub mod tape;
pub mod visit;
