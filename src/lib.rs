pub mod batch;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod locator;
pub mod logging;
pub mod materializer;
pub mod reconciler;
pub mod resolver;
pub mod resources;
