pub mod aggregate;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod runner;
pub mod sitemap;
pub mod store;
pub mod util;
pub mod work;
