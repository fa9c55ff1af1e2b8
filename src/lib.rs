// cachegate - Caching and cost-accounting proxy for the OpenAI API
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod openai;
pub mod server;
pub mod utils;
