// Per-model token pricing
// Author: kelexine (https://github.com/kelexine)

use crate::error::{ProxyError, Result};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Lazily initialized rate table, USD per 1000 tokens.
static RATE_TABLE: OnceLock<HashMap<&'static str, f64>> = OnceLock::new();

fn get_rate_table() -> &'static HashMap<&'static str, f64> {
    RATE_TABLE.get_or_init(|| {
        let mut m = HashMap::new();

        m.insert("text-embedding-ada-002", 0.0004);
        m.insert("text-ada-001", 0.0004);
        m.insert("text-embedding-babbage-001", 0.0005);
        m.insert("text-babbage-001", 0.0005);
        m.insert("text-embedding-curie-001", 0.002);
        m.insert("text-curie-001", 0.002);
        m.insert("text-embedding-davinci-001", 0.02);
        m.insert("text-davinci-001", 0.02);

        m
    })
}

/// Rate for `model` in USD per 1000 tokens.
pub fn rate_per_1k(model: &str) -> Result<f64> {
    get_rate_table()
        .get(model)
        .copied()
        .ok_or_else(|| ProxyError::UnknownModel(model.to_string()))
}

/// Cost of `tokens` tokens on `model`, billed in whole blocks of 1000 tokens.
pub fn cost(model: &str, tokens: u64) -> Result<f64> {
    let rate = rate_per_1k(model)?;
    Ok(rate * tokens.div_ceil(1000) as f64)
}
