// Known OpenAI model identifiers
// Author: kelexine (https://github.com/kelexine)

use serde::{Deserialize, Serialize};

/// Which endpoint a model is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    Completion,
    Embedding,
}

pub const COMPLETION_MODELS: &[&str] = &[
    "text-ada-001",
    "text-babbage-001",
    "text-curie-001",
    "text-davinci-001",
];

pub const EMBEDDING_MODELS: &[&str] = &[
    "text-embedding-ada-002",
    "text-embedding-babbage-001",
    "text-embedding-curie-001",
    "text-embedding-davinci-001",
];

/// Look up the family of a model, `None` if the model is not served by this proxy.
pub fn model_family(model: &str) -> Option<ModelFamily> {
    if COMPLETION_MODELS.contains(&model) {
        Some(ModelFamily::Completion)
    } else if EMBEDDING_MODELS.contains(&model) {
        Some(ModelFamily::Embedding)
    } else {
        None
    }
}

pub fn is_completion_model(model: &str) -> bool {
    model_family(model) == Some(ModelFamily::Completion)
}

pub fn is_embedding_model(model: &str) -> bool {
    model_family(model) == Some(ModelFamily::Embedding)
}
