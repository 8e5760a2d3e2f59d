use polars::prelude::PolarsError;
use thiserror::Error;

use crate::readiness::NotReadyError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    NotReady(#[from] NotReadyError),

    #[error("collection `{collection}` holds no documents")]
    EmptyCollection { collection: String },

    #[error("percentage denominator `{0}` is zero")]
    ZeroDenominator(&'static str),

    #[error(transparent)]
    Query(#[from] mongodb::error::Error),

    #[error(transparent)]
    Frame(#[from] PolarsError),
}
