use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unknown column '{column}' on {entity}")]
    InvalidColumn { entity: &'static str, column: String },

    #[error("Unknown relation '{relation}' on {entity}")]
    UnknownRelation { entity: &'static str, relation: String },

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid value for '{column}': {message}")]
    InvalidValue { column: String, message: String },

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
