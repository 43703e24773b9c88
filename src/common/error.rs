use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Tokenizer Error: {0}")]
    Tokenize(String),

    #[error("Malformed statement: {0}")]
    MalformedStatement(String),

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Statement nested deeper than {0} levels")]
    TooDeeplyNested(usize),

    #[error("Serialization Error: {0}")]
    Serialize(String),

    /// Reserved. Bare columns are left ambiguous in the alias table and the
    /// executor resolves them against table context.
    #[error("Ambiguous reference: {0}")]
    AmbiguousReference(String),
}
