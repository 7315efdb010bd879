use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unparsable selector `{input}`: {reason}")]
    Parse { input: String, reason: String },
}

impl SelectorError {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
