use thiserror::Error;

use dom_page::DomError;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error(transparent)]
    Dom(#[from] DomError),
}
