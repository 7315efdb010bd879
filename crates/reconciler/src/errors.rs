use thiserror::Error;

use dom_page::DomError;
use sourcecount_annotator::AnnotateError;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
    #[error(transparent)]
    Dom(#[from] DomError),
}
