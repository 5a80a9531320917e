use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrimitivesError {
    #[error("Invalid signature: {0}")]
    SignatureError(String),
}

pub type Result<T> = core::result::Result<T, PrimitivesError>;
