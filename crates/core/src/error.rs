use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
}
