use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid user id: {input}")]
    InvalidUserId { input: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn invalid_user_id(input: impl Into<String>) -> Self {
        Self::InvalidUserId {
            input: input.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
