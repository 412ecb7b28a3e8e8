use std::error::Error;

pub mod client;
pub mod config;
pub mod database;
pub mod identity;
pub mod memory;
pub mod server;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("the requested item does not exist")]
    NotFound,
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
}

impl RequestError {
    pub fn other<T: Error + Send + Sync + 'static>(why: T) -> Self {
        Self::Other(Box::new(why))
    }
}

impl From<database::DatabaseError> for RequestError {
    fn from(value: database::DatabaseError) -> Self {
        match value {
            database::DatabaseError::NotFound => Self::NotFound,
            database::DatabaseError::Other(why) => Self::Other(why),
        }
    }
}

pub type RequestResult<O> = Result<O, RequestError>;
