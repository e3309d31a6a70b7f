pub mod db_error;

pub use db_error::DbError;

pub type DbResult<T> = Result<T, DbError>;
