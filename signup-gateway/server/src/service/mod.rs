pub mod error;
pub mod sign_up;
mod sql_executor;

pub use self::{
    error::{Error, Result},
    sql_executor::{CatalogSqlExecutor, UserSqlExecutor},
};
