mod catalog;
mod user;

pub use self::{catalog::CatalogSqlExecutor, user::UserSqlExecutor};
