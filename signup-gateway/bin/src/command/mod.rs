mod authorize;
mod schema;
mod server;

pub use self::{authorize::authorize_gmail, schema::print_schema, server::run_server};
