//! Activation emails for the rows announced on the sign-up channel.

mod directory;
mod dispatcher;
mod listener;
mod payload;
mod retry;

pub use self::{
    directory::{PgUserDirectory, UserDirectory, UserRecord},
    dispatcher::{Delivery, Dispatch, SignUpDispatcher},
    listener::SignUpListener,
    payload::SignUp,
    retry::RetryPolicy,
};
