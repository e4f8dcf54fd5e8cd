use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Fail to introspect columns of schema `{schema}`, error: {source}"))]
    IntrospectColumns { schema: String, source: sqlx::Error },

    #[snafu(display("Fail to introspect functions of schema `{schema}`, error: {source}"))]
    IntrospectFunctions { schema: String, source: sqlx::Error },

    #[snafu(display("Malformed sign-up payload, error: {source}"))]
    MalformedPayload { source: serde_json::Error },

    #[snafu(display("No user found with id `{user_id}`"))]
    UserNotFound { user_id: String },

    #[snafu(display("Expected exactly one user with id `{user_id}`, found {count}"))]
    AmbiguousUser { user_id: String, count: usize },

    #[snafu(display("Fail to look up user `{user_id}`, error: {source}"))]
    FindUsers { user_id: String, source: sqlx::Error },

    #[snafu(display(
        "Fail to send activation email for user `{user_id}` after {attempts} attempt(s), error: \
         {source}"
    ))]
    SendActivationEmail { user_id: String, attempts: u32, source: notification::Error },

    #[snafu(display("Fail to connect notification listener, error: {source}"))]
    ConnectListener { source: sqlx::Error },

    #[snafu(display("Fail to listen on channel `{channel}`, error: {source}"))]
    ListenChannel { channel: String, source: sqlx::Error },
}

impl Error {
    /// Errors caused by the content of a notification rather than by the
    /// infrastructure.
    #[must_use]
    pub const fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. } | Self::UserNotFound { .. } | Self::AmbiguousUser { .. }
        )
    }

    /// Label used by the `dropped` counter.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::UserNotFound { .. } => "user_not_found",
            Self::AmbiguousUser { .. } => "ambiguous_user",
            Self::FindUsers { .. } => "lookup_failed",
            Self::SendActivationEmail { .. } => "send_failed",
            Self::IntrospectColumns { .. }
            | Self::IntrospectFunctions { .. }
            | Self::ConnectListener { .. }
            | Self::ListenChannel { .. } => "internal",
        }
    }
}
