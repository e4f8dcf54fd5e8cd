use serde::{Deserialize, Deserializer};
use snafu::ResultExt;

use crate::service::error::{self, Result};

/// Payload of one `NOTIFY sign_ups` call.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SignUp {
    #[serde(deserialize_with = "text_or_number")]
    pub user_id: String,

    pub email: String,

    #[serde(deserialize_with = "text_or_number")]
    pub activation_code: String,
}

impl SignUp {
    /// # Errors
    ///
    /// Returns an error if `payload` is not a JSON object with the expected
    /// fields.
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).context(error::MalformedPayloadSnafu)
    }
}

fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Text(text) => text,
        TextOrNumber::Number(number) => number.to_string(),
    })
}
