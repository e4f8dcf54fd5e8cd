//! RFC 5322 message composition.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use lettre::{
    message::{header::ContentType, Mailbox},
    Message,
};
use snafu::ResultExt;

use crate::{error, Error};

/// Builds a plain-text UTF-8 message.
///
/// The transfer encoding is `7bit` whenever the body allows it and the
/// narrowest safe encoding otherwise.
///
/// # Errors
///
/// Returns an error if either address is not a valid mailbox.
pub fn build_message(to: &str, from: &str, subject: &str, body: &str) -> Result<Message, Error> {
    Message::builder()
        .from(parse_mailbox(from)?)
        .to(parse_mailbox(to)?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .context(error::BuildEmailSnafu)
}

/// Builds a message and encodes it with URL-safe base64, the form the Gmail
/// `raw` field expects.
///
/// # Errors
///
/// Returns an error if either address is not a valid mailbox.
pub fn encode_message(to: &str, from: &str, subject: &str, body: &str) -> Result<String, Error> {
    build_message(to, from, subject, body).map(|message| URL_SAFE.encode(message.formatted()))
}

/// Subject and body of the account activation email.
#[must_use]
pub fn activation_email(
    first_name: &str,
    last_name: &str,
    activation_code: &str,
) -> (String, String) {
    let subject = format!("Welcome {first_name} {last_name}, activate your account");
    let body = format!(
        "Hi {first_name} {last_name},\n\nThanks for signing up. Your activation code \
         is:\n\n    {activation_code}\n\nEnter it on the activation page to finish setting up \
         your account.\n"
    );
    (subject, body)
}

fn parse_mailbox(address: &str) -> Result<Mailbox, Error> {
    address.parse().context(error::InvalidAddressSnafu { address })
}
