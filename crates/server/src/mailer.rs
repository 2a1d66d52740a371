//! Outgoing e-mail.
//!
//! Workflows build an [`OutgoingEmail`] and hand it to whichever [`Mailer`] the
//! application was started with: SMTP in production, the log otherwise.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address '{address}': {reason}")]
    Address { address: String, reason: String },
    #[error("Failed to build message: {0}")]
    Build(String),
    #[error("Failed to render template: {0}")]
    Template(String),
    #[error("SMTP transport error: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Sends mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from: parse_mailbox(&config.from)?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[tracing::instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let builder = lettre::Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject)
            .header(lettre::message::header::MIME_VERSION_1_0);

        let message = match email.html_body {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            ),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.text_body),
        }
        .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        tracing::info!("E-mail sent");
        Ok(())
    }
}

/// Writes mail to the log instead of sending it. Used when no SMTP relay is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        parse_mailbox(&email.to)?;
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.text_body,
            "SMTP not configured, e-mail logged instead of sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.into(),
            subject: "Hello".into(),
            text_body: "Body".into(),
            html_body: None,
        }
    }

    #[tokio::test]
    async fn log_mailer_accepts_valid_addresses() {
        assert!(LogMailer.send(email("someone@example.org")).await.is_ok());
    }

    #[tokio::test]
    async fn log_mailer_rejects_invalid_addresses() {
        let err = LogMailer.send(email("not-an-address")).await.unwrap_err();
        assert!(matches!(err, MailError::Address { .. }));
    }
}
