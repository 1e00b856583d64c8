//! SMTP delivery of reset codes.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use pharma_services::{CodeNotifier, NotifyError};

use crate::config::SmtpSettings;

const SUBJECT: &str = "Your password reset code";

/// Sends each code as a plain-text e-mail over STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    ttl_minutes: i64,
}

impl SmtpNotifier {
    /// Builds the transport. Does not connect.
    pub fn new(settings: &SmtpSettings, ttl_minutes: i64) -> Result<Self, NotifyError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| NotifyError::Configuration(format!("Invalid from address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| NotifyError::Configuration(format!("Failed to create SMTP relay: {}", e)))?
            .port(settings.port);

        if let (Some(user), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(SmtpNotifier {
            transport: builder.build(),
            from,
            ttl_minutes,
        })
    }

    fn message(&self, email: &str, code: &str) -> Result<Message, NotifyError> {
        let to: Mailbox = email
            .parse()
            .map_err(|e| NotifyError::InvalidRecipient(format!("{}: {}", email, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(render_body(code, self.ttl_minutes))
            .map_err(|e| NotifyError::SendFailed(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl CodeNotifier for SmtpNotifier {
    async fn deliver(&self, email: &str, code: &str) -> Result<(), NotifyError> {
        let message = self.message(email, code)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::SendFailed(format!("Failed to send email: {}", e)))?;

        info!(to = %email, "Reset code e-mail sent");
        Ok(())
    }
}

fn render_body(code: &str, ttl_minutes: i64) -> String {
    format!(
        "Your password reset code is {code}.\n\n\
         It expires in {ttl_minutes} minutes and can be used once.\n\
         If you did not ask to reset your password, ignore this message.\n"
    )
}
