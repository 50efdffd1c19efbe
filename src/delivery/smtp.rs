//! SMTP client for the Email Worker, built once from `SmtpConfig`.

use lettre::message::{header::ContentType, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::AppError;

pub struct SmtpClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpClient {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let mut builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AppError::Internal(format!("invalid SMTP relay host: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder
            .port(config.port)
            .timeout(Some(std::time::Duration::from_secs(config.timeout_seconds)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }

    /// Sends the rendered email, returning the provider message-id recorded
    /// by the worker on the tracking record.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<String, AppError> {
        let message = Message::builder()
            .from(self.from_address.parse().map_err(|e: lettre::address::AddressError| {
                AppError::Internal(format!("invalid from-address: {e}"))
            })?)
            .to(to.parse().map_err(|e: lettre::address::AddressError| {
                AppError::Validation(format!("invalid recipient address: {e}"))
            })?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text.to_string()))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html.to_string())),
            )?;

        let response = self.transport.send(message).await?;
        Ok(response.message().collect::<Vec<_>>().join(" "))
    }
}
