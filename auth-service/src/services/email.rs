use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::time::Duration;

use crate::services::ServiceError;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_otp_email(&self, to_email: &str, code: &str) -> Result<(), ServiceError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
    ) -> Result<(), ServiceError>;

    async fn send_welcome_email(
        &self,
        to_email: &str,
        display_name: Option<&str>,
    ) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpEmailService {
    pub fn new(config: &crate::config::SmtpConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(self.from_email.parse().map_err(
                |e: lettre::address::AddressError| ServiceError::Internal(e.into()),
            )?)
            .to(to_email.parse().map_err(
                |e: lettre::address::AddressError| {
                    ServiceError::EmailSendFailed(format!("invalid recipient: {}", e))
                },
            )?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::Internal(e.into()))?;

        // Send in the blocking thread pool; the SMTP transport is sync.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(ServiceError::EmailSendFailed(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_otp_email(&self, to_email: &str, code: &str) -> Result<(), ServiceError> {
        let html_body = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
                <h2>Your verification code</h2>
                <p style="font-size: 24px; letter-spacing: 4px;"><strong>{code}</strong></p>
                <p style="color: #666; font-size: 12px;">
                    The code expires shortly. If you didn't request it, you can ignore this email.
                </p>
            </body></html>"#
        );
        let plain_body = format!(
            "Your verification code is {code}. It expires shortly. \
             If you didn't request it, you can ignore this email."
        );

        self.send_email(to_email, "Your verification code", &plain_body, &html_body)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
    ) -> Result<(), ServiceError> {
        let html_body = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
                <h2>Reset your password</h2>
                <p>Use the code below to reset your password:</p>
                <p style="font-size: 18px;"><strong>{reset_token}</strong></p>
                <p style="color: #666; font-size: 12px;">
                    The code is single-use and expires shortly. If you didn't request a reset,
                    your password is unchanged and no action is needed.
                </p>
            </body></html>"#
        );
        let plain_body = format!(
            "Use this code to reset your password: {reset_token}\n\
             It is single-use and expires shortly. If you didn't request a reset, \
             your password is unchanged."
        );

        self.send_email(to_email, "Reset your password", &plain_body, &html_body)
            .await
    }

    async fn send_welcome_email(
        &self,
        to_email: &str,
        display_name: Option<&str>,
    ) -> Result<(), ServiceError> {
        let greeting = display_name.unwrap_or("there");
        let html_body = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
                <h2>Welcome, {greeting}!</h2>
                <p>Your marketplace account is ready. You can start browsing listings right away.</p>
            </body></html>"#
        );
        let plain_body = format!(
            "Welcome, {greeting}! Your marketplace account is ready."
        );

        self.send_email(to_email, "Welcome to the marketplace", &plain_body, &html_body)
            .await
    }
}
