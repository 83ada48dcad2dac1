//! Email delivery and the password reset message.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use minijinja::{Environment, Value, context};

use crate::{
    config::{EmailConfig, EmailTransportConfig},
    errors::Error,
    notifications::{EmailRequest, NotificationSender},
};

pub const PASSWORD_RESET_SUBJECT: &str = "Password Reset Request";

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(email_config: &EmailConfig) -> Result<Self, Error> {
        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.expose().to_string()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
        })
    }

    fn build_message(&self, email: &EmailRequest) -> Result<Message, Error> {
        // Display names go in unparsed, so commas and angle brackets in them are fine
        let from_address = self.from_email.parse::<Address>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;
        let from = Mailbox::new(Some(self.from_name.clone()), from_address);

        let to_address = email.to.parse::<Address>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;
        let to = Mailbox::new(email.to_name.clone(), to_address);

        Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                email.html_body.clone(),
            ))
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })
    }
}

#[async_trait]
impl NotificationSender for EmailService {
    async fn send(&self, email: &EmailRequest) -> Result<(), Error> {
        let message = self.build_message(email)?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

const PASSWORD_RESET_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Password Reset Request</title>
    <style>
        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .container { max-width: 600px; margin: 0 auto; padding: 20px; }
        .footer { margin-top: 30px; font-size: 12px; color: #666; }
    </style>
</head>
<body>
    <div class="container">
        <h2>Password Reset Request</h2>

        <p>Hello {{ name }},</p>

        <p>We received a request to reset your password. If you didn't make this request, you can safely ignore this email.</p>

        <p><a href="{{ reset_link }}">Reset your password</a></p>

        <p>Or copy and paste this link into your browser:</p>
        <p>{{ reset_link }}</p>

        <p>This link will expire in {{ minutes }} minutes.</p>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#;

const PASSWORD_RESET_TEXT: &str = "Hello {{ name }},

We received a request to reset your password. If you didn't make this request, you can safely ignore this email.

Reset your password: {{ reset_link }}

This link will expire in {{ minutes }} minutes.
";

fn render_error(e: minijinja::Error) -> Error {
    Error::Internal {
        operation: format!("render password reset email: {e}"),
    }
}

/// Render the password reset email for an account holder.
///
/// The `.html` template auto-escapes, so account names cannot inject markup. The link is built by
/// the service from the configured frontend base and an opaque token, and is inserted as is.
pub fn password_reset_email(to: &str, name: &str, reset_link: &str, valid_for: Duration) -> Result<EmailRequest, Error> {
    let minutes = (valid_for.as_secs() / 60).max(1);

    let mut env = Environment::new();
    env.add_template("password_reset.html", PASSWORD_RESET_HTML)
        .map_err(render_error)?;
    env.add_template("password_reset.txt", PASSWORD_RESET_TEXT)
        .map_err(render_error)?;

    let ctx = context! {
        name => name,
        reset_link => Value::from_safe_string(reset_link.to_string()),
        minutes => minutes,
    };
    let html_body = env
        .get_template("password_reset.html")
        .and_then(|t| t.render(&ctx))
        .map_err(render_error)?;
    let text_body = env
        .get_template("password_reset.txt")
        .and_then(|t| t.render(&ctx))
        .map_err(render_error)?;

    Ok(EmailRequest {
        to: to.to_string(),
        to_name: Some(name.to_string()),
        subject: PASSWORD_RESET_SUBJECT.to_string(),
        html_body,
        text_body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config(dir: &Path) -> EmailConfig {
        EmailConfig {
            transport: EmailTransportConfig::File {
                path: dir.to_string_lossy().into_owned(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_password_reset_email_content() {
        let email = password_reset_email(
            "ada@example.com",
            "Ada",
            "https://app.example.com/reset-password?token=abc123",
            Duration::from_secs(15 * 60),
        )
        .unwrap();

        assert_eq!(email.subject, "Password Reset Request");
        assert_eq!(email.to_name.as_deref(), Some("Ada"));
        for body in [&email.html_body, &email.text_body] {
            assert!(body.contains("Hello Ada,"));
            assert!(body.contains("https://app.example.com/reset-password?token=abc123"));
            assert!(body.contains("15 minutes"));
        }
    }

    #[tokio::test]
    async fn test_file_transport_writes_multipart_message() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        let email =
            password_reset_email("ada@example.com", "Ada", "https://x/reset-password?token=t", Duration::from_secs(900)).unwrap();
        service.send(&email).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(files.len(), 1);
        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains("Subject: Password Reset Request"));
        assert!(contents.contains("multipart/alternative"));
        assert!(contents.contains("ada@example.com"));
    }

    #[tokio::test]
    async fn test_file_transport_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("outbox").join("dev");
        EmailService::new(&file_config(&nested)).unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        let mut email = password_reset_email("not an address", "Ada", "https://x", Duration::from_secs(900)).unwrap();
        email.to_name = None;
        assert!(matches!(service.send(&email).await, Err(Error::Internal { .. })));
    }

    #[tokio::test]
    async fn test_recipient_name_with_comma_is_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        let email = password_reset_email(
            "ada@example.com",
            "Lovelace, Ada",
            "https://x/reset-password?token=t",
            Duration::from_secs(900),
        )
        .unwrap();
        service.send(&email).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains("Lovelace, Ada"), "{contents}");
        assert!(contents.contains("<ada@example.com>"), "{contents}");
    }

    #[test]
    fn test_name_markup_is_escaped_in_html_body() {
        let name = r#"<a href="https://evil">click</a>"#;
        let email = password_reset_email(
            "ada@example.com",
            name,
            "https://app.example.com/reset-password?token=abc123",
            Duration::from_secs(900),
        )
        .unwrap();

        assert!(!email.html_body.contains(name));
        assert!(email.html_body.contains("Hello &lt;a href="));
        assert!(
            email
                .html_body
                .contains(r#"<a href="https://app.example.com/reset-password?token=abc123">"#)
        );
        // Plain text is never interpreted as markup
        assert!(email.text_body.contains(&format!("Hello {name},")));
    }
}
