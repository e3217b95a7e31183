//! Transactional email
//!
//! `EmailService` renders the hub's messages from tera templates and hands
//! them to a `Mailer`. Three transports exist:
//! - `LogMailer`: writes messages to the log (development default)
//! - `SmtpMailer`: lettre over SMTP
//! - `MailgunMailer`: the Mailgun HTTP API
//!
//! `MemoryMailer` keeps messages in memory for tests.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::MultiPart, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tera::{Context as TeraContext, Tera};

use crate::config::{EmailConfig, EmailDriver, MailgunConfig, SmtpConfig};

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivery transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Shared mailer handle
pub type DynMailer = Arc<dyn Mailer>;

/// Logs messages instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email (log driver):\n{}",
            message.text
        );
        Ok(())
    }
}

/// SMTP delivery via lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: String) -> Result<Self> {
        if config.host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }

        // Port 465 speaks TLS from the start; anything else upgrades with STARTTLS
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?;

        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(message.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Delivery through the Mailgun messages API
pub struct MailgunMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl MailgunMailer {
    pub fn new(config: &MailgunConfig, from: String) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!("MAILGUN_API_KEY is not configured"));
        }
        if config.domain.is_empty() {
            return Err(anyhow!("MAILGUN_DOMAIN is not configured"));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v3/{}/messages",
                config.api_base.trim_end_matches('/'),
                config.domain
            ),
            api_key: config.api_key.clone(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.from.as_str()),
                ("to", message.to.as_str()),
                ("subject", message.subject.as_str()),
                ("html", message.html.as_str()),
                ("text", message.text.as_str()),
            ])
            .send()
            .await
            .context("Mailgun request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Mailgun rejected message ({}): {}", status, body));
        }

        tracing::debug!("Email sent via Mailgun to {}", message.to);
        Ok(())
    }
}

/// Keeps every message in memory; optionally fails every delivery
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose deliveries all fail
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.fail {
            return Err(anyhow!("delivery disabled"));
        }
        self.sent
            .lock()
            .map_err(|_| anyhow!("mailer state poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

/// Build the transport selected in configuration
pub fn create_mailer(config: &EmailConfig) -> Result<DynMailer> {
    let from = format!("{} <{}>", config.from_name, config.from_address);
    let mailer: DynMailer = match config.driver {
        EmailDriver::Log => Arc::new(LogMailer),
        EmailDriver::Smtp => Arc::new(SmtpMailer::new(&config.smtp, from)?),
        EmailDriver::Mailgun => Arc::new(MailgunMailer::new(&config.mailgun, from)?),
    };
    tracing::info!("Email driver: {:?}", config.driver);
    Ok(mailer)
}

const TEMPLATES: &[(&str, &str)] = &[
    ("magic_link.html", include_str!("../../templates/email/magic_link.html")),
    ("magic_link.txt", include_str!("../../templates/email/magic_link.txt")),
    (
        "submission_notification.html",
        include_str!("../../templates/email/submission_notification.html"),
    ),
    (
        "submission_notification.txt",
        include_str!("../../templates/email/submission_notification.txt"),
    ),
    (
        "submission_response.html",
        include_str!("../../templates/email/submission_response.html"),
    ),
    (
        "submission_response.txt",
        include_str!("../../templates/email/submission_response.txt"),
    ),
];

/// Renders and sends the hub's emails
pub struct EmailService {
    mailer: DynMailer,
    templates: Tera,
    site_name: String,
    base_url: String,
    notify_address: Option<String>,
}

impl EmailService {
    pub fn new(
        mailer: DynMailer,
        site_name: &str,
        base_url: &str,
        notify_address: Option<String>,
    ) -> Result<Self> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates(TEMPLATES.iter().copied())
            .context("Failed to load email templates")?;

        Ok(Self {
            mailer,
            templates,
            site_name: site_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            notify_address: notify_address.filter(|a| !a.trim().is_empty()),
        })
    }

    fn render(&self, name: &str, to: &str, subject: String, context: &TeraContext) -> Result<EmailMessage> {
        let html = self
            .templates
            .render(&format!("{}.html", name), context)
            .with_context(|| format!("Failed to render {} (html)", name))?;
        let text = self
            .templates
            .render(&format!("{}.txt", name), context)
            .with_context(|| format!("Failed to render {} (text)", name))?;

        Ok(EmailMessage {
            to: to.to_string(),
            subject,
            html,
            text,
        })
    }

    fn base_context(&self) -> TeraContext {
        let mut context = TeraContext::new();
        context.insert("site_name", &self.site_name);
        context.insert("site_url", &self.base_url);
        context
    }

    /// Send a sign-in link. Errors are returned so the caller can report them.
    pub async fn send_magic_link(&self, to: &str, url: &str, expires_minutes: i64) -> Result<()> {
        let mut context = self.base_context();
        context.insert("url", url);
        context.insert("expires_minutes", &expires_minutes);

        let message = self.render(
            "magic_link",
            to,
            format!("Sign in to {}", self.site_name),
            &context,
        )?;
        self.mailer.send(&message).await
    }

    /// Tell the admin inbox about a new submission. Failures are only logged.
    pub async fn notify_new_submission(
        &self,
        kind: &str,
        title: &str,
        author_name: &str,
        author_email: &str,
    ) {
        let Some(to) = self.notify_address.as_deref() else {
            tracing::debug!("No notification address configured; skipping submission email");
            return;
        };

        let kind = capitalize(kind);
        let mut context = self.base_context();
        context.insert("kind", &kind);
        context.insert("title", title);
        context.insert("author_name", author_name);
        context.insert("author_email", author_email);
        context.insert("admin_url", &format!("{}/admin/submissions", self.base_url));

        let subject = format!("New {} Submission - {}", kind, self.site_name);
        self.deliver_quietly("submission_notification", to, subject, &context)
            .await;
    }

    /// Send a reviewer's note back to the author. Failures are only logged.
    pub async fn notify_submission_response(
        &self,
        to: &str,
        user_name: &str,
        kind: &str,
        note: &str,
    ) {
        let kind = capitalize(kind);
        let mut context = self.base_context();
        context.insert("kind", &kind);
        context.insert("user_name", user_name);
        context.insert("note", note);

        let subject = format!("Response to Your {} - {}", kind, self.site_name);
        self.deliver_quietly("submission_response", to, subject, &context)
            .await;
    }

    async fn deliver_quietly(&self, template: &str, to: &str, subject: String, context: &TeraContext) {
        let result = match self.render(template, to, subject, context) {
            Ok(message) => self.mailer.send(&message).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!("Failed to send {} email to {}: {:#}", template, to, e);
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(mailer: Arc<MemoryMailer>, notify: Option<&str>) -> EmailService {
        EmailService::new(
            mailer,
            "Wellbeing Hub",
            "http://hub.test/",
            notify.map(str::to_string),
        )
        .expect("templates load")
    }

    #[tokio::test]
    async fn test_magic_link_email() {
        let mailer = Arc::new(MemoryMailer::new());
        let service = service(mailer.clone(), None);

        let url = "http://hub.test/api/auth/magic-link/verify?token=abc&callbackURL=%2F";
        service
            .send_magic_link("jane@4wdc.com.au", url, 5)
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@4wdc.com.au");
        assert_eq!(sent[0].subject, "Sign in to Wellbeing Hub");
        assert!(sent[0].text.contains(url));
        assert!(sent[0].text.contains("5 minutes"));
        assert!(sent[0].html.contains("token=abc&amp;callbackURL"));
    }

    #[tokio::test]
    async fn test_magic_link_failure_is_returned() {
        let service = service(Arc::new(MemoryMailer::failing()), None);
        assert!(service
            .send_magic_link("jane@4wdc.com.au", "http://x", 5)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_submission_notification() {
        let mailer = Arc::new(MemoryMailer::new());
        let service = service(mailer.clone(), Some("wellbeing@4wdc.com.au"));

        service
            .notify_new_submission("story", "<b>Big day</b>", "J. Doe", "jdoe@4wdc.com.au")
            .await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "wellbeing@4wdc.com.au");
        assert_eq!(sent[0].subject, "New Story Submission - Wellbeing Hub");
        assert!(sent[0].text.contains("http://hub.test/admin/submissions"));
        // User content is escaped in the HTML part
        assert!(sent[0].html.contains("&lt;b&gt;Big day&lt;"));
    }

    #[tokio::test]
    async fn test_submission_notification_without_address_is_skipped() {
        let mailer = Arc::new(MemoryMailer::new());
        let service = service(mailer.clone(), Some("  "));

        service
            .notify_new_submission("idea", "Desks", "J. Doe", "jdoe@4wdc.com.au")
            .await;
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_response_failure_is_swallowed() {
        let service = service(Arc::new(MemoryMailer::failing()), None);
        // Must not panic or propagate
        service
            .notify_submission_response("jdoe@4wdc.com.au", "J. Doe", "idea", "Thanks!")
            .await;
    }

    #[tokio::test]
    async fn test_submission_response() {
        let mailer = Arc::new(MemoryMailer::new());
        let service = service(mailer.clone(), None);

        service
            .notify_submission_response("jdoe@4wdc.com.au", "J. Doe", "idea", "We love it")
            .await;

        let sent = mailer.sent();
        assert_eq!(sent[0].subject, "Response to Your Idea - Wellbeing Hub");
        assert!(sent[0].text.contains("Hi J. Doe"));
        assert!(sent[0].text.contains("We love it"));
    }

    #[test]
    fn test_create_mailer_requires_settings() {
        let mut config = EmailConfig::default();
        assert!(create_mailer(&config).is_ok());

        config.driver = EmailDriver::Mailgun;
        assert!(create_mailer(&config).is_err());

        config.driver = EmailDriver::Smtp;
        assert!(create_mailer(&config).is_err());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("story"), "Story");
        assert_eq!(capitalize(""), "");
    }
}
