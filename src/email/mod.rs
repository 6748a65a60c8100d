//! Outbound mail: the owner notification for new contact messages,
//! subscriber welcomes, and newsletter issues. All sends are
//! best-effort; callers log failures and carry on.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

pub type EmailResult<T> = Result<T, EmailError>;

#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// SMTP settings, normally read from the environment. An empty
/// `smtp_user` selects an unauthenticated connection, which is what
/// local catch-all relays like mailpit expect.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
}

/// One piece of mail, ready to render.
///
/// Each variant carries everything its template needs, so rendering
/// never touches the store.
#[derive(Debug, Clone)]
pub enum OutboundEmail {
    /// Tell the site owner a contact message arrived
    ContactReceived {
        to: String,
        sender_name: String,
        sender_email: String,
        subject: Option<String>,
        message: String,
        message_id: String,
    },

    /// Welcome a new newsletter subscriber
    SubscriberWelcome { to: String, unsubscribe_url: String },

    /// One newsletter issue for one subscriber
    NewsletterIssue {
        to: String,
        subject: String,
        body: String,
        unsubscribe_url: String,
    },
}

impl OutboundEmail {
    /// Recipient address
    pub fn to(&self) -> &str {
        match self {
            OutboundEmail::ContactReceived { to, .. } => to,
            OutboundEmail::SubscriberWelcome { to, .. } => to,
            OutboundEmail::NewsletterIssue { to, .. } => to,
        }
    }

    /// Render to (subject, plain text body)
    pub fn render(&self) -> (String, String) {
        match self {
            OutboundEmail::ContactReceived {
                sender_name,
                sender_email,
                subject,
                message,
                message_id,
                ..
            } => {
                let subject_line = match subject {
                    Some(s) => format!("New contact message: {}", s),
                    None => "New contact message".to_string(),
                };
                let body = format!(
                    "You received a new message through your site.\n\n\
                    From: {} <{}>\n\
                    Message ID: {}\n\n\
                    {}\n\n\
                    Reply directly to {} to answer.",
                    sender_name, sender_email, message_id, message, sender_email
                );
                (subject_line, body)
            }
            OutboundEmail::SubscriberWelcome {
                unsubscribe_url, ..
            } => {
                let subject = "Welcome to the newsletter".to_string();
                let body = format!(
                    "Hello,\n\n\
                    Thanks for subscribing. You'll get an email whenever\n\
                    something new is published.\n\n\
                    If this wasn't you, unsubscribe here:\n\
                    {}\n",
                    unsubscribe_url
                );
                (subject, body)
            }
            OutboundEmail::NewsletterIssue {
                subject,
                body,
                unsubscribe_url,
                ..
            } => {
                let full_body = format!(
                    "{}\n\n\
                    ----\n\
                    You're receiving this because you subscribed.\n\
                    Unsubscribe: {}\n",
                    body, unsubscribe_url
                );
                (subject.clone(), full_body)
            }
        }
    }
}

/// Delivery seam between the services and SMTP.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundEmail) -> EmailResult<()>;
}

/// Test double that records instead of delivering.
#[derive(Debug, Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Snapshot of everything sent so far
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: OutboundEmail) -> EmailResult<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

/// Real delivery over lettre's async SMTP transport.
pub struct SmtpMailer {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> EmailResult<Self> {
        let builder = if config.smtp_user.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| EmailError::Transport(format!("SMTP relay error: {}", e)))?
                .credentials(Credentials::new(
                    config.smtp_user.clone(),
                    config.smtp_password.clone(),
                ))
        };
        let transport = builder.port(config.smtp_port).build();
        Ok(Self { config, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutboundEmail) -> EmailResult<()> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("from address: {}", e)))?;
        let to: Mailbox = mail
            .to()
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("to address: {}", e)))?;

        let (subject, body) = mail.render();
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Pick the mailer for this run.
///
/// Without SMTP configuration the mock is used, so local development
/// works with no mail server running.
pub fn build_mailer(config: Option<EmailConfig>) -> Arc<dyn Mailer> {
    match config {
        Some(cfg) => match SmtpMailer::new(cfg) {
            Ok(mailer) => {
                tracing::info!(host = %mailer.config.smtp_host, "smtp transport ready");
                Arc::new(mailer)
            }
            Err(err) => {
                tracing::warn!(error = %err, "smtp setup failed, falling back to mock mailer");
                Arc::new(MockMailer::new())
            }
        },
        None => {
            tracing::info!("smtp not configured, outbound mail goes to the mock mailer");
            Arc::new(MockMailer::new())
        }
    }
}
