use crate::config::EmailConfig;
use crate::error::{CritwatchError, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;

/// One plain-text notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

pub trait Mailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Plain (unencrypted, unauthenticated) SMTP relay.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        let transport = SmtpTransport::builder_dangerous(host)
            .port(port)
            .timeout(Some(timeout))
            .build();
        Self { transport }
    }

    pub fn from_config(email: &EmailConfig, timeout: Duration) -> Self {
        Self::new(&email.smtp_server, email.smtp_port, timeout)
    }
}

fn mailbox(addr: &str) -> Result<Mailbox> {
    addr.trim()
        .parse()
        .map_err(|e| CritwatchError::Mail(format!("invalid address '{addr}': {e}")))
}

/// Build the MIME message without touching the network.
pub fn build_message(mail: &OutgoingMail) -> Result<Message> {
    if mail.to.is_empty() {
        return Err(CritwatchError::Mail("no recipients".to_string()));
    }
    let mut builder = Message::builder()
        .from(mailbox(&mail.from)?)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    for to in &mail.to {
        builder = builder.to(mailbox(to)?);
    }
    builder
        .body(mail.body.clone())
        .map_err(|e| CritwatchError::Mail(e.to_string()))
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(mail)?;
        self.transport
            .send(&message)
            .map_err(|e| CritwatchError::Mail(e.to_string()))?;
        Ok(())
    }
}
