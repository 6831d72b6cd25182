use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.password.clone()))
            .build();
        let from = cfg
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid MAIL_FROM {}", cfg.from))?;
        Ok(Self { transport, from })
    }
}

pub fn verification_body(code: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Email verification</title>
</head>
<body>
    <div>Your verification code is {code}.</div>
</body>
</html>
"#
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, code: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("recipient address")?)
            .subject("Email verification")
            .header(ContentType::TEXT_HTML)
            .body(verification_body(code))
            .context("build verification mail")?;
        self.transport
            .send(message)
            .await
            .context("smtp send")?;
        info!("verification mail sent");
        Ok(())
    }
}

/// Keeps every message instead of sending it.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    sent: tokio::sync::Mutex<Vec<(String, String)>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingMailer {
    pub async fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|(addr, _)| addr == to)
            .map(|(_, code)| code.clone())
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, to: &str, code: &str) -> anyhow::Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("relay refused connection");
        }
        self.sent.lock().await.push((to.to_string(), code.to_string()));
        Ok(())
    }
}
