use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use tracing::info;

use crate::config::SmtpConfig;
use crate::error::Error;

use super::{Destination, Notifier};

const SENDER_NAME: &str = "Campaign Updates";
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest `content` a chat webhook accepts in one post.
const WEBHOOK_CHUNK: usize = 2000;

/// Delivers notifications over SMTP or a chat webhook depending on the
/// destination.
pub struct Dispatcher {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    http: reqwest::Client,
}

impl Dispatcher {
    pub fn new(config: &SmtpConfig) -> Result<Dispatcher, Error> {
        let sender: Mailbox = format!("{} <{}>", SENDER_NAME, config.username)
            .parse()
            .map_err(|err| Error::external("smtp", err))?;

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|err| Error::external("smtp", err))?
            .port(config.port)
            .credentials(credentials)
            .build();

        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|err| Error::external("webhook", err))?;

        Ok(Dispatcher {
            mailer,
            sender,
            http,
        })
    }

    async fn send_email(&self, to: &lettre::Address, subject: &str, body: &str) -> Result<(), Error> {
        let email = Message::builder()
            .from(self.sender.clone())
            .to(Mailbox::new(None, to.clone()))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|err| Error::external("smtp", err))?;

        self.mailer
            .send(email)
            .await
            .map_err(|err| Error::external("smtp", err))?;

        Ok(())
    }

    async fn send_webhook(&self, url: &str, subject: &str, body: &str) -> Result<(), Error> {
        let text = format!("**{}**\n\n{}", subject, body);

        // A failure partway through fails the whole send, so chunks already
        // posted are posted again when the next tick retries.
        for chunk in chunks(&text, WEBHOOK_CHUNK) {
            let response = self
                .http
                .post(url)
                .json(&json!({ "content": chunk }))
                .send()
                .await
                .map_err(|err| Error::external("webhook", err))?;

            if !response.status().is_success() {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                return Err(Error::external(
                    "webhook",
                    format!("{}: {}", status, detail),
                ));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    #[tracing::instrument(skip(self, body))]
    async fn send(&self, destination: &Destination, subject: &str, body: &str) -> Result<(), Error> {
        match destination {
            Destination::Email(address) => self.send_email(address, subject, body).await?,
            Destination::Webhook(url) => self.send_webhook(url, subject, body).await?,
        }

        info!(%destination, "delivered notification");
        Ok(())
    }
}

/// Splits `text` into pieces of at most `limit` characters.
fn chunks(text: &str, limit: usize) -> Vec<String> {
    let characters: Vec<char> = text.chars().collect();
    characters
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_character_limit() {
        let text = "é".repeat(4500);

        let pieces = chunks(&text, WEBHOOK_CHUNK);

        assert_eq!(
            pieces.iter().map(|piece| piece.chars().count()).collect::<Vec<_>>(),
            vec![2000, 2000, 500]
        );
        assert_eq!(pieces.concat(), text);
    }
}
