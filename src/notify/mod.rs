use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use lettre::Address;

use crate::campaign::Campaign;
use crate::error::Error;

pub mod dispatch;
pub use dispatch::Dispatcher;

/// Placed between the messages of different rules in one payload.
pub const SEPARATOR: &str = "\n\n---\n\n";

/// Where a campaign's updates are delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Email(Address),
    Webhook(String),
}

impl Destination {
    /// `https://` values are chat webhooks, anything else must be an email
    /// address.
    pub fn parse(raw: &str) -> Result<Destination, Error> {
        let trimmed = raw.trim();
        let invalid = || Error::InvalidDestination {
            destination: raw.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        if trimmed.starts_with("https://") {
            let url = reqwest::Url::parse(trimmed).map_err(|_| invalid())?;
            if url.host_str().is_none() {
                return Err(invalid());
            }
            return Ok(Destination::Webhook(trimmed.to_string()));
        }

        trimmed
            .parse::<Address>()
            .map(Destination::Email)
            .map_err(|_| invalid())
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Email(address) => write!(f, "{}", address),
            Destination::Webhook(url) => f.write_str(url),
        }
    }
}

pub fn subject(campaign: &Campaign) -> String {
    format!("Campaign Update for {}", campaign.display_name())
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &Destination, subject: &str, body: &str)
        -> Result<(), Error>;
}

#[cfg(test)]
pub mod test {
    use std::sync::Mutex;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub struct SentNotification {
        pub destination: Destination,
        pub subject: String,
        pub body: String,
    }

    /// Records every send; set `fail` to reject them instead.
    #[derive(Default)]
    pub struct MockNotifier {
        pub sent: Mutex<Vec<SentNotification>>,
        pub fail: Mutex<bool>,
    }

    impl MockNotifier {
        pub fn new() -> MockNotifier {
            MockNotifier::default()
        }

        pub fn sent(&self) -> Vec<SentNotification> {
            self.sent.lock().unwrap().clone()
        }

        pub fn set_failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send(
            &self,
            destination: &Destination,
            subject: &str,
            body: &str,
        ) -> Result<(), Error> {
            if *self.fail.lock().unwrap() {
                return Err(Error::external("notifier", "delivery refused"));
            }
            self.sent.lock().unwrap().push(SentNotification {
                destination: destination.clone(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(())
        }
    }
}
