use serde::Serialize;

use crate::config::MailSettings;

/// Body posted to the mail relay
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Outbound notification mail, relayed over HTTP.
#[derive(Clone)]
pub struct Mailer {
    settings: MailSettings,
    client: reqwest::Client,
}

impl Mailer {
    pub fn new(settings: MailSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    pub fn compose(&self, to: &str, subject: &str, text: impl Into<String>) -> Mail {
        Mail {
            from: self.settings.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            text: text.into(),
        }
    }

    /// Send in the background. Returns whether the mail was handed to the relay.
    pub fn send(&self, to: &str, subject: &str, text: impl Into<String>) -> bool {
        let mail = self.compose(to, subject, text);

        let relay_url = match (self.settings.enabled, &self.settings.relay_url) {
            (true, Some(url)) => url.clone(),
            _ => {
                tracing::info!(to = %mail.to, subject = %mail.subject, "Mail not sent (relay disabled)");
                return false;
            }
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&relay_url).json(&mail).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        tracing::info!(
                            to = %mail.to,
                            subject = %mail.subject,
                            status = %response.status(),
                            "Mail relayed"
                        );
                    } else {
                        tracing::warn!(
                            url = %relay_url,
                            to = %mail.to,
                            status = %response.status(),
                            "Mail relay rejected message"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        url = %relay_url,
                        to = %mail.to,
                        error = %e,
                        "Failed to reach mail relay"
                    );
                }
            }
        });
        true
    }
}
