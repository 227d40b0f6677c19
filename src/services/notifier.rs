use crate::error::{EarnWatchError, Result};
use crate::models::Notification;
use async_trait::async_trait;
use serde::Serialize;

pub const EARNAPP_LOGO: &str = "https://www.androidfreeware.net/img2/com-earnapp.jpg";
pub const PAYPAL_ICON: &str = "https://img.icons8.com/color/64/000000/paypal.png";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Posts each notification as a single embed to a Discord webhook.
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    embeds: Vec<Embed<'a>>,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    color: u32,
    thumbnail: Image,
    fields: Vec<EmbedField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<Footer<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
struct Image {
    url: &'static str,
}

#[derive(Debug, Serialize)]
struct EmbedField<'a> {
    name: &'a str,
    value: &'a str,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct Footer<'a> {
    text: &'a str,
    icon_url: &'static str,
}

impl<'a> From<&'a Notification> for WebhookPayload<'a> {
    fn from(n: &'a Notification) -> Self {
        let embed = Embed {
            title: &n.title,
            description: n.description.as_deref(),
            color: n.color.0,
            thumbnail: Image { url: EARNAPP_LOGO },
            fields: n
                .fields
                .iter()
                .map(|f| EmbedField {
                    name: &f.name,
                    value: &f.value,
                    inline: true,
                })
                .collect(),
            footer: n.footer.as_deref().map(|text| Footer {
                text,
                icon_url: PAYPAL_ICON,
            }),
            timestamp: n.timestamp.map(|t| t.to_rfc3339()),
        };
        Self {
            embeds: vec![embed],
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = WebhookPayload::from(notification);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EarnWatchError::Notification(format!(
                "Discord rejected '{}': {} {}",
                notification.title, status, body
            )));
        }

        tracing::info!("Notification sent: {}", notification.title);
        Ok(())
    }
}
