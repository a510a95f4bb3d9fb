//! # Alert Dispatcher
//!
//! Fans a `Message` out to whichever webhook destinations are configured
//! (spec §4.6). Alerts are fire-and-forget relative to a reload: every
//! error here is logged by the caller, never propagated as a reconcile
//! failure.

use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use reqwest::StatusCode;
use serde_json::json;

use crate::constants::ALERT_REQUEST_TIMEOUT_SECS;
use crate::crd::{AlertingConfig, WebhookRef};

/// Everything a sender needs to describe what happened, independent of
/// destination format.
#[derive(Debug, Clone)]
pub struct Message {
    pub title: String,
    pub text: String,
    pub workload_kind: String,
    pub workload_name: String,
    pub workload_namespace: String,
    pub resource_kind: String,
    pub resource_name: String,
    pub rollout_strategy: String,
    pub error: Option<String>,
    pub timestamp: String,
}

impl Message {
    fn summary(&self) -> String {
        match &self.error {
            Some(err) => format!(
                "{}: {} {}/{} ({} via {}) failed: {}",
                self.title,
                self.workload_kind,
                self.workload_namespace,
                self.workload_name,
                self.resource_name,
                self.rollout_strategy,
                err
            ),
            None => format!(
                "{}: {} {}/{} reloaded for {} via {}",
                self.title,
                self.workload_kind,
                self.workload_namespace,
                self.workload_name,
                self.resource_name,
                self.rollout_strategy
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("{sender}: no webhook url or secret reference configured")]
    MissingDestination { sender: &'static str },
    #[error("{sender}: fetching webhook secret {namespace}/{name}: {source}")]
    SecretFetch {
        sender: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("{sender}: webhook secret {namespace}/{name} has no key {key:?}")]
    SecretKeyMissing {
        sender: &'static str,
        namespace: String,
        name: String,
        key: String,
    },
    #[error("{sender}: request failed: {source}")]
    Request {
        sender: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{sender}: destination returned status {status}")]
    NonSuccessStatus {
        sender: &'static str,
        status: StatusCode,
    },
}

/// Post `message` to every destination configured in `config`, concurrently,
/// and return every error encountered. An empty vec means every configured
/// sender (if any) succeeded.
pub async fn dispatch(
    client: &Client,
    config: &AlertingConfig,
    namespace: &str,
    message: &Message,
) -> Vec<AlertError> {
    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(ALERT_REQUEST_TIMEOUT_SECS))
        .build()
    {
        Ok(http) => http,
        Err(source) => {
            return vec![AlertError::Request {
                sender: "http-client",
                source,
            }];
        }
    };

    let mut sends: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), AlertError>> + Send + '_>>> =
        Vec::new();

    if let Some(webhook) = &config.slack {
        sends.push(Box::pin(send_slack(&http, client, namespace, webhook, message)));
    }
    if let Some(webhook) = &config.teams {
        sends.push(Box::pin(send_teams(&http, client, namespace, webhook, message)));
    }
    if let Some(webhook) = &config.gchat {
        sends.push(Box::pin(send_gchat(&http, client, namespace, webhook, message)));
    }
    if let Some(webhook) = &config.generic_webhook {
        sends.push(Box::pin(send_generic(&http, client, namespace, webhook, message)));
    }

    futures::future::join_all(sends)
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect()
}

async fn resolve_url(
    client: &Client,
    namespace: &str,
    sender: &'static str,
    webhook: &WebhookRef,
) -> Result<String, AlertError> {
    if let Some(url) = &webhook.url {
        return Ok(url.clone());
    }
    let Some(secret_name) = &webhook.secret_name else {
        return Err(AlertError::MissingDestination { sender });
    };
    let key = webhook.secret_key.as_deref().unwrap_or("url");

    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = api
        .get(secret_name)
        .await
        .map_err(|source| AlertError::SecretFetch {
            sender,
            namespace: namespace.to_string(),
            name: secret_name.clone(),
            source,
        })?;

    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| AlertError::SecretKeyMissing {
            sender,
            namespace: namespace.to_string(),
            name: secret_name.clone(),
            key: key.to_string(),
        })?;

    String::from_utf8(bytes.0.clone()).map_err(|_| AlertError::SecretKeyMissing {
        sender,
        namespace: namespace.to_string(),
        name: secret_name.clone(),
        key: key.to_string(),
    })
}

async fn post_json(
    http: &reqwest::Client,
    sender: &'static str,
    url: &str,
    body: serde_json::Value,
) -> Result<(), AlertError> {
    let response = http
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|source| AlertError::Request { sender, source })?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(AlertError::NonSuccessStatus {
            sender,
            status: response.status(),
        })
    }
}

async fn send_slack(
    http: &reqwest::Client,
    client: &Client,
    namespace: &str,
    webhook: &WebhookRef,
    message: &Message,
) -> Result<(), AlertError> {
    let url = resolve_url(client, namespace, "slack", webhook).await?;
    let color = if message.error.is_some() { "#d32f2f" } else { "#2e7d32" };
    let body = json!({
        "attachments": [{
            "fallback": message.summary(),
            "color": color,
            "title": message.title,
            "text": message.text,
            "fields": [
                {"title": "Workload", "value": format!("{}/{}", message.workload_namespace, message.workload_name), "short": true},
                {"title": "Resource", "value": format!("{} {}", message.resource_kind, message.resource_name), "short": true},
                {"title": "Strategy", "value": message.rollout_strategy, "short": true},
            ],
            "ts": message.timestamp,
        }]
    });
    post_json(http, "slack", &url, body).await
}

async fn send_teams(
    http: &reqwest::Client,
    client: &Client,
    namespace: &str,
    webhook: &WebhookRef,
    message: &Message,
) -> Result<(), AlertError> {
    let url = resolve_url(client, namespace, "teams", webhook).await?;
    let theme_color = if message.error.is_some() { "D32F2F" } else { "2E7D32" };
    let body = json!({
        "@type": "MessageCard",
        "@context": "http://schema.org/extensions",
        "themeColor": theme_color,
        "title": message.title,
        "text": message.summary(),
        "sections": [{
            "facts": [
                {"name": "Workload", "value": format!("{}/{}", message.workload_namespace, message.workload_name)},
                {"name": "Resource", "value": format!("{} {}", message.resource_kind, message.resource_name)},
                {"name": "Strategy", "value": message.rollout_strategy},
            ],
        }],
    });
    post_json(http, "teams", &url, body).await
}

async fn send_gchat(
    http: &reqwest::Client,
    client: &Client,
    namespace: &str,
    webhook: &WebhookRef,
    message: &Message,
) -> Result<(), AlertError> {
    let url = resolve_url(client, namespace, "gchat", webhook).await?;
    let body = json!({
        "cardsV2": [{
            "card": {
                "header": {"title": message.title},
                "sections": [{
                    "widgets": [
                        {"textParagraph": {"text": message.summary()}},
                        {"decoratedText": {"topLabel": "Workload", "text": format!("{}/{}", message.workload_namespace, message.workload_name)}},
                        {"decoratedText": {"topLabel": "Resource", "text": format!("{} {}", message.resource_kind, message.resource_name)}},
                    ],
                }],
            },
        }],
    });
    post_json(http, "gchat", &url, body).await
}

async fn send_generic(
    http: &reqwest::Client,
    client: &Client,
    namespace: &str,
    webhook: &WebhookRef,
    message: &Message,
) -> Result<(), AlertError> {
    let url = resolve_url(client, namespace, "generic-webhook", webhook).await?;
    let body = json!({
        "title": message.title,
        "text": message.text,
        "workloadKind": message.workload_kind,
        "workloadName": message.workload_name,
        "workloadNamespace": message.workload_namespace,
        "resourceKind": message.resource_kind,
        "resourceName": message.resource_name,
        "rolloutStrategy": message.rollout_strategy,
        "error": message.error,
        "timestamp": message.timestamp,
    });
    post_json(http, "generic-webhook", &url, body).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message(error: Option<&str>) -> Message {
        Message {
            title: "Reloader".to_string(),
            text: "reload triggered".to_string(),
            workload_kind: "Deployment".to_string(),
            workload_name: "web".to_string(),
            workload_namespace: "default".to_string(),
            resource_kind: "Secret".to_string(),
            resource_name: "db".to_string(),
            rollout_strategy: "rollout".to_string(),
            error: error.map(str::to_string),
            timestamp: "2026-07-27T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn summary_mentions_error_when_present() {
        let msg = sample_message(Some("patch failed"));
        assert!(msg.summary().contains("patch failed"));
    }

    #[test]
    fn summary_omits_error_when_absent() {
        let msg = sample_message(None);
        assert!(!msg.summary().contains("failed:"));
        assert!(msg.summary().contains("reloaded"));
    }

    #[tokio::test]
    async fn dispatch_with_no_destinations_configured_returns_no_errors() {
        let config = AlertingConfig::default();
        let client = match Client::try_default().await {
            Ok(client) => client,
            Err(_) => return,
        };
        let errors = dispatch(&client, &config, "default", &sample_message(None)).await;
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn resolve_url_fails_without_url_or_secret() {
        let Ok(client) = Client::try_default().await else {
            return;
        };
        let webhook = WebhookRef {
            url: None,
            secret_name: None,
            secret_key: None,
        };
        let err = resolve_url(&client, "default", "slack", &webhook).await;
        assert!(matches!(err, Err(AlertError::MissingDestination { .. })));
    }
}
