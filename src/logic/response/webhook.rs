//! Webhook collaborators
//!
//! HTTP implementations of the email relay, SMS gateway and emergency
//! dispatch endpoints. Each posts a JSON document; 4xx is a permanent
//! rejection except 408 and 429, which are retried along with 5xx and
//! transport errors.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::channels::{ContactNotifier, EmailTransport, EmergencyDispatch};
use super::types::AlertPayload;
use crate::constants::{APP_NAME, APP_VERSION};
use crate::logic::contacts::Contact;
use crate::logic::detection::{Location, OffenderSummary};
use crate::logic::error::ChannelError;

// ============================================================================
// SHARED CLIENT
// ============================================================================

#[derive(Clone)]
struct WebhookClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookClient {
    fn new(url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            timeout,
        }
    }

    async fn post(&self, body: &Value) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.url)
            .header("User-Agent", format!("{}/{}", APP_NAME, APP_VERSION))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if status.is_success() {
            log::debug!("Webhook {} accepted ({})", self.url, status);
            Ok(())
        } else {
            Err(status_error(&self.url, status))
        }
    }

    fn map_error(&self, e: reqwest::Error) -> ChannelError {
        if e.is_timeout() {
            ChannelError::Timeout(self.timeout)
        } else {
            ChannelError::Transport(e.to_string())
        }
    }
}

/// Request timeout and rate limiting are worth another attempt
fn status_error(url: &str, status: reqwest::StatusCode) -> ChannelError {
    let message = format!("{} returned {}", url, status);
    match status {
        reqwest::StatusCode::REQUEST_TIMEOUT | reqwest::StatusCode::TOO_MANY_REQUESTS => {
            ChannelError::Transport(message)
        }
        s if s.is_client_error() => ChannelError::Rejected(message),
        _ => ChannelError::Transport(message),
    }
}

// ============================================================================
// EMAIL RELAY
// ============================================================================

pub struct WebhookEmailTransport {
    client: WebhookClient,
}

impl WebhookEmailTransport {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            client: WebhookClient::new(url, timeout),
        }
    }
}

#[async_trait]
impl EmailTransport for WebhookEmailTransport {
    async fn send(&self, address: &str, payload: &AlertPayload) -> Result<(), ChannelError> {
        self.client.post(&format_email(address, payload)).await
    }
}

// ============================================================================
// SMS GATEWAY
// ============================================================================

pub struct WebhookContactNotifier {
    client: WebhookClient,
}

impl WebhookContactNotifier {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            client: WebhookClient::new(url, timeout),
        }
    }
}

#[async_trait]
impl ContactNotifier for WebhookContactNotifier {
    async fn notify(&self, contact: &Contact, payload: &AlertPayload) -> Result<(), ChannelError> {
        self.client.post(&format_sms(contact, payload)).await
    }
}

// ============================================================================
// EMERGENCY DISPATCH
// ============================================================================

pub struct WebhookDispatch {
    client: WebhookClient,
}

impl WebhookDispatch {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            client: WebhookClient::new(url, timeout),
        }
    }
}

#[async_trait]
impl EmergencyDispatch for WebhookDispatch {
    async fn place_call(
        &self,
        offender: &OffenderSummary,
        location: &Location,
    ) -> Result<(), ChannelError> {
        self.client.post(&format_dispatch(offender, location)).await
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

fn format_email(address: &str, payload: &AlertPayload) -> Value {
    let mut body = format!(
        "{}\n\nRisk level: {}\nTier: {}\nConviction: {}\nLocation: {}\nTime: {}",
        payload.message,
        payload.risk_level,
        payload.tier,
        payload.conviction,
        payload.location,
        payload.captured_at.to_rfc3339()
    );
    if let Some(ref photo) = payload.photo_ref {
        body.push_str(&format!("\nPhoto: {}", photo));
    }

    json!({
        "to": address,
        "subject": format!("[{}] {}", APP_NAME, payload.title),
        "text": body,
        "detection_id": payload.detection_id,
        "color": payload.risk_level.color(),
    })
}

fn format_sms(contact: &Contact, payload: &AlertPayload) -> Value {
    json!({
        "to": contact.phone,
        "name": contact.name,
        "text": format!("{} alert: {}", APP_NAME, payload.message),
        "detection_id": payload.detection_id,
    })
}

fn format_dispatch(offender: &OffenderSummary, location: &Location) -> Value {
    json!({
        "type": "emergency_call",
        "source": APP_NAME,
        "offender": {
            "name": offender.name,
            "tier": offender.tier.level(),
            "conviction": offender.conviction,
        },
        "location": {
            "description": location.description,
            "latitude": location.latitude,
            "longitude": location.longitude,
        },
        "summary": format!("Registered offender {} reported at {}", offender, location),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::detection::Tier;
    use crate::logic::response::RetryPolicy;
    use crate::logic::testing::{contact, sample_payload};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local endpoint answering every request with `status`; returns its URL
    /// and a request counter
    async fn serve_status(status: &'static str) -> (String, Arc<AtomicU32>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/sms", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicU32::new(0));
        let counter = requests.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    if read_request(&mut socket).await.is_some() {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let response = format!(
                            "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                            status
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                });
            }
        });

        (url, requests)
    }

    /// Headers plus a `content-length` body
    async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<()> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return Some(());
                }
            }
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_status_classification() {
        let url = "http://gateway/sms";
        assert!(status_error(url, StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(status_error(url, StatusCode::REQUEST_TIMEOUT).is_retryable());
        assert!(status_error(url, StatusCode::BAD_GATEWAY).is_retryable());
        assert!(matches!(
            status_error(url, StatusCode::BAD_REQUEST),
            ChannelError::Rejected(_)
        ));
        assert!(matches!(
            status_error(url, StatusCode::NOT_FOUND),
            ChannelError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_gateway_uses_every_attempt() {
        let (url, requests) = serve_status("429 Too Many Requests").await;
        let notifier = WebhookContactNotifier::new(&url, Duration::from_secs(5));
        let mom = contact("Mom", true);
        let payload = sample_payload();
        let retry = quick_retry();
        let attempts = AtomicU32::new(0);

        let result = retry
            .run("sms Mom", &attempts, || notifier.notify(&mom, &payload))
            .await;

        assert!(matches!(result, Err(ChannelError::Transport(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), retry.max_attempts);
        assert_eq!(requests.load(Ordering::SeqCst), retry.max_attempts);
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_retried() {
        let (url, requests) = serve_status("400 Bad Request").await;
        let notifier = WebhookContactNotifier::new(&url, Duration::from_secs(5));
        let mom = contact("Mom", true);
        let payload = sample_payload();
        let attempts = AtomicU32::new(0);

        let result = quick_retry()
            .run("sms Mom", &attempts, || notifier.notify(&mom, &payload))
            .await;

        assert!(matches!(result, Err(ChannelError::Rejected(_))));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_format_email() {
        let payload = sample_payload();
        let value = format_email("guardian@example.com", &payload);
        assert_eq!(value["to"], "guardian@example.com");
        assert!(value["subject"].as_str().unwrap().starts_with("[EVADE]"));
        assert!(value["text"].as_str().unwrap().contains("Tier: Tier 3"));
        assert_eq!(value["color"], "#ef4444");
    }

    #[test]
    fn test_format_sms() {
        let mom = contact("Mom", true);
        let value = format_sms(&mom, &sample_payload());
        assert_eq!(value["to"], mom.phone.as_str());
        assert!(value["text"].as_str().unwrap().starts_with("EVADE alert:"));
    }

    #[test]
    fn test_format_dispatch() {
        let offender = OffenderSummary {
            name: "John Smith".to_string(),
            tier: Tier::Tier3,
            conviction: "Sexual assault (2019)".to_string(),
        };
        let location = Location::named("Main St & 5th Ave").with_coordinates(40.7128, -74.006);
        let value = format_dispatch(&offender, &location);

        assert_eq!(value["offender"]["tier"], 3);
        assert_eq!(value["location"]["latitude"], 40.7128);
        assert!(value["summary"].as_str().unwrap().contains("John Smith (Tier 3)"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Port 9 on localhost is not expected to accept connections
        let dispatch = WebhookDispatch::new("http://127.0.0.1:9/dispatch", Duration::from_secs(2));
        let offender = OffenderSummary {
            name: "John Smith".to_string(),
            tier: Tier::Tier3,
            conviction: "Sexual assault (2019)".to_string(),
        };
        let result = dispatch.place_call(&offender, &Location::named("Park")).await;
        assert!(matches!(
            result,
            Err(ChannelError::Transport(_)) | Err(ChannelError::Timeout(_))
        ));
    }
}
