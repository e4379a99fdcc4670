//! The source's companion endpoints: per-chunk acknowledgment and the final
//! statistics report.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use super::accounting::EventCounters;

/// Boxed call future so sessions can spawn it without knowing the backend.
pub type CallFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Body of one acknowledgment call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Acknowledgment {
    /// Latest cross time in seconds, omitted until known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Acknowledgment {
    pub fn new(duration: Option<Duration>) -> Self {
        Self {
            duration: duration.map(|d| d.as_secs_f64()),
        }
    }
}

/// Receiver of acknowledgments and the final report.
pub trait Collaborator: Send + Sync {
    fn acknowledge(&self, ack: Acknowledgment) -> CallFuture;
    fn report(&self, counters: EventCounters) -> CallFuture;
}

/// Talks to the source's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: reqwest::Client,
    ack_url: String,
    report_url: String,
}

impl HttpCollaborator {
    /// Creates a client for `api_base`, e.g. `http://127.0.0.1:8000`.
    ///
    /// # Errors
    /// - If the HTTP client cannot be built
    pub fn new(api_base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;
        let base = api_base.trim_end_matches('/');
        Ok(Self {
            client,
            ack_url: format!("{base}/waveform_cross_time"),
            report_url: format!("{base}/shutdown"),
        })
    }
}

impl Collaborator for HttpCollaborator {
    fn acknowledge(&self, ack: Acknowledgment) -> CallFuture {
        Box::pin(post_json(self.client.clone(), self.ack_url.clone(), ack))
    }

    fn report(&self, counters: EventCounters) -> CallFuture {
        Box::pin(post_json(
            self.client.clone(),
            self.report_url.clone(),
            counters,
        ))
    }
}

/// Posts a JSON body and maps failures to readable messages. The response
/// body is not interpreted.
async fn post_json<T: Serialize>(client: reqwest::Client, url: String, body: T) -> anyhow::Result<()> {
    let response = match client.post(&url).json(&body).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let error_msg = if e.is_connect() {
                format!("Failed to connect to {url}. Is the audio source running?")
            } else if e.is_timeout() {
                format!("Request to {url} timed out")
            } else {
                format!("Network error calling {url}: {e}")
            };
            return Err(anyhow::anyhow!(error_msg));
        }
    };

    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow::anyhow!(
            "{url} answered with status {status}: {error_body}"
        ));
    }

    Ok(())
}

/// Accepts every acknowledgment locally; used when replaying captures.
#[derive(Debug, Default, Clone)]
pub struct OfflineCollaborator;

impl Collaborator for OfflineCollaborator {
    fn acknowledge(&self, ack: Acknowledgment) -> CallFuture {
        Box::pin(async move {
            tracing::trace!("Offline acknowledgment: {:?}", ack.duration);
            Ok(())
        })
    }

    fn report(&self, counters: EventCounters) -> CallFuture {
        Box::pin(async move {
            tracing::info!(
                "Final counts: fired={}, received={}, echoed={}",
                counters.fired,
                counters.received,
                counters.echoed
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledgment_omits_unknown_duration() {
        let json = serde_json::to_value(Acknowledgment::new(None)).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let json = serde_json::to_value(Acknowledgment::new(Some(Duration::from_millis(1250)))).unwrap();
        assert_eq!(json, serde_json::json!({"duration": 1.25}));
    }

    #[test]
    fn test_endpoints_from_api_base() {
        let collaborator =
            HttpCollaborator::new("http://127.0.0.1:8000/", Duration::from_secs(2)).unwrap();
        assert_eq!(collaborator.ack_url, "http://127.0.0.1:8000/waveform_cross_time");
        assert_eq!(collaborator.report_url, "http://127.0.0.1:8000/shutdown");
    }
}
