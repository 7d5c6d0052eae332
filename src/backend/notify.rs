use super::{BackendError, DeliveryReceipt, NotificationSender};
use async_trait::async_trait;

use crate::submission::SubmissionReport;

/// Posts the finished report to the study's notification endpoint.
pub struct HttpNotifier {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSender for HttpNotifier {
    async fn send(&self, report: &SubmissionReport) -> Result<DeliveryReceipt, BackendError> {
        let body = serde_json::json!({ "submissionData": report });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        if !status.is_success() {
            let detail = value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(|v| v.as_str())
                .unwrap_or("notification rejected");
            return Err(BackendError::Malformed(format!(
                "{detail} ({})",
                status.as_u16()
            )));
        }

        let receipt: DeliveryReceipt =
            serde_json::from_value(value).map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(receipt)
    }
}
