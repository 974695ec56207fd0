//! Captcha solving through the anti-captcha.com API.
//!
//! A solve is one `createTask` call followed by polling `getTaskResult`
//! until the solution is ready or the poll limit runs out. The API
//! reports failures inline with an `errorId` field; error id 10 means
//! the account balance is empty, which gets its own variant since the
//! bot gives up on captchas entirely when it sees it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::CaptchaSolver;
use crate::error::ProviderError;

const API_BASE: &str = "https://api.anti-captcha.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between result polls.
const POLL_INTERVAL: Duration = Duration::from_secs(10);
const MAX_TRIES: u32 = 5;

const NO_FUNDS_ERROR_ID: i64 = 10;

pub struct AntiCaptcha {
    api_key: String,
    client: reqwest::Client,
}

impl AntiCaptcha {
    pub fn new(api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("emcee/0.9")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.to_string(),
            client,
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ProviderError> {
        let url = format!("{API_BASE}/{path}");
        let json: Value = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_api_error(&json)?;
        Ok(json)
    }

    async fn create_task(&self, page_url: &str, site_key: &str) -> Result<i64, ProviderError> {
        info!("creating captcha task");
        let body = json!({
            "clientKey": self.api_key,
            "task": {
                "type": "NoCaptchaTaskProxyless",
                "websiteURL": page_url,
                "websiteKey": site_key,
            }
        });
        let json = self.post("createTask", body).await?;
        json.get("taskId")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ProviderError::Malformed("createTask response missing taskId".into()))
    }

    async fn task_result(&self, task_id: i64) -> Result<Value, ProviderError> {
        let body = json!({
            "clientKey": self.api_key,
            "taskId": task_id,
        });
        self.post("getTaskResult", body).await
    }
}

#[async_trait]
impl CaptchaSolver for AntiCaptcha {
    async fn solve(&self, page_url: &str, site_key: &str) -> Result<String, ProviderError> {
        let task_id = self.create_task(page_url, site_key).await?;
        debug!(task_id, "captcha task created");

        for tries in 1..=MAX_TRIES {
            tokio::time::sleep(POLL_INTERVAL).await;
            let result = self.task_result(task_id).await?;

            if result.get("status").and_then(|v| v.as_str()) == Some("ready") {
                info!(task_id, tries, "captcha solved");
                return result
                    .get("solution")
                    .and_then(|s| s.get("gRecaptchaResponse"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ProviderError::Malformed("captcha solution missing token".into())
                    });
            }
            debug!(task_id, tries, "captcha task not ready");
        }

        Err(ProviderError::MaxTries(MAX_TRIES))
    }
}

fn check_api_error(json: &Value) -> Result<(), ProviderError> {
    let error_id = json.get("errorId").and_then(|v| v.as_i64()).unwrap_or(0);
    if error_id == 0 {
        return Ok(());
    }
    if error_id == NO_FUNDS_ERROR_ID {
        return Err(ProviderError::NoFunds);
    }
    let field = |name: &str| {
        json.get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    Err(ProviderError::Api {
        code: field("errorCode"),
        description: field("errorDescription"),
    })
}
