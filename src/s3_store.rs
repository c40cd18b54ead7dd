// src/s3_store.rs
//
// S3 executor backing https/http provider endpoints. All protocol work is
// delegated to the AWS SDK client; this module only builds the client from
// the provider config + opaque credentials, dispatches the five operation
// kinds, and classifies failures as retryable or fatal.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials as SdkCredentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::warn;

use crate::config::ProviderConfig;
use crate::credentials::Credentials;
use crate::executor::{timed_attempt, Attempt, OpExecutor, OpFailure, OpKind, OpRequest};

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client for one provider. Credentials stay opaque: they are
    /// handed to the SDK's provider and never appear in logs or errors.
    pub fn connect(provider: &ProviderConfig, credentials: &Credentials) -> S3Store {
        let endpoint = provider.effective_endpoint();
        if endpoint != provider.endpoint {
            warn!(
                provider = %provider.id,
                "insecure_ssl set, downgrading endpoint to {}", endpoint
            );
        }

        let sdk_credentials = SdkCredentials::new(
            credentials.access_key(),
            credentials.secret_key(),
            credentials.session_token().map(str::to_string),
            None,
            "ic-bench",
        );
        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(provider.region.clone()))
            .endpoint_url(endpoint)
            .credentials_provider(sdk_credentials)
            .force_path_style(true)
            .build();

        S3Store {
            client: Client::from_conf(conf),
            bucket: provider.bucket.clone(),
        }
    }

    async fn dispatch(&self, req: &OpRequest) -> std::result::Result<u64, OpFailure> {
        match req.kind {
            OpKind::Put => {
                let payload = req
                    .payload
                    .as_ref()
                    .ok_or_else(|| OpFailure::fatal("PUT request without payload"))?;
                let size = tokio::fs::metadata(payload)
                    .await
                    .map_err(|e| OpFailure::fatal(format!("payload unreadable: {}", e)))?
                    .len();
                let body = ByteStream::from_path(payload)
                    .await
                    .map_err(|e| OpFailure::fatal(format!("payload unreadable: {}", e)))?;
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(&req.key)
                    .body(body)
                    .send()
                    .await
                    .map_err(classify_sdk_error)?;
                Ok(size)
            }
            OpKind::Get => {
                let resp = self
                    .client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(&req.key)
                    .send()
                    .await
                    .map_err(classify_sdk_error)?;
                let data = resp
                    .body
                    .collect()
                    .await
                    .map_err(|e| OpFailure::retryable(format!("body read failed: {}", e)))?;
                Ok(data.into_bytes().len() as u64)
            }
            OpKind::Head => {
                self.client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(&req.key)
                    .send()
                    .await
                    .map_err(classify_sdk_error)?;
                Ok(0)
            }
            OpKind::List => {
                // Paginated listing of the whole bucket prefix.
                let mut continuation: Option<String> = None;
                loop {
                    let mut list = self.client.list_objects_v2().bucket(&self.bucket);
                    if !req.key.is_empty() {
                        list = list.prefix(&req.key);
                    }
                    if let Some(token) = continuation.as_deref() {
                        list = list.continuation_token(token);
                    }
                    let resp = list.send().await.map_err(classify_sdk_error)?;
                    match resp.next_continuation_token() {
                        Some(token) if !token.is_empty() => {
                            continuation = Some(token.to_string());
                        }
                        _ => break,
                    }
                }
                Ok(0)
            }
            OpKind::Delete => {
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(&req.key)
                    .send()
                    .await
                    .map_err(classify_sdk_error)?;
                Ok(0)
            }
        }
    }
}

#[async_trait]
impl OpExecutor for S3Store {
    async fn execute(&self, req: &OpRequest) -> Attempt {
        timed_attempt(req.timeout, self.dispatch(req)).await
    }
}

/// Transport-level trouble (dispatch, connect, malformed response) is worth
/// retrying; a service error is the backend's definitive answer.
fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> OpFailure
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let retryable = matches!(
        err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_)
    );
    let message = DisplayErrorContext(&err).to_string();
    if retryable {
        OpFailure::retryable(message)
    } else {
        OpFailure::fatal(message)
    }
}
