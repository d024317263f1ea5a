use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, StorageClass};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

use log_combine_lambda::adapters::clock::TimeBudget;
use log_combine_lambda::adapters::object_store::{CopyDestination, CopyPart, ObjectStore};
use log_combine_lambda::handlers::merge::{
    handle_merge_request, MergeHandlerConfig, DEFAULT_SAFETY_MARGIN, DEFAULT_STORAGE_CLASS,
};
use log_combine_lambda::runtime::contract::{normalize_request, MergeOutcome, MergeRequest};

struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

fn block_on<F, T>(future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

impl ObjectStore for S3ObjectStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
        let body = ByteStream::from(body.to_vec());
        block_on(async {
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to write object to s3: {error}"))
        })
    }

    fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        block_on(async {
            let response = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|error| format!("failed to read object from s3: {error}"))?;
            let data = response
                .body
                .collect()
                .await
                .map_err(|error| format!("failed to collect object body: {error}"))?;
            Ok(data.into_bytes().to_vec())
        })
    }

    fn object_length(&self, bucket: &str, key: &str) -> Result<u64, String> {
        block_on(async {
            let response = self
                .client
                .head_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|error| format!("failed to head object in s3: {error}"))?;
            let length = response
                .content_length()
                .ok_or_else(|| "head response did not include a content length".to_string())?;
            u64::try_from(length).map_err(|_| format!("invalid content length: {length}"))
        })
    }

    fn compose_object(
        &self,
        destination: &CopyDestination,
        parts: &[CopyPart],
    ) -> Result<(), String> {
        block_on(async {
            let mut create = self
                .client
                .create_multipart_upload()
                .bucket(&destination.bucket)
                .key(&destination.key);
            if let Some(storage_class) = &destination.storage_class {
                create = create.storage_class(StorageClass::from(storage_class.as_str()));
            }
            let created = create
                .send()
                .await
                .map_err(|error| format!("failed to create multipart upload: {error}"))?;
            let upload_id = created
                .upload_id()
                .ok_or_else(|| "multipart upload response did not include an upload id".to_string())?
                .to_string();

            match copy_parts(&self.client, destination, parts, &upload_id).await {
                Ok(completed) => self
                    .client
                    .complete_multipart_upload()
                    .bucket(&destination.bucket)
                    .key(&destination.key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(completed))
                            .build(),
                    )
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to complete multipart upload: {error}")),
                Err(error) => {
                    // Leave no half-open upload behind; the prior object at
                    // the destination key stays intact.
                    let _ = self
                        .client
                        .abort_multipart_upload()
                        .bucket(&destination.bucket)
                        .key(&destination.key)
                        .upload_id(&upload_id)
                        .send()
                        .await;
                    Err(error)
                }
            }
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), String> {
        block_on(async {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to delete object from s3: {error}"))
        })
    }
}

async fn copy_parts(
    client: &aws_sdk_s3::Client,
    destination: &CopyDestination,
    parts: &[CopyPart],
    upload_id: &str,
) -> Result<Vec<CompletedPart>, String> {
    let mut completed = Vec::with_capacity(parts.len());
    for (offset, part) in parts.iter().enumerate() {
        let part_number = offset as i32 + 1;
        let mut copy = client
            .upload_part_copy()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .upload_id(upload_id)
            .part_number(part_number)
            .copy_source(format!("{}/{}", part.source_bucket, part.source_key));
        if let Some(range) = &part.range {
            copy = copy.copy_source_range(range.to_copy_source_range());
        }
        let response = copy.send().await.map_err(|error| {
            format!(
                "failed to copy part {part_number} from '{}/{}': {error}",
                part.source_bucket, part.source_key
            )
        })?;
        let e_tag = response
            .copy_part_result()
            .and_then(|result| result.e_tag())
            .ok_or_else(|| format!("copy part {part_number} response did not include an etag"))?
            .to_string();
        completed.push(
            CompletedPart::builder()
                .e_tag(e_tag)
                .part_number(part_number)
                .build(),
        );
    }
    Ok(completed)
}

/// Remaining time until the invocation's hard deadline.
struct DeadlineBudget {
    deadline_epoch_ms: u64,
}

impl TimeBudget for DeadlineBudget {
    fn remaining(&self) -> Duration {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.deadline_epoch_ms.saturating_sub(now_ms))
    }
}

fn load_config() -> Result<MergeHandlerConfig, Error> {
    Ok(MergeHandlerConfig {
        scratch_bucket: std::env::var("TMP_LOGS_BUCKET_NAME")
            .map_err(|_| Error::from("TMP_LOGS_BUCKET_NAME must be configured"))?,
        dest_bucket: std::env::var("DEST_LOGS_BUCKET_NAME")
            .ok()
            .filter(|value| !value.trim().is_empty()),
        aggregation_regions: parse_regions(std::env::var("AGGREGATION_REGIONS").ok().as_deref()),
        storage_class: std::env::var("DEST_STORAGE_CLASS")
            .unwrap_or_else(|_| DEFAULT_STORAGE_CLASS.to_string()),
        safety_margin: safety_margin_from_env(
            std::env::var("CHECKPOINT_SAFETY_MARGIN_SECONDS").ok().as_deref(),
        ),
    })
}

fn parse_regions(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn safety_margin_from_env(raw: Option<&str>) -> Duration {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SAFETY_MARGIN)
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<MergeOutcome, Error> {
    let request: MergeRequest = serde_json::from_value(event.payload)
        .map_err(|error| Error::from(format!("invalid merge request: {error}")))?;
    let normalized =
        normalize_request(request).map_err(|error| Error::from(error.message().to_string()))?;

    let config = load_config()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3ObjectStore {
        client: aws_sdk_s3::Client::new(&aws_config),
    };
    let budget = DeadlineBudget {
        deadline_epoch_ms: event.context.deadline,
    };

    handle_merge_request(&normalized, &config, &store, &budget)
        .map_err(|error| Error::from(error.message))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
