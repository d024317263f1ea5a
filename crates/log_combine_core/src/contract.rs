use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where the ordered file list comes from. An inline list is used as-is; a
/// manifest reference names an object in the scratch bucket holding a JSON
/// array of keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FileSource {
    Inline(Vec<String>),
    Manifest(String),
}

/// Progress handle returned when an invocation runs out of time budget.
/// A caller re-invokes the same job with this value under `continuation`
/// to resume at the next unprocessed file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeContinuation {
    #[serde(rename = "continuationMarker")]
    pub continuation_marker: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeRequest {
    pub bucket_name: String,
    #[serde(default)]
    pub dest_bucket: Option<String>,
    pub key: String,
    pub files: FileSource,
    #[serde(default)]
    pub log_type: Option<String>,
    #[serde(default)]
    pub continuation: Option<MergeContinuation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedMergeRequest {
    pub source_bucket: String,
    pub dest_bucket: Option<String>,
    pub final_key: String,
    pub files: FileSource,
    pub log_type: Option<String>,
    pub resume_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeStatus {
    pub status: String,
}

/// Invocation result. Serializes to `{"continuationMarker": k}` when the
/// job yielded, `{"status": "no-op"}` or `{"status": "done"}` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MergeOutcome {
    Yielded(MergeContinuation),
    Completed(MergeStatus),
}

impl MergeOutcome {
    pub fn no_op() -> Self {
        Self::Completed(MergeStatus {
            status: "no-op".to_string(),
        })
    }

    pub fn done() -> Self {
        Self::Completed(MergeStatus {
            status: "done".to_string(),
        })
    }

    pub fn yielded(continuation_marker: usize) -> Self {
        Self::Yielded(MergeContinuation {
            continuation_marker,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn normalize_request(
    payload: MergeRequest,
) -> Result<NormalizedMergeRequest, ValidationError> {
    let source_bucket = payload.bucket_name.trim().to_string();
    if source_bucket.is_empty() {
        return Err(ValidationError::new("bucket_name cannot be empty"));
    }

    let final_key = payload.key.trim().to_string();
    if final_key.is_empty() {
        return Err(ValidationError::new("key cannot be empty"));
    }

    let dest_bucket = payload
        .dest_bucket
        .map(|bucket| bucket.trim().to_string())
        .filter(|bucket| !bucket.is_empty());

    if let FileSource::Manifest(reference) = &payload.files {
        if reference.trim().is_empty() {
            return Err(ValidationError::new(
                "files manifest reference cannot be empty",
            ));
        }
    }

    let log_type = payload
        .log_type
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let resume_index = payload
        .continuation
        .map(|continuation| continuation.continuation_marker)
        .unwrap_or(0);

    Ok(NormalizedMergeRequest {
        source_bucket,
        dest_bucket,
        final_key,
        files: payload.files,
        log_type,
        resume_index,
    })
}

/// Stable identity for one logical merge job, independent of the
/// continuation marker, so every invocation of a resumed job logs the
/// same fingerprint.
pub fn job_fingerprint(request: &NormalizedMergeRequest) -> String {
    let identity = NormalizedMergeRequest {
        resume_index: 0,
        ..request.clone()
    };
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(&identity));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
