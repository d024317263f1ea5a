use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adapters::clock::TimeBudget;
use crate::adapters::object_store::{CopyDestination, CopyPart, ObjectStore};
use crate::runtime::contract::{
    job_fingerprint, FileSource, MergeOutcome, NormalizedMergeRequest,
};
use crate::runtime::filter::is_eligible;
use crate::runtime::padding::{filler_block, payload_range, FILLER_LEN};
use crate::runtime::progress::{MergeCursor, MergeStep};

pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(120);
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD_IA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeHandlerConfig {
    /// Bucket holding the scratch object and manifest files.
    pub scratch_bucket: String,
    /// Default destination when the request names none; falls back to the
    /// source bucket when absent here too.
    pub dest_bucket: Option<String>,
    /// Region tokens for the eligibility filter.
    pub aggregation_regions: Vec<String>,
    pub storage_class: String,
    pub safety_margin: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeHandlerError {
    pub message: String,
}

impl MergeHandlerError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Runs one invocation of a merge job: resolve the file list, append files
/// to the scratch object until done or out of budget, then either finalize
/// or hand a continuation marker back to the caller. The scratch object is
/// the only durable state between invocations.
pub fn handle_merge_request(
    request: &NormalizedMergeRequest,
    config: &MergeHandlerConfig,
    store: &impl ObjectStore,
    budget: &impl TimeBudget,
) -> Result<MergeOutcome, MergeHandlerError> {
    let started_at = Instant::now();
    let fingerprint = job_fingerprint(request);
    log_merge_info(
        "merge_started",
        json!({
            "job_fingerprint": fingerprint.clone(),
            "source_bucket": request.source_bucket.clone(),
            "final_key": request.final_key.clone(),
            "resume_index": request.resume_index,
        }),
    );

    match run_merge(request, config, store, budget) {
        Ok(outcome) => {
            log_merge_info(
                "merge_completed",
                json!({
                    "job_fingerprint": fingerprint,
                    "final_key": request.final_key.clone(),
                    "duration_ms": started_at.elapsed().as_millis(),
                    "outcome": outcome.clone(),
                }),
            );
            Ok(outcome)
        }
        Err(error) => {
            log_merge_error(
                "merge_failed",
                json!({
                    "job_fingerprint": fingerprint,
                    "final_key": request.final_key.clone(),
                    "duration_ms": started_at.elapsed().as_millis(),
                    "error": error.message.clone(),
                }),
            );
            Err(error)
        }
    }
}

fn run_merge(
    request: &NormalizedMergeRequest,
    config: &MergeHandlerConfig,
    store: &impl ObjectStore,
    budget: &impl TimeBudget,
) -> Result<MergeOutcome, MergeHandlerError> {
    let resolved = resolve_file_list(store, &config.scratch_bucket, &request.files)?;
    if resolved.is_empty() {
        // The wrapping merge_completed envelope reports the no-op outcome.
        return Ok(MergeOutcome::no_op());
    }

    let eligible = eligible_files(request, config, &resolved);
    let mut cursor = MergeCursor::resume(request.resume_index, eligible.len())
        .map_err(|error| MergeHandlerError::new(error.message().to_string()))?;
    let start_index = cursor.index();

    if cursor.is_fresh() {
        init_padding(store, config, &request.final_key)?;
    }

    loop {
        // Always make progress: the budget check only fires once this
        // invocation has committed at least one append, so a returned
        // marker is strictly greater than the supplied one.
        let out_of_time =
            cursor.index() > start_index && budget.remaining() < config.safety_margin;

        match cursor.next_step(out_of_time) {
            MergeStep::Append(index) => {
                append_file(store, config, request, &eligible[index])?;
                log_merge_info(
                    "file_appended",
                    json!({
                        "final_key": request.final_key.clone(),
                        "file_key": eligible[index].clone(),
                        "index": index,
                    }),
                );
                cursor.advance();
            }
            MergeStep::Yield(marker) => {
                log_merge_info(
                    "budget_yield",
                    json!({
                        "final_key": request.final_key.clone(),
                        "continuation_marker": marker,
                        "total_files": cursor.total(),
                    }),
                );
                return Ok(MergeOutcome::yielded(marker));
            }
            MergeStep::Finalize => {
                let payload_bytes = finalize(store, config, request)?;
                log_merge_info(
                    "merge_finalized",
                    json!({
                        "final_key": request.final_key.clone(),
                        "files_merged": cursor.total(),
                        "payload_bytes": payload_bytes,
                    }),
                );
                return Ok(MergeOutcome::done());
            }
        }
    }
}

/// Resolves the caller's file source into a concrete ordered key list. A
/// manifest reference is read from the scratch bucket and must hold a JSON
/// array of keys; any read or parse failure fails the job before a single
/// append is attempted.
fn resolve_file_list(
    store: &impl ObjectStore,
    scratch_bucket: &str,
    source: &FileSource,
) -> Result<Vec<String>, MergeHandlerError> {
    match source {
        FileSource::Inline(keys) => Ok(keys.clone()),
        FileSource::Manifest(reference) => {
            let body = store.read_object(scratch_bucket, reference).map_err(|error| {
                MergeHandlerError::new(format!(
                    "Failed to read file manifest '{reference}': {error}"
                ))
            })?;
            serde_json::from_slice::<Vec<String>>(&body).map_err(|error| {
                MergeHandlerError::new(format!("Malformed file manifest '{reference}': {error}"))
            })
        }
    }
}

fn eligible_files(
    request: &NormalizedMergeRequest,
    config: &MergeHandlerConfig,
    resolved: &[String],
) -> Vec<String> {
    let mut eligible = Vec::with_capacity(resolved.len());
    for file_key in resolved {
        if is_eligible(
            file_key,
            request.log_type.as_deref(),
            &config.aggregation_regions,
        ) {
            eligible.push(file_key.clone());
        } else {
            log_merge_info(
                "file_skipped",
                json!({
                    "final_key": request.final_key.clone(),
                    "file_key": file_key.clone(),
                    "log_type": request.log_type.clone(),
                }),
            );
        }
    }
    eligible
}

/// Seeds the scratch object with the filler block. Only a fresh job does
/// this; a resumed job's scratch object already carries committed appends.
fn init_padding(
    store: &impl ObjectStore,
    config: &MergeHandlerConfig,
    final_key: &str,
) -> Result<(), MergeHandlerError> {
    store
        .put_object(&config.scratch_bucket, final_key, filler_block())
        .map_err(|error| {
            MergeHandlerError::new(format!("Failed to initialize padding block: {error}"))
        })?;
    log_merge_info(
        "padding_initialized",
        json!({
            "scratch_bucket": config.scratch_bucket.clone(),
            "final_key": final_key,
            "filler_bytes": FILLER_LEN,
        }),
    );
    Ok(())
}

/// Grows the scratch object by one file through a two-part server-side
/// copy: part 1 is the current scratch object, part 2 is the candidate
/// file. Commits atomically or leaves the prior scratch object intact.
fn append_file(
    store: &impl ObjectStore,
    config: &MergeHandlerConfig,
    request: &NormalizedMergeRequest,
    file_key: &str,
) -> Result<(), MergeHandlerError> {
    let destination = CopyDestination {
        bucket: config.scratch_bucket.clone(),
        key: request.final_key.clone(),
        storage_class: None,
    };
    let parts = [
        CopyPart::whole(&config.scratch_bucket, &request.final_key),
        CopyPart::whole(&request.source_bucket, file_key),
    ];
    store.compose_object(&destination, &parts).map_err(|error| {
        MergeHandlerError::new(format!(
            "Failed to append '{file_key}' to scratch object: {error}"
        ))
    })
}

/// Publishes the de-padded payload to the destination bucket, then retires
/// the scratch object. Publish strictly precedes the delete. Returns the
/// payload length in bytes.
fn finalize(
    store: &impl ObjectStore,
    config: &MergeHandlerConfig,
    request: &NormalizedMergeRequest,
) -> Result<u64, MergeHandlerError> {
    let dest_bucket = request
        .dest_bucket
        .clone()
        .or_else(|| config.dest_bucket.clone())
        .unwrap_or_else(|| request.source_bucket.clone());

    let total_bytes = store
        .object_length(&config.scratch_bucket, &request.final_key)
        .map_err(|error| {
            MergeHandlerError::new(format!("Failed to read scratch object length: {error}"))
        })?;
    let range = payload_range(total_bytes, FILLER_LEN)
        .map_err(|error| MergeHandlerError::new(error.message().to_string()))?;

    match range {
        Some(range) => {
            let destination = CopyDestination {
                bucket: dest_bucket.clone(),
                key: request.final_key.clone(),
                storage_class: Some(config.storage_class.clone()),
            };
            let parts = [CopyPart::ranged(
                &config.scratch_bucket,
                &request.final_key,
                range,
            )];
            store.compose_object(&destination, &parts).map_err(|error| {
                MergeHandlerError::new(format!(
                    "Failed to publish merged object to '{dest_bucket}': {error}"
                ))
            })?;
        }
        // Filler-only scratch: every input was filtered out (or the list
        // was all-filtered). Publish an empty object rather than failing.
        None => {
            store
                .put_object(&dest_bucket, &request.final_key, &[])
                .map_err(|error| {
                    MergeHandlerError::new(format!(
                        "Failed to publish empty merged object to '{dest_bucket}': {error}"
                    ))
                })?;
        }
    }

    store
        .delete_object(&config.scratch_bucket, &request.final_key)
        .map_err(|error| {
            MergeHandlerError::new(format!("Failed to delete scratch object: {error}"))
        })?;

    Ok(range.map_or(0, |range| range.byte_count()))
}

fn log_merge_info(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "merge_handler",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

fn log_merge_error(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "merge_handler",
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}
