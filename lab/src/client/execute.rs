//! Backend calls: synchronous execution, job submission and polling, and the
//! best-effort fetches that feed a case (script text, datasets).

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::types::{error_message, strip_job_id, ExecuteRequest, SubmitRequest};
use super::Transport;
use crate::binding::{reconcile_buckets, reconcile_flat, reconcile_to_save};
use crate::config::{ClusterType, ExecutionContext, ExecutionMode, PollPolicy};
use crate::error::{ClientError, ClientResult};
use crate::models::{Bindings, JobHandle, Outcome};

/// Answer to a job submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The backend accepted the job.
    Accepted(JobHandle),
    /// The backend refused it.
    Rejected(String),
}

/// State of a job as seen by one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// Still running (202 or 204).
    Pending,
    /// Finished; the body is the result.
    Done(Value),
    /// The backend reported a failure.
    Failed(String),
}

/// Run a script synchronously against `context`.
///
/// A body carrying `error` becomes [`Outcome::Failure`]; transport failures
/// and undecodable bodies are returned as `Err`.
pub async fn execute_sync(
    transport: &dyn Transport,
    context: ExecutionContext,
    script: &str,
    bindings: &Bindings,
    to_save: &Map<String, Value>,
) -> ClientResult<Outcome> {
    let request = ExecuteRequest {
        vtl_script: script.to_string(),
        bindings: reconcile_flat(bindings),
        to_save: reconcile_to_save(to_save),
    };
    info!(context = %context, bindings = request.bindings.len(), "executing script");

    let reply = transport.post_json(context.path(), &serde_json::to_value(&request)?).await?;
    let body = reply.parse_json()?;

    if let Some(message) = error_message(&body) {
        return Ok(Outcome::Failure(message));
    }
    if !reply.is_success() {
        return Ok(Outcome::Failure(format!("HTTP {}: {}", reply.status, reply.body)));
    }
    Ok(Outcome::Success(body))
}

/// Submit a script as a distributed job.
pub async fn submit_job(
    transport: &dyn Transport,
    mode: ExecutionMode,
    cluster: ClusterType,
    script: &str,
    bindings: &Bindings,
) -> ClientResult<Submission> {
    let request = SubmitRequest {
        vtl_script: script.to_string(),
        to_save: Map::new(),
        buckets: reconcile_buckets(bindings),
    };
    let path = format!("execute?mode={}&type={}", mode.as_str(), cluster.as_str());
    info!(
        %path,
        s3 = request.buckets.s3_for_bindings.len(),
        queries = request.buckets.queries_for_bindings.len(),
        "submitting job"
    );

    let reply = transport.post_json(&path, &serde_json::to_value(&request)?).await?;

    if reply.is_success() {
        return match strip_job_id(&reply.body) {
            Some(handle) => {
                info!(job = %handle, "job accepted");
                Ok(Submission::Accepted(handle))
            }
            None => Ok(Submission::Rejected("backend returned an empty job id".to_string())),
        };
    }

    let message = reply
        .parse_json()
        .ok()
        .and_then(|body| error_message(&body))
        .unwrap_or_else(|| format!("HTTP {}: {}", reply.status, reply.body));
    Ok(Submission::Rejected(message))
}

/// Poll a job once.
pub async fn poll_job(transport: &dyn Transport, handle: &JobHandle) -> ClientResult<PollStatus> {
    let reply = transport.get(&format!("job/{}/bindings", handle)).await?;

    match reply.status {
        202 | 204 => Ok(PollStatus::Pending),
        _ if reply.is_success() => Ok(PollStatus::Done(reply.parse_json()?)),
        status => {
            let message = reply
                .parse_json()
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or_else(|| format!("HTTP {}: {}", status, reply.body));
            Ok(PollStatus::Failed(message))
        }
    }
}

/// Poll a job until it answers, following `policy`.
///
/// Every failure ends polling and becomes [`Outcome::Failure`].
pub async fn poll_until_done(
    transport: &dyn Transport,
    handle: &JobHandle,
    policy: &PollPolicy,
) -> Outcome {
    let mut attempts = 0u32;
    loop {
        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            let message = format!("job {} did not complete after {} polls", handle, attempts);
            return Outcome::Failure(message);
        }
        tokio::time::sleep(policy.next_delay()).await;
        attempts += 1;

        match poll_job(transport, handle).await {
            Ok(PollStatus::Pending) => debug!(job = %handle, attempts, "job still running"),
            Ok(PollStatus::Done(result)) => return Outcome::Success(result),
            Ok(PollStatus::Failed(message)) => return Outcome::Failure(message),
            Err(e) => return Outcome::Failure(e.to_string()),
        }
    }
}

/// Fetch the initial script text. Missing URL or any failure yields `""`.
pub async fn fetch_script(transport: &dyn Transport, url: Option<&str>) -> String {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return String::new();
    };
    match transport.get(url).await.and_then(|r| r.error_for_status()) {
        Ok(reply) => reply.body,
        Err(e) => {
            warn!(%url, error = %e, "script fetch failed, starting empty");
            String::new()
        }
    }
}

/// Fetch a JSON document, failing on non-success statuses.
pub async fn fetch_json(transport: &dyn Transport, url: &str) -> ClientResult<Value> {
    let reply = transport.get(url).await?.error_for_status()?;
    reply.parse_json().map_err(|e| match e {
        ClientError::InvalidJson(err) => {
            ClientError::UnexpectedResponse(format!("{} is not JSON: {}", url, err))
        }
        other => other,
    })
}
