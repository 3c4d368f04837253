// CLI document commands: submit, status, list, watch, ping, test-callback

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde_json::Value;

use super::{base_url, connection_error_message, parse_form_fields, poll_interval};
use crate::daemon;
use crate::models::{DocumentStatus, SubmitRequest};
use crate::poller::{status_url, ClientPoller, HttpStatusSource, Notification};

/// Upper bound for any single CLI request to the relay.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Helper to handle reqwest errors and produce a user-friendly connection error.
fn handle_request_error(err: reqwest::Error, host: &str, port: u16) -> anyhow::Error {
    if err.is_connect() || err.is_timeout() {
        anyhow::anyhow!("{}", connection_error_message(host, port))
    } else {
        anyhow::anyhow!("Request failed: {}", err)
    }
}

fn client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Read the JSON body of a relay response, turning `success: false` into an error.
async fn read_body(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() || body["success"] == Value::Bool(false) {
        let message = body["error"].as_str().unwrap_or("Unknown error");
        match body.get("details") {
            Some(details) => anyhow::bail!("{} ({})", message, details),
            None => anyhow::bail!("{}", message),
        }
    }
    Ok(body)
}

/// One-line summary of a document for terminal output.
pub fn describe(status: &DocumentStatus) -> String {
    let mut line = format!("{}  {}", status.job_id, status.status);
    if let Some(link) = &status.primary_artifact_link {
        line.push_str(&format!("\n  main: {}", link));
    }
    if let Some(link) = &status.secondary_artifact_link {
        line.push_str(&format!("\n  nota: {}", link));
    }
    if let Some(error) = &status.error {
        line.push_str(&format!("\n  error: {}", error));
    }
    line
}

fn build_form_data(fields: &[String], form_json: Option<&Path>) -> anyhow::Result<Value> {
    let mut form = match form_json {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str::<Value>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
            {
                Value::Object(map) => map,
                _ => anyhow::bail!("{} must contain a JSON object", path.display()),
            }
        }
        None => serde_json::Map::new(),
    };
    form.extend(parse_form_fields(fields).map_err(|e| anyhow::anyhow!(e))?);
    Ok(Value::Object(form))
}

/// bmn-docgen submit
#[allow(clippy::too_many_arguments)]
pub async fn cmd_submit(
    host: &str,
    port: u16,
    category: Option<&str>,
    job_id: Option<&str>,
    fields: &[String],
    form_json: Option<&Path>,
    wait: bool,
    interval_ms: Option<u64>,
) -> anyhow::Result<()> {
    let request = SubmitRequest {
        job_id: job_id.map(|s| s.to_string()),
        category: category.map(|s| s.to_string()),
        form_data: build_form_data(fields, form_json)?,
    };

    let url = format!("{}/api/webhook/send", base_url(host, port));
    let response = client()?
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_body(response).await?;

    let job_id = body["jobId"].as_str().unwrap_or("unknown").to_string();
    println!("Job '{}' submitted, document is being generated.", job_id);

    if wait {
        let interval = poll_interval(interval_ms, || daemon::load_config(None))?;
        watch_jobs(host, port, &[job_id], interval).await?;
    }
    Ok(())
}

/// bmn-docgen status
pub async fn cmd_status(host: &str, port: u16, job: &str) -> anyhow::Result<()> {
    let url = status_url(&base_url(host, port), job)?;
    let response = client()?
        .get(url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_body(response).await?;

    let status: DocumentStatus =
        serde_json::from_value(body).context("Unexpected status response")?;
    println!("{}", describe(&status));
    Ok(())
}

/// bmn-docgen list
pub async fn cmd_list(host: &str, port: u16, json: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/webhook/callback", base_url(host, port));
    let response = client()?
        .get(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_body(response).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body["documents"])?);
        return Ok(());
    }

    let documents: Vec<DocumentStatus> = serde_json::from_value(body["documents"].clone())
        .context("Unexpected document list response")?;
    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in &documents {
        println!("{}", describe(doc));
    }
    println!("{} document(s)", documents.len());
    Ok(())
}

/// bmn-docgen watch
pub async fn cmd_watch(
    host: &str,
    port: u16,
    jobs: &[String],
    interval: Duration,
) -> anyhow::Result<()> {
    watch_jobs(host, port, jobs, interval).await
}

/// Each id once; the poller notifies once per distinct id.
fn unique_jobs(jobs: &[String]) -> BTreeSet<&str> {
    jobs.iter().map(String::as_str).collect()
}

/// Poll `jobs` until each reaches a terminal state, printing one line per
/// notification. Ctrl+C stops early.
async fn watch_jobs(
    host: &str,
    port: u16,
    jobs: &[String],
    interval: Duration,
) -> anyhow::Result<()> {
    let jobs = unique_jobs(jobs);
    let source = HttpStatusSource::new(&base_url(host, port), REQUEST_TIMEOUT)?;
    let mut poller = ClientPoller::spawn(Arc::new(source), interval);
    for job in &jobs {
        poller.track(*job);
    }

    let mut remaining = jobs.len();
    let mut failures = 0;
    while remaining > 0 {
        let notification = tokio::select! {
            n = poller.next_notification() => n,
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped watching, {} job(s) still processing.", remaining);
                break;
            }
        };
        let Some(notification) = notification else {
            anyhow::bail!("Poller stopped with {} job(s) still processing", remaining);
        };

        match &notification {
            Notification::Completed(status) => {
                println!("Document ready: {}", describe(status));
            }
            Notification::Failed(status) => {
                failures += 1;
                println!("Document failed: {}", describe(status));
            }
        }
        remaining -= 1;
    }

    poller.shutdown().await;
    if failures > 0 {
        anyhow::bail!("{} document(s) failed", failures);
    }
    Ok(())
}

/// bmn-docgen ping
pub async fn cmd_ping(host: &str, port: u16) -> anyhow::Result<()> {
    let url = format!("{}/api/webhook/test", base_url(host, port));
    let response = client()?
        .post(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_body(response).await?;

    println!("Pipeline responded: {}", body["pipelineResponse"].as_str().unwrap_or(""));
    Ok(())
}

/// bmn-docgen test-callback
pub async fn cmd_test_callback(host: &str, port: u16, job: Option<&str>) -> anyhow::Result<()> {
    let url = format!("{}/api/test-callback", base_url(host, port));
    let response = client()?
        .post(&url)
        .json(&serde_json::json!({ "jobId": job }))
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_body(response).await?;

    let status: DocumentStatus =
        serde_json::from_value(body).context("Unexpected callback response")?;
    println!("Simulated callback applied: {}", describe(&status));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use tempfile::TempDir;

    #[test]
    fn test_describe_completed_document() {
        let mut status = DocumentStatus::pending("psp_482913");
        status.status = JobStatus::Completed;
        status.primary_artifact_link = Some("https://example/DOC123".to_string());
        let text = describe(&status);
        assert!(text.starts_with("psp_482913  completed"));
        assert!(text.contains("main: https://example/DOC123"));
        assert!(!text.contains("nota:"));
    }

    #[test]
    fn test_describe_failed_document() {
        let mut status = DocumentStatus::pending("x1");
        status.status = JobStatus::Error;
        status.error = Some("pipeline timeout".to_string());
        assert!(describe(&status).contains("error: pipeline timeout"));
    }

    #[test]
    fn test_unique_jobs_drops_duplicates() {
        let jobs: Vec<String> = ["b", "a", "b", "a", "c"].iter().map(|s| s.to_string()).collect();
        let unique: Vec<&str> = unique_jobs(&jobs).into_iter().collect();
        assert_eq!(unique, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_watch_with_duplicate_ids_finishes() {
        use crate::daemon::callback::CallbackReceiver;
        use crate::models::CallbackPayload;
        use crate::server::create_router;
        use crate::storage::InMemoryStatusStore;

        let store = Arc::new(InMemoryStatusStore::new());
        CallbackReceiver::new(store.clone(), JobStatus::Completed)
            .receive(CallbackPayload {
                job_id: Some("dup".to_string()),
                primary_artifact_id: Some("DOC".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let state = Arc::new(crate::server::AppState::new(
            Arc::new(crate::models::RelayConfig::default()),
            store,
            Arc::new(crate::pipeline::HttpPipelineTransport::new(Duration::from_secs(1)).unwrap()),
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });

        let jobs = vec!["dup".to_string(), "dup".to_string()];
        tokio::time::timeout(
            Duration::from_secs(5),
            watch_jobs("127.0.0.1", port, &jobs, Duration::from_millis(20)),
        )
        .await
        .expect("watch should finish once the only distinct job completes")
        .unwrap();
    }

    #[test]
    fn test_build_form_data_merges_fields_over_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("form.json");
        std::fs::write(&path, r#"{"satker": "old", "hal": "PSP"}"#).unwrap();

        let form = build_form_data(&["satker=KPKNL".to_string()], Some(&path)).unwrap();
        assert_eq!(form["satker"], "KPKNL");
        assert_eq!(form["hal"], "PSP");
    }

    #[test]
    fn test_build_form_data_rejects_non_object_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("form.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(build_form_data(&[], Some(&path)).is_err());
    }
}
