//! `restkit batch` command implementation.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use restkit_core::{
    BatchEntry, BatchExecutor, BatchOperation, BatchReport, CacheKey, CacheManager, Config,
};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::settings;

const LABEL: &str = "batch_get";

/// Arguments for the `batch` command.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// API base URL (e.g., "https://api.example.com").
    pub base_url: String,

    /// Paths to GET, relative to the base URL.
    #[arg(required = true, num_args = 1..)]
    pub paths: Vec<String>,

    /// Bearer token. Falls back to `RESTKIT_TOKEN`.
    #[arg(long)]
    pub token: Option<String>,

    /// Exit with an error if any path fails.
    #[arg(long)]
    pub strict: bool,
}

/// Output of one batch run.
#[derive(Debug, Serialize)]
pub struct BatchOutput {
    pub report: BatchReport,
    /// Response bodies in input order; `null` where the path failed.
    pub results: Vec<PathOutcome>,
}

#[derive(Debug, Serialize)]
pub struct PathOutcome {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn run(args: &BatchArgs, config: &Config) -> Result<()> {
    eprintln!(
        "{} Fetching {} paths from {}",
        style("→").cyan(),
        args.paths.len(),
        style(&args.base_url).bold()
    );

    let output = execute(args, config).await?;
    let report = &output.report;

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed to render batch output")?
    );

    if report.is_complete() {
        eprintln!(
            "{} {}/{} succeeded",
            style("✓").green().bold(),
            report.succeeded,
            report.total
        );
    } else {
        eprintln!(
            "{} {}/{} succeeded, {} failed",
            style("⚠").yellow(),
            report.succeeded,
            report.total,
            report.failed.len()
        );
        if args.strict {
            anyhow::bail!("{} of {} paths failed", report.failed.len(), report.total);
        }
    }
    Ok(())
}

pub async fn execute(args: &BatchArgs, config: &Config) -> Result<BatchOutput> {
    let token = settings::resolve_token(args.token.as_deref());
    let transport = settings::build_transport(&args.base_url, token, config)?;
    let executor =
        BatchExecutor::from_config(&config.batch).context("invalid batch configuration")?;
    let cache = CacheManager::from_config(&config.cache);

    let ops = args
        .paths
        .iter()
        .map(|path| {
            let transport = &transport;
            let cache = &cache;
            BatchOperation::new(path.clone(), move || async move {
                let key = CacheKey::new("path", path);
                cache
                    .get_or_fetch(&key, || transport.get::<JsonValue>(path, &[]))
                    .await
            })
        })
        .collect();

    let result = executor
        .execute_parallel(ops, LABEL)
        .await
        .context("batch rejected")?;
    let report = result.report(LABEL);

    let results = result
        .into_entries()
        .into_iter()
        .map(|entry| match entry {
            BatchEntry::Fulfilled { key, value, .. } => PathOutcome {
                path: key,
                body: Some(value),
                error: None,
            },
            BatchEntry::Rejected { key, reason, .. } => PathOutcome {
                path: key,
                body: None,
                error: Some(reason.to_string()),
            },
        })
        .collect();

    Ok(BatchOutput { report, results })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    fn args(server: &MockServer, paths: &[&str]) -> BatchArgs {
        BatchArgs {
            base_url: server.uri(),
            paths: paths.iter().map(|p| (*p).to_string()).collect(),
            token: None,
            strict: false,
        }
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.retry.min_delay_ms = 1;
        config.retry.max_delay_ms = 5;
        config
    }

    #[tokio::test]
    async fn test_execute_keeps_input_order_and_reports_failures() {
        let server = MockServer::start().await;
        for id in [1, 3] {
            Mock::given(method("GET"))
                .and(path(format!("/items/{id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id })))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/items/2"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "nope"})))
            .expect(1)
            .mount(&server)
            .await;

        let output = execute(
            &args(&server, &["/items/1", "/items/2", "/items/3"]),
            &fast_config(),
        )
        .await
        .unwrap();

        assert_eq!(output.report.total, 3);
        assert_eq!(output.report.succeeded, 2);
        assert_eq!(output.report.failed[0].key, "/items/2");
        assert_eq!(output.report.failed[0].status, Some(403));

        let paths = output
            .results
            .iter()
            .map(|r| r.path.as_str())
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["/items/1", "/items/2", "/items/3"]);
        assert_eq!(output.results[0].body, Some(json!({"id": 1})));
        assert!(output.results[1].body.is_none());
        assert!(output.results[1].error.as_deref().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_execute_rejects_oversized_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = fast_config();
        config.batch.max_batch_size = 1;

        let err = execute(&args(&server, &["/a", "/b"]), &config)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("maximum batch size"));
    }

    #[tokio::test]
    async fn test_execute_serves_duplicate_paths_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = fast_config();
        config.cache.enabled = true;
        config.batch.max_concurrent_requests = 1;

        let output = execute(&args(&server, &["/items/5", "/items/5"]), &config)
            .await
            .unwrap();

        assert!(output.report.is_complete());
        assert_eq!(output.results[1].body, Some(json!({"id": 5})));
    }
}
