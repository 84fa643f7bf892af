//! Client session shared by the network commands: credentials, retry policy,
//! progress printing.

use anyhow::Result;
use assetsync_core::config::ClientConfig;
use assetsync_core::model::{AssetId, AssetRef};
use assetsync_core::retry::{run_with_retry, RetryPolicy};
use assetsync_core::transfer::{Transfer, TransferProgress};
use assetsync_core::transport::{CredentialProvider, NoCredentials, StaticToken};
use assetsync_core::AssetClient;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

const PROGRESS_INTERVAL_MS: u64 = 500;

pub struct Session {
    client: AssetClient,
    retry: RetryPolicy,
}

impl Session {
    pub fn open(cfg: &ClientConfig, token: Option<&str>, retries: Option<u32>) -> Result<Self> {
        let credentials: Arc<dyn CredentialProvider> = match token {
            Some(token) => Arc::new(StaticToken::new(token)),
            None => Arc::new(NoCredentials),
        };
        let client = AssetClient::from_config(cfg, credentials)?;
        let mut retry = RetryPolicy::from(&cfg.retry_or_default());
        if let Some(n) = retries {
            retry = retry.with_max_attempts(n.saturating_add(1));
        }
        Ok(Self { client, retry })
    }

    /// Submit with `submit` and wait for the outcome, re-submitting
    /// transient failures per the retry policy.
    pub async fn run<T, F>(&self, label: &str, submit: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut(&AssetClient) -> assetsync_core::Result<Transfer<T>>,
    {
        self.run_with(&self.retry, label, submit).await
    }

    /// Like [`Session::run`] but never re-submits. For requests that are not
    /// idempotent (create, delete, generate).
    pub async fn run_once<T, F>(&self, label: &str, submit: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut(&AssetClient) -> assetsync_core::Result<Transfer<T>>,
    {
        self.run_with(&RetryPolicy::none(), label, submit).await
    }

    async fn run_with<T, F>(&self, policy: &RetryPolicy, label: &str, mut submit: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut(&AssetClient) -> assetsync_core::Result<Transfer<T>>,
    {
        let value = run_with_retry(policy, |attempt| {
            let submitted = submit(&self.client);
            let label = label.to_string();
            async move {
                let transfer = submitted?;
                tracing::debug!(transfer = %transfer.handle().id(), attempt, "{label} submitted");
                let printer = tokio::spawn(print_progress(label, transfer.progress()));
                let outcome = transfer.await;
                let _ = printer.await;
                outcome.into_result()
            }
        })
        .await?;
        Ok(value)
    }

    /// Refresh `id` so transfers that need a local snapshot can run.
    pub async fn fetch(&self, id: &AssetId) -> Result<AssetRef> {
        self.run("refresh", |c| c.refresh(id)).await
    }

    pub async fn close(self) {
        self.client.shutdown().await;
    }
}

pub fn print_asset(asset: &AssetRef) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(asset)?);
    Ok(())
}

/// Print progress to stderr until the transfer's progress channel closes.
async fn print_progress(label: String, mut rx: watch::Receiver<TransferProgress>) {
    let mut last_print: Option<Instant> = None;
    while rx.changed().await.is_ok() {
        let stats = *rx.borrow_and_update();
        let now = Instant::now();
        let due = last_print
            .map(|t| now.duration_since(t).as_millis() as u64 >= PROGRESS_INTERVAL_MS)
            .unwrap_or(true);
        if !due && stats.bytes_done < stats.total_bytes {
            continue;
        }
        let eta = stats
            .eta_secs()
            .map(|s| format!("{:.0}s", s))
            .unwrap_or_else(|| "?".to_string());
        eprint!(
            "\r  {}: {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}  ",
            label,
            stats.bytes_done as f64 / 1_048_576.0,
            stats.total_bytes as f64 / 1_048_576.0,
            stats.fraction() * 100.0,
            stats.bytes_per_sec() / 1_048_576.0,
            eta
        );
        last_print = Some(now);
    }
    if last_print.is_some() {
        eprintln!();
    }
}
