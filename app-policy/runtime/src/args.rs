use crate::{sync, Runtime};
use anyhow::{bail, Result};
use app_policy_store::EndpointMode;
use clap::Parser;
use std::str::FromStr;
use tokio::io::BufReader;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(name = "app-policy", about = "An application-layer policy checker")]
pub struct Args {
    #[clap(long, default_value = "app_policy=info,warn", env = "APP_POLICY_LOG")]
    log_level: String,

    #[clap(long, default_value = "plain")]
    log_format: LogFormat,

    /// Whether the checker fronts a single workload or every workload on the
    /// node.
    #[clap(long, default_value = "single", env = "APP_POLICY_ENDPOINT_MODE")]
    endpoint_mode: EndpointMode,

    /// Stores staged policies instead of discarding them. Staged policies are
    /// never enforced.
    #[clap(long)]
    store_staged: bool,

    /// The number of statistics samples to buffer before samples are dropped.
    #[clap(long, default_value = "1024")]
    stats_capacity: usize,

    /// The number of control feed events to buffer.
    #[clap(long, default_value = "256")]
    update_capacity: usize,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

// === impl Args ===

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    /// Runs the checker, reading control feed updates as JSON lines from
    /// stdin until interrupted.
    pub async fn run(self) -> Result<()> {
        init_tracing(&self.log_level, self.log_format)?;

        let Runtime {
            manager,
            checker,
            events,
            mut stats,
            registry,
        } = self.build()?;
        info!(
            mode = %manager.mode(),
            providers = ?checker.providers().collect::<Vec<_>>(),
            "Starting"
        );

        let feed = events.clone();
        tokio::spawn(
            async move {
                let stdin = BufReader::new(tokio::io::stdin());
                if let Err(error) = sync::read_updates(stdin, feed).await {
                    tracing::error!(%error, "Failed to read control feed");
                }
            }
            .instrument(info_span!("feed")),
        );

        // The statistics aggregator lives outside of this process; samples are
        // only logged here.
        tokio::spawn(
            async move {
                while let Some(sample) = stats.recv().await {
                    tracing::debug!(?sample.tuple, sample.allowed, sample.denied, "Statistics");
                }
            }
            .instrument(info_span!("stats")),
        );

        if tokio::signal::ctrl_c().await.is_err() {
            bail!("Failed to register signal handler");
        }
        info!("Shutting down");

        let mut metrics = String::new();
        prometheus_client::encoding::text::encode(&mut metrics, &registry)?;
        tracing::debug!(%metrics, "Final metrics");
        drop(events);
        Ok(())
    }

    /// Builds the store, the checker and the control feed task without
    /// touching process-wide state.
    pub fn build(self) -> Result<Runtime> {
        if self.update_capacity == 0 || self.stats_capacity == 0 {
            bail!("channel capacities must be positive");
        }
        Ok(Runtime::spawn(
            self.endpoint_mode,
            self.store_staged,
            self.update_capacity,
            self.stats_capacity,
        ))
    }
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|error| anyhow::anyhow!("failed to initialize tracing: {error}"))
}

// === impl LogFormat ===

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            _ => bail!("invalid log format: {s}"),
        }
    }
}
