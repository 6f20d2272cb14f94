use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use prospect_client::{
    HtmdCleaner, LeadScorer, LeadVerifier, ReqwestFetcher, SourceEndpoints, build_workers,
};
use prospect_core::config::PipelineConfig;
use prospect_core::export::export_csv;
use prospect_core::identity::{IdentityPool, ProxyConfig};
use prospect_core::progress::TracingReporter;
use prospect_core::{DiscoveryService, EnrichedLead, EnrichmentService, LeadPipeline};

#[derive(Parser)]
#[command(name = "prospect", version, about = "Lead discovery and enrichment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and enrich leads for a niche/location query
    Scan {
        /// Free-text query, e.g. "dental clinics in Austin, TX"
        query: String,

        /// Maximum number of leads
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Leads enriched concurrently (overrides PROSPECT_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Outbound proxy URL, repeatable (added to PROSPECT_PROXIES)
        #[arg(long = "proxy")]
        proxies: Vec<String>,

        /// Scorer API key; without one the offline heuristic scorer is used
        #[arg(long, env = "PROSPECT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Scorer model (e.g., "gpt-4o-mini", "gemini-2.5-flash")
        #[arg(long, env = "PROSPECT_MODEL", default_value = "gpt-4o-mini")]
        model: String,

        /// OpenAI-compatible API base URL
        #[arg(long, env = "PROSPECT_BASE_URL")]
        base_url: Option<String>,

        /// Email verification service base URL; verification is skipped if unset
        #[arg(long, env = "PROSPECT_VERIFIER_URL")]
        verifier_url: Option<String>,

        /// Email verification service API key
        #[arg(long, env = "PROSPECT_VERIFIER_KEY", hide_env_values = true)]
        verifier_key: Option<String>,

        /// Stop enriching after this many seconds and return what is done
        /// (overrides PROSPECT_SCAN_DEADLINE_SECS)
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Allow fetching private/reserved addresses
        #[arg(long, default_value_t = false)]
        allow_private: bool,
    },

    /// Convert a JSON lead dump into CSV
    Export {
        /// JSON file written by `scan --format json`
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

struct ScanArgs {
    query: String,
    limit: usize,
    output: Option<PathBuf>,
    format: OutputFormat,
    concurrency: Option<usize>,
    proxies: Vec<String>,
    api_key: Option<String>,
    model: String,
    base_url: Option<String>,
    verifier_url: Option<String>,
    verifier_key: Option<String>,
    deadline_secs: Option<u64>,
    allow_private: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("prospect=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            query,
            limit,
            output,
            format,
            concurrency,
            proxies,
            api_key,
            model,
            base_url,
            verifier_url,
            verifier_key,
            deadline_secs,
            allow_private,
        } => {
            cmd_scan(ScanArgs {
                query,
                limit,
                output,
                format,
                concurrency,
                proxies,
                api_key,
                model,
                base_url,
                verifier_url,
                verifier_key,
                deadline_secs,
                allow_private,
            })
            .await?;
        }
        Commands::Export { input, output } => cmd_export(&input, output.as_deref())?,
    }

    Ok(())
}

/// Environment configuration with command-line overrides applied.
fn pipeline_config(args: &ScanArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env().context("Invalid PROSPECT_* configuration")?;
    if let Some(concurrency) = args.concurrency {
        anyhow::ensure!(concurrency > 0, "--concurrency must be at least 1");
        config.enrich.concurrency = concurrency;
    }
    for proxy in &args.proxies {
        config
            .proxies
            .push(ProxyConfig::parse(proxy).with_context(|| format!("Invalid --proxy {proxy}"))?);
    }
    if let Some(secs) = args.deadline_secs {
        config.scan.deadline = Some(Duration::from_secs(secs));
    }
    Ok(config)
}

async fn cmd_scan(args: ScanArgs) -> Result<()> {
    let config = pipeline_config(&args)?;
    let endpoints = SourceEndpoints::from_lookup(|key| std::env::var(key).ok())
        .context("Invalid PROSPECT_ENDPOINT_BASE")?;

    let identities = Arc::new(IdentityPool::builtin().with_proxies(config.proxies.clone()));
    let mut fetcher = ReqwestFetcher::new(identities).context("Failed to create HTTP client")?;
    if args.allow_private {
        fetcher = fetcher.allow_private_urls();
    } else if let Some(host) = endpoints.mirror_host() {
        fetcher = fetcher.allow_host(&host);
    }

    let scorer = LeadScorer::from_options(
        args.api_key.as_deref(),
        &args.model,
        args.base_url.as_deref(),
    )
    .context("Failed to create scorer")?;
    let verifier =
        LeadVerifier::from_options(args.verifier_url.as_deref(), args.verifier_key.as_deref())
            .context("Failed to create email verifier")?;

    let verification = match verifier {
        LeadVerifier::Http(_) => "http",
        LeadVerifier::Disabled(_) => "disabled",
    };
    tracing::info!(
        scorer = %scorer.describe(),
        verifier = verification,
        proxies = config.proxies.len(),
        concurrency = config.enrich.concurrency,
        "Starting scan"
    );

    let discovery = DiscoveryService::new(
        build_workers(fetcher.clone(), &endpoints, &config.social),
        config.retry.clone(),
    );
    let enrichment = EnrichmentService::new(
        fetcher,
        HtmdCleaner::new(),
        verifier,
        scorer,
        config.enrich.clone(),
    );
    let pipeline = Arc::new(LeadPipeline::new(discovery, enrichment, config.scan.clone()));

    let handle = pipeline
        .scan(&args.query, args.limit, Arc::new(TracingReporter))
        .context("Invalid query")?;

    let token = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing with the leads gathered so far");
            token.cancel();
        }
    });

    let leads = handle.wait().await.context("Scan failed")?;
    let hot = leads.iter().filter(|l| l.temperature() == "Hot").count();
    let with_email = leads.iter().filter(|l| l.email.is_some()).count();
    tracing::info!(leads = leads.len(), with_email, hot, "Scan finished");

    let bytes = match args.format {
        OutputFormat::Csv => export_csv(&leads).context("Failed to encode CSV")?,
        OutputFormat::Json => serde_json::to_vec_pretty(&leads)?,
    };
    write_output(args.output.as_deref(), &bytes)
}

fn cmd_export(input: &Path, output: Option<&Path>) -> Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let leads: Vec<EnrichedLead> = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a JSON lead list", input.display()))?;

    let bytes = export_csv(&leads).context("Failed to encode CSV")?;
    write_output(output, &bytes)?;
    tracing::info!(leads = leads.len(), "Exported");
    Ok(())
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scan_arguments() {
        let cli = Cli::try_parse_from([
            "prospect",
            "scan",
            "dental clinics in Austin, TX",
            "--limit",
            "10",
            "--format",
            "json",
            "--proxy",
            "http://10.0.0.1:8080",
            "--proxy",
            "socks5://10.0.0.2:1080",
            "--deadline-secs",
            "120",
        ])
        .unwrap();

        let Commands::Scan {
            query,
            limit,
            format,
            proxies,
            deadline_secs,
            allow_private,
            ..
        } = cli.command
        else {
            panic!("expected scan");
        };
        assert_eq!(query, "dental clinics in Austin, TX");
        assert_eq!(limit, 10);
        assert_eq!(format, OutputFormat::Json);
        assert_eq!(proxies.len(), 2);
        assert_eq!(deadline_secs, Some(120));
        assert!(!allow_private);
    }

    #[test]
    fn export_requires_input() {
        assert!(Cli::try_parse_from(["prospect", "export"]).is_err());
        assert!(Cli::try_parse_from(["prospect", "export", "--input", "leads.json"]).is_ok());
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(Cli::try_parse_from(["prospect", "scan", "yoga", "--format", "xml"]).is_err());
    }
}
