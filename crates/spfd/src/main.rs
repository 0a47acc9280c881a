// # spfd - SPF Flattening Daemon
//
// Thin integration layer around spf-core. All flattening, splitting and
// reconciliation logic lives in the library; this binary only:
//
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Registers providers and resolvers
// 4. Runs the engine once, or on an interval until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Target
// - `SPF_DOMAIN`: Domain whose SPF record is managed (required)
// - `SPF_POLICY_FILE`: File holding the desired SPF record (required)
// - `SPF_SUBDOMAIN_PREFIX`: Prefix of generated sub-records (default `_spf`)
//
// ### DNS Provider
// - `SPF_PROVIDER_TYPE`: Provider type (cloudflare)
// - `SPF_PROVIDER_API_TOKEN`: API token
// - `SPF_PROVIDER_ZONE_ID`: Zone ID (optional)
//
// ### Resolver
// - `SPF_RESOLVER`: system, cloudflare, google or quad9 (default system)
//
// ### Engine
// - `SPF_RUN_MODE`: once or daemon (default once)
// - `SPF_INTERVAL_SECS`: Seconds between cycles in daemon mode (default 3600)
// - `SPF_DRY_RUN`: Log writes instead of performing them (default false)
// - `SPF_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export SPF_DOMAIN=example.com
// export SPF_POLICY_FILE=/etc/spfd/policy.txt
// export SPF_PROVIDER_API_TOKEN=your_token
// export SPF_RUN_MODE=daemon
//
// spfd
// ```

use anyhow::{Context, Result};
use spf_core::{
    EngineConfig, EngineEvent, ProviderConfig, ProviderRegistry, ResolverConfig, SpfConfig,
    SpfEngine, SpfRecord, load_policy_file,
};
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown or successful single run
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy)]
enum SpfExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (update failed)
    RuntimeError = 2,
}

impl From<SpfExitCode> for ExitCode {
    fn from(code: SpfExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Once,
    Daemon,
}

/// Application configuration
struct Config {
    domain: String,
    policy_file: String,
    subdomain_prefix: Option<String>,
    provider_type: String,
    provider_api_token: String,
    provider_zone_id: Option<String>,
    resolver: String,
    run_mode: String,
    interval_secs: Option<u64>,
    dry_run: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            domain: env::var("SPF_DOMAIN").context("SPF_DOMAIN is required")?,
            policy_file: env::var("SPF_POLICY_FILE").context("SPF_POLICY_FILE is required")?,
            subdomain_prefix: env::var("SPF_SUBDOMAIN_PREFIX").ok(),
            provider_type: env::var("SPF_PROVIDER_TYPE")
                .unwrap_or_else(|_| "cloudflare".to_string()),
            provider_api_token: env::var("SPF_PROVIDER_API_TOKEN").unwrap_or_default(),
            provider_zone_id: env::var("SPF_PROVIDER_ZONE_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            resolver: env::var("SPF_RESOLVER").unwrap_or_else(|_| "system".to_string()),
            run_mode: env::var("SPF_RUN_MODE").unwrap_or_else(|_| "once".to_string()),
            interval_secs: env::var("SPF_INTERVAL_SECS")
                .ok()
                .map(|s| {
                    s.parse()
                        .with_context(|| format!("SPF_INTERVAL_SECS is not a number: {}", s))
                })
                .transpose()?,
            dry_run: parse_bool("SPF_DRY_RUN", env::var("SPF_DRY_RUN").ok().as_deref())?,
            log_level: env::var("SPF_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        validate_domain_name(&self.domain).context("SPF_DOMAIN is invalid")?;

        if self.policy_file.is_empty() {
            anyhow::bail!("SPF_POLICY_FILE cannot be empty");
        }

        if self.provider_api_token.is_empty() {
            anyhow::bail!(
                "SPF_PROVIDER_API_TOKEN is required. \
                Set it via: export SPF_PROVIDER_API_TOKEN=your_token"
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.provider_api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "SPF_PROVIDER_API_TOKEN appears to be a placeholder. \
                Use an actual API token from your DNS provider."
            );
        }

        match self.provider_type.as_str() {
            "cloudflare" => {}
            _ => anyhow::bail!(
                "SPF_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: cloudflare",
                self.provider_type
            ),
        }

        self.resolver_config()?;
        self.run_mode()?;

        if let Some(interval) = self.interval_secs
            && !(60..=86400).contains(&interval)
        {
            anyhow::bail!(
                "SPF_INTERVAL_SECS must be between 60 and 86400 seconds. Got: {}",
                interval
            );
        }

        self.log_level()?;

        Ok(())
    }

    fn resolver_config(&self) -> Result<ResolverConfig> {
        Ok(match self.resolver.to_lowercase().as_str() {
            "system" => ResolverConfig::System,
            "cloudflare" => ResolverConfig::Cloudflare,
            "google" => ResolverConfig::Google,
            "quad9" => ResolverConfig::Quad9,
            _ => anyhow::bail!(
                "SPF_RESOLVER '{}' is not supported. \
                Supported resolvers: system, cloudflare, google, quad9",
                self.resolver
            ),
        })
    }

    fn run_mode(&self) -> Result<RunMode> {
        Ok(match self.run_mode.to_lowercase().as_str() {
            "once" => RunMode::Once,
            "daemon" => RunMode::Daemon,
            _ => anyhow::bail!(
                "SPF_RUN_MODE '{}' is not valid. Valid modes: once, daemon",
                self.run_mode
            ),
        })
    }

    fn log_level(&self) -> Result<Level> {
        Ok(match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => anyhow::bail!(
                "SPF_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        })
    }

    /// Build the library configuration
    fn spf_config(&self) -> Result<SpfConfig> {
        let mut engine = EngineConfig {
            dry_run: self.dry_run,
            ..EngineConfig::default()
        };
        if let Some(interval) = self.interval_secs {
            engine.interval_secs = interval;
        }

        let mut config = SpfConfig::new(self.domain.clone()).with_engine(engine);
        if let Some(prefix) = &self.subdomain_prefix {
            config = config.with_subdomain_prefix(prefix.clone());
        }
        config.provider = ProviderConfig::Cloudflare {
            api_token: self.provider_api_token.clone(),
            zone_id: self.provider_zone_id.clone(),
        };
        config.resolver = self.resolver_config()?;

        config.validate()?;
        Ok(config)
    }
}

/// Parse a boolean environment value (unset means false)
fn parse_bool(name: &str, value: Option<&str>) -> Result<bool> {
    match value.map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "0" | "false" | "no" => Ok(false),
            "1" | "true" | "yes" => Ok(true),
            _ => anyhow::bail!("{} must be true or false. Got: {}", name, v),
        },
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; underscores are accepted since SPF records often
/// live under underscore labels.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SpfExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SpfExitCode::ConfigError.into();
    }

    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SpfExitCode::ConfigError.into();
    }

    info!("Starting spfd for {}", config.domain);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SpfExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config)).into()
}

/// Set up the engine and run it in the configured mode
async fn run(config: Config) -> SpfExitCode {
    let (engine, desired, mode) = match setup(&config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return SpfExitCode::ConfigError;
        }
    };

    match mode {
        RunMode::Once => match engine.update(&desired).await {
            Ok(outcome) => {
                info!("Update finished: {:?}", outcome);
                SpfExitCode::CleanShutdown
            }
            Err(e) => {
                error!("Update failed: {}", e);
                SpfExitCode::RuntimeError
            }
        },
        RunMode::Daemon => {
            let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

            let signals = tokio::spawn(async move {
                match wait_for_shutdown().await {
                    Ok(signal) => info!("Received shutdown signal: {}", signal),
                    Err(e) => error!("Signal handling error: {}", e),
                }
                let _ = shutdown_tx.send(());
            });

            let result = engine.run_with_shutdown(&desired, Some(shutdown_rx)).await;
            signals.abort();

            match result {
                Ok(()) => {
                    info!("Shutting down daemon");
                    SpfExitCode::CleanShutdown
                }
                Err(e) => {
                    error!("Daemon error: {}", e);
                    SpfExitCode::RuntimeError
                }
            }
        }
    }
}

/// Build the engine and parse the desired policy
fn setup(config: &Config) -> Result<(SpfEngine, SpfRecord, RunMode)> {
    let spf_config = config.spf_config()?;
    let mode = config.run_mode()?;

    let policy = load_policy_file(&config.policy_file)
        .with_context(|| format!("Failed to load policy file {}", config.policy_file))?;
    let desired = SpfRecord::parse(&policy)
        .with_context(|| format!("Policy file {} is not a valid SPF record", config.policy_file))?;

    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        spf_provider_cloudflare::register(&registry);
    }

    #[cfg(feature = "hickory")]
    {
        info!("Registering hickory resolver");
        spf_resolver_hickory::register(&registry);
    }

    let provider = registry.create_provider(&spf_config.provider)?;
    let resolver = registry.create_resolver(&spf_config.resolver)?;

    if spf_config.engine.dry_run {
        warn!("Running in DRY-RUN mode - no DNS changes will be made");
    }

    let (engine, mut events) = SpfEngine::new(provider, resolver, spf_config)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let EngineEvent::UpdateFailed { domain, error } = &event {
                warn!("Update for {} failed: {}", domain, error);
            } else {
                debug!("Engine event: {:?}", event);
            }
        }
    });

    Ok((engine, desired, mode))
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for SIGINT
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
