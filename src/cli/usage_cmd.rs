use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::progress::Progress;
use crate::cli::renderer;
use crate::core::aggregate::{DailyTotals, ModelTotals};
use crate::core::auth;
use crate::core::config::{AppConfig, Settings};
use crate::core::dates::parse_range;
use crate::core::export::write_csv;
use crate::core::fetcher::{fetch_range, Backoff, HttpUsageSource, RetryPolicy};
use crate::core::formatter::{format_compact, format_secs};
use crate::core::models::report::UsageReport;

/// Optional override of the configured API base URL.
pub const API_BASE_VAR: &str = "OPENAI_API_BASE";

/// Arguments of a usage run as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct UsageArgs {
    pub start_date: String,
    pub end_date: String,
    pub encoding: Option<String>,
    pub org: Option<String>,
    pub csv: bool,
    pub rate: Option<f64>,
    pub rate_limit_wait: Option<f64>,
    pub max_retries: Option<u32>,
    pub timeout: Option<f64>,
    pub output_dir: Option<PathBuf>,
}

/// Config settings with command-line overrides applied and validated.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub org: String,
    pub encoding: String,
    pub rate: Duration,
    pub policy: RetryPolicy,
    pub timeout: Duration,
    pub api_base: String,
}

pub fn resolve(args: &UsageArgs, settings: &Settings) -> Result<RunSettings> {
    let mut merged = settings.clone();
    if let Some(encoding) = &args.encoding {
        merged.encoding = encoding.clone();
    }
    if let Some(org) = &args.org {
        merged.org = Some(org.clone());
    }
    if let Some(rate) = args.rate {
        merged.rate = rate;
    }
    if let Some(wait) = args.rate_limit_wait {
        merged.rate_limit_wait = wait;
    }
    if let Some(max_retries) = args.max_retries {
        merged.max_retries = max_retries;
    }
    if let Some(timeout) = args.timeout {
        merged.request_timeout = timeout;
    }
    if let Ok(base) = std::env::var(API_BASE_VAR) {
        if !base.is_empty() {
            merged.api_base = base;
        }
    }

    let issues = AppConfig {
        settings: merged.clone(),
    }
    .validate();
    if !issues.is_empty() {
        anyhow::bail!("Invalid settings:\n  {}", issues.join("\n  "));
    }

    let org = merged
        .org
        .filter(|o| !o.trim().is_empty())
        .context("Organization is required: pass --org or set `org` under [settings] in the config file")?;

    Ok(RunSettings {
        org,
        encoding: merged.encoding,
        rate: seconds("rate", merged.rate)?,
        policy: RetryPolicy {
            rate_limit_wait: seconds("rate_limit_wait", merged.rate_limit_wait)?,
            max_retries: merged.max_retries,
        },
        timeout: seconds("request_timeout", merged.request_timeout)?,
        api_base: merged.api_base,
    })
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("Invalid {}: {}", name, value))
}

pub async fn run(args: UsageArgs, config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let settings = resolve(&args, &config.settings)?;
    let api_key = auth::read_api_key()?;
    let range = parse_range(&args.start_date, &args.end_date, &settings.encoding)?;

    let source = HttpUsageSource::new(
        &settings.api_base,
        api_key,
        settings.org.clone(),
        settings.timeout,
    )
    .context("Failed to set up usage client")?;

    info!(
        "Fetching {} day(s) for {} from {} (wait {})",
        range.len(),
        settings.org,
        settings.api_base,
        format_secs(settings.rate)
    );

    let progress = Progress::new(range.len(), opts.format == OutputFormat::Text);
    let fetched = fetch_range(
        &source,
        &range,
        &settings.encoding,
        Backoff::new(settings.rate),
        &settings.policy,
        |position, label| progress.update(position, label),
    )
    .await;
    progress.finish();
    let (days, backoff) = fetched?;

    let daily = DailyTotals::from_days(&days);
    let totals = ModelTotals::from_daily(&daily);
    let total = totals.total();
    info!(
        "Fetched {} day(s): {} prompt / {} completion tokens, {} rate limit hit(s), final wait {}",
        days.len(),
        format_compact(total.prompt),
        format_compact(total.completion),
        backoff.rate_limit_hits,
        format_secs(backoff.delay)
    );

    if args.csv {
        let dir = match &args.output_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };
        let path = write_csv(&daily, &range, &dir)?;
        eprintln!("Wrote {}", path.display());
    }

    match opts.format {
        OutputFormat::Text => {
            println!("{}", renderer::render_table(&totals, opts.use_color));
        }
        OutputFormat::Json => {
            let report = UsageReport::new(&range, &daily, &totals, backoff.rate_limit_hits);
            println!("{}", renderer::render_json(&report, opts.pretty)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::UsageError;
    use crate::core::test_env::EnvGuard;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn args() -> UsageArgs {
        UsageArgs {
            start_date: "2023-04-01".to_string(),
            end_date: "2023-04-02".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn cli_values_override_config() {
        let mut settings = Settings::default();
        settings.org = Some("org-config".to_string());
        settings.rate = 1.0;
        let mut a = args();
        a.org = Some("org-cli".to_string());
        a.rate = Some(0.25);
        a.rate_limit_wait = Some(3.0);
        a.max_retries = Some(0);
        a.encoding = Some("%d/%m/%Y".to_string());

        let resolved = resolve(&a, &settings).unwrap();
        assert_eq!(resolved.org, "org-cli");
        assert_eq!(resolved.rate, Duration::from_millis(250));
        assert_eq!(resolved.policy.rate_limit_wait, Duration::from_secs(3));
        assert_eq!(resolved.policy.max_retries, 0);
        assert_eq!(resolved.encoding, "%d/%m/%Y");
    }

    #[test]
    fn config_org_is_used_when_flag_missing() {
        let mut settings = Settings::default();
        settings.org = Some("org-config".to_string());
        let resolved = resolve(&args(), &settings).unwrap();
        assert_eq!(resolved.org, "org-config");
        assert_eq!(resolved.rate, Duration::from_millis(2500));
        assert_eq!(resolved.policy.rate_limit_wait, Duration::from_secs(10));
        assert_eq!(resolved.timeout, Duration::from_secs(60));
    }

    #[test]
    fn missing_org_is_an_error() {
        let err = resolve(&args(), &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("--org"));
    }

    #[test]
    fn negative_rate_is_rejected() {
        let mut a = args();
        a.org = Some("org".to_string());
        a.rate = Some(-2.0);
        let err = resolve(&a, &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("rate"));
    }

    #[test]
    fn huge_durations_are_rejected() {
        let mut a = args();
        a.org = Some("org".to_string());
        a.rate = Some(1e20);
        let err = resolve(&a, &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("rate"), "{err}");

        let mut a = args();
        a.org = Some("org".to_string());
        a.rate_limit_wait = Some(f64::MAX);
        a.timeout = Some(1e25);
        let err = resolve(&a, &Settings::default()).unwrap_err().to_string();
        assert!(err.contains("rate_limit_wait"), "{err}");
        assert!(err.contains("request_timeout"), "{err}");
    }

    #[test]
    fn seconds_never_panics() {
        assert_eq!(seconds("rate", 0.5).unwrap(), Duration::from_millis(500));
        assert!(seconds("rate", 1e20).is_err());
        assert!(seconds("rate", -1.0).is_err());
        assert!(seconds("rate", f64::NAN).is_err());
    }

    fn run_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.settings.org = Some("org-test".to_string());
        config.settings.rate = 0.0;
        config.settings.rate_limit_wait = 0.0;
        config
    }

    fn json_output() -> OutputOptions {
        OutputOptions {
            format: OutputFormat::Json,
            pretty: false,
            use_color: false,
        }
    }

    #[tokio::test]
    async fn run_rejects_bad_date_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":[]}"#))
            .expect(0)
            .mount(&server)
            .await;

        let mut env = EnvGuard::lock();
        env.set(API_BASE_VAR, server.uri());
        env.set(auth::API_KEY_VAR, "sk-test");

        let mut a = args();
        a.start_date = "2023/04/01".to_string();
        let err = run(a, &run_config(), &json_output()).await.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<UsageError>(),
                Some(UsageError::DateFormat { input, .. }) if input == "2023/04/01"
            ),
            "{err:#}"
        );
    }

    #[tokio::test]
    async fn run_requires_api_key_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":[]}"#))
            .expect(0)
            .mount(&server)
            .await;

        let mut env = EnvGuard::lock();
        env.set(API_BASE_VAR, server.uri());
        env.remove(auth::API_KEY_VAR);

        let err = run(args(), &run_config(), &json_output()).await.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<UsageError>(),
                Some(UsageError::MissingCredential(auth::API_KEY_VAR))
            ),
            "{err:#}"
        );
    }

    #[tokio::test]
    async fn run_fetches_every_day_and_writes_csv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/usage"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(header("Openai-Organization", "org-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data":[{"snapshot_id":"gpt-4-0314","n_context_tokens_total":10,"n_generated_tokens_total":2}]}"#,
            ))
            .expect(2)
            .mount(&server)
            .await;

        let mut env = EnvGuard::lock();
        env.set(API_BASE_VAR, server.uri());
        env.set(auth::API_KEY_VAR, "sk-test");

        let dir = tempfile::tempdir().unwrap();
        let mut a = args();
        a.csv = true;
        a.output_dir = Some(dir.path().to_path_buf());
        run(a, &run_config(), &json_output()).await.unwrap();

        let csv_path = dir.path().join("tokens_usage_2023-04-01_2023-04-02.csv");
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "day,gpt-4-0314_prompt,gpt-4-0314_completion,total_prompt,total_completion",
                "2023-04-01,10,2,10,2",
                "2023-04-02,10,2,10,2",
            ]
        );
    }
}
