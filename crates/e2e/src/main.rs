//! Vendas E2E runner
//!
//! Provisions the test database, opens the browser and runs every persona
//! workflow in order. Exit status: 0 all scenarios passed, 1 a scenario
//! failed, 2 the environment could not be brought up.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use anyhow::Context;
use clap::builder::FalseyValueParser;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vendas_e2e::config::{parse_window_size, AdminToolsConfig, BrowserConfig, DatabaseConfig};
use vendas_e2e::text::UiText;
use vendas_e2e::wait::{Pacing, WaitConfig};
use vendas_e2e::{
    ArtifactRecorder, ChromeLauncher, E2eResult, HarnessConfig, PostgresProvisioner,
    ScenarioSettings, SuiteResult, TestRunner,
};

#[derive(Parser, Debug)]
#[command(name = "vendas-e2e")]
#[command(about = "End-to-end acceptance runner for the Vendas web application")]
#[command(version)]
struct Args {
    /// Base URL of the running application
    #[arg(long, env = "APP_URL", default_value = "http://127.0.0.1:8080")]
    app_url: String,

    /// Headless Chrome without sandbox at 1920x1080
    #[arg(long, env = "CONTAINER", value_parser = FalseyValueParser::new())]
    container: bool,

    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    db_host: String,

    #[arg(long, env = "DB_PORT", default_value = "5432")]
    db_port: u16,

    #[arg(long, env = "DB_USER", default_value = "me")]
    db_user: String,

    #[arg(long, env = "DB_PASS", default_value = "1q2w3e", hide_env_values = true)]
    db_pass: String,

    /// Database created and dropped by the run
    #[arg(long, env = "DB_NAME", default_value = "wallmart_test")]
    db_name: String,

    /// Maintenance database used to create and drop the test database
    #[arg(long, env = "DB_ADMIN_NAME", default_value = "postgres")]
    admin_db: String,

    /// Working directory for the administrative commands
    #[arg(long, env = "PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    /// Existing WebDriver endpoint (otherwise chromedriver is spawned)
    #[arg(long, env = "WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// Browser window size as WxH, overriding the mode's default
    #[arg(long, env = "WINDOW_SIZE")]
    window_size: Option<String>,

    #[arg(long, env = "CHROMEDRIVER", default_value = "chromedriver")]
    chromedriver: PathBuf,

    /// Snapshot directory, purged at start
    #[arg(long, env = "ARTIFACT_DIR", default_value = "photos")]
    artifact_dir: PathBuf,

    /// Upper bound for every wait
    #[arg(long, env = "WAIT_TIMEOUT_SECS", default_value = "10")]
    timeout_secs: u64,

    /// Pause between steps (0 disables)
    #[arg(long, env = "STEP_DELAY_MS", default_value = "500")]
    step_delay_ms: u64,

    /// Pause after seeding
    #[arg(long, env = "SEED_SETTLE_MS", default_value = "1000")]
    settle_ms: u64,

    /// YAML file overriding displayed UI text
    #[arg(long, env = "UI_TEXT_FILE")]
    ui_text: Option<PathBuf>,

    /// Keep running scenarios after a failure
    #[arg(long)]
    keep_going: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<HarnessConfig> {
        let text = match &self.ui_text {
            Some(path) => UiText::from_file(path)
                .with_context(|| format!("loading UI text from {}", path.display()))?,
            None => UiText::default(),
        };

        let mut browser = if self.container {
            BrowserConfig::container()
        } else {
            BrowserConfig::default()
        };
        if let Some(size) = &self.window_size {
            browser.window_size = Some(parse_window_size(size)?);
        }
        browser.webdriver_url = self.webdriver_url;
        browser.chromedriver = self.chromedriver;

        let config = HarnessConfig {
            app_url: self.app_url.trim_end_matches('/').to_string(),
            database: DatabaseConfig {
                host: self.db_host,
                port: self.db_port,
                user: self.db_user,
                password: self.db_pass,
                name: self.db_name,
                admin_database: self.admin_db,
            },
            admin_tools: AdminToolsConfig {
                project_root: self.project_root,
                ..AdminToolsConfig::default()
            },
            browser,
            artifact_dir: self.artifact_dir,
            wait: WaitConfig::with_timeout(Duration::from_secs(self.timeout_secs)),
            pacing: Pacing::new(Duration::from_millis(self.step_delay_ms)),
            seed_settle: Duration::from_millis(self.settle_ms),
            text,
            fail_fast: !self.keep_going,
            ..HarnessConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match run(config).await {
        Ok(suite) if suite.success() => {
            info!("All scenarios passed");
            ExitCode::SUCCESS
        }
        Ok(suite) => {
            for result in &suite.results {
                info!("  {} ({}): {:?}", result.name, result.role, result.outcome);
            }
            ExitCode::from(1)
        }
        Err(e) => {
            error!("Run aborted ({:?}): {}", e.class(), e);
            ExitCode::from(2)
        }
    }
}

async fn run(config: HarnessConfig) -> E2eResult<SuiteResult> {
    info!(
        "Target {} with database '{}'",
        config.app_url, config.database.name
    );

    let provisioner = PostgresProvisioner::from_config(&config);
    let launcher = ChromeLauncher {
        config: config.browser.clone(),
        wait: config.wait,
    };
    let artifacts = ArtifactRecorder::prepare(&config.artifact_dir);
    let settings = ScenarioSettings {
        app_url: config.app_url.clone(),
        text: config.text.clone(),
        pacing: config.pacing,
    };

    TestRunner::new(&provisioner, &launcher, artifacts, settings)
        .fail_fast(config.fail_fast)
        .run(&vendas_e2e::scenario::workflow())
        .await
}
