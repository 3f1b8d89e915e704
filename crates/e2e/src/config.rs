//! Harness configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::persona::PersonaSpec;
use crate::text::UiText;
use crate::wait::{Pacing, WaitConfig};

/// Everything a run needs, resolved before anything is provisioned.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Base URL of the application under test
    pub app_url: String,

    pub database: DatabaseConfig,

    pub admin_tools: AdminToolsConfig,

    pub browser: BrowserConfig,

    /// Accounts created during provisioning
    pub personas: Vec<PersonaSpec>,

    /// Run-scoped snapshot directory, purged at start
    pub artifact_dir: PathBuf,

    pub wait: WaitConfig,

    /// Delay between verified steps (zero disables)
    pub pacing: Pacing,

    /// Pause after seeding before reading seed data back
    pub seed_settle: Duration,

    pub text: UiText,

    /// Stop at the first failing scenario
    pub fail_fast: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            app_url: "http://127.0.0.1:8080".to_string(),
            database: DatabaseConfig::default(),
            admin_tools: AdminToolsConfig::default(),
            browser: BrowserConfig::default(),
            personas: PersonaSpec::defaults(),
            artifact_dir: PathBuf::from("photos"),
            wait: WaitConfig::default(),
            pacing: Pacing::new(Duration::from_millis(500)),
            seed_settle: Duration::from_secs(1),
            text: UiText::default(),
            fail_fast: true,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> E2eResult<()> {
        self.database.validate()?;
        if self.app_url.is_empty() {
            return Err(E2eError::Config("application URL is empty".into()));
        }
        if self.wait.timeout.is_zero() {
            return Err(E2eError::Config("wait timeout must be positive".into()));
        }
        if self.wait.poll_interval.is_zero() {
            return Err(E2eError::Config("poll interval must be positive".into()));
        }
        Ok(())
    }
}

/// PostgreSQL connection parameters for the ephemeral database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database created and dropped by the run
    pub name: String,
    /// Maintenance database used to create and drop `name`
    pub admin_database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "me".to_string(),
            password: "1q2w3e".to_string(),
            name: "wallmart_test".to_string(),
            admin_database: "postgres".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> E2eResult<()> {
        if !is_plain_identifier(&self.name) {
            return Err(E2eError::Config(format!(
                "database name '{}' must match [A-Za-z_][A-Za-z0-9_]* and be at most 63 bytes",
                self.name
            )));
        }
        if self.name == self.admin_database {
            return Err(E2eError::Config(
                "test database must differ from the maintenance database".into(),
            ));
        }
        Ok(())
    }

    /// Environment handed to the administrative tools.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("DB_HOST", self.host.clone()),
            ("DB_PORT", self.port.to_string()),
            ("DB_USER", self.user.clone()),
            ("DB_PASS", self.password.clone()),
            ("DB_NAME", self.name.clone()),
        ]
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A program plus its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn go_run(entry: &str) -> Self {
        Self::new("go", &["run", entry])
    }
}

/// Administrative commands shipped with the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminToolsConfig {
    /// Working directory the tools are run from
    pub project_root: PathBuf,
    pub schema_init: ToolCommand,
    pub seeder: ToolCommand,
    pub persona_creator: ToolCommand,
}

impl Default for AdminToolsConfig {
    fn default() -> Self {
        let mut schema_init = ToolCommand::go_run("./cmd/data_manager/main.go");
        schema_init.args.push("-init".to_string());
        Self {
            project_root: PathBuf::from("."),
            schema_init,
            seeder: ToolCommand::go_run("./cmd/populando_banco/main.go"),
            persona_creator: ToolCommand::go_run("./cmd/create_user/main.go"),
        }
    }
}

/// Browser launch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_size: Option<(u32, u32)>,
    pub sandbox_disabled: bool,
    pub start_maximized: bool,
    /// Existing WebDriver endpoint; `None` spawns `chromedriver`
    pub webdriver_url: Option<String>,
    pub chromedriver: PathBuf,
    pub driver_startup_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            window_size: None,
            sandbox_disabled: false,
            start_maximized: true,
            webdriver_url: None,
            chromedriver: PathBuf::from("chromedriver"),
            driver_startup_timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserConfig {
    /// Settings for running inside a container: headless, no sandbox,
    /// fixed 1920x1080 viewport.
    pub fn container() -> Self {
        Self {
            headless: true,
            window_size: Some((1920, 1080)),
            sandbox_disabled: true,
            ..Self::default()
        }
    }

    /// Chrome command-line switches for these options.
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.start_maximized {
            args.push("--start-maximized".to_string());
        }
        if self.headless {
            args.push("--headless".to_string());
        }
        if self.sandbox_disabled {
            args.push("--no-sandbox".to_string());
            args.push("--disable-dev-shm-usage".to_string());
        }
        if let Some((w, h)) = self.window_size {
            args.push(format!("--window-size={w},{h}"));
        }
        args
    }
}

/// Parse a `WxH` window size such as `1920x1080`.
pub fn parse_window_size(value: &str) -> E2eResult<(u32, u32)> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| E2eError::Config(format!("window size '{value}' is not WxH")))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| E2eError::Config(format!("window size '{value}' is not WxH")))
    };
    Ok((parse(w)?, parse(h)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("wallmart_test", true)]
    #[test_case("_scratch1", true)]
    #[test_case("1starts_with_digit", false)]
    #[test_case("drop; --", false)]
    #[test_case("with-dash", false)]
    #[test_case("", false)]
    fn test_database_name_validation(name: &str, ok: bool) {
        let db = DatabaseConfig {
            name: name.to_string(),
            ..Default::default()
        };
        assert_eq!(db.validate().is_ok(), ok);
    }

    #[test]
    fn test_overlong_database_name_rejected() {
        let db = DatabaseConfig {
            name: "a".repeat(64),
            ..Default::default()
        };
        assert!(db.validate().is_err());
    }

    #[test]
    fn test_container_mode_chrome_args() {
        let args = BrowserConfig::container().chrome_args();
        assert_eq!(
            args,
            vec![
                "--start-maximized",
                "--headless",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--window-size=1920,1080",
            ]
        );
    }

    #[test]
    fn test_windowed_mode_only_maximizes() {
        assert_eq!(BrowserConfig::default().chrome_args(), vec!["--start-maximized"]);
    }

    #[test_case("1920x1080", Some((1920, 1080)))]
    #[test_case("800X600", Some((800, 600)))]
    #[test_case("0x600", None)]
    #[test_case("wide", None)]
    fn test_parse_window_size(input: &str, expected: Option<(u32, u32)>) {
        assert_eq!(parse_window_size(input).ok(), expected);
    }

    #[test]
    fn test_admin_tool_env_names() {
        let vars = DatabaseConfig::default().env_vars();
        let names: Vec<_> = vars.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, ["DB_HOST", "DB_PORT", "DB_USER", "DB_PASS", "DB_NAME"]);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(HarnessConfig::default().validate().is_ok());
    }
}
