//! Main test runner that owns the run's environment and browser session

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::artifacts::ArtifactRecorder;
use crate::error::{E2eError, E2eResult};
use crate::persona::Role;
use crate::provision::{Provisioner, TestEnvironment};
use crate::text::UiText;
use crate::wait::Pacing;

/// A live UI session shared by every scenario of a run.
#[async_trait]
pub trait Session: Send + Sync {
    /// Release the session. Must be safe to call more than once.
    async fn close(&mut self);
}

/// Opens the run's single session.
#[async_trait]
pub trait Launcher: Send + Sync {
    type Session: Session;

    async fn open(&self) -> E2eResult<Self::Session>;
}

/// Settings every scenario reads but never changes.
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    pub app_url: String,
    pub text: UiText,
    pub pacing: Pacing,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            app_url: "http://127.0.0.1:8080".to_string(),
            text: UiText::default(),
            pacing: Pacing::default(),
        }
    }
}

/// What a scenario borrows from the run.
pub struct ScenarioContext<'a, S> {
    pub env: &'a TestEnvironment,
    pub session: &'a S,
    pub artifacts: &'a ArtifactRecorder,
    pub settings: &'a ScenarioSettings,
}

impl<S> ScenarioContext<'_, S> {
    pub fn text(&self) -> &UiText {
        &self.settings.text
    }

    pub async fn pause(&self) {
        self.settings.pacing.pause().await;
    }
}

/// One ordered workflow bound to a persona.
#[async_trait]
pub trait Scenario<S: Sync>: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> Role;

    async fn run(&self, ctx: &ScenarioContext<'_, S>) -> E2eResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped,
}

/// Result of running a single scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub role: Role,
    pub outcome: Outcome,
    pub duration: Duration,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Default)]
pub struct SuiteResult {
    pub results: Vec<ScenarioResult>,
    pub duration: Duration,
}

impl SuiteResult {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|o| *o == Outcome::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == Outcome::Skipped)
    }

    pub fn success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }
}

impl fmt::Display for SuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped ({} ms)",
            self.passed(),
            self.failed(),
            self.skipped(),
            self.duration.as_millis()
        )
    }
}

/// Drives provisioning, the browser session and the ordered scenarios.
pub struct TestRunner<'a, P, L: Launcher> {
    provisioner: &'a P,
    launcher: &'a L,
    artifacts: ArtifactRecorder,
    settings: ScenarioSettings,
    fail_fast: bool,
}

impl<'a, P, L> TestRunner<'a, P, L>
where
    P: Provisioner,
    L: Launcher,
{
    pub fn new(
        provisioner: &'a P,
        launcher: &'a L,
        artifacts: ArtifactRecorder,
        settings: ScenarioSettings,
    ) -> Self {
        Self {
            provisioner,
            launcher,
            artifacts,
            settings,
            fail_fast: true,
        }
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Run `scenarios` in order.
    ///
    /// Returns `Err` only for fatal environment problems (provisioning or
    /// browser launch); scenario failures are reported in the [`SuiteResult`].
    /// Teardown runs exactly once on every path past the start of
    /// provisioning, and the session, once opened, is closed exactly once.
    pub async fn run(
        &self,
        scenarios: &[Box<dyn Scenario<L::Session>>],
    ) -> E2eResult<SuiteResult> {
        let start = Instant::now();

        let env = match self.provisioner.provision().await {
            Ok(env) => env,
            Err(e) => {
                error!("Provisioning failed: {}", e);
                self.provisioner.teardown().await;
                return Err(fatal(e));
            }
        };

        let mut session = match self.launcher.open().await {
            Ok(session) => session,
            Err(e) => {
                error!("Browser session could not be opened: {}", e);
                self.provisioner.teardown().await;
                return Err(fatal(e));
            }
        };

        let mut suite = self.run_scenarios(&env, &session, scenarios).await;

        session.close().await;
        self.provisioner.teardown().await;

        suite.duration = start.elapsed();
        info!("Results: {}", suite);
        Ok(suite)
    }

    async fn run_scenarios(
        &self,
        env: &TestEnvironment,
        session: &L::Session,
        scenarios: &[Box<dyn Scenario<L::Session>>],
    ) -> SuiteResult {
        let ctx = ScenarioContext {
            env,
            session,
            artifacts: &self.artifacts,
            settings: &self.settings,
        };

        let mut suite = SuiteResult::default();
        let mut halted = false;

        for (index, scenario) in scenarios.iter().enumerate() {
            if halted {
                suite.results.push(ScenarioResult {
                    name: scenario.name().to_string(),
                    role: scenario.role(),
                    outcome: Outcome::Skipped,
                    duration: Duration::ZERO,
                });
                continue;
            }

            info!("--- Scenario {}: {} ({}) ---", index + 1, scenario.name(), scenario.role());
            let started = Instant::now();
            let outcome = match AssertUnwindSafe(scenario.run(&ctx)).catch_unwind().await {
                Ok(Ok(())) => {
                    info!("✓ {} ({} ms)", scenario.name(), started.elapsed().as_millis());
                    Outcome::Passed
                }
                Ok(Err(e)) => {
                    error!("✗ {} - {}", scenario.name(), e);
                    Outcome::Failed(e.to_string())
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("✗ {} - panicked: {}", scenario.name(), message);
                    Outcome::Failed(format!("panicked: {message}"))
                }
            };

            if matches!(outcome, Outcome::Failed(_)) && self.fail_fast {
                warn!("Fail-fast: skipping remaining scenarios");
                halted = true;
            }

            suite.results.push(ScenarioResult {
                name: scenario.name().to_string(),
                role: scenario.role(),
                outcome,
                duration: started.elapsed(),
            });
        }

        suite
    }
}

/// Anything that stops a run before scenarios start is an environment failure.
fn fatal(e: E2eError) -> E2eError {
    if e.is_fatal() {
        e
    } else {
        E2eError::Environment(e.to_string())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: Outcome) -> ScenarioResult {
        ScenarioResult {
            name: "s".into(),
            role: Role::Administrator,
            outcome,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_suite_counts() {
        let suite = SuiteResult {
            results: vec![
                result(Outcome::Passed),
                result(Outcome::Failed("boom".into())),
                result(Outcome::Skipped),
                result(Outcome::Skipped),
            ],
            duration: Duration::from_millis(1500),
        };

        assert_eq!(suite.passed(), 1);
        assert_eq!(suite.failed(), 1);
        assert_eq!(suite.skipped(), 2);
        assert!(!suite.success());
        assert_eq!(suite.to_string(), "1 passed, 1 failed, 2 skipped (1500 ms)");
    }

    #[test]
    fn test_empty_suite_is_success() {
        assert!(SuiteResult::default().success());
    }

    #[test]
    fn test_fatal_wraps_non_fatal_errors() {
        let wrapped = fatal(E2eError::AssertionFailed("x".into()));
        assert!(matches!(wrapped, E2eError::Environment(_)));
        let kept = fatal(E2eError::BrowserLaunch("no chrome".into()));
        assert!(matches!(kept, E2eError::BrowserLaunch(_)));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
