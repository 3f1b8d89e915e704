//! Run lifecycle against in-memory fakes
//!
//! Covers ordering, fail-fast, and the exactly-once teardown and close
//! guarantees without a database or a browser.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;

use vendas_e2e::config::DatabaseConfig;
use vendas_e2e::persona::{PersonaSpec, Role};
use vendas_e2e::runner::{Launcher, Scenario, ScenarioContext, Session};
use vendas_e2e::{
    ArtifactRecorder, E2eError, E2eResult, FailureClass, Outcome, Provisioner, ScenarioSettings,
    TestEnvironment, TestRunner,
};

#[derive(Default)]
struct Counters {
    provisioned: AtomicUsize,
    teardowns: AtomicUsize,
    opened: AtomicUsize,
    closes: AtomicUsize,
    ran: Mutex<Vec<String>>,
}

impl Counters {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct FakeProvisioner {
    counters: Arc<Counters>,
    fail: bool,
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn provision(&self) -> E2eResult<TestEnvironment> {
        self.counters.provisioned.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(E2eError::AdminTool {
                tool: "fixture seeder".into(),
                reason: "exit status: 1".into(),
            });
        }
        let personas = PersonaSpec::defaults()
            .iter()
            .map(|spec| spec.bind(Some("B1")))
            .collect::<Vec<_>>();
        TestEnvironment::new(DatabaseConfig::default(), vec!["B1".to_string()], personas)
    }

    async fn teardown(&self) {
        self.counters.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeSession {
    counters: Arc<Counters>,
    open: bool,
}

#[async_trait]
impl Session for FakeSession {
    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct FakeLauncher {
    counters: Arc<Counters>,
    fail: bool,
}

#[async_trait]
impl Launcher for FakeLauncher {
    type Session = FakeSession;

    async fn open(&self) -> E2eResult<FakeSession> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(E2eError::BrowserLaunch("chrome not found".into()));
        }
        Ok(FakeSession {
            counters: self.counters.clone(),
            open: true,
        })
    }
}

enum Behavior {
    Pass,
    Fail,
    Panic,
}

struct FakeScenario {
    name: &'static str,
    role: Role,
    behavior: Behavior,
}

#[async_trait]
impl Scenario<FakeSession> for FakeScenario {
    fn name(&self) -> &str {
        self.name
    }

    fn role(&self) -> Role {
        self.role
    }

    async fn run(&self, ctx: &ScenarioContext<'_, FakeSession>) -> E2eResult<()> {
        assert!(ctx.session.open, "scenario ran on a closed session");
        ctx.session.counters.ran.lock().push(self.name.to_string());
        ctx.env.persona(self.role)?;
        match self.behavior {
            Behavior::Pass => Ok(()),
            Behavior::Fail => Err(E2eError::AssertionFailed("row not found".into())),
            Behavior::Panic => panic!("scenario blew up"),
        }
    }
}

fn scenarios(behaviors: [Behavior; 4]) -> Vec<Box<dyn Scenario<FakeSession>>> {
    let names = [
        ("admin_full_flow", Role::Administrator),
        ("salesperson_sale", Role::Salesperson),
        ("stock_clerk_stock_management", Role::StockClerk),
        ("admin_monitoring_dashboard", Role::Administrator),
    ];
    names
        .into_iter()
        .zip(behaviors)
        .map(|((name, role), behavior)| {
            Box::new(FakeScenario {
                name,
                role,
                behavior,
            }) as Box<dyn Scenario<FakeSession>>
        })
        .collect()
}

struct Harness {
    counters: Arc<Counters>,
    provisioner: FakeProvisioner,
    launcher: FakeLauncher,
    _artifacts: tempfile::TempDir,
    recorder: Option<ArtifactRecorder>,
}

impl Harness {
    fn new(provision_fails: bool, launch_fails: bool) -> Self {
        let counters = Arc::new(Counters::default());
        let artifacts = tempfile::tempdir().unwrap();
        let recorder = ArtifactRecorder::prepare(artifacts.path().join("photos"));
        Self {
            provisioner: FakeProvisioner {
                counters: counters.clone(),
                fail: provision_fails,
            },
            launcher: FakeLauncher {
                counters: counters.clone(),
                fail: launch_fails,
            },
            counters,
            _artifacts: artifacts,
            recorder: Some(recorder),
        }
    }

    fn runner(&mut self) -> TestRunner<'_, FakeProvisioner, FakeLauncher> {
        let recorder = self.recorder.take().unwrap();
        TestRunner::new(
            &self.provisioner,
            &self.launcher,
            recorder,
            ScenarioSettings::default(),
        )
    }

    fn ran(&self) -> Vec<String> {
        self.counters.ran.lock().clone()
    }
}

#[tokio::test]
async fn all_scenarios_pass_in_order() {
    let mut h = Harness::new(false, false);
    let suite = h
        .runner()
        .run(&scenarios([Behavior::Pass, Behavior::Pass, Behavior::Pass, Behavior::Pass]))
        .await
        .unwrap();

    assert!(suite.success());
    assert_eq!(suite.passed(), 4);
    assert_eq!(
        h.ran(),
        [
            "admin_full_flow",
            "salesperson_sale",
            "stock_clerk_stock_management",
            "admin_monitoring_dashboard"
        ]
    );
    assert_eq!(Counters::get(&h.counters.opened), 1);
    assert_eq!(Counters::get(&h.counters.closes), 1);
    assert_eq!(Counters::get(&h.counters.teardowns), 1);
}

#[tokio::test]
async fn failure_stops_remaining_scenarios() {
    let mut h = Harness::new(false, false);
    let suite = h
        .runner()
        .run(&scenarios([Behavior::Pass, Behavior::Fail, Behavior::Pass, Behavior::Pass]))
        .await
        .unwrap();

    let outcomes: Vec<_> = suite.results.iter().map(|r| r.outcome.clone()).collect();
    assert_eq!(outcomes[0], Outcome::Passed);
    assert!(matches!(&outcomes[1], Outcome::Failed(msg) if msg.contains("row not found")));
    assert_eq!(outcomes[2], Outcome::Skipped);
    assert_eq!(outcomes[3], Outcome::Skipped);
    assert!(!suite.success());

    assert_eq!(h.ran(), ["admin_full_flow", "salesperson_sale"]);
    assert_eq!(Counters::get(&h.counters.closes), 1);
    assert_eq!(Counters::get(&h.counters.teardowns), 1);
}

#[tokio::test]
async fn keep_going_runs_every_scenario() {
    let mut h = Harness::new(false, false);
    let suite = h
        .runner()
        .fail_fast(false)
        .run(&scenarios([Behavior::Fail, Behavior::Pass, Behavior::Fail, Behavior::Pass]))
        .await
        .unwrap();

    assert_eq!(suite.passed(), 2);
    assert_eq!(suite.failed(), 2);
    assert_eq!(suite.skipped(), 0);
    assert_eq!(h.ran().len(), 4);
    assert_eq!(Counters::get(&h.counters.teardowns), 1);
}

#[tokio::test]
async fn provisioning_failure_is_fatal_and_skips_browser() {
    let mut h = Harness::new(true, false);
    let err = h
        .runner()
        .run(&scenarios([Behavior::Pass, Behavior::Pass, Behavior::Pass, Behavior::Pass]))
        .await
        .unwrap_err();

    assert_eq!(err.class(), FailureClass::FatalEnvironment);
    assert_eq!(Counters::get(&h.counters.opened), 0);
    assert_eq!(Counters::get(&h.counters.closes), 0);
    assert!(h.ran().is_empty());
    assert_eq!(Counters::get(&h.counters.teardowns), 1);
}

#[tokio::test]
async fn browser_launch_failure_is_fatal() {
    let mut h = Harness::new(false, true);
    let err = h
        .runner()
        .run(&scenarios([Behavior::Pass, Behavior::Pass, Behavior::Pass, Behavior::Pass]))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, E2eError::BrowserLaunch(_)));
    assert_eq!(Counters::get(&h.counters.provisioned), 1);
    assert!(h.ran().is_empty());
    assert_eq!(Counters::get(&h.counters.closes), 0);
    assert_eq!(Counters::get(&h.counters.teardowns), 1);
}

#[tokio::test]
async fn panicking_scenario_is_reported_as_failure() {
    let mut h = Harness::new(false, false);
    let suite = h
        .runner()
        .run(&scenarios([Behavior::Pass, Behavior::Pass, Behavior::Panic, Behavior::Pass]))
        .await
        .unwrap();

    assert!(
        matches!(&suite.results[2].outcome, Outcome::Failed(msg) if msg.contains("scenario blew up"))
    );
    assert_eq!(suite.results[3].outcome, Outcome::Skipped);
    assert_eq!(Counters::get(&h.counters.closes), 1);
    assert_eq!(Counters::get(&h.counters.teardowns), 1);
}
