//! Vendas E2E acceptance harness
//!
//! Drives the Vendas point-of-sale web application through a real browser
//! against a freshly provisioned database:
//! - Recreates an ephemeral PostgreSQL database and seeds it with the
//!   application's own administrative commands
//! - Opens one Chrome session over WebDriver for the whole run
//! - Runs four ordered persona workflows, stopping at the first failure
//! - Records timestamped snapshots at each verified step
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TestRunner (runner.rs)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Provisioner::provision() -> TestEnvironment                │
//! │    ├── DROP / CREATE DATABASE                               │
//! │    ├── schema init, seeder                                  │
//! │    └── one persona per Role, bound to the first branch      │
//! │  Launcher::open() -> BrowserSession                         │
//! │  for scenario in workflow():                                │
//! │    ├── admin_full_flow                                      │
//! │    ├── salesperson_sale                                     │
//! │    ├── stock_clerk_stock_management                         │
//! │    └── admin_monitoring_dashboard                           │
//! │  Session::close()          (exactly once)                   │
//! │  Provisioner::teardown()   (exactly once)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  wait_until(condition, timeout)   the only poll point       │
//! │  ArtifactRecorder::capture(label) never fails the caller    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod browser;
pub mod config;
pub mod driver_service;
pub mod error;
pub mod persona;
pub mod provision;
pub mod runner;
pub mod scenario;
pub mod text;
pub mod wait;

pub use artifacts::ArtifactRecorder;
pub use browser::{BrowserSession, ChromeLauncher};
pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult, FailureClass};
pub use provision::{PostgresProvisioner, Provisioner, TestEnvironment};
pub use runner::{Outcome, ScenarioSettings, SuiteResult, TestRunner};
