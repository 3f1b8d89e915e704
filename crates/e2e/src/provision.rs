//! Ephemeral database provisioning
//!
//! A run owns one database, created from scratch before the browser opens and
//! dropped after the last scenario. Schema, seed data and persona accounts are
//! produced by the application's own administrative commands; this module
//! only depends on their arguments and exit status.
//!
//! Every SQL statement runs on a connection opened for that statement alone.
//! The connection is released on every exit path so that a later forced drop
//! never waits on a session held by this process.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command as TokioCommand;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info, warn};

use crate::config::{AdminToolsConfig, DatabaseConfig, HarnessConfig, ToolCommand};
use crate::error::{E2eError, E2eResult};
use crate::persona::{Persona, PersonaSpec, Role};

const BRANCH_IDS_SQL: &str = "SELECT id::text FROM filiais ORDER BY nome";
const USER_COUNT_SQL: &str = "SELECT count(*) FROM usuarios";

/// The provisioned world every scenario runs against.
#[derive(Debug, Clone)]
pub struct TestEnvironment {
    pub database: DatabaseConfig,
    branches: Vec<String>,
    personas: BTreeMap<Role, Persona>,
}

impl TestEnvironment {
    /// An environment is only ready once a branch has been resolved.
    pub fn new(
        database: DatabaseConfig,
        branches: Vec<String>,
        personas: impl IntoIterator<Item = Persona>,
    ) -> E2eResult<Self> {
        if branches.is_empty() {
            return Err(E2eError::Environment(
                "seed data contains no branch to bind personas to".into(),
            ));
        }
        Ok(Self {
            database,
            branches,
            personas: personas.into_iter().map(|p| (p.role, p)).collect(),
        })
    }

    pub fn database_name(&self) -> &str {
        &self.database.name
    }

    /// Branch that non-administrator personas are bound to.
    pub fn primary_branch(&self) -> &str {
        &self.branches[0]
    }

    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    pub fn persona(&self, role: Role) -> E2eResult<&Persona> {
        self.personas
            .get(&role)
            .ok_or_else(|| E2eError::Environment(format!("no {} persona was provisioned", role)))
    }

    pub fn personas(&self) -> impl Iterator<Item = &Persona> {
        self.personas.values()
    }
}

/// Row counts that must be identical across provision cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedCounts {
    pub branches: usize,
    pub users: i64,
}

/// Creates and destroys the environment of a run.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self) -> E2eResult<TestEnvironment>;

    /// Drop the run's database. Never fails; problems are logged.
    async fn teardown(&self);
}

/// Provisions against a PostgreSQL server using the application's tools.
pub struct PostgresProvisioner {
    database: DatabaseConfig,
    tools: AdminToolsConfig,
    personas: Vec<PersonaSpec>,
    settle: Duration,
}

impl PostgresProvisioner {
    pub fn new(
        database: DatabaseConfig,
        tools: AdminToolsConfig,
        personas: Vec<PersonaSpec>,
        settle: Duration,
    ) -> Self {
        Self {
            database,
            tools,
            personas,
            settle,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            config.database.clone(),
            config.admin_tools.clone(),
            config.personas.clone(),
            config.seed_settle,
        )
    }

    async fn connect(&self, dbname: &str) -> E2eResult<ScopedConnection> {
        ScopedConnection::open(&self.database, dbname).await
    }

    async fn recreate_database(&self) -> E2eResult<()> {
        let conn = self.connect(&self.database.admin_database).await.map_err(|e| {
            E2eError::Environment(format!(
                "cannot reach {}:{} as {}: {}",
                self.database.host, self.database.port, self.database.user, e
            ))
        })?;
        conn.client()
            .batch_execute(&drop_database_sql(&self.database.name))
            .await?;
        conn.client()
            .batch_execute(&format!("CREATE DATABASE \"{}\"", self.database.name))
            .await?;
        conn.release().await;
        info!("Test database '{}' created", self.database.name);
        Ok(())
    }

    async fn branch_ids(&self) -> E2eResult<Vec<String>> {
        let conn = self.connect(&self.database.name).await?;
        let rows = conn.client().query(BRANCH_IDS_SQL, &[]).await?;
        conn.release().await;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    /// Branch and user counts currently in the environment's database.
    pub async fn seed_counts(&self, env: &TestEnvironment) -> E2eResult<SeedCounts> {
        let conn = self.connect(env.database_name()).await?;
        let users: i64 = conn.client().query_one(USER_COUNT_SQL, &[]).await?.get(0);
        let branches = conn.client().query(BRANCH_IDS_SQL, &[]).await?.len();
        conn.release().await;
        Ok(SeedCounts { branches, users })
    }

    async fn run_tool(&self, tool: &str, command: &ToolCommand, extra: &[String]) -> E2eResult<()> {
        info!("Running {}...", tool);
        let output = TokioCommand::new(&command.program)
            .args(&command.args)
            .args(extra)
            .current_dir(&self.tools.project_root)
            .envs(self.database.env_vars())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                E2eError::admin_tool(tool, format!("failed to spawn '{}': {}", command.program, e))
            })?;

        debug!("{} stdout: {}", tool, String::from_utf8_lossy(&output.stdout).trim());

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(E2eError::admin_tool(
                tool,
                format!("{}: {}", output.status, tail(&stderr, 5)),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for PostgresProvisioner {
    async fn provision(&self) -> E2eResult<TestEnvironment> {
        self.database.validate()?;
        self.recreate_database().await?;

        self.run_tool("schema initializer", &self.tools.schema_init, &[])
            .await?;
        self.run_tool("fixture seeder", &self.tools.seeder, &[]).await?;

        // Seeding may still be committing when the tool exits.
        tokio::time::sleep(self.settle).await;

        let branches = self.branch_ids().await?;
        let Some(branch) = branches.first().cloned() else {
            return Err(E2eError::Environment(format!(
                "no branch found in '{}' after seeding",
                self.database.name
            )));
        };
        info!("Seed data ready: {} branch(es), personas bind to {}", branches.len(), branch);

        let mut personas = Vec::with_capacity(self.personas.len());
        for spec in &self.personas {
            let persona = spec.bind(Some(&branch));
            self.run_tool(
                "persona creator",
                &self.tools.persona_creator,
                &persona_args(&persona),
            )
            .await?;
            debug!("Created {} persona {}", persona.role, persona.email);
            personas.push(persona);
        }
        info!("{} test persona(s) created", personas.len());

        let env = TestEnvironment::new(self.database.clone(), branches, personas)?;
        match self.seed_counts(&env).await {
            Ok(counts) => info!("Seed counts: {} branch(es), {} user(s)", counts.branches, counts.users),
            Err(e) => warn!("Could not read seed counts: {}", e),
        }
        Ok(env)
    }

    async fn teardown(&self) {
        if let Err(e) = self.database.validate() {
            warn!("Skipping teardown: {}", e);
            return;
        }
        let result = async {
            let conn = self.connect(&self.database.admin_database).await?;
            conn.client()
                .batch_execute(&drop_database_sql(&self.database.name))
                .await?;
            conn.release().await;
            Ok::<_, E2eError>(())
        }
        .await;

        match result {
            Ok(()) => info!("Test database '{}' dropped", self.database.name),
            Err(e) => warn!(
                "Could not drop test database '{}': {}",
                self.database.name, e
            ),
        }
    }
}

/// One connection, released when the guard is released or dropped.
struct ScopedConnection {
    client: Client,
    driver: ConnectionDriver,
}

impl ScopedConnection {
    async fn open(db: &DatabaseConfig, dbname: &str) -> E2eResult<Self> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&db.host)
            .port(db.port)
            .user(&db.user)
            .password(&db.password)
            .dbname(dbname)
            .connect_timeout(Duration::from_secs(5));

        let (client, connection) = config.connect(NoTls).await?;
        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("postgres connection ended: {}", e);
            }
        });
        Ok(Self {
            client,
            driver: ConnectionDriver(Some(handle)),
        })
    }

    fn client(&self) -> &Client {
        &self.client
    }

    /// Close the session and wait for the server to see it go.
    async fn release(self) {
        let ScopedConnection { client, driver } = self;
        drop(client);
        driver.join().await;
    }
}

/// Background task polling the connection; aborted if never joined.
struct ConnectionDriver(Option<JoinHandle<()>>);

impl ConnectionDriver {
    async fn join(mut self) {
        if let Some(handle) = self.0.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ConnectionDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

fn drop_database_sql(name: &str) -> String {
    format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", name)
}

/// Flags for the account-creation tool.
pub fn persona_args(persona: &Persona) -> Vec<String> {
    let mut args = vec![
        format!("-name={}", persona.name),
        format!("-email={}", persona.email),
        format!("-password={}", persona.password),
        format!("-role={}", persona.role.as_arg()),
    ];
    if let Some(branch) = &persona.branch {
        args.push(format!("-filialid={}", branch));
    }
    args
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join(" | ")
}
