//! Administrator: reach the monitoring dashboard and check its widgets

use async_trait::async_trait;
use tracing::info;

use super::{expect_route, login, Ctx};
use crate::browser::BrowserSession;
use crate::error::E2eResult;
use crate::persona::Role;
use crate::runner::Scenario;
use crate::text::Route;
use crate::wait::Locator;

pub struct MonitoringWorkflow;

#[async_trait]
impl Scenario<BrowserSession> for MonitoringWorkflow {
    fn name(&self) -> &str {
        "admin_monitoring_dashboard"
    }

    fn role(&self) -> Role {
        Role::Administrator
    }

    async fn run(&self, ctx: &Ctx<'_>) -> E2eResult<()> {
        let session = ctx.session;
        let text = ctx.text();

        login(ctx, Role::Administrator).await?;
        expect_route(ctx, Route::AdminDashboard).await?;

        session
            .clickable(Locator::link_text(&text.monitoring_link))
            .await?
            .click()
            .await?;
        expect_route(ctx, Route::Monitoring).await?;
        ctx.artifacts.capture(session, "17_admin_monitoring").await;

        for label in text.kpi_labels() {
            session.visible(Locator::text_contains(label)).await?;
            info!("KPI present: {}", label);
        }
        session.visible(Locator::id("salesByBranchChart")).await?;
        session
            .visible(Locator::text_contains(&text.low_stock_alerts))
            .await?;
        info!("Monitoring dashboard complete");
        Ok(())
    }
}
