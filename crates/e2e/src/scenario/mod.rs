//! The ordered persona workflows
//!
//! Scenarios run in the order [`workflow`] returns them, against one
//! environment and one browser session. Each begins by logging in as its
//! persona and confirming the post-login redirect.

mod admin;
mod monitoring;
mod sales;
mod stock;

pub use admin::{total_pages, AdminWorkflow};
pub use monitoring::MonitoringWorkflow;
pub use sales::SalesWorkflow;
pub use stock::StockWorkflow;

use thirtyfour::prelude::WebElement;
use tracing::{debug, info};

use crate::browser::BrowserSession;
use crate::error::E2eResult;
use crate::persona::Role;
use crate::runner::{Scenario, ScenarioContext};
use crate::text::Route;
use crate::wait::{wait_replaced, xpath_literal, Locator, WaitCondition};

pub(crate) type Ctx<'a> = ScenarioContext<'a, BrowserSession>;

/// All scenarios in execution order.
pub fn workflow() -> Vec<Box<dyn Scenario<BrowserSession>>> {
    vec![
        Box::new(AdminWorkflow),
        Box::new(SalesWorkflow),
        Box::new(StockWorkflow),
        Box::new(MonitoringWorkflow),
    ]
}

/// Fill the login form as `role`, snapshot it, and submit.
pub(crate) async fn login(ctx: &Ctx<'_>, role: Role) -> E2eResult<()> {
    let persona = ctx.env.persona(role)?;
    let session = ctx.session;
    info!("Logging in as {} ({})", persona.email, role);

    session
        .navigate(&Route::Login.url(&ctx.settings.app_url))
        .await?;
    let email = session.visible(Locator::id("email")).await?;
    email.send_keys(persona.email.as_str()).await?;
    session
        .find(&Locator::id("password"))
        .await?
        .send_keys(persona.password.as_str())
        .await?;
    ctx.artifacts.capture(session, "00_login_filled").await;

    session
        .find(&Locator::css("button[type='submit']"))
        .await?
        .click()
        .await?;
    Ok(())
}

/// Wait until the browser is on `route` and its title has rendered.
pub(crate) async fn expect_route(ctx: &Ctx<'_>, route: Route) -> E2eResult<()> {
    ctx.session
        .wait_for(WaitCondition::UrlContains(route.path().to_string()))
        .await?;
    ctx.session
        .wait_for(WaitCondition::TitleContains(
            ctx.text().title_for(route).to_string(),
        ))
        .await?;
    info!("On {} as expected", route.path());
    Ok(())
}

/// Notifications containing `message` that are on screen right now.
///
/// Taken before an action so [`expect_fresh_notice`] can tell a leftover
/// notice from the one the action produces.
pub(crate) async fn standing_notices(
    ctx: &Ctx<'_>,
    message: &str,
) -> E2eResult<Vec<WebElement>> {
    ctx.session.find_all(&Locator::text_contains(message)).await
}

/// Wait for a notification containing `message` that replaced `standing`.
pub(crate) async fn expect_fresh_notice(
    ctx: &Ctx<'_>,
    message: &str,
    standing: Vec<WebElement>,
) -> E2eResult<()> {
    if !standing.is_empty() {
        debug!("Waiting for {} earlier notice(s) to clear", standing.len());
    }
    wait_replaced(
        ctx.session,
        ctx.session.wait_config(),
        standing,
        Locator::text_contains(message),
    )
    .await?;
    info!("Notice shown: {}", message);
    Ok(())
}

/// A button inside a modal whose exact text is `label`.
pub(crate) fn modal_button(label: &str) -> Locator {
    Locator::xpath(format!(".//button[text()={}]", xpath_literal(label)))
}

/// Seconds since the epoch, used to make created records unique per run.
pub(crate) fn run_stamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_order_and_personas() {
        let scenarios = workflow();
        let order: Vec<(&str, Role)> = scenarios.iter().map(|s| (s.name(), s.role())).collect();
        assert_eq!(
            order,
            vec![
                ("admin_full_flow", Role::Administrator),
                ("salesperson_sale", Role::Salesperson),
                ("stock_clerk_stock_management", Role::StockClerk),
                ("admin_monitoring_dashboard", Role::Administrator),
            ]
        );
    }

    #[test]
    fn test_modal_button_matches_exact_text() {
        assert_eq!(
            modal_button("Guardar"),
            Locator::XPath(".//button[text()='Guardar']".to_string())
        );
    }
}
