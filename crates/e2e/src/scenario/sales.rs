//! Salesperson: search the catalogue, cart one item, finalize the sale

use async_trait::async_trait;
use tracing::info;

use super::{expect_route, login, Ctx};
use crate::browser::BrowserSession;
use crate::error::{E2eError, E2eResult};
use crate::persona::Role;
use crate::runner::Scenario;
use crate::text::{Route, UiText};
use crate::wait::{Locator, WaitCondition};

/// Seeded catalogue term the search must find.
const SEARCH_TERM: &str = "Arroz";

/// Selectable search results; placeholders lack the pointer class.
const SEARCH_HIT: &str = "#search-results div.cursor-pointer";

/// Row rendered while the cart is empty.
const EMPTY_CART_ROW: &str = "empty-cart-row";

const CART_LINE: &str = "#cart-items tr:not(#empty-cart-row)";

pub struct SalesWorkflow;

#[async_trait]
impl Scenario<BrowserSession> for SalesWorkflow {
    fn name(&self) -> &str {
        "salesperson_sale"
    }

    fn role(&self) -> Role {
        Role::Salesperson
    }

    async fn run(&self, ctx: &Ctx<'_>) -> E2eResult<()> {
        let session = ctx.session;

        login(ctx, Role::Salesperson).await?;
        expect_route(ctx, Route::SalesTerminal).await?;
        ctx.artifacts.capture(session, "09_sales_terminal_empty").await;

        info!("Searching for '{}'", SEARCH_TERM);
        let placeholder = session.visible(Locator::id(EMPTY_CART_ROW)).await?;
        session
            .visible(Locator::id("product-search"))
            .await?
            .send_keys(SEARCH_TERM)
            .await?;
        let hit = match session.clickable(Locator::css(SEARCH_HIT)).await {
            Ok(hit) => hit,
            Err(E2eError::Timeout { .. }) => {
                let shown = match session.find(&Locator::id("search-results")).await {
                    Ok(results) => results.text().await.unwrap_or_default(),
                    Err(_) => String::new(),
                };
                return Err(no_catalogue_entry(&shown, ctx.text()));
            }
            Err(e) => return Err(e),
        };
        let label = hit.text().await?;
        info!("Adding '{}' to the cart", product_name(&label));
        hit.click().await?;

        session
            .wait_for(WaitCondition::ElementStale(placeholder))
            .await
            .map_err(|e| match e {
                E2eError::Timeout { .. } => {
                    E2eError::AssertionFailed("cart stayed empty after selecting a product".into())
                }
                other => other,
            })?;
        session.visible(Locator::css(CART_LINE)).await?;
        let lines = session.find_all(&Locator::css(CART_LINE)).await?.len();
        expect_single_line(lines)?;
        ctx.artifacts.capture(session, "10_sales_item_in_cart").await;
        ctx.pause().await;

        info!("Finalizing sale");
        session
            .clickable(Locator::id("finalize-sale-btn"))
            .await?
            .click()
            .await?;
        let message = session.accept_alert().await.map_err(|e| match e {
            E2eError::Timeout { .. } => {
                E2eError::AssertionFailed("sale confirmation dialog did not appear".into())
            }
            other => other,
        })?;
        expect_sale_completed(&message, ctx.text())?;
        ctx.artifacts.capture(session, "11_sales_sale_finalized").await;
        info!("Sale finalized");
        ctx.pause().await;
        Ok(())
    }
}

/// Product name from a search result such as "Arroz 5kg - R$ 25,00".
fn product_name(label: &str) -> &str {
    label.split(" - ").next().unwrap_or(label).trim()
}

fn no_catalogue_entry(shown: &str, text: &UiText) -> E2eError {
    let shown = shown.trim();
    let detail = if shown.is_empty() {
        "no results rendered".to_string()
    } else if shown.contains(text.no_search_results.as_str()) {
        "catalogue has no match".to_string()
    } else {
        format!("results show '{}'", shown)
    };
    E2eError::AssertionFailed(format!(
        "search for '{}' returned no catalogue entry: {}",
        SEARCH_TERM, detail
    ))
}

fn expect_single_line(lines: usize) -> E2eResult<()> {
    if lines == 1 {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "expected 1 cart line, found {}",
            lines
        )))
    }
}

/// The dialog after finalizing reports either success or the server's error.
fn expect_sale_completed(message: &str, text: &UiText) -> E2eResult<()> {
    if message.contains(text.sale_completed_alert.as_str()) {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!("sale was rejected: {}", message)))
    }
}
