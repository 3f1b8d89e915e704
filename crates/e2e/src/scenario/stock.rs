//! Stock clerk: restock an existing product, then add stock as a new product

use async_trait::async_trait;
use thirtyfour::prelude::WebElement;
use tracing::info;

use super::{
    expect_fresh_notice, expect_route, login, modal_button, run_stamp, standing_notices, Ctx,
};
use crate::browser::{click_in, fill, select_by_text, text_in, BrowserSession};
use crate::error::E2eResult;
use crate::persona::Role;
use crate::runner::Scenario;
use crate::text::Route;
use crate::wait::Locator;

pub struct StockWorkflow;

#[async_trait]
impl Scenario<BrowserSession> for StockWorkflow {
    fn name(&self) -> &str {
        "stock_clerk_stock_management"
    }

    fn role(&self) -> Role {
        Role::StockClerk
    }

    async fn run(&self, ctx: &Ctx<'_>) -> E2eResult<()> {
        login(ctx, Role::StockClerk).await?;
        expect_route(ctx, Route::StockDashboard).await?;
        ctx.artifacts.capture(ctx.session, "12_stock_dashboard").await;
        ctx.pause().await;

        restock_existing(ctx).await?;
        stock_new_product(ctx, run_stamp()).await
    }
}

async fn open_stock_modal(ctx: &Ctx<'_>) -> E2eResult<WebElement> {
    ctx.session
        .clickable(Locator::button(&ctx.text().add_stock_button))
        .await?
        .click()
        .await?;
    ctx.session.visible(Locator::id("addStockModal")).await
}

async fn restock_existing(ctx: &Ctx<'_>) -> E2eResult<()> {
    let session = ctx.session;
    let text = ctx.text();

    let first = session.visible(Locator::xpath("//table/tbody/tr[1]")).await?;
    let product = text_in(&first, &Locator::xpath("./td[1]")).await?;
    let product = product.trim();
    info!("Restocking '{}'", product);

    let modal = open_stock_modal(ctx).await?;
    ctx.artifacts.capture(session, "13_stock_add_modal").await;

    select_by_text(&modal, &Locator::name("product_id"), product).await?;
    fill(&modal, &Locator::name("quantity"), "50").await?;
    let standing = standing_notices(ctx, &text.stock_added_notice).await?;
    click_in(&modal, &modal_button(&text.add_button)).await?;
    expect_fresh_notice(ctx, &text.stock_added_notice, standing).await?;
    ctx.artifacts.capture(session, "14_stock_existing_added").await;
    ctx.pause().await;
    Ok(())
}

async fn stock_new_product(ctx: &Ctx<'_>, stamp: i64) -> E2eResult<()> {
    let session = ctx.session;
    let text = ctx.text();
    let name = format!("Produto Teste Selenium {}", stamp);
    info!("Stocking new product {}", name);

    let modal = open_stock_modal(ctx).await?;
    select_by_text(&modal, &Locator::name("add_type"), &text.create_product_option).await?;
    let fields = session.visible(Locator::id("newProductFields")).await?;
    ctx.artifacts.capture(session, "15_stock_new_product_form").await;

    let barcode = stamp.to_string();
    fill(&fields, &Locator::name("new_product_name"), &name).await?;
    fill(&fields, &Locator::name("new_product_barcode"), &barcode).await?;
    fill(&fields, &Locator::name("new_product_price"), "19.99").await?;
    fill(&modal, &Locator::name("quantity"), "150").await?;
    // The notice from the restock above is usually still on screen.
    let standing = standing_notices(ctx, &text.stock_added_notice).await?;
    click_in(&modal, &modal_button(&text.add_button)).await?;
    expect_fresh_notice(ctx, &text.stock_added_notice, standing).await?;
    ctx.artifacts.capture(session, "16_stock_new_product_added").await;
    ctx.pause().await;
    Ok(())
}
