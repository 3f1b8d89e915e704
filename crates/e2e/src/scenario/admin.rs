//! Administrator: user create/delete round trip and product creation

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use super::{
    expect_fresh_notice, expect_route, login, modal_button, run_stamp, standing_notices, Ctx,
};
use crate::browser::{click_in, fill, select_by_index, select_by_text, BrowserSession};
use crate::error::{E2eError, E2eResult};
use crate::persona::{Role, PERSONA_PASSWORD};
use crate::runner::Scenario;
use crate::text::{Route, UiText};
use crate::wait::{xpath_literal, Locator, WaitCondition};

pub struct AdminWorkflow;

#[async_trait]
impl Scenario<BrowserSession> for AdminWorkflow {
    fn name(&self) -> &str {
        "admin_full_flow"
    }

    fn role(&self) -> Role {
        Role::Administrator
    }

    async fn run(&self, ctx: &Ctx<'_>) -> E2eResult<()> {
        login(ctx, Role::Administrator).await?;
        expect_route(ctx, Route::AdminDashboard).await?;
        ctx.artifacts.capture(ctx.session, "01_admin_dashboard").await;
        ctx.pause().await;

        let stamp = run_stamp();
        user_round_trip(ctx, stamp).await?;
        create_product(ctx, stamp).await
    }
}

async fn user_round_trip(ctx: &Ctx<'_>, stamp: i64) -> E2eResult<()> {
    let session = ctx.session;
    let text = ctx.text();
    let email = format!("user.teste.{}@email.com", stamp);
    info!("Adding user {}", email);

    session
        .clickable(Locator::button(&text.add_user_button))
        .await?
        .click()
        .await?;
    let modal = session.visible(Locator::id("addUserModal")).await?;
    ctx.artifacts.capture(session, "02_admin_add_user_modal").await;

    fill(&modal, &Locator::name("name"), "Utilizador de Teste CRUD").await?;
    fill(&modal, &Locator::name("email"), &email).await?;
    fill(&modal, &Locator::name("password"), PERSONA_PASSWORD).await?;
    select_by_text(&modal, &Locator::name("role"), &text.salesperson_role_option).await?;
    let standing = standing_notices(ctx, &text.user_added_notice).await?;
    click_in(&modal, &modal_button(&text.save_button)).await?;
    expect_fresh_notice(ctx, &text.user_added_notice, standing).await?;

    goto_last_user_page(ctx).await?;

    let row = session.visible(Locator::row_containing(&email)).await?;
    ctx.artifacts.capture(session, "03_admin_user_added").await;
    info!("New user listed");
    ctx.pause().await;

    info!("Removing user {}", email);
    let standing = standing_notices(ctx, &text.user_removed_notice).await?;
    click_in(
        &row,
        &Locator::xpath(format!(
            ".//button[normalize-space()={}]",
            xpath_literal(&text.remove_button)
        )),
    )
    .await?;
    session.accept_alert().await?;
    expect_fresh_notice(ctx, &text.user_removed_notice, standing).await?;

    session.wait_for(WaitCondition::ElementStale(row)).await?;
    let leftover = session.find_all(&Locator::row_containing(&email)).await?;
    if !leftover.is_empty() {
        return Err(E2eError::AssertionFailed(format!(
            "{} row(s) still list {} after deletion",
            leftover.len(),
            email
        )));
    }
    ctx.artifacts.capture(session, "04_admin_user_removed").await;
    info!("User removed");
    ctx.pause().await;
    Ok(())
}

/// New users land on the last page of the user table.
async fn goto_last_user_page(ctx: &Ctx<'_>) -> E2eResult<()> {
    let session = ctx.session;
    let text = ctx.text();
    let label = Locator::xpath(format!(
        "(//div[contains(@class, 'justify-center')]/span[contains(text(), {})])[1]",
        xpath_literal(&text.pagination_label)
    ));

    let Some(span) = session.find_all(&label).await?.into_iter().next() else {
        info!("User table is not paginated");
        return Ok(());
    };

    match total_pages(&span.text().await?, text) {
        Some(pages) if pages > 1 => {
            info!("Jumping to last user page ({})", pages);
            let url = session.current_url().await?;
            let base = url.split('?').next().unwrap_or(&url);
            session
                .navigate(&format!("{}?page_users={}", base, pages))
                .await
        }
        _ => {
            info!("User table fits on one page");
            Ok(())
        }
    }
}

/// Total page count from a caption such as "Página 2 de 5".
pub fn total_pages(caption: &str, text: &UiText) -> Option<u32> {
    let pattern = format!(
        r"{}\s+\d+\s+{}\s+(\d+)",
        regex::escape(&text.pagination_label),
        regex::escape(&text.pagination_separator)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(caption)?.get(1)?.as_str().parse().ok()
}

async fn create_product(ctx: &Ctx<'_>, stamp: i64) -> E2eResult<()> {
    let session = ctx.session;
    let text = ctx.text();
    let name = format!("Carro Teste Selenium {}", stamp);
    info!("Adding product {}", name);

    session
        .clickable(Locator::button(&text.add_product_button))
        .await?
        .click()
        .await?;
    let modal = session.visible(Locator::id("addProductModal")).await?;
    ctx.artifacts.capture(session, "05_admin_add_product_modal").await;

    let barcode = format!("789{}", stamp);
    let fields = [
        ("name", name.as_str()),
        ("barcode", barcode.as_str()),
        ("preco_custo", "50000.00"),
        ("percentual_lucro", "20"),
        ("imposto_estadual", "12"),
        ("imposto_federal", "15"),
    ];
    for (field, value) in fields {
        fill(&modal, &Locator::name(field), value).await?;
    }
    // Index 0 is the placeholder option.
    select_by_index(&modal, &Locator::name("filial_id"), 1).await?;
    fill(&modal, &Locator::name("quantity"), "5").await?;
    let standing = standing_notices(ctx, &text.product_added_notice).await?;
    click_in(&modal, &modal_button(&text.save_button)).await?;
    expect_fresh_notice(ctx, &text.product_added_notice, standing).await?;

    session
        .find(&Locator::name("search_products"))
        .await?
        .send_keys(name.as_str())
        .await?;
    session
        .find(&Locator::xpath(
            "//form[contains(@action, '/admin/dashboard')]//button[@type='submit']",
        ))
        .await?
        .click()
        .await?;

    session
        .visible(Locator::xpath(format!("//td[text()={}]", xpath_literal(&name))))
        .await?;
    ctx.artifacts.capture(session, "06_admin_product_added").await;
    info!("New product found by search");
    ctx.pause().await;
    Ok(())
}
