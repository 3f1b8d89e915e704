//! Explicit waits: poll a condition until it holds or the deadline passes.
//!
//! Rendering in the application under test is asynchronous relative to the
//! driving script, so every UI assertion goes through [`wait_until`]. Fixed
//! sleeps only appear as [`Pacing`] between steps that have already been
//! confirmed, and pacing can be disabled without changing any outcome.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::trace;

use crate::error::{E2eError, E2eResult};

/// Default bound for every explicit wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between two evaluations of a condition.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Timeout and poll interval shared by all waits in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// How an element is located in the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Id(String),
    Name(String),
    Css(String),
    XPath(String),
    LinkText(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn name(value: impl Into<String>) -> Self {
        Locator::Name(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        Locator::LinkText(value.into())
    }

    /// Any element whose text contains `text`.
    pub fn text_contains(text: &str) -> Self {
        Locator::XPath(format!("//*[contains(text(), {})]", xpath_literal(text)))
    }

    /// A button whose normalized text equals `label`.
    pub fn button(label: &str) -> Self {
        Locator::XPath(format!(
            "//button[normalize-space()={}]",
            xpath_literal(label)
        ))
    }

    /// A table row containing `text` anywhere in its cells.
    pub fn row_containing(text: &str) -> Self {
        Locator::XPath(format!("//tr[contains(., {})]", xpath_literal(text)))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "#{v}"),
            Locator::Name(v) => write!(f, "[name={v}]"),
            Locator::Css(v) => write!(f, "css {v}"),
            Locator::XPath(v) => write!(f, "xpath {v}"),
            Locator::LinkText(v) => write!(f, "link '{v}'"),
        }
    }
}

/// Quote `text` as an XPath 1.0 string literal.
///
/// XPath has no escape sequences, so text containing both quote kinds is
/// split and rejoined with `concat()`.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts: Vec<String> = text.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// A named predicate over the rendered UI.
///
/// `E` is the element handle type of the browser backend; it only appears in
/// [`WaitCondition::ElementStale`], which needs a previously located element.
#[derive(Debug, Clone)]
pub enum WaitCondition<E> {
    UrlContains(String),
    TitleContains(String),
    ElementVisible(Locator),
    ElementClickable(Locator),
    AlertPresent,
    ElementStale(E),
}

impl<E> WaitCondition<E> {
    pub fn describe(&self) -> String {
        match self {
            WaitCondition::UrlContains(s) => format!("url contains '{s}'"),
            WaitCondition::TitleContains(s) => format!("title contains '{s}'"),
            WaitCondition::ElementVisible(l) => format!("{l} visible"),
            WaitCondition::ElementClickable(l) => format!("{l} clickable"),
            WaitCondition::AlertPresent => "confirmation dialog present".to_string(),
            WaitCondition::ElementStale(_) => "element detached from page".to_string(),
        }
    }
}

/// What a [`WaitCondition`] can observe about the rendered UI.
#[async_trait]
pub trait Page: Sync {
    type Element: Send + Sync;

    async fn url(&self) -> E2eResult<String>;

    async fn title(&self) -> E2eResult<String>;

    /// First element at `locator` that is displayed.
    async fn first_visible(&self, locator: &Locator) -> E2eResult<Option<Self::Element>>;

    /// First element at `locator` that is displayed and enabled.
    async fn first_clickable(&self, locator: &Locator) -> E2eResult<Option<Self::Element>>;

    async fn alert_open(&self) -> E2eResult<bool>;

    /// Whether `element` is still part of the rendered document.
    async fn is_attached(&self, element: &Self::Element) -> E2eResult<bool>;
}

/// How a condition was met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Satisfied<E> {
    Page,
    Element(E),
}

/// Evaluate `condition` once against the current state of `page`.
pub async fn evaluate<P: Page + ?Sized>(
    page: &P,
    condition: &WaitCondition<P::Element>,
) -> E2eResult<Option<Satisfied<P::Element>>> {
    let met = match condition {
        WaitCondition::UrlContains(fragment) => page
            .url()
            .await?
            .contains(fragment.as_str())
            .then_some(Satisfied::Page),
        WaitCondition::TitleContains(fragment) => page
            .title()
            .await?
            .contains(fragment.as_str())
            .then_some(Satisfied::Page),
        WaitCondition::ElementVisible(locator) => {
            page.first_visible(locator).await?.map(Satisfied::Element)
        }
        WaitCondition::ElementClickable(locator) => {
            page.first_clickable(locator).await?.map(Satisfied::Element)
        }
        WaitCondition::AlertPresent => page.alert_open().await?.then_some(Satisfied::Page),
        WaitCondition::ElementStale(element) => {
            (!page.is_attached(element).await?).then_some(Satisfied::Page)
        }
    };
    Ok(met)
}

/// Block until `condition` holds on `page`.
pub async fn wait_on<P: Page + ?Sized>(
    page: &P,
    config: WaitConfig,
    condition: &WaitCondition<P::Element>,
) -> E2eResult<Satisfied<P::Element>> {
    let description = condition.describe();
    wait_until(config, &description, || evaluate(page, condition)).await
}

/// Wait for `locator` to show an element that replaced every one in `previous`.
///
/// Elements in `previous` must detach first, so a message left over from an
/// earlier action cannot satisfy the wait for the next one.
pub async fn wait_replaced<P: Page + ?Sized>(
    page: &P,
    config: WaitConfig,
    previous: Vec<P::Element>,
    locator: Locator,
) -> E2eResult<P::Element> {
    for old in previous {
        wait_on(page, config, &WaitCondition::ElementStale(old)).await?;
    }
    let condition = WaitCondition::ElementVisible(locator);
    match wait_on(page, config, &condition).await? {
        Satisfied::Element(el) => Ok(el),
        Satisfied::Page => Err(E2eError::AssertionFailed(format!(
            "'{}' matched no element",
            condition.describe()
        ))),
    }
}

/// Poll `check` until it yields a value or `config.timeout` elapses.
///
/// The check is evaluated once before any sleep, so a condition that already
/// holds returns without waiting. `Ok(None)` means "not yet"; an `Err` from
/// the check aborts the wait immediately.
pub async fn wait_until<T, F, Fut>(
    config: WaitConfig,
    description: &str,
    mut check: F,
) -> E2eResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Option<T>>>,
{
    let start = Instant::now();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        if let Some(value) = check().await? {
            trace!("'{}' satisfied after {} poll(s)", description, attempts);
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(E2eError::Timeout {
                condition: description.to_string(),
                timeout: config.timeout,
            });
        }

        sleep(config.poll_interval.min(config.timeout - elapsed)).await;
    }
}

/// Boolean form of [`wait_until`].
pub async fn wait_for<F, Fut>(config: WaitConfig, description: &str, mut check: F) -> E2eResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    wait_until(config, description, || {
        let fut = check();
        async move { Ok(fut.await?.then_some(())) }
    })
    .await
}

/// Human-paced delay between already-verified steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    pub delay: Duration,
}

impl Pacing {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_true_condition_returns_immediately() {
        let config = WaitConfig::new(Duration::from_secs(5), Duration::from_secs(1));
        let start = Instant::now();

        let result = wait_for(config, "always true", || async { Ok(true) }).await;

        assert!(result.is_ok());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_condition_satisfied_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let value = wait_until(
            WaitConfig::new(Duration::from_secs(5), Duration::from_millis(10)),
            "counter >= 3",
            move || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    Ok((n >= 3).then_some(n))
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_never_true_times_out_after_bound() {
        let timeout = Duration::from_millis(200);
        let start = Instant::now();

        let result = wait_for(
            WaitConfig::new(timeout, Duration::from_millis(20)),
            "impossible",
            || async { Ok(false) },
        )
        .await;

        let elapsed = start.elapsed();
        assert!(matches!(result, Err(E2eError::Timeout { .. })));
        assert!(elapsed >= timeout, "returned too early: {elapsed:?}");
        assert!(elapsed < timeout * 5, "returned too late: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_check_error_aborts_wait() {
        let result = wait_for(WaitConfig::default(), "broken check", || async {
            Err(E2eError::SessionClosed)
        })
        .await;

        assert!(matches!(result, Err(E2eError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_zero_pacing_does_not_sleep() {
        let start = Instant::now();
        Pacing::default().pause().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("Remover"), "'Remover'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn test_describe_names_the_condition() {
        let cond: WaitCondition<()> = WaitCondition::ElementVisible(Locator::id("addUserModal"));
        assert_eq!(cond.describe(), "#addUserModal visible");
        let stale: WaitCondition<()> = WaitCondition::ElementStale(());
        assert_eq!(stale.describe(), "element detached from page");
    }

    /// Rows keyed by id; a row is detached (and optionally replaced) once
    /// `detach` fires on an attachment check.
    struct FakeTable {
        rows: parking_lot::Mutex<Vec<u32>>,
        detach: parking_lot::Mutex<Option<(usize, u32, Option<u32>)>>,
        polls: AtomicU32,
        alert: bool,
    }

    impl FakeTable {
        fn new(rows: &[u32]) -> Self {
            Self {
                rows: parking_lot::Mutex::new(rows.to_vec()),
                detach: parking_lot::Mutex::new(None),
                polls: AtomicU32::new(0),
                alert: false,
            }
        }

        /// Remove `row` once `after` attachment checks have been made.
        fn delete_after(self, after: usize, row: u32) -> Self {
            *self.detach.lock() = Some((after, row, None));
            self
        }

        /// Swap `row` for `new` once `after` attachment checks have been made.
        fn replace_after(self, after: usize, row: u32, new: u32) -> Self {
            *self.detach.lock() = Some((after, row, Some(new)));
            self
        }
    }

    #[async_trait]
    impl Page for FakeTable {
        type Element = u32;

        async fn url(&self) -> E2eResult<String> {
            Ok("http://app/admin/dashboard?page_users=2".into())
        }

        async fn title(&self) -> E2eResult<String> {
            Ok("Painel do Administrador".into())
        }

        async fn first_visible(&self, _locator: &Locator) -> E2eResult<Option<u32>> {
            Ok(self.rows.lock().first().copied())
        }

        async fn first_clickable(&self, locator: &Locator) -> E2eResult<Option<u32>> {
            self.first_visible(locator).await
        }

        async fn alert_open(&self) -> E2eResult<bool> {
            Ok(self.alert)
        }

        async fn is_attached(&self, element: &u32) -> E2eResult<bool> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) as usize + 1;
            let mut detach = self.detach.lock();
            if let Some((after, row, replacement)) = *detach {
                if polls >= after {
                    let mut rows = self.rows.lock();
                    rows.retain(|r| *r != row);
                    rows.extend(replacement);
                    *detach = None;
                }
            }
            Ok(self.rows.lock().contains(element))
        }
    }

    fn quick() -> WaitConfig {
        WaitConfig::new(Duration::from_millis(150), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_page_conditions_evaluate_against_state() {
        let page = FakeTable::new(&[7]);

        let url = evaluate(&page, &WaitCondition::UrlContains("/admin/dashboard".into()))
            .await
            .unwrap();
        assert_eq!(url, Some(Satisfied::Page));

        let title = evaluate(&page, &WaitCondition::TitleContains("Terminal de Vendas".into()))
            .await
            .unwrap();
        assert_eq!(title, None);

        let row = evaluate(&page, &WaitCondition::ElementVisible(Locator::id("row")))
            .await
            .unwrap();
        assert_eq!(row, Some(Satisfied::Element(7)));

        let alert = evaluate(&page, &WaitCondition::AlertPresent).await.unwrap();
        assert_eq!(alert, None);
    }

    #[tokio::test]
    async fn test_deleted_row_reports_stale() {
        let page = FakeTable::new(&[7, 8]).delete_after(3, 7);

        let met = wait_on(&page, quick(), &WaitCondition::ElementStale(7)).await;

        assert_eq!(met.unwrap(), Satisfied::Page);
        assert_eq!(page.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_untouched_row_never_reports_stale() {
        let page = FakeTable::new(&[7, 8]).delete_after(1, 8);
        let start = Instant::now();

        let met = wait_on(&page, quick(), &WaitCondition::ElementStale(7)).await;

        assert!(matches!(met, Err(E2eError::Timeout { .. })));
        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(*page.rows.lock(), vec![7]);
    }

    #[tokio::test]
    async fn test_missing_element_is_not_visible() {
        let page = FakeTable::new(&[]);

        let met = wait_on(&page, quick(), &WaitCondition::ElementVisible(Locator::id("x"))).await;

        assert!(matches!(met, Err(E2eError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_replaced_notice_waits_for_the_old_one_to_go() {
        let page = FakeTable::new(&[7]).replace_after(3, 7, 9);

        let fresh = wait_replaced(&page, quick(), vec![7], Locator::id("notice")).await;

        assert_eq!(fresh.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_leftover_notice_does_not_count_as_fresh() {
        let page = FakeTable::new(&[7]);

        let fresh = wait_replaced(&page, quick(), vec![7], Locator::id("notice")).await;

        assert!(matches!(fresh, Err(E2eError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_first_notice_needs_no_predecessor() {
        let page = FakeTable::new(&[4]);

        let fresh = wait_replaced(&page, quick(), Vec::new(), Locator::id("notice")).await;

        assert_eq!(fresh.unwrap(), 4);
    }
}
