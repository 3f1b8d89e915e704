//! Displayed copy the scenarios assert on, keyed by meaning
//!
//! Scenario code never embeds literal UI text. It asks [`UiText`] for the
//! label of a concept ("success notice after adding a user") so a change of
//! wording or locale only touches this table or an override file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::E2eResult;

/// Application routes consumed by the scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    AdminDashboard,
    SalesTerminal,
    StockDashboard,
    Monitoring,
}

impl Route {
    /// URL fragment that identifies the route.
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::AdminDashboard => "/admin/dashboard",
            Route::SalesTerminal => "/vendas/terminal",
            Route::StockDashboard => "/estoque/dashboard",
            Route::Monitoring => "/admin/monitoring",
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiText {
    // Page titles
    pub login_title: String,
    pub admin_dashboard_title: String,
    pub sales_terminal_title: String,
    pub stock_dashboard_title: String,
    pub monitoring_title: String,

    // Administrator dashboard
    pub add_user_button: String,
    pub add_product_button: String,
    pub save_button: String,
    pub remove_button: String,
    pub salesperson_role_option: String,
    pub user_added_notice: String,
    pub user_removed_notice: String,
    pub product_added_notice: String,
    /// Leading word of the pagination label, e.g. "Página 1 de 3".
    pub pagination_label: String,
    /// Separator between current and total page in the pagination label.
    pub pagination_separator: String,

    // Sales terminal
    /// Placeholder shown when a catalogue search matches nothing.
    pub no_search_results: String,
    /// Dialog message confirming a finalized sale.
    pub sale_completed_alert: String,

    // Stock dashboard
    pub add_stock_button: String,
    pub add_button: String,
    pub create_product_option: String,
    pub stock_added_notice: String,

    // Monitoring
    pub monitoring_link: String,
    pub total_revenue_kpi: String,
    pub transaction_count_kpi: String,
    pub average_ticket_kpi: String,
    pub low_stock_alerts: String,
}

impl Default for UiText {
    fn default() -> Self {
        Self {
            login_title: "Login".to_string(),
            admin_dashboard_title: "Painel do Administrador".to_string(),
            sales_terminal_title: "Terminal de Vendas".to_string(),
            stock_dashboard_title: "Painel de Stock".to_string(),
            monitoring_title: "Dashboard de Monitoramento".to_string(),

            add_user_button: "+ Adicionar Utilizador".to_string(),
            add_product_button: "+ Adicionar Produto".to_string(),
            save_button: "Guardar".to_string(),
            remove_button: "Remover".to_string(),
            salesperson_role_option: "Vendedor".to_string(),
            user_added_notice: "Utilizador adicionado com sucesso!".to_string(),
            user_removed_notice: "Utilizador removido com sucesso!".to_string(),
            product_added_notice: "Produto adicionado com sucesso!".to_string(),
            pagination_label: "Página".to_string(),
            pagination_separator: "de".to_string(),

            no_search_results: "Nenhum produto encontrado.".to_string(),
            sale_completed_alert: "Venda finalizada com sucesso!".to_string(),

            add_stock_button: "+ Adicionar Stock".to_string(),
            add_button: "Adicionar".to_string(),
            create_product_option: "Criar Novo Produto".to_string(),
            stock_added_notice: "Stock adicionado com sucesso!".to_string(),

            monitoring_link: "Monitoramento".to_string(),
            total_revenue_kpi: "Faturamento Total".to_string(),
            transaction_count_kpi: "Total de Transações".to_string(),
            average_ticket_kpi: "Ticket Médio".to_string(),
            low_stock_alerts: "Alertas de Stock Baixo".to_string(),
        }
    }
}

impl UiText {
    /// Parse a table from YAML; keys that are absent keep their defaults.
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Expected page title once `route` has rendered.
    pub fn title_for(&self, route: Route) -> &str {
        match route {
            Route::Login => &self.login_title,
            Route::AdminDashboard => &self.admin_dashboard_title,
            Route::SalesTerminal => &self.sales_terminal_title,
            Route::StockDashboard => &self.stock_dashboard_title,
            Route::Monitoring => &self.monitoring_title,
        }
    }

    /// The three monitoring KPI labels in display order.
    pub fn kpi_labels(&self) -> [&str; 3] {
        [
            &self.total_revenue_kpi,
            &self.transaction_count_kpi,
            &self.average_ticket_kpi,
        ]
    }
}
