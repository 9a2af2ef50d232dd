//! Linha lida pelo job de orçamento
//!
//! A planilha tem 8 colunas fixas; o job só consulta a coluna 0 (ID do lead)
//! e a coluna 6 (orçamento).

pub const LEAD_ID_COLUMN: usize = 0;
pub const BUDGET_COLUMN: usize = 6;

/// Atualização extraída de uma linha acionável
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetUpdate {
    pub lead_id: u64,
    pub budget: f64,
}

/// Orçamento presente, não vazio e numérico finito
pub fn parse_budget(cell: Option<&str>) -> Option<f64> {
    let cell = cell?.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// ID do lead como inteiro positivo (aceita "10" e "10.0")
pub fn parse_lead_id(cell: Option<&str>) -> Option<u64> {
    let cell = cell?.trim();
    if let Ok(id) = cell.parse::<u64>() {
        return (id > 0).then_some(id);
    }
    let value = cell.parse::<f64>().ok()?;
    (value.is_finite() && value >= 1.0 && value.fract() == 0.0 && value <= u64::MAX as f64)
        .then_some(value as u64)
}

/// `Some` apenas para linhas acionáveis
pub fn budget_update(row: &[String]) -> Option<BudgetUpdate> {
    let budget = parse_budget(row.get(BUDGET_COLUMN).map(String::as_str))?;
    let lead_id = parse_lead_id(row.get(LEAD_ID_COLUMN).map(String::as_str))?;
    Some(BudgetUpdate { lead_id, budget })
}
