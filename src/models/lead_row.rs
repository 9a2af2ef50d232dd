use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Linha do lead escrita pelo webhook (colunas A..H)
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRow {
    pub id: u64,
    pub created_at: String,
    pub phone: String,
    pub contact_name: String,
    pub responsible_user: String,
    pub responsible_user_id: Option<u64>,
    pub price: Option<f64>,
    pub is_completed: bool,
}

impl LeadRow {
    /// Células na ordem das colunas; `USER_ENTERED` converte números
    pub fn to_cells(&self) -> Vec<Value> {
        vec![
            json!(self.id),
            json!(self.created_at),
            json!(self.phone),
            json!(self.contact_name),
            json!(self.responsible_user),
            self.responsible_user_id.map(|id| json!(id)).unwrap_or_else(|| json!("")),
            self.price.map(number_cell).unwrap_or_else(|| json!("")),
            json!(completed_label(self.is_completed)),
        ]
    }
}

pub fn completed_label(is_completed: bool) -> &'static str {
    if is_completed {
        "Да"
    } else {
        "Нет"
    }
}

/// Data de criação no formato `dd.mm.yyyy, HH:MM:SS`
pub fn format_created_at(epoch_secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format("%d.%m.%Y, %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn number_cell(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_created_at() {
        assert_eq!(format_created_at(1_700_000_000), "14.11.2023, 22:13:20");
    }

    #[test]
    fn test_to_cells() {
        let row = LeadRow {
            id: 10,
            created_at: "14.11.2023, 22:13:20".to_string(),
            phone: "+79001112233".to_string(),
            contact_name: "Мария".to_string(),
            responsible_user: "Manager".to_string(),
            responsible_user_id: Some(9),
            price: Some(500.0),
            is_completed: true,
        };
        assert_eq!(
            row.to_cells(),
            vec![
                json!(10),
                json!("14.11.2023, 22:13:20"),
                json!("+79001112233"),
                json!("Мария"),
                json!("Manager"),
                json!(9),
                json!(500),
                json!("Да"),
            ]
        );
    }

    #[test]
    fn test_to_cells_missing_values() {
        let row = LeadRow {
            id: 11,
            created_at: String::new(),
            phone: String::new(),
            contact_name: String::new(),
            responsible_user: String::new(),
            responsible_user_id: None,
            price: None,
            is_completed: false,
        };
        let cells = row.to_cells();
        assert_eq!(cells[5], json!(""));
        assert_eq!(cells[6], json!(""));
        assert_eq!(cells[7], json!("Нет"));
    }
}
