//! Payload do webhook de leads do amoCRM
//!
//! O amoCRM envia `application/x-www-form-urlencoded` com chaves em colchetes
//! (`leads[status][0][id]=123`). O corpo é convertido em `serde_json::Value`
//! e os eventos de lead são extraídos de `leads.add`, `leads.status` e
//! `leads.update`.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Converte um corpo form-urlencoded com chaves aninhadas em JSON
pub fn parse_form_body(body: &str) -> Value {
    let mut root = Value::Object(Map::new());

    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        let segments = key_segments(&key);
        if segments.is_empty() {
            continue;
        }
        insert_path(&mut root, &segments, Value::String(value.into_owned()));
    }

    objects_to_arrays(root)
}

/// `leads[add][0][id]` → `["leads", "add", "0", "id"]`
fn key_segments(key: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let (head, mut rest) = match key.find('[') {
        Some(pos) => (&key[..pos], &key[pos..]),
        None => (key, ""),
    };
    if head.is_empty() {
        return segments;
    }
    segments.push(head.to_string());

    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => {
                segments.push(stripped[..end].to_string());
                rest = &stripped[end + 1..];
            }
            None => break,
        }
    }
    segments
}

fn insert_path(node: &mut Value, segments: &[String], value: Value) {
    let Value::Object(map) = node else {
        return;
    };

    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return,
    };

    // `[]` acrescenta no próximo índice livre
    let key = if first.is_empty() {
        map.len().to_string()
    } else {
        first.clone()
    };

    if rest.is_empty() {
        map.insert(key, value);
        return;
    }

    let child = map
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    insert_path(child, rest, value);
}

/// Objetos cujas chaves são todas índices viram arrays ordenados
fn objects_to_arrays(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let all_indices = !map.is_empty() && map.keys().all(|k| k.parse::<usize>().is_ok());
            if all_indices {
                let mut items: Vec<(usize, Value)> = map
                    .into_iter()
                    .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, objects_to_arrays(v))))
                    .collect();
                items.sort_by_key(|(i, _)| *i);
                Value::Array(items.into_iter().map(|(_, v)| v).collect())
            } else {
                Value::Object(map.into_iter().map(|(k, v)| (k, objects_to_arrays(v))).collect())
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(objects_to_arrays).collect()),
        other => other,
    }
}

/// Lead como chega no webhook (valores costumam vir como string)
#[derive(Debug, Clone, PartialEq)]
pub struct LeadEvent {
    pub id: u64,
    pub status_id: Option<i64>,
    pub pipeline_id: Option<i64>,
    pub price: Option<f64>,
    pub responsible_user_id: Option<u64>,
    pub created_at: Option<i64>,
    pub contact_ids: Vec<u64>,
}

impl LeadEvent {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = as_u64(value.get("id")?)?;

        let contact_ids = value
            .get("contacts")
            .or_else(|| value.get("_embedded").and_then(|e| e.get("contacts")))
            .and_then(Value::as_array)
            .map(|contacts| {
                contacts
                    .iter()
                    .filter_map(|c| c.get("id").and_then(as_u64))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id,
            status_id: value.get("status_id").and_then(as_i64),
            pipeline_id: value.get("pipeline_id").and_then(as_i64),
            price: value.get("price").and_then(as_f64),
            responsible_user_id: value.get("responsible_user_id").and_then(as_u64).filter(|id| *id > 0),
            created_at: value
                .get("created_at")
                .or_else(|| value.get("date_create"))
                .and_then(as_i64),
            contact_ids,
        })
    }
}

/// Que tipo de evento trouxe o lead
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeadChange {
    pub is_new: bool,
    pub is_status_changed: bool,
    pub is_updated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LeadsWebhook {
    pub add: Vec<LeadEvent>,
    pub status: Vec<LeadEvent>,
    pub update: Vec<LeadEvent>,
}

impl LeadsWebhook {
    /// `None` quando o payload não tem `leads`
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let leads = payload.get("leads")?;
        let events = |kind: &str| -> Vec<LeadEvent> {
            match leads.get(kind) {
                Some(Value::Array(items)) => items.iter().filter_map(LeadEvent::from_value).collect(),
                Some(item @ Value::Object(_)) => LeadEvent::from_value(item).into_iter().collect(),
                _ => Vec::new(),
            }
        };

        Some(Self {
            add: events("add"),
            status: events("status"),
            update: events("update"),
        })
    }

    /// Leads únicos por ID (primeira ocorrência em add → status → update)
    pub fn unique_leads(&self) -> Vec<(LeadEvent, LeadChange)> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();

        for lead in self.add.iter().chain(&self.status).chain(&self.update) {
            if !seen.insert(lead.id) {
                continue;
            }
            let change = LeadChange {
                is_new: self.add.iter().any(|l| l.id == lead.id),
                is_status_changed: self.status.iter().any(|l| l.id == lead.id),
                is_updated: self.update.iter().any(|l| l.id == lead.id),
            };
            result.push((lead.clone(), change));
        }

        result
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok().filter(|v: &f64| v.is_finite()),
        _ => None,
    }
}
