//! Job de sincronização do orçamento (planilha → amoCRM)
//!
//! A cada tick lê as linhas a partir do cursor, envia o orçamento das linhas
//! acionáveis para o amoCRM e avança o cursor uma linha por vez, com sucesso
//! ou falha. O cursor nunca retrocede.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::auth::AuthError;
use crate::models::budget_update;
use crate::services::{CrmError, LeadBudgetUpdater, SheetRowSource, SheetsError};
use crate::utils::logging::*;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to read sheet rows: {0}")]
    Sheet(#[from] SheetsError),

    /// Primeira obtenção de token do tick falhou
    #[error("amoCRM authorization unavailable: {0}")]
    Auth(#[source] AuthError),
}

/// Resultado de um tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub rows_read: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorSnapshot {
    last_processed_row: usize,
}

/// Cursor salvo em arquivo JSON (`{"last_processed_row": n}`)
pub struct CursorFile {
    path: PathBuf,
}

impl CursorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> std::io::Result<Option<usize>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let snapshot: CursorSnapshot = serde_json::from_str(&content)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                Ok(Some(snapshot.last_processed_row))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, cursor: usize) -> std::io::Result<()> {
        let json = serde_json::to_string(&CursorSnapshot { last_processed_row: cursor })
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await
    }
}

pub struct BudgetSyncJob {
    sheet: Arc<dyn SheetRowSource>,
    crm: Arc<dyn LeadBudgetUpdater>,
    /// Linhas já consumidas (offset da próxima leitura)
    cursor: AtomicUsize,
    cursor_file: Option<CursorFile>,
    /// Serializa ticks chamados fora do scheduler
    tick_lock: Mutex<()>,
}

impl BudgetSyncJob {
    pub fn new(sheet: Arc<dyn SheetRowSource>, crm: Arc<dyn LeadBudgetUpdater>) -> Self {
        Self {
            sheet,
            crm,
            cursor: AtomicUsize::new(0),
            cursor_file: None,
            tick_lock: Mutex::new(()),
        }
    }

    /// Carrega o cursor salvo; arquivo ausente ou inválido começa do zero
    pub async fn with_cursor_file(mut self, cursor_file: CursorFile) -> Self {
        match cursor_file.load().await {
            Ok(Some(cursor)) => {
                log_info(&format!(
                    "📂 [SyncBudget] Cursor {} carregado de {}",
                    cursor,
                    cursor_file.path().display()
                ));
                self.cursor.store(cursor, Ordering::SeqCst);
            }
            Ok(None) => {}
            Err(e) => log_warning(&format!(
                "⚠️ [SyncBudget] Cursor em {} ignorado: {}",
                cursor_file.path().display(),
                e
            )),
        }
        self.cursor_file = Some(cursor_file);
        self
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub async fn tick(&self) -> Result<TickReport, SyncError> {
        let _guard = self.tick_lock.lock().await;

        let start = self.cursor();
        let rows = self.sheet.read_rows_from(start).await?;
        let mut report = TickReport {
            rows_read: rows.len(),
            ..TickReport::default()
        };

        if rows.is_empty() {
            return Ok(report);
        }

        let mut outcome = Ok(());
        // qualquer resposta além de `CrmError::Auth` prova que houve token
        let mut token_obtained = false;
        for row in &rows {
            let Some(update) = budget_update(row) else {
                report.skipped += 1;
                self.cursor.fetch_add(1, Ordering::SeqCst);
                continue;
            };

            match self.crm.update_lead_budget(update.lead_id, update.budget).await {
                Ok(()) => {
                    token_obtained = true;
                    report.updated += 1;
                }
                Err(CrmError::Auth(e)) if !token_obtained => {
                    // linha atual e o restante ficam para o próximo tick
                    outcome = Err(SyncError::Auth(e));
                    break;
                }
                Err(e) => {
                    if !matches!(e, CrmError::Auth(_)) {
                        token_obtained = true;
                    }
                    log_error(&format!(
                        "❌ [SyncBudget] Falha ao atualizar lead {}: {}",
                        update.lead_id, e
                    ));
                    report.failed += 1;
                }
            }
            self.cursor.fetch_add(1, Ordering::SeqCst);
        }

        let end = self.cursor();
        if end != start {
            self.persist_cursor(end).await;
        }

        outcome?;
        log_sync_tick(report.rows_read, report.updated, report.skipped, report.failed, end);
        Ok(report)
    }

    async fn persist_cursor(&self, cursor: usize) {
        if let Some(cursor_file) = &self.cursor_file {
            if let Err(e) = cursor_file.save(cursor).await {
                log_warning(&format!("⚠️ [SyncBudget] Falha ao salvar cursor: {}", e));
            }
        }
    }
}
