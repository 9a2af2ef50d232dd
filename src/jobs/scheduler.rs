use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::sync_budget::BudgetSyncJob;
use crate::utils::logging::*;

/// Dispara o `BudgetSyncJob` em intervalo fixo
///
/// Cada tick é aguardado dentro do próprio loop: um tick nunca começa antes
/// do anterior terminar, e ticks perdidos são descartados.
#[derive(Clone)]
pub struct SyncScheduler {
    job: Arc<BudgetSyncJob>,
    interval_seconds: u64,
    running: Arc<RwLock<bool>>,
}

impl SyncScheduler {
    pub fn new(job: Arc<BudgetSyncJob>, interval_seconds: u64) -> Self {
        Self {
            job,
            interval_seconds: interval_seconds.max(1),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn start(&self) {
        let mut running = self.running.write().await;
        if *running {
            log_warning("Sync scheduler already running");
            return;
        }
        *running = true;
        drop(running);

        let scheduler = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(scheduler.interval_seconds));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            log_info(&format!(
                "⏱️ [SyncBudget] Job agendado a cada {}s (cursor inicial: {})",
                scheduler.interval_seconds,
                scheduler.job.cursor()
            ));

            loop {
                ticker.tick().await;

                if !*scheduler.running.read().await {
                    break;
                }

                if let Err(e) = scheduler.job.tick().await {
                    log_error(&format!("❌ [SyncBudget] Tick abortado: {}", e));
                }
            }

            log_info("[SyncBudget] Job removido do agendador");
        });
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        log_info("Sync scheduler stopped");
    }
}
