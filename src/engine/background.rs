use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::engine::generator::GenerationReport;
use crate::AppState;

/// Runtime state for the background scheduler, shared across threads.
pub struct SchedulerState {
    running: AtomicBool,
    generation_in_progress: AtomicBool,
    runs_completed: AtomicU64,
    runs_skipped: AtomicU64,
    instances_generated: AtomicU64,
    template_failures: AtomicU64,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            generation_in_progress: AtomicBool::new(false),
            runs_completed: AtomicU64::new(0),
            runs_skipped: AtomicU64::new(0),
            instances_generated: AtomicU64::new(0),
            template_failures: AtomicU64::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
        tracing::info!("Scheduler started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        tracing::info!("Scheduler stopped");
    }

    /// Claim the generation slot. Returns `None` while another run holds it;
    /// the slot is released when the guard drops.
    pub fn try_begin_generation(&self) -> Option<GenerationGuard<'_>> {
        if self
            .generation_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(GenerationGuard { state: self })
        } else {
            self.runs_skipped.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn record_run(&self, report: &GenerationReport) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.instances_generated
            .fetch_add(report.generated_count as u64, Ordering::Relaxed);
        self.template_failures
            .fetch_add(report.failed_count() as u64, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            running: self.running.load(Ordering::Relaxed),
            generation_in_progress: self.generation_in_progress.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_skipped: self.runs_skipped.load(Ordering::Relaxed),
            instances_generated: self.instances_generated.load(Ordering::Relaxed),
            template_failures: self.template_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct GenerationGuard<'a> {
    state: &'a SchedulerState,
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        self.state
            .generation_in_progress
            .store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub running: bool,
    pub generation_in_progress: bool,
    pub runs_completed: u64,
    pub runs_skipped: u64,
    pub instances_generated: u64,
    pub template_failures: u64,
}

/// One scheduled generation pass. Errors are logged; the loop continues.
pub async fn generation_tick(state: &Arc<AppState>) {
    match crate::commands::bills::run_generation(state, None).await {
        Ok(report) => {
            for warning in report.sync.warnings() {
                tracing::warn!("Generated bill not mirrored: {}", warning);
            }
            tracing::debug!(
                generated = report.generated_count,
                templates = report.per_template_results.len(),
                "Scheduled generation pass finished"
            );
        }
        Err(crate::error::AppError::Busy(_)) => {
            tracing::debug!("Previous generation pass still running, skipping tick");
        }
        Err(e) => {
            tracing::error!("Scheduled generation failed: {}", e);
        }
    }
}
