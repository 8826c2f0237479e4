//! Materializes concrete bill instances from active templates over a
//! rolling horizon.
//!
//! Re-running is safe: every candidate date is checked against the store
//! before it is staged, so a second pass in the same day inserts nothing.
//! Two passes racing each other can still both pass that check; the unique
//! index on `(bill_name, user_id, due_date)` then rejects the loser's batch
//! and the template is reported as failed for that pass.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::db::models::{Bill, NewBill};
use crate::engine::calendar::SyncReport;
use crate::engine::recurrence::{DateRules, RecurrenceRule};
use crate::engine::store::BillStore;
use crate::error::AppError;

pub const DEFAULT_HORIZON_DAYS: u32 = 90;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TemplateOutcome {
    Generated { count: usize },
    Skipped { reason: String },
    Failed { kind: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateResult {
    pub template_id: String,
    pub bill_name: String,
    pub user_id: String,
    #[serde(flatten)]
    pub outcome: TemplateOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub generated_count: usize,
    pub per_template_results: Vec<TemplateResult>,
    /// Instances committed by this pass, in insertion order.
    #[serde(skip)]
    pub created: Vec<Bill>,
    /// Calendar steps taken for `created` after the pass committed.
    pub sync: SyncReport,
}

impl GenerationReport {
    pub fn failed_count(&self) -> usize {
        self.per_template_results
            .iter()
            .filter(|r| matches!(r.outcome, TemplateOutcome::Failed { .. }))
            .count()
    }
}

pub struct RecurringBillGenerator<'a> {
    store: &'a dyn BillStore,
    rules: DateRules,
}

impl<'a> RecurringBillGenerator<'a> {
    pub fn new(store: &'a dyn BillStore, rules: DateRules) -> Self {
        Self { store, rules }
    }

    /// Generate instances for every active template in the store.
    ///
    /// Only the template listing itself can fail the whole run; per-template
    /// errors are captured in the report.
    pub fn generate_all(&self, horizon_days: u32, now: NaiveDate) -> Result<GenerationReport, AppError> {
        let templates = self.store.active_templates()?;
        Ok(self.generate(&templates, horizon_days, now))
    }

    pub fn generate(&self, templates: &[Bill], horizon_days: u32, now: NaiveDate) -> GenerationReport {
        let limit = now
            .checked_add_days(Days::new(u64::from(horizon_days)))
            .unwrap_or(NaiveDate::MAX);

        let mut report = GenerationReport::default();
        for template in templates {
            let (outcome, created) = self.generate_for_template(template, now, limit);
            report.created.extend(created);
            match &outcome {
                TemplateOutcome::Generated { count } => {
                    report.generated_count += count;
                    if *count > 0 {
                        tracing::info!(
                            template_id = %template.id,
                            bill = %template.bill_name,
                            count,
                            "Generated bill instances"
                        );
                    }
                }
                TemplateOutcome::Skipped { reason } => {
                    tracing::debug!(template_id = %template.id, reason = %reason, "Template skipped");
                }
                TemplateOutcome::Failed { kind, message } => {
                    tracing::warn!(
                        template_id = %template.id,
                        bill = %template.bill_name,
                        kind = %kind,
                        "Bill generation failed: {}",
                        message
                    );
                }
            }
            report.per_template_results.push(TemplateResult {
                template_id: template.id.clone(),
                bill_name: template.bill_name.clone(),
                user_id: template.user_id.clone(),
                outcome,
            });
        }
        report
    }

    fn generate_for_template(
        &self,
        template: &Bill,
        now: NaiveDate,
        limit: NaiveDate,
    ) -> (TemplateOutcome, Vec<Bill>) {
        if !template.is_active_template() {
            let reason = "not an active template".into();
            return (TemplateOutcome::Skipped { reason }, Vec::new());
        }

        // Rule problems surface before the store is touched
        let rule = match template.rule() {
            Ok(rule) => rule,
            Err(e) => return (failed(&e), Vec::new()),
        };
        if !rule.is_generatable() {
            let reason = format!("{} bills are not generated", rule.kind().as_str());
            return (TemplateOutcome::Skipped { reason }, Vec::new());
        }

        let staged = match self.stage(template, &rule, now, limit) {
            Ok(staged) => staged,
            Err(e) => return (failed(&e), Vec::new()),
        };
        if staged.is_empty() {
            return (TemplateOutcome::Generated { count: 0 }, Vec::new());
        }

        match self.store.insert_many(staged) {
            Ok(created) => (
                TemplateOutcome::Generated {
                    count: created.len(),
                },
                created,
            ),
            Err(e) => (failed(&e), Vec::new()),
        }
    }

    fn stage(
        &self,
        template: &Bill,
        rule: &RecurrenceRule,
        now: NaiveDate,
        limit: NaiveDate,
    ) -> Result<Vec<NewBill>, AppError> {
        let start = match self
            .store
            .find_latest_by_name(&template.bill_name, &template.user_id)?
        {
            Some(latest) => self.rules.next_due_date(latest.due_date, rule),
            None if template.due_date > now => Some(template.due_date),
            None => self.rules.next_due_date(template.due_date, rule),
        };

        let mut staged = Vec::new();
        let mut candidate = start;
        while let Some(due) = candidate.filter(|d| *d <= limit) {
            let next = self.rules.next_due_date(due, rule);
            if next.is_some_and(|n| n <= due) {
                return Err(AppError::InvalidRecurrence(format!(
                    "rule for '{}' does not advance past {due}",
                    template.bill_name
                )));
            }

            if !self
                .store
                .exists_for_date(&template.bill_name, &template.user_id, due)?
            {
                staged.push(template.instantiate(due, next));
            }
            candidate = next;
        }
        Ok(staged)
    }
}

fn failed(e: &AppError) -> TemplateOutcome {
    TemplateOutcome::Failed {
        kind: e.kind().to_string(),
        message: e.to_string(),
    }
}
