//! Enrichment of company records from a web search collaborator
//!
//! Neither collaborator is implemented here: a search backend and a record
//! store plug in through [`SearchEngine`] and [`CompanyStore`]. This module
//! owns the orchestration: which queries to run, what to keep from the
//! results, and how "searched, nothing found" is recorded.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// A web search backend. Results are ordered best first and may be empty.
pub trait SearchEngine {
    fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// A company awaiting enrichment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

/// Result of looking up one field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FieldState {
    /// Not looked up; the store leaves the field untouched
    #[default]
    NotSearched,
    Found(String),
    /// Looked up without result; a SQL store would persist this as ''
    NotFound,
}

impl FieldState {
    pub fn value(&self) -> Option<&str> {
        match self {
            FieldState::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldState::Found(_))
    }
}

/// Fields written back for one company
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentUpdate {
    pub homepage_url: FieldState,
    pub contact_url: FieldState,
    pub description: FieldState,
}

impl EnrichmentUpdate {
    pub fn found_any(&self) -> bool {
        self.homepage_url.is_found() || self.contact_url.is_found() || self.description.is_found()
    }

    fn field_mut(&mut self, lookup: Lookup) -> &mut FieldState {
        match lookup {
            Lookup::Homepage => &mut self.homepage_url,
            Lookup::Contact => &mut self.contact_url,
            Lookup::Description => &mut self.description,
        }
    }
}

/// The record store holding companies
pub trait CompanyStore {
    /// Companies that have not been searched yet, in a stable order
    fn fetch_unenriched(&mut self, limit: usize, offset: usize) -> Result<Vec<Company>>;

    /// Persist `update`; `Ok(false)` when the store refused it
    fn update(&mut self, id: i64, update: &EnrichmentUpdate) -> Result<bool>;
}

/// A field looked up with its own query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Homepage,
    Contact,
    Description,
}

impl Lookup {
    pub const ALL: [Lookup; 3] = [Lookup::Homepage, Lookup::Contact, Lookup::Description];

    pub fn query(self, company_name: &str) -> String {
        let suffix = match self {
            Lookup::Homepage => "公式ホームページ",
            Lookup::Contact => "お問い合わせ",
            Lookup::Description => "業界 事業内容",
        };
        format!("{} {}", company_name, suffix)
    }

    /// The part of a hit this lookup keeps
    fn pick(self, hit: &SearchHit) -> &str {
        match self {
            Lookup::Homepage | Lookup::Contact => &hit.url,
            Lookup::Description => &hit.description,
        }
    }
}

/// Run every lookup for `company`; the first hit wins and an empty value
/// counts as not found
pub fn lookup_company(engine: &dyn SearchEngine, company: &Company) -> Result<EnrichmentUpdate> {
    let mut update = EnrichmentUpdate::default();
    for lookup in Lookup::ALL {
        let query = lookup.query(&company.name);
        debug!(id = company.id, %query, "searching");
        let hits = engine.search(&query)?;
        *update.field_mut(lookup) = match hits.first().map(|hit| lookup.pick(hit).trim()) {
            Some(value) if !value.is_empty() => FieldState::Found(value.to_string()),
            _ => FieldState::NotFound,
        };
    }
    Ok(update)
}

/// What happened to one company
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    /// At least one field found and stored
    Updated { id: i64, update: EnrichmentUpdate },
    /// Nothing found; stored as searched-without-result
    MarkedNotFound { id: i64 },
    /// The store refused the update
    Rejected { id: i64 },
    Failed { id: i64, error: String },
}

impl EnrichmentOutcome {
    /// Whether the company is still unenriched in the store afterwards
    fn left_pending(&self) -> bool {
        matches!(
            self,
            EnrichmentOutcome::Rejected { .. } | EnrichmentOutcome::Failed { .. }
        )
    }
}

/// Totals over a run, aggregated from per-company outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub processed: usize,
    pub updated: usize,
    pub marked_not_found: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl<'a> FromIterator<&'a EnrichmentOutcome> for EnrichmentReport {
    fn from_iter<I: IntoIterator<Item = &'a EnrichmentOutcome>>(iter: I) -> Self {
        iter.into_iter()
            .fold(EnrichmentReport::default(), |mut report, outcome| {
                report.processed += 1;
                match outcome {
                    EnrichmentOutcome::Updated { .. } => report.updated += 1,
                    EnrichmentOutcome::MarkedNotFound { .. } => report.marked_not_found += 1,
                    EnrichmentOutcome::Rejected { .. } => report.rejected += 1,
                    EnrichmentOutcome::Failed { .. } => report.failed += 1,
                }
                report
            })
    }
}

/// Drives enrichment one company at a time
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    limit: Option<usize>,
}

impl Enricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after this many companies
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Look up one company and write the result back
    pub fn process(
        &self,
        store: &mut dyn CompanyStore,
        engine: &dyn SearchEngine,
        company: &Company,
    ) -> EnrichmentOutcome {
        let id = company.id;
        let update = match lookup_company(engine, company) {
            Ok(update) => update,
            Err(e) => {
                warn!(id, name = %company.name, error = %e, "search failed");
                return EnrichmentOutcome::Failed {
                    id,
                    error: format!("{:#}", e),
                };
            }
        };

        match store.update(id, &update) {
            Ok(true) if update.found_any() => EnrichmentOutcome::Updated { id, update },
            Ok(true) => EnrichmentOutcome::MarkedNotFound { id },
            Ok(false) => {
                warn!(id, "store rejected update");
                EnrichmentOutcome::Rejected { id }
            }
            Err(e) => {
                warn!(id, error = %e, "store update failed");
                EnrichmentOutcome::Failed {
                    id,
                    error: format!("{:#}", e),
                }
            }
        }
    }

    /// Process companies until the store has none left or the limit is hit.
    ///
    /// Companies whose update did not land stay unenriched in the store;
    /// the fetch offset moves past them so they are not retried this run.
    /// Only a failing fetch aborts the run.
    pub fn run(
        &self,
        store: &mut dyn CompanyStore,
        engine: &dyn SearchEngine,
    ) -> Result<(EnrichmentReport, Vec<EnrichmentOutcome>)> {
        let mut outcomes = Vec::new();
        let mut offset = 0;

        while self.limit.map_or(true, |limit| outcomes.len() < limit) {
            let Some(company) = store.fetch_unenriched(1, offset)?.into_iter().next() else {
                break;
            };
            let outcome = self.process(store, engine, &company);
            if outcome.left_pending() {
                offset += 1;
            }
            outcomes.push(outcome);
        }

        let report: EnrichmentReport = outcomes.iter().collect();
        info!(
            processed = report.processed,
            updated = report.updated,
            marked_not_found = report.marked_not_found,
            failed = report.failed + report.rejected,
            "enrichment complete"
        );
        Ok((report, outcomes))
    }
}
