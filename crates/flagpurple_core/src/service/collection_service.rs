//! Collection maintenance service.
//!
//! # Responsibility
//! - Run duplicate processing with a validated group table.
//! - Run legacy tag repair.
//! - Emit start/finish events with timing for every invocation.
//!
//! # Invariants
//! - The group table is validated before the service can touch a collection.
//! - A failed invocation is logged at `error` and returned, never swallowed.

use crate::config::{default_group_specs, validate_group_specs, ConfigResult};
use crate::dedup::{process_duplicates, DedupReport, DedupResult};
use crate::model::group::GroupSpec;
use crate::repo::{CollectionRepository, RepoResult};
use crate::tags::{fix_tags, TagFixReport};
use log::{error, info};
use std::time::Instant;

/// Maintenance facade over a collection store.
pub struct CollectionService<R: CollectionRepository> {
    repo: R,
    groups: Vec<GroupSpec>,
}

impl<R: CollectionRepository> CollectionService<R> {
    /// Creates a service using the built-in group table.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            groups: default_group_specs(),
        }
    }

    /// Creates a service using a caller-provided group table.
    ///
    /// # Errors
    /// - `ConfigError::Invalid` when the table breaks a table invariant.
    pub fn with_groups(repo: R, groups: Vec<GroupSpec>) -> ConfigResult<Self> {
        validate_group_specs(&groups)?;
        Ok(Self { repo, groups })
    }

    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Returns the wrapped store.
    pub fn into_repo(self) -> R {
        self.repo
    }

    /// Detects duplicates, unifies audio, then tags and hides duplicates.
    pub fn process_duplicates(&mut self) -> DedupResult<DedupReport> {
        let started = Instant::now();
        info!(
            "event=process_duplicates module=service status=start groups={}",
            self.groups.len()
        );
        match process_duplicates(&mut self.repo, &self.groups) {
            Ok(report) => {
                info!(
                    "event=process_duplicates module=service status=ok elapsed_ms={} notes={} keys={} mutations={}",
                    started.elapsed().as_millis(),
                    report.notes_scanned,
                    report.keys_scanned,
                    report.mutation_count()
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=process_duplicates module=service status=error elapsed_ms={} error={}",
                    started.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Removes underscore-form duplicate tags and rewrites single-colon ones.
    pub fn fix_tags(&mut self) -> RepoResult<TagFixReport> {
        let started = Instant::now();
        info!("event=fix_tags module=service status=start");
        match fix_tags(&mut self.repo) {
            Ok(report) => {
                info!(
                    "event=fix_tags module=service status=ok elapsed_ms={} removed={} renamed={}",
                    started.elapsed().as_millis(),
                    report.removed,
                    report.renamed
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=fix_tags module=service status=error elapsed_ms={} error={}",
                    started.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}
