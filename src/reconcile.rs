//! One-way migration of the anonymous wishlist into the signed-in account.
//!
//! ```text
//!   Idle --SignedIn--> Reconciling --all adds acknowledged--> Done
//!     ^                    |  |                                 |
//!     |   partial failure  |  | SignedOut (cancel)              |
//!     +--------------------+--+----------- SignedOut -----------+
//! ```
//!
//! A duplicate `SignedIn` for the user already reconciling or reconciled is a
//! no-op. Migrated ids are never rolled back; a partial failure leaves only the
//! failed ids in the local store so the next sign-in retries exactly those.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::error::{ApniListError, Result};
use crate::models::{IdentityEvent, ProductId, UserId};
use crate::retry::RetryPolicy;
use crate::wishlist::{LocalWishlist, RemoteWishlist, WishlistStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Reconciling,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Reconciling { user: UserId },
    Done { user: UserId },
}

impl Phase {
    fn state(&self) -> ReconcileState {
        match self {
            Phase::Idle => ReconcileState::Idle,
            Phase::Reconciling { .. } => ReconcileState::Reconciling,
            Phase::Done { .. } => ReconcileState::Done,
        }
    }
}

/// Summary of a completed migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Local ids absent remotely at sign-in; the ids this run had to migrate.
    pub record: BTreeSet<ProductId>,
    pub migrated: Vec<ProductId>,
    /// Local ids the account already had; their remote entries were left alone.
    pub already_remote: Vec<ProductId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Completed(ReconcileReport),
    /// Duplicate sign-in; carries the state the engine was already in.
    AlreadyHandled(ReconcileState),
    /// The session ended mid-run. Local entries are untouched; ids listed here
    /// were already committed remotely.
    Cancelled { migrated: Vec<ProductId> },
}

struct Migration {
    report: ReconcileReport,
    failed: Vec<ProductId>,
}

pub struct Reconciler {
    local: Arc<LocalWishlist>,
    remote: Arc<RemoteWishlist>,
    retry: RetryPolicy,
    phase: Mutex<Phase>,
    // Bumped on every sign-in and sign-out; a run whose generation is stale
    // has been cancelled.
    generation: AtomicU64,
}

impl Reconciler {
    pub fn new(local: Arc<LocalWishlist>, remote: Arc<RemoteWishlist>, retry: RetryPolicy) -> Self {
        Self {
            local,
            remote,
            retry,
            phase: Mutex::new(Phase::Idle),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ReconcileState {
        self.phase.lock().state()
    }

    pub fn handle(&self, event: IdentityEvent) -> Result<Option<ReconcileOutcome>> {
        match event {
            IdentityEvent::SignedIn(user) => self.sign_in(user).map(Some),
            IdentityEvent::SignedOut => {
                self.sign_out();
                Ok(None)
            }
        }
    }

    /// Bind the remote store to `user` and migrate the local wishlist into it.
    ///
    /// Fails with [`ApniListError::PartialReconciliation`] when some ids could
    /// not be migrated after retrying, or with the store error when the
    /// remote wishlist could not be read at all. Either way the engine returns
    /// to `Idle` and the next sign-in event retries.
    pub fn sign_in(&self, user: UserId) -> Result<ReconcileOutcome> {
        let run = {
            let mut phase = self.phase.lock();
            match &*phase {
                Phase::Reconciling { user: current } | Phase::Done { user: current }
                    if *current == user =>
                {
                    tracing::debug!(user = %user, state = ?phase.state(), "duplicate sign-in ignored");
                    return Ok(ReconcileOutcome::AlreadyHandled(phase.state()));
                }
                Phase::Idle => {}
                Phase::Reconciling { user: previous } | Phase::Done { user: previous } => {
                    tracing::warn!(
                        previous = %previous,
                        user = %user,
                        "sign-in without sign-out; treating as a session switch"
                    );
                }
            }
            let run = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *phase = Phase::Reconciling { user: user.clone() };
            self.remote.bind(user.clone());
            run
        };

        tracing::info!(user = %user, "reconciling local wishlist");
        let migration = self.migrate(&user, run);

        let mut phase = self.phase.lock();
        if !self.is_current(run) {
            let migrated = migration.map(|m| m.report.migrated).unwrap_or_default();
            tracing::info!(user = %user, migrated = migrated.len(), "reconciliation cancelled");
            return Ok(ReconcileOutcome::Cancelled { migrated });
        }

        let migration = match migration {
            Ok(m) => m,
            Err(e) => {
                *phase = Phase::Idle;
                tracing::warn!(user = %user, error = %e, "reconciliation could not start");
                return Err(e);
            }
        };

        // Local ids that now exist remotely are dropped from the local store;
        // failed ones stay for the next attempt.
        let settled = migration
            .report
            .migrated
            .iter()
            .chain(migration.report.already_remote.iter());
        if let Err(e) = self.local.remove_many(settled) {
            *phase = Phase::Idle;
            return Err(e);
        }

        if migration.failed.is_empty() {
            *phase = Phase::Done { user: user.clone() };
            tracing::info!(
                user = %user,
                migrated = migration.report.migrated.len(),
                already_remote = migration.report.already_remote.len(),
                "reconciliation complete"
            );
            Ok(ReconcileOutcome::Completed(migration.report))
        } else {
            *phase = Phase::Idle;
            tracing::warn!(
                user = %user,
                failed = migration.failed.len(),
                "reconciliation partially failed"
            );
            Err(ApniListError::PartialReconciliation {
                failed: migration.failed,
                migrated: migration.report.migrated,
            })
        }
    }

    /// End the session: cancel any in-flight run and unbind the remote store.
    /// Remote data is never touched.
    pub fn sign_out(&self) {
        let mut phase = self.phase.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *phase = Phase::Idle;
        self.remote.unbind();
        tracing::info!("signed out; reconciliation reset");
    }

    fn is_current(&self, run: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == run
    }

    fn migrate(&self, user: &UserId, run: u64) -> Result<Migration> {
        let local_ids = self.local.list()?;
        let remote_ids = self.remote.list_for(user)?;

        let record: BTreeSet<ProductId> = local_ids.difference(&remote_ids).cloned().collect();
        let already_remote: Vec<ProductId> =
            local_ids.intersection(&remote_ids).cloned().collect();

        let mut migration = Migration {
            report: ReconcileReport {
                record: record.clone(),
                migrated: Vec::with_capacity(record.len()),
                already_remote,
            },
            failed: Vec::new(),
        };

        let attempts = self.retry.attempts();
        'ids: for id in &record {
            let mut attempt = 1;
            loop {
                if !self.is_current(run) {
                    break 'ids;
                }
                match self.remote.add_once(user, id) {
                    Ok(_) => {
                        migration.report.migrated.push(id.clone());
                        break;
                    }
                    Err(e) if e.is_transient() && attempt < attempts => {
                        let delay = self.retry.delay_for(attempt);
                        tracing::warn!(
                            product = %id,
                            attempt,
                            error = %e,
                            "migrating wishlist entry failed, retrying in {:?}",
                            delay
                        );
                        thread::sleep(delay);
                        attempt += 1;
                    }
                    Err(e) => {
                        tracing::warn!(product = %id, attempts = attempt, error = %e, "wishlist entry not migrated");
                        migration.failed.push(id.clone());
                        break;
                    }
                }
            }
        }

        Ok(migration)
    }
}
