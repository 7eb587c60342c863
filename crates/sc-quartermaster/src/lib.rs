// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Passport/Visa credential resolution.
//!
//! A [`Quartermaster`] binds a [`Passport`] (who may use a credential) and an
//! optional [`Visa`] (a rate-limit bucket) to a set of Requisitions it
//! authorizes. [`resolve`] implements the access invariant: a user may invoke
//! a requisition iff some Quartermaster's `endpoints` contains it and its
//! passport is public or names the user.

use sc_core::{PassportId, QuartermasterId, RequisitionId, UserId, VisaId};
use sc_error::{SupplyError, SupplyErrorCode};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A credential grant: either public (anyone may use it) or scoped to a set
/// of users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passport {
    /// Unique identifier.
    pub id: PassportId,
    /// When `true`, every user may use this passport's credential.
    pub public: bool,
    /// Users granted use of this credential when `public` is `false`.
    #[serde(default)]
    pub user_set: HashSet<UserId>,
    /// The credential payload handed to a handler (e.g. an API key).
    pub credential_payload: String,
}

impl Passport {
    /// Construct a public passport.
    #[must_use]
    pub fn public(credential_payload: impl Into<String>) -> Self {
        Self {
            id: PassportId::new(),
            public: true,
            user_set: HashSet::new(),
            credential_payload: credential_payload.into(),
        }
    }

    /// Construct a private passport scoped to the given users.
    #[must_use]
    pub fn private(credential_payload: impl Into<String>, user_set: HashSet<UserId>) -> Self {
        Self {
            id: PassportId::new(),
            public: false,
            user_set,
            credential_payload: credential_payload.into(),
        }
    }

    /// Returns `true` if `user` may use this passport's credential.
    #[must_use]
    pub fn grants(&self, user: Option<UserId>) -> bool {
        self.public || user.is_some_and(|u| self.user_set.contains(&u))
    }
}

/// A rate-limit bucket: at most `calls_allowed` calls per `interval_seconds`.
///
/// The bucket itself (`recent_calls`) is guarded by a [`Mutex`] since it is
/// the one piece of shared mutable state workers contend on; everything else
/// about a Visa is immutable configuration.
#[derive(Debug)]
pub struct Visa {
    /// Unique identifier.
    pub id: VisaId,
    /// Maximum number of calls allowed per window.
    pub calls_allowed: u32,
    /// Length of the rate-limit window, in seconds.
    pub interval_seconds: u64,
    recent_calls: Mutex<VecDeque<Instant>>,
}

impl Visa {
    /// Construct a new Visa with an empty call history.
    #[must_use]
    pub fn new(calls_allowed: u32, interval_seconds: u64) -> Self {
        Self {
            id: VisaId::new(),
            calls_allowed,
            interval_seconds,
            recent_calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of calls recorded within the current window, as of `now`.
    pub async fn recent_call_count(&self, now: Instant) -> usize {
        let window = Duration::from_secs(self.interval_seconds);
        let calls = self.recent_calls.lock().await;
        calls.iter().filter(|&&t| now.duration_since(t) < window).count()
    }

    /// Returns `true` if the bucket has capacity remaining right now.
    pub async fn has_capacity(&self, now: Instant) -> bool {
        (self.recent_call_count(now).await as u32) < self.calls_allowed
    }

    /// Attempt to record a call against this bucket. Returns `true` and
    /// records the call if capacity remained; returns `false` without
    /// recording anything if the bucket was already exhausted.
    ///
    /// All reads and writes happen under a single mutex acquisition so
    /// concurrent workers never both observe spare capacity and both
    /// record a call that pushes the bucket over `calls_allowed`.
    pub async fn try_acquire(&self, now: Instant) -> bool {
        let window = Duration::from_secs(self.interval_seconds);
        let mut calls = self.recent_calls.lock().await;
        calls.retain(|&t| now.duration_since(t) < window);
        if calls.len() as u32 >= self.calls_allowed {
            return false;
        }
        calls.push_back(now);
        true
    }
}

/// A triple authorizing a (credential, rate-limit, endpoint-set).
#[derive(Debug)]
pub struct Quartermaster {
    /// Unique identifier.
    pub id: QuartermasterId,
    /// The credential grant this Quartermaster exposes.
    pub passport: Passport,
    /// The rate-limit bucket guarding calls made under this Quartermaster, if any.
    pub visa: Option<Visa>,
    /// Requisitions this Quartermaster authorizes.
    pub endpoints: HashSet<RequisitionId>,
}

impl Quartermaster {
    /// Construct a new Quartermaster.
    #[must_use]
    pub fn new(passport: Passport, visa: Option<Visa>, endpoints: HashSet<RequisitionId>) -> Self {
        Self {
            id: QuartermasterId::new(),
            passport,
            visa,
            endpoints,
        }
    }

    /// Returns `true` if this Quartermaster authorizes `requisition` for `user`.
    #[must_use]
    pub fn authorizes(&self, user: Option<UserId>, requisition: RequisitionId) -> bool {
        self.endpoints.contains(&requisition) && self.passport.grants(user)
    }
}

/// Resolve the Quartermaster that should handle a `(user, requisition)` call.
///
/// Implements the filter-then-order algorithm:
/// 1. Candidates: endpoints contains `requisition` AND passport is public or
///    names `user`.
/// 2. If `visa_required`, drop any candidate whose visa bucket is exhausted.
/// 3. Order: private (user-specific) before public, then ascending recent
///    call count, then lowest id.
///
/// Returns `None` if no candidate remains, which the caller should surface
/// as [`SupplyErrorCode::AuthNoQuartermaster`] (no eligible candidate) or
/// [`SupplyErrorCode::RateLimitExhausted`] (candidates existed but all visas
/// were exhausted) — see [`resolve_or_error`].
pub async fn resolve<'a>(
    candidates: &'a [Quartermaster],
    user: Option<UserId>,
    requisition: RequisitionId,
    visa_required: bool,
    now: Instant,
) -> Option<&'a Quartermaster> {
    let mut eligible = Vec::new();
    for qm in candidates {
        if !qm.authorizes(user, requisition) {
            continue;
        }
        if visa_required {
            match &qm.visa {
                Some(visa) if !visa.has_capacity(now).await => continue,
                _ => {}
            }
        }
        let recent = match &qm.visa {
            Some(visa) => visa.recent_call_count(now).await,
            None => 0,
        };
        eligible.push((qm, recent));
    }

    eligible.sort_by(|(a, a_recent), (b, b_recent)| {
        let a_private = !a.passport.public;
        let b_private = !b.passport.public;
        b_private
            .cmp(&a_private)
            .then(a_recent.cmp(b_recent))
            .then(a.id.cmp(&b.id))
    });

    eligible.into_iter().next().map(|(qm, _)| qm)
}

/// Resolve a Quartermaster, distinguishing "nothing authorizes this user"
/// from "authorized, but every visa is exhausted" per the error taxonomy.
///
/// # Errors
///
/// Returns [`SupplyErrorCode::AuthNoQuartermaster`] if no Quartermaster's
/// passport and endpoints permit `(user, requisition)` at all, or
/// [`SupplyErrorCode::RateLimitExhausted`] if candidates existed but every
/// one's visa bucket was exhausted.
pub async fn resolve_or_error<'a>(
    candidates: &'a [Quartermaster],
    user: Option<UserId>,
    requisition: RequisitionId,
    visa_required: bool,
    now: Instant,
) -> Result<&'a Quartermaster, SupplyError> {
    if let Some(qm) = resolve(candidates, user, requisition, visa_required, now).await {
        return Ok(qm);
    }

    let any_authorized = candidates.iter().any(|qm| qm.authorizes(user, requisition));
    if any_authorized {
        Err(SupplyError::new(
            SupplyErrorCode::RateLimitExhausted,
            "every authorized quartermaster's visa bucket is exhausted",
        ))
    } else {
        Err(SupplyError::new(
            SupplyErrorCode::AuthNoQuartermaster,
            "no quartermaster authorizes this user for this requisition",
        ))
    }
}
