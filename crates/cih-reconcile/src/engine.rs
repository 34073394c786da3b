use std::collections::{HashMap, HashSet};

use cih_schemas::{CrmCustomerRecord, EcommerceUserRecord, MasterIdentity};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ids::{GlobalIdSource, RandomIds};
use crate::{ReconcileDiff, ReconcileOptions, ReconcileReport, ReconcileStats, SourceSide};

/// One email key's worth of records, a lone record without an email, or a
/// same-side duplicate of an already-seen key.
struct Group<'a> {
    key: Option<String>,
    crm: Option<&'a CrmCustomerRecord>,
    ecom: Option<&'a EcommerceUserRecord>,
}

impl Group<'_> {
    fn crm_id(&self) -> Option<&str> {
        self.crm.and_then(|r| r.id.as_deref())
    }

    fn ecommerce_id(&self) -> Option<&str> {
        self.ecom.and_then(|r| r.user_id.as_deref())
    }

    /// CRM email wins; the e-commerce address fills in when CRM has none.
    fn email(&self) -> Option<String> {
        self.crm
            .and_then(|r| r.email.clone())
            .or_else(|| self.ecom.and_then(|r| r.email_address.clone()))
    }
}

/// Lookup tables over the previous run's master set. First entry wins on
/// duplicate signals.
struct PriorIndex<'a> {
    prior: &'a [MasterIdentity],
    by_crm: HashMap<&'a str, usize>,
    by_ecom: HashMap<&'a str, usize>,
    by_key: HashMap<String, usize>,
    claimed: Vec<bool>,
}

impl<'a> PriorIndex<'a> {
    fn build(prior: &'a [MasterIdentity], options: &ReconcileOptions) -> Self {
        let mut by_crm = HashMap::new();
        let mut by_ecom = HashMap::new();
        let mut by_key = HashMap::new();

        for (i, m) in prior.iter().enumerate() {
            if let Some(id) = m.crm_id.as_deref() {
                by_crm.entry(id).or_insert(i);
            }
            if let Some(id) = m.ecommerce_id.as_deref() {
                by_ecom.entry(id).or_insert(i);
            }
            if let Some(k) = options.email_policy.key(m.email.as_deref()) {
                by_key.entry(k).or_insert(i);
            }
        }

        Self {
            prior,
            by_crm,
            by_ecom,
            by_key,
            claimed: vec![false; prior.len()],
        }
    }

    fn global_id(&self, i: usize) -> Uuid {
        self.prior[i].global_id
    }
}

/// Reconcile with fresh random global ids and no prior master set.
pub fn reconcile(
    crm: &[CrmCustomerRecord],
    ecommerce: &[EcommerceUserRecord],
    options: &ReconcileOptions,
) -> ReconcileReport {
    reconcile_with_ids(crm, ecommerce, &[], options, &mut RandomIds)
}

/// Merge-upsert against `prior`: every group reuses a prior global id when one
/// of its signals was already known.
pub fn reconcile_with_prior(
    crm: &[CrmCustomerRecord],
    ecommerce: &[EcommerceUserRecord],
    prior: &[MasterIdentity],
    options: &ReconcileOptions,
) -> ReconcileReport {
    reconcile_with_ids(crm, ecommerce, prior, options, &mut RandomIds)
}

/// Full entry point: explicit prior set and id source.
///
/// 1) Group records by email key (full outer join, CRM first).
/// 2) Resolve each group's global id: prior by crm id, then by e-commerce id,
///    then by email key; a prior identity is claimed at most once.
/// 3) Carry forward unclaimed prior identities whose signals vanished, or
///    drop them as superseded when current identities took their signals.
pub fn reconcile_with_ids(
    crm: &[CrmCustomerRecord],
    ecommerce: &[EcommerceUserRecord],
    prior: &[MasterIdentity],
    options: &ReconcileOptions,
    ids: &mut dyn GlobalIdSource,
) -> ReconcileReport {
    let mut stats = ReconcileStats {
        crm_records: crm.len(),
        ecommerce_records: ecommerce.len(),
        ..ReconcileStats::default()
    };
    let mut diffs: Vec<ReconcileDiff> = Vec::new();

    let groups = group_records(crm, ecommerce, options, &mut stats, &mut diffs);

    let mut index = PriorIndex::build(prior, options);
    let mut taken: HashSet<Uuid> = prior.iter().map(|m| m.global_id).collect();
    let mut identities: Vec<MasterIdentity> = Vec::with_capacity(groups.len() + prior.len());

    for g in &groups {
        match (g.crm.is_some(), g.ecom.is_some()) {
            (true, true) => stats.matched += 1,
            (true, false) => stats.crm_only += 1,
            (false, true) => stats.ecommerce_only += 1,
            (false, false) => {}
        }

        let global_id = match resolve_prior(g, &mut index, &mut diffs) {
            Resolved::Reused(id) => {
                stats.reused_ids += 1;
                id
            }
            Resolved::Fresh => {
                stats.fresh_ids += 1;
                mint(ids, &mut taken)
            }
            Resolved::Split(previous) => {
                stats.fresh_ids += 1;
                let assigned = mint(ids, &mut taken);
                diffs.push(ReconcileDiff::SplitFromPrior { previous, assigned });
                assigned
            }
        };

        identities.push(MasterIdentity {
            global_id,
            crm_id: g.crm_id().map(str::to_string),
            ecommerce_id: g.ecommerce_id().map(str::to_string),
            email: g.email(),
            name: g.crm.and_then(|r| r.name.clone()),
            phone: g.crm.and_then(|r| r.phone.clone()),
        });
    }

    settle_unclaimed(&groups, &index, options, &mut identities, &mut stats, &mut diffs);

    diffs.sort();

    debug!(
        identities = identities.len(),
        matched = stats.matched,
        crm_only = stats.crm_only,
        ecommerce_only = stats.ecommerce_only,
        reused = stats.reused_ids,
        fresh = stats.fresh_ids,
        carried_forward = stats.carried_forward,
        "reconciliation pass complete"
    );

    ReconcileReport {
        identities,
        stats,
        diffs,
    }
}

/// Draws from `ids` until it yields an id no prior or current identity holds.
fn mint(ids: &mut dyn GlobalIdSource, taken: &mut HashSet<Uuid>) -> Uuid {
    loop {
        let id = ids.next_id();
        if taken.insert(id) {
            return id;
        }
        debug!(global_id = %id, "id source repeated a taken global id; drawing again");
    }
}

fn group_records<'a>(
    crm: &'a [CrmCustomerRecord],
    ecommerce: &'a [EcommerceUserRecord],
    options: &ReconcileOptions,
    stats: &mut ReconcileStats,
    diffs: &mut Vec<ReconcileDiff>,
) -> Vec<Group<'a>> {
    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for (index, rec) in crm.iter().enumerate() {
        let key = options.email_policy.key(rec.email.as_deref());
        if rec.id.is_none() && key.is_none() {
            stats.no_signal += 1;
            diffs.push(ReconcileDiff::NoSignal {
                side: SourceSide::Crm,
                index,
            });
            continue;
        }

        if let Some(k) = key.as_deref() {
            if by_key.contains_key(k) {
                warn!(crm_id = ?rec.id, email_key = %k, "duplicate crm email key; record kept as its own identity");
                stats.duplicate_keys += 1;
                diffs.push(ReconcileDiff::DuplicateKey {
                    side: SourceSide::Crm,
                    record_id: rec.id.clone(),
                    email_key: k.to_string(),
                });
            } else {
                by_key.insert(k.to_string(), groups.len());
            }
        }
        groups.push(Group {
            key,
            crm: Some(rec),
            ecom: None,
        });
    }

    for (index, rec) in ecommerce.iter().enumerate() {
        let key = options.email_policy.key(rec.email_address.as_deref());
        if rec.user_id.is_none() && key.is_none() {
            stats.no_signal += 1;
            diffs.push(ReconcileDiff::NoSignal {
                side: SourceSide::Ecommerce,
                index,
            });
            continue;
        }

        let Some(k) = key else {
            groups.push(Group {
                key: None,
                crm: None,
                ecom: Some(rec),
            });
            continue;
        };

        match by_key.get(&k).copied() {
            Some(gi) if groups[gi].ecom.is_none() => groups[gi].ecom = Some(rec),
            Some(_) => {
                warn!(user_id = ?rec.user_id, email_key = %k, "duplicate ecommerce email key; record kept as its own identity");
                stats.duplicate_keys += 1;
                diffs.push(ReconcileDiff::DuplicateKey {
                    side: SourceSide::Ecommerce,
                    record_id: rec.user_id.clone(),
                    email_key: k.clone(),
                });
                groups.push(Group {
                    key: Some(k),
                    crm: None,
                    ecom: Some(rec),
                });
            }
            None => {
                by_key.insert(k.clone(), groups.len());
                groups.push(Group {
                    key: Some(k),
                    crm: None,
                    ecom: Some(rec),
                });
            }
        }
    }

    groups
}

enum Resolved {
    Reused(Uuid),
    Fresh,
    /// Every prior candidate was already claimed; carries the first one.
    Split(Uuid),
}

fn resolve_prior(group: &Group<'_>, index: &mut PriorIndex<'_>, diffs: &mut Vec<ReconcileDiff>) -> Resolved {
    let crm_hit = group.crm_id().and_then(|id| index.by_crm.get(id).copied());
    let ecom_hit = group.ecommerce_id().and_then(|id| index.by_ecom.get(id).copied());
    let key_hit = group.key.as_ref().and_then(|k| index.by_key.get(k).copied());

    if let (Some(a), Some(b)) = (crm_hit, ecom_hit) {
        if a != b && !index.claimed[a] {
            warn!(
                crm_id = group.crm_id().unwrap_or_default(),
                ecommerce_id = group.ecommerce_id().unwrap_or_default(),
                "crm and ecommerce ids map to different prior identities; crm side kept"
            );
            diffs.push(ReconcileDiff::PriorConflict {
                crm_id: group.crm_id().unwrap_or_default().to_string(),
                ecommerce_id: group.ecommerce_id().unwrap_or_default().to_string(),
                kept: index.global_id(a),
                other: index.global_id(b),
            });
        }
    }

    let candidates = [crm_hit, ecom_hit, key_hit];
    for i in candidates.iter().flatten().copied() {
        if !index.claimed[i] {
            index.claimed[i] = true;
            return Resolved::Reused(index.global_id(i));
        }
    }

    match candidates.iter().flatten().next() {
        Some(&first) => Resolved::Split(index.global_id(first)),
        None => Resolved::Fresh,
    }
}

fn settle_unclaimed(
    groups: &[Group<'_>],
    index: &PriorIndex<'_>,
    options: &ReconcileOptions,
    identities: &mut Vec<MasterIdentity>,
    stats: &mut ReconcileStats,
    diffs: &mut Vec<ReconcileDiff>,
) {
    let crm_ids: HashSet<&str> = groups.iter().filter_map(|g| g.crm_id()).collect();
    let ecom_ids: HashSet<&str> = groups.iter().filter_map(|g| g.ecommerce_id()).collect();
    let keys: HashSet<&str> = groups.iter().filter_map(|g| g.key.as_deref()).collect();

    for (i, m) in index.prior.iter().enumerate() {
        if index.claimed[i] || !m.has_signal() {
            continue;
        }

        let still_asserted = m.crm_id.as_deref().is_some_and(|id| crm_ids.contains(id))
            || m.ecommerce_id.as_deref().is_some_and(|id| ecom_ids.contains(id))
            || options
                .email_policy
                .key(m.email.as_deref())
                .is_some_and(|k| keys.contains(k.as_str()));

        if still_asserted {
            stats.superseded += 1;
            diffs.push(ReconcileDiff::Superseded {
                global_id: m.global_id,
            });
        } else if options.carry_forward_unmatched {
            stats.carried_forward += 1;
            identities.push(m.clone());
        }
    }
}
