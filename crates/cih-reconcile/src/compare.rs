//! Side-by-side view of the two identity sources, joined on the email key.
//!
//! This is an audit aid: unlike [`crate::reconcile`] it does not collapse
//! duplicate keys, so one CRM record matching two e-commerce users yields two
//! rows.

use std::collections::{HashMap, HashSet};

use cih_schemas::{CrmCustomerRecord, EcommerceUserRecord};
use serde::Serialize;

use crate::EmailPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonSide {
    Both,
    CrmOnly,
    EcommerceOnly,
}

impl ComparisonSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonSide::Both => "both",
            ComparisonSide::CrmOnly => "crm_only",
            ComparisonSide::EcommerceOnly => "ecommerce_only",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonRow {
    pub crm_id: Option<String>,
    pub email: Option<String>,
    pub ecommerce_id: Option<String>,
    pub email_address: Option<String>,
    pub side: ComparisonSide,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonSummary {
    pub both: usize,
    pub crm_only: usize,
    pub ecommerce_only: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceComparison {
    pub rows: Vec<ComparisonRow>,
    pub summary: ComparisonSummary,
}

/// Outer join of CRM and e-commerce records on the email key.
///
/// CRM rows come first in input order (one row per matching e-commerce user),
/// followed by e-commerce users no CRM record matched. Records without an email
/// key never match anything.
pub fn compare_sources(
    crm: &[CrmCustomerRecord],
    ecommerce: &[EcommerceUserRecord],
    policy: EmailPolicy,
) -> SourceComparison {
    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, e) in ecommerce.iter().enumerate() {
        if let Some(k) = policy.key(e.email_address.as_deref()) {
            by_key.entry(k).or_default().push(i);
        }
    }

    let mut rows = Vec::new();
    let mut summary = ComparisonSummary::default();
    let mut matched: HashSet<usize> = HashSet::new();

    for c in crm {
        let hits = policy
            .key(c.email.as_deref())
            .and_then(|k| by_key.get(&k))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if hits.is_empty() {
            summary.crm_only += 1;
            rows.push(ComparisonRow {
                crm_id: c.id.clone(),
                email: c.email.clone(),
                ecommerce_id: None,
                email_address: None,
                side: ComparisonSide::CrmOnly,
            });
            continue;
        }

        for &i in hits {
            matched.insert(i);
            summary.both += 1;
            rows.push(ComparisonRow {
                crm_id: c.id.clone(),
                email: c.email.clone(),
                ecommerce_id: ecommerce[i].user_id.clone(),
                email_address: ecommerce[i].email_address.clone(),
                side: ComparisonSide::Both,
            });
        }
    }

    for (i, e) in ecommerce.iter().enumerate() {
        if matched.contains(&i) {
            continue;
        }
        summary.ecommerce_only += 1;
        rows.push(ComparisonRow {
            crm_id: None,
            email: None,
            ecommerce_id: e.user_id.clone(),
            email_address: e.email_address.clone(),
            side: ComparisonSide::EcommerceOnly,
        });
    }

    SourceComparison { rows, summary }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_join_labels_each_side() {
        let crm = vec![
            CrmCustomerRecord::new("1", "a@x.com"),
            CrmCustomerRecord::new("2", "b@x.com"),
        ];
        let ecom = vec![
            EcommerceUserRecord::new("9", "a@x.com"),
            EcommerceUserRecord::new("10", "c@x.com"),
        ];

        let cmp = compare_sources(&crm, &ecom, EmailPolicy::Exact);
        let sides: Vec<ComparisonSide> = cmp.rows.iter().map(|r| r.side).collect();
        assert_eq!(
            sides,
            vec![
                ComparisonSide::Both,
                ComparisonSide::CrmOnly,
                ComparisonSide::EcommerceOnly
            ]
        );
        assert_eq!(
            cmp.summary,
            ComparisonSummary {
                both: 1,
                crm_only: 1,
                ecommerce_only: 1
            }
        );
        assert_eq!(cmp.rows[0].ecommerce_id.as_deref(), Some("9"));
    }

    #[test]
    fn duplicate_ecommerce_keys_fan_out() {
        let crm = vec![CrmCustomerRecord::new("1", "a@x.com")];
        let ecom = vec![
            EcommerceUserRecord::new("9", "a@x.com"),
            EcommerceUserRecord::new("10", "a@x.com"),
        ];
        let cmp = compare_sources(&crm, &ecom, EmailPolicy::Exact);
        assert_eq!(cmp.summary.both, 2);
        assert_eq!(cmp.summary.ecommerce_only, 0);
    }

    #[test]
    fn case_difference_only_matches_under_normalized_policy() {
        let crm = vec![CrmCustomerRecord::new("1", "A@x.com")];
        let ecom = vec![EcommerceUserRecord::new("9", "a@x.com")];

        assert_eq!(compare_sources(&crm, &ecom, EmailPolicy::Exact).summary.both, 0);
        assert_eq!(compare_sources(&crm, &ecom, EmailPolicy::Normalized).summary.both, 1);
    }
}
