//! Fact builder: resolves every silver row against the five dimensions and
//! emits exactly one fact row per contract.
//!
//! Dimensions are built from the same silver snapshot, so every natural key
//! must resolve. A miss means the dimensions and facts came from different
//! snapshots; that run is aborted rather than silently shrinking the fact
//! table.

use crate::dims::Dimensions;
use anyhow::{anyhow, Result};
use model::{date_key, SilverRecord};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use time::Date;

#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub rent_contract_key: i64,
    pub contract_type_key: i64,
    pub property_key: i64,
    pub project_key: i64,
    pub location_key: i64,
    pub tenant_key: i64,
    pub start_date_key: Option<i32>,
    pub end_date_key: Option<i32>,
    pub contract_start_date: Option<Date>,
    pub contract_end_date: Option<Date>,
    pub annual_amount: Option<i64>,
    pub contract_amount: Option<i64>,
    pub no_of_prop: Option<i64>,
    pub line_number: Option<i64>,
    pub is_free_hold: Option<i64>,
    pub contract_duration_months: Option<i64>,
    pub has_date_issues: bool,
    pub has_amount_issues: bool,
}

pub fn build_facts(silver: &[SilverRecord], dims: &Dimensions) -> Result<Vec<FactRow>> {
    let contract_type: HashMap<Option<i64>, i64> = dims
        .contract_type
        .iter()
        .map(|d| (d.contract_reg_type_id, d.contract_type_key))
        .collect();
    let property: HashMap<(Option<i64>, Option<i64>), i64> = dims
        .property
        .iter()
        .map(|d| {
            (
                (d.ejari_bus_property_type_id, d.ejari_property_type_id),
                d.property_key,
            )
        })
        .collect();
    let project: HashMap<Option<i64>, i64> = dims
        .project
        .iter()
        .map(|d| (d.project_number, d.project_key))
        .collect();
    let location: HashMap<Option<i64>, i64> = dims
        .location
        .iter()
        .map(|d| (d.area_id, d.location_key))
        .collect();
    let tenant: HashMap<Option<i64>, i64> = dims
        .tenant
        .iter()
        .map(|d| (d.tenant_type_id, d.tenant_key))
        .collect();

    let mut misses = MissTracker::default();
    let mut facts = Vec::with_capacity(silver.len());

    for (i, rec) in silver.iter().enumerate() {
        let contract_type_key = misses.resolve("dim_contract_type", &contract_type, &rec.contract_reg_type_id);
        let property_key = misses.resolve(
            "dim_property",
            &property,
            &(rec.ejari_bus_property_type_id, rec.ejari_property_type_id),
        );
        let project_key = misses.resolve("dim_project", &project, &rec.project_number);
        let location_key = misses.resolve("dim_location", &location, &rec.area_id);
        let tenant_key = misses.resolve("dim_tenant", &tenant, &rec.tenant_type_id);

        let (Some(contract_type_key), Some(property_key), Some(project_key), Some(location_key), Some(tenant_key)) =
            (contract_type_key, property_key, project_key, location_key, tenant_key)
        else {
            continue;
        };

        facts.push(FactRow {
            rent_contract_key: i as i64 + 1,
            contract_type_key,
            property_key,
            project_key,
            location_key,
            tenant_key,
            start_date_key: rec.contract_start_date.map(date_key),
            end_date_key: rec.contract_end_date.map(date_key),
            contract_start_date: rec.contract_start_date,
            contract_end_date: rec.contract_end_date,
            annual_amount: rec.annual_amount,
            contract_amount: rec.contract_amount,
            no_of_prop: rec.no_of_prop,
            line_number: rec.line_number,
            is_free_hold: rec.is_free_hold,
            contract_duration_months: duration_months(rec.contract_start_date, rec.contract_end_date),
            has_date_issues: rec.has_date_issues,
            has_amount_issues: rec.has_amount_issues,
        });
    }

    misses.into_result()?;

    if facts.len() != silver.len() {
        return Err(anyhow!(
            "fact row count {} does not match silver row count {}",
            facts.len(),
            silver.len()
        ));
    }
    Ok(facts)
}

/// Whole months between the contract dates, short months counted only when
/// the day of month is reached. Null when either date is missing.
fn duration_months(start: Option<Date>, end: Option<Date>) -> Option<i64> {
    let (s, e) = (start?, end?);
    let mut months =
        (e.year() - s.year()) as i64 * 12 + u8::from(e.month()) as i64 - u8::from(s.month()) as i64;
    if e.day() < s.day() {
        months -= 1;
    }
    Some(months)
}

/// Collects unresolved natural keys per dimension so a failed run can report
/// every affected dimension at once, with sample keys and the row shortfall.
#[derive(Default)]
struct MissTracker {
    missing: HashMap<&'static str, (BTreeSet<String>, u64)>,
}

impl MissTracker {
    fn resolve<K: Eq + Hash + Debug>(
        &mut self,
        dim: &'static str,
        index: &HashMap<K, i64>,
        key: &K,
    ) -> Option<i64> {
        match index.get(key) {
            Some(k) => Some(*k),
            None => {
                let entry = self.missing.entry(dim).or_default();
                if entry.0.len() < 5 {
                    entry.0.insert(format!("{key:?}"));
                }
                entry.1 += 1;
                None
            }
        }
    }

    fn into_result(self) -> Result<()> {
        if self.missing.is_empty() {
            return Ok(());
        }
        let mut parts: Vec<String> = self
            .missing
            .into_iter()
            .map(|(dim, (keys, rows))| {
                format!(
                    "{dim}: {rows} silver row(s) reference missing natural key(s) {}",
                    keys.into_iter().collect::<Vec<_>>().join(", ")
                )
            })
            .collect();
        parts.sort();
        Err(anyhow!(
            "dimension resolution failed, dimensions and silver are out of sync: {}",
            parts.join("; ")
        ))
    }
}
