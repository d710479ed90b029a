//! Expiring-contracts view: a read-time selection over the fact table, never
//! persisted. The as-of date is an explicit parameter so the view stays pure
//! and testable; callers decide what "today" means.

use crate::dims::Dimensions;
use crate::fact::FactRow;
use time::{Date, Duration};

pub const DEFAULT_HORIZON_DAYS: i64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpiringContract {
    pub rent_contract_key: i64,
    pub contract_start_date: Option<Date>,
    pub contract_end_date: Date,
    /// Whole days from `as_of` to the end date; `0..=horizon` by construction.
    pub days_until_expiry: i64,
    pub annual_amount: Option<i64>,
    pub contract_amount: Option<i64>,
    pub property_usage_en: Option<String>,
    pub project_name_en: Option<String>,
    pub area_name_en: Option<String>,
    pub tenant_type_en: Option<String>,
    pub has_date_issues: bool,
    pub has_amount_issues: bool,
}

/// Fact rows whose end date falls in `[as_of, as_of + horizon_days]`, both
/// ends inclusive, joined with the descriptive attributes used for reporting.
pub fn expiring_contracts(
    facts: &[FactRow],
    dims: &Dimensions,
    as_of: Date,
    horizon_days: i64,
) -> Vec<ExpiringContract> {
    let window_end = as_of + Duration::days(horizon_days);
    facts
        .iter()
        .filter_map(|f| {
            let end = f.contract_end_date?;
            if end < as_of || end > window_end {
                return None;
            }
            // surrogate keys are dense from 1, so key-1 indexes the table
            let property = &dims.property[(f.property_key - 1) as usize];
            let project = &dims.project[(f.project_key - 1) as usize];
            let location = &dims.location[(f.location_key - 1) as usize];
            let tenant = &dims.tenant[(f.tenant_key - 1) as usize];
            Some(ExpiringContract {
                rent_contract_key: f.rent_contract_key,
                contract_start_date: f.contract_start_date,
                contract_end_date: end,
                days_until_expiry: (end - as_of).whole_days(),
                annual_amount: f.annual_amount,
                contract_amount: f.contract_amount,
                property_usage_en: property.property_usage_en.clone(),
                project_name_en: project.project_name_en.clone(),
                area_name_en: location.area_name_en.clone(),
                tenant_type_en: tenant.tenant_type_en.clone(),
                has_date_issues: f.has_date_issues,
                has_amount_issues: f.has_amount_issues,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dims::build_dimensions;
    use crate::fact::build_facts;
    use model::SilverRecord;
    use time::macros::date;

    fn rec(end: Option<Date>, usage: &str) -> SilverRecord {
        SilverRecord {
            contract_start_date: end.map(|d| d - Duration::days(365)),
            contract_end_date: end,
            annual_amount: Some(50_000),
            contract_amount: Some(50_000),
            property_usage_en: Some(usage.to_string()),
            ejari_bus_property_type_id: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let as_of = date!(2026 - 02 - 10);
        let silver = vec![
            rec(Some(date!(2026 - 02 - 09)), "Residential"), // one day early
            rec(Some(date!(2026 - 02 - 10)), "Residential"), // lower bound
            rec(Some(date!(2026 - 02 - 25)), "Residential"), // upper bound
            rec(Some(date!(2026 - 02 - 26)), "Residential"), // one day late
            rec(None, "Residential"),                        // no end date
        ];
        let dims = build_dimensions(&silver).unwrap();
        let facts = build_facts(&silver, &dims).unwrap();

        let view = expiring_contracts(&facts, &dims, as_of, DEFAULT_HORIZON_DAYS);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].days_until_expiry, 0);
        assert_eq!(view[1].days_until_expiry, 15);
        for row in &view {
            assert!(row.contract_end_date >= as_of);
            assert!(row.contract_end_date <= date!(2026 - 02 - 25));
            assert!((0..=15).contains(&row.days_until_expiry));
        }
    }

    #[test]
    fn carries_reporting_attributes_from_dimensions() {
        let as_of = date!(2026 - 02 - 10);
        let silver = vec![rec(Some(date!(2026 - 02 - 12)), "Commercial")];
        let dims = build_dimensions(&silver).unwrap();
        let facts = build_facts(&silver, &dims).unwrap();

        let view = expiring_contracts(&facts, &dims, as_of, DEFAULT_HORIZON_DAYS);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].property_usage_en.as_deref(), Some("Commercial"));
        assert_eq!(view[0].days_until_expiry, 2);
    }

    #[test]
    fn view_reflects_the_supplied_as_of_date() {
        let silver = vec![rec(Some(date!(2026 - 03 - 01)), "Residential")];
        let dims = build_dimensions(&silver).unwrap();
        let facts = build_facts(&silver, &dims).unwrap();

        assert!(expiring_contracts(&facts, &dims, date!(2026 - 02 - 10), 15).is_empty());
        assert_eq!(
            expiring_contracts(&facts, &dims, date!(2026 - 02 - 20), 15).len(),
            1
        );
    }
}
