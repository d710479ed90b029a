//! Dimension builder: distinct natural-key members extracted from silver,
//! each assigned a dense surrogate key.
//!
//! Members are sorted by natural key (nulls first) before key assignment, so
//! surrogate keys are reproducible across runs over the same input. A natural
//! key observed with two different attribute tuples aborts the build; the
//! warehouse never emits duplicate members for one key.

use anyhow::{anyhow, Result};
use model::SilverRecord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq)]
pub struct ContractTypeRow {
    pub contract_type_key: i64,
    pub contract_reg_type_id: Option<i64>,
    pub contract_reg_type_en: Option<String>,
    pub contract_reg_type_ar: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRow {
    pub property_key: i64,
    pub ejari_bus_property_type_id: Option<i64>,
    pub ejari_property_type_id: Option<i64>,
    pub ejari_bus_property_type_en: Option<String>,
    pub ejari_bus_property_type_ar: Option<String>,
    pub ejari_property_type_en: Option<String>,
    pub ejari_property_type_ar: Option<String>,
    pub ejari_property_sub_type_en: Option<String>,
    pub ejari_property_sub_type_ar: Option<String>,
    pub property_usage_en: Option<String>,
    pub property_usage_ar: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRow {
    pub project_key: i64,
    pub project_number: Option<i64>,
    pub project_name_en: Option<String>,
    pub project_name_ar: Option<String>,
    pub master_project_en: Option<String>,
    pub master_project_ar: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRow {
    pub location_key: i64,
    pub area_id: Option<i64>,
    pub area_name_en: Option<String>,
    pub area_name_ar: Option<String>,
    pub nearest_landmark_en: Option<String>,
    pub nearest_landmark_ar: Option<String>,
    pub nearest_metro_en: Option<String>,
    pub nearest_metro_ar: Option<String>,
    pub nearest_mall_en: Option<String>,
    pub nearest_mall_ar: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenantRow {
    pub tenant_key: i64,
    pub tenant_type_id: Option<i64>,
    pub tenant_type_en: Option<String>,
    pub tenant_type_ar: Option<String>,
}

#[derive(Debug, Default)]
pub struct Dimensions {
    pub contract_type: Vec<ContractTypeRow>,
    pub property: Vec<PropertyRow>,
    pub project: Vec<ProjectRow>,
    pub location: Vec<LocationRow>,
    pub tenant: Vec<TenantRow>,
}

pub fn build_dimensions(silver: &[SilverRecord]) -> Result<Dimensions> {
    let contract_type = distinct_members(
        "dim_contract_type",
        silver,
        |r| r.contract_reg_type_id,
        |r| (r.contract_reg_type_en.clone(), r.contract_reg_type_ar.clone()),
    )?
    .into_iter()
    .enumerate()
    .map(|(i, (id, (en, ar)))| ContractTypeRow {
        contract_type_key: i as i64 + 1,
        contract_reg_type_id: id,
        contract_reg_type_en: en,
        contract_reg_type_ar: ar,
    })
    .collect();

    let property = distinct_members(
        "dim_property",
        silver,
        |r| (r.ejari_bus_property_type_id, r.ejari_property_type_id),
        |r| {
            (
                r.ejari_bus_property_type_en.clone(),
                r.ejari_bus_property_type_ar.clone(),
                r.ejari_property_type_en.clone(),
                r.ejari_property_type_ar.clone(),
                r.ejari_property_sub_type_en.clone(),
                r.ejari_property_sub_type_ar.clone(),
                r.property_usage_en.clone(),
                r.property_usage_ar.clone(),
            )
        },
    )?
    .into_iter()
    .enumerate()
    .map(
        |(i, ((bus_id, type_id), (bus_en, bus_ar, ty_en, ty_ar, sub_en, sub_ar, use_en, use_ar)))| {
            PropertyRow {
                property_key: i as i64 + 1,
                ejari_bus_property_type_id: bus_id,
                ejari_property_type_id: type_id,
                ejari_bus_property_type_en: bus_en,
                ejari_bus_property_type_ar: bus_ar,
                ejari_property_type_en: ty_en,
                ejari_property_type_ar: ty_ar,
                ejari_property_sub_type_en: sub_en,
                ejari_property_sub_type_ar: sub_ar,
                property_usage_en: use_en,
                property_usage_ar: use_ar,
            }
        },
    )
    .collect();

    let project = distinct_members(
        "dim_project",
        silver,
        |r| r.project_number,
        |r| {
            (
                r.project_name_en.clone(),
                r.project_name_ar.clone(),
                r.master_project_en.clone(),
                r.master_project_ar.clone(),
            )
        },
    )?
    .into_iter()
    .enumerate()
    .map(|(i, (number, (name_en, name_ar, master_en, master_ar)))| ProjectRow {
        project_key: i as i64 + 1,
        project_number: number,
        project_name_en: name_en,
        project_name_ar: name_ar,
        master_project_en: master_en,
        master_project_ar: master_ar,
    })
    .collect();

    let location = distinct_members(
        "dim_location",
        silver,
        |r| r.area_id,
        |r| {
            (
                r.area_name_en.clone(),
                r.area_name_ar.clone(),
                r.nearest_landmark_en.clone(),
                r.nearest_landmark_ar.clone(),
                r.nearest_metro_en.clone(),
                r.nearest_metro_ar.clone(),
                r.nearest_mall_en.clone(),
                r.nearest_mall_ar.clone(),
            )
        },
    )?
    .into_iter()
    .enumerate()
    .map(
        |(i, (area_id, (a_en, a_ar, lm_en, lm_ar, me_en, me_ar, ma_en, ma_ar)))| LocationRow {
            location_key: i as i64 + 1,
            area_id,
            area_name_en: a_en,
            area_name_ar: a_ar,
            nearest_landmark_en: lm_en,
            nearest_landmark_ar: lm_ar,
            nearest_metro_en: me_en,
            nearest_metro_ar: me_ar,
            nearest_mall_en: ma_en,
            nearest_mall_ar: ma_ar,
        },
    )
    .collect();

    let tenant = distinct_members(
        "dim_tenant",
        silver,
        |r| r.tenant_type_id,
        |r| (r.tenant_type_en.clone(), r.tenant_type_ar.clone()),
    )?
    .into_iter()
    .enumerate()
    .map(|(i, (id, (en, ar)))| TenantRow {
        tenant_key: i as i64 + 1,
        tenant_type_id: id,
        tenant_type_en: en,
        tenant_type_ar: ar,
    })
    .collect();

    Ok(Dimensions {
        contract_type,
        property,
        project,
        location,
        tenant,
    })
}

/// Collect the distinct (natural key, attribute tuple) pairs of one dimension,
/// sorted by natural key. Two different attribute tuples under one key violate
/// the dimension's functional dependency and fail the build.
fn distinct_members<K, A>(
    dim: &str,
    silver: &[SilverRecord],
    key_fn: impl Fn(&SilverRecord) -> K,
    attr_fn: impl Fn(&SilverRecord) -> A,
) -> Result<Vec<(K, A)>>
where
    K: Ord + Hash + Clone + Debug,
    A: PartialEq,
{
    let mut seen: HashMap<K, A> = HashMap::with_capacity(1024);
    for rec in silver {
        let key = key_fn(rec);
        let attrs = attr_fn(rec);
        match seen.entry(key) {
            Entry::Vacant(v) => {
                v.insert(attrs);
            }
            Entry::Occupied(o) => {
                if *o.get() != attrs {
                    return Err(anyhow!(
                        "{dim}: natural key {:?} maps to conflicting attribute tuples",
                        o.key()
                    ));
                }
            }
        }
    }
    let mut members: Vec<(K, A)> = seen.into_iter().collect();
    members.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(members)
}
