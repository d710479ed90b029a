//! Gold persistence: each star-schema table as one Parquet file under the
//! snapshot directory, plus a commit manifest and an atomically-replaced
//! `latest.json` pointer.

use crate::dates::DateRow;
use crate::dims::Dimensions;
use crate::expiring::ExpiringContract;
use crate::fact::FactRow;
use anyhow::{Context, Result};
use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Int32Array, Int64Array, RecordBatch, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FACT_BATCH_SIZE: usize = 65_536;

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitTable {
    pub table: String,
    pub rows: u64,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitJson {
    pub dataset: String,
    pub snapshot_date: String,
    pub tables: Vec<CommitTable>,
}

pub fn writer_props() -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(3)?))
        .set_dictionary_enabled(true)
        .build())
}

pub fn write_table(path: &Path, schema: Arc<Schema>, batches: &[RecordBatch]) -> Result<u64> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(writer_props()?))?;
    let mut rows = 0u64;
    for batch in batches {
        rows += batch.num_rows() as u64;
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(rows)
}

/// Write all gold tables and return the manifest entries.
pub fn write_gold_tables(
    snapshot_dir: &Path,
    dims: &Dimensions,
    date_dim: &[DateRow],
    facts: &[FactRow],
) -> Result<Vec<CommitTable>> {
    create_dir_all(snapshot_dir)
        .with_context(|| format!("mkdir -p {}", snapshot_dir.display()))?;

    let mut tables = Vec::new();
    let mut record = |name: &str, path: PathBuf, rows: u64| {
        tables.push(CommitTable {
            table: name.to_string(),
            rows,
            path: path.to_string_lossy().to_string(),
        });
    };

    let path = snapshot_dir.join("dim_contract_type.parquet");
    let rows = write_table(
        &path,
        contract_type_schema(),
        &[contract_type_batch(dims)?],
    )?;
    record("dim_contract_type", path, rows);

    let path = snapshot_dir.join("dim_property.parquet");
    let rows = write_table(&path, property_schema(), &[property_batch(dims)?])?;
    record("dim_property", path, rows);

    let path = snapshot_dir.join("dim_project.parquet");
    let rows = write_table(&path, project_schema(), &[project_batch(dims)?])?;
    record("dim_project", path, rows);

    let path = snapshot_dir.join("dim_location.parquet");
    let rows = write_table(&path, location_schema(), &[location_batch(dims)?])?;
    record("dim_location", path, rows);

    let path = snapshot_dir.join("dim_tenant.parquet");
    let rows = write_table(&path, tenant_schema(), &[tenant_batch(dims)?])?;
    record("dim_tenant", path, rows);

    let path = snapshot_dir.join("dim_date.parquet");
    let rows = write_table(&path, date_schema(), &[date_batch(date_dim)?])?;
    record("dim_date", path, rows);

    let path = snapshot_dir.join("fact_rent_contract.parquet");
    let batches = facts
        .chunks(FACT_BATCH_SIZE.max(1))
        .map(fact_batch)
        .collect::<Result<Vec<_>>>()?;
    let rows = write_table(&path, fact_schema(), &batches)?;
    record("fact_rent_contract", path, rows);

    Ok(tables)
}

/// Write `commit.json` for this snapshot and repoint `latest.json` at it.
pub fn write_manifest(
    manifests_root: &Path,
    dataset: &str,
    snapshot_date: &str,
    tables: Vec<CommitTable>,
) -> Result<PathBuf> {
    let dataset_dir = manifests_root.join(dataset);
    let commit_dir = dataset_dir.join(format!("snapshot_date={snapshot_date}"));
    create_dir_all(&commit_dir)?;

    let commit_path = commit_dir.join("commit.json");
    let commit = CommitJson {
        dataset: dataset.to_string(),
        snapshot_date: snapshot_date.to_string(),
        tables,
    };
    {
        let mut out = File::create(&commit_path)?;
        out.write_all(serde_json::to_string_pretty(&commit)?.as_bytes())?;
        out.flush()?;
    }

    let latest_tmp = dataset_dir.join("latest.json.tmp");
    let latest_path = dataset_dir.join("latest.json");
    {
        let mut out = File::create(&latest_tmp)?;
        out.write_all(format!(r#"{{"snapshot_date":"{snapshot_date}"}}"#).as_bytes())?;
        out.flush()?;
    }
    std::fs::rename(&latest_tmp, &latest_path)
        .with_context(|| format!("publish {}", latest_path.display()))?;

    Ok(commit_path)
}

// -------------------- schemas --------------------

fn contract_type_schema() -> Arc<Schema> {
    use DataType::*;
    Arc::new(Schema::new(vec![
        Field::new("contract_type_key", Int64, false),
        Field::new("contract_reg_type_id", Int64, true),
        Field::new("contract_reg_type_en", Utf8, true),
        Field::new("contract_reg_type_ar", Utf8, true),
    ]))
}

fn property_schema() -> Arc<Schema> {
    use DataType::*;
    Arc::new(Schema::new(vec![
        Field::new("property_key", Int64, false),
        Field::new("ejari_bus_property_type_id", Int64, true),
        Field::new("ejari_property_type_id", Int64, true),
        Field::new("ejari_bus_property_type_en", Utf8, true),
        Field::new("ejari_bus_property_type_ar", Utf8, true),
        Field::new("ejari_property_type_en", Utf8, true),
        Field::new("ejari_property_type_ar", Utf8, true),
        Field::new("ejari_property_sub_type_en", Utf8, true),
        Field::new("ejari_property_sub_type_ar", Utf8, true),
        Field::new("property_usage_en", Utf8, true),
        Field::new("property_usage_ar", Utf8, true),
    ]))
}

fn project_schema() -> Arc<Schema> {
    use DataType::*;
    Arc::new(Schema::new(vec![
        Field::new("project_key", Int64, false),
        Field::new("project_number", Int64, true),
        Field::new("project_name_en", Utf8, true),
        Field::new("project_name_ar", Utf8, true),
        Field::new("master_project_en", Utf8, true),
        Field::new("master_project_ar", Utf8, true),
    ]))
}

fn location_schema() -> Arc<Schema> {
    use DataType::*;
    Arc::new(Schema::new(vec![
        Field::new("location_key", Int64, false),
        Field::new("area_id", Int64, true),
        Field::new("area_name_en", Utf8, true),
        Field::new("area_name_ar", Utf8, true),
        Field::new("nearest_landmark_en", Utf8, true),
        Field::new("nearest_landmark_ar", Utf8, true),
        Field::new("nearest_metro_en", Utf8, true),
        Field::new("nearest_metro_ar", Utf8, true),
        Field::new("nearest_mall_en", Utf8, true),
        Field::new("nearest_mall_ar", Utf8, true),
    ]))
}

fn tenant_schema() -> Arc<Schema> {
    use DataType::*;
    Arc::new(Schema::new(vec![
        Field::new("tenant_key", Int64, false),
        Field::new("tenant_type_id", Int64, true),
        Field::new("tenant_type_en", Utf8, true),
        Field::new("tenant_type_ar", Utf8, true),
    ]))
}

fn date_schema() -> Arc<Schema> {
    use DataType::*;
    Arc::new(Schema::new(vec![
        Field::new("date_key", Int32, false),
        Field::new("full_date", Date32, false),
        Field::new("year", Int32, false),
        Field::new("month", Int32, false),
        Field::new("day_of_month", Int32, false),
        Field::new("quarter", Int32, false),
        Field::new("day_of_week", Int32, false),
        Field::new("month_name", Utf8, false),
        Field::new("is_weekend", Boolean, false),
    ]))
}

fn fact_schema() -> Arc<Schema> {
    use DataType::*;
    Arc::new(Schema::new(vec![
        Field::new("rent_contract_key", Int64, false),
        Field::new("contract_type_key", Int64, false),
        Field::new("property_key", Int64, false),
        Field::new("project_key", Int64, false),
        Field::new("location_key", Int64, false),
        Field::new("tenant_key", Int64, false),
        Field::new("start_date_key", Int32, true),
        Field::new("end_date_key", Int32, true),
        Field::new("contract_start_date", Date32, true),
        Field::new("contract_end_date", Date32, true),
        Field::new("annual_amount", Int64, true),
        Field::new("contract_amount", Int64, true),
        Field::new("no_of_prop", Int64, true),
        Field::new("line_number", Int64, true),
        Field::new("is_free_hold", Int64, true),
        Field::new("contract_duration_months", Int64, true),
        Field::new("_has_date_issues", Boolean, false),
        Field::new("_has_amount_issues", Boolean, false),
    ]))
}

pub fn expiring_schema() -> Arc<Schema> {
    use DataType::*;
    Arc::new(Schema::new(vec![
        Field::new("rent_contract_key", Int64, false),
        Field::new("contract_start_date", Date32, true),
        Field::new("contract_end_date", Date32, false),
        Field::new("days_until_expiry", Int64, false),
        Field::new("annual_amount", Int64, true),
        Field::new("contract_amount", Int64, true),
        Field::new("property_usage_en", Utf8, true),
        Field::new("project_name_en", Utf8, true),
        Field::new("area_name_en", Utf8, true),
        Field::new("tenant_type_en", Utf8, true),
        Field::new("_has_date_issues", Boolean, false),
        Field::new("_has_amount_issues", Boolean, false),
    ]))
}

// -------------------- row -> batch --------------------

fn contract_type_batch(dims: &Dimensions) -> Result<RecordBatch> {
    let d = &dims.contract_type;
    Ok(RecordBatch::try_new(
        contract_type_schema(),
        vec![
            int64(d.iter().map(|r| r.contract_type_key)),
            opt_int64(d.iter().map(|r| r.contract_reg_type_id)),
            utf8(d.iter().map(|r| r.contract_reg_type_en.clone())),
            utf8(d.iter().map(|r| r.contract_reg_type_ar.clone())),
        ],
    )?)
}

fn property_batch(dims: &Dimensions) -> Result<RecordBatch> {
    let d = &dims.property;
    Ok(RecordBatch::try_new(
        property_schema(),
        vec![
            int64(d.iter().map(|r| r.property_key)),
            opt_int64(d.iter().map(|r| r.ejari_bus_property_type_id)),
            opt_int64(d.iter().map(|r| r.ejari_property_type_id)),
            utf8(d.iter().map(|r| r.ejari_bus_property_type_en.clone())),
            utf8(d.iter().map(|r| r.ejari_bus_property_type_ar.clone())),
            utf8(d.iter().map(|r| r.ejari_property_type_en.clone())),
            utf8(d.iter().map(|r| r.ejari_property_type_ar.clone())),
            utf8(d.iter().map(|r| r.ejari_property_sub_type_en.clone())),
            utf8(d.iter().map(|r| r.ejari_property_sub_type_ar.clone())),
            utf8(d.iter().map(|r| r.property_usage_en.clone())),
            utf8(d.iter().map(|r| r.property_usage_ar.clone())),
        ],
    )?)
}

fn project_batch(dims: &Dimensions) -> Result<RecordBatch> {
    let d = &dims.project;
    Ok(RecordBatch::try_new(
        project_schema(),
        vec![
            int64(d.iter().map(|r| r.project_key)),
            opt_int64(d.iter().map(|r| r.project_number)),
            utf8(d.iter().map(|r| r.project_name_en.clone())),
            utf8(d.iter().map(|r| r.project_name_ar.clone())),
            utf8(d.iter().map(|r| r.master_project_en.clone())),
            utf8(d.iter().map(|r| r.master_project_ar.clone())),
        ],
    )?)
}

fn location_batch(dims: &Dimensions) -> Result<RecordBatch> {
    let d = &dims.location;
    Ok(RecordBatch::try_new(
        location_schema(),
        vec![
            int64(d.iter().map(|r| r.location_key)),
            opt_int64(d.iter().map(|r| r.area_id)),
            utf8(d.iter().map(|r| r.area_name_en.clone())),
            utf8(d.iter().map(|r| r.area_name_ar.clone())),
            utf8(d.iter().map(|r| r.nearest_landmark_en.clone())),
            utf8(d.iter().map(|r| r.nearest_landmark_ar.clone())),
            utf8(d.iter().map(|r| r.nearest_metro_en.clone())),
            utf8(d.iter().map(|r| r.nearest_metro_ar.clone())),
            utf8(d.iter().map(|r| r.nearest_mall_en.clone())),
            utf8(d.iter().map(|r| r.nearest_mall_ar.clone())),
        ],
    )?)
}

fn tenant_batch(dims: &Dimensions) -> Result<RecordBatch> {
    let d = &dims.tenant;
    Ok(RecordBatch::try_new(
        tenant_schema(),
        vec![
            int64(d.iter().map(|r| r.tenant_key)),
            opt_int64(d.iter().map(|r| r.tenant_type_id)),
            utf8(d.iter().map(|r| r.tenant_type_en.clone())),
            utf8(d.iter().map(|r| r.tenant_type_ar.clone())),
        ],
    )?)
}

fn date_batch(rows: &[DateRow]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        date_schema(),
        vec![
            int32(rows.iter().map(|r| r.date_key)),
            Arc::new(Date32Array::from_iter_values(
                rows.iter().map(|r| model::date32_from_date(r.full_date)),
            )) as ArrayRef,
            int32(rows.iter().map(|r| r.year)),
            int32(rows.iter().map(|r| r.month as i32)),
            int32(rows.iter().map(|r| r.day_of_month as i32)),
            int32(rows.iter().map(|r| r.quarter as i32)),
            int32(rows.iter().map(|r| r.day_of_week as i32)),
            utf8(rows.iter().map(|r| Some(r.month_name.to_string()))),
            boolean(rows.iter().map(|r| r.is_weekend)),
        ],
    )?)
}

fn fact_batch(rows: &[FactRow]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        fact_schema(),
        vec![
            int64(rows.iter().map(|r| r.rent_contract_key)),
            int64(rows.iter().map(|r| r.contract_type_key)),
            int64(rows.iter().map(|r| r.property_key)),
            int64(rows.iter().map(|r| r.project_key)),
            int64(rows.iter().map(|r| r.location_key)),
            int64(rows.iter().map(|r| r.tenant_key)),
            opt_int32(rows.iter().map(|r| r.start_date_key)),
            opt_int32(rows.iter().map(|r| r.end_date_key)),
            opt_date32(rows.iter().map(|r| r.contract_start_date)),
            opt_date32(rows.iter().map(|r| r.contract_end_date)),
            opt_int64(rows.iter().map(|r| r.annual_amount)),
            opt_int64(rows.iter().map(|r| r.contract_amount)),
            opt_int64(rows.iter().map(|r| r.no_of_prop)),
            opt_int64(rows.iter().map(|r| r.line_number)),
            opt_int64(rows.iter().map(|r| r.is_free_hold)),
            opt_int64(rows.iter().map(|r| r.contract_duration_months)),
            boolean(rows.iter().map(|r| r.has_date_issues)),
            boolean(rows.iter().map(|r| r.has_amount_issues)),
        ],
    )?)
}

pub fn expiring_batch(rows: &[ExpiringContract]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        expiring_schema(),
        vec![
            int64(rows.iter().map(|r| r.rent_contract_key)),
            opt_date32(rows.iter().map(|r| r.contract_start_date)),
            Arc::new(Date32Array::from_iter_values(
                rows.iter()
                    .map(|r| model::date32_from_date(r.contract_end_date)),
            )) as ArrayRef,
            int64(rows.iter().map(|r| r.days_until_expiry)),
            opt_int64(rows.iter().map(|r| r.annual_amount)),
            opt_int64(rows.iter().map(|r| r.contract_amount)),
            utf8(rows.iter().map(|r| r.property_usage_en.clone())),
            utf8(rows.iter().map(|r| r.project_name_en.clone())),
            utf8(rows.iter().map(|r| r.area_name_en.clone())),
            utf8(rows.iter().map(|r| r.tenant_type_en.clone())),
            boolean(rows.iter().map(|r| r.has_date_issues)),
            boolean(rows.iter().map(|r| r.has_amount_issues)),
        ],
    )?)
}

// -------------------- array shorthands --------------------

fn int64(it: impl Iterator<Item = i64>) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(it))
}

fn opt_int64(it: impl Iterator<Item = Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from_iter(it))
}

fn int32(it: impl Iterator<Item = i32>) -> ArrayRef {
    Arc::new(Int32Array::from_iter_values(it))
}

fn opt_int32(it: impl Iterator<Item = Option<i32>>) -> ArrayRef {
    Arc::new(Int32Array::from_iter(it))
}

fn opt_date32(it: impl Iterator<Item = Option<time::Date>>) -> ArrayRef {
    Arc::new(Date32Array::from_iter(
        it.map(|d| d.map(model::date32_from_date)),
    ))
}

fn utf8(it: impl Iterator<Item = Option<String>>) -> ArrayRef {
    Arc::new(StringArray::from_iter(it))
}

fn boolean(it: impl Iterator<Item = bool>) -> ArrayRef {
    Arc::new(BooleanArray::from_iter(it.map(Some)))
}
