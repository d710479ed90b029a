//! Shared data model for the rent-contract warehouse: the typed silver record,
//! the silver Arrow schema, Date32 helpers, and a silver IPC reader used by the
//! gold and export stages.

use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, BooleanArray, Date32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::reader::FileReader as IpcReader;
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::path::Path;
use time::{Date, Duration, Month};

pub const SILVER_PART: &str = "part-000000.arrow";
pub const BRONZE_PART: &str = "part-000000.arrow";

/// Business columns the source snapshot must deliver, in bronze order. The
/// ingestor stores whatever the CSV carries; the cleaner requires these.
pub const BRONZE_BUSINESS_COLUMNS: &[&str] = &[
    "contract_id",
    "contract_reg_type_id",
    "contract_reg_type_ar",
    "contract_reg_type_en",
    "contract_start_date",
    "contract_end_date",
    "contract_amount",
    "annual_amount",
    "no_of_prop",
    "line_number",
    "is_free_hold",
    "ejari_bus_property_type_id",
    "ejari_bus_property_type_ar",
    "ejari_bus_property_type_en",
    "ejari_property_type_id",
    "ejari_property_type_en",
    "ejari_property_type_ar",
    "ejari_property_sub_type_id",
    "ejari_property_sub_type_en",
    "ejari_property_sub_type_ar",
    "property_usage_en",
    "property_usage_ar",
    "project_number",
    "project_name_ar",
    "project_name_en",
    "master_project_ar",
    "master_project_en",
    "area_id",
    "area_name_ar",
    "area_name_en",
    "actual_area",
    "nearest_landmark_ar",
    "nearest_landmark_en",
    "nearest_metro_ar",
    "nearest_metro_en",
    "nearest_mall_ar",
    "nearest_mall_en",
    "tenant_type_id",
    "tenant_type_ar",
    "tenant_type_en",
];

/// One cleaned rent contract, 1:1 with its bronze row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SilverRecord {
    pub contract_id: Option<String>,
    pub contract_reg_type_id: Option<i64>,
    pub contract_reg_type_ar: Option<String>,
    pub contract_reg_type_en: Option<String>,
    pub contract_start_date: Option<Date>,
    pub contract_end_date: Option<Date>,
    pub contract_amount: Option<i64>,
    pub annual_amount: Option<i64>,
    pub no_of_prop: Option<i64>,
    pub line_number: Option<i64>,
    pub is_free_hold: Option<i64>,
    pub ejari_bus_property_type_id: Option<i64>,
    pub ejari_bus_property_type_ar: Option<String>,
    pub ejari_bus_property_type_en: Option<String>,
    pub ejari_property_type_id: Option<i64>,
    pub ejari_property_type_en: Option<String>,
    pub ejari_property_type_ar: Option<String>,
    pub ejari_property_sub_type_id: Option<i64>,
    pub ejari_property_sub_type_en: Option<String>,
    pub ejari_property_sub_type_ar: Option<String>,
    pub property_usage_en: Option<String>,
    pub property_usage_ar: Option<String>,
    pub project_number: Option<i64>,
    pub project_name_ar: Option<String>,
    pub project_name_en: Option<String>,
    pub master_project_ar: Option<String>,
    pub master_project_en: Option<String>,
    pub area_id: Option<i64>,
    pub area_name_ar: Option<String>,
    pub area_name_en: Option<String>,
    pub actual_area: Option<i64>,
    pub nearest_landmark_ar: Option<String>,
    pub nearest_landmark_en: Option<String>,
    pub nearest_metro_ar: Option<String>,
    pub nearest_metro_en: Option<String>,
    pub nearest_mall_ar: Option<String>,
    pub nearest_mall_en: Option<String>,
    pub tenant_type_id: Option<i64>,
    pub tenant_type_ar: Option<String>,
    pub tenant_type_en: Option<String>,
    pub ingestion_timestamp: String,
    pub source_file: String,
    pub row_number: i64,
    pub cleaned_timestamp: String,
    pub has_date_issues: bool,
    pub has_amount_issues: bool,
}

/// Silver schema. Column order is the compatibility contract for downstream
/// consumers of both the IPC table and the Parquet export.
pub fn silver_schema() -> Schema {
    use DataType::*;
    Schema::new(vec![
        Field::new("contract_id", Utf8, true),
        Field::new("contract_reg_type_id", Int64, true),
        Field::new("contract_reg_type_ar", Utf8, true),
        Field::new("contract_reg_type_en", Utf8, true),
        Field::new("contract_start_date", Date32, true),
        Field::new("contract_end_date", Date32, true),
        Field::new("contract_amount", Int64, true),
        Field::new("annual_amount", Int64, true),
        Field::new("no_of_prop", Int64, true),
        Field::new("line_number", Int64, true),
        Field::new("is_free_hold", Int64, true),
        Field::new("ejari_bus_property_type_id", Int64, true),
        Field::new("ejari_bus_property_type_ar", Utf8, true),
        Field::new("ejari_bus_property_type_en", Utf8, true),
        Field::new("ejari_property_type_id", Int64, true),
        Field::new("ejari_property_type_en", Utf8, true),
        Field::new("ejari_property_type_ar", Utf8, true),
        Field::new("ejari_property_sub_type_id", Int64, true),
        Field::new("ejari_property_sub_type_en", Utf8, true),
        Field::new("ejari_property_sub_type_ar", Utf8, true),
        Field::new("property_usage_en", Utf8, true),
        Field::new("property_usage_ar", Utf8, true),
        Field::new("project_number", Int64, true),
        Field::new("project_name_ar", Utf8, true),
        Field::new("project_name_en", Utf8, true),
        Field::new("master_project_ar", Utf8, true),
        Field::new("master_project_en", Utf8, true),
        Field::new("area_id", Int64, true),
        Field::new("area_name_ar", Utf8, true),
        Field::new("area_name_en", Utf8, true),
        Field::new("actual_area", Int64, true),
        Field::new("nearest_landmark_ar", Utf8, true),
        Field::new("nearest_landmark_en", Utf8, true),
        Field::new("nearest_metro_ar", Utf8, true),
        Field::new("nearest_metro_en", Utf8, true),
        Field::new("nearest_mall_ar", Utf8, true),
        Field::new("nearest_mall_en", Utf8, true),
        Field::new("tenant_type_id", Int64, true),
        Field::new("tenant_type_ar", Utf8, true),
        Field::new("tenant_type_en", Utf8, true),
        Field::new("_ingestion_timestamp", Utf8, false),
        Field::new("_source_file", Utf8, false),
        Field::new("_row_number", Int64, false),
        Field::new("_cleaned_timestamp", Utf8, false),
        Field::new("_has_date_issues", Boolean, false),
        Field::new("_has_amount_issues", Boolean, false),
    ])
}

// ---------- Date32 helpers (days since 1970-01-01)

const EPOCH: Date = match Date::from_calendar_date(1970, Month::January, 1) {
    Ok(d) => d,
    Err(_) => panic!("invalid epoch"),
};

pub fn date32_from_date(d: Date) -> i32 {
    (d - EPOCH).whole_days() as i32
}

pub fn date_from_date32(days: i32) -> Date {
    EPOCH + Duration::days(days as i64)
}

/// Integer-encoded date used by the date dimension and fact date keys.
pub fn date_key(d: Date) -> i32 {
    d.year() * 10_000 + u8::from(d.month()) as i32 * 100 + d.day() as i32
}

// ---------- Silver IPC reader

/// Materialize a silver IPC file into typed records, preserving row order.
pub fn read_silver(path: &Path) -> Result<Vec<SilverRecord>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = IpcReader::try_new(f, None)?;

    let mut records = Vec::new();
    for maybe_batch in reader {
        let batch = maybe_batch?;
        let cols = SilverCols::from_batch(&batch)?;
        for row in 0..batch.num_rows() {
            records.push(cols.record(row)?);
        }
    }
    Ok(records)
}

struct SilverCols<'a> {
    contract_id: &'a StringArray,
    contract_reg_type_id: &'a Int64Array,
    contract_reg_type_ar: &'a StringArray,
    contract_reg_type_en: &'a StringArray,
    contract_start_date: &'a Date32Array,
    contract_end_date: &'a Date32Array,
    contract_amount: &'a Int64Array,
    annual_amount: &'a Int64Array,
    no_of_prop: &'a Int64Array,
    line_number: &'a Int64Array,
    is_free_hold: &'a Int64Array,
    ejari_bus_property_type_id: &'a Int64Array,
    ejari_bus_property_type_ar: &'a StringArray,
    ejari_bus_property_type_en: &'a StringArray,
    ejari_property_type_id: &'a Int64Array,
    ejari_property_type_en: &'a StringArray,
    ejari_property_type_ar: &'a StringArray,
    ejari_property_sub_type_id: &'a Int64Array,
    ejari_property_sub_type_en: &'a StringArray,
    ejari_property_sub_type_ar: &'a StringArray,
    property_usage_en: &'a StringArray,
    property_usage_ar: &'a StringArray,
    project_number: &'a Int64Array,
    project_name_ar: &'a StringArray,
    project_name_en: &'a StringArray,
    master_project_ar: &'a StringArray,
    master_project_en: &'a StringArray,
    area_id: &'a Int64Array,
    area_name_ar: &'a StringArray,
    area_name_en: &'a StringArray,
    actual_area: &'a Int64Array,
    nearest_landmark_ar: &'a StringArray,
    nearest_landmark_en: &'a StringArray,
    nearest_metro_ar: &'a StringArray,
    nearest_metro_en: &'a StringArray,
    nearest_mall_ar: &'a StringArray,
    nearest_mall_en: &'a StringArray,
    tenant_type_id: &'a Int64Array,
    tenant_type_ar: &'a StringArray,
    tenant_type_en: &'a StringArray,
    ingestion_timestamp: &'a StringArray,
    source_file: &'a StringArray,
    row_number: &'a Int64Array,
    cleaned_timestamp: &'a StringArray,
    has_date_issues: &'a BooleanArray,
    has_amount_issues: &'a BooleanArray,
}

impl<'a> SilverCols<'a> {
    fn from_batch(batch: &'a RecordBatch) -> Result<Self> {
        Ok(Self {
            contract_id: str_col(batch, "contract_id")?,
            contract_reg_type_id: i64_col(batch, "contract_reg_type_id")?,
            contract_reg_type_ar: str_col(batch, "contract_reg_type_ar")?,
            contract_reg_type_en: str_col(batch, "contract_reg_type_en")?,
            contract_start_date: date_col(batch, "contract_start_date")?,
            contract_end_date: date_col(batch, "contract_end_date")?,
            contract_amount: i64_col(batch, "contract_amount")?,
            annual_amount: i64_col(batch, "annual_amount")?,
            no_of_prop: i64_col(batch, "no_of_prop")?,
            line_number: i64_col(batch, "line_number")?,
            is_free_hold: i64_col(batch, "is_free_hold")?,
            ejari_bus_property_type_id: i64_col(batch, "ejari_bus_property_type_id")?,
            ejari_bus_property_type_ar: str_col(batch, "ejari_bus_property_type_ar")?,
            ejari_bus_property_type_en: str_col(batch, "ejari_bus_property_type_en")?,
            ejari_property_type_id: i64_col(batch, "ejari_property_type_id")?,
            ejari_property_type_en: str_col(batch, "ejari_property_type_en")?,
            ejari_property_type_ar: str_col(batch, "ejari_property_type_ar")?,
            ejari_property_sub_type_id: i64_col(batch, "ejari_property_sub_type_id")?,
            ejari_property_sub_type_en: str_col(batch, "ejari_property_sub_type_en")?,
            ejari_property_sub_type_ar: str_col(batch, "ejari_property_sub_type_ar")?,
            property_usage_en: str_col(batch, "property_usage_en")?,
            property_usage_ar: str_col(batch, "property_usage_ar")?,
            project_number: i64_col(batch, "project_number")?,
            project_name_ar: str_col(batch, "project_name_ar")?,
            project_name_en: str_col(batch, "project_name_en")?,
            master_project_ar: str_col(batch, "master_project_ar")?,
            master_project_en: str_col(batch, "master_project_en")?,
            area_id: i64_col(batch, "area_id")?,
            area_name_ar: str_col(batch, "area_name_ar")?,
            area_name_en: str_col(batch, "area_name_en")?,
            actual_area: i64_col(batch, "actual_area")?,
            nearest_landmark_ar: str_col(batch, "nearest_landmark_ar")?,
            nearest_landmark_en: str_col(batch, "nearest_landmark_en")?,
            nearest_metro_ar: str_col(batch, "nearest_metro_ar")?,
            nearest_metro_en: str_col(batch, "nearest_metro_en")?,
            nearest_mall_ar: str_col(batch, "nearest_mall_ar")?,
            nearest_mall_en: str_col(batch, "nearest_mall_en")?,
            tenant_type_id: i64_col(batch, "tenant_type_id")?,
            tenant_type_ar: str_col(batch, "tenant_type_ar")?,
            tenant_type_en: str_col(batch, "tenant_type_en")?,
            ingestion_timestamp: str_col(batch, "_ingestion_timestamp")?,
            source_file: str_col(batch, "_source_file")?,
            row_number: i64_col(batch, "_row_number")?,
            cleaned_timestamp: str_col(batch, "_cleaned_timestamp")?,
            has_date_issues: bool_col(batch, "_has_date_issues")?,
            has_amount_issues: bool_col(batch, "_has_amount_issues")?,
        })
    }

    fn record(&self, row: usize) -> Result<SilverRecord> {
        Ok(SilverRecord {
            contract_id: opt_string(self.contract_id, row),
            contract_reg_type_id: opt_i64(self.contract_reg_type_id, row),
            contract_reg_type_ar: opt_string(self.contract_reg_type_ar, row),
            contract_reg_type_en: opt_string(self.contract_reg_type_en, row),
            contract_start_date: opt_date(self.contract_start_date, row),
            contract_end_date: opt_date(self.contract_end_date, row),
            contract_amount: opt_i64(self.contract_amount, row),
            annual_amount: opt_i64(self.annual_amount, row),
            no_of_prop: opt_i64(self.no_of_prop, row),
            line_number: opt_i64(self.line_number, row),
            is_free_hold: opt_i64(self.is_free_hold, row),
            ejari_bus_property_type_id: opt_i64(self.ejari_bus_property_type_id, row),
            ejari_bus_property_type_ar: opt_string(self.ejari_bus_property_type_ar, row),
            ejari_bus_property_type_en: opt_string(self.ejari_bus_property_type_en, row),
            ejari_property_type_id: opt_i64(self.ejari_property_type_id, row),
            ejari_property_type_en: opt_string(self.ejari_property_type_en, row),
            ejari_property_type_ar: opt_string(self.ejari_property_type_ar, row),
            ejari_property_sub_type_id: opt_i64(self.ejari_property_sub_type_id, row),
            ejari_property_sub_type_en: opt_string(self.ejari_property_sub_type_en, row),
            ejari_property_sub_type_ar: opt_string(self.ejari_property_sub_type_ar, row),
            property_usage_en: opt_string(self.property_usage_en, row),
            property_usage_ar: opt_string(self.property_usage_ar, row),
            project_number: opt_i64(self.project_number, row),
            project_name_ar: opt_string(self.project_name_ar, row),
            project_name_en: opt_string(self.project_name_en, row),
            master_project_ar: opt_string(self.master_project_ar, row),
            master_project_en: opt_string(self.master_project_en, row),
            area_id: opt_i64(self.area_id, row),
            area_name_ar: opt_string(self.area_name_ar, row),
            area_name_en: opt_string(self.area_name_en, row),
            actual_area: opt_i64(self.actual_area, row),
            nearest_landmark_ar: opt_string(self.nearest_landmark_ar, row),
            nearest_landmark_en: opt_string(self.nearest_landmark_en, row),
            nearest_metro_ar: opt_string(self.nearest_metro_ar, row),
            nearest_metro_en: opt_string(self.nearest_metro_en, row),
            nearest_mall_ar: opt_string(self.nearest_mall_ar, row),
            nearest_mall_en: opt_string(self.nearest_mall_en, row),
            tenant_type_id: opt_i64(self.tenant_type_id, row),
            tenant_type_ar: opt_string(self.tenant_type_ar, row),
            tenant_type_en: opt_string(self.tenant_type_en, row),
            ingestion_timestamp: req_string(self.ingestion_timestamp, row, "_ingestion_timestamp")?,
            source_file: req_string(self.source_file, row, "_source_file")?,
            row_number: req_i64(self.row_number, row, "_row_number")?,
            cleaned_timestamp: req_string(self.cleaned_timestamp, row, "_cleaned_timestamp")?,
            has_date_issues: self.has_date_issues.value(row),
            has_amount_issues: self.has_amount_issues.value(row),
        })
    }
}

// ---------- column downcast helpers

fn col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a dyn Array> {
    let idx = batch
        .schema()
        .index_of(name)
        .with_context(|| format!("missing column in silver: {name}"))?;
    Ok(batch.column(idx).as_ref())
}

fn str_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    col(batch, name)?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("expected Utf8 for column {name}"))
}

fn i64_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    col(batch, name)?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| anyhow!("expected Int64 for column {name}"))
}

fn date_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Date32Array> {
    col(batch, name)?
        .as_any()
        .downcast_ref::<Date32Array>()
        .ok_or_else(|| anyhow!("expected Date32 for column {name}"))
}

fn bool_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a BooleanArray> {
    col(batch, name)?
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| anyhow!("expected Boolean for column {name}"))
}

fn opt_string(arr: &StringArray, row: usize) -> Option<String> {
    if arr.is_null(row) {
        None
    } else {
        Some(arr.value(row).to_string())
    }
}

fn opt_i64(arr: &Int64Array, row: usize) -> Option<i64> {
    if arr.is_null(row) {
        None
    } else {
        Some(arr.value(row))
    }
}

fn opt_date(arr: &Date32Array, row: usize) -> Option<Date> {
    if arr.is_null(row) {
        None
    } else {
        Some(date_from_date32(arr.value(row)))
    }
}

fn req_string(arr: &StringArray, row: usize, name: &str) -> Result<String> {
    opt_string(arr, row).ok_or_else(|| anyhow!("null in non-nullable column {name}"))
}

fn req_i64(arr: &Int64Array, row: usize, name: &str) -> Result<i64> {
    opt_i64(arr, row).ok_or_else(|| anyhow!("null in non-nullable column {name}"))
}
