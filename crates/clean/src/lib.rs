//! Silver layer: type and quality-flag the bronze rent-contract table.
//!
//! Every bronze row yields exactly one silver row. Malformed dates and amounts
//! never reject a row; they null the field and raise the matching `_has_*`
//! flag. A bronze/silver row-count mismatch is a fatal integrity failure.

use anyhow::{anyhow, Context, Result};
use arrow::array::{
    Array, ArrayRef, BooleanBuilder, Date32Builder, Int64Array, Int64Builder, StringArray,
    StringBuilder,
};
use arrow::datatypes::Schema;
use arrow::ipc::reader::FileReader as IpcReader;
use arrow::ipc::writer::FileWriter as IpcWriter;
use arrow::record_batch::RecordBatch;
use model::{date32_from_date, silver_schema};
use std::fs::{create_dir_all, File};
use std::path::PathBuf;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CleanConfig {
    pub slug: String,
    pub ingest_date: String, // "YYYY-MM-DD"
    pub storage_root: PathBuf,
    pub bronze_dir: String, // "bronze"
    pub silver_dir: String, // "silver"
}

#[derive(Debug, Default, Clone)]
pub struct CleanStats {
    pub rows_in: u64,
    pub rows_out: u64,
    pub date_issues: u64,
    pub amount_issues: u64,
    pub silver_out: PathBuf,
}

const BATCH_SIZE: usize = 65_536;

pub async fn clean_contracts(cfg: CleanConfig) -> Result<CleanStats> {
    let bronze_path = cfg
        .storage_root
        .join(&cfg.bronze_dir)
        .join(&cfg.slug)
        .join(format!("ingest_date={}", cfg.ingest_date))
        .join(model::BRONZE_PART);
    if !bronze_path.exists() {
        return Err(anyhow!("bronze file not found: {}", bronze_path.display()));
    }

    let silver_dir = cfg
        .storage_root
        .join(&cfg.silver_dir)
        .join(&cfg.slug)
        .join(format!("ingest_date={}", cfg.ingest_date));
    create_dir_all(&silver_dir)?;
    let silver_out = silver_dir.join(model::SILVER_PART);

    let f =
        File::open(&bronze_path).with_context(|| format!("open {}", bronze_path.display()))?;
    let reader = IpcReader::try_new(f, None)?;

    let out_schema = Arc::new(silver_schema());
    let mut writer = IpcWriter::try_new(File::create(&silver_out)?, &out_schema)?;

    // One timestamp per run; per-row logic stays a pure function of the input.
    let cleaned_ts = OffsetDateTime::now_utc().format(&Rfc3339)?;

    let mut b = SilverBuilders::new(BATCH_SIZE);
    let mut rows_in: u64 = 0;
    let mut rows_out: u64 = 0;
    let mut date_issues: u64 = 0;
    let mut amount_issues: u64 = 0;
    let mut batch_rows: usize = 0;

    for maybe_batch in reader {
        let batch = maybe_batch?;
        let n = batch.num_rows();
        rows_in += n as u64;
        let cols = BronzeCols::from_batch(&batch)?;

        for row in 0..n {
            let start_raw = opt_str(cols.contract_start_date, row);
            let end_raw = opt_str(cols.contract_end_date, row);
            let start = start_raw.and_then(parse_contract_date);
            let end = end_raw.and_then(parse_contract_date);
            let has_date_issues = date_issue(start, end);

            let contract_amount = opt_str(cols.contract_amount, row).and_then(parse_i64);
            let annual_amount = opt_str(cols.annual_amount, row).and_then(parse_i64);
            let has_amount_issues = amount_issue(annual_amount, contract_amount);

            if has_date_issues {
                date_issues += 1;
            }
            if has_amount_issues {
                amount_issues += 1;
            }

            append_opt_str(&mut b.contract_id, opt_str(cols.contract_id, row));
            append_parsed_i64(&mut b.contract_reg_type_id, cols.contract_reg_type_id, row);
            append_opt_str(&mut b.contract_reg_type_ar, opt_str(cols.contract_reg_type_ar, row));
            append_opt_str(&mut b.contract_reg_type_en, opt_str(cols.contract_reg_type_en, row));
            append_opt_date(&mut b.contract_start_date, start);
            append_opt_date(&mut b.contract_end_date, end);
            append_opt_i64(&mut b.contract_amount, contract_amount);
            append_opt_i64(&mut b.annual_amount, annual_amount);
            append_parsed_i64(&mut b.no_of_prop, cols.no_of_prop, row);
            append_parsed_i64(&mut b.line_number, cols.line_number, row);
            append_parsed_i64(&mut b.is_free_hold, cols.is_free_hold, row);
            append_parsed_i64(
                &mut b.ejari_bus_property_type_id,
                cols.ejari_bus_property_type_id,
                row,
            );
            append_opt_str(
                &mut b.ejari_bus_property_type_ar,
                opt_str(cols.ejari_bus_property_type_ar, row),
            );
            append_opt_str(
                &mut b.ejari_bus_property_type_en,
                opt_str(cols.ejari_bus_property_type_en, row),
            );
            append_parsed_i64(&mut b.ejari_property_type_id, cols.ejari_property_type_id, row);
            append_opt_str(
                &mut b.ejari_property_type_en,
                opt_str(cols.ejari_property_type_en, row),
            );
            append_opt_str(
                &mut b.ejari_property_type_ar,
                opt_str(cols.ejari_property_type_ar, row),
            );
            append_parsed_i64(
                &mut b.ejari_property_sub_type_id,
                cols.ejari_property_sub_type_id,
                row,
            );
            append_opt_str(
                &mut b.ejari_property_sub_type_en,
                opt_str(cols.ejari_property_sub_type_en, row),
            );
            append_opt_str(
                &mut b.ejari_property_sub_type_ar,
                opt_str(cols.ejari_property_sub_type_ar, row),
            );
            append_opt_str(&mut b.property_usage_en, opt_str(cols.property_usage_en, row));
            append_opt_str(&mut b.property_usage_ar, opt_str(cols.property_usage_ar, row));
            append_parsed_i64(&mut b.project_number, cols.project_number, row);
            append_opt_str(&mut b.project_name_ar, opt_str(cols.project_name_ar, row));
            append_opt_str(&mut b.project_name_en, opt_str(cols.project_name_en, row));
            append_opt_str(&mut b.master_project_ar, opt_str(cols.master_project_ar, row));
            append_opt_str(&mut b.master_project_en, opt_str(cols.master_project_en, row));
            append_parsed_i64(&mut b.area_id, cols.area_id, row);
            append_opt_str(&mut b.area_name_ar, opt_str(cols.area_name_ar, row));
            append_opt_str(&mut b.area_name_en, opt_str(cols.area_name_en, row));
            append_parsed_i64(&mut b.actual_area, cols.actual_area, row);
            append_opt_str(&mut b.nearest_landmark_ar, opt_str(cols.nearest_landmark_ar, row));
            append_opt_str(&mut b.nearest_landmark_en, opt_str(cols.nearest_landmark_en, row));
            append_opt_str(&mut b.nearest_metro_ar, opt_str(cols.nearest_metro_ar, row));
            append_opt_str(&mut b.nearest_metro_en, opt_str(cols.nearest_metro_en, row));
            append_opt_str(&mut b.nearest_mall_ar, opt_str(cols.nearest_mall_ar, row));
            append_opt_str(&mut b.nearest_mall_en, opt_str(cols.nearest_mall_en, row));
            append_parsed_i64(&mut b.tenant_type_id, cols.tenant_type_id, row);
            append_opt_str(&mut b.tenant_type_ar, opt_str(cols.tenant_type_ar, row));
            append_opt_str(&mut b.tenant_type_en, opt_str(cols.tenant_type_en, row));

            b.ingestion_timestamp
                .append_value(cols.ingestion_timestamp.value(row));
            b.source_file.append_value(cols.source_file.value(row));
            b.row_number.append_value(cols.row_number.value(row));
            b.cleaned_timestamp.append_value(&cleaned_ts);
            b.has_date_issues.append_value(has_date_issues);
            b.has_amount_issues.append_value(has_amount_issues);

            rows_out += 1;
            batch_rows += 1;
            if batch_rows == BATCH_SIZE {
                writer.write(&b.finish_batch(&out_schema))?;
                batch_rows = 0;
            }
        }
    }

    if batch_rows > 0 {
        writer.write(&b.finish_batch(&out_schema))?;
    }
    writer.finish()?;

    if rows_out != rows_in {
        return Err(anyhow!(
            "silver row count {} does not match bronze row count {}",
            rows_out,
            rows_in
        ));
    }

    info!(
        rows_in,
        rows_out, date_issues, amount_issues, "silver clean complete"
    );

    Ok(CleanStats {
        rows_in,
        rows_out,
        date_issues,
        amount_issues,
        silver_out,
    })
}

// -------------------- per-field rules --------------------

/// Strict `DD-MM-YYYY`: two-digit day, two-digit month, four-digit year,
/// dash separators, nothing else. Calendar-invalid dates fail too.
pub fn parse_contract_date(s: &str) -> Option<Date> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[2] != b'-' || bytes[5] != b'-' {
        return None;
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(i, c)| matches!(i, 2 | 5) || c.is_ascii_digit())
    {
        return None;
    }
    let fmt = format_description!("[day]-[month]-[year]");
    Date::parse(s, &fmt).ok()
}

fn date_issue(start: Option<Date>, end: Option<Date>) -> bool {
    match (start, end) {
        (Some(s), Some(e)) => e < s,
        _ => true,
    }
}

/// An amount is an issue when null, negative, or zero. Zero always counts;
/// contract activity status is not consulted.
fn amount_issue(annual_amount: Option<i64>, contract_amount: Option<i64>) -> bool {
    !matches!(annual_amount, Some(v) if v > 0) || !matches!(contract_amount, Some(v) if v > 0)
}

fn parse_i64(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

// -------------------- bronze column access --------------------

struct BronzeCols<'a> {
    contract_id: &'a StringArray,
    contract_reg_type_id: &'a StringArray,
    contract_reg_type_ar: &'a StringArray,
    contract_reg_type_en: &'a StringArray,
    contract_start_date: &'a StringArray,
    contract_end_date: &'a StringArray,
    contract_amount: &'a StringArray,
    annual_amount: &'a StringArray,
    no_of_prop: &'a StringArray,
    line_number: &'a StringArray,
    is_free_hold: &'a StringArray,
    ejari_bus_property_type_id: &'a StringArray,
    ejari_bus_property_type_ar: &'a StringArray,
    ejari_bus_property_type_en: &'a StringArray,
    ejari_property_type_id: &'a StringArray,
    ejari_property_type_en: &'a StringArray,
    ejari_property_type_ar: &'a StringArray,
    ejari_property_sub_type_id: &'a StringArray,
    ejari_property_sub_type_en: &'a StringArray,
    ejari_property_sub_type_ar: &'a StringArray,
    property_usage_en: &'a StringArray,
    property_usage_ar: &'a StringArray,
    project_number: &'a StringArray,
    project_name_ar: &'a StringArray,
    project_name_en: &'a StringArray,
    master_project_ar: &'a StringArray,
    master_project_en: &'a StringArray,
    area_id: &'a StringArray,
    area_name_ar: &'a StringArray,
    area_name_en: &'a StringArray,
    actual_area: &'a StringArray,
    nearest_landmark_ar: &'a StringArray,
    nearest_landmark_en: &'a StringArray,
    nearest_metro_ar: &'a StringArray,
    nearest_metro_en: &'a StringArray,
    nearest_mall_ar: &'a StringArray,
    nearest_mall_en: &'a StringArray,
    tenant_type_id: &'a StringArray,
    tenant_type_ar: &'a StringArray,
    tenant_type_en: &'a StringArray,
    ingestion_timestamp: &'a StringArray,
    source_file: &'a StringArray,
    row_number: &'a Int64Array,
}

impl<'a> BronzeCols<'a> {
    fn from_batch(batch: &'a RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let s = |name: &str| -> Result<&'a StringArray> {
            let idx = schema
                .index_of(name)
                .with_context(|| format!("missing column in bronze: {name}"))?;
            batch
                .column(idx)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow!("expected Utf8 for bronze column {name}"))
        };
        let row_number_idx = schema
            .index_of("_row_number")
            .context("missing column in bronze: _row_number")?;
        let row_number = batch
            .column(row_number_idx)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| anyhow!("expected Int64 for bronze column _row_number"))?;

        Ok(Self {
            contract_id: s("contract_id")?,
            contract_reg_type_id: s("contract_reg_type_id")?,
            contract_reg_type_ar: s("contract_reg_type_ar")?,
            contract_reg_type_en: s("contract_reg_type_en")?,
            contract_start_date: s("contract_start_date")?,
            contract_end_date: s("contract_end_date")?,
            contract_amount: s("contract_amount")?,
            annual_amount: s("annual_amount")?,
            no_of_prop: s("no_of_prop")?,
            line_number: s("line_number")?,
            is_free_hold: s("is_free_hold")?,
            ejari_bus_property_type_id: s("ejari_bus_property_type_id")?,
            ejari_bus_property_type_ar: s("ejari_bus_property_type_ar")?,
            ejari_bus_property_type_en: s("ejari_bus_property_type_en")?,
            ejari_property_type_id: s("ejari_property_type_id")?,
            ejari_property_type_en: s("ejari_property_type_en")?,
            ejari_property_type_ar: s("ejari_property_type_ar")?,
            ejari_property_sub_type_id: s("ejari_property_sub_type_id")?,
            ejari_property_sub_type_en: s("ejari_property_sub_type_en")?,
            ejari_property_sub_type_ar: s("ejari_property_sub_type_ar")?,
            property_usage_en: s("property_usage_en")?,
            property_usage_ar: s("property_usage_ar")?,
            project_number: s("project_number")?,
            project_name_ar: s("project_name_ar")?,
            project_name_en: s("project_name_en")?,
            master_project_ar: s("master_project_ar")?,
            master_project_en: s("master_project_en")?,
            area_id: s("area_id")?,
            area_name_ar: s("area_name_ar")?,
            area_name_en: s("area_name_en")?,
            actual_area: s("actual_area")?,
            nearest_landmark_ar: s("nearest_landmark_ar")?,
            nearest_landmark_en: s("nearest_landmark_en")?,
            nearest_metro_ar: s("nearest_metro_ar")?,
            nearest_metro_en: s("nearest_metro_en")?,
            nearest_mall_ar: s("nearest_mall_ar")?,
            nearest_mall_en: s("nearest_mall_en")?,
            tenant_type_id: s("tenant_type_id")?,
            tenant_type_ar: s("tenant_type_ar")?,
            tenant_type_en: s("tenant_type_en")?,
            ingestion_timestamp: s("_ingestion_timestamp")?,
            source_file: s("_source_file")?,
            row_number,
        })
    }
}

// -------------------- silver builders --------------------

struct SilverBuilders {
    contract_id: StringBuilder,
    contract_reg_type_id: Int64Builder,
    contract_reg_type_ar: StringBuilder,
    contract_reg_type_en: StringBuilder,
    contract_start_date: Date32Builder,
    contract_end_date: Date32Builder,
    contract_amount: Int64Builder,
    annual_amount: Int64Builder,
    no_of_prop: Int64Builder,
    line_number: Int64Builder,
    is_free_hold: Int64Builder,
    ejari_bus_property_type_id: Int64Builder,
    ejari_bus_property_type_ar: StringBuilder,
    ejari_bus_property_type_en: StringBuilder,
    ejari_property_type_id: Int64Builder,
    ejari_property_type_en: StringBuilder,
    ejari_property_type_ar: StringBuilder,
    ejari_property_sub_type_id: Int64Builder,
    ejari_property_sub_type_en: StringBuilder,
    ejari_property_sub_type_ar: StringBuilder,
    property_usage_en: StringBuilder,
    property_usage_ar: StringBuilder,
    project_number: Int64Builder,
    project_name_ar: StringBuilder,
    project_name_en: StringBuilder,
    master_project_ar: StringBuilder,
    master_project_en: StringBuilder,
    area_id: Int64Builder,
    area_name_ar: StringBuilder,
    area_name_en: StringBuilder,
    actual_area: Int64Builder,
    nearest_landmark_ar: StringBuilder,
    nearest_landmark_en: StringBuilder,
    nearest_metro_ar: StringBuilder,
    nearest_metro_en: StringBuilder,
    nearest_mall_ar: StringBuilder,
    nearest_mall_en: StringBuilder,
    tenant_type_id: Int64Builder,
    tenant_type_ar: StringBuilder,
    tenant_type_en: StringBuilder,
    ingestion_timestamp: StringBuilder,
    source_file: StringBuilder,
    row_number: Int64Builder,
    cleaned_timestamp: StringBuilder,
    has_date_issues: BooleanBuilder,
    has_amount_issues: BooleanBuilder,
}

impl SilverBuilders {
    fn new(cap: usize) -> Self {
        Self {
            contract_id: StringBuilder::with_capacity(cap, cap * 16),
            contract_reg_type_id: Int64Builder::with_capacity(cap),
            contract_reg_type_ar: StringBuilder::with_capacity(cap, cap * 16),
            contract_reg_type_en: StringBuilder::with_capacity(cap, cap * 16),
            contract_start_date: Date32Builder::with_capacity(cap),
            contract_end_date: Date32Builder::with_capacity(cap),
            contract_amount: Int64Builder::with_capacity(cap),
            annual_amount: Int64Builder::with_capacity(cap),
            no_of_prop: Int64Builder::with_capacity(cap),
            line_number: Int64Builder::with_capacity(cap),
            is_free_hold: Int64Builder::with_capacity(cap),
            ejari_bus_property_type_id: Int64Builder::with_capacity(cap),
            ejari_bus_property_type_ar: StringBuilder::with_capacity(cap, cap * 16),
            ejari_bus_property_type_en: StringBuilder::with_capacity(cap, cap * 16),
            ejari_property_type_id: Int64Builder::with_capacity(cap),
            ejari_property_type_en: StringBuilder::with_capacity(cap, cap * 16),
            ejari_property_type_ar: StringBuilder::with_capacity(cap, cap * 16),
            ejari_property_sub_type_id: Int64Builder::with_capacity(cap),
            ejari_property_sub_type_en: StringBuilder::with_capacity(cap, cap * 16),
            ejari_property_sub_type_ar: StringBuilder::with_capacity(cap, cap * 16),
            property_usage_en: StringBuilder::with_capacity(cap, cap * 16),
            property_usage_ar: StringBuilder::with_capacity(cap, cap * 16),
            project_number: Int64Builder::with_capacity(cap),
            project_name_ar: StringBuilder::with_capacity(cap, cap * 24),
            project_name_en: StringBuilder::with_capacity(cap, cap * 24),
            master_project_ar: StringBuilder::with_capacity(cap, cap * 24),
            master_project_en: StringBuilder::with_capacity(cap, cap * 24),
            area_id: Int64Builder::with_capacity(cap),
            area_name_ar: StringBuilder::with_capacity(cap, cap * 16),
            area_name_en: StringBuilder::with_capacity(cap, cap * 16),
            actual_area: Int64Builder::with_capacity(cap),
            nearest_landmark_ar: StringBuilder::with_capacity(cap, cap * 16),
            nearest_landmark_en: StringBuilder::with_capacity(cap, cap * 16),
            nearest_metro_ar: StringBuilder::with_capacity(cap, cap * 16),
            nearest_metro_en: StringBuilder::with_capacity(cap, cap * 16),
            nearest_mall_ar: StringBuilder::with_capacity(cap, cap * 16),
            nearest_mall_en: StringBuilder::with_capacity(cap, cap * 16),
            tenant_type_id: Int64Builder::with_capacity(cap),
            tenant_type_ar: StringBuilder::with_capacity(cap, cap * 16),
            tenant_type_en: StringBuilder::with_capacity(cap, cap * 16),
            ingestion_timestamp: StringBuilder::with_capacity(cap, cap * 24),
            source_file: StringBuilder::with_capacity(cap, cap * 32),
            row_number: Int64Builder::with_capacity(cap),
            cleaned_timestamp: StringBuilder::with_capacity(cap, cap * 24),
            has_date_issues: BooleanBuilder::with_capacity(cap),
            has_amount_issues: BooleanBuilder::with_capacity(cap),
        }
    }

    fn finish_batch(&mut self, schema: &Arc<Schema>) -> RecordBatch {
        macro_rules! finish {
            ($b:expr) => {
                Arc::new($b.finish()) as ArrayRef
            };
        }
        let cols: Vec<ArrayRef> = vec![
            finish!(self.contract_id),
            finish!(self.contract_reg_type_id),
            finish!(self.contract_reg_type_ar),
            finish!(self.contract_reg_type_en),
            finish!(self.contract_start_date),
            finish!(self.contract_end_date),
            finish!(self.contract_amount),
            finish!(self.annual_amount),
            finish!(self.no_of_prop),
            finish!(self.line_number),
            finish!(self.is_free_hold),
            finish!(self.ejari_bus_property_type_id),
            finish!(self.ejari_bus_property_type_ar),
            finish!(self.ejari_bus_property_type_en),
            finish!(self.ejari_property_type_id),
            finish!(self.ejari_property_type_en),
            finish!(self.ejari_property_type_ar),
            finish!(self.ejari_property_sub_type_id),
            finish!(self.ejari_property_sub_type_en),
            finish!(self.ejari_property_sub_type_ar),
            finish!(self.property_usage_en),
            finish!(self.property_usage_ar),
            finish!(self.project_number),
            finish!(self.project_name_ar),
            finish!(self.project_name_en),
            finish!(self.master_project_ar),
            finish!(self.master_project_en),
            finish!(self.area_id),
            finish!(self.area_name_ar),
            finish!(self.area_name_en),
            finish!(self.actual_area),
            finish!(self.nearest_landmark_ar),
            finish!(self.nearest_landmark_en),
            finish!(self.nearest_metro_ar),
            finish!(self.nearest_metro_en),
            finish!(self.nearest_mall_ar),
            finish!(self.nearest_mall_en),
            finish!(self.tenant_type_id),
            finish!(self.tenant_type_ar),
            finish!(self.tenant_type_en),
            finish!(self.ingestion_timestamp),
            finish!(self.source_file),
            finish!(self.row_number),
            finish!(self.cleaned_timestamp),
            finish!(self.has_date_issues),
            finish!(self.has_amount_issues),
        ];
        RecordBatch::try_new(schema.clone(), cols).unwrap()
    }
}

// -------------------- small helpers --------------------

fn opt_str(arr: &StringArray, row: usize) -> Option<&str> {
    if arr.is_null(row) {
        None
    } else {
        Some(arr.value(row))
    }
}

fn append_opt_str(tgt: &mut StringBuilder, v: Option<&str>) {
    match v {
        Some(s) if !s.trim().is_empty() => tgt.append_value(s.trim()),
        _ => tgt.append_null(),
    }
}

fn append_opt_i64(tgt: &mut Int64Builder, v: Option<i64>) {
    match v {
        Some(n) => tgt.append_value(n),
        None => tgt.append_null(),
    }
}

fn append_parsed_i64(tgt: &mut Int64Builder, arr: &StringArray, row: usize) {
    append_opt_i64(tgt, opt_str(arr, row).and_then(parse_i64));
}

fn append_opt_date(tgt: &mut Date32Builder, v: Option<Date>) {
    match v {
        Some(d) => tgt.append_value(date32_from_date(d)),
        None => tgt.append_null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field};
    use std::collections::HashMap;
    use std::path::Path;
    use time::macros::date;

    #[test]
    fn strict_day_month_year_parsing() {
        assert_eq!(parse_contract_date("05-03-2024"), Some(date!(2024 - 03 - 05)));
        assert_eq!(parse_contract_date("31-12-2035"), Some(date!(2035 - 12 - 31)));
        // invalid day for February
        assert_eq!(parse_contract_date("31-02-2024"), None);
        // wrong shape
        assert_eq!(parse_contract_date("2024-03-05"), None);
        assert_eq!(parse_contract_date("5-3-2024"), None);
        assert_eq!(parse_contract_date("05/03/2024"), None);
        assert_eq!(parse_contract_date("05-03-24"), None);
        assert_eq!(parse_contract_date(""), None);
        assert_eq!(parse_contract_date("05-03-2024 "), None);
    }

    #[test]
    fn amount_flagging_policy() {
        assert!(!amount_issue(Some(50_000), Some(100_000)));
        assert!(amount_issue(None, Some(100_000)));
        assert!(amount_issue(Some(50_000), None));
        assert!(amount_issue(Some(0), Some(100_000)));
        assert!(amount_issue(Some(50_000), Some(-1)));
    }

    #[test]
    fn date_flagging_covers_order_and_nulls() {
        let (s, e) = (date!(2024 - 01 - 01), date!(2024 - 12 - 31));
        assert!(!date_issue(Some(s), Some(e)));
        assert!(date_issue(Some(e), Some(s)));
        assert!(date_issue(None, Some(e)));
        assert!(date_issue(Some(s), None));
        assert!(!date_issue(Some(s), Some(s)), "same-day contract is fine");
    }

    // ---- end-to-end over a synthetic bronze file

    fn bronze_schema() -> Arc<Schema> {
        let mut fields: Vec<Field> = model::BRONZE_BUSINESS_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true))
            .collect();
        fields.push(Field::new("_ingestion_timestamp", DataType::Utf8, false));
        fields.push(Field::new("_source_file", DataType::Utf8, false));
        fields.push(Field::new("_row_number", DataType::Int64, false));
        Arc::new(Schema::new(fields))
    }

    fn write_bronze(root: &Path, rows: &[HashMap<&str, &str>]) {
        let schema = bronze_schema();
        let mut cols: Vec<ArrayRef> = Vec::new();
        for name in model::BRONZE_BUSINESS_COLUMNS {
            let values: Vec<Option<&str>> =
                rows.iter().map(|r| r.get(name).copied()).collect();
            cols.push(Arc::new(StringArray::from(values)) as ArrayRef);
        }
        let n = rows.len();
        cols.push(Arc::new(StringArray::from(vec![
            "2026-01-15T00:00:00Z";
            n
        ])) as ArrayRef);
        cols.push(Arc::new(StringArray::from(vec!["test.csv"; n])) as ArrayRef);
        cols.push(Arc::new(Int64Array::from(
            (1..=n as i64).collect::<Vec<_>>(),
        )) as ArrayRef);
        let batch = RecordBatch::try_new(schema.clone(), cols).unwrap();

        let dir = root
            .join("bronze")
            .join("rent_contracts")
            .join("ingest_date=2026-01-15");
        create_dir_all(&dir).unwrap();
        let mut writer =
            IpcWriter::try_new(File::create(dir.join(model::BRONZE_PART)).unwrap(), &schema)
                .unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
    }

    fn cfg(root: &Path) -> CleanConfig {
        CleanConfig {
            slug: "rent_contracts".into(),
            ingest_date: "2026-01-15".into(),
            storage_root: root.to_path_buf(),
            bronze_dir: "bronze".into(),
            silver_dir: "silver".into(),
        }
    }

    fn row(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn flags_instead_of_drops() {
        let tmp = tempfile::tempdir().unwrap();
        write_bronze(
            tmp.path(),
            &[
                row(&[
                    ("contract_id", "C-1"),
                    ("contract_start_date", "01-01-2026"),
                    ("contract_end_date", "31-12-2026"),
                    ("annual_amount", "50000"),
                    ("contract_amount", "50000"),
                    ("area_id", "123"),
                ]),
                // unparseable date, zero annual amount
                row(&[
                    ("contract_id", "C-2"),
                    ("contract_start_date", "31-02-2024"),
                    ("contract_end_date", "31-12-2026"),
                    ("annual_amount", "0"),
                    ("contract_amount", "1000"),
                ]),
                // end before start
                row(&[
                    ("contract_id", "C-3"),
                    ("contract_start_date", "01-06-2026"),
                    ("contract_end_date", "01-01-2026"),
                    ("annual_amount", "80000"),
                    ("contract_amount", "80000"),
                ]),
            ],
        );

        let stats = clean_contracts(cfg(tmp.path())).await.unwrap();
        assert_eq!(stats.rows_in, 3);
        assert_eq!(stats.rows_out, 3, "no row is ever dropped");
        assert_eq!(stats.date_issues, 2);
        assert_eq!(stats.amount_issues, 1);

        let silver = model::read_silver(&stats.silver_out).unwrap();
        assert_eq!(silver.len(), 3);

        assert!(!silver[0].has_date_issues);
        assert!(!silver[0].has_amount_issues);
        assert_eq!(silver[0].contract_start_date, Some(date!(2026 - 01 - 01)));
        assert_eq!(silver[0].area_id, Some(123));
        assert_eq!(silver[0].row_number, 1);

        assert!(silver[1].has_date_issues);
        assert!(silver[1].contract_start_date.is_none(), "bad date is nulled");
        assert_eq!(silver[1].contract_end_date, Some(date!(2026 - 12 - 31)));
        assert!(silver[1].has_amount_issues);

        assert!(silver[2].has_date_issues, "end before start is flagged");
        assert!(silver[2].contract_start_date.is_some());
        assert!(!silver[2].has_amount_issues);
    }

    #[tokio::test]
    async fn rerun_is_identical_except_cleaned_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        write_bronze(
            tmp.path(),
            &[row(&[
                ("contract_id", "C-1"),
                ("contract_start_date", "05-03-2024"),
                ("contract_end_date", "04-03-2025"),
                ("annual_amount", "60000"),
                ("contract_amount", "60000"),
            ])],
        );

        let first = clean_contracts(cfg(tmp.path())).await.unwrap();
        let mut a = model::read_silver(&first.silver_out).unwrap();
        let second = clean_contracts(cfg(tmp.path())).await.unwrap();
        let mut b = model::read_silver(&second.silver_out).unwrap();

        for rec in a.iter_mut().chain(b.iter_mut()) {
            rec.cleaned_timestamp.clear();
        }
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn empty_bronze_yields_empty_silver() {
        let tmp = tempfile::tempdir().unwrap();
        write_bronze(tmp.path(), &[]);
        let stats = clean_contracts(cfg(tmp.path())).await.unwrap();
        assert_eq!(stats.rows_in, 0);
        assert_eq!(stats.rows_out, 0);
        assert!(model::read_silver(&stats.silver_out).unwrap().is_empty());
    }
}
