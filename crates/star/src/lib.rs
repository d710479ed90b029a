//! Gold layer: the rent-contract star schema built from one silver snapshot.
//!
//! Five conformed dimensions, a calendar dimension, and one fact table with
//! exactly one row per silver contract. Dimensions and facts come from the
//! same snapshot, so the fact table carries zero unresolved foreign keys.

pub mod dates;
pub mod dims;
pub mod expiring;
pub mod fact;
pub mod gold;

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct StarConfig {
    pub slug: String,
    pub ingest_date: String,   // silver partition to read
    pub snapshot_date: String, // gold partition to write
    pub storage_root: PathBuf,
    pub silver_dir: String,    // "silver"
    pub gold_dir: String,      // "gold"
    pub manifests_dir: String, // "manifests"
}

#[derive(Debug, Default, Clone)]
pub struct StarStats {
    pub silver_rows: u64,
    pub dim_contract_type_rows: u64,
    pub dim_property_rows: u64,
    pub dim_project_rows: u64,
    pub dim_location_rows: u64,
    pub dim_tenant_rows: u64,
    pub dim_date_rows: u64,
    pub fact_rows: u64,
    pub snapshot_dir: PathBuf,
    pub commit_path: PathBuf,
}

impl StarConfig {
    pub fn silver_path(&self) -> PathBuf {
        self.storage_root
            .join(&self.silver_dir)
            .join(&self.slug)
            .join(format!("ingest_date={}", self.ingest_date))
            .join(model::SILVER_PART)
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.storage_root
            .join(&self.gold_dir)
            .join(&self.slug)
            .join(format!("snapshot_date={}", self.snapshot_date))
    }
}

pub async fn build_star_schema(cfg: StarConfig) -> Result<StarStats> {
    let silver_path = cfg.silver_path();
    if !silver_path.exists() {
        return Err(anyhow!("silver file not found: {}", silver_path.display()));
    }

    let silver = model::read_silver(&silver_path)
        .with_context(|| format!("read silver {}", silver_path.display()))?;
    info!(rows = silver.len(), "silver snapshot loaded");

    let dims = dims::build_dimensions(&silver)?;
    let date_dim = dates::build_date_dim();
    let facts = fact::build_facts(&silver, &dims)?;
    info!(
        contract_type = dims.contract_type.len(),
        property = dims.property.len(),
        project = dims.project.len(),
        location = dims.location.len(),
        tenant = dims.tenant.len(),
        date = date_dim.len(),
        facts = facts.len(),
        "star schema built"
    );

    let snapshot_dir = cfg.snapshot_dir();
    let tables = gold::write_gold_tables(&snapshot_dir, &dims, &date_dim, &facts)?;
    let commit_path = gold::write_manifest(
        &cfg.storage_root.join(&cfg.manifests_dir),
        &cfg.slug,
        &cfg.snapshot_date,
        tables,
    )?;
    info!(snapshot = %snapshot_dir.display(), "gold snapshot committed");

    Ok(StarStats {
        silver_rows: silver.len() as u64,
        dim_contract_type_rows: dims.contract_type.len() as u64,
        dim_property_rows: dims.property.len() as u64,
        dim_project_rows: dims.project.len() as u64,
        dim_location_rows: dims.location.len() as u64,
        dim_tenant_rows: dims.tenant.len() as u64,
        dim_date_rows: date_dim.len() as u64,
        fact_rows: facts.len() as u64,
        snapshot_dir,
        commit_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::ipc::writer::FileWriter as IpcWriter;
    use model::{silver_schema, SilverRecord};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::{create_dir_all, File};
    use std::sync::Arc;
    use time::macros::date;

    fn write_silver(cfg: &StarConfig, records: &[SilverRecord]) {
        use arrow::array::{
            ArrayRef, BooleanArray, Date32Array, Int64Array, StringArray,
        };
        let schema = Arc::new(silver_schema());
        let mut columns: Vec<ArrayRef> = Vec::new();
        for field in schema.fields() {
            let name = field.name().as_str();
            let col: ArrayRef = match name {
                "contract_reg_type_id" => Arc::new(Int64Array::from_iter(
                    records.iter().map(|r| r.contract_reg_type_id),
                )),
                "area_id" => {
                    Arc::new(Int64Array::from_iter(records.iter().map(|r| r.area_id)))
                }
                "annual_amount" => Arc::new(Int64Array::from_iter(
                    records.iter().map(|r| r.annual_amount),
                )),
                "contract_amount" => Arc::new(Int64Array::from_iter(
                    records.iter().map(|r| r.contract_amount),
                )),
                "contract_start_date" => Arc::new(Date32Array::from_iter(
                    records
                        .iter()
                        .map(|r| r.contract_start_date.map(model::date32_from_date)),
                )),
                "contract_end_date" => Arc::new(Date32Array::from_iter(
                    records
                        .iter()
                        .map(|r| r.contract_end_date.map(model::date32_from_date)),
                )),
                "area_name_en" => Arc::new(StringArray::from_iter(
                    records.iter().map(|r| r.area_name_en.clone()),
                )),
                "_row_number" => Arc::new(Int64Array::from_iter_values(
                    records.iter().map(|r| r.row_number),
                )),
                "_ingestion_timestamp" | "_source_file" | "_cleaned_timestamp" => Arc::new(
                    StringArray::from_iter_values(records.iter().map(|_| "test")),
                ),
                "_has_date_issues" => Arc::new(BooleanArray::from_iter(
                    records.iter().map(|r| Some(r.has_date_issues)),
                )),
                "_has_amount_issues" => Arc::new(BooleanArray::from_iter(
                    records.iter().map(|r| Some(r.has_amount_issues)),
                )),
                _ => match field.data_type() {
                    arrow::datatypes::DataType::Int64 => Arc::new(Int64Array::from_iter(
                        records.iter().map(|_| None::<i64>),
                    )),
                    arrow::datatypes::DataType::Date32 => Arc::new(Date32Array::from_iter(
                        records.iter().map(|_| None::<i32>),
                    )),
                    _ => Arc::new(StringArray::from_iter(
                        records.iter().map(|_| None::<String>),
                    )),
                },
            };
            columns.push(col);
        }
        let batch = arrow::record_batch::RecordBatch::try_new(schema.clone(), columns).unwrap();
        let path = cfg.silver_path();
        create_dir_all(path.parent().unwrap()).unwrap();
        let mut w = IpcWriter::try_new(File::create(&path).unwrap(), &schema).unwrap();
        w.write(&batch).unwrap();
        w.finish().unwrap();
    }

    fn parquet_rows(path: &std::path::Path) -> usize {
        let f = File::open(path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(f)
            .unwrap()
            .build()
            .unwrap();
        reader.map(|b| b.unwrap().num_rows()).sum()
    }

    #[tokio::test]
    async fn builds_and_persists_a_full_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = StarConfig {
            slug: "rent_contracts".into(),
            ingest_date: "2026-02-10".into(),
            snapshot_date: "2026-02-10".into(),
            storage_root: tmp.path().to_path_buf(),
            silver_dir: "silver".into(),
            gold_dir: "gold".into(),
            manifests_dir: "manifests".into(),
        };
        let records = vec![
            SilverRecord {
                contract_reg_type_id: Some(1),
                area_id: Some(10),
                area_name_en: Some("Deira".into()),
                annual_amount: Some(60_000),
                contract_amount: Some(60_000),
                contract_start_date: Some(date!(2026 - 01 - 01)),
                contract_end_date: Some(date!(2026 - 12 - 31)),
                row_number: 1,
                ..Default::default()
            },
            SilverRecord {
                contract_reg_type_id: Some(2),
                area_id: Some(20),
                area_name_en: Some("Marina".into()),
                row_number: 2,
                has_date_issues: true,
                has_amount_issues: true,
                ..Default::default()
            },
        ];
        write_silver(&cfg, &records);

        let stats = build_star_schema(cfg.clone()).await.unwrap();
        assert_eq!(stats.silver_rows, 2);
        assert_eq!(stats.fact_rows, 2);
        assert_eq!(stats.dim_location_rows, 2);
        assert_eq!(stats.dim_date_rows, 5_844);

        let snap = cfg.snapshot_dir();
        assert_eq!(parquet_rows(&snap.join("fact_rent_contract.parquet")), 2);
        assert_eq!(parquet_rows(&snap.join("dim_location.parquet")), 2);
        assert_eq!(parquet_rows(&snap.join("dim_date.parquet")), 5_844);

        let commit: gold::CommitJson = serde_json::from_reader(
            File::open(&stats.commit_path).unwrap(),
        )
        .unwrap();
        assert_eq!(commit.dataset, "rent_contracts");
        assert_eq!(commit.tables.len(), 7);
        let fact = commit
            .tables
            .iter()
            .find(|t| t.table == "fact_rent_contract")
            .unwrap();
        assert_eq!(fact.rows, 2);

        let latest = std::fs::read_to_string(
            tmp.path().join("manifests/rent_contracts/latest.json"),
        )
        .unwrap();
        assert!(latest.contains("2026-02-10"));
    }

    #[tokio::test]
    async fn missing_silver_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = StarConfig {
            slug: "rent_contracts".into(),
            ingest_date: "2026-02-10".into(),
            snapshot_date: "2026-02-10".into(),
            storage_root: tmp.path().to_path_buf(),
            silver_dir: "silver".into(),
            gold_dir: "gold".into(),
            manifests_dir: "manifests".into(),
        };
        let err = build_star_schema(cfg).await.unwrap_err();
        assert!(err.to_string().contains("silver file not found"));
    }
}
