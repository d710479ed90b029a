//! Silver export: the silver IPC partition re-encoded as one standalone
//! Parquet file, for consumers that speak Parquet but not Arrow IPC.
//!
//! Batches stream straight from the IPC reader into the Parquet writer; the
//! silver table is never materialized in memory.

use anyhow::{anyhow, Context, Result};
use arrow::ipc::reader::FileReader as IpcReader;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub slug: String,
    pub ingest_date: String, // "YYYY-MM-DD"
    pub storage_root: PathBuf,
    pub silver_dir: String, // "silver"
    pub out_path: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct ExportStats {
    pub rows_out: u64,
    pub bytes_out: u64,
    pub out_path: PathBuf,
}

pub async fn export_silver(cfg: ExportConfig) -> Result<ExportStats> {
    let silver_path = cfg
        .storage_root
        .join(&cfg.silver_dir)
        .join(&cfg.slug)
        .join(format!("ingest_date={}", cfg.ingest_date))
        .join(model::SILVER_PART);
    if !silver_path.exists() {
        return Err(anyhow!("silver file not found: {}", silver_path.display()));
    }

    if let Some(parent) = cfg.out_path.parent() {
        create_dir_all(parent)?;
    }

    let f =
        File::open(&silver_path).with_context(|| format!("open {}", silver_path.display()))?;
    let reader = IpcReader::try_new(f, None)?;
    let schema = reader.schema();

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(3)?))
        .set_dictionary_enabled(true)
        .build();
    let out = File::create(&cfg.out_path)
        .with_context(|| format!("create {}", cfg.out_path.display()))?;
    let mut writer = ArrowWriter::try_new(out, schema, Some(props))?;

    let mut rows_out: u64 = 0;
    for maybe_batch in reader {
        let batch = maybe_batch?;
        rows_out += batch.num_rows() as u64;
        writer.write(&batch)?;
    }
    writer.close()?;

    let bytes_out = std::fs::metadata(&cfg.out_path)?.len();
    info!(rows = rows_out, bytes = bytes_out, out = %cfg.out_path.display(), "silver exported");

    Ok(ExportStats {
        rows_out,
        bytes_out,
        out_path: cfg.out_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, BooleanArray, Date32Array, Int64Array, StringArray};
    use arrow::ipc::writer::FileWriter as IpcWriter;
    use arrow::record_batch::RecordBatch;
    use model::silver_schema;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::sync::Arc;

    fn write_empty_valued_silver(root: &std::path::Path, rows: usize) -> PathBuf {
        let schema = Arc::new(silver_schema());
        let columns: Vec<ArrayRef> = schema
            .fields()
            .iter()
            .map(|field| -> ArrayRef {
                use arrow::datatypes::DataType::*;
                match (field.name().as_str(), field.data_type()) {
                    ("_row_number", _) => {
                        Arc::new(Int64Array::from_iter_values((0..rows).map(|i| i as i64 + 1)))
                    }
                    ("_has_date_issues" | "_has_amount_issues", _) => {
                        Arc::new(BooleanArray::from_iter((0..rows).map(|_| Some(false))))
                    }
                    (_, Int64) => Arc::new(Int64Array::from_iter((0..rows).map(|_| None::<i64>))),
                    (_, Date32) => {
                        Arc::new(Date32Array::from_iter((0..rows).map(|_| None::<i32>)))
                    }
                    (_, Boolean) => {
                        Arc::new(BooleanArray::from_iter((0..rows).map(|_| Some(false))))
                    }
                    _ if field.is_nullable() => {
                        Arc::new(StringArray::from_iter((0..rows).map(|_| None::<String>)))
                    }
                    _ => Arc::new(StringArray::from_iter_values((0..rows).map(|_| "x"))),
                }
            })
            .collect();
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

        let dir = root.join("silver/rent_contracts/ingest_date=2026-02-10");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(model::SILVER_PART);
        let mut w = IpcWriter::try_new(File::create(&path).unwrap(), &schema).unwrap();
        w.write(&batch).unwrap();
        w.finish().unwrap();
        path
    }

    #[tokio::test]
    async fn exports_all_silver_rows_to_parquet() {
        let tmp = tempfile::tempdir().unwrap();
        write_empty_valued_silver(tmp.path(), 7);

        let out_path = tmp.path().join("export/rent_contracts.parquet");
        let stats = export_silver(ExportConfig {
            slug: "rent_contracts".into(),
            ingest_date: "2026-02-10".into(),
            storage_root: tmp.path().to_path_buf(),
            silver_dir: "silver".into(),
            out_path: out_path.clone(),
        })
        .await
        .unwrap();

        assert_eq!(stats.rows_out, 7);
        assert!(stats.bytes_out > 0);

        let f = File::open(&out_path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(f)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 7);
    }

    #[tokio::test]
    async fn missing_silver_partition_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = export_silver(ExportConfig {
            slug: "rent_contracts".into(),
            ingest_date: "2026-02-10".into(),
            storage_root: tmp.path().to_path_buf(),
            silver_dir: "silver".into(),
            out_path: tmp.path().join("out.parquet"),
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("silver file not found"));
    }
}
