//! Bronze layer: stream a raw rent-contracts CSV snapshot into an Arrow IPC
//! file, unchanged except for audit columns. Every source column lands as
//! nullable Utf8; typing happens later in the cleaner.

use anyhow::{anyhow, Context, Result};
use arrow::array::{ArrayRef, Int64Array, Int64Builder, RecordBatch, StringArray, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::writer::FileWriter;
use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::StreamExt;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::io::BufReader;
use tracing::info;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub slug: String,
    pub ingest_date: String, // "YYYY-MM-DD"
    pub storage_root: PathBuf,
    pub bronze_dir: String, // "bronze"
}

#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub rows_in: u64,
    pub bytes_in: u64,
    pub out_path: PathBuf,
}

const BATCH_SIZE: usize = 65_536;

pub async fn ingest_contracts(cfg: IngestConfig, source_path: &Path) -> Result<IngestStats> {
    if !source_path.exists() {
        return Err(anyhow!("source file not found: {}", source_path.display()));
    }

    let out_dir = cfg
        .storage_root
        .join(&cfg.bronze_dir)
        .join(&cfg.slug)
        .join(format!("ingest_date={}", cfg.ingest_date));
    create_dir_all(&out_dir).with_context(|| format!("mkdir -p {}", out_dir.display()))?;
    let out_path = out_dir.join("part-000000.arrow");

    let f = tokio::fs::File::open(source_path).await?;
    let bytes_in = f.metadata().await?.len();
    let mut rdr = AsyncReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .flexible(true)
        .create_reader(BufReader::new(f));

    let headers: StringRecord = rdr.headers().await?.clone();
    if headers.is_empty() {
        return Err(anyhow!("empty CSV header in {}", source_path.display()));
    }
    let src_col_count = headers.len();

    // All source columns as nullable Utf8, then the audit columns.
    let mut fields: Vec<Field> = headers
        .iter()
        .map(|name| Field::new(name.trim(), DataType::Utf8, true))
        .collect();
    fields.push(Field::new("_ingestion_timestamp", DataType::Utf8, false));
    fields.push(Field::new("_source_file", DataType::Utf8, false));
    fields.push(Field::new("_row_number", DataType::Int64, false));
    let schema = Arc::new(Schema::new(fields));

    // One timestamp per run so re-ingesting a snapshot stamps every row alike.
    let ingestion_ts = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let source_file = source_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| source_path.display().to_string());

    let out_file =
        File::create(&out_path).with_context(|| format!("create {}", out_path.display()))?;
    let mut writer = FileWriter::try_new(out_file, &schema)?;

    let mut col_builders: Vec<StringBuilder> = (0..src_col_count)
        .map(|_| StringBuilder::with_capacity(BATCH_SIZE, BATCH_SIZE * 8))
        .collect();
    let mut ts_builder = StringBuilder::with_capacity(BATCH_SIZE, BATCH_SIZE * 24);
    let mut file_builder = StringBuilder::with_capacity(BATCH_SIZE, BATCH_SIZE * 32);
    let mut rownum_builder = Int64Builder::with_capacity(BATCH_SIZE);

    let mut rows_in: u64 = 0;
    let mut records = rdr.records();

    while let Some(rec_res) = records.next().await {
        let rec = rec_res?;
        rows_in += 1;

        for (i, bldr) in col_builders.iter_mut().enumerate() {
            match rec.get(i).map(str::trim) {
                Some(v) if !v.is_empty() => bldr.append_value(v),
                _ => bldr.append_null(),
            }
        }
        ts_builder.append_value(&ingestion_ts);
        file_builder.append_value(&source_file);
        rownum_builder.append_value(rows_in as i64);

        if (rows_in as usize) % BATCH_SIZE == 0 {
            write_batch(
                &schema,
                &mut writer,
                &mut col_builders,
                &mut ts_builder,
                &mut file_builder,
                &mut rownum_builder,
            )?;
        }
    }

    if (rows_in as usize) % BATCH_SIZE != 0 {
        write_batch(
            &schema,
            &mut writer,
            &mut col_builders,
            &mut ts_builder,
            &mut file_builder,
            &mut rownum_builder,
        )?;
    }
    writer.finish()?;

    info!(rows_in, bytes_in, out = %out_path.display(), "bronze ingest complete");

    Ok(IngestStats {
        rows_in,
        bytes_in,
        out_path,
    })
}

fn write_batch(
    schema: &Arc<Schema>,
    writer: &mut FileWriter<File>,
    col_builders: &mut [StringBuilder],
    ts_builder: &mut StringBuilder,
    file_builder: &mut StringBuilder,
    rownum_builder: &mut Int64Builder,
) -> Result<()> {
    let mut cols: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for b in col_builders.iter_mut() {
        let arr: StringArray = b.finish();
        cols.push(Arc::new(arr) as ArrayRef);
    }
    let ts_arr: StringArray = ts_builder.finish();
    let file_arr: StringArray = file_builder.finish();
    let rownum_arr: Int64Array = rownum_builder.finish();
    cols.push(Arc::new(ts_arr) as ArrayRef);
    cols.push(Arc::new(file_arr) as ArrayRef);
    cols.push(Arc::new(rownum_arr) as ArrayRef);

    let batch = RecordBatch::try_new(schema.clone(), cols)?;
    writer.write(&batch)?;

    for b in col_builders.iter_mut() {
        *b = StringBuilder::with_capacity(BATCH_SIZE, BATCH_SIZE * 8);
    }
    *ts_builder = StringBuilder::with_capacity(BATCH_SIZE, BATCH_SIZE * 24);
    *file_builder = StringBuilder::with_capacity(BATCH_SIZE, BATCH_SIZE * 32);
    *rownum_builder = Int64Builder::with_capacity(BATCH_SIZE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array, StringArray};
    use arrow::ipc::reader::FileReader as IpcReader;
    use std::io::Write;

    fn write_csv(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("rent_contracts.csv");
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    async fn run_ingest(root: &Path, csv: &Path) -> IngestStats {
        let cfg = IngestConfig {
            slug: "rent_contracts".into(),
            ingest_date: "2026-01-15".into(),
            storage_root: root.to_path_buf(),
            bronze_dir: "bronze".into(),
        };
        ingest_contracts(cfg, csv).await.unwrap()
    }

    #[tokio::test]
    async fn bronze_keeps_every_row_and_adds_audit_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let csv = write_csv(
            tmp.path(),
            "contract_id,annual_amount\nA-1,50000\nA-2,\nA-3,70000\n",
        );
        let stats = run_ingest(tmp.path(), &csv).await;
        assert_eq!(stats.rows_in, 3);

        let reader = IpcReader::try_new(File::open(&stats.out_path).unwrap(), None).unwrap();
        let schema = reader.schema();
        assert_eq!(schema.fields().len(), 2 + 3, "source columns plus audit");
        let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 3);

        let batch = &batches[0];
        let amounts = batch
            .column(schema.index_of("annual_amount").unwrap())
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert!(amounts.is_null(1), "empty cell becomes null");

        let rownums = batch
            .column(schema.index_of("_row_number").unwrap())
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(rownums.value(0), 1);
        assert_eq!(rownums.value(2), 3);

        let src = batch
            .column(schema.index_of("_source_file").unwrap())
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(src.value(0), "rent_contracts.csv");
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = IngestConfig {
            slug: "rent_contracts".into(),
            ingest_date: "2026-01-15".into(),
            storage_root: tmp.path().to_path_buf(),
            bronze_dir: "bronze".into(),
        };
        let err = ingest_contracts(cfg, &tmp.path().join("nope.csv"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("source file not found"));
    }
}
