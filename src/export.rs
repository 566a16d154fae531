use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use parquet::data_type::{ByteArray, ByteArrayType, DataType, DoubleType, Int32Type, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::{SerializedFileWriter, SerializedRowGroupWriter};
use parquet::record::{Field, RowAccessor};
use parquet::schema::parser::parse_message_type;
use tracing::info;

use crate::dataset::{EncodedPartition, FittedPreprocessor};

/// File name of the fitted preprocessor next to the partitions.
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";

/// Days between 0001-01-01 and the Unix epoch, as counted by `num_days_from_ce`.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

fn message_type(part: &EncodedPartition) -> String {
    let mut fields = vec![format!("REQUIRED INT64 {};", part.id_column())];
    for column in &part.text_columns {
        fields.push(format!("REQUIRED BYTE_ARRAY {column} (UTF8);"));
    }
    for column in &part.value_columns {
        fields.push(format!("REQUIRED DOUBLE {column};"));
    }
    fields.push("REQUIRED INT32 created_on (DATE);".to_string());
    fields.push("REQUIRED INT32 outcome;".to_string());
    format!("message partition {{\n  {}\n}}", fields.join("\n  "))
}

fn write_column<T: DataType>(
    rg: &mut SerializedRowGroupWriter<'_, File>,
    values: &[T::T],
) -> Result<()> {
    let mut col = rg
        .next_column()
        .context("open parquet column")?
        .ok_or_else(|| anyhow!("parquet schema has fewer columns than the partition"))?;
    col.typed::<T>()
        .write_batch(values, None, None)
        .context("write parquet column")?;
    col.close().context("close parquet column")?;
    Ok(())
}

fn check_widths(part: &EncodedPartition) -> Result<()> {
    for row in &part.rows {
        if row.text.len() != part.text_columns.len() || row.values.len() != part.value_columns.len()
        {
            return Err(anyhow!(
                "row {} has {} text and {} value fields, expected {} and {}",
                row.id,
                row.text.len(),
                row.values.len(),
                part.text_columns.len(),
                part.value_columns.len()
            ));
        }
    }
    Ok(())
}

fn write_parquet(part: &EncodedPartition, path: &Path) -> Result<()> {
    check_widths(part)?;
    let schema = Arc::new(
        parse_message_type(&message_type(part)).context("build parquet schema")?,
    );
    let props = Arc::new(WriterProperties::builder().build());
    let file =
        File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer =
        SerializedFileWriter::new(file, schema, props).context("open parquet writer")?;

    let mut rg = writer.next_row_group().context("open row group")?;
    let ids: Vec<i64> = part.rows.iter().map(|r| r.id as i64).collect();
    write_column::<Int64Type>(&mut rg, &ids)?;
    for c in 0..part.text_columns.len() {
        let values: Vec<ByteArray> = part
            .rows
            .iter()
            .map(|r| ByteArray::from(r.text[c].as_str()))
            .collect();
        write_column::<ByteArrayType>(&mut rg, &values)?;
    }
    for c in 0..part.value_columns.len() {
        let values: Vec<f64> = part.rows.iter().map(|r| r.values[c]).collect();
        write_column::<DoubleType>(&mut rg, &values)?;
    }
    let created = vec![date_to_days(part.created_on); part.rows.len()];
    write_column::<Int32Type>(&mut rg, &created)?;
    let labels: Vec<i32> = part.rows.iter().map(|r| r.outcome.label()).collect();
    write_column::<Int32Type>(&mut rg, &labels)?;
    rg.close().context("close row group")?;
    writer.close().context("finish parquet file")?;

    info!(
        path = %path.display(),
        rows = part.rows.len(),
        columns = part.text_columns.len() + part.value_columns.len() + 3,
        "partition written"
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }
    Ok(())
}

/// Writes one partition as a single row group: id, text columns, value
/// columns, `created_on` and the integer outcome label. The file only
/// appears at `path` once it is complete.
pub fn write_partition(part: &EncodedPartition, path: &Path) -> Result<()> {
    create_parent(path)?;
    let tmp = staging_path(path);
    if let Err(e) = write_parquet(part, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))
}

/// Writes both partitions and `preprocessor.json` into `dir`. Every file is
/// staged next to its target first; targets are only replaced after all
/// three writes succeed, so a failed run leaves earlier outputs untouched.
pub fn write_dataset(
    dir: &Path,
    training: &EncodedPartition,
    test: &EncodedPartition,
    preprocessor: &FittedPreprocessor,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("create output dir {}", dir.display()))?;
    let targets = vec![
        dir.join(training.partition.file_name()),
        dir.join(test.partition.file_name()),
        dir.join(PREPROCESSOR_FILE),
    ];
    let staged: Vec<PathBuf> = targets.iter().map(|p| staging_path(p)).collect();

    let written = write_parquet(training, &staged[0])
        .and_then(|_| write_parquet(test, &staged[1]))
        .and_then(|_| {
            let json = preprocessor.to_json()?;
            fs::write(&staged[2], json)
                .with_context(|| format!("write {}", staged[2].display()))
        });
    if let Err(e) = written {
        for tmp in &staged {
            let _ = fs::remove_file(tmp);
        }
        return Err(e);
    }

    for (tmp, target) in staged.iter().zip(&targets) {
        fs::rename(tmp, target).with_context(|| format!("rename into {}", target.display()))?;
    }
    info!(dir = %dir.display(), files = targets.len(), "dataset written");
    Ok(targets)
}

/// What a written partition file holds, read back for checks and reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSummary {
    pub columns: Vec<String>,
    pub ids: Vec<i64>,
    pub outcomes: Vec<i32>,
    pub created_on: Vec<NaiveDate>,
}

impl PartitionSummary {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub fn read_partition_summary(path: &Path) -> Result<PartitionSummary> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("read parquet")?;
    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let created_idx = columns
        .iter()
        .position(|c| c == "created_on")
        .ok_or_else(|| anyhow!("{} has no created_on column", path.display()))?;
    let outcome_idx = columns
        .iter()
        .position(|c| c == "outcome")
        .ok_or_else(|| anyhow!("{} has no outcome column", path.display()))?;

    let mut out = PartitionSummary {
        columns,
        ids: Vec::new(),
        outcomes: Vec::new(),
        created_on: Vec::new(),
    };
    let iter = reader.get_row_iter(None).context("parquet row iter")?;
    for row in iter {
        let row = row.context("parquet row")?;
        out.ids.push(row.get_long(0).context("read id")?);
        out.outcomes
            .push(row.get_int(outcome_idx).context("read outcome")?);
        let days = match row.get_column_iter().nth(created_idx) {
            Some((_, Field::Date(days))) => *days,
            Some((_, other)) => return Err(anyhow!("created_on holds {other:?}, expected a DATE")),
            None => return Err(anyhow!("row is missing created_on")),
        };
        let date = days_to_date(days).ok_or_else(|| anyhow!("created_on {days} out of range"))?;
        out.created_on.push(date);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_day_zero() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(epoch), 0);
        let d = NaiveDate::from_ymd_opt(2019, 8, 16).unwrap();
        assert_eq!(days_to_date(date_to_days(d)), Some(d));
    }

    #[test]
    fn ragged_rows_are_rejected_before_writing() {
        use crate::dataset::{EncodedRow, Partition};
        use crate::records::Outcome;

        let part = EncodedPartition {
            partition: Partition::Training,
            created_on: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            text_columns: Vec::new(),
            value_columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![
                EncodedRow {
                    id: 0,
                    text: Vec::new(),
                    values: vec![0.5, 1.5],
                    outcome: Outcome::Draw,
                },
                EncodedRow {
                    id: 7,
                    text: Vec::new(),
                    values: vec![0.5],
                    outcome: Outcome::Team1,
                },
            ],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_data.parquet");
        let err = write_partition(&part, &path).unwrap_err();
        assert!(err.to_string().contains("row 7"), "{err}");
        assert!(!path.exists());
        assert!(!staging_path(&path).exists());
    }
}
