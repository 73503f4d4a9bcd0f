//! Ingestion stage: export a collection and split it into train and test.

use arrow::record_batch::RecordBatch;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::artifacts::IngestionArtifact;
use crate::error::{ErrorKind, PipelineError, ResultExt};
use crate::pipeline::config::{validate_split_ratio, IngestionConfig};
use crate::source::{RecordSource, STORE_ID_FIELD};
use crate::storage::{drop_column, take_rows, write_csv};

/// Fetches raw records and produces the train/test partitions.
pub struct DataIngestion<'a> {
    config: &'a IngestionConfig,
    source: &'a dyn RecordSource,
}

impl<'a> DataIngestion<'a> {
    pub fn new(config: &'a IngestionConfig, source: &'a dyn RecordSource) -> Self {
        Self { config, source }
    }

    /// Fetches the configured collection and writes it to the feature store.
    ///
    /// # Errors
    ///
    /// Returns a source error if the fetch fails and an I/O error if the
    /// feature store file cannot be written.
    pub fn export_to_feature_store(&self) -> Result<RecordBatch, PipelineError> {
        let collection = self.config.collection();
        let raw = self.source.fetch_collection(collection).or_fail(
            ErrorKind::Source,
            format!("could not fetch collection '{}'", collection),
        )?;
        let data = drop_column(&raw, STORE_ID_FIELD);

        let path = self.config.feature_store_path();
        write_csv(path, &data).or_fail(
            ErrorKind::Io,
            format!("could not write feature store '{}'", path.display()),
        )?;

        tracing::info!(
            collection,
            rows = data.num_rows(),
            columns = data.num_columns(),
            path = %path.display(),
            "Exported collection to feature store"
        );
        Ok(data)
    }

    /// Shuffles the rows and writes the train and test partitions.
    ///
    /// The shuffle is reproducible only when a split seed is configured.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a ratio outside (0, 1) or a table
    /// with fewer than two rows.
    pub fn split_train_test(&self, data: &RecordBatch) -> Result<(), PipelineError> {
        let rows = data.num_rows();
        let test_size = test_partition_size(rows, self.config.split_ratio())?;

        let mut indices: Vec<usize> = (0..rows).collect();
        let mut rng = self.create_rng();
        indices.shuffle(&mut rng);
        let (test_indices, train_indices) = indices.split_at(test_size);

        let train = take_rows(data, train_indices)?;
        let test = take_rows(data, test_indices)?;

        let train_path = self.config.train_path();
        let test_path = self.config.test_path();
        write_csv(train_path, &train).or_fail(
            ErrorKind::Io,
            format!("could not write train partition '{}'", train_path.display()),
        )?;
        write_csv(test_path, &test).or_fail(
            ErrorKind::Io,
            format!("could not write test partition '{}'", test_path.display()),
        )?;

        tracing::info!(
            train_rows = train.num_rows(),
            test_rows = test.num_rows(),
            seeded = self.config.split_seed().is_some(),
            "Split data into train and test partitions"
        );
        Ok(())
    }

    /// Runs the export and the split in sequence.
    pub fn run(&self) -> Result<IngestionArtifact, PipelineError> {
        let _span = tracing::info_span!("data_ingestion").entered();
        tracing::info!("Starting data ingestion");

        let data = self.export_to_feature_store()?;
        self.split_train_test(&data)?;

        let artifact = IngestionArtifact::new(self.config.train_path(), self.config.test_path());
        tracing::info!(
            train = %artifact.trained_file_path().display(),
            test = %artifact.test_file_path().display(),
            "Data ingestion completed"
        );
        Ok(artifact)
    }

    fn create_rng(&self) -> ChaCha8Rng {
        match self.config.split_seed() {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }
}

/// Number of rows held out for testing: `ceil(ratio * rows)`, kept within
/// `[1, rows - 1]` so neither partition is empty.
pub fn test_partition_size(rows: usize, ratio: f64) -> Result<usize, PipelineError> {
    validate_split_ratio(ratio)?;
    if rows < 2 {
        return Err(PipelineError::configuration(format!(
            "cannot split {} row(s) into train and test partitions",
            rows
        )));
    }
    let size = (ratio * rows as f64).ceil() as usize;
    Ok(size.clamp(1, rows - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use crate::storage::{column_as_f64, read_csv};
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn table(rows: usize) -> RecordBatch {
        let ids: Vec<i64> = (0..rows as i64).collect();
        let ages: Vec<i64> = ids.iter().map(|i| 20 + i % 50).collect();
        RecordBatch::try_from_iter(vec![
            ("_id", Arc::new(StringArray::from(vec!["oid"; rows])) as ArrayRef),
            ("id", Arc::new(Int64Array::from(ids)) as ArrayRef),
            ("Age", Arc::new(Int64Array::from(ages)) as ArrayRef),
        ])
        .unwrap()
    }

    fn config(dir: &TempDir, ratio: f64, seed: Option<u64>) -> IngestionConfig {
        let root = dir.path().join("data_ingestion");
        IngestionConfig::new(
            "cars",
            root.join("feature_store/data.csv"),
            root.join("ingested/train.csv"),
            root.join("ingested/test.csv"),
            ratio,
            seed,
        )
    }

    #[test]
    fn test_partition_sizes() {
        assert_eq!(test_partition_size(100, 0.2).unwrap(), 20);
        assert_eq!(test_partition_size(10, 0.25).unwrap(), 3);
        assert_eq!(test_partition_size(2, 0.01).unwrap(), 1);
        assert_eq!(test_partition_size(2, 0.99).unwrap(), 1);
        assert_eq!(test_partition_size(3, 0.9).unwrap(), 2);
    }

    #[test]
    fn test_partition_size_rejects_bad_input() {
        let err = test_partition_size(1, 0.5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = test_partition_size(100, 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_run_writes_partitions() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 0.2, Some(42));
        let source = InMemorySource::new().with_collection("cars", table(100));

        let artifact = DataIngestion::new(&config, &source).run().unwrap();

        let raw = read_csv(config.feature_store_path()).unwrap();
        assert_eq!(raw.num_rows(), 100);
        assert!(raw.column_by_name("_id").is_none());

        let train = read_csv(artifact.trained_file_path()).unwrap();
        let test = read_csv(artifact.test_file_path()).unwrap();
        assert_eq!(train.num_rows(), 80);
        assert_eq!(test.num_rows(), 20);

        let mut ids = column_as_f64(&train, "id").unwrap();
        ids.extend(column_as_f64(&test, "id").unwrap());
        ids.sort_by(|a, b| a.total_cmp(b));
        let expected: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_seeded_split_is_reproducible() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let source = InMemorySource::new().with_collection("cars", table(30));

        for dir in [&first, &second] {
            let config = config(dir, 0.3, Some(7));
            DataIngestion::new(&config, &source).run().unwrap();
        }

        let read_ids = |dir: &TempDir| {
            let config = config(dir, 0.3, Some(7));
            column_as_f64(&read_csv(config.test_path()).unwrap(), "id").unwrap()
        };
        assert_eq!(read_ids(&first), read_ids(&second));
    }

    #[test]
    fn test_rerun_overwrites_outputs() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 0.5, None);

        let large = InMemorySource::new().with_collection("cars", table(40));
        DataIngestion::new(&config, &large).run().unwrap();
        let small = InMemorySource::new().with_collection("cars", table(10));
        DataIngestion::new(&config, &small).run().unwrap();

        assert_eq!(read_csv(config.feature_store_path()).unwrap().num_rows(), 10);
        assert_eq!(read_csv(config.train_path()).unwrap().num_rows(), 5);
        assert_eq!(read_csv(config.test_path()).unwrap().num_rows(), 5);
    }

    #[test]
    fn test_missing_collection_is_source_error() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 0.2, None);
        let source = InMemorySource::new();

        let err = DataIngestion::new(&config, &source).run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Source);
        assert!(!config.feature_store_path().exists());
    }

    #[test]
    fn test_single_row_cannot_be_split() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 0.2, None);
        let source = InMemorySource::new().with_collection("cars", table(1));

        let err = DataIngestion::new(&config, &source).run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!config.train_path().exists());
    }
}
