//! Header-prefixed delimited result files

use super::{RecordReader, RecordWriter};
use crate::error::{ProcessorError, Result};
use crate::sample::{Sample, SampleMetadata};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn delimiter_byte(separator: char) -> Result<u8> {
    if separator.is_ascii() {
        Ok(separator as u8)
    } else {
        Err(ProcessorError::configuration(format!(
            "separator {:?} is not a single-byte character",
            separator
        )))
    }
}

/// Reads a delimited file whose first row names the columns
pub struct CsvSampleReader {
    path: PathBuf,
    reader: Option<csv::Reader<File>>,
    metadata: Arc<SampleMetadata>,
    record: csv::StringRecord,
    row: u64,
}

impl CsvSampleReader {
    pub fn open(path: impl AsRef<Path>, separator: char) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| ProcessorError::resource(&path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_byte(separator)?)
            .has_headers(true)
            .from_reader(file);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let metadata = Arc::new(SampleMetadata::new(separator, columns));

        Ok(Self {
            path,
            reader: Some(reader),
            metadata,
            record: csv::StringRecord::new(),
            row: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordReader for CsvSampleReader {
    fn metadata(&self) -> Arc<SampleMetadata> {
        Arc::clone(&self.metadata)
    }

    fn read_next(&mut self) -> Result<Option<Sample>> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(None),
        };
        if !reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        let data = self.record.iter().map(str::to_string).collect();
        let sample = Sample::new(self.row, Arc::clone(&self.metadata), data)?;
        self.row += 1;
        Ok(Some(sample))
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

/// Writes samples as delimited rows
pub struct CsvSampleWriter {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    metadata: Arc<SampleMetadata>,
    count: u64,
}

impl CsvSampleWriter {
    pub fn create(path: impl AsRef<Path>, metadata: Arc<SampleMetadata>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| ProcessorError::resource(&path, e))?;
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter_byte(metadata.separator())?)
            .from_writer(file);
        Ok(Self {
            path,
            writer: Some(writer),
            metadata,
            count: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>> {
        let path = &self.path;
        self.writer
            .as_mut()
            .ok_or_else(|| ProcessorError::configuration(format!("{:?} is already closed", path)))
    }
}

impl RecordWriter for CsvSampleWriter {
    fn write_header(&mut self) -> Result<()> {
        let metadata = Arc::clone(&self.metadata);
        self.writer()?.write_record(metadata.columns())?;
        Ok(())
    }

    fn write(&mut self, sample: &Sample) -> Result<()> {
        self.writer()?.write_record(sample.data())?;
        self.count += 1;
        Ok(())
    }

    fn sample_count(&self) -> u64 {
        self.count
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reader_parses_header_and_quoted_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.jtl");
        std::fs::write(
            &path,
            "timeStamp,elapsed,label\n1000,12,\"home, page\"\n1010,8,login\n",
        )
        .unwrap();

        let mut reader = CsvSampleReader::open(&path, ',').unwrap();
        assert_eq!(reader.metadata().columns(), ["timeStamp", "elapsed", "label"]);

        let first = reader.read_next().unwrap().unwrap();
        assert_eq!(first.name().unwrap(), "home, page");
        let second = reader.read_next().unwrap().unwrap();
        assert_eq!(second.row(), 1);
        assert_eq!(second.elapsed_time().unwrap(), 8);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_writer_output_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let metadata = Arc::new(SampleMetadata::new(';', ["label", "elapsed"]));
        let sample = Sample::new(0, Arc::clone(&metadata), vec!["a;b".into(), "5".into()]).unwrap();

        let mut writer = CsvSampleWriter::create(&path, metadata).unwrap();
        writer.write_header().unwrap();
        writer.write(&sample).unwrap();
        writer.close().unwrap();

        let mut reader = CsvSampleReader::open(&path, ';').unwrap();
        let back = reader.read_next().unwrap().unwrap();
        assert_eq!(back.data(), sample.data());
    }

    #[test]
    fn test_multibyte_separator_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "a\n").unwrap();
        assert!(CsvSampleReader::open(&path, '→').is_err());
    }
}
