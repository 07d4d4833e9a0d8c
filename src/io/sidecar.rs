//! Files that travel next to a ciphertext: the plaintext sample count and
//! the aggregation record.

use super::artifact::Publication;
use crate::error::{fed_err, Result};
use crate::protocol::{AggregationRecord, SampleCount};
use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `<ciphertext>.count.txt`
pub fn count_sidecar_path(ciphertext: &Path) -> PathBuf {
    with_suffix(ciphertext, ".count.txt")
}

/// `<output>.record.json`
pub fn record_path(output: &Path) -> PathBuf {
    with_suffix(output, ".record.json")
}

pub fn write_count(ciphertext: &Path, count: SampleCount) -> Result<()> {
    let mut publication = Publication::new();
    stage_count(&mut publication, ciphertext, count)?;
    publication.commit()
}

/// Stage the count sidecar of `ciphertext`
pub fn stage_count(
    publication: &mut Publication,
    ciphertext: &Path,
    count: SampleCount,
) -> Result<()> {
    let text = format!("{count}\n");
    publication.stage(&count_sidecar_path(ciphertext), false, |w| {
        w.write_all(text.as_bytes())
    })
}

/// Count stored next to `ciphertext`; a missing sidecar means no count
pub fn read_count(ciphertext: &Path) -> Result<Option<SampleCount>> {
    let path = count_sidecar_path(ciphertext);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text.parse()?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(fed_err!(Io, "cannot read {}: {e}", path.display())),
    }
}

pub fn write_record(output: &Path, record: &AggregationRecord) -> Result<()> {
    let mut publication = Publication::new();
    stage_record(&mut publication, output, record)?;
    publication.commit()
}

pub fn stage_record(
    publication: &mut Publication,
    output: &Path,
    record: &AggregationRecord,
) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)?;
    publication.stage(&record_path(output), false, |w| {
        w.write_all(&json)?;
        w.write_all(b"\n")
    })
}

pub fn read_record(output: &Path) -> Result<AggregationRecord> {
    let path = record_path(output);
    let text = fs::read_to_string(&path)
        .map_err(|e| fed_err!(Io, "cannot read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FedError;
    use crate::protocol::AggregationMode;

    #[test]
    fn test_sidecar_names() {
        assert_eq!(
            count_sidecar_path(Path::new("out/site_a.ct")),
            PathBuf::from("out/site_a.ct.count.txt")
        );
        assert_eq!(
            record_path(Path::new("agg.ct")),
            PathBuf::from("agg.ct.record.json")
        );
    }

    #[test]
    fn test_count_absent_vs_present() {
        let dir = tempfile::tempdir().unwrap();
        let ct = dir.path().join("a.ct");
        assert_eq!(read_count(&ct).unwrap(), None);

        write_count(&ct, SampleCount(0.0)).unwrap();
        assert_eq!(read_count(&ct).unwrap(), Some(SampleCount(0.0)));

        write_count(&ct, SampleCount(120.0)).unwrap();
        assert_eq!(
            fs::read_to_string(count_sidecar_path(&ct)).unwrap(),
            "120\n"
        );
    }

    #[test]
    fn test_garbage_count_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let ct = dir.path().join("a.ct");
        fs::write(count_sidecar_path(&ct), "lots").unwrap();
        assert!(matches!(read_count(&ct), Err(FedError::Schema(_))));
    }

    #[test]
    fn test_record_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("agg.ct");
        let record = AggregationRecord {
            mode: AggregationMode::Weighted,
            participants: 2,
            inputs: vec!["aa".into(), "bb".into()],
            counts: Some(vec![120.0, 80.0]),
            total_weight: Some(200.0),
            context: "cc".into(),
            public_key: "dd".into(),
            output: "ee".into(),
        };
        write_record(&out, &record).unwrap();

        let text = fs::read_to_string(record_path(&out)).unwrap();
        assert!(text.contains("\"mode\": \"weighted\""));
        assert_eq!(read_record(&out).unwrap(), record);
    }
}
