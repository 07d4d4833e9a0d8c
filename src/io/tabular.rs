//! CSV inputs and outputs
//!
//! Input vectors come in one of two shapes:
//!
//! - wide: header `w1,w2,w3,w4,intercept[,count]` and one data row
//! - long: a `Feature` column and a coefficient column, one row per
//!   parameter; the row named `Intercept` (or else the last row) is the
//!   intercept

use super::artifact::Publication;
use crate::error::{fed_err, Result};
use crate::protocol::{DecryptedResult, SampleCount, WeightVector, WEIGHT_COLUMNS, WEIGHT_COUNT};
use std::io::Write;
use std::path::Path;
use tracing::debug;

const COEFFICIENT_COLUMNS: [&str; 2] = ["coefficient", "coef"];

/// Read a site's weights and optional sample count
pub fn read_weights_csv(path: &Path) -> Result<(WeightVector, Option<SampleCount>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| fed_err!(Io, "cannot read {}: {e}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(str::to_ascii_lowercase)
        .collect();
    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

    let feature_col = headers.iter().position(|h| h == "feature");
    let coef_col = headers
        .iter()
        .position(|h| COEFFICIENT_COLUMNS.contains(&h.as_str()));

    let parsed = match (feature_col, coef_col) {
        (Some(feature), Some(coef)) => read_long(path, &rows, feature, coef)?,
        _ => read_wide(path, &rows)?,
    };
    debug!(path = %path.display(), has_count = parsed.1.is_some(), "read weight vector");
    Ok(parsed)
}

fn parse_cell(path: &Path, cell: &str, what: &str) -> Result<f64> {
    let file = path.display();
    cell.parse::<f64>()
        .map_err(|e| fed_err!(Schema, "{file}: {what} is not a number ({cell:?}): {e}"))
}

fn read_wide(
    path: &Path,
    rows: &[csv::StringRecord],
) -> Result<(WeightVector, Option<SampleCount>)> {
    let row = match rows {
        [row] => row,
        _ => {
            return Err(fed_err!(
                Schema,
                "{}: expected exactly one data row, found {}",
                path.display(),
                rows.len()
            ))
        }
    };
    if row.len() < WEIGHT_COUNT {
        return Err(fed_err!(
            Schema,
            "{}: expected {WEIGHT_COUNT} weights (4 features + intercept), got {}",
            path.display(),
            row.len()
        ));
    }
    if row.len() > WEIGHT_COUNT + 1 {
        return Err(fed_err!(
            Schema,
            "{}: expected at most {} columns, got {}",
            path.display(),
            WEIGHT_COUNT + 1,
            row.len()
        ));
    }

    let values = (0..WEIGHT_COUNT)
        .map(|i| parse_cell(path, &row[i], WEIGHT_COLUMNS[i]))
        .collect::<Result<Vec<_>>>()?;
    let count = match row.get(WEIGHT_COUNT) {
        Some(cell) if !cell.is_empty() => Some(SampleCount(parse_cell(path, cell, "count")?)),
        _ => None,
    };
    Ok((WeightVector::try_from(values)?, count))
}

fn read_long(
    path: &Path,
    rows: &[csv::StringRecord],
    feature: usize,
    coef: usize,
) -> Result<(WeightVector, Option<SampleCount>)> {
    let mut features = Vec::with_capacity(rows.len());
    let mut intercept = None;
    for row in rows {
        let name = row.get(feature).unwrap_or_default();
        let value = parse_cell(path, row.get(coef).unwrap_or_default(), name)?;
        if name.eq_ignore_ascii_case("intercept") {
            intercept = Some(value);
        } else {
            features.push(value);
        }
    }

    let intercept = match intercept {
        Some(v) => v,
        None => features
            .pop()
            .ok_or_else(|| fed_err!(Schema, "{}: no coefficient rows", path.display()))?,
    };
    features.push(intercept);
    Ok((WeightVector::try_from(features)?, None))
}

/// Write the decrypted weights with header `w1,w2,w3,w4,intercept`
pub fn write_result_csv(path: &Path, result: &DecryptedResult) -> Result<()> {
    let mut publication = Publication::new();
    stage_result_csv(&mut publication, path, result)?;
    publication.commit()
}

pub fn stage_result_csv(
    publication: &mut Publication,
    path: &Path,
    result: &DecryptedResult,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(WEIGHT_COLUMNS)?;
    let cells = result.weights.iter().map(|v| v.to_string());
    writer.write_record(cells)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| fed_err!(Io, "cannot encode result CSV: {e}"))?;
    publication.stage(path, false, |w| w.write_all(&bytes))
}

/// Read a result file back
pub fn read_result_csv(path: &Path) -> Result<[f64; WEIGHT_COUNT]> {
    let (weights, _) = read_weights_csv(path)?;
    Ok(*weights.values())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FedError;
    use crate::protocol::Fingerprint;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_wide_with_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "a.csv",
            "w1,w2,w3,w4,intercept,count\n0.1,0.2,0.3,0.4,0.05,120\n",
        );
        let (w, count) = read_weights_csv(&path).unwrap();
        assert_eq!(w.values(), &[0.1, 0.2, 0.3, 0.4, 0.05]);
        assert_eq!(count, Some(SampleCount(120.0)));
    }

    #[test]
    fn test_wide_without_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.csv", "w1,w2,w3,w4,intercept,count\n1,2,3,4,5,\n");
        assert_eq!(read_weights_csv(&path).unwrap().1, None);

        let path = write(&dir, "b.csv", "w1,w2,w3,w4,intercept\n1,2,3,4,5\n");
        assert_eq!(read_weights_csv(&path).unwrap().1, None);
    }

    #[test]
    fn test_wide_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.csv", "w1,w2,w3,w4\n1,2,3,4\n");
        assert!(matches!(read_weights_csv(&path), Err(FedError::Schema(_))));

        let path = write(&dir, "b.csv", "w1,w2,w3,w4,intercept\n1,2,3,x,5\n");
        assert!(matches!(read_weights_csv(&path), Err(FedError::Schema(_))));

        let path = write(
            &dir,
            "c.csv",
            "w1,w2,w3,w4,intercept\n1,2,3,4,5\n1,2,3,4,5\n",
        );
        assert!(matches!(read_weights_csv(&path), Err(FedError::Schema(_))));
    }

    #[test]
    fn test_long_form_with_intercept_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "a.csv",
            "Feature,Coefficient\nIntercept,0.05\nage,0.1\nbmi,0.2\nbp,0.3\nglucose,0.4\n",
        );
        let (w, count) = read_weights_csv(&path).unwrap();
        assert_eq!(w.values(), &[0.1, 0.2, 0.3, 0.4, 0.05]);
        assert_eq!(count, None);
    }

    #[test]
    fn test_long_form_last_row_intercept() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.csv", "feature,Coef\na,1\nb,2\nc,3\nd,4\ne,5\n");
        let (w, _) = read_weights_csv(&path).unwrap();
        assert_eq!(w.values(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_long_form_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "a.csv",
            "Feature,Coefficient\na,1\nb,2\nIntercept,3\n",
        );
        assert!(matches!(read_weights_csv(&path), Err(FedError::Schema(_))));
    }

    #[test]
    fn test_result_roundtrip_full_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.csv");
        let fp = Fingerprint::of(&[b"x"]);
        let result = DecryptedResult {
            weights: [0.1 + 0.2, 1.0 / 3.0, -2.5e-9, 0.0, 123456.789],
            aggregate: fp,
            context: fp,
            public_key: fp,
        };
        write_result_csv(&path, &result).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("w1,w2,w3,w4,intercept\n"));
        assert_eq!(read_result_csv(&path).unwrap(), result.weights);
    }

    #[test]
    fn test_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_weights_csv(&dir.path().join("nope.csv")),
            Err(FedError::Io(_))
        ));
    }
}
