use crate::common::*;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

/// Read a tab-delimited numeric matrix. Lines starting with `#` are
/// skipped; every data line must carry the same number of fields.
pub fn read_tsv(file: &str) -> anyhow::Result<Mat> {
    let reader = BufReader::new(File::open(file)?);

    let mut data: Vec<f64> = vec![];
    let mut ncols = 0;
    let mut nrows = 0;

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row: Vec<f64> = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>()
                    .map_err(|_| anyhow::anyhow!("failed to parse '{}' in {}", tok, file))
            })
            .collect::<anyhow::Result<_>>()?;

        if nrows == 0 {
            ncols = row.len();
        } else if row.len() != ncols {
            anyhow::bail!("ragged row {} in {}", nrows, file);
        }
        data.extend(row);
        nrows += 1;
    }

    if nrows == 0 {
        anyhow::bail!("no data in {}", file);
    }

    Ok(Mat::from_row_iterator(nrows, ncols, data))
}

/// Write a matrix as tab-delimited text, one row per line.
pub fn write_tsv(mat: &Mat, file: &str) -> anyhow::Result<()> {
    let mut out = BufWriter::new(File::create(file)?);
    for i in 0..mat.nrows() {
        let row: Vec<String> = mat.row(i).iter().map(|x| x.to_string()).collect();
        writeln!(out, "{}", row.join("\t"))?;
    }
    Ok(())
}

/// Write a vector as a single tab-delimited column.
pub fn write_column_tsv(values: &[f64], file: &str) -> anyhow::Result<()> {
    let mut out = BufWriter::new(File::create(file)?);
    for v in values {
        writeln!(out, "{}", v)?;
    }
    Ok(())
}
