//! CSV cache files.
//!
//! One file per codelist: a `type,id,bnf_code,name` header followed by
//! one line per row in query order. Files are written through a temporary
//! file in the same directory and renamed into place.

use crate::error::{CacheReadError, CacheWriteError, TableError};
use crate::model::{COLUMNS, NAME_ALIAS, ResultTable};
use arrow_csv::reader::Format;
use arrow_csv::{ReaderBuilder, WriterBuilder};
use diagnostics::*;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `table` as CSV with a header row.
pub fn encode_csv<W: Write>(table: &ResultTable, writer: W) -> Result<(), TableError> {
    let batch = table.to_record_batch()?;
    let mut writer = WriterBuilder::new().with_header(true).build(writer);
    writer.write(&batch)?;
    Ok(())
}

/// Load a cache file.
///
/// Whatever the file holds is returned as is. A file that cannot be
/// parsed is an error, never a reason to query again.
pub fn read_cache(path: &Path) -> Result<ResultTable, CacheReadError> {
    let bytes = fs::read(path).map_err(|e| CacheReadError::io(path, e))?;

    check_header(path, &bytes)?;

    let reader = ReaderBuilder::new(ResultTable::schema())
        .with_header(true)
        .build(Cursor::new(&bytes))
        .map_err(|e| CacheReadError::csv(path, e))?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CacheReadError::csv(path, e))?;

    let table = ResultTable::from_record_batches(&batches).map_err(|source| {
        CacheReadError::Table {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let file = path.display().to_string();
    let rows = table.len();
    debug!("Read {rows} rows from cache {file}");
    Ok(table)
}

/// Persist `table` at `path`, creating parent directories.
///
/// An existing file is replaced. Concurrent writers are not coordinated;
/// the last rename wins.
pub fn write_cache(path: &Path, table: &ResultTable) -> Result<(), CacheWriteError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| CacheWriteError::io(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CacheWriteError::io(path, e))?;
    encode_csv(table, tmp.as_file_mut()).map_err(|e| CacheWriteError::encode(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CacheWriteError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| CacheWriteError::io(path, e.error))?;

    let file = path.display().to_string();
    let rows = table.len();
    debug!("Wrote {rows} rows to cache {file}");
    Ok(())
}

/// Whether a cache file is present at `path`.
///
/// A missing file, or a parent component that is not a directory, means
/// there is no cache. Any other failure to inspect the path is an error.
pub fn cache_exists(path: &Path) -> Result<bool, CacheReadError> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if is_absent(&e) => Ok(false),
        Err(e) => Err(CacheReadError::io(path, e)),
    }
}

fn is_absent(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
    )
}

/// Delete a cache file. Returns false when there was nothing to delete.
pub fn remove_cache(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            let file = path.display().to_string();
            info!("Removed cache {file}");
            Ok(true)
        }
        Err(e) if is_absent(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn check_header(path: &Path, bytes: &[u8]) -> Result<(), CacheReadError> {
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(bytes), Some(0))
        .map_err(|e| CacheReadError::csv(path, e))?;

    let found: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let last = COLUMNS.len() - 1;
    let matches = found.len() == COLUMNS.len()
        && found.iter().zip(COLUMNS).enumerate().all(|(i, (got, want))| {
            got == want || (i == last && got == NAME_ALIAS)
        });

    if matches {
        Ok(())
    } else {
        Err(CacheReadError::Header {
            path: path.to_path_buf(),
            found,
            expected: COLUMNS.iter().map(|c| c.to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodelistRow, ProductType};
    use tempfile::tempdir;

    fn rows(n: usize) -> ResultTable {
        (0..n)
            .map(|i| {
                let kind = if i % 2 == 0 { ProductType::Amp } else { ProductType::Vmp };
                CodelistRow::new(
                    kind,
                    (3_000_000_000_000_000u64 + i as u64).to_string(),
                    format!("0301011R0AA{i:02}"),
                    format!("Product {i}"),
                )
            })
            .collect()
    }

    #[test]
    fn test_round_trip_zero_one_many() -> anyhow::Result<()> {
        let dir = tempdir()?;
        for n in [0, 1, 25] {
            let path = dir.path().join(format!("t{n}.csv"));
            let table = rows(n);
            write_cache(&path, &table)?;
            assert_eq!(read_cache(&path)?, table, "{n} rows");
        }
        Ok(())
    }

    #[test]
    fn test_empty_table_still_has_header() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.csv");
        write_cache(&path, &ResultTable::default())?;
        assert_eq!(fs::read_to_string(&path)?, "type,id,bnf_code,name\n");
        Ok(())
    }

    #[test]
    fn test_file_layout_keeps_row_order() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("order.csv");
        let table = ResultTable::new(vec![
            CodelistRow::new(ProductType::Vmp, "1", "0301020A0AA", "Drug A"),
            CodelistRow::new(ProductType::Amp, "2", "0301020A0AB", "Drug B"),
        ]);
        write_cache(&path, &table)?;

        assert_eq!(
            fs::read_to_string(&path)?,
            "type,id,bnf_code,name\nvmp,1,0301020A0AA,Drug A\namp,2,0301020A0AB,Drug B\n"
        );
        Ok(())
    }

    #[test]
    fn test_quoted_names_survive() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("quoted.csv");
        let table = ResultTable::new(vec![CodelistRow::new(
            ProductType::Amp,
            "9",
            "0301011R0BB",
            "Salamol 100micrograms/dose, \"Easi-Breathe\" inhaler",
        )]);
        write_cache(&path, &table)?;
        assert_eq!(read_cache(&path)?, table);
        Ok(())
    }

    #[test]
    fn test_creates_parent_directories() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data").join("nested").join("x.csv");
        write_cache(&path, &rows(2))?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_legacy_nm_header_accepted() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("legacy.csv");
        fs::write(&path, "type,id,bnf_code,nm\nvmp,42,0301011V0AA,Terbutaline\n")?;

        let table = read_cache(&path)?;
        assert_eq!(table.rows()[0].name, "Terbutaline");
        Ok(())
    }

    #[test]
    fn test_wrong_header_is_corrupt() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.csv");
        fs::write(&path, "kind,id,code\nvmp,1,0301\n")?;

        assert!(matches!(read_cache(&path), Err(CacheReadError::Header { .. })));
        Ok(())
    }

    #[test]
    fn test_empty_file_is_corrupt() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("zero.csv");
        fs::write(&path, "")?;

        assert!(matches!(read_cache(&path), Err(CacheReadError::Header { .. })));
        Ok(())
    }

    #[test]
    fn test_ragged_row_is_corrupt() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "type,id,bnf_code,name\nvmp,1,0301\n")?;

        assert!(matches!(read_cache(&path), Err(CacheReadError::Csv { .. })));
        Ok(())
    }

    #[test]
    fn test_unknown_type_is_corrupt() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vtm.csv");
        fs::write(&path, "type,id,bnf_code,name\nvtm,1,0301,Salbutamol\n")?;

        assert!(matches!(read_cache(&path), Err(CacheReadError::Table { .. })));
        Ok(())
    }

    #[test]
    fn test_remove_cache() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("gone.csv");
        write_cache(&path, &rows(1))?;

        assert!(remove_cache(&path)?);
        assert!(!path.exists());
        assert!(!remove_cache(&path)?);
        Ok(())
    }

    #[test]
    fn test_cache_exists() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("saba_codelist.csv");
        assert!(!cache_exists(&path)?);

        write_cache(&path, &rows(1))?;
        assert!(cache_exists(&path)?);

        // A file where a directory should be is not a cache.
        let under_file = path.join("nested.csv");
        assert!(!cache_exists(&under_file)?);
        assert!(!remove_cache(&under_file)?);
        Ok(())
    }
}
