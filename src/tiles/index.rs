use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::{TileKey, TileRecord};
use crate::geo::GeoBounds;

/// Columns every tile bounds table must carry
const REQUIRED_COLUMNS: [&str; 6] = ["row", "col", "lat_min", "lat_max", "lon_min", "lon_max"];

#[derive(Debug, Error)]
pub enum TileIndexError {
    #[error("failed to read tile bounds {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tile bounds table has no header row")]
    Empty,
    #[error("tile bounds header is missing column `{0}`")]
    MissingColumn(&'static str),
}

/// Why a single data row was dropped
#[derive(Debug, Error)]
enum RowError {
    #[error("column `{0}` is missing")]
    Missing(&'static str),
    #[error("column `{column}` is not an integer: {value:?}")]
    NotInteger { column: &'static str, value: String },
    #[error("column `{column}` is not a finite number: {value:?}")]
    NotNumber { column: &'static str, value: String },
    #[error("bounds are inverted (lat {lat_min}..{lat_max}, lon {lon_min}..{lon_max})")]
    Inverted {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },
}

/// Positions of the required columns in the header
struct Columns {
    row: usize,
    col: usize,
    lat_min: usize,
    lat_max: usize,
    lon_min: usize,
    lon_max: usize,
}

impl Columns {
    fn locate(headers: &[String]) -> Result<Self, TileIndexError> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(TileIndexError::MissingColumn(name))
        };
        Ok(Self {
            row: find(REQUIRED_COLUMNS[0])?,
            col: find(REQUIRED_COLUMNS[1])?,
            lat_min: find(REQUIRED_COLUMNS[2])?,
            lat_max: find(REQUIRED_COLUMNS[3])?,
            lon_min: find(REQUIRED_COLUMNS[4])?,
            lon_max: find(REQUIRED_COLUMNS[5])?,
        })
    }

    fn is_required(&self, idx: usize) -> bool {
        [self.row, self.col, self.lat_min, self.lat_max, self.lon_min, self.lon_max].contains(&idx)
    }
}

/// Static table of tile metadata, loaded once at startup
#[derive(Debug, Default)]
pub struct TileIndex {
    records: Vec<TileRecord>,
    by_key: HashMap<TileKey, usize>,
}

impl TileIndex {
    /// Build an index from already-parsed records (first record wins on duplicate keys)
    pub fn from_records(records: impl IntoIterator<Item = TileRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            index.push(record);
        }
        index
    }

    /// Read and parse a tile bounds file
    pub fn load(path: &Path) -> Result<Self, TileIndexError> {
        let text = fs::read_to_string(path).map_err(|source| TileIndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::parse(&text)?;
        debug!(path = %path.display(), tiles = index.len(), "Loaded tile index");
        Ok(index)
    }

    /// Parse delimited text with a header row.
    ///
    /// Rows with unparseable keys or bounds are logged and skipped; they never
    /// stop the rows after them from loading. A header without one of the
    /// required columns fails the whole table.
    pub fn parse(text: &str) -> Result<Self, TileIndexError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or(TileIndexError::Empty)?;
        let headers: Vec<String> = split_fields(header)
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        let columns = Columns::locate(&headers)?;

        let mut index = Self::default();
        for (line_no, line) in lines.enumerate() {
            let fields = split_fields(line);
            match parse_record(&headers, &columns, &fields) {
                Ok(record) => index.push(record),
                // Header is line 1, so the first data row is line 2
                Err(e) => warn!(line = line_no + 2, error = %e, "Skipping tile bounds row"),
            }
        }
        Ok(index)
    }

    fn push(&mut self, record: TileRecord) {
        let key = record.key();
        if self.by_key.contains_key(&key) {
            warn!(tile = %key, "Duplicate tile in bounds table, keeping the first");
            return;
        }
        self.by_key.insert(key, self.records.len());
        self.records.push(record);
    }

    #[inline(always)]
    pub fn get(&self, key: TileKey) -> Option<&TileRecord> {
        self.by_key.get(&key).and_then(|&i| self.records.get(i))
    }

    #[inline(always)]
    pub fn records(&self) -> &[TileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Union of every tile's bounds
    pub fn extent(&self) -> Option<GeoBounds> {
        self.records
            .iter()
            .map(|r| r.bounds)
            .reduce(|a, b| a.union(&b))
    }
}

fn parse_record(
    headers: &[String],
    columns: &Columns,
    fields: &[String],
) -> Result<TileRecord, RowError> {
    let field = |idx: usize, name: &'static str| {
        fields
            .get(idx)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or(RowError::Missing(name))
    };
    let int = |idx: usize, name: &'static str| -> Result<i32, RowError> {
        let value = field(idx, name)?;
        value.parse().map_err(|_| RowError::NotInteger {
            column: name,
            value: value.to_string(),
        })
    };
    let float = |idx: usize, name: &'static str| -> Result<f64, RowError> {
        let value = field(idx, name)?;
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| RowError::NotNumber {
                column: name,
                value: value.to_string(),
            })
    };

    let row = int(columns.row, "row")?;
    let col = int(columns.col, "col")?;
    let lat_min = float(columns.lat_min, "lat_min")?;
    let lat_max = float(columns.lat_max, "lat_max")?;
    let lon_min = float(columns.lon_min, "lon_min")?;
    let lon_max = float(columns.lon_max, "lon_max")?;

    if lat_min > lat_max || lon_min > lon_max {
        return Err(RowError::Inverted {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        });
    }

    let mut record = TileRecord::new(row, col, GeoBounds::new(lat_min, lat_max, lon_min, lon_max));
    for (idx, name) in headers.iter().enumerate() {
        if columns.is_required(idx) {
            continue;
        }
        if let Some(value) = fields.get(idx) {
            record.extra.insert(name.clone(), value.clone());
        }
    }
    Ok(record)
}

/// Split one line on commas, honouring double-quoted fields.
/// Quote characters themselves are dropped.
fn split_fields(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "row,col,lat_center,lon_center,url,lat_min,lat_max,lon_min,lon_max";

    #[test]
    fn test_parse_rows_and_extra_columns() {
        let text = format!(
            "{HEADER}\n9,6,31.505,34.475,\"https://x/a,b.png\",31.50,31.51,34.47,34.48\n9,7,31.505,34.485,u,31.50,31.51,34.48,34.49\n"
        );
        let index = TileIndex::parse(&text).unwrap();
        assert_eq!(index.len(), 2);

        let tile = index.get(TileKey::new(9, 6)).unwrap();
        assert_eq!(tile.bounds, GeoBounds::new(31.50, 31.51, 34.47, 34.48));
        assert_eq!(tile.extra.get("url").map(String::as_str), Some("https://x/a,b.png"));
        assert_eq!(tile.extra.get("lat_center").map(String::as_str), Some("31.505"));
        assert!(!tile.extra.contains_key("row"));
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        let text = format!(
            "{HEADER}\n1,1,0,0,u,abc,31.51,34.47,34.48\n2,2,0,0,u,31.50,31.51,34.47,34.48\n3,x,0,0,u,31.50,31.51,34.47,34.48\n4,4,0,0,u,31.52,31.53,34.47,34.48"
        );
        let index = TileIndex::parse(&text).unwrap();
        let keys: Vec<TileKey> = index.records().iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec![TileKey::new(2, 2), TileKey::new(4, 4)]);
    }

    #[test]
    fn test_non_finite_and_inverted_bounds_are_rejected() {
        let text = format!(
            "{HEADER}\n1,1,0,0,u,NaN,31.51,34.47,34.48\n2,2,0,0,u,31.51,31.50,34.47,34.48\n"
        );
        assert!(TileIndex::parse(&text).unwrap().is_empty());
    }

    #[test]
    fn test_missing_required_column() {
        let err = TileIndex::parse("row,col,lat_min,lat_max,lon_min\n1,1,0,1,0").unwrap_err();
        assert!(matches!(err, TileIndexError::MissingColumn("lon_max")));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(TileIndex::parse("\n\n"), Err(TileIndexError::Empty)));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let text = "row,col,lat_min,lat_max,lon_min,lon_max\r\n\r\n5,6,1.0,2.0,3.0,4.0\r\n";
        let index = TileIndex::parse(text).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get(TileKey::new(5, 6)).is_some());
    }

    #[test]
    fn test_duplicate_key_keeps_first() {
        let text = "row,col,lat_min,lat_max,lon_min,lon_max\n1,1,0,1,0,1\n1,1,5,6,5,6\n";
        let index = TileIndex::parse(text).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(TileKey::new(1, 1)).unwrap().bounds.lat_max, 1.0);
    }

    #[test]
    fn test_extent() {
        let text = "row,col,lat_min,lat_max,lon_min,lon_max\n1,1,0,1,0,1\n1,2,0,1,1,2\n2,1,1,2,0,1\n";
        let index = TileIndex::parse(text).unwrap();
        assert_eq!(index.extent(), Some(GeoBounds::new(0.0, 2.0, 0.0, 2.0)));
        assert_eq!(TileIndex::default().extent(), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = TileIndex::load(Path::new("/nonexistent/tile_bounds.csv")).unwrap_err();
        assert!(matches!(err, TileIndexError::Io { .. }));
    }
}
