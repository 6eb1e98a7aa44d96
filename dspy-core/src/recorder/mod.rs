//! Data recorder: a boundary sink for observed L2/L4/trade events, not part
//! of the trading path.
//!
//! Grounded on the original `recorder.py`: per-symbol, per-data-type files
//! rotated daily under `output_dir/symbol/{l2|l4|trades}_YYYY-MM-DD.{ext}`,
//! opened in append mode, flushed every 100 records and on close. JSONL
//! writes one JSON object per line; CSV derives its columns from the first
//! record written and preserves them for the life of the file.

use crate::config::RecordingConfig;
use crate::core::{L2BookSnapshot, Symbol};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const FLUSH_EVERY: u32 = 100;

trait RecordWriter: Send {
    fn write(&mut self, record: &Value) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

struct JsonLinesWriter {
    file: File,
}

impl JsonLinesWriter {
    fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl RecordWriter for JsonLinesWriter {
    fn write(&mut self, record: &Value) -> Result<()> {
        writeln!(self.file, "{record}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

struct CsvWriter {
    file: File,
    columns: Option<Vec<String>>,
}

impl CsvWriter {
    fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let existed = path.exists() && path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            columns: if existed { Some(Vec::new()) } else { None },
        })
    }
}

impl RecordWriter for CsvWriter {
    fn write(&mut self, record: &Value) -> Result<()> {
        let Value::Object(map) = record else {
            anyhow::bail!("CSV writer requires object records");
        };

        if self.columns.is_none() {
            let columns: Vec<String> = map.keys().cloned().collect();
            writeln!(self.file, "{}", columns.join(","))?;
            self.columns = Some(columns);
        }

        let columns = self.columns.as_ref().unwrap();
        let row: Vec<String> = columns
            .iter()
            .map(|c| csv_field(map.get(c).unwrap_or(&Value::Null)))
            .collect();
        writeln!(self.file, "{}", row.join(","))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

fn csv_field(value: &Value) -> String {
    let raw = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

fn date_str() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    // Days since epoch, rendered as a UTC calendar date without pulling in a
    // date/time crate — the recorder only needs a stable once-per-day key.
    let days = secs / 86_400;
    let (y, m, d) = civil_from_days(days as i64);
    format!("{y:04}-{m:02}-{d:02}")
}

/// Howard Hinnant's `civil_from_days`: days-since-epoch to (year, month, day).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Records L2, L4, and trade data to disk with daily file rotation.
pub struct DataRecorder {
    config: RecordingConfig,
    output_dir: PathBuf,
    writers: HashMap<String, Box<dyn RecordWriter>>,
    flush_counter: u32,
}

impl DataRecorder {
    pub fn new(config: RecordingConfig) -> Self {
        let output_dir = PathBuf::from(&config.output_dir);
        Self {
            config,
            output_dir,
            writers: HashMap::new(),
            flush_counter: 0,
        }
    }

    fn get_writer(&mut self, symbol: &Symbol, data_type: &str) -> Result<&mut Box<dyn RecordWriter>> {
        let today = date_str();
        let key = format!("{symbol}:{data_type}:{today}");

        if !self.writers.contains_key(&key) {
            let prefix = format!("{symbol}:{data_type}:");
            self.writers.retain(|k, _| !k.starts_with(&prefix) || k == &key);

            let ext = if self.config.format == "csv" { "csv" } else { "jsonl" };
            let path = self.output_dir.join(symbol.as_str()).join(format!("{data_type}_{today}.{ext}"));

            let writer: Box<dyn RecordWriter> = if self.config.format == "csv" {
                Box::new(CsvWriter::open(&path).with_context(|| format!("opening {}", path.display()))?)
            } else {
                Box::new(JsonLinesWriter::open(&path).with_context(|| format!("opening {}", path.display()))?)
            };
            self.writers.insert(key.clone(), writer);
        }

        Ok(self.writers.get_mut(&key).unwrap())
    }

    pub fn record_l2(&mut self, symbol: &Symbol, snapshot: &L2BookSnapshot) {
        if !self.config.record_l2 {
            return;
        }
        let record = json!({
            "recv_ts_ms": now_ms(),
            "exch_ts_ms": snapshot.timestamp_ms,
            "symbol": symbol.as_str(),
            "best_bid": snapshot.best_bid().map(|l| l.price.to_string()),
            "best_bid_sz": snapshot.best_bid().map(|l| l.size.to_string()),
            "best_ask": snapshot.best_ask().map(|l| l.price.to_string()),
            "best_ask_sz": snapshot.best_ask().map(|l| l.size.to_string()),
            "mid": snapshot.mid().map(|m| m.to_string()),
            "spread_bps": snapshot.spread_bps().map(|s| s.to_string()),
            "bid_levels": snapshot.bids.len(),
            "ask_levels": snapshot.asks.len(),
        });
        self.write(symbol, "l2", record);
    }

    pub fn record_l4(&mut self, symbol: &Symbol, raw: &Value) {
        if !self.config.record_l4 {
            return;
        }
        let record = json!({
            "recv_ts_ms": now_ms(),
            "symbol": symbol.as_str(),
            "data": raw,
        });
        self.write(symbol, "l4", record);
    }

    pub fn record_trade(&mut self, symbol: &Symbol, trade: &Value) {
        if !self.config.record_trades {
            return;
        }
        let mut record = Map::new();
        record.insert("recv_ts_ms".into(), json!(now_ms()));
        record.insert("symbol".into(), json!(symbol.as_str()));
        record.insert("side".into(), trade.get("side").cloned().unwrap_or(Value::Null));
        record.insert("px".into(), trade.get("px").cloned().unwrap_or(Value::Null));
        record.insert("sz".into(), trade.get("sz").cloned().unwrap_or(Value::Null));
        record.insert("time".into(), trade.get("time").cloned().unwrap_or(Value::Null));
        record.insert("hash".into(), trade.get("hash").cloned().unwrap_or(Value::Null));
        self.write(symbol, "trades", Value::Object(record));
    }

    fn write(&mut self, symbol: &Symbol, data_type: &str, record: Value) {
        match self.get_writer(symbol, data_type) {
            Ok(writer) => {
                if let Err(e) = writer.write(&record) {
                    warn!(%symbol, data_type, error = %e, "recorder write failed");
                    return;
                }
            }
            Err(e) => {
                warn!(%symbol, data_type, error = %e, "recorder failed to open writer");
                return;
            }
        }
        self.flush_counter += 1;
        if self.flush_counter >= FLUSH_EVERY {
            self.flush();
            self.flush_counter = 0;
        }
    }

    pub fn flush(&mut self) {
        for (key, writer) in self.writers.iter_mut() {
            if let Err(e) = writer.flush() {
                warn!(key, error = %e, "recorder flush failed");
            }
        }
    }

    pub fn close(&mut self) {
        self.flush();
        self.writers.clear();
    }
}

impl Drop for DataRecorder {
    fn drop(&mut self) {
        self.close();
    }
}
