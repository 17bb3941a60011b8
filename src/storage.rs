use crate::error::Result;
use crate::types::{BronzeRecord, GoldRecord, RawRecord, RowKind, SilverRecord};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Storage trait for mirroring pipeline layers into a queryable store.
/// Tables are append-only; every run adds its rows and history stays.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert_bronze(&self, records: &[BronzeRecord]) -> Result<()>;
    async fn insert_silver(&self, records: &[SilverRecord]) -> Result<()>;
    async fn insert_gold(&self, records: &[GoldRecord]) -> Result<()>;

    /// All bronze rows, optionally restricted to one source. Backs the
    /// incremental duplicate check.
    async fn bronze_records(&self, source: Option<&str>) -> Result<Vec<BronzeRecord>>;

    /// Most recent collection date seen for a source, if any.
    async fn latest_collection_date(&self, source: &str) -> Result<Option<NaiveDate>>;

    /// Delete bronze rows collected strictly before `cutoff`. Returns the
    /// number of rows removed.
    async fn cleanup_bronze_older_than(&self, cutoff: NaiveDate) -> Result<usize>;

    /// Row counts per layer (bronze, silver, gold).
    async fn layer_counts(&self) -> Result<(u64, u64, u64)>;
}

/// In-memory storage implementation for development and tests.
pub struct InMemoryStorage {
    bronze: Arc<Mutex<Vec<BronzeRecord>>>,
    silver: Arc<Mutex<Vec<SilverRecord>>>,
    gold: Arc<Mutex<Vec<GoldRecord>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            bronze: Arc::new(Mutex::new(Vec::new())),
            silver: Arc::new(Mutex::new(Vec::new())),
            gold: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn insert_bronze(&self, records: &[BronzeRecord]) -> Result<()> {
        let mut bronze = self.bronze.lock().unwrap();
        bronze.extend_from_slice(records);
        debug!("Stored {} bronze records in memory", records.len());
        Ok(())
    }

    async fn insert_silver(&self, records: &[SilverRecord]) -> Result<()> {
        let mut silver = self.silver.lock().unwrap();
        silver.extend_from_slice(records);
        Ok(())
    }

    async fn insert_gold(&self, records: &[GoldRecord]) -> Result<()> {
        let mut gold = self.gold.lock().unwrap();
        gold.extend_from_slice(records);
        Ok(())
    }

    async fn bronze_records(&self, source: Option<&str>) -> Result<Vec<BronzeRecord>> {
        let bronze = self.bronze.lock().unwrap();
        Ok(bronze
            .iter()
            .filter(|r| source.map_or(true, |s| r.source == s))
            .cloned()
            .collect())
    }

    async fn latest_collection_date(&self, source: &str) -> Result<Option<NaiveDate>> {
        let bronze = self.bronze.lock().unwrap();
        Ok(bronze
            .iter()
            .filter(|r| r.source == source)
            .map(|r| r.collection_date)
            .max())
    }

    async fn cleanup_bronze_older_than(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut bronze = self.bronze.lock().unwrap();
        let before = bronze.len();
        bronze.retain(|r| r.collection_date >= cutoff);
        Ok(before - bronze.len())
    }

    async fn layer_counts(&self) -> Result<(u64, u64, u64)> {
        Ok((
            self.bronze.lock().unwrap().len() as u64,
            self.silver.lock().unwrap().len() as u64,
            self.gold.lock().unwrap().len() as u64,
        ))
    }
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn fmt_datetime(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|v| v.format(DATETIME_FORMAT).to_string())
}

fn parse_db_datetime(value: Option<String>) -> Option<NaiveDateTime> {
    value.and_then(|v| NaiveDateTime::parse_from_str(&v, DATETIME_FORMAT).ok())
}

/// SQLite-backed storage with one append-only table per layer.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(&conn)?;
        info!("SQLite storage ready at {}", path.as_ref().display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bronze_ship_lineup (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                porto TEXT,
                navio TEXT,
                produto TEXT,
                sentido TEXT,
                volume TEXT,
                data_chegada TEXT,
                data_partida TEXT,
                armador TEXT,
                agente TEXT,
                collection_date TEXT NOT NULL,
                source TEXT NOT NULL,
                processing_timestamp TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS silver_ship_lineup (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                porto TEXT,
                navio TEXT NOT NULL,
                produto TEXT NOT NULL,
                sentido TEXT NOT NULL,
                volume REAL NOT NULL,
                data_chegada TEXT,
                data_partida TEXT,
                armador TEXT,
                agente TEXT,
                ano INTEGER,
                mes INTEGER,
                dia_semana TEXT,
                trimestre INTEGER,
                tipo_navio TEXT NOT NULL,
                categoria_produto TEXT NOT NULL,
                categoria_volume TEXT,
                collection_date TEXT NOT NULL,
                source TEXT NOT NULL,
                processing_timestamp TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS gold_ship_lineup (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                row_kind TEXT NOT NULL,
                porto TEXT,
                navio TEXT,
                produto TEXT,
                sentido TEXT,
                volume REAL,
                data_chegada TEXT,
                data_partida TEXT,
                armador TEXT,
                agente TEXT,
                ano INTEGER,
                mes INTEGER,
                dia_semana TEXT,
                trimestre INTEGER,
                tipo_navio TEXT,
                categoria_produto TEXT,
                categoria_volume TEXT,
                status_operacao TEXT,
                flag_qualidade TEXT,
                volume_total REAL,
                qtd_operacoes INTEGER,
                volume_medio REAL,
                qtd_navios INTEGER,
                volume_ma_7d REAL,
                volume_ma_30d REAL,
                crescimento_volume REAL,
                ranking_volume REAL,
                collection_date TEXT,
                source TEXT,
                processing_timestamp TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_bronze_source_date
                ON bronze_ship_lineup(source, collection_date);",
        )?;
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn insert_bronze(&self, records: &[BronzeRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO bronze_ship_lineup
                 (porto, navio, produto, sentido, volume, data_chegada, data_partida,
                  armador, agente, collection_date, source, processing_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.record.porto,
                    r.record.navio,
                    r.record.produto,
                    r.record.sentido,
                    r.record.volume,
                    r.record.data_chegada,
                    r.record.data_partida,
                    r.record.armador,
                    r.record.agente,
                    r.collection_date.format(DATE_FORMAT).to_string(),
                    r.source,
                    r.processing_timestamp.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        debug!("Inserted {} bronze rows", records.len());
        Ok(())
    }

    async fn insert_silver(&self, records: &[SilverRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO silver_ship_lineup
                 (porto, navio, produto, sentido, volume, data_chegada, data_partida,
                  armador, agente, ano, mes, dia_semana, trimestre, tipo_navio,
                  categoria_produto, categoria_volume, collection_date, source,
                  processing_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                         ?15, ?16, ?17, ?18, ?19)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.porto,
                    r.navio,
                    r.produto,
                    r.sentido,
                    r.volume,
                    fmt_datetime(r.data_chegada),
                    fmt_datetime(r.data_partida),
                    r.armador,
                    r.agente,
                    r.ano,
                    r.mes,
                    r.dia_semana,
                    r.trimestre,
                    r.tipo_navio,
                    r.categoria_produto,
                    r.categoria_volume,
                    r.collection_date.format(DATE_FORMAT).to_string(),
                    r.source,
                    r.processing_timestamp.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn insert_gold(&self, records: &[GoldRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO gold_ship_lineup
                 (row_kind, porto, navio, produto, sentido, volume, data_chegada,
                  data_partida, armador, agente, ano, mes, dia_semana, trimestre,
                  tipo_navio, categoria_produto, categoria_volume, status_operacao,
                  flag_qualidade, volume_total, qtd_operacoes, volume_medio,
                  qtd_navios, volume_ma_7d, volume_ma_30d, crescimento_volume,
                  ranking_volume, collection_date, source, processing_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                         ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                         ?27, ?28, ?29, ?30)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.row_kind.as_str(),
                    r.porto,
                    r.navio,
                    r.produto,
                    r.sentido,
                    r.volume,
                    fmt_datetime(r.data_chegada),
                    fmt_datetime(r.data_partida),
                    r.armador,
                    r.agente,
                    r.ano,
                    r.mes,
                    r.dia_semana,
                    r.trimestre,
                    r.tipo_navio,
                    r.categoria_produto,
                    r.categoria_volume,
                    r.status_operacao,
                    r.flag_qualidade,
                    r.volume_total,
                    r.qtd_operacoes,
                    r.volume_medio,
                    r.qtd_navios,
                    r.volume_ma_7d,
                    r.volume_ma_30d,
                    r.crescimento_volume,
                    r.ranking_volume,
                    r.collection_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    r.source,
                    r.processing_timestamp.map(|t| t.to_rfc3339()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn bronze_records(&self, source: Option<&str>) -> Result<Vec<BronzeRecord>> {
        let conn = self.conn.lock().unwrap();
        let sql = "SELECT porto, navio, produto, sentido, volume, data_chegada,
                          data_partida, armador, agente, collection_date, source,
                          processing_timestamp
                   FROM bronze_ship_lineup
                   WHERE ?1 IS NULL OR source = ?1";
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![source], |row| {
            let collection_date: String = row.get(9)?;
            let timestamp: String = row.get(11)?;
            Ok(BronzeRecord {
                record: RawRecord {
                    porto: row.get(0)?,
                    navio: row.get(1)?,
                    produto: row.get(2)?,
                    sentido: row.get(3)?,
                    volume: row.get(4)?,
                    data_chegada: row.get(5)?,
                    data_partida: row.get(6)?,
                    armador: row.get(7)?,
                    agente: row.get(8)?,
                },
                collection_date: NaiveDate::parse_from_str(&collection_date, DATE_FORMAT)
                    .unwrap_or_default(),
                source: row.get(10)?,
                processing_timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_default(),
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    async fn latest_collection_date(&self, source: &str) -> Result<Option<NaiveDate>> {
        let conn = self.conn.lock().unwrap();
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(collection_date) FROM bronze_ship_lineup WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(latest.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()))
    }

    async fn cleanup_bronze_older_than(&self, cutoff: NaiveDate) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM bronze_ship_lineup WHERE collection_date < ?1",
            params![cutoff.format(DATE_FORMAT).to_string()],
        )?;
        info!("Cleanup removed {} bronze rows before {}", removed, cutoff);
        Ok(removed)
    }

    async fn layer_counts(&self) -> Result<(u64, u64, u64)> {
        let conn = self.conn.lock().unwrap();
        let count = |table: &str| -> Result<u64> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
            Ok(n as u64)
        };
        Ok((
            count("bronze_ship_lineup")?,
            count("silver_ship_lineup")?,
            count("gold_ship_lineup")?,
        ))
    }
}
