use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use tracing::debug;

use crate::baseline::BaselineSnapshot;
use crate::models::{Baseline, EnergyBudgetRecord, HrvReading};
use crate::readiness::ReadinessBreakdown;

/// Database error types
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

/// Persistence collaborator for readings, baselines and energy budgets
///
/// Range queries are inclusive on both ends. Readings come back oldest first,
/// energy budgets most recent first.
pub trait HrvStore {
    fn insert_reading(&mut self, reading: &HrvReading) -> Result<(), DatabaseError>;

    fn get_reading(
        &self,
        user_id: &str,
        reading_id: &str,
    ) -> Result<Option<HrvReading>, DatabaseError>;

    fn readings_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HrvReading>, DatabaseError>;

    /// Latest readings, most recent first
    fn recent_readings(&self, user_id: &str, limit: usize)
        -> Result<Vec<HrvReading>, DatabaseError>;

    fn active_baseline(&self, user_id: &str) -> Result<Option<Baseline>, DatabaseError>;

    /// Deactivate every baseline of the user and store `baseline` as the
    /// active one, atomically
    fn activate_baseline(&mut self, baseline: &Baseline) -> Result<(), DatabaseError>;

    fn count_active_baselines(&self, user_id: &str) -> Result<usize, DatabaseError>;

    /// Fails with `Duplicate` when the reading already has a score
    fn insert_energy_budget(&mut self, record: &EnergyBudgetRecord) -> Result<(), DatabaseError>;

    fn energy_budgets_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EnergyBudgetRecord>, DatabaseError>;

    /// Latest energy budgets, most recent first
    fn recent_energy_budgets(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<EnergyBudgetRecord>, DatabaseError>;
}

const READING_COLUMNS: &str = "id, user_id, recorded_at, mean_rri, mean_hr, sdnn, rmssd, pnn50, \
     vlf_power, lf_power, hf_power, total_power, lf_hf_ratio, lf_nu, hf_nu, \
     sleep_duration, sleep_quality, recording_duration, artifact_percentage";

const BASELINE_COLUMNS: &str = "id, user_id, calculated_at, is_active, start_date, end_date, \
     days_count, readings_count, mean_ln_rmssd, sd_ln_rmssd, mean_rmssd, mean_hr, sd_hr, \
     mean_total_power, mean_hf_power, mean_lf_power";

const ENERGY_BUDGET_COLUMNS: &str = "id, user_id, reading_id, baseline_id, date, energy_budget, \
     hrv_score, rhr_score, sleep_score, stress_score, hrv_zscore, rhr_zscore, pem_risk_level, \
     consecutive_low_days, activity_recommendation";

/// SQLite-backed store
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create or open a database at the specified path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, DatabaseError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let db = Self { conn };
        db.init_schema()?;

        debug!(path = %db_path.display(), "Opened database");
        Ok(db)
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS hrv_readings (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,

                -- Time domain
                mean_rri REAL,
                mean_hr REAL,
                sdnn REAL,
                rmssd REAL,
                pnn50 REAL,

                -- Frequency domain
                vlf_power REAL,
                lf_power REAL,
                hf_power REAL,
                total_power REAL,
                lf_hf_ratio REAL,
                lf_nu REAL,
                hf_nu REAL,

                -- Context
                sleep_duration REAL,
                sleep_quality REAL,
                recording_duration REAL,
                artifact_percentage REAL
            );

            CREATE INDEX IF NOT EXISTS idx_readings_user_time
                ON hrv_readings (user_id, recorded_at);

            CREATE TABLE IF NOT EXISTS baselines (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                calculated_at INTEGER NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 0,
                start_date INTEGER NOT NULL,
                end_date INTEGER NOT NULL,
                days_count INTEGER NOT NULL,
                readings_count INTEGER NOT NULL,
                mean_ln_rmssd REAL NOT NULL,
                sd_ln_rmssd REAL NOT NULL,
                mean_rmssd REAL NOT NULL,
                mean_hr REAL,
                sd_hr REAL,
                mean_total_power REAL,
                mean_hf_power REAL,
                mean_lf_power REAL
            );

            -- At most one active baseline per user
            CREATE UNIQUE INDEX IF NOT EXISTS idx_baselines_single_active
                ON baselines (user_id) WHERE is_active = 1;

            CREATE TABLE IF NOT EXISTS energy_budgets (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                reading_id TEXT NOT NULL,
                baseline_id TEXT NOT NULL,
                date INTEGER NOT NULL,
                energy_budget REAL NOT NULL,
                hrv_score REAL NOT NULL,
                rhr_score REAL NOT NULL,
                sleep_score REAL NOT NULL,
                stress_score REAL NOT NULL,
                hrv_zscore REAL NOT NULL,
                rhr_zscore REAL,
                pem_risk_level TEXT NOT NULL,
                consecutive_low_days INTEGER NOT NULL,
                activity_recommendation TEXT NOT NULL,

                UNIQUE (user_id, reading_id),
                FOREIGN KEY (reading_id) REFERENCES hrv_readings (id),
                FOREIGN KEY (baseline_id) REFERENCES baselines (id)
            );

            CREATE INDEX IF NOT EXISTS idx_energy_budgets_user_date
                ON energy_budgets (user_id, date);
            "#,
        )?;

        Ok(())
    }

    fn query_readings(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<HrvReading>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, reading_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_energy_budgets(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<EnergyBudgetRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, energy_budget_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl HrvStore for Database {
    fn insert_reading(&mut self, reading: &HrvReading) -> Result<(), DatabaseError> {
        let sql = format!(
            "INSERT INTO hrv_readings ({}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            READING_COLUMNS
        );

        self.conn
            .execute(
                &sql,
                params![
                    reading.id,
                    reading.user_id,
                    reading.recorded_at.timestamp_millis(),
                    reading.mean_rri,
                    reading.mean_hr,
                    reading.sdnn,
                    reading.rmssd,
                    reading.pnn50,
                    reading.vlf_power,
                    reading.lf_power,
                    reading.hf_power,
                    reading.total_power,
                    reading.lf_hf_ratio,
                    reading.lf_nu,
                    reading.hf_nu,
                    reading.sleep_duration,
                    reading.sleep_quality,
                    reading.recording_duration,
                    reading.artifact_percentage,
                ],
            )
            .map_err(|e| duplicate_or(e, format!("reading {}", reading.id)))?;

        Ok(())
    }

    fn get_reading(
        &self,
        user_id: &str,
        reading_id: &str,
    ) -> Result<Option<HrvReading>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM hrv_readings WHERE id = ?1 AND user_id = ?2",
            READING_COLUMNS
        );

        let reading = self
            .conn
            .query_row(&sql, params![reading_id, user_id], reading_from_row)
            .optional()?;

        Ok(reading)
    }

    fn readings_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HrvReading>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM hrv_readings \
             WHERE user_id = ?1 AND recorded_at >= ?2 AND recorded_at <= ?3 \
             ORDER BY recorded_at ASC",
            READING_COLUMNS
        );

        self.query_readings(
            &sql,
            params![user_id, start.timestamp_millis(), end.timestamp_millis()],
        )
    }

    fn recent_readings(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<HrvReading>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM hrv_readings WHERE user_id = ?1 \
             ORDER BY recorded_at DESC LIMIT ?2",
            READING_COLUMNS
        );

        self.query_readings(&sql, params![user_id, limit as i64])
    }

    fn active_baseline(&self, user_id: &str) -> Result<Option<Baseline>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM baselines WHERE user_id = ?1 AND is_active = 1",
            BASELINE_COLUMNS
        );

        let baseline = self
            .conn
            .query_row(&sql, params![user_id], baseline_from_row)
            .optional()?;

        Ok(baseline)
    }

    fn activate_baseline(&mut self, baseline: &Baseline) -> Result<(), DatabaseError> {
        // IMMEDIATE takes the write lock up front so concurrent activations serialize
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let deactivated = tx.execute(
            "UPDATE baselines SET is_active = 0 WHERE user_id = ?1 AND is_active = 1",
            params![baseline.user_id],
        )?;

        let snapshot = &baseline.snapshot;
        let sql = format!(
            "INSERT INTO baselines ({}) VALUES \
             (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            BASELINE_COLUMNS
        );
        tx.execute(
            &sql,
            params![
                baseline.id,
                baseline.user_id,
                baseline.calculated_at.timestamp_millis(),
                snapshot.start_date.timestamp_millis(),
                snapshot.end_date.timestamp_millis(),
                snapshot.days_count,
                snapshot.readings_count as i64,
                snapshot.mean_ln_rmssd,
                snapshot.sd_ln_rmssd,
                snapshot.mean_rmssd,
                snapshot.mean_hr,
                snapshot.sd_hr,
                snapshot.mean_total_power,
                snapshot.mean_hf_power,
                snapshot.mean_lf_power,
            ],
        )
        .map_err(|e| duplicate_or(e, format!("baseline {}", baseline.id)))?;

        tx.commit()?;

        debug!(
            user_id = %baseline.user_id,
            baseline_id = %baseline.id,
            deactivated,
            "Baseline activation committed"
        );
        Ok(())
    }

    fn count_active_baselines(&self, user_id: &str) -> Result<usize, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM baselines WHERE user_id = ?1 AND is_active = 1",
            params![user_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    fn insert_energy_budget(&mut self, record: &EnergyBudgetRecord) -> Result<(), DatabaseError> {
        let b = &record.breakdown;
        let sql = format!(
            "INSERT INTO energy_budgets ({}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            ENERGY_BUDGET_COLUMNS
        );

        self.conn
            .execute(
                &sql,
                params![
                    record.id,
                    record.user_id,
                    record.reading_id,
                    record.baseline_id,
                    record.date.timestamp_millis(),
                    b.energy_budget,
                    b.hrv_score,
                    b.rhr_score,
                    b.sleep_score,
                    b.stress_score,
                    b.hrv_zscore,
                    b.rhr_zscore,
                    b.pem_risk_level.as_str(),
                    b.consecutive_low_days,
                    b.activity_recommendation.as_str(),
                ],
            )
            .map_err(|e| duplicate_or(e, format!("energy budget for reading {}", record.reading_id)))?;

        Ok(())
    }

    fn energy_budgets_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EnergyBudgetRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM energy_budgets \
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 \
             ORDER BY date DESC",
            ENERGY_BUDGET_COLUMNS
        );

        self.query_energy_budgets(
            &sql,
            params![user_id, start.timestamp_millis(), end.timestamp_millis()],
        )
    }

    fn recent_energy_budgets(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<EnergyBudgetRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM energy_budgets WHERE user_id = ?1 ORDER BY date DESC LIMIT ?2",
            ENERGY_BUDGET_COLUMNS
        );

        self.query_energy_budgets(&sql, params![user_id, limit as i64])
    }
}

/// Map unique-constraint failures to `Duplicate`, everything else to SQLite errors
fn duplicate_or(error: rusqlite::Error, what: String) -> DatabaseError {
    match &error {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            DatabaseError::Duplicate(what)
        }
        _ => DatabaseError::SqliteError(error),
    }
}

fn timestamp(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(column)?;
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Integer,
            format!("timestamp out of range in {}: {}", column, millis).into(),
        )
    })
}

fn parse_text<T>(row: &Row, column: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(column)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.into()))
}

fn reading_from_row(row: &Row) -> rusqlite::Result<HrvReading> {
    Ok(HrvReading {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        recorded_at: timestamp(row, "recorded_at")?,
        mean_rri: row.get("mean_rri")?,
        mean_hr: row.get("mean_hr")?,
        sdnn: row.get("sdnn")?,
        rmssd: row.get("rmssd")?,
        pnn50: row.get("pnn50")?,
        vlf_power: row.get("vlf_power")?,
        lf_power: row.get("lf_power")?,
        hf_power: row.get("hf_power")?,
        total_power: row.get("total_power")?,
        lf_hf_ratio: row.get("lf_hf_ratio")?,
        lf_nu: row.get("lf_nu")?,
        hf_nu: row.get("hf_nu")?,
        sleep_duration: row.get("sleep_duration")?,
        sleep_quality: row.get("sleep_quality")?,
        recording_duration: row.get("recording_duration")?,
        artifact_percentage: row.get("artifact_percentage")?,
    })
}

fn baseline_from_row(row: &Row) -> rusqlite::Result<Baseline> {
    Ok(Baseline {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        calculated_at: timestamp(row, "calculated_at")?,
        is_active: row.get("is_active")?,
        snapshot: BaselineSnapshot {
            start_date: timestamp(row, "start_date")?,
            end_date: timestamp(row, "end_date")?,
            days_count: row.get("days_count")?,
            readings_count: row.get::<_, i64>("readings_count")? as usize,
            mean_ln_rmssd: row.get("mean_ln_rmssd")?,
            sd_ln_rmssd: row.get("sd_ln_rmssd")?,
            mean_rmssd: row.get("mean_rmssd")?,
            mean_hr: row.get("mean_hr")?,
            sd_hr: row.get("sd_hr")?,
            mean_total_power: row.get("mean_total_power")?,
            mean_hf_power: row.get("mean_hf_power")?,
            mean_lf_power: row.get("mean_lf_power")?,
        },
    })
}

fn energy_budget_from_row(row: &Row) -> rusqlite::Result<EnergyBudgetRecord> {
    Ok(EnergyBudgetRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        reading_id: row.get("reading_id")?,
        baseline_id: row.get("baseline_id")?,
        date: timestamp(row, "date")?,
        breakdown: ReadinessBreakdown {
            energy_budget: row.get("energy_budget")?,
            hrv_score: row.get("hrv_score")?,
            rhr_score: row.get("rhr_score")?,
            sleep_score: row.get("sleep_score")?,
            stress_score: row.get("stress_score")?,
            hrv_zscore: row.get("hrv_zscore")?,
            rhr_zscore: row.get("rhr_zscore")?,
            pem_risk_level: parse_text(row, "pem_risk_level")?,
            consecutive_low_days: row.get("consecutive_low_days")?,
            activity_recommendation: parse_text(row, "activity_recommendation")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::{ActivityRecommendation, PemRiskLevel};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 7, 0, 0).unwrap() + Duration::days(n)
    }

    fn reading(user: &str, n: i64, rmssd: f64) -> HrvReading {
        HrvReading {
            rmssd: Some(rmssd),
            mean_hr: Some(62.0),
            hf_power: Some(350.5),
            sleep_quality: Some(71.0),
            ..HrvReading::new(user, day(n))
        }
    }

    fn snapshot() -> BaselineSnapshot {
        BaselineSnapshot {
            start_date: day(0),
            end_date: day(28),
            days_count: 28,
            readings_count: 21,
            mean_ln_rmssd: 3.6,
            sd_ln_rmssd: 0.18,
            mean_rmssd: 37.0,
            mean_hr: Some(63.0),
            sd_hr: None,
            mean_total_power: Some(1200.0),
            mean_hf_power: None,
            mean_lf_power: Some(410.0),
        }
    }

    fn energy_budget(reading: &HrvReading, baseline: &Baseline, z: f64) -> EnergyBudgetRecord {
        EnergyBudgetRecord::new(
            reading,
            baseline,
            ReadinessBreakdown {
                energy_budget: 61.5,
                hrv_score: 55.0,
                rhr_score: 50.0,
                sleep_score: 71.0,
                stress_score: 90.0,
                hrv_zscore: z,
                rhr_zscore: Some(-0.2),
                pem_risk_level: PemRiskLevel::Moderate,
                consecutive_low_days: 1,
                activity_recommendation: ActivityRecommendation::Light,
            },
        )
    }

    #[test]
    fn test_reading_round_trip() {
        let mut db = Database::open_in_memory().unwrap();
        let original = reading("alice", 3, 42.5);

        db.insert_reading(&original).unwrap();
        let loaded = db.get_reading("alice", &original.id).unwrap().unwrap();

        assert_eq!(loaded, original);
        assert!(db.get_reading("bob", &original.id).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_reading_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let original = reading("alice", 3, 42.5);

        db.insert_reading(&original).unwrap();
        assert!(matches!(
            db.insert_reading(&original),
            Err(DatabaseError::Duplicate(_))
        ));
    }

    #[test]
    fn test_readings_between_ascending_and_scoped() {
        let mut db = Database::open_in_memory().unwrap();
        for n in [5, 1, 9, 3] {
            db.insert_reading(&reading("alice", n, 40.0 + n as f64)).unwrap();
        }
        db.insert_reading(&reading("bob", 4, 80.0)).unwrap();

        let readings = db.readings_between("alice", day(1), day(5)).unwrap();
        let days: Vec<_> = readings.iter().map(|r| r.recorded_at).collect();
        assert_eq!(days, vec![day(1), day(3), day(5)]);

        let recent = db.recent_readings("alice", 2).unwrap();
        assert_eq!(recent[0].recorded_at, day(9));
        assert_eq!(recent[1].recorded_at, day(5));
    }

    #[test]
    fn test_activation_leaves_single_active_baseline() {
        let mut db = Database::open_in_memory().unwrap();

        let first = Baseline::new("alice", snapshot(), day(28));
        db.activate_baseline(&first).unwrap();
        assert_eq!(db.count_active_baselines("alice").unwrap(), 1);

        let second = Baseline::new("alice", snapshot(), day(29));
        db.activate_baseline(&second).unwrap();

        assert_eq!(db.count_active_baselines("alice").unwrap(), 1);
        let active = db.active_baseline("alice").unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert!(active.is_active);
        assert_eq!(active.snapshot, snapshot());

        // Other users are unaffected
        let other = Baseline::new("bob", snapshot(), day(29));
        db.activate_baseline(&other).unwrap();
        assert_eq!(db.count_active_baselines("alice").unwrap(), 1);
        assert_eq!(db.count_active_baselines("bob").unwrap(), 1);
    }

    #[test]
    fn test_no_active_baseline() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.active_baseline("alice").unwrap().is_none());
        assert_eq!(db.count_active_baselines("alice").unwrap(), 0);
    }

    #[test]
    fn test_energy_budget_round_trip_and_order() {
        let mut db = Database::open_in_memory().unwrap();
        let baseline = Baseline::new("alice", snapshot(), day(0));
        db.activate_baseline(&baseline).unwrap();

        let mut inserted = Vec::new();
        for n in [2, 6, 4] {
            let r = reading("alice", n, 40.0);
            db.insert_reading(&r).unwrap();
            let record = energy_budget(&r, &baseline, -1.1);
            db.insert_energy_budget(&record).unwrap();
            inserted.push(record);
        }

        let history = db.energy_budgets_between("alice", day(0), day(5)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, day(4));
        assert_eq!(history[1].date, day(2));

        let latest = db.recent_energy_budgets("alice", 1).unwrap();
        assert_eq!(latest[0], inserted[1]);
    }

    #[test]
    fn test_one_energy_budget_per_reading() {
        let mut db = Database::open_in_memory().unwrap();
        let baseline = Baseline::new("alice", snapshot(), day(0));
        let r = reading("alice", 1, 40.0);

        db.insert_energy_budget(&energy_budget(&r, &baseline, 0.0)).unwrap();
        let result = db.insert_energy_budget(&energy_budget(&r, &baseline, 0.0));
        assert!(matches!(result, Err(DatabaseError::Duplicate(_))));
    }

    #[test]
    fn test_on_disk_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("hrv.db");
        let original = reading("alice", 1, 33.0);

        {
            let mut db = Database::open(&path).unwrap();
            db.insert_reading(&original).unwrap();
            db.activate_baseline(&Baseline::new("alice", snapshot(), day(2)))
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_reading("alice", &original.id).unwrap(), Some(original));
        assert!(db.active_baseline("alice").unwrap().is_some());
    }
}
