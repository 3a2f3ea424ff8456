use std::{path::Path, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use flotilla_engine::VesselId;
use rusqlite::{Connection, OpenFlags, OptionalExtension as _, Row, Transaction, params};
use serde::Serialize;

use crate::{
    FitnessDelta, GenomeId, MatchId, MatchOutcome, RunId, SkirmishResult, SkirmishStore,
    StoreError,
};

const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS skirmish_results (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        match_id TEXT NOT NULL UNIQUE,
        run_id TEXT NOT NULL,
        generation INTEGER NOT NULL,
        alpha_genome INTEGER NOT NULL,
        beta_genome INTEGER NOT NULL,
        winner INTEGER NULL,
        mvp_vessel INTEGER NULL,
        ticks INTEGER NOT NULL,
        alpha_orders INTEGER NOT NULL,
        beta_orders INTEGER NOT NULL,
        recorded_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_skirmish_results_run ON skirmish_results(run_id, generation);
    CREATE INDEX IF NOT EXISTS idx_skirmish_results_winner ON skirmish_results(winner);

    CREATE TABLE IF NOT EXISTS skirmish_fitness (
        match_id TEXT NOT NULL REFERENCES skirmish_results(match_id),
        slot INTEGER NOT NULL,
        genome INTEGER NOT NULL,
        delta REAL NOT NULL,
        PRIMARY KEY (match_id, slot)
    );
    CREATE INDEX IF NOT EXISTS idx_skirmish_fitness_genome ON skirmish_fitness(genome);
";

// A stored match id inserts nothing; `insert` then compares the stored record.
const INSERT_RESULT: &str = r"
    INSERT INTO skirmish_results
        (match_id, run_id, generation, alpha_genome, beta_genome, winner, mvp_vessel, ticks,
         alpha_orders, beta_orders, recorded_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(match_id) DO NOTHING
";

const INSERT_FITNESS: &str = r"
    INSERT INTO skirmish_fitness (match_id, slot, genome, delta)
    VALUES (?1, ?2, ?3, ?4)
";

const SELECT_RESULT: &str = r"
    SELECT match_id, generation, alpha_genome, beta_genome, winner, mvp_vessel, ticks,
           alpha_orders, beta_orders, recorded_at
    FROM skirmish_results
";

fn to_sql_int(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{what} {value} out of range")))
}

fn from_sql_int<T>(value: i64, what: &str) -> Result<T, StoreError>
where
    T: TryFrom<i64>,
{
    T::try_from(value).map_err(|_| StoreError::Corrupt(format!("{what} {value} out of range")))
}

fn load_result(conn: &Connection, match_id: &str) -> Result<Option<SkirmishResult>, StoreError> {
    let raw = conn
        .prepare_cached(&format!("{SELECT_RESULT} WHERE match_id = ?1"))?
        .query_row([match_id], RawResult::from_row)
        .optional()?;
    raw.map(|raw| complete(conn, raw)).transpose()
}

fn complete(conn: &Connection, raw: RawResult) -> Result<SkirmishResult, StoreError> {
    let deltas = conn
        .prepare_cached(
            "SELECT genome, delta FROM skirmish_fitness WHERE match_id = ?1 ORDER BY slot",
        )?
        .query_map([&raw.match_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_result(deltas)
}

/// Writer side of the SQLite history.
///
/// The database runs in WAL mode, so [`SqliteReader`]s on the same file keep
/// reading while a batch transaction is open.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P>(path: P) -> Result<Self, StoreError>
    where
        P: AsRef<Path>,
    {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(mode, "sqlite did not switch to WAL journal mode");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn insert(tx: &Transaction<'_>, result: &SkirmishResult) -> Result<(), StoreError> {
        let match_id = result.match_id.to_string();
        let [alpha, beta] = result.participants;
        let winner = result
            .winner()
            .map(|g| to_sql_int(g.0, "genome"))
            .transpose()?;
        let inserted = tx.prepare_cached(INSERT_RESULT)?.execute(params![
            match_id,
            result.match_id.run.to_string(),
            result.generation,
            to_sql_int(alpha.0, "genome")?,
            to_sql_int(beta.0, "genome")?,
            winner,
            result.mvp_vessel.map(|v| v.0),
            to_sql_int(result.ticks, "ticks")?,
            result.orders_issued[0],
            result.orders_issued[1],
            result
                .recorded_at
                .to_rfc3339_opts(SecondsFormat::Nanos, true),
        ])?;
        if inserted == 0 {
            let stored = load_result(tx, &match_id)?;
            if stored.as_ref() == Some(result) {
                return Ok(());
            }
            tracing::warn!(
                match_id = %result.match_id,
                "match id already stored with different contents"
            );
            return Err(StoreError::Conflict(result.match_id));
        }

        let mut insert_fitness = tx.prepare_cached(INSERT_FITNESS)?;
        for (slot, delta) in result.fitness_deltas.iter().enumerate() {
            insert_fitness.execute(params![
                match_id,
                to_sql_int(slot as u64, "slot")?,
                to_sql_int(delta.genome.0, "genome")?,
                f64::from(delta.delta),
            ])?;
        }
        Ok(())
    }
}

impl SkirmishStore for SqliteStore {
    fn commit_batch(&mut self, batch: &[SkirmishResult]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for result in batch {
            Self::insert(&tx, result)?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// One training run recorded in the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run: RunId,
    pub matches: u64,
    pub generations: u64,
    pub first_recorded_at: DateTime<Utc>,
    pub last_recorded_at: DateTime<Utc>,
}

/// Per-generation aggregate of the committed history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub generation: u32,
    pub matches: u64,
    pub draws: u64,
    pub mean_fitness_delta: f64,
}

/// One row of the victories leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AceEntry {
    pub genome: GenomeId,
    pub matches: u64,
    pub victories: u64,
    pub mean_fitness_delta: f64,
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("recorded_at: {err}")))
}

fn parse_run(text: &str) -> Result<RunId, StoreError> {
    text.parse()
        .map_err(|err| StoreError::Corrupt(format!("run id `{text}`: {err}")))
}

/// Read-only connection for history queries.
///
/// Genome ids and generation numbers restart with every run, so the per-generation
/// and per-genome queries are scoped to one run.
#[derive(Debug)]
pub struct SqliteReader {
    conn: Connection,
}

impl SqliteReader {
    pub fn open<P>(path: P) -> Result<Self, StoreError>
    where
        P: AsRef<Path>,
    {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    pub fn get(&self, match_id: MatchId) -> Result<Option<SkirmishResult>, StoreError> {
        load_result(&self.conn, &match_id.to_string())
    }

    /// Records of every run.
    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM skirmish_results", [], |row| row.get(0))?;
        from_sql_int(n, "count")
    }

    /// Runs in the order they started committing.
    pub fn runs(&self) -> Result<Vec<RunSummary>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r"
            SELECT run_id, COUNT(*), COUNT(DISTINCT generation),
                   MIN(recorded_at), MAX(recorded_at)
              FROM skirmish_results
             GROUP BY run_id
             ORDER BY MIN(seq)
            ",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(run, matches, generations, first, last)| {
                Ok(RunSummary {
                    run: parse_run(&run)?,
                    matches: from_sql_int(matches, "count")?,
                    generations: from_sql_int(generations, "count")?,
                    first_recorded_at: parse_timestamp(&first)?,
                    last_recorded_at: parse_timestamp(&last)?,
                })
            })
            .collect()
    }

    /// Run of the most recently committed record.
    pub fn latest_run(&self) -> Result<Option<RunId>, StoreError> {
        let run = self
            .conn
            .query_row(
                "SELECT run_id FROM skirmish_results ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        run.as_deref().map(parse_run).transpose()
    }

    /// Results of one generation of `run` in commit order.
    pub fn generation(
        &self,
        run: RunId,
        generation: u32,
    ) -> Result<Vec<SkirmishResult>, StoreError> {
        let raws = self
            .conn
            .prepare_cached(&format!(
                "{SELECT_RESULT} WHERE run_id = ?1 AND generation = ?2 ORDER BY seq"
            ))?
            .query_map(params![run.to_string(), generation], RawResult::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter()
            .map(|raw| complete(&self.conn, raw))
            .collect()
    }

    pub fn generation_summaries(&self, run: RunId) -> Result<Vec<GenerationSummary>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r"
            SELECT r.generation,
                   COUNT(*),
                   SUM(CASE WHEN r.winner IS NULL THEN 1 ELSE 0 END),
                   (SELECT AVG(f.delta)
                      FROM skirmish_fitness f
                      JOIN skirmish_results r2 ON r2.match_id = f.match_id
                     WHERE r2.run_id = r.run_id AND r2.generation = r.generation)
              FROM skirmish_results r
             WHERE r.run_id = ?1
             GROUP BY r.generation
             ORDER BY r.generation
            ",
        )?;
        let rows = stmt
            .query_map([run.to_string()], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(generation, matches, draws, mean)| {
                Ok(GenerationSummary {
                    generation,
                    matches: from_sql_int(matches, "count")?,
                    draws: from_sql_int(draws, "count")?,
                    mean_fitness_delta: mean.unwrap_or(0.0),
                })
            })
            .collect()
    }

    /// Genomes of `run` with the most victories; ties go to the higher mean fitness
    /// delta, then the lower genome id.
    pub fn top_genomes(&self, run: RunId, limit: usize) -> Result<Vec<AceEntry>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r"
            SELECT f.genome,
                   COUNT(*),
                   SUM(CASE WHEN r.winner = f.genome THEN 1 ELSE 0 END) AS victories,
                   AVG(f.delta) AS mean_delta
              FROM skirmish_fitness f
              JOIN skirmish_results r ON r.match_id = f.match_id
             WHERE r.run_id = ?1
             GROUP BY f.genome
             ORDER BY victories DESC, mean_delta DESC, f.genome ASC
             LIMIT ?2
            ",
        )?;
        let rows = stmt
            .query_map(
                params![run.to_string(), to_sql_int(limit as u64, "limit")?],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(genome, matches, victories, mean)| {
                Ok(AceEntry {
                    genome: GenomeId(from_sql_int(genome, "genome")?),
                    matches: from_sql_int(matches, "count")?,
                    victories: from_sql_int(victories, "count")?,
                    mean_fitness_delta: mean,
                })
            })
            .collect()
    }
}

/// Row of `skirmish_results` before its fitness deltas are attached.
struct RawResult {
    match_id: String,
    generation: u32,
    alpha: i64,
    beta: i64,
    winner: Option<i64>,
    mvp_vessel: Option<u16>,
    ticks: i64,
    orders_issued: [u32; 2],
    recorded_at: String,
}

impl RawResult {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            match_id: row.get(0)?,
            generation: row.get(1)?,
            alpha: row.get(2)?,
            beta: row.get(3)?,
            winner: row.get(4)?,
            mvp_vessel: row.get(5)?,
            ticks: row.get(6)?,
            orders_issued: [row.get(7)?, row.get(8)?],
            recorded_at: row.get(9)?,
        })
    }

    fn into_result(self, deltas: Vec<(i64, f64)>) -> Result<SkirmishResult, StoreError> {
        let match_id = self
            .match_id
            .parse::<MatchId>()
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let recorded_at = parse_timestamp(&self.recorded_at)?;
        let outcome = match self.winner {
            Some(winner) => MatchOutcome::Victory {
                winner: GenomeId(from_sql_int(winner, "genome")?),
            },
            None => MatchOutcome::Draw,
        };
        #[expect(clippy::cast_possible_truncation)]
        let fitness_deltas = deltas
            .into_iter()
            .map(|(genome, delta)| {
                Ok(FitnessDelta {
                    genome: GenomeId(from_sql_int(genome, "genome")?),
                    delta: delta as f32,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(SkirmishResult {
            match_id,
            generation: self.generation,
            participants: [
                GenomeId(from_sql_int(self.alpha, "genome")?),
                GenomeId(from_sql_int(self.beta, "genome")?),
            ],
            outcome,
            fitness_deltas,
            mvp_vessel: self.mvp_vessel.map(VesselId),
            ticks: from_sql_int(self.ticks, "ticks")?,
            orders_issued: self.orders_issued,
            recorded_at,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{fs, path::PathBuf};

    use super::*;
    use crate::record::tests::{RUN, sample, sample_in};

    /// Database path under the OS temp directory, removed on drop.
    pub(crate) struct TempDb(pub(crate) PathBuf);

    impl TempDb {
        pub(crate) fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "flotilla-{name}-{}-{}.sqlite",
                std::process::id(),
                Utc::now().timestamp_nanos_opt().unwrap_or_default()
            ));
            Self(path)
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut path = self.0.clone().into_os_string();
                path.push(suffix);
                let _ = fs::remove_file(path);
            }
        }
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let db = TempDb::new("round-trip");
        let mut store = SqliteStore::open(&db.0).unwrap();
        let batch = (0..4).map(|i| sample(2, i)).collect::<Vec<_>>();
        store.commit_batch(&batch).unwrap();

        let reader = SqliteReader::open(&db.0).unwrap();
        assert_eq!(reader.count().unwrap(), 4);
        for result in &batch {
            assert_eq!(reader.get(result.match_id).unwrap().as_ref(), Some(result));
        }
        assert_eq!(reader.generation(RUN, 2).unwrap(), batch);
        assert!(
            reader
                .get(MatchId {
                    run: RUN,
                    generation: 9,
                    index: 0
                })
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_recommit_does_not_duplicate() {
        let db = TempDb::new("recommit");
        let mut store = SqliteStore::open(&db.0).unwrap();
        let batch = [sample(0, 1), sample(0, 2)];
        store.commit_batch(&batch).unwrap();
        store.commit_batch(&batch).unwrap();
        let reader = SqliteReader::open(&db.0).unwrap();
        assert_eq!(reader.count().unwrap(), 2);
        assert_eq!(reader.generation(RUN, 0).unwrap(), batch);
    }

    #[test]
    fn test_different_record_under_stored_id_fails_the_batch() {
        let db = TempDb::new("conflict");
        let mut store = SqliteStore::open(&db.0).unwrap();
        let first = sample(0, 1);
        store.commit_batch(&[first.clone()]).unwrap();

        let mut clash = sample(0, 1);
        clash.ticks += 5;
        let err = store.commit_batch(&[sample(0, 2), clash]).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(id) if id == first.match_id));
        assert!(!err.is_transient());

        let reader = SqliteReader::open(&db.0).unwrap();
        assert_eq!(reader.count().unwrap(), 1);
        assert_eq!(reader.get(first.match_id).unwrap(), Some(first));
    }

    #[test]
    fn test_runs_share_one_database() {
        let db = TempDb::new("runs");
        let mut store = SqliteStore::open(&db.0).unwrap();
        let other = RunId::generate();
        let first = (0..3).map(|i| sample_in(RUN, 0, i)).collect::<Vec<_>>();
        let second = (0..5).map(|i| sample_in(other, 0, i)).collect::<Vec<_>>();
        store.commit_batch(&first).unwrap();
        store.commit_batch(&second).unwrap();

        let reader = SqliteReader::open(&db.0).unwrap();
        assert_eq!(reader.count().unwrap(), 8);
        assert_eq!(reader.generation(RUN, 0).unwrap(), first);
        assert_eq!(reader.generation(other, 0).unwrap(), second);
        assert_eq!(reader.latest_run().unwrap(), Some(other));

        let runs = reader.runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].run, runs[0].matches), (RUN, 3));
        assert_eq!((runs[1].run, runs[1].matches), (other, 5));
        assert!(runs.iter().all(|r| r.generations == 1));
        assert_eq!(reader.generation_summaries(other).unwrap()[0].matches, 5);
    }

    #[test]
    fn test_reader_sees_committed_rows_while_writer_is_open() {
        let db = TempDb::new("wal");
        let mut store = SqliteStore::open(&db.0).unwrap();
        store.commit_batch(&[sample(0, 1)]).unwrap();
        let reader = SqliteReader::open(&db.0).unwrap();

        let tx = store.conn.transaction().unwrap();
        SqliteStore::insert(&tx, &sample(0, 2)).unwrap();
        assert_eq!(reader.count().unwrap(), 1);
        tx.commit().unwrap();
        assert_eq!(reader.count().unwrap(), 2);
    }

    #[test]
    fn test_summaries_and_aces() {
        let db = TempDb::new("queries");
        let mut store = SqliteStore::open(&db.0).unwrap();
        // index 0 and 3 are draws, the others are alpha victories
        let batch = (0..4).map(|i| sample(1, i)).collect::<Vec<_>>();
        store.commit_batch(&batch).unwrap();
        store.commit_batch(&[sample(2, 1)]).unwrap();
        // same genome ids in another run do not count
        store
            .commit_batch(&[sample_in(RunId::generate(), 1, 1)])
            .unwrap();

        let reader = SqliteReader::open(&db.0).unwrap();
        let summaries = reader.generation_summaries(RUN).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].generation, 1);
        assert_eq!(summaries[0].matches, 4);
        assert_eq!(summaries[0].draws, 2);
        assert_eq!(summaries[1].draws, 0);

        let aces = reader.top_genomes(RUN, 2).unwrap();
        assert_eq!(aces.len(), 2);
        // G2 (alpha of index 1) won in both generations
        assert_eq!(aces[0].genome, GenomeId(2));
        assert_eq!(aces[0].victories, 2);
        assert_eq!(aces[0].matches, 2);
        assert_eq!(aces[1].victories, 1);
    }
}
