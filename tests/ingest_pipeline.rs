use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use tempfile::{tempdir, TempDir};

use austarch_ingest::config::Config;
use austarch_ingest::constants::columns;
use austarch_ingest::error::IngestError;
use austarch_ingest::pipeline::storage::{EntityTable, Store};
use austarch_ingest::pipeline::{BatchOrchestrator, RunReport};
use austarch_ingest::types::BatchStatus;

const HEADER: &[&str] = &[
    columns::SITE,
    columns::LATITUDE,
    columns::LONGITUDE,
    columns::MATERIAL,
    columns::DEPTH,
    columns::METHOD,
    columns::TECHNIQUE,
    columns::LAB_CODE,
    columns::AGE,
    columns::ERROR,
    columns::SOURCE,
    columns::DATE_ISSUES,
];

struct Fixture {
    dir: TempDir,
    store: Store,
    config: Config,
}

impl Fixture {
    fn new() -> Result<Self> {
        let dir = tempdir()?;
        let store = Store::open_in_memory()?;
        store.run_migrations()?;
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        Ok(Self { dir, store, config })
    }

    /// Writes `rows` under the standard header. Columns a row leaves out are empty.
    fn write(&self, name: &str, delimiter: u8, rows: &[&[(&str, &str)]]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(self.dir.path().join(name))?;
        writer.write_record(HEADER)?;
        for row in rows {
            let values: HashMap<&str, &str> = row.iter().copied().collect();
            writer.write_record(HEADER.iter().map(|c| values.get(c).copied().unwrap_or("")))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn run(&mut self) -> austarch_ingest::Result<RunReport> {
        BatchOrchestrator::new(&self.config).run(&mut self.store)
    }

    fn count(&self, table: EntityTable) -> i64 {
        self.store.count(table).unwrap()
    }

    fn query<T: rusqlite::types::FromSql>(&self, sql: &str, lab_code: &str) -> T {
        self.store
            .connection()
            .query_row(sql, [lab_code], |row| row.get(0))
            .unwrap()
    }
}

fn charcoal(site: &str, lab_code: &str) -> Vec<(&'static str, String)> {
    vec![
        (columns::SITE, site.to_string()),
        (columns::MATERIAL, "charcoal".to_string()),
        (columns::METHOD, "Radiocarbon".to_string()),
        (columns::LAB_CODE, lab_code.to_string()),
        (columns::AGE, "12000".to_string()),
        (columns::ERROR, "150".to_string()),
    ]
}

fn borrowed<'a>(row: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    row.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

#[test]
fn test_reingest_is_idempotent() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.write(
        "austarch.csv",
        b',',
        &[
            &[
                (columns::SITE, "Lake Mungo"),
                (columns::LATITUDE, "-33.7"),
                (columns::LONGITUDE, "143.1"),
                (columns::LAB_CODE, "ANU-680"),
                (columns::AGE, "26250"),
                (columns::SOURCE, "Bowler, J. 1970. Mungo."),
            ],
            &[
                (columns::SITE, "Lake Mungo"),
                (columns::LAB_CODE, "ANU-375"),
                (columns::AGE, "24710"),
                (columns::SOURCE, "Bowler, J. 1970. Mungo."),
            ],
        ],
    )?;

    let first = fx.run()?;
    assert_eq!(first.stats.ages_created, 2);
    assert_eq!(first.stats.sites_created, 1);
    assert_eq!(first.stats.sites_matched, 1);

    let counts = |fx: &Fixture| {
        [
            EntityTable::Site,
            EntityTable::Sample,
            EntityTable::AgeDetermination,
            EntityTable::DataSource,
        ]
        .map(|t| fx.count(t))
    };
    let before = counts(&fx);

    let second = fx.run()?;
    assert_eq!(second.stats.ages_created, 0);
    assert_eq!(second.stats.ages_skipped, 2);
    assert_eq!(counts(&fx), before);
    assert_eq!(fx.count(EntityTable::ImportBatch), 2);

    let batch = fx.store.get_batch(second.batch_id)?.unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.record_count, Some(0));
    assert_eq!(
        batch.notes.as_deref(),
        Some("Sites: 0 new, 0 matched. Ages: 0 created, 2 skipped.")
    );
    Ok(())
}

#[test]
fn test_burnt_bone_classified_before_bone() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.write(
        "data.csv",
        b',',
        &[&[
            (columns::SITE, "Devil's Lair"),
            (columns::MATERIAL, "Burnt bone fragments"),
            (columns::LAB_CODE, "OZB-100"),
        ]],
    )?;
    fx.run()?;

    let code: String = fx.query(
        "SELECT m.code FROM age_determination a
         JOIN sample s ON s.id = a.sample_id
         JOIN sample_material m ON m.id = s.material_id
         WHERE a.lab_code = ?1",
        "OZB-100",
    );
    assert_eq!(code, "BONE_BURNT");
    Ok(())
}

#[test]
fn test_short_lab_code_creates_nothing() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.write(
        "data.csv",
        b',',
        &[
            &[(columns::SITE, "Nowhere"), (columns::LAB_CODE, "AB"), (columns::SOURCE, "X 1990")],
            &[(columns::SITE, "Nowhere"), (columns::LAB_CODE, "N/A")],
        ],
    )?;
    let report = fx.run()?;

    assert_eq!(report.stats.ages_skipped, 2);
    assert_eq!(fx.count(EntityTable::Site), 0);
    assert_eq!(fx.count(EntityTable::Sample), 0);
    assert_eq!(fx.count(EntityTable::AgeDetermination), 0);
    assert_eq!(fx.count(EntityTable::DataSource), 0);
    Ok(())
}

#[test]
fn test_coordinates_backfilled_by_name() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.write(
        "data.csv",
        b',',
        &[
            &[(columns::SITE, "Kenniff Cave"), (columns::LAB_CODE, "NPL-33")],
            &[
                (columns::SITE, "kenniff  CAVE"),
                (columns::LATITUDE, "-25.35"),
                (columns::LONGITUDE, "148.3"),
                (columns::LAB_CODE, "NPL-34"),
            ],
        ],
    )?;
    let report = fx.run()?;

    assert_eq!(report.stats.sites_created, 1);
    assert_eq!(report.stats.sites_matched, 1);
    assert_eq!(fx.count(EntityTable::Site), 1);
    let (lat, lon): (f64, f64) = fx.store.connection().query_row(
        "SELECT latitude, longitude FROM site",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!((lat, lon), (-25.35, 148.3));
    Ok(())
}

#[test]
fn test_luminescence_method_wins_over_lab_prefix() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.write(
        "data.csv",
        b',',
        &[&[
            (columns::SITE, "Madjedbebe"),
            (columns::METHOD, "OSL"),
            (columns::LAB_CODE, "OZA-123"),
            (columns::AGE, "52000"),
            (columns::ERROR, "8000"),
        ]],
    )?;
    fx.run()?;

    let method: String = fx.query(
        "SELECT m.code FROM age_determination a JOIN dating_method m ON m.id = a.method_id
         WHERE a.lab_code = ?1",
        "OZA-123",
    );
    assert_eq!(method, "OSL");
    let lum: f64 = fx.query("SELECT lum_age_ka FROM age_determination WHERE lab_code = ?1", "OZA-123");
    assert_eq!(lum, 52.0);
    let c14: Option<i64> = fx.query("SELECT c14_age FROM age_determination WHERE lab_code = ?1", "OZA-123");
    assert_eq!(c14, None);
    Ok(())
}

#[test]
fn test_out_of_bounds_coordinates_are_nulled_with_warning() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.write(
        "data.csv",
        b',',
        &[&[
            (columns::SITE, "Stonehenge"),
            (columns::LATITUDE, "51.18"),
            (columns::LONGITUDE, "-1.83"),
            (columns::LAB_CODE, "OXA-4000"),
        ]],
    )?;
    let report = fx.run()?;

    assert_eq!(report.stats.ages_created, 1);
    assert_eq!(
        report.stats.warnings,
        vec!["Row 1: Invalid coordinates: 51.18, -1.83".to_string()]
    );
    assert!(report.stats.errors.is_empty());
    let lat: Option<f64> = fx.store.connection().query_row("SELECT latitude FROM site", [], |r| r.get(0))?;
    assert_eq!(lat, None);
    Ok(())
}

#[test]
fn test_citation_parsed_into_source() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.write(
        "data.csv",
        b',',
        &[
            &[
                (columns::SITE, "X"),
                (columns::LAB_CODE, "SUA-1"),
                (columns::SOURCE, "Smith, J. 1998. Excavations at X."),
            ],
            &[
                (columns::SITE, "X"),
                (columns::LAB_CODE, "SUA-2"),
                (columns::SOURCE, "Smith, J. 1998. Excavations at X."),
            ],
        ],
    )?;
    fx.run()?;

    assert_eq!(fx.count(EntityTable::DataSource), 1);
    let (author, year): (Option<String>, Option<i32>) = fx.store.connection().query_row(
        "SELECT author, year FROM data_source WHERE citation = ?1",
        ["Smith, J. 1998. Excavations at X."],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!(author.as_deref(), Some("Smith, J."));
    assert_eq!(year, Some(1998));

    let linked: i64 = fx.query(
        "SELECT COUNT(DISTINCT data_source_id) FROM age_determination WHERE lab_code LIKE ?1",
        "SUA-%",
    );
    assert_eq!(linked, 1);
    Ok(())
}

#[test]
fn test_depth_ranges_and_surface() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.write(
        "data.csv",
        b',',
        &[
            &[(columns::SITE, "A"), (columns::LAB_CODE, "GAK-10"), (columns::DEPTH, "10-20")],
            &[(columns::SITE, "A"), (columns::LAB_CODE, "GAK-11"), (columns::DEPTH, "surface")],
        ],
    )?;
    fx.run()?;

    let depth_sql = "SELECT s.depth_cm_top FROM sample s
                     JOIN age_determination a ON a.sample_id = s.id WHERE a.lab_code = ?1";
    assert_eq!(fx.query::<Option<f64>>(depth_sql, "GAK-10"), Some(10.0));
    assert_eq!(fx.query::<Option<f64>>(depth_sql, "GAK-11"), None);
    Ok(())
}

#[test]
fn test_files_sorted_tsv_read_and_reference_files_skipped() -> Result<()> {
    let mut fx = Fixture::new()?;
    let first = charcoal("Puritjarra", "ANU-1");
    let second = charcoal("Puritjarra", "ANU-2");
    fx.write("b_second.tsv", b'\t', &[&borrowed(&second)])?;
    fx.write("a_first.csv", b',', &[&borrowed(&first)])?;
    fx.write("AustArch_References.csv", b',', &[&borrowed(&charcoal("Ref", "REF-1"))])?;
    fs::write(fx.dir.path().join("readme.txt"), "not data")?;

    let report = fx.run()?;
    let names: Vec<String> = report
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a_first.csv", "b_second.tsv"]);
    assert_eq!(report.stats.ages_created, 2);
    assert_eq!(report.stats.sites_created, 1);

    // the first file's site was created first
    let site_of_first: i64 = fx.query(
        "SELECT s.site_id FROM sample s JOIN age_determination a ON a.sample_id = s.id
         WHERE a.lab_code = ?1",
        "ANU-1",
    );
    assert_eq!(site_of_first, 1);
    Ok(())
}

#[test]
fn test_failed_row_is_isolated() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.store.connection().execute_batch(
        "CREATE TRIGGER block_lab_code BEFORE INSERT ON age_determination
         WHEN NEW.lab_code = 'BAD-1'
         BEGIN SELECT RAISE(ABORT, 'blocked lab code'); END;",
    )?;
    let good = charcoal("Good Site", "WK-1");
    let bad = {
        let mut row = charcoal("Doomed Site", "BAD-1");
        row.push((columns::SOURCE, "Doomed, A. 2001".to_string()));
        row
    };
    let later = charcoal("Good Site", "WK-2");
    fx.write(
        "data.csv",
        b',',
        &[&borrowed(&good), &borrowed(&bad), &borrowed(&later)],
    )?;

    let report = fx.run()?;
    assert_eq!(report.stats.ages_created, 2);
    assert_eq!(report.stats.errors.len(), 1);
    assert!(report.stats.errors[0].starts_with("Row 2: "), "{}", report.stats.errors[0]);
    assert!(report.stats.errors[0].contains("blocked lab code"));

    // nothing from the failed row survives
    assert_eq!(fx.count(EntityTable::Site), 1);
    assert_eq!(fx.count(EntityTable::Sample), 2);
    assert_eq!(fx.count(EntityTable::DataSource), 0);

    let batch = fx.store.get_batch(report.batch_id)?.unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.record_count, Some(2));
    Ok(())
}

#[test]
fn test_fatal_failure_rolls_back_whole_run() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.store.connection().execute_batch(
        "CREATE TRIGGER block_completion BEFORE UPDATE OF status ON import_batch
         WHEN NEW.status = 'completed'
         BEGIN SELECT RAISE(ABORT, 'cannot finalize'); END;",
    )?;
    fx.write("data.csv", b',', &[&borrowed(&charcoal("Keilor", "ANU-65"))])?;

    let err = fx.run().unwrap_err();
    let IngestError::BatchAborted { batch_id, source } = err else {
        panic!("expected an aborted batch");
    };
    assert!(source.to_string().contains("cannot finalize"));

    assert_eq!(fx.count(EntityTable::Site), 0);
    assert_eq!(fx.count(EntityTable::Sample), 0);
    assert_eq!(fx.count(EntityTable::AgeDetermination), 0);

    // the batch row outlives the rollback so it can be marked failed
    let batch = fx.store.get_batch(batch_id)?.unwrap();
    assert_eq!(batch.status, BatchStatus::Running);
    fx.store.fail_batch(batch_id, &source.to_string())?;
    assert_eq!(fx.store.get_batch(batch_id)?.unwrap().status, BatchStatus::Failed);
    Ok(())
}

#[test]
fn test_transaction_lost_mid_run_leaves_nothing_behind() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.store.connection().execute_batch(
        "CREATE TRIGGER lose_transaction BEFORE INSERT ON age_determination
         WHEN NEW.lab_code = 'BAD-2'
         BEGIN SELECT RAISE(ROLLBACK, 'txn lost'); END;",
    )?;
    let rows = [
        charcoal("Carpenter's Gap", "WK-1"),
        charcoal("Carpenter's Gap", "BAD-2"),
        charcoal("Riwi", "WK-3"),
        charcoal("Riwi", "WK-4"),
    ];
    let borrowed_rows: Vec<Vec<(&str, &str)>> = rows.iter().map(|r| borrowed(r)).collect();
    let refs: Vec<&[(&str, &str)]> = borrowed_rows.iter().map(Vec::as_slice).collect();
    fx.write("data.csv", b',', &refs)?;

    let err = fx.run().unwrap_err();
    let IngestError::BatchAborted { batch_id, source } = err else {
        panic!("expected an aborted batch");
    };
    assert!(source.to_string().contains("txn lost"), "{source}");

    // neither the rows before the failure nor the ones after it persist
    assert_eq!(fx.count(EntityTable::AgeDetermination), 0);
    assert_eq!(fx.count(EntityTable::Sample), 0);
    assert_eq!(fx.count(EntityTable::Site), 0);

    fx.store.fail_batch(batch_id, &source.to_string())?;
    assert_eq!(fx.store.get_batch(batch_id)?.unwrap().status, BatchStatus::Failed);
    Ok(())
}

#[test]
fn test_missing_data_dir_is_a_config_error() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.config.data_dir = fx.dir.path().join("does-not-exist");

    assert!(matches!(fx.run(), Err(IngestError::Config(_))));
    assert_eq!(fx.count(EntityTable::ImportBatch), 0);
    Ok(())
}

#[test]
fn test_file_database_persists_between_opens() -> Result<()> {
    let data = tempdir()?;
    let db_dir = tempdir()?;
    let db_path = db_dir.path().join("nested").join("austarch.db");
    let config = Config {
        data_dir: data.path().to_path_buf(),
        db_path: db_path.clone(),
        ..Config::default()
    };
    fs::write(
        data.path().join("data.csv"),
        "SITE,LAB_CODE,AGE\nLake Nitchie,ANU-1234,6820\n",
    )?;

    {
        let mut store = Store::open(&config.db_path)?;
        store.run_migrations()?;
        BatchOrchestrator::new(&config).run(&mut store)?;
    }

    let store = Store::open(&db_path)?;
    store.run_migrations()?;
    assert_eq!(store.count(EntityTable::AgeDetermination)?, 1);
    Ok(())
}
