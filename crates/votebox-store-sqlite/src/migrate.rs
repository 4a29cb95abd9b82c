//! Schema probe, step library and migration engine.
//!
//! The engine is a small state machine over [`Generation`]. Each pass opens an
//! `IMMEDIATE` transaction, probes the catalog inside it and applies exactly
//! one step (or bootstraps an empty store). The transaction commits only after
//! the step succeeded and the probe confirms the store reached the step's
//! target, so a store is never observed between two generations and a second
//! process opening the same file waits on the write lock, then sees the
//! advanced generation.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};
use votebox_core::generation::Generation;

use crate::{Error, Result, encode::encode_dt, schema};

// ─── Probe ───────────────────────────────────────────────────────────────────

/// Report the generation the store is in, or `None` if it holds no marker.
///
/// Reads the catalog only. Fails if markers of several generations coexist.
pub fn probe(conn: &Connection) -> Result<Option<Generation>> {
  let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
  let found: Vec<Generation> = stmt
    .query_map([], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .iter()
    .filter_map(|name| Generation::from_marker(name))
    .collect();

  match found.as_slice() {
    [] => Ok(None),
    [one] => Ok(Some(*one)),
    _ => Err(Error::AmbiguousSchema(found)),
  }
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn rename_table(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<()> {
  if table_exists(conn, from)? && !table_exists(conn, to)? {
    conn.execute_batch(&format!("ALTER TABLE {from} RENAME TO {to}"))?;
  }
  Ok(())
}

// ─── Step library ────────────────────────────────────────────────────────────

type StepFn = fn(&Connection, DateTime<Utc>) -> rusqlite::Result<()>;

/// One edge of the generation chain.
pub struct Step {
  pub from:        Generation,
  pub to:          Generation,
  /// The step rewrites history irreversibly and is logged as such.
  pub destructive: bool,
  apply:           StepFn,
}

pub const STEPS: [Step; 4] = [
  Step {
    from:        Generation::V0,
    to:          Generation::V1,
    destructive: false,
    apply:       v0_to_v1,
  },
  Step {
    from:        Generation::V1,
    to:          Generation::V1a,
    destructive: false,
    apply:       v1_to_v1a,
  },
  Step {
    from:        Generation::V1a,
    to:          Generation::V1b,
    destructive: false,
    apply:       v1a_to_v1b,
  },
  Step {
    from:        Generation::V1b,
    to:          Generation::V1c,
    destructive: true,
    apply:       v1b_to_v1c,
  },
];

/// The step leaving `generation`, if it is not the latest.
pub fn step_from(generation: Generation) -> Option<&'static Step> {
  STEPS.iter().find(|s| s.from == generation)
}

/// Split the flat v0 table into entries, users and typed votes.
///
/// Legacy counters have no voter attribution. Whatever the counters hold
/// beyond the materialised vote rows is backfilled as votes by `anonymous`,
/// which keeps totals and loses authorship.
fn v0_to_v1(conn: &Connection, _now: DateTime<Utc>) -> rusqlite::Result<()> {
  conn.execute_batch(schema::V1_TABLES)?;

  conn.execute("INSERT INTO v1_users (identifier) VALUES ('anonymous')", [])?;
  let anonymous = conn.last_insert_rowid();

  let entries = conn.execute(
    "INSERT INTO v1_jokes (id, text, format, user)
     SELECT id, text, 'html', ?1 FROM jokes ORDER BY id",
    [anonymous],
  )?;

  let mut voters = 0;
  let mut attributed = 0;
  if table_exists(conn, "votes")? {
    voters = conn.execute(
      "INSERT INTO v1_users (identifier)
       SELECT ip FROM votes
       WHERE ip IS NOT NULL AND ip != 'anonymous'
       GROUP BY ip
       ORDER BY MIN(id)",
      [],
    )?;
    attributed = conn.execute(
      "INSERT INTO v1_votes (joke, user, type)
       SELECT v.jokeid, u.id,
              CASE v.type WHEN -1 THEN 'down' WHEN 0 THEN 'report' ELSE 'up' END
       FROM votes v
       JOIN v1_users u ON u.identifier = v.ip
       WHERE v.type IN (-1, 0, 1)
       ORDER BY v.id",
      [],
    )?;
  }

  let counters: Vec<(i64, i64, i64, i64)> = {
    let mut stmt = conn.prepare(
      "SELECT id, COALESCE(upvotes, 0), COALESCE(downvotes, 0), COALESCE(reports, 0)
       FROM jokes ORDER BY id",
    )?;
    stmt
      .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
      .collect::<rusqlite::Result<_>>()?
  };

  let mut materialized =
    conn.prepare("SELECT COUNT(*) FROM v1_votes WHERE joke = ?1 AND type = ?2")?;
  let mut insert =
    conn.prepare("INSERT INTO v1_votes (joke, user, type) VALUES (?1, ?2, ?3)")?;
  let mut synthesized = 0;
  for (id, up, down, report) in counters {
    for (kind, legacy) in [("up", up), ("down", down), ("report", report)] {
      let present: i64 = materialized.query_row(params![id, kind], |r| r.get(0))?;
      for _ in present..legacy {
        insert.execute(params![id, anonymous, kind])?;
        synthesized += 1;
      }
    }
  }

  conn.execute_batch("DROP TABLE IF EXISTS jokes; DROP TABLE IF EXISTS votes;")?;

  tracing::info!(entries, voters, attributed, synthesized, "split v0 entries and votes");
  Ok(())
}

/// Give users a role and password columns.
fn v1_to_v1a(conn: &Connection, _now: DateTime<Utc>) -> rusqlite::Result<()> {
  rename_table(conn, "v1_jokes", "v1a_jokes")?;
  rename_table(conn, "v1_votes", "v1a_votes")?;
  conn.execute_batch(schema::V1A_USERS)?;
  if table_exists(conn, "v1_users")? {
    conn.execute(
      "INSERT OR IGNORE INTO v1a_users (id, identifier) SELECT id, identifier FROM v1_users",
      [],
    )?;
  }
  conn.execute_batch("DROP TABLE IF EXISTS v1_users")?;
  Ok(())
}

/// Rename the pretty-text format label and fold reports into downvotes.
fn v1a_to_v1b(conn: &Connection, _now: DateTime<Utc>) -> rusqlite::Result<()> {
  rename_table(conn, "v1a_jokes", "v1b_jokes")?;
  rename_table(conn, "v1a_votes", "v1b_votes")?;
  rename_table(conn, "v1a_users", "v1b_users")?;
  let formats = conn.execute(
    "UPDATE v1b_jokes SET format = 'prettytext' WHERE format = 'markdown'",
    [],
  )?;
  let reports = conn.execute("UPDATE v1b_votes SET type = 'down' WHERE type = 'report'", [])?;
  tracing::info!(formats, reports, "recoded formats and report votes");
  Ok(())
}

/// Timestamp entries and case-fold identifiers.
///
/// Creation times are unknown; they are extrapolated as one day per id step
/// back from `now` for the newest entry. Users whose identifier collides with
/// an older one after case-folding are neutralised: demoted to guest, stripped
/// of their password and renamed with their id appended. Their rows stay so no
/// reference dangles, but their history no longer belongs to the surviving name.
fn v1b_to_v1c(conn: &Connection, now: DateTime<Utc>) -> rusqlite::Result<()> {
  conn.execute_batch(schema::V1C_JOKES)?;
  rename_table(conn, "v1b_votes", "v1c_votes")?;
  rename_table(conn, "v1b_users", "v1c_users")?;

  let users: Vec<(i64, Option<String>)> = {
    let mut stmt = conn.prepare("SELECT id, identifier FROM v1c_users ORDER BY id")?;
    stmt
      .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
      .collect::<rusqlite::Result<_>>()?
  };

  // Every folded name is reserved up front so a renamed duplicate never lands
  // on a name some later user already holds.
  let mut taken: HashSet<String> = users
    .iter()
    .filter_map(|(_, identifier)| identifier.as_deref().map(str::to_lowercase))
    .collect();
  let mut seen = HashSet::new();
  let mut rename = conn.prepare("UPDATE v1c_users SET identifier = ?2 WHERE id = ?1")?;
  let mut neutralise = conn.prepare(
    "UPDATE v1c_users SET identifier = ?2, role = 'guest', password = '', salt = ''
     WHERE id = ?1",
  )?;
  for (id, identifier) in users {
    let Some(identifier) = identifier else { continue };
    let folded = identifier.to_lowercase();
    if seen.insert(folded.clone()) {
      if folded != identifier {
        rename.execute(params![id, folded])?;
      }
    } else {
      let renamed = free_name(&taken, &format!("{folded}{id}"));
      taken.insert(renamed.clone());
      tracing::warn!(
        user = id,
        identifier = %identifier,
        renamed = %renamed,
        "neutralising duplicate user"
      );
      neutralise.execute(params![id, renamed])?;
    }
  }

  let entries: Vec<(i64, Option<String>, Option<String>, Option<i64>)> = {
    let mut stmt = conn.prepare("SELECT id, text, format, user FROM v1b_jokes ORDER BY id")?;
    stmt
      .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
      .collect::<rusqlite::Result<_>>()?
  };
  let newest = entries.iter().map(|(id, ..)| *id).max().unwrap_or_default();
  let mut insert = conn.prepare(
    "INSERT OR IGNORE INTO v1c_jokes (id, text, format, user, created)
     VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for (id, text, format, user) in &entries {
    let created = extrapolate_created(now, newest, *id)?;
    insert.execute(params![id, text, format, user, encode_dt(created)])?;
  }

  conn.execute_batch("DROP TABLE IF EXISTS v1b_jokes")?;
  conn.execute_batch(schema::V1C_INDEXES)?;
  tracing::info!(entries = entries.len(), "timestamped entries");
  Ok(())
}

/// `base`, or `base` with the first free `-n` suffix.
fn free_name(taken: &HashSet<String>, base: &str) -> String {
  let mut candidate = base.to_owned();
  let mut n = 1;
  while taken.contains(&candidate) {
    n += 1;
    candidate = format!("{base}-{n}");
  }
  candidate
}

/// One day back from `now` per id step below `newest`.
///
/// Fails when the gap does not fit the representable date range.
fn extrapolate_created(
  now: DateTime<Utc>,
  newest: i64,
  id: i64,
) -> rusqlite::Result<DateTime<Utc>> {
  newest
    .checked_sub(id)
    .and_then(TimeDelta::try_days)
    .and_then(|age| now.checked_sub_signed(age))
    .ok_or(rusqlite::Error::IntegralValueOutOfRange(0, id))
}

/// Create the latest schema in an empty store.
fn bootstrap(conn: &Connection) -> rusqlite::Result<()> {
  conn.execute_batch(schema::V1C_JOKES)?;
  conn.execute_batch(schema::V1C_TABLES)?;
  conn.execute_batch(schema::V1C_INDEXES)?;
  Ok(())
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// A step the engine applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedStep {
  pub from:        Generation,
  pub to:          Generation,
  pub destructive: bool,
}

/// What a call to [`run`] did to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
  /// The store was empty and the latest schema was created.
  pub bootstrapped: bool,
  /// Steps applied, in order.
  pub applied:      Vec<AppliedStep>,
}

impl MigrationReport {
  /// Whether the call changed the schema at all.
  pub fn is_noop(&self) -> bool { !self.bootstrapped && self.applied.is_empty() }
}

/// Bring the store to [`Generation::LATEST`].
///
/// Each pass is one immediate transaction. A failing step is rolled back and
/// aborts the run, leaving the store at the generation before that step.
pub fn run(conn: &mut Connection, now: DateTime<Utc>) -> Result<MigrationReport> {
  let mut report = MigrationReport::default();

  loop {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(current) = probe(&tx)? else {
      tracing::warn!(generation = %Generation::LATEST, "creating new database");
      bootstrap(&tx).map_err(|e| Error::Bootstrap(Generation::LATEST, e))?;
      tx.commit()?;
      report.bootstrapped = true;
      return Ok(report);
    };

    let Some(step) = step_from(current) else {
      // Already latest; nothing was written.
      tx.commit()?;
      return Ok(report);
    };

    if step.destructive {
      tracing::warn!(
        from = %step.from,
        to = %step.to,
        "migrating database; usernames are lowercased and later duplicates are \
         neutralised, oldest kept"
      );
    } else {
      tracing::info!(from = %step.from, to = %step.to, "migrating database");
    }

    (step.apply)(&tx, now).map_err(|source| Error::MigrationStep {
      from: step.from,
      to: step.to,
      source,
    })?;

    let reached = probe(&tx)?;
    if reached != Some(step.to) {
      return Err(Error::StepDidNotAdvance { from: step.from, to: step.to, found: reached });
    }

    tx.commit()?;
    report.applied.push(AppliedStep {
      from:        step.from,
      to:          step.to,
      destructive: step.destructive,
    });
  }
}
