//! [`SqliteStore`], the SQLite implementation of [`FeedStore`].

use std::{collections::HashSet, path::Path, sync::Arc, time::Duration};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::ValueRef};

use votebox_core::{
  entry::{Entry, EntryId, RenderFormat},
  feed::{self, FeedQuery, FeedSnapshot, RenderedEntry, Viewer},
  generation::{Generation, Tables},
  identity::{self, Authentication, Registration},
  store::FeedStore,
  user::{Role, User, UserId},
  vote::{Direction, VoteEvent, VoteType},
};

use crate::{
  Error, Result,
  encode::{RawEntry, RawUser, RawVote, decode_role, encode_dt},
  migrate::{self, MigrationReport},
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A votebox store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. A value only
/// exists once the file has been migrated to [`Generation::LATEST`].
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  tables: Arc<Tables>,
  report: Arc<MigrationReport>,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, migrate it and promote `superuser`.
  pub async fn open(path: impl AsRef<Path>, superuser: Option<&str>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::from_connection(conn, superuser).await
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory(superuser: Option<&str>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::from_connection(conn, superuser).await
  }

  /// Migrate an already open connection and wrap it.
  pub async fn from_connection(
    conn: tokio_rusqlite::Connection,
    superuser: Option<&str>,
  ) -> Result<Self> {
    let now = Utc::now();
    let report = conn
      .call(move |conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
          row.get::<_, String>(0)
        })?;
        Ok(migrate::run(conn, now))
      })
      .await??;

    let tables = Generation::LATEST
      .tables()
      .ok_or(Error::UnsupportedGeneration(Generation::LATEST))?;

    let store = Self { conn, tables: Arc::new(tables), report: Arc::new(report) };

    if let Some(name) = superuser {
      if !store.promote(name).await? {
        tracing::warn!(name, "superuser is not registered yet");
      }
    }

    Ok(store)
  }

  /// What opening this store did to its schema.
  pub fn migration_report(&self) -> &MigrationReport { &self.report }

  fn tables(&self) -> Arc<Tables> { Arc::clone(&self.tables) }
}

/// Read a salt column that older writers stored as either text or blob.
fn salt_bytes(value: ValueRef<'_>) -> Vec<u8> {
  match value {
    ValueRef::Text(b) | ValueRef::Blob(b) => b.to_vec(),
    _ => Vec::new(),
  }
}

// ─── FeedStore impl ──────────────────────────────────────────────────────────

impl FeedStore for SqliteStore {
  type Error = Error;

  // ── Identities ────────────────────────────────────────────────────────────

  async fn resolve_guest(&self, token: &str) -> Result<UserId> {
    if !identity::is_guest_token(token) {
      return Err(Error::InvalidGuestToken(token.to_owned()));
    }

    let t = self.tables();
    let token = token.to_owned();

    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing: Option<(i64, Option<String>)> = tx
          .query_row(
            &format!(
              "SELECT id, role FROM {} WHERE LOWER(identifier) = ?1 ORDER BY id LIMIT 1",
              t.users
            ),
            [&token],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let id = match existing {
          Some((id, role))
            if role.as_deref().unwrap_or(Role::Guest.as_str()) == Role::Guest.as_str() =>
          {
            Some(id)
          }
          Some(_) => None,
          None => {
            tx.execute(
              &format!("INSERT INTO {} (identifier, role) VALUES (?1, ?2)", t.users),
              rusqlite::params![token, Role::Guest.as_str()],
            )?;
            Some(tx.last_insert_rowid())
          }
        };
        tx.commit()?;
        Ok(id.ok_or(token))
      })
      .await?;

    id.map(UserId).map_err(Error::InvalidGuestToken)
  }

  async fn register(&self, name: &str, password: &str) -> Result<Registration> {
    if !identity::is_valid_name(name) {
      return Ok(Registration::InvalidName);
    }

    let t = self.tables();
    let identifier = identity::normalize_name(name);
    let salt = identity::new_salt();
    let hash = identity::hash_password(password, salt.as_bytes());

    let created: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken: bool = tx.query_row(
          &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE LOWER(identifier) = ?1)", t.users),
          [&identifier],
          |r| r.get(0),
        )?;
        if taken {
          return Ok(None);
        }
        tx.execute(
          &format!(
            "INSERT INTO {} (identifier, role, password, salt) VALUES (?1, ?2, ?3, ?4)",
            t.users
          ),
          rusqlite::params![identifier, Role::User.as_str(), hash, salt],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some(id))
      })
      .await?;

    Ok(match created {
      Some(id) => {
        tracing::info!(user = id, "registered user");
        Registration::Created(UserId(id))
      }
      None => Registration::AlreadyRegistered,
    })
  }

  async fn authenticate(&self, name: &str, password: &str) -> Result<Authentication> {
    if !identity::is_valid_name(name) {
      return Ok(Authentication::InvalidName);
    }

    let t = self.tables();
    let identifier = identity::normalize_name(name);

    let candidates: Vec<(i64, Option<String>, Vec<u8>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT id, password, salt FROM {} WHERE LOWER(identifier) = ?1 ORDER BY id",
          t.users
        ))?;
        let rows = stmt
          .query_map([&identifier], |r| {
            Ok((r.get(0)?, r.get(1)?, salt_bytes(r.get_ref(2)?)))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    if candidates.is_empty() {
      return Ok(Authentication::NotFound);
    }
    let verified = candidates.into_iter().find(|(_, hash, salt)| {
      identity::verify_password(password, salt, hash.as_deref().unwrap_or_default())
    });
    Ok(match verified {
      Some((id, ..)) => Authentication::Authenticated(UserId(id)),
      None => Authentication::WrongPassword,
    })
  }

  async fn promote(&self, name: &str) -> Result<bool> {
    let t = self.tables();
    let identifier = identity::normalize_name(name);
    let log_name = identifier.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!("UPDATE {} SET role = ?2 WHERE LOWER(identifier) = ?1", t.users),
          rusqlite::params![identifier, Role::Super.as_str()],
        )?)
      })
      .await?;

    if changed > 0 {
      tracing::info!(name = %log_name, "granted superuser role");
    }
    Ok(changed > 0)
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    let t = self.tables();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM {} WHERE id = ?1", RawUser::COLUMNS, t.users),
              [id.0],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user(&self, name: &str) -> Result<Option<User>> {
    let t = self.tables();
    let identifier = identity::normalize_name(name);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM {} WHERE LOWER(identifier) = ?1 ORDER BY id LIMIT 1",
                RawUser::COLUMNS,
                t.users
              ),
              [&identifier],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Entries ───────────────────────────────────────────────────────────────

  async fn add_entry(&self, text: String, author: UserId) -> Result<EntryId> {
    let t = self.tables();
    let created = encode_dt(Utc::now());

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO {} (text, format, user, created) VALUES (?1, ?2, ?3, ?4)",
            t.entries
          ),
          rusqlite::params![text, RenderFormat::PrettyText.as_str(), author.0, created],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(entry = id, author = %author, "added entry");
    Ok(EntryId(id))
  }

  async fn get_entry(&self, id: EntryId) -> Result<Option<Entry>> {
    let t = self.tables();

    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM {} WHERE id = ?1", RawEntry::COLUMNS, t.entries),
              [id.0],
              RawEntry::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntry::into_entry).transpose()
  }

  async fn edit_entry(&self, id: EntryId, text: String) -> Result<bool> {
    let t = self.tables();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!("UPDATE {} SET text = ?2, format = ?3 WHERE id = ?1", t.entries),
          rusqlite::params![id.0, text, RenderFormat::PrettyText.as_str()],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn may_modify(&self, entry: EntryId, user: UserId) -> Result<bool> {
    let t = self.tables();

    let row: Option<(Option<String>, Option<i64>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT u.role, e.user FROM {} u, {} e WHERE u.id = ?2 AND e.id = ?1",
                t.users, t.entries
              ),
              [entry.0, user.0],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((role, author)) = row else { return Ok(false) };
    Ok(decode_role(role.as_deref())? == Role::Super || author == Some(user.0))
  }

  // ── Vote ledger ───────────────────────────────────────────────────────────

  async fn cast(&self, entry: EntryId, user: UserId, kind: VoteType) -> Result<()> {
    let t = self.tables();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("INSERT INTO {} (joke, user, type) VALUES (?1, ?2, ?3)", t.votes),
          rusqlite::params![entry.0, user.0, kind.as_str()],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn retract(&self, entry: EntryId, user: UserId) -> Result<usize> {
    let t = self.tables();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!("DELETE FROM {} WHERE joke = ?1 AND user = ?2", t.votes),
          [entry.0, user.0],
        )?)
      })
      .await?;

    Ok(removed)
  }

  async fn vote(&self, entry: EntryId, user: UserId, direction: Direction) -> Result<()> {
    let t = self.tables();
    let kind = VoteType::from(direction);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          &format!(
            "DELETE FROM {} WHERE joke = ?1 AND user = ?2 AND type IN (?3, ?4)",
            t.votes
          ),
          rusqlite::params![entry.0, user.0, VoteType::Up.as_str(), VoteType::Down.as_str()],
        )?;
        tx.execute(
          &format!("INSERT INTO {} (joke, user, type) VALUES (?1, ?2, ?3)", t.votes),
          rusqlite::params![entry.0, user.0, kind.as_str()],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn has_voted(&self, entry: EntryId, user: UserId) -> Result<bool> {
    let t = self.tables();

    let voted = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE joke = ?1 AND user = ?2)", t.votes),
          [entry.0, user.0],
          |r| r.get::<_, bool>(0),
        )?)
      })
      .await?;

    Ok(voted)
  }

  async fn count_by_type(
    &self,
    entry: EntryId,
    kind: VoteType,
    user: Option<UserId>,
  ) -> Result<u64> {
    let t = self.tables();
    let user = user.map(|u| u.0);

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "SELECT COUNT(*) FROM {}
             WHERE joke = ?1 AND type = ?2 AND (?3 IS NULL OR user = ?3)",
            t.votes
          ),
          rusqlite::params![entry.0, kind.as_str(), user],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(u64::try_from(n).unwrap_or_default())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn list_feed(&self, query: &FeedQuery) -> Result<Vec<RenderedEntry>> {
    let t = self.tables();
    let viewer = query.viewer;

    let (raw_entries, raw_votes, roles, viewer_role) = self
      .conn
      .call(move |conn| {
        let entries = {
          let mut stmt =
            conn.prepare(&format!("SELECT {} FROM {}", RawEntry::COLUMNS, t.entries))?;
          stmt
            .query_map([], RawEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let votes = {
          let mut stmt = conn.prepare(&format!(
            "SELECT id, joke, user, type FROM {}
             WHERE joke IS NOT NULL AND user IS NOT NULL AND type IN (?1, ?2, ?3)
             ORDER BY id",
            t.votes
          ))?;
          stmt
            .query_map(
              [VoteType::Up.as_str(), VoteType::Down.as_str(), VoteType::Delete.as_str()],
              |row| {
                Ok(RawVote {
                  id:   row.get(0)?,
                  joke: row.get(1)?,
                  user: row.get(2)?,
                  kind: row.get(3)?,
                })
              },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let roles = {
          let mut stmt = conn.prepare(&format!(
            "SELECT id, role FROM {} WHERE role IS NOT NULL AND role != ?1",
            t.users
          ))?;
          stmt
            .query_map([Role::Guest.as_str()], |r| {
              Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let viewer_role: Option<Option<String>> = match viewer {
          Some(v) => conn
            .query_row(
              &format!("SELECT role FROM {} WHERE id = ?1", t.users),
              [v.0],
              |r| r.get(0),
            )
            .optional()?,
          None => None,
        };

        Ok((entries, votes, roles, viewer_role))
      })
      .await?;

    let viewer = match (viewer, viewer_role) {
      (Some(id), Some(role)) => Some(Viewer { id, role: decode_role(role.as_deref())? }),
      // An id that matches no user still sees its own votes.
      (Some(id), None) => Some(Viewer { id, role: Role::Guest }),
      (None, _) => None,
    };

    let mut privileged = HashSet::new();
    for (id, role) in roles {
      if decode_role(Some(&role))?.is_privileged() {
        privileged.insert(UserId(id));
      }
    }

    let snapshot = FeedSnapshot {
      entries: raw_entries
        .into_iter()
        .map(RawEntry::into_entry)
        .collect::<Result<_>>()?,
      votes: raw_votes
        .into_iter()
        .map(RawVote::into_vote)
        .collect::<Result<Vec<VoteEvent>>>()?,
      privileged,
      viewer,
    };

    Ok(feed::build_feed(snapshot, query, query.as_of.unwrap_or_else(Utc::now)))
  }
}
