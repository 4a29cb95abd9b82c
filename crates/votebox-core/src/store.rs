//! The `FeedStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `votebox-store-sqlite`).
//! Higher layers (`votebox-server`) depend on this abstraction, not on any
//! concrete backend. A backend must have finished migrating its schema to
//! [`Generation::LATEST`](crate::generation::Generation::LATEST) before it
//! hands out a value implementing this trait.

use std::future::Future;

use crate::{
  entry::{Entry, EntryId},
  feed::{FeedQuery, RenderedEntry},
  identity::{Authentication, Registration},
  user::{User, UserId},
  vote::{Direction, VoteType},
};

/// Abstraction over a votebox store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait FeedStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Identities ────────────────────────────────────────────────────────

  /// Return the guest identity named by `token`, creating it if absent.
  ///
  /// Only tokens of the issued shape are accepted (see
  /// [`identity::is_guest_token`](crate::identity::is_guest_token)), and a
  /// token never names a registered identity.
  fn resolve_guest<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<UserId, Self::Error>> + Send + 'a;

  /// Create a registered identity with a salted password hash.
  fn register<'a>(
    &'a self,
    name: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<Registration, Self::Error>> + Send + 'a;

  /// Verify a name/password pair. Lookup ignores case.
  fn authenticate<'a>(
    &'a self,
    name: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<Authentication, Self::Error>> + Send + 'a;

  /// Grant the superuser role to `name`. Idempotent; a no-op for unknown
  /// names. Returns whether a user matched.
  fn promote<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Look a user up by identifier, ignoring case.
  fn find_user<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  // ── Entries ───────────────────────────────────────────────────────────

  /// Store a new pretty-text entry stamped with the current time.
  fn add_entry(
    &self,
    text: String,
    author: UserId,
  ) -> impl Future<Output = Result<EntryId, Self::Error>> + Send + '_;

  fn get_entry(
    &self,
    id: EntryId,
  ) -> impl Future<Output = Result<Option<Entry>, Self::Error>> + Send + '_;

  /// Replace the text of an entry; the format becomes pretty text.
  /// Returns `false` if the entry does not exist.
  fn edit_entry(
    &self,
    id: EntryId,
    text: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// True iff `user` is a superuser or the author of `entry`.
  fn may_modify(
    &self,
    entry: EntryId,
    user: UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Vote ledger ───────────────────────────────────────────────────────

  /// Append a ledger row. Uniqueness is not enforced.
  fn cast(
    &self,
    entry: EntryId,
    user: UserId,
    kind: VoteType,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete every ledger row for the pair. Returns the number removed.
  fn retract(
    &self,
    entry: EntryId,
    user: UserId,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Replace the user's directional vote on `entry` with `direction`,
  /// atomically. A soft-delete marker by the same user is left alone.
  fn vote(
    &self,
    entry: EntryId,
    user: UserId,
    direction: Direction,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Whether any ledger row exists for the pair.
  fn has_voted(
    &self,
    entry: EntryId,
    user: UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Count rows of `kind` for `entry`, optionally restricted to one user.
  fn count_by_type(
    &self,
    entry: EntryId,
    kind: VoteType,
    user: Option<UserId>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Soft-delete an entry by recording a `delete` row for `user`.
  fn remove_entry(
    &self,
    entry: EntryId,
    user: UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.cast(entry, user, VoteType::Delete)
  }

  /// Undo [`remove_entry`](Self::remove_entry) by retracting the user's rows.
  fn restore_entry(
    &self,
    entry: EntryId,
    user: UserId,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_ {
    self.retract(entry, user)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Materialise the ranked feed for `query`. Never fails on an absent
  /// viewer or search.
  fn list_feed<'a>(
    &'a self,
    query: &'a FeedQuery,
  ) -> impl Future<Output = Result<Vec<RenderedEntry>, Self::Error>> + Send + 'a;
}
