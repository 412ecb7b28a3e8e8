use markers::database::DatabaseError;
use sqlx::{Executor, Postgres};

pub mod marker;

/// Key of the transaction level advisory lock taken before merge decisions.
pub const MERGE_LOCK_KEY: i64 = 0x4c49_4748_544d_524b;

pub(crate) fn convert_error(why: sqlx::Error) -> DatabaseError {
    match why {
        sqlx::Error::RowNotFound => DatabaseError::NotFound,
        _ => DatabaseError::Other(Box::new(why)),
    }
}

/// Blocks until no other transaction holds the merge lock. Released when the
/// surrounding transaction ends.
pub async fn lock_for_merge<'c, E>(executor: E) -> markers::database::Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query("SELECT pg_advisory_xact_lock($1);")
        .bind(MERGE_LOCK_KEY)
        .execute(executor)
        .await
        .map_err(convert_error)
        .map(|_| ())
}
