use anyhow::Result;

use crate::config::AppConfig;
use crate::database::Database;
use crate::model::DeleteResult;
use crate::session::Session;

/// Delete the session owner's tasks with the provided ids and return per-id results.
pub fn delete_tasks(
    config: &AppConfig,
    session: &Session,
    ids: &[String],
) -> Result<Vec<DeleteResult>> {
    let database = Database::initialize(config)?;
    database.delete_tasks(session.user_id, ids)
}
