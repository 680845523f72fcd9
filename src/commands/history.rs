use anyhow::Result;

use crate::models::SessionRecord;
use crate::store::SessionStore;

pub enum HistoryResult {
    Sessions(Vec<SessionRecord>),
    Session(SessionRecord),
}

pub fn run(session: Option<String>, store: &SessionStore) -> Result<HistoryResult> {
    if let Some(key) = session {
        let record = store.resolve(&key)?;
        return Ok(HistoryResult::Session(record.clone()));
    }

    let sessions = store.list().into_iter().cloned().collect();
    Ok(HistoryResult::Sessions(sessions))
}
