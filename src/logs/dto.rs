use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logs::duration::{format_hhmm, format_human, format_time};
use crate::logs::repo::EntryWithOwner;

#[derive(Debug, Deserialize)]
pub struct AddEntryRequest {
    pub date: String,
    pub clock_in: String,
    pub clock_out: String,
    pub task_description: String,
    /// Elevated roles may file an entry on another account's behalf.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub date: String,
    pub clock_in: String,
    pub clock_out: String,
    pub task_description: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Narrow the listing to one account, where the caller's role allows it.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub date: String,
    pub clock_in: String,
    pub clock_out: String,
    pub task_description: String,
    pub work_duration: String,
    pub work_duration_human: String,
}

impl From<EntryWithOwner> for EntryResponse {
    fn from(e: EntryWithOwner) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id,
            username: e.username,
            date: e.work_date.to_string(),
            clock_in: format_time(e.clock_in),
            clock_out: format_time(e.clock_out),
            task_description: e.task_description,
            work_duration: format_hhmm(e.work_minutes),
            work_duration_human: format_human(e.work_minutes),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedEntryResponse {
    pub id: Uuid,
    pub work_duration: String,
}
