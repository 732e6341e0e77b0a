use serde::{Deserialize, Serialize};

use crate::domain::{Duty, Page};

pub const DUTIES_ROUTE: &str = "duties";

pub type DutyPage = Page<Duty>;

/// Query string of `GET /duties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDutiesQuery {
    pub page: u32,
    pub page_size: u32,
}

/// Body of `POST /duties` and `PUT /duties/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyPayload {
    pub name: String,
}
