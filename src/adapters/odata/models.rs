//! Wire models for the OData service

use crate::domain::Record;
use serde::Deserialize;

/// Body returned by the identity endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "AccessToken")]
    pub access_token: Option<String>,
}

/// One page of a view query
#[derive(Debug, Default, Deserialize)]
pub struct ODataPage {
    #[serde(default)]
    pub value: Option<Vec<Record>>,

    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
}

impl ODataPage {
    pub fn into_records(self) -> Vec<Record> {
        self.value.unwrap_or_default()
    }
}
