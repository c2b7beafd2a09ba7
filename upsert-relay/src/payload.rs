//! Request body of the platform's rowset upsert.
//!
//! Each entry names the primary key columns in `keys` and repeats them in
//! `values`; the platform uses `keys` to find the row it overwrites.

use crate::model::Row;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RowKeys<'a> {
    pub email_name: &'a str,
    pub field_name: &'a str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RowsetEntry<'a> {
    pub keys: RowKeys<'a>,
    pub values: &'a Row,
}

impl<'a> From<&'a Row> for RowsetEntry<'a> {
    fn from(row: &'a Row) -> Self {
        RowsetEntry {
            keys: RowKeys {
                email_name: &row.email_name,
                field_name: &row.field_name,
            },
            values: row,
        }
    }
}

pub fn build_rowset(rows: &[Row]) -> Vec<RowsetEntry<'_>> {
    rows.iter().map(RowsetEntry::from).collect()
}
