//! Bulk side-data loading for a set of matched records.

use super::filter::Includes;
use crate::error::NodResult;
use crate::model::node::{Node, NodeRecord};
use crate::repo::content_repo::{ContentRepository, SqliteContentRepository};
use crate::repo::kv_repo::{KvRepository, SqliteKvRepository};
use crate::repo::tag_repo::{SqliteTagRepository, TagRepository};
use rusqlite::Connection;

/// Wraps records into aggregates, issuing one statement per requested
/// side-data kind for the whole set.
pub(crate) fn hydrate(
    conn: &Connection,
    records: Vec<NodeRecord>,
    includes: Includes,
) -> NodResult<Vec<Node>> {
    let ids: Vec<String> = if includes == Includes::default() {
        Vec::new()
    } else {
        records.iter().map(|record| record.id.clone()).collect()
    };

    let mut tags = if includes.tags {
        SqliteTagRepository::new(conn).list_for_nodes(&ids)?
    } else {
        Default::default()
    };
    let mut kv = if includes.kv {
        SqliteKvRepository::new(conn).list_for_nodes(&ids)?
    } else {
        Default::default()
    };
    let mut content = if includes.content {
        SqliteContentRepository::new(conn).list_for_nodes(&ids)?
    } else {
        Default::default()
    };

    Ok(records
        .into_iter()
        .map(|record| Node {
            tags: tags.remove(&record.id).unwrap_or_default(),
            kv: kv.remove(&record.id).unwrap_or_default(),
            content: content.remove(&record.id).unwrap_or_default(),
            record,
        })
        .collect())
}
