//! Composition layer turning relational rows into the nested JSON bodies
//! served by the API. Each endpoint is one function over a store handle;
//! nothing here keeps state between calls.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{col_i64, col_opt_i64, col_opt_text, col_text, Row, Store, StoreError};

#[derive(Debug, Error)]
pub enum EndpointError {
    /// Zero rows matched a single-entity lookup by id.
    #[error("entity could not be found with id {0}")]
    NotFound(i64),
    /// More than one row matched an id expected to be unique.
    #[error("multiple rows matched id {0}, which should be unique")]
    IntegrityConflict(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankWindow {
    Alltime,
    YearToDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultList<T> {
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorName {
    pub id: i64,
    pub given: String,
    pub surname: Option<String>,
}

impl AuthorName {
    /// Joined display form. The surname is appended only when the row
    /// carries one; single-name authors keep the bare given name.
    fn display_name(&self) -> String {
        match &self.surname {
            Some(surname) => format!("{} {}", self.given, surname),
            None => self.given.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub url: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<AuthorRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedArticle {
    pub rank: i64,
    pub downloads: i64,
    pub id: i64,
    pub url: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<AuthorRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStats {
    pub paper_count: i64,
    pub author_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downloads {
    #[serde(rename = "abstract")]
    pub abstract_views: i64,
    pub pdf: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: i64,
    pub url: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<AuthorName>,
    pub downloads: Downloads,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArticleRanks {
    pub alltime: Option<i64>,
    pub ytd: Option<i64>,
    pub out_of: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorArticle {
    pub ranks: ArticleRanks,
    pub id: i64,
    pub url: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<AuthorRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorDetail {
    pub id: i64,
    pub given: String,
    pub surname: Option<String>,
    pub articles: Vec<AuthorArticle>,
}

// Full listing, no pagination.
const LIST_ARTICLES_SQL: &str = "SELECT id, url, title, abstract FROM articles";

const ARTICLE_AUTHORS_SQL: &str = "SELECT authors.id, authors.given, authors.surname \
     FROM article_authors AS aa \
     INNER JOIN authors ON authors.id = aa.author \
     WHERE aa.article = ?";

const TEXT_SEARCH_SQL: &str = "SELECT r.rank, r.downloads, a.id, a.url, a.title, a.abstract \
     FROM article_search \
     INNER JOIN articles AS a ON a.id = article_search.rowid \
     INNER JOIN alltime_ranks AS r ON r.article = a.id \
     WHERE article_search MATCH ? \
     ORDER BY r.rank ASC LIMIT 20";

const POPULAR_ALLTIME_SQL: &str = "SELECT r.rank, r.downloads, a.id, a.url, a.title, a.abstract \
     FROM articles AS a \
     INNER JOIN alltime_ranks AS r ON r.article = a.id \
     ORDER BY r.rank ASC LIMIT 20";

const POPULAR_YTD_SQL: &str = "SELECT r.rank, r.downloads, a.id, a.url, a.title, a.abstract \
     FROM articles AS a \
     INNER JOIN ytd_ranks AS r ON r.article = a.id \
     ORDER BY r.rank ASC LIMIT 20";

const PAPER_COUNT_SQL: &str = "SELECT COUNT(id) FROM articles";
const AUTHOR_COUNT_SQL: &str = "SELECT COUNT(id) FROM authors";

const ARTICLE_BY_ID_SQL: &str = "SELECT id, url, title, abstract FROM articles WHERE id = ?";
const TRAFFIC_SQL: &str = "SELECT SUM(abstract), SUM(pdf) FROM article_traffic WHERE article = ?";

const AUTHOR_BY_ID_SQL: &str = "SELECT id, given, surname FROM authors WHERE id = ?";
const AUTHOR_ARTICLES_SQL: &str =
    "SELECT alltime_ranks.rank, ytd_ranks.rank, articles.id, articles.url, articles.title, articles.abstract \
     FROM articles \
     INNER JOIN article_authors ON article_authors.article = articles.id \
     LEFT JOIN alltime_ranks ON articles.id = alltime_ranks.article \
     LEFT JOIN ytd_ranks ON articles.id = ytd_ranks.article \
     WHERE article_authors.author = ?";
const ALLTIME_RANK_COUNT_SQL: &str = "SELECT COUNT(article) FROM alltime_ranks";

/// Authors of one article in full form, in store order.
fn authors_of<S: Store>(store: &S, article_id: i64) -> Result<Vec<AuthorName>, EndpointError> {
    let rows = store.read(ARTICLE_AUTHORS_SQL, &[Value::Integer(article_id)])?;
    let mut authors = Vec::with_capacity(rows.len());
    for row in &rows {
        authors.push(AuthorName {
            id: col_i64(row, 0)?,
            given: col_text(row, 1)?,
            surname: col_opt_text(row, 2)?,
        });
    }
    Ok(authors)
}

/// Authors of one article in compact name-joined form.
fn author_refs<S: Store>(store: &S, article_id: i64) -> Result<Vec<AuthorRef>, EndpointError> {
    let authors = authors_of(store, article_id)?;
    Ok(authors
        .iter()
        .map(|author| AuthorRef {
            id: author.id,
            name: author.display_name(),
        })
        .collect())
}

/// Summed traffic counters for one article. Errors with `NotFound` when the
/// store returns no aggregate row at all; `paper_details` maps that onto
/// zero-valued defaults in its fallback branch. NULL sums coerce to 0.
fn article_traffic<S: Store>(store: &S, article_id: i64) -> Result<Downloads, EndpointError> {
    let rows = store.read(TRAFFIC_SQL, &[Value::Integer(article_id)])?;
    let row = rows.first().ok_or(EndpointError::NotFound(article_id))?;
    Ok(Downloads {
        abstract_views: col_opt_i64(row, 0)?.unwrap_or(0),
        pdf: col_opt_i64(row, 1)?.unwrap_or(0),
    })
}

pub fn list_articles<S: Store>(store: &S) -> Result<ResultList<ArticleSummary>, EndpointError> {
    let rows = store.read(LIST_ARTICLES_SQL, &[])?;
    let mut results = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = col_i64(row, 0)?;
        results.push(ArticleSummary {
            id,
            url: col_text(row, 1)?,
            title: col_text(row, 2)?,
            abstract_text: col_text(row, 3)?,
            authors: author_refs(store, id)?,
        });
    }
    Ok(ResultList { results })
}

fn ranked_articles<S: Store>(
    store: &S,
    sql: &str,
    params: &[Value],
) -> Result<ResultList<RankedArticle>, EndpointError> {
    let rows = store.read(sql, params)?;
    let mut results = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = col_i64(row, 2)?;
        results.push(RankedArticle {
            rank: col_i64(row, 0)?,
            downloads: col_i64(row, 1)?,
            id,
            url: col_text(row, 3)?,
            title: col_text(row, 4)?,
            abstract_text: col_text(row, 5)?,
            authors: author_refs(store, id)?,
        });
    }
    Ok(ResultList { results })
}

/// Full-text search over the precomputed title/abstract index. The query
/// string goes to the store's match syntax unmodified beyond parameter
/// binding; hits carry their all-time rank and download count.
pub fn text_search<S: Store>(
    store: &S,
    query: &str,
) -> Result<ResultList<RankedArticle>, EndpointError> {
    ranked_articles(store, TEXT_SEARCH_SQL, &[Value::Text(query.to_owned())])
}

pub fn most_popular<S: Store>(
    store: &S,
    window: RankWindow,
) -> Result<ResultList<RankedArticle>, EndpointError> {
    let sql = match window {
        RankWindow::Alltime => POPULAR_ALLTIME_SQL,
        RankWindow::YearToDate => POPULAR_YTD_SQL,
    };
    ranked_articles(store, sql, &[])
}

pub fn site_stats<S: Store>(store: &S) -> Result<SiteStats, EndpointError> {
    let mut stats = SiteStats {
        paper_count: 0,
        author_count: 0,
    };
    // A count query coming back in any shape other than one row with one
    // column short-circuits to the zero defaults instead of failing; later
    // counters stay zero once a shape check fails.
    let rows = store.read(PAPER_COUNT_SQL, &[])?;
    let Some(count) = single_count(&rows) else {
        return Ok(stats);
    };
    stats.paper_count = count;
    let rows = store.read(AUTHOR_COUNT_SQL, &[])?;
    let Some(count) = single_count(&rows) else {
        return Ok(stats);
    };
    stats.author_count = count;
    Ok(stats)
}

fn single_count(rows: &[Row]) -> Option<i64> {
    match rows {
        [row] if row.len() == 1 => match row[0] {
            Value::Integer(n) => Some(n),
            _ => None,
        },
        _ => None,
    }
}

pub fn paper_details<S: Store>(store: &S, id: i64) -> Result<ArticleDetail, EndpointError> {
    let rows = store.read(ARTICLE_BY_ID_SQL, &[Value::Integer(id)])?;
    let row = match rows.as_slice() {
        [] => return Err(EndpointError::NotFound(id)),
        [row] => row,
        _ => return Err(EndpointError::IntegrityConflict(id)),
    };
    // Articles without traffic rows report zero downloads rather than an
    // error; only the missing-aggregate case is absorbed here.
    let downloads = match article_traffic(store, id) {
        Ok(downloads) => downloads,
        Err(EndpointError::NotFound(_)) => Downloads::default(),
        Err(err) => return Err(err),
    };
    Ok(ArticleDetail {
        id: col_i64(row, 0)?,
        url: col_text(row, 1)?,
        title: col_text(row, 2)?,
        abstract_text: col_text(row, 3)?,
        authors: authors_of(store, id)?,
        downloads,
    })
}

pub fn author_details<S: Store>(store: &S, id: i64) -> Result<AuthorDetail, EndpointError> {
    let rows = store.read(AUTHOR_BY_ID_SQL, &[Value::Integer(id)])?;
    let author = match rows.as_slice() {
        [] => return Err(EndpointError::NotFound(id)),
        [row] => row,
        _ => return Err(EndpointError::IntegrityConflict(id)),
    };
    let article_rows = store.read(AUTHOR_ARTICLES_SQL, &[Value::Integer(id)])?;
    // The ranking denominator is computed once and shared by every entry.
    let count_rows = store.read(ALLTIME_RANK_COUNT_SQL, &[])?;
    let count_row = count_rows.first().ok_or(StoreError::MissingAggregate)?;
    let out_of = col_i64(count_row, 0)?;

    let mut articles = Vec::with_capacity(article_rows.len());
    for row in &article_rows {
        let article_id = col_i64(row, 2)?;
        articles.push(AuthorArticle {
            ranks: ArticleRanks {
                alltime: col_opt_i64(row, 0)?,
                ytd: col_opt_i64(row, 1)?,
                out_of,
            },
            id: article_id,
            url: col_text(row, 3)?,
            title: col_text(row, 4)?,
            abstract_text: col_text(row, 5)?,
            authors: author_refs(store, article_id)?,
        });
    }
    Ok(AuthorDetail {
        id: col_i64(author, 0)?,
        given: col_text(author, 1)?,
        surname: col_opt_text(author, 2)?,
        articles,
    })
}
