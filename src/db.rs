use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

use crate::store::{Row, Store, StoreError};

pub struct Database {
    conn: Connection,
}

const SCHEMA_SQL: &str = r#"
create table if not exists articles
(
    id       integer primary key,
    url      text not null,
    title    text not null,
    abstract text not null
);
create table if not exists authors
(
    id      integer primary key,
    given   text not null,
    surname text
);
create table if not exists article_authors
(
    article integer not null references articles (id),
    author  integer not null references authors (id)
);
create table if not exists article_traffic
(
    article  integer not null references articles (id),
    month    integer,
    year     integer,
    abstract integer not null default 0,
    pdf      integer not null default 0
);
create table if not exists alltime_ranks
(
    article   integer primary key references articles (id),
    rank      integer not null,
    downloads integer not null
);
create table if not exists ytd_ranks
(
    article   integer primary key references articles (id),
    rank      integer not null,
    downloads integer not null
);
create virtual table if not exists article_search using fts5
(
    title,
    abstract,
    content='articles',
    content_rowid='id'
);
create trigger if not exists article_search_insert after insert on articles
begin
    insert into article_search (rowid, title, abstract) values (new.id, new.title, new.abstract);
end;
create trigger if not exists article_search_delete after delete on articles
begin
    insert into article_search (article_search, rowid, title, abstract) values ('delete', old.id, old.title, old.abstract);
end;
create trigger if not exists article_search_update after update on articles
begin
    insert into article_search (article_search, rowid, title, abstract) values ('delete', old.id, old.title, old.abstract);
    insert into article_search (rowid, title, abstract) values (new.id, new.title, new.abstract);
end;
"#;

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn initialize_schema(&self) -> Result<(), StoreError> {
        Ok(self.conn.execute_batch(SCHEMA_SQL)?)
    }

    /// Runs a batch of statements. Writes are owned by the external
    /// ingestion pipeline; this is the hook it and the test fixtures use.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        Ok(self.conn.execute_batch(sql)?)
    }
}

impl Store for Database {
    fn read(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(row.get::<_, Value>(idx)?);
            }
            out.push(values);
        }
        Ok(out)
    }
}
