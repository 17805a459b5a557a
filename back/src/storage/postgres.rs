//! `PostgreSQL` storage over the `lists` / `todos` table pair.
//!
//! ```sql
//! CREATE TABLE lists (
//!     id SERIAL PRIMARY KEY,
//!     name TEXT
//! );
//!
//! CREATE TABLE todos (
//!     id SERIAL PRIMARY KEY,
//!     name TEXT,
//!     completed BOOLEAN DEFAULT false,
//!     list_id INTEGER REFERENCES lists(id)
//! );
//! ```
//!
//! Every operation is one parameterized statement. User input only ever
//! reaches the database through `bind`.

use std::fmt::Debug;

use sqlx::{pool::PoolConnection, postgres::PgPoolOptions, FromRow, PgPool, Postgres};
use todos_api::v1::{List, ListId, Todo, TodoCounts, TodoId};
use tracing::{info, Span};

use super::{Backend, Storage, StorageError, StorageResult};
use crate::session::Session;

const ALL_LISTS: &str = "
    SELECT lists.id, lists.name,
        count(todos.id) AS todos_count,
        count(nullif(todos.completed, true)) AS todos_remaining_count
    FROM lists
    LEFT JOIN todos ON todos.list_id = lists.id
    GROUP BY lists.id
    ORDER BY lists.name COLLATE \"C\";";

const FIND_LIST: &str = "
    SELECT lists.id, lists.name,
        count(todos.id) AS todos_count,
        count(nullif(todos.completed, true)) AS todos_remaining_count
    FROM lists
    LEFT JOIN todos ON todos.list_id = lists.id
    WHERE lists.id = $1
    GROUP BY lists.id;";

const CREATE_LIST: &str = "INSERT INTO lists (name) VALUES ($1);";

const RENAME_LIST: &str = "UPDATE lists SET name = $1 WHERE id = $2;";

// The todos go in the same statement so the foreign key is satisfied when
// it is checked at the end of it.
const DELETE_LIST: &str = "
    WITH removed_todos AS (DELETE FROM todos WHERE list_id = $1)
    DELETE FROM lists WHERE id = $1;";

const TODOS_FOR_LIST: &str = "SELECT id, name, completed FROM todos WHERE list_id = $1 ORDER BY id;";

const CREATE_TODO: &str = "INSERT INTO todos (name, list_id) VALUES ($1, $2);";

const UPDATE_TODO_STATUS: &str = "UPDATE todos SET completed = $1 WHERE id = $2 AND list_id = $3;";

const DELETE_TODO: &str = "DELETE FROM todos WHERE id = $1 AND list_id = $2;";

const COMPLETE_ALL_TODOS: &str = "UPDATE todos SET completed = true WHERE list_id = $1;";

#[derive(FromRow)]
struct ListRow {
    id: i32,
    name: Option<String>,
    todos_count: i64,
    todos_remaining_count: i64,
}

fn count(value: i64) -> StorageResult<usize> {
    usize::try_from(value).map_err(|_| StorageError::InvalidCount(value))
}

impl TryFrom<ListRow> for List {
    type Error = StorageError;

    fn try_from(row: ListRow) -> StorageResult<Self> {
        let counts = TodoCounts::new(count(row.todos_count)?, count(row.todos_remaining_count)?);
        Ok(List::new(row.id, row.name.unwrap_or_default(), counts))
    }
}

#[derive(FromRow)]
struct TodoRow {
    id: i32,
    name: Option<String>,
    completed: Option<bool>,
}

impl TodoRow {
    fn into_todo(self, list_id: ListId) -> Todo {
        Todo {
            id: self.id,
            list_id,
            name: self.name.unwrap_or_default(),
            completed: self.completed.unwrap_or(false),
        }
    }
}

/// Shared connection pool; each request checks out one connection.
#[derive(Clone, Debug)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Backend for PgBackend {
    type Storage = PgStorage;

    async fn open(&self, _session: &Session) -> StorageResult<PgStorage> {
        let conn = self.pool.acquire().await?;
        Ok(PgStorage::new(conn, Span::current()))
    }
}

/// One pooled connection, returned to the pool on disconnect or drop.
pub struct PgStorage {
    conn: PoolConnection<Postgres>,
    span: Span,
}

impl PgStorage {
    pub fn new(conn: PoolConnection<Postgres>, span: Span) -> Self {
        Self { conn, span }
    }

    fn log(&self, statement: &str, params: impl Debug) {
        info!(parent: &self.span, statement = statement.trim(), ?params, "executing statement");
    }
}

impl Storage for PgStorage {
    async fn all_lists(&mut self) -> StorageResult<Vec<List>> {
        self.log(ALL_LISTS, ());
        let rows: Vec<ListRow> = sqlx::query_as(ALL_LISTS)
            .fetch_all(&mut *self.conn)
            .await?;

        rows.into_iter().map(List::try_from).collect()
    }

    async fn find_list(&mut self, id: ListId) -> StorageResult<Option<List>> {
        self.log(FIND_LIST, (id,));
        let row: Option<ListRow> = sqlx::query_as(FIND_LIST)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        row.map(List::try_from).transpose()
    }

    async fn create_list(&mut self, name: &str) -> StorageResult<()> {
        self.log(CREATE_LIST, (name,));
        sqlx::query(CREATE_LIST)
            .bind(name)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn rename_list(&mut self, id: ListId, name: &str) -> StorageResult<()> {
        self.log(RENAME_LIST, (name, id));
        sqlx::query(RENAME_LIST)
            .bind(name)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn delete_list(&mut self, id: ListId) -> StorageResult<()> {
        self.log(DELETE_LIST, (id,));
        sqlx::query(DELETE_LIST)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn find_todos_for_list(&mut self, list_id: ListId) -> StorageResult<Vec<Todo>> {
        self.log(TODOS_FOR_LIST, (list_id,));
        let rows: Vec<TodoRow> = sqlx::query_as(TODOS_FOR_LIST)
            .bind(list_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows.into_iter().map(|row| row.into_todo(list_id)).collect())
    }

    async fn create_todo(&mut self, list_id: ListId, name: &str) -> StorageResult<()> {
        self.log(CREATE_TODO, (name, list_id));
        sqlx::query(CREATE_TODO)
            .bind(name)
            .bind(list_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn update_todo_status(
        &mut self,
        list_id: ListId,
        todo_id: TodoId,
        completed: bool,
    ) -> StorageResult<()> {
        self.log(UPDATE_TODO_STATUS, (completed, todo_id, list_id));
        sqlx::query(UPDATE_TODO_STATUS)
            .bind(completed)
            .bind(todo_id)
            .bind(list_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn delete_todo(&mut self, list_id: ListId, todo_id: TodoId) -> StorageResult<()> {
        self.log(DELETE_TODO, (todo_id, list_id));
        sqlx::query(DELETE_TODO)
            .bind(todo_id)
            .bind(list_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn complete_all_todos(&mut self, list_id: ListId) -> StorageResult<()> {
        self.log(COMPLETE_ALL_TODOS, (list_id,));
        sqlx::query(COMPLETE_ALL_TODOS)
            .bind(list_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn disconnect(self) {
        info!(parent: &self.span, "releasing database connection");
        drop(self.conn);
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    // Expects the tables from schema.sql to exist in $DATABASE_URL.
    async fn storage() -> PgStorage {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| String::from("postgres://localhost/todos"));
        let backend = PgBackend::connect(&url, 1).await.unwrap();
        let conn = backend.pool().acquire().await.unwrap();
        PgStorage::new(conn, Span::none())
    }

    async fn create_named_list(storage: &mut PgStorage) -> List {
        let name = format!("list-{}", Uuid::new_v4());
        storage.create_list(&name).await.unwrap();
        storage
            .all_lists()
            .await
            .unwrap()
            .into_iter()
            .find(|list| list.name == name)
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_create_list_starts_with_zero_counts() {
        let mut storage = storage().await;
        let list = create_named_list(&mut storage).await;

        assert_eq!(list.todos_count(), 0);
        assert_eq!(list.todos_remaining_count(), 0);
        assert_eq!(storage.find_list(list.id).await.unwrap(), Some(list));
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_complete_all_todos() {
        let mut storage = storage().await;
        let list = create_named_list(&mut storage).await;
        for name in ["dishes", "laundry", "vacuum"] {
            storage.create_todo(list.id, name).await.unwrap();
        }
        let first = storage.find_todos_for_list(list.id).await.unwrap()[0].id;
        storage.update_todo_status(list.id, first, true).await.unwrap();

        let before = storage.find_list(list.id).await.unwrap().unwrap();
        assert_eq!(before.todos_remaining_count(), 2);

        storage.complete_all_todos(list.id).await.unwrap();

        let after = storage.find_list(list.id).await.unwrap().unwrap();
        assert_eq!(after.todos_count(), 3);
        assert_eq!(after.todos_remaining_count(), 0);
        assert!(after.is_complete());
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_todo_updates_are_scoped_by_list() {
        let mut storage = storage().await;
        let ours = create_named_list(&mut storage).await;
        let theirs = create_named_list(&mut storage).await;
        storage.create_todo(ours.id, "mine").await.unwrap();
        let todo = storage.find_todos_for_list(ours.id).await.unwrap()[0].clone();

        storage.update_todo_status(theirs.id, todo.id, true).await.unwrap();
        storage.delete_todo(theirs.id, todo.id).await.unwrap();

        let todos = storage.find_todos_for_list(ours.id).await.unwrap();
        assert_eq!(todos, vec![todo]);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_delete_list_cascades_to_todos() {
        let mut storage = storage().await;
        let list = create_named_list(&mut storage).await;
        storage.create_todo(list.id, "Milk").await.unwrap();
        storage.create_todo(list.id, "Eggs").await.unwrap();

        storage.delete_list(list.id).await.unwrap();

        assert_eq!(storage.find_list(list.id).await.unwrap(), None);
        assert!(storage.find_todos_for_list(list.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_names_are_bound_not_interpolated() {
        let mut storage = storage().await;
        let name = format!("'); DROP TABLE lists; -- {}", Uuid::new_v4());
        storage.create_list(&name).await.unwrap();

        let lists = storage.all_lists().await.unwrap();
        assert!(lists.iter().any(|list| list.name == name));
    }
}
