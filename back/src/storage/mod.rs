//! Persistence for lists and todos.
//!
//! A [`Backend`] is built once at startup and opens one [`Storage`] handle
//! per request. Handlers are generic over the backend and never look at which
//! variant they are talking to.

mod postgres;
mod session;

use std::future::Future;

use todos_api::v1::{List, ListId, Todo, TodoId};

use crate::session::Session;

pub use postgres::{PgBackend, PgStorage};
pub use session::{SessionBackend, SessionStorage, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("count out of range: {0}")]
    InvalidCount(i64),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Opens a storage handle for a single request.
pub trait Backend: Clone + Send + Sync + 'static {
    type Storage: Storage;

    fn open(&self, session: &Session) -> impl Future<Output = StorageResult<Self::Storage>> + Send;
}

/// The operations every backend offers.
///
/// Mutations on ids that do not exist are silent no-ops. Names are expected
/// to be validated by the caller.
pub trait Storage: Send {
    /// All lists with their counts, sorted by name.
    fn all_lists(&mut self) -> impl Future<Output = StorageResult<Vec<List>>> + Send;

    /// `None` when no list has this id.
    fn find_list(&mut self, id: ListId) -> impl Future<Output = StorageResult<Option<List>>> + Send;

    fn create_list(&mut self, name: &str) -> impl Future<Output = StorageResult<()>> + Send;

    fn rename_list(
        &mut self,
        id: ListId,
        name: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Removes the list together with all of its todos.
    fn delete_list(&mut self, id: ListId) -> impl Future<Output = StorageResult<()>> + Send;

    /// Todos in creation order; empty when the list does not exist.
    fn find_todos_for_list(
        &mut self,
        list_id: ListId,
    ) -> impl Future<Output = StorageResult<Vec<Todo>>> + Send;

    fn create_todo(
        &mut self,
        list_id: ListId,
        name: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Only touches the todo when both ids match.
    fn update_todo_status(
        &mut self,
        list_id: ListId,
        todo_id: TodoId,
        completed: bool,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Only touches the todo when both ids match.
    fn delete_todo(
        &mut self,
        list_id: ListId,
        todo_id: TodoId,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    fn complete_all_todos(&mut self, list_id: ListId)
        -> impl Future<Output = StorageResult<()>> + Send;

    /// Releases whatever the handle holds. Called once at the end of every request.
    fn disconnect(self) -> impl Future<Output = ()> + Send;
}
