//! Lists kept inside the browser session.
//!
//! Every session owns its own [`SessionStore`]; nothing is shared between
//! sessions and everything is dropped with the session. Ids are one past the
//! current maximum (or 1), lists and todos each numbered separately.

use todos_api::v1::{List, ListId, Todo, TodoCounts, TodoId};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, Span};

use super::{Backend, Storage, StorageResult};
use crate::session::Session;

#[derive(Clone, Debug)]
struct StoredList {
    id: ListId,
    name: String,
    todos: Vec<Todo>,
}

impl StoredList {
    fn summary(&self) -> List {
        let counts = TodoCounts::tally(self.todos.iter().map(|todo| todo.completed));
        List::new(self.id, self.name.clone(), counts)
    }
}

fn next_id(ids: impl Iterator<Item = i32>) -> i32 {
    ids.max().map_or(1, |max| max + 1)
}

/// The list collection of one session.
#[derive(Debug, Default)]
pub struct SessionStore {
    lists: Vec<StoredList>,
}

impl SessionStore {
    fn list(&self, id: ListId) -> Option<&StoredList> {
        self.lists.iter().find(|list| list.id == id)
    }

    fn list_mut(&mut self, id: ListId) -> Option<&mut StoredList> {
        self.lists.iter_mut().find(|list| list.id == id)
    }

    pub fn all_lists(&self) -> Vec<List> {
        let mut lists: Vec<_> = self.lists.iter().map(StoredList::summary).collect();
        lists.sort_by(|a, b| a.name.cmp(&b.name));
        lists
    }

    pub fn find_list(&self, id: ListId) -> Option<List> {
        self.list(id).map(StoredList::summary)
    }

    pub fn create_list(&mut self, name: &str) -> ListId {
        let id = next_id(self.lists.iter().map(|list| list.id));
        self.lists.push(StoredList {
            id,
            name: name.to_owned(),
            todos: Vec::new(),
        });
        id
    }

    pub fn rename_list(&mut self, id: ListId, name: &str) {
        if let Some(list) = self.list_mut(id) {
            list.name = name.to_owned();
        }
    }

    pub fn delete_list(&mut self, id: ListId) {
        self.lists.retain(|list| list.id != id);
    }

    pub fn todos_for_list(&self, list_id: ListId) -> Vec<Todo> {
        self.list(list_id)
            .map(|list| list.todos.clone())
            .unwrap_or_default()
    }

    pub fn create_todo(&mut self, list_id: ListId, name: &str) -> Option<TodoId> {
        let list = self.list_mut(list_id)?;
        let id = next_id(list.todos.iter().map(|todo| todo.id));
        list.todos.push(Todo::new(id, list_id, name));
        Some(id)
    }

    pub fn update_todo_status(&mut self, list_id: ListId, todo_id: TodoId, completed: bool) {
        let todo = self
            .list_mut(list_id)
            .and_then(|list| list.todos.iter_mut().find(|todo| todo.id == todo_id));

        if let Some(todo) = todo {
            todo.completed = completed;
        }
    }

    pub fn delete_todo(&mut self, list_id: ListId, todo_id: TodoId) {
        if let Some(list) = self.list_mut(list_id) {
            list.todos.retain(|todo| todo.id != todo_id);
        }
    }

    pub fn complete_all_todos(&mut self, list_id: ListId) {
        if let Some(list) = self.list_mut(list_id) {
            list.todos.iter_mut().for_each(|todo| todo.completed = true);
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SessionBackend;

impl Backend for SessionBackend {
    type Storage = SessionStorage;

    async fn open(&self, session: &Session) -> StorageResult<SessionStorage> {
        let store = session.store().lock_owned().await;
        Ok(SessionStorage::new(store, Span::current()))
    }
}

/// Holds the session's store locked for the duration of a request.
pub struct SessionStorage {
    store: OwnedMutexGuard<SessionStore>,
    span: Span,
}

impl SessionStorage {
    pub fn new(store: OwnedMutexGuard<SessionStore>, span: Span) -> Self {
        Self { store, span }
    }
}

impl Storage for SessionStorage {
    async fn all_lists(&mut self) -> StorageResult<Vec<List>> {
        Ok(self.store.all_lists())
    }

    async fn find_list(&mut self, id: ListId) -> StorageResult<Option<List>> {
        Ok(self.store.find_list(id))
    }

    async fn create_list(&mut self, name: &str) -> StorageResult<()> {
        info!(parent: &self.span, name, "creating list");
        let id = self.store.create_list(name);
        debug!(parent: &self.span, list_id = id, "assigned list id");
        Ok(())
    }

    async fn rename_list(&mut self, id: ListId, name: &str) -> StorageResult<()> {
        info!(parent: &self.span, list_id = id, name, "renaming list");
        self.store.rename_list(id, name);
        Ok(())
    }

    async fn delete_list(&mut self, id: ListId) -> StorageResult<()> {
        info!(parent: &self.span, list_id = id, "deleting list");
        self.store.delete_list(id);
        Ok(())
    }

    async fn find_todos_for_list(&mut self, list_id: ListId) -> StorageResult<Vec<Todo>> {
        Ok(self.store.todos_for_list(list_id))
    }

    async fn create_todo(&mut self, list_id: ListId, name: &str) -> StorageResult<()> {
        info!(parent: &self.span, list_id, name, "creating todo");
        if let Some(todo_id) = self.store.create_todo(list_id, name) {
            debug!(parent: &self.span, list_id, todo_id, "assigned todo id");
        }
        Ok(())
    }

    async fn update_todo_status(
        &mut self,
        list_id: ListId,
        todo_id: TodoId,
        completed: bool,
    ) -> StorageResult<()> {
        info!(parent: &self.span, list_id, todo_id, completed, "updating todo status");
        self.store.update_todo_status(list_id, todo_id, completed);
        Ok(())
    }

    async fn delete_todo(&mut self, list_id: ListId, todo_id: TodoId) -> StorageResult<()> {
        info!(parent: &self.span, list_id, todo_id, "deleting todo");
        self.store.delete_todo(list_id, todo_id);
        Ok(())
    }

    async fn complete_all_todos(&mut self, list_id: ListId) -> StorageResult<()> {
        info!(parent: &self.span, list_id, "completing all todos");
        self.store.complete_all_todos(list_id);
        Ok(())
    }

    async fn disconnect(self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;

    async fn storage() -> SessionStorage {
        let store = Arc::new(Mutex::new(SessionStore::default()));
        SessionStorage::new(store.lock_owned().await, Span::none())
    }

    async fn list_id(storage: &mut SessionStorage, name: &str) -> ListId {
        let lists = storage.all_lists().await.unwrap();
        lists.iter().find(|list| list.name == name).unwrap().id
    }

    #[tokio::test]
    async fn created_list_starts_empty() {
        let mut storage = storage().await;
        storage.create_list("Groceries").await.unwrap();

        let lists = storage.all_lists().await.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].name, "Groceries");
        assert_eq!(lists[0].todos_count(), 0);
        assert_eq!(lists[0].todos_remaining_count(), 0);
        assert!(!lists[0].is_complete());
    }

    #[tokio::test]
    async fn all_lists_sorted_by_name() {
        let mut storage = storage().await;
        for name in ["Work", "Chores", "Errands"] {
            storage.create_list(name).await.unwrap();
        }

        let names: Vec<_> = storage
            .all_lists()
            .await
            .unwrap()
            .into_iter()
            .map(|list| list.name)
            .collect();
        assert_eq!(names, ["Chores", "Errands", "Work"]);
    }

    #[tokio::test]
    async fn find_missing_list_is_none() {
        let mut storage = storage().await;
        assert_eq!(storage.find_list(42).await.unwrap(), None);
        assert!(storage.find_todos_for_list(42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_ids_are_not_reused() {
        let mut storage = storage().await;
        storage.create_list("A").await.unwrap();
        storage.create_list("B").await.unwrap();
        assert_eq!(list_id(&mut storage, "A").await, 1);
        assert_eq!(list_id(&mut storage, "B").await, 2);

        storage.delete_list(1).await.unwrap();
        storage.create_list("C").await.unwrap();
        assert_eq!(list_id(&mut storage, "C").await, 3);
    }

    #[tokio::test]
    async fn todo_ids_are_scoped_per_list() {
        let mut storage = storage().await;
        storage.create_list("A").await.unwrap();
        storage.create_list("B").await.unwrap();
        storage.create_todo(1, "first").await.unwrap();
        storage.create_todo(1, "second").await.unwrap();
        storage.create_todo(2, "other").await.unwrap();

        let ids: Vec<_> = storage
            .find_todos_for_list(1)
            .await
            .unwrap()
            .iter()
            .map(|todo| todo.id)
            .collect();
        assert_eq!(ids, [1, 2]);
        assert_eq!(storage.find_todos_for_list(2).await.unwrap()[0].id, 1);
    }

    #[tokio::test]
    async fn todo_on_missing_list_is_ignored() {
        let mut storage = storage().await;
        storage.create_todo(9, "orphan").await.unwrap();
        assert!(storage.find_todos_for_list(9).await.unwrap().is_empty());
        assert!(storage.all_lists().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_list_drops_its_todos() {
        let mut storage = storage().await;
        storage.create_list("Groceries").await.unwrap();
        storage.create_todo(1, "Milk").await.unwrap();
        storage.create_todo(1, "Eggs").await.unwrap();

        storage.delete_list(1).await.unwrap();

        assert!(storage.find_todos_for_list(1).await.unwrap().is_empty());
        assert_eq!(storage.find_list(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn status_update_is_scoped_by_list() {
        let mut storage = storage().await;
        storage.create_list("One").await.unwrap();
        storage.create_list("Two").await.unwrap();
        for _ in 0..5 {
            storage.create_todo(1, "mine").await.unwrap();
            storage.create_todo(2, "theirs").await.unwrap();
        }

        storage.update_todo_status(1, 5, true).await.unwrap();

        let ours = storage.find_todos_for_list(1).await.unwrap();
        let theirs = storage.find_todos_for_list(2).await.unwrap();
        assert!(ours.iter().find(|todo| todo.id == 5).unwrap().completed);
        assert!(theirs.iter().all(|todo| !todo.completed));
    }

    #[tokio::test]
    async fn delete_todo_is_scoped_by_list() {
        let mut storage = storage().await;
        storage.create_list("One").await.unwrap();
        storage.create_list("Two").await.unwrap();
        storage.create_todo(1, "mine").await.unwrap();
        storage.create_todo(2, "theirs").await.unwrap();

        storage.delete_todo(2, 1).await.unwrap();

        assert_eq!(storage.find_todos_for_list(1).await.unwrap().len(), 1);
        assert!(storage.find_todos_for_list(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn complete_all_marks_every_todo() {
        let mut storage = storage().await;
        storage.create_list("Chores").await.unwrap();
        for name in ["dishes", "laundry", "vacuum"] {
            storage.create_todo(1, name).await.unwrap();
        }
        storage.update_todo_status(1, 1, true).await.unwrap();

        let before = storage.find_list(1).await.unwrap().unwrap();
        assert_eq!(before.todos_remaining_count(), 2);

        storage.complete_all_todos(1).await.unwrap();

        let after = storage.find_list(1).await.unwrap().unwrap();
        assert_eq!(after.todos_count(), 3);
        assert_eq!(after.todos_remaining_count(), 0);
        assert!(after.is_complete());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).lines().map(String::from).collect()
        }
    }

    #[tokio::test]
    async fn creation_logs_arguments_before_assigned_id() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut storage = storage().await;
        storage.create_list("Groceries").await.unwrap();
        storage.create_todo(1, "Milk").await.unwrap();

        let lines = captured.lines();
        let position = |needle: &str| {
            lines
                .iter()
                .position(|line| line.contains(needle))
                .unwrap_or_else(|| panic!("no log line with {needle:?} in {lines:#?}"))
        };

        assert!(lines[position("creating list")].contains("Groceries"));
        assert!(position("creating list") < position("assigned list id"));
        assert!(lines[position("creating todo")].contains("Milk"));
        assert!(position("creating todo") < position("assigned todo id"));
    }

    #[tokio::test]
    async fn rename_missing_list_is_a_no_op() {
        let mut storage = storage().await;
        storage.create_list("Keep").await.unwrap();
        storage.rename_list(7, "Other").await.unwrap();

        let lists = storage.all_lists().await.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].name, "Keep");
    }
}
