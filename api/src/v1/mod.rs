use serde::{Deserialize, Serialize};

pub type ListId = i32;
pub type TodoId = i32;

/// Completion counters derived from a list's todos.
///
/// Both storage backends produce these through [`TodoCounts::tally`] or
/// [`TodoCounts::new`], so completion is computed the same way everywhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TodoCounts {
    pub todos_count: usize,
    pub todos_remaining_count: usize,
}

impl TodoCounts {
    /// Remaining is clamped to the total.
    pub fn new(todos_count: usize, todos_remaining_count: usize) -> Self {
        Self {
            todos_count,
            todos_remaining_count: todos_remaining_count.min(todos_count),
        }
    }

    pub fn tally(completed: impl IntoIterator<Item = bool>) -> Self {
        completed
            .into_iter()
            .fold(Self::default(), |counts, completed| Self {
                todos_count: counts.todos_count + 1,
                todos_remaining_count: counts.todos_remaining_count + usize::from(!completed),
            })
    }

    pub fn is_complete(&self) -> bool {
        self.todos_count > 0 && self.todos_remaining_count == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub id: ListId,
    pub name: String,
    #[serde(flatten)]
    pub counts: TodoCounts,
}

impl List {
    pub fn new(id: ListId, name: impl Into<String>, counts: TodoCounts) -> Self {
        Self {
            id,
            name: name.into(),
            counts,
        }
    }

    pub fn todos_count(&self) -> usize {
        self.counts.todos_count
    }

    pub fn todos_remaining_count(&self) -> usize {
        self.counts.todos_remaining_count
    }

    pub fn is_complete(&self) -> bool {
        self.counts.is_complete()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub list_id: ListId,
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

impl Todo {
    pub fn new(id: TodoId, list_id: ListId, name: impl Into<String>) -> Self {
        Self {
            id,
            list_id,
            name: name.into(),
            completed: false,
        }
    }
}

/// Orders lists for display: incomplete lists first, then complete ones.
/// Each group keeps its incoming order.
pub fn sort_lists(lists: Vec<List>) -> Vec<List> {
    let (complete, mut incomplete): (Vec<_>, Vec<_>) =
        lists.into_iter().partition(List::is_complete);
    incomplete.extend(complete);
    incomplete
}

/// Orders todos for display: open todos first, then completed ones.
pub fn sort_todos(todos: Vec<Todo>) -> Vec<Todo> {
    let (complete, mut incomplete): (Vec<_>, Vec<_>) =
        todos.into_iter().partition(|todo| todo.completed);
    incomplete.extend(complete);
    incomplete
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewList {
    pub list_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenameList {
    pub list_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTodo {
    pub todo_name: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TodoStatusUpdate {
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDetail {
    pub list: List,
    pub todos: Vec<Todo>,
}

/// Success message returned by mutating routes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body for validation failures, missing lists and backend faults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub error: String,
}

impl Problem {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
