//! Name checks for lists and todos.
//!
//! Invalid input is an expected outcome: each check yields the message to
//! show, or `None` when the name is acceptable. Length is checked first.

use crate::storage::{Storage, StorageResult};

const NAME_LENGTH: std::ops::RangeInclusive<usize> = 1..=100;

fn has_valid_length(name: &str) -> bool {
    NAME_LENGTH.contains(&name.trim().chars().count())
}

/// Validates a list name against length and against every existing list name.
pub async fn error_for_list_name<S: Storage>(
    storage: &mut S,
    name: &str,
) -> StorageResult<Option<String>> {
    if !has_valid_length(name) {
        return Ok(Some(String::from(
            "List name must be between 1 and 100 characters.",
        )));
    }

    let name = name.trim();
    let lists = storage.all_lists().await?;

    if lists.iter().any(|list| list.name == name) {
        return Ok(Some(String::from("List name must be unique.")));
    }

    Ok(None)
}

pub fn error_for_todo_name(name: &str) -> Option<String> {
    if !has_valid_length(name) {
        return Some(String::from(
            "Todo name must be between 1 and 100 characters.",
        ));
    }

    None
}
