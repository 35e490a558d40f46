//! Reading task lists.

use serde_json::Value;
use vizlink_core::{Error, Result, Task, task_from_value};

/// Parse a JSON array of task objects. A single object is one task.
pub fn parse_tasks(text: &str) -> Result<Vec<Task>> {
    match serde_json::from_str(text)? {
        Value::Array(items) => items.into_iter().map(task_from_value).collect(),
        Value::Object(task) => Ok(vec![task]),
        _ => Err(Error::Config(
            "task list must be a JSON array of objects".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_keeps_order() {
        let tasks = parse_tasks(r#"[{"TaskType":"Filter"},{"TaskType":"Plot"}]"#).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1]["TaskType"], "Plot");
    }

    #[test]
    fn single_object_is_one_task() {
        assert_eq!(parse_tasks(r#"{"TaskType":"Insights"}"#).unwrap().len(), 1);
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(parse_tasks("[1]"), Err(Error::Config(_))));
        assert!(matches!(parse_tasks("\"x\""), Err(Error::Config(_))));
        assert!(matches!(parse_tasks("{"), Err(Error::Serialization(_))));
    }

    #[test]
    fn empty_array_is_allowed() {
        assert!(parse_tasks("[]").unwrap().is_empty());
    }
}
