//! One-line summaries of a finished request.

use vizlink_core::{ExchangeStats, TaskResult};

pub fn summarize(result: &TaskResult) -> String {
    match result {
        TaskResult::Empty => "empty".into(),
        TaskResult::Data(block) => match block.format() {
            Some(format) if block.columns().is_empty() => {
                let mut line = format!(
                    "{format} from {}: {} bytes",
                    block.task_type(),
                    block.bytes().len()
                );
                if let Some(path) = block.path() {
                    line.push_str(&format!(", save to {path}"));
                }
                line
            }
            _ => {
                let columns: Vec<&str> = block
                    .columns()
                    .iter()
                    .map(|c| c.column_name.as_str())
                    .collect();
                format!(
                    "data from {}: {} bytes, columns: [{}]",
                    block.task_type(),
                    block.bytes().len(),
                    columns.join(", ")
                )
            }
        },
        TaskResult::Plot(plot) => format!(
            "plot: {} ({} of {})",
            plot.name().unwrap_or("<unnamed>"),
            plot.plot_type().unwrap_or("?"),
            plot.dataset_name().unwrap_or("?")
        ),
        TaskResult::DataSet(name) => format!("dataset loaded as '{name}'"),
    }
}

pub fn summarize_exchange(stats: &ExchangeStats) -> String {
    match stats.reconnects {
        0 => format!("{} attempt(s)", stats.attempts),
        n => format!("{} attempt(s), {n} reconnect(s)", stats.attempts),
    }
}
