//! SpreadsheetBench harness.
//!
//! - [`BenchmarkRunner`] runs the agent over every task of a dataset and
//!   appends one record per task to an [`ExecutionLog`]
//! - [`Evaluator`] scores the produced workbooks through a
//!   [`WorkbookComparator`]

mod dataset;
mod evaluate;
mod log;
mod runner;

pub use dataset::{output_path, safe_model, setting_name, BenchTask, Dataset};
pub use evaluate::{
    CategoryStats, CommandComparator, EvaluationRecord, EvaluationReport, Evaluator,
    WorkbookComparator,
};
pub use log::{BenchmarkTaskRecord, ExecutionLog, TaskStatus, TestCaseOutcome};
pub use runner::{BenchmarkOptions, BenchmarkRunner, RunSummary};
