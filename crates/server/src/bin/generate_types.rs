//! Writes the TypeScript declarations shared with the board UI.
//!
//! Usage: `generate_types [OUTPUT]`, defaulting to `shared/types.ts` at the
//! workspace root. With `--check` the file is compared instead of written.

use std::path::PathBuf;

use anyhow::{Context, bail};
use db::{
    models::{
        board::{Board, BoardWithColumns, ColumnWithTaskIds, CreateBoard, UpdateBoard},
        column::{Column, CreateColumn, MoveColumn, UpdateColumn},
        task::{CreateTask, MoveTask, Task, UpdateTask},
    },
    position::{MoveStrategy, PositionUpdate, Slot},
};
use server::routes::{
    boards::ColumnPositionsRequest,
    columns::{TaskCountResponse, TaskPositionsRequest},
    tasks::{DateRangeQuery, SearchQuery},
};
use ts_rs::TS;
use utils::response::ApiResponse;

fn generate_types_content() -> String {
    let decls = [
        Board::decl(),
        CreateBoard::decl(),
        UpdateBoard::decl(),
        BoardWithColumns::decl(),
        ColumnWithTaskIds::decl(),
        Column::decl(),
        CreateColumn::decl(),
        UpdateColumn::decl(),
        MoveColumn::decl(),
        Task::decl(),
        CreateTask::decl(),
        UpdateTask::decl(),
        MoveTask::decl(),
        PositionUpdate::decl(),
        Slot::decl(),
        MoveStrategy::decl(),
        ColumnPositionsRequest::decl(),
        TaskPositionsRequest::decl(),
        TaskCountResponse::decl(),
        SearchQuery::decl(),
        DateRangeQuery::decl(),
        ApiResponse::<()>::decl(),
    ];

    let body = decls
        .iter()
        .map(|decl| format!("export {}", decl.trim_start_matches("export ")))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("// This file was generated by `generate_types`. Do not edit.\n\n{body}\n")
}

fn main() -> anyhow::Result<()> {
    let mut check = false;
    let mut output = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check" => check = true,
            _ => output = Some(PathBuf::from(arg)),
        }
    }
    let output = output.unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared/types.ts")
    });

    let content = generate_types_content();

    if check {
        let current = std::fs::read_to_string(&output)
            .with_context(|| format!("reading {}", output.display()))?;
        if current != content {
            bail!("{} is out of date, run generate_types", output.display());
        }
        println!("{} is up to date", output.display());
        return Ok(());
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&output, content).with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}
