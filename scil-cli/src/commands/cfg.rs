use std::path::Path;

use scil::{ir::Method, Analyzer};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{load_module, resolve_single_method},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct CfgBlockOutput {
    id: usize,
    offset: u32,
    handler: Option<String>,
    predecessors: Vec<usize>,
    successors: Vec<usize>,
    entry_depth: Option<usize>,
    exit_depth: Option<usize>,
    node_count: usize,
}

#[derive(Debug, Serialize)]
struct CfgOutput {
    method: String,
    block_count: usize,
    annotated: bool,
    blocks: Vec<CfgBlockOutput>,
}

pub fn run(path: &Path, method_filter: &str, opts: &GlobalOptions) -> anyhow::Result<()> {
    let module = load_module(path)?;
    let body = resolve_single_method(&module, method_filter)?;

    // Depths come from the stack analyzer; show the bare CFG when it rejects the method.
    let (method, annotated) = match Analyzer::default().prepare(body) {
        Ok(method) => (method, true),
        Err(error) => {
            log::warn!("stack analysis failed, depths unavailable: {error}");
            (Method::build(body)?, false)
        }
    };

    let output = CfgOutput {
        method: method.name().to_string(),
        block_count: method.block_count(),
        annotated,
        blocks: method
            .blocks()
            .iter()
            .map(|block| CfgBlockOutput {
                id: block.id().index(),
                offset: block.offset(),
                handler: block.handler().map(|kind| format!("{kind:?}").to_lowercase()),
                predecessors: block.sources().iter().map(|id| id.index()).collect(),
                successors: block.targets().iter().map(|id| id.index()).collect(),
                entry_depth: block.entry_depth(),
                exit_depth: block.exit_depth(),
                node_count: block.len(),
            })
            .collect(),
    };

    print_output(&output, opts, print_text)
}

fn block_list(ids: &[usize]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter()
        .map(|id| format!("B{id}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn depth(value: Option<usize>) -> String {
    value.map_or_else(|| "?".to_string(), |depth| depth.to_string())
}

fn print_text(output: &CfgOutput) {
    println!("Control flow graph for {}", output.method);
    println!("Blocks: {}", output.block_count);
    println!();

    let mut table = TabWriter::new(&[
        ("Block", Align::Left),
        ("Offset", Align::Left),
        ("Handler", Align::Left),
        ("Preds", Align::Left),
        ("Succs", Align::Left),
        ("In", Align::Right),
        ("Out", Align::Right),
        ("Nodes", Align::Right),
    ]);
    for block in &output.blocks {
        table.row(vec![
            format!("B{}", block.id),
            format!("IL_{:04x}", block.offset),
            block.handler.clone().unwrap_or_else(|| "-".to_string()),
            block_list(&block.predecessors),
            block_list(&block.successors),
            depth(block.entry_depth),
            depth(block.exit_depth),
            block.node_count.to_string(),
        ]);
    }
    table.print();
}
