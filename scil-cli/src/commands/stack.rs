use std::path::Path;

use scil::{
    assembly::Operand,
    ir::{Node, StackName},
    Analyzer,
};
use serde::Serialize;

use crate::{
    app::{AnalysisOptions, GlobalOptions},
    commands::common::{load_module, resolve_single_method},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct NodeOutput {
    id: String,
    offset: Option<u32>,
    instruction: String,
    pops: Vec<String>,
    pushes: Vec<String>,
    binding: Option<String>,
}

#[derive(Debug, Serialize)]
struct BlockOutput {
    id: usize,
    entry_depth: Option<usize>,
    nodes: Vec<NodeOutput>,
}

#[derive(Debug, Serialize)]
struct StackOutput {
    method: String,
    blocks: Vec<BlockOutput>,
}

fn names(names: &[StackName]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn instruction(node: &Node) -> String {
    if let Some(phi) = node.phi() {
        let parents: Vec<String> = phi.parents().iter().map(ToString::to_string).collect();
        return format!("phi({})", parents.join(", "));
    }
    match (node.opcode(), node.operand()) {
        (Some(opcode), Some(Operand::None) | None) => opcode.to_string(),
        (Some(opcode), Some(operand)) => format!("{opcode} {operand}"),
        (None, _) => String::new(),
    }
}

pub fn run(
    path: &Path,
    method_filter: &str,
    analysis: &AnalysisOptions,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let module = load_module(path)?;
    let body = resolve_single_method(&module, method_filter)?;
    let method = Analyzer::new(analysis.config()).prepare(body)?;

    let output = StackOutput {
        method: method.name().to_string(),
        blocks: method
            .blocks()
            .iter()
            .map(|block| BlockOutput {
                id: block.id().index(),
                entry_depth: block.entry_depth(),
                nodes: block
                    .nodes()
                    .iter()
                    .map(|node| NodeOutput {
                        id: node.id().to_string(),
                        offset: node.offset(),
                        instruction: instruction(node),
                        pops: names(node.pop_names()),
                        pushes: names(node.push_names()),
                        binding: node.binding().map(str::to_string),
                    })
                    .collect(),
            })
            .collect(),
    };

    print_output(&output, opts, print_text)
}

fn print_text(output: &StackOutput) {
    println!("Stack names for {}", output.method);
    for block in &output.blocks {
        println!();
        match block.entry_depth {
            Some(depth) => println!("B{} (entry depth {depth}):", block.id),
            None => println!("B{} (unreachable):", block.id),
        }

        let mut table = TabWriter::new(&[
            ("Node", Align::Left),
            ("Offset", Align::Left),
            ("Instruction", Align::Left),
            ("Pops", Align::Left),
            ("Pushes", Align::Left),
            ("Binding", Align::Left),
        ])
        .indent("  ");
        for node in &block.nodes {
            table.row(vec![
                node.id.clone(),
                node.offset
                    .map_or_else(|| "-".to_string(), |offset| format!("IL_{offset:04x}")),
                node.instruction.clone(),
                node.pops.join(", "),
                node.pushes.join(", "),
                node.binding.clone().unwrap_or_default(),
            ]);
        }
        table.print();
    }
}
