use std::{collections::BTreeMap, path::Path};

use scil::{AnalysisConfig, Analyzer};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_module,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct CountOutput {
    methods: usize,
    failed: usize,
    total: u64,
    modules: BTreeMap<String, u64>,
}

pub fn run(path: &Path, sequential: bool, opts: &GlobalOptions) -> anyhow::Result<()> {
    let module = load_module(path)?;
    let analyzer = Analyzer::new(
        AnalysisConfig::default()
            .with_count_instructions(true)
            .with_parallel(!sequential),
    );
    let report = analyzer.analyze_module(&module);

    let output = CountOutput {
        methods: report.methods.len(),
        failed: report.failures().count(),
        total: analyzer.counter().total(),
        modules: analyzer.counter().snapshot(),
    };

    print_output(&output, opts, |output| {
        let mut table = TabWriter::new(&[("Module", Align::Left), ("Instructions", Align::Right)]);
        for (name, count) in &output.modules {
            table.row(vec![name.clone(), count.to_string()]);
        }
        table.print();
        println!();
        println!(
            "{} instructions in {} of {} methods",
            output.total,
            output.methods - output.failed,
            output.methods
        );
    })
}
