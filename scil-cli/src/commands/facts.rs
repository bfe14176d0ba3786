use std::path::Path;

use anyhow::bail;
use scil::{facts::Fact, Analyzer};
use serde::Serialize;

use crate::{
    app::{AnalysisOptions, GlobalOptions},
    commands::common::{load_module, resolve_methods},
    output::print_output,
};

#[derive(Debug, Serialize)]
struct MethodFacts<'a> {
    method: &'a str,
    facts: &'a [Fact],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct FactsOutput<'a> {
    module: &'a str,
    analysed: usize,
    failed: usize,
    methods: Vec<MethodFacts<'a>>,
}

pub fn run(
    path: &Path,
    method_filter: Option<&str>,
    analysis: &AnalysisOptions,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let mut module = load_module(path)?;

    if let Some(filter) = method_filter {
        let selected: Vec<String> = resolve_methods(&module, filter)
            .into_iter()
            .map(|method| method.name.clone())
            .collect();
        if selected.is_empty() {
            bail!("no methods matching '{filter}' found");
        }
        module.methods.retain(|method| selected.contains(&method.name));
    }

    let report = Analyzer::new(analysis.config()).analyze_module(&module);

    let output = FactsOutput {
        module: &report.name,
        analysed: report.succeeded(),
        failed: report.failures().count(),
        methods: report
            .methods
            .iter()
            .map(|method| MethodFacts {
                method: &method.method,
                facts: method.facts(),
                error: method.error().map(ToString::to_string),
            })
            .collect(),
    };

    print_output(&output, opts, |_| {
        print!("{}", report.to_text());
    })?;

    log::info!(
        "{}: {} facts from {} of {} methods",
        report.name,
        report.facts().count(),
        output.analysed,
        report.methods.len()
    );
    Ok(())
}
