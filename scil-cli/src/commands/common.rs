use std::{fs::File, io::BufReader, path::Path};

use anyhow::{bail, Context};
use scil::assembly::{MethodBody, ModuleBody};

/// Load a module from its JSON interchange file.
pub fn load_module(path: &Path) -> anyhow::Result<ModuleBody> {
    let file =
        File::open(path).with_context(|| format!("failed to open module: {}", path.display()))?;
    ModuleBody::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to load module: {}", path.display()))
}

/// Case-insensitive substring match.
pub fn name_contains_ignore_case(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

/// Find the methods whose name contains `filter`.
pub fn resolve_methods<'a>(module: &'a ModuleBody, filter: &str) -> Vec<&'a MethodBody> {
    module
        .methods
        .iter()
        .filter(|method| name_contains_ignore_case(&method.name, filter))
        .collect()
}

/// Resolve a single method, preferring an exact name and bailing on zero or several matches.
pub fn resolve_single_method<'a>(
    module: &'a ModuleBody,
    filter: &str,
) -> anyhow::Result<&'a MethodBody> {
    if let Some(method) = module.method(filter) {
        return Ok(method);
    }
    match resolve_methods(module, filter).as_slice() {
        [] => bail!("no methods matching '{filter}' found"),
        [method] => Ok(*method),
        many => bail!(
            "{} methods match '{filter}'; narrow the filter (e.g. Type::Method or the full signature)",
            many.len()
        ),
    }
}
