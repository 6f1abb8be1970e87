use anyhow::{Context, Result};
use flagtree::{Parser, ParserOptions};
use flagtree_schema::SchemaV1;
use std::fs;
use std::path::Path;

pub fn read_schema(path: &Path) -> Result<SchemaV1> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let doc = flagtree_schema::from_json(&bytes)
        .with_context(|| format!("invalid schema {}", path.display()))?;
    tracing::debug!(schema = %path.display(), command = %doc.command.name, "schema loaded");
    Ok(doc)
}

/// Options from `--config` win over options embedded in the schema.
pub fn read_options(doc: &SchemaV1, config: Option<&Path>) -> Result<ParserOptions> {
    let Some(path) = config else {
        return Ok(doc.options.clone().unwrap_or_default());
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
}

pub fn build_parser(schema: &Path, config: Option<&Path>) -> Result<Parser> {
    let doc = read_schema(schema)?;
    let options = read_options(&doc, config)?;
    let command = doc.command.build()?;
    Ok(Parser::with_options(command, options)?)
}

/// The process environment, overlaid with the entries of a dotenv file.
pub fn environment(env_file: Option<&Path>) -> Result<Vec<(String, String)>> {
    let mut env: Vec<(String, String)> = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect();

    if let Some(path) = env_file {
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("invalid entry in {}", path.display()))?;
            env.retain(|(k, _)| *k != key);
            env.push((key, value));
        }
    }
    Ok(env)
}
