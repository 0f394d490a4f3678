use std::error::Error;
use std::fs;
use std::path::Path;
use tracing::debug;
use yaml_rust2::{Yaml, YamlEmitter, YamlLoader};

const INCLUDE_DIRECTIVE: &str = "!include";

/// Loads a YAML document, resolving `!include <relative path>` lines first.
///
/// Included documents are merged in order, then the including document is
/// merged on top, so local keys override included ones.
pub fn load_yaml_with_includes(path: &Path) -> Result<Yaml, Box<dyn Error + Send + Sync>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
    let base_path = path.parent().unwrap_or(Path::new(""));

    let (includes, rest): (Vec<&str>, Vec<&str>) = contents
        .lines()
        .partition(|line| line.trim_start().starts_with(INCLUDE_DIRECTIVE));

    let mut merged_includes: Option<Yaml> = None;
    for line in includes {
        let include_path = line.trim_start()[INCLUDE_DIRECTIVE.len()..].trim();
        debug!(include = include_path, parent = %path.display(), "Resolving config include");
        let included = load_yaml_with_includes(&base_path.join(include_path))?;
        merged_includes = Some(match merged_includes {
            Some(acc) => merge_yaml(&acc, &included),
            None => included,
        });
    }

    let local = YamlLoader::load_from_str(&rest.join("\n"))?
        .into_iter()
        .reduce(|acc, doc| merge_yaml(&acc, &doc))
        .unwrap_or(Yaml::Hash(Default::default()));

    Ok(match merged_includes {
        Some(base) => merge_yaml(&base, &local),
        None => local,
    })
}

/// Renders a resolved document back to YAML text.
pub fn emit_yaml(doc: &Yaml) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = String::new();
    YamlEmitter::new(&mut out).dump(doc)?;
    Ok(out)
}

fn merge_yaml(base: &Yaml, override_yaml: &Yaml) -> Yaml {
    match (base, override_yaml) {
        (Yaml::Hash(base_hash), Yaml::Hash(override_hash)) => {
            let mut result = base_hash.clone();
            for (key, value) in override_hash {
                let merged = match base_hash.get(key) {
                    Some(base_value) => merge_yaml(base_value, value),
                    None => value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Yaml::Hash(result)
        }
        (_, override_value) => override_value.clone(),
    }
}
