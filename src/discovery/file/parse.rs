//! Job file parsing.
//!
//! Two layouts are accepted:
//! - a bare list of job configs;
//! - a mapping with a `jobs:` list, where every other top-level key is
//!   a default merged into each job.

use serde_yaml::Value;
use thiserror::Error;

use crate::jobcfg::Config;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("job entry is not a mapping")]
    JobNotMapping,

    #[error("`jobs` is not a list")]
    JobsNotList,

    #[error("unsupported layout: expected a job list or a mapping with a `jobs` list")]
    Layout,
}

/// Parse one job file's content into configs. An empty or
/// comments-only document yields an empty list, not an error.
pub fn parse_document(content: &str) -> Result<Vec<Config>, ParseError> {
    let doc: Value = serde_yaml::from_str(content)?;

    match doc {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items.into_iter().map(config_from_value).collect(),
        Value::Mapping(mut map) => {
            let jobs = match map.remove("jobs") {
                None | Some(Value::Null) => return Ok(Vec::new()),
                Some(Value::Sequence(jobs)) => jobs,
                Some(_) => return Err(ParseError::JobsNotList),
            };

            let defaults: Config = serde_yaml::from_value(Value::Mapping(map))?;
            jobs.into_iter()
                .map(|item| {
                    let mut cfg = config_from_value(item)?;
                    cfg.apply(&defaults);
                    Ok(cfg)
                })
                .collect()
        }
        _ => Err(ParseError::Layout),
    }
}

fn config_from_value(value: Value) -> Result<Config, ParseError> {
    match value {
        Value::Mapping(_) => Ok(serde_yaml::from_value(value)?),
        _ => Err(ParseError::JobNotMapping),
    }
}
