//! `configuration.yaml` loading
//!
//! Two tags are resolved while loading:
//! - `!include path` splices in another YAML file, relative to the file
//!   containing the tag
//! - `!env_var VAR` is replaced by the variable's value
//!
//! Other tags are kept as-is for the integration reading the section.

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const TAG_INCLUDE: &str = "!include";
const TAG_ENV_VAR: &str = "!env_var";

pub struct YamlLoader {
    config_dir: PathBuf,
    /// Files being loaded, innermost last
    loading: Vec<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            loading: Vec::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load a file; relative paths are taken from the config directory
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = match path.as_ref() {
            p if p.is_absolute() => p.to_path_buf(),
            p => self.config_dir.join(p),
        };

        if self.loading.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        debug!("Loading {}", path.display());
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;

        self.load_string(&content, &path)
    }

    /// Parse `content` as if it had been read from `file`.
    ///
    /// `file` counts as being loaded until its includes are resolved.
    pub fn load_string(&mut self, content: &str, file: &Path) -> ConfigResult<Value> {
        let raw: Value = serde_yaml::from_str(content).map_err(|source| ConfigError::ParseYaml {
            path: file.to_path_buf(),
            source,
        })?;

        self.loading.push(file.to_path_buf());
        let resolved = self.resolve(raw, file);
        self.loading.pop();
        resolved
    }

    fn resolve(&mut self, value: Value, file: &Path) -> ConfigResult<Value> {
        Ok(match value {
            Value::Tagged(tagged) => self.resolve_tag(*tagged, file)?,
            Value::Mapping(map) => {
                let mut resolved = Mapping::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key, self.resolve(item, file)?);
                }
                Value::Mapping(resolved)
            }
            Value::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| self.resolve(item, file))
                    .collect::<ConfigResult<_>>()?,
            ),
            scalar => scalar,
        })
    }

    fn resolve_tag(&mut self, tagged: TaggedValue, file: &Path) -> ConfigResult<Value> {
        trace!("Resolving {} in {}", tagged.tag, file.display());

        if tagged.tag == TAG_INCLUDE {
            let Value::String(target) = &tagged.value else {
                return Err(ConfigError::BadInclude {
                    file: file.to_path_buf(),
                    reason: format!("expected a path, got {:?}", tagged.value),
                });
            };
            let target = file
                .parent()
                .unwrap_or(self.config_dir.as_path())
                .join(target);
            return self.load_file(target);
        }

        if tagged.tag == TAG_ENV_VAR {
            let Value::String(var) = &tagged.value else {
                return Err(ConfigError::BadEnvVar {
                    var: format!("{:?}", tagged.value),
                    reason: "variable name must be a string".to_string(),
                });
            };
            return std::env::var(var)
                .map(Value::String)
                .map_err(|e| ConfigError::BadEnvVar {
                    var: var.clone(),
                    reason: e.to_string(),
                });
        }

        let TaggedValue { tag, value } = tagged;
        let value = self.resolve(value, file)?;
        Ok(Value::Tagged(Box::new(TaggedValue { tag, value })))
    }
}

/// Load `file` from `config_dir`
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_file(file)
}

/// Load YAML text as if it were `config_dir/source_name`
pub fn load_yaml_string(
    config_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    let config_dir = config_dir.into();
    let file = config_dir.join(source_name);
    YamlLoader::new(config_dir).load_string(content, &file)
}

/// The top-level section for `domain`.
///
/// A bare `domain:` with no body comes back as `Value::Null`, which
/// integrations treat as configured with defaults.
pub fn integration_config<'a>(config: &'a Value, domain: &str) -> Option<&'a Value> {
    config.as_mapping()?.get(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_simple_yaml() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "configuration.yaml",
            "homeassistant:\n  name: Home\nigd:\n  sensors: true\n",
        );

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        let igd = integration_config(&value, "igd").unwrap();
        assert_eq!(igd.get("sensors"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_bare_section_is_null() {
        let value = load_yaml_string("/tmp", "igd:\n", "configuration.yaml").unwrap();
        assert_eq!(integration_config(&value, "igd"), Some(&Value::Null));
        assert!(integration_config(&value, "hue").is_none());
    }

    #[test]
    fn test_include_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "packages/igd.yaml", "port_forward: !include flags/pf.yaml\n");
        write_file(dir.path(), "packages/flags/pf.yaml", "true\n");
        write_file(
            dir.path(),
            "configuration.yaml",
            "igd: !include packages/igd.yaml\n",
        );

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        let igd = integration_config(&value, "igd").unwrap();
        assert_eq!(igd.get("port_forward"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_include_of_non_string() {
        let result = load_yaml_string("/tmp", "igd: !include [a, b]\n", "configuration.yaml");
        assert!(matches!(result, Err(ConfigError::BadInclude { .. })));
    }

    #[test]
    fn test_env_var() {
        std::env::set_var("HA_CONFIG_TEST_LOCAL_IP", "192.168.1.10");
        let value = load_yaml_string(
            "/tmp",
            "igd:\n  local_ip: !env_var HA_CONFIG_TEST_LOCAL_IP\n",
            "configuration.yaml",
        )
        .unwrap();

        let igd = integration_config(&value, "igd").unwrap();
        assert_eq!(
            igd.get("local_ip"),
            Some(&Value::String("192.168.1.10".to_string()))
        );
    }

    #[test]
    fn test_missing_env_var() {
        let result = load_yaml_string(
            "/tmp",
            "value: !env_var HA_CONFIG_TEST_DOES_NOT_EXIST\n",
            "configuration.yaml",
        );
        assert!(matches!(
            result,
            Err(ConfigError::BadEnvVar { ref var, .. }) if var == "HA_CONFIG_TEST_DOES_NOT_EXIST"
        ));
    }

    #[test]
    fn test_unknown_tag_kept() {
        let value = load_yaml_string("/tmp", "key: !secret pw\n", "configuration.yaml").unwrap();
        assert!(matches!(value.get("key"), Some(Value::Tagged(_))));
    }

    #[test]
    fn test_circular_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "a: !include a.yaml\n");

        let result = load_yaml(dir.path(), "a.yaml");
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_string_source_including_itself() {
        let dir = TempDir::new().unwrap();
        // Reading the file again would fail on its missing include
        write_file(dir.path(), "configuration.yaml", "igd: !include missing.yaml\n");

        let result = load_yaml_string(
            dir.path(),
            "base: !include configuration.yaml\n",
            "configuration.yaml",
        );
        assert!(matches!(
            result,
            Err(ConfigError::CircularInclude { ref path }) if path.ends_with("configuration.yaml")
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_yaml(dir.path(), "configuration.yaml");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
