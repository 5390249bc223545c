use crate::registry::introspect::PYTHON_PROBE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How tools are described, sandboxed and launched.
///
/// Command templates are argv vectors; `{placeholder}` tokens inside any
/// element are substituted before spawning:
///
/// | template         | placeholders                          |
/// |------------------|---------------------------------------|
/// | `describe`       | `{interpreter}` `{entry}` `{name}`     |
/// | `sandbox_create` | `{interpreter}` `{sandbox}` `{name}`   |
///
/// The defaults target Python: `python3 -m venv` sandboxes with `pip`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Host interpreter used for dependency-free tools and for introspection.
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,
    /// File extension (without the dot) that marks a tool entry point.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Entry points whose stem starts with this prefix are private helpers.
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,
    #[serde(default = "default_describe")]
    pub describe: Vec<String>,
    #[serde(default = "default_introspect_timeout_secs")]
    pub introspect_timeout_secs: u64,
    #[serde(default = "default_sandbox_create")]
    pub sandbox_create: Vec<String>,
    /// Interpreter path relative to a sandbox root.
    #[serde(default = "default_sandbox_interpreter")]
    pub sandbox_interpreter: PathBuf,
    /// Package manager path relative to a sandbox root.
    #[serde(default = "default_package_manager")]
    pub package_manager: PathBuf,
    /// Arguments placed before the specifiers. Must force/upgrade so that
    /// repeated installs converge.
    #[serde(default = "default_install_args")]
    pub install_args: Vec<String>,
    /// Environment variable carrying the tool's storage directory.
    #[serde(default = "default_storage_env_var")]
    pub storage_env_var: String,
}

fn default_interpreter() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("python")
    } else {
        PathBuf::from("python3")
    }
}

fn default_extension() -> String {
    "py".to_string()
}

fn default_reserved_prefix() -> String {
    "_".to_string()
}

fn default_describe() -> Vec<String> {
    vec![
        "{interpreter}".to_string(),
        "-c".to_string(),
        PYTHON_PROBE.to_string(),
        "{entry}".to_string(),
    ]
}

fn default_introspect_timeout_secs() -> u64 {
    60
}

fn default_sandbox_create() -> Vec<String> {
    vec![
        "{interpreter}".to_string(),
        "-m".to_string(),
        "venv".to_string(),
        "{sandbox}".to_string(),
    ]
}

fn default_sandbox_interpreter() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("Scripts").join("python.exe")
    } else {
        PathBuf::from("bin").join("python")
    }
}

fn default_package_manager() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("Scripts").join("pip.exe")
    } else {
        PathBuf::from("bin").join("pip")
    }
}

fn default_install_args() -> Vec<String> {
    vec!["install".to_string(), "--upgrade".to_string()]
}

fn default_storage_env_var() -> String {
    "SUBCOMMAND_TOOL_PATH".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            extension: default_extension(),
            reserved_prefix: default_reserved_prefix(),
            describe: default_describe(),
            introspect_timeout_secs: default_introspect_timeout_secs(),
            sandbox_create: default_sandbox_create(),
            sandbox_interpreter: default_sandbox_interpreter(),
            package_manager: default_package_manager(),
            install_args: default_install_args(),
            storage_env_var: default_storage_env_var(),
        }
    }
}

/// Substitute `{key}` tokens in every element of `template` and split it into
/// program and arguments. Returns `None` for an empty template.
pub fn render_command(template: &[String], vars: &[(&str, &str)]) -> Option<(String, Vec<String>)> {
    let mut rendered = template.iter().map(|part| substitute(part, vars));
    let program = rendered.next()?;
    Some((program, rendered.collect()))
}

/// Single left-to-right pass: substituted values are never scanned again.
fn substitute(part: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(part.len());
    let mut rest = part;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = tail.find('}').and_then(|close| {
            let key = &tail[1..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (close, *value))
        });
        match hit {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn render_substitutes_every_placeholder() {
        let template = owned(&["{interpreter}", "-m", "venv", "{sandbox}"]);
        let (program, args) = render_command(
            &template,
            &[("interpreter", "python3"), ("sandbox", "/srv/sandboxes/tts")],
        )
        .unwrap();
        assert_eq!(program, "python3");
        assert_eq!(args, owned(&["-m", "venv", "/srv/sandboxes/tts"]));
    }

    #[test]
    fn render_leaves_unknown_placeholders_alone() {
        let template = owned(&["sh", "-c", "echo {other} {name}"]);
        let (_, args) = render_command(&template, &[("name", "tts")]).unwrap();
        assert_eq!(args[1], "echo {other} tts");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let template = owned(&["{interpreter}", "-m", "venv", "{sandbox}"]);
        let (program, args) = render_command(
            &template,
            &[
                ("interpreter", "/opt/{sandbox}/python3"),
                ("sandbox", "/srv/{name}/tts"),
                ("name", "tts"),
            ],
        )
        .unwrap();
        assert_eq!(program, "/opt/{sandbox}/python3");
        assert_eq!(args[2], "/srv/{name}/tts");
    }

    #[test]
    fn describe_script_braces_are_left_alone() {
        let (_, args) = render_command(&default_describe(), &[("entry", "/t/a.py")]).unwrap();
        assert_eq!(args[1], PYTHON_PROBE);
        assert_eq!(args[2], "/t/a.py");
    }

    #[test]
    fn render_rejects_empty_template() {
        assert!(render_command(&[], &[("name", "x")]).is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str(r#"{ "interpreter": "sh", "extension": "sh" }"#).unwrap();
        assert_eq!(cfg.interpreter, PathBuf::from("sh"));
        assert_eq!(cfg.extension, "sh");
        assert_eq!(cfg.reserved_prefix, "_");
        assert_eq!(cfg.install_args, owned(&["install", "--upgrade"]));
    }
}
