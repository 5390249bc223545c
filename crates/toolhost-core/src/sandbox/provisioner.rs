use super::lock::ProvisionLock;
use crate::config::runtime::render_command;
use crate::config::{Layout, RuntimeConfig, ToolhostConfig};
use crate::error::{Result, ToolhostError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Written into a sandbox once creation succeeded. A sandbox directory without
/// it is a leftover from an interrupted or failed creation.
pub const READY_MARKER: &str = ".toolhost-ready";

/// Creates per-tool sandboxes and installs declared dependencies into them.
pub struct Provisioner {
    layout: Layout,
    runtime: RuntimeConfig,
}

impl Provisioner {
    pub fn new(config: &ToolhostConfig) -> Self {
        Self {
            layout: config.layout(),
            runtime: config.runtime.clone(),
        }
    }

    pub fn sandbox_path(&self, name: &str) -> PathBuf {
        self.layout.sandbox_path(name)
    }

    /// Interpreter inside the tool's sandbox.
    pub fn interpreter(&self, name: &str) -> PathBuf {
        self.sandbox_path(name).join(&self.runtime.sandbox_interpreter)
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.sandbox_path(name).join(READY_MARKER).is_file()
    }

    /// Make sure a usable sandbox exists for `name`. Does nothing when one is
    /// already ready. A half-created directory is discarded and rebuilt.
    pub async fn ensure_sandbox(&self, name: &str) -> bool {
        if self.is_ready(name) {
            return true;
        }

        let sandbox = self.sandbox_path(name);
        if sandbox.exists() {
            warn!(tool = %name, "discarding incomplete sandbox at {:?}", sandbox);
            if let Err(e) = tokio::fs::remove_dir_all(&sandbox).await {
                error!(tool = %name, "cannot remove incomplete sandbox {:?}: {}", sandbox, e);
                return false;
            }
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.layout.sandboxes_dir).await {
            error!("cannot create sandbox root {:?}: {}", self.layout.sandboxes_dir, e);
            return false;
        }

        info!(tool = %name, "Creating sandbox at {:?}", sandbox);
        let interpreter = self.runtime.interpreter.to_string_lossy().into_owned();
        let sandbox_str = sandbox.to_string_lossy().into_owned();
        let Some((program, args)) = render_command(
            &self.runtime.sandbox_create,
            &[
                ("interpreter", interpreter.as_str()),
                ("sandbox", sandbox_str.as_str()),
                ("name", name),
            ],
        ) else {
            error!("runtime.sandbox_create command is empty");
            return false;
        };

        let created = run_step(name, "sandbox creation", Path::new(&program), &args).await
            && match tokio::fs::write(sandbox.join(READY_MARKER), b"").await {
                Ok(()) => true,
                Err(e) => {
                    error!(tool = %name, "cannot mark sandbox ready: {}", e);
                    false
                }
            };

        if created {
            info!(tool = %name, "Sandbox created");
        } else if sandbox.exists() {
            let _ = tokio::fs::remove_dir_all(&sandbox).await;
        }
        created
    }

    /// Install `specifiers` with the sandbox's package manager, forcing
    /// upgrades so repeated calls converge on the pinned versions.
    pub async fn install_dependencies(&self, name: &str, specifiers: &[String]) -> bool {
        if specifiers.is_empty() {
            return true;
        }

        let sandbox = self.sandbox_path(name);
        info!(tool = %name, "Installing/verifying {} package(s) in {:?}", specifiers.len(), sandbox);
        let package_manager = sandbox.join(&self.runtime.package_manager);
        let args: Vec<String> = self
            .runtime
            .install_args
            .iter()
            .chain(specifiers)
            .cloned()
            .collect();

        let ok = run_step(name, "dependency installation", &package_manager, &args).await;
        if ok {
            info!(tool = %name, "Dependencies are up to date");
        }
        ok
    }

    /// Hold the tool's provisioning lock.
    pub async fn lock(&self, name: &str) -> Result<ProvisionLock> {
        Ok(ProvisionLock::acquire(&self.layout.lock_path(name)).await?)
    }

    /// Lock, create and populate the sandbox; returns its interpreter.
    pub async fn provision(&self, name: &str, specifiers: &[String]) -> Result<PathBuf> {
        let _guard = self.lock(name).await?;

        if !self.ensure_sandbox(name).await {
            return Err(ToolhostError::Provision {
                name: name.to_string(),
                message: "sandbox creation failed".to_string(),
            });
        }
        if !self.install_dependencies(name, specifiers).await {
            return Err(ToolhostError::Provision {
                name: name.to_string(),
                message: "dependency installation failed".to_string(),
            });
        }
        Ok(self.interpreter(name))
    }
}

/// Run one provisioning command to completion. Its output is logged, never
/// forwarded to stdout.
async fn run_step(name: &str, step: &str, program: &Path, args: &[String]) -> bool {
    debug!(tool = %name, "{}: {:?} {:?}", step, program, args);
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if !stderr.trim().is_empty() {
                debug!(tool = %name, "{} stderr: {}", step, stderr.trim());
            }
            true
        }
        Ok(out) => {
            error!(
                tool = %name,
                "{} failed with {}: {}",
                step,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
            false
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!(tool = %name, "{} failed: executable {:?} not found", step, program);
            false
        }
        Err(e) => {
            error!(tool = %name, "{} failed: cannot run {:?}: {}", step, program, e);
            false
        }
    }
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;

    /// Fake package manager: records the specifiers it was asked for (the
    /// resolved set, so repeated installs leave the same file) and fails on
    /// anything named `missing-*`.
    const FAKE_PIP: &str = r#"#!/bin/sh
root="$(dirname "$0")/.."
for spec in "$@"; do
  case "$spec" in
    missing-*) echo "ERROR: No matching distribution found for $spec" >&2; exit 1 ;;
  esac
done
for spec in "$@"; do
  case "$spec" in
    install|-*) ;;
    *) echo "$spec" ;;
  esac
done | sort -u > "$root/installed.txt"
"#;

    /// Fake interpreter: runs tools with `sh` and marks them as sandboxed.
    const FAKE_PYTHON: &str = "#!/bin/sh\nexport TOOLHOST_SANDBOXED=1\nexec sh \"$@\"\n";

    /// Configure `config` so sandboxes are built by a shell script that copies
    /// the fake pip/python and counts its invocations in `<root>/creations`.
    pub(crate) fn fake_sandbox_runtime(config: &mut ToolhostConfig) {
        let support = config.root.join("support");
        std::fs::create_dir_all(&support).unwrap();
        std::fs::write(support.join("pip"), FAKE_PIP).unwrap();
        std::fs::write(support.join("python"), FAKE_PYTHON).unwrap();

        let script = r#"mkdir -p "$1/bin" && cp "$2/pip" "$2/python" "$1/bin/" && chmod +x "$1/bin/pip" "$1/bin/python" && echo "$1" >> "$3""#;
        config.runtime.interpreter = "sh".into();
        config.runtime.extension = "sh".into();
        config.runtime.sandbox_create = vec![
            "sh".into(),
            "-c".into(),
            script.into(),
            "sh".into(),
            "{sandbox}".into(),
            support.to_string_lossy().into_owned(),
            config.root.join("creations").to_string_lossy().into_owned(),
        ];
    }

    fn creations(root: &Path) -> usize {
        std::fs::read_to_string(root.join("creations"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    fn setup() -> (tempfile::TempDir, ToolhostConfig) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ToolhostConfig::with_root(tmp.path());
        fake_sandbox_runtime(&mut config);
        (tmp, config)
    }

    fn specs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn ensure_sandbox_is_idempotent() {
        let (tmp, config) = setup();
        let provisioner = Provisioner::new(&config);

        assert!(provisioner.ensure_sandbox("tts").await);
        assert!(provisioner.is_ready("tts"));
        let listing = |p: &Path| {
            let mut names: Vec<_> = std::fs::read_dir(p)
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            names.sort();
            names
        };
        let before = listing(&provisioner.sandbox_path("tts"));

        assert!(provisioner.ensure_sandbox("tts").await);
        assert_eq!(creations(tmp.path()), 1);
        assert_eq!(listing(&provisioner.sandbox_path("tts")), before);
    }

    #[tokio::test]
    async fn incomplete_sandbox_is_rebuilt() {
        let (tmp, config) = setup();
        let provisioner = Provisioner::new(&config);
        let sandbox = provisioner.sandbox_path("tts");
        std::fs::create_dir_all(sandbox.join("lib")).unwrap();

        assert!(provisioner.ensure_sandbox("tts").await);
        assert_eq!(creations(tmp.path()), 1);
        assert!(!sandbox.join("lib").exists());
        assert!(provisioner.interpreter("tts").is_file());
    }

    #[tokio::test]
    async fn failed_creation_leaves_no_usable_sandbox() {
        let (_tmp, mut config) = setup();
        config.runtime.sandbox_create = specs(&["sh", "-c", "mkdir -p \"$1\" && exit 3", "sh", "{sandbox}"]);
        let provisioner = Provisioner::new(&config);

        assert!(!provisioner.ensure_sandbox("tts").await);
        assert!(!provisioner.is_ready("tts"));
        assert!(!provisioner.sandbox_path("tts").exists());
    }

    #[tokio::test]
    async fn missing_creation_program_fails() {
        let (_tmp, mut config) = setup();
        config.runtime.sandbox_create = specs(&["/nonexistent/python3", "-m", "venv", "{sandbox}"]);
        let provisioner = Provisioner::new(&config);
        assert!(!provisioner.ensure_sandbox("tts").await);
    }

    #[tokio::test]
    async fn empty_specifier_list_is_a_noop() {
        let (_tmp, config) = setup();
        let provisioner = Provisioner::new(&config);
        // No sandbox exists, so any real install attempt would fail.
        assert!(provisioner.install_dependencies("tts", &[]).await);
    }

    #[tokio::test]
    async fn install_twice_converges() {
        let (_tmp, config) = setup();
        let provisioner = Provisioner::new(&config);
        let deps = specs(&["numpy==1.26.4", "requests"]);
        assert!(provisioner.ensure_sandbox("vision").await);

        assert!(provisioner.install_dependencies("vision", &deps).await);
        let installed = provisioner.sandbox_path("vision").join("installed.txt");
        let first = std::fs::read_to_string(&installed).unwrap();
        assert!(provisioner.install_dependencies("vision", &deps).await);
        assert_eq!(std::fs::read_to_string(&installed).unwrap(), first);
        assert_eq!(first, "numpy==1.26.4\nrequests\n");
    }

    #[tokio::test]
    async fn install_failure_is_reported() {
        let (_tmp, config) = setup();
        let provisioner = Provisioner::new(&config);
        assert!(provisioner.ensure_sandbox("vision").await);
        assert!(
            !provisioner
                .install_dependencies("vision", &specs(&["numpy", "missing-wheel==9.9"]))
                .await
        );
    }

    #[tokio::test]
    async fn dotted_names_get_independent_sandboxes() {
        let (_tmp, config) = setup();
        let provisioner = Provisioner::new(&config);

        provisioner.provision("foo", &specs(&["numpy"])).await.unwrap();
        let interpreter = provisioner.provision("foo.lock", &specs(&["numpy"])).await.unwrap();
        assert!(interpreter.is_file());
        assert!(provisioner.is_ready("foo"));
        assert!(provisioner.is_ready("foo.lock"));
    }

    #[tokio::test]
    async fn provision_returns_sandbox_interpreter_and_errors_on_failure() {
        let (_tmp, config) = setup();
        let provisioner = Provisioner::new(&config);

        let interpreter = provisioner.provision("vision", &specs(&["numpy"])).await.unwrap();
        assert_eq!(interpreter, provisioner.sandbox_path("vision").join("bin/python"));
        assert!(config.layout().lock_path("vision").is_file());

        let err = provisioner
            .provision("vision", &specs(&["missing-thing"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolhostError::Provision { .. }), "{err}");
    }
}
