use super::{DocumentEngine, types::*};
use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use serde::{Serialize, de::DeserializeOwned};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DOCTOR: &str = "doctor.py";
const PDF_TEXT: &str = "pdf_text.py";
const DOCX_TEXT: &str = "docx_text.py";
const DOCX_ANNOTATE: &str = "docx_annotate.py";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs the helper scripts in `paths.scripts_dir`: one JSON request on
/// stdin, one JSON response on stdout.
pub struct PythonEngine {
    cfg: Config,
    scripts_dir: PathBuf,
    python_exe: PathBuf,
}

impl PythonEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let scripts_dir = PathBuf::from(&cfg.paths.scripts_dir);
        if cfg.security.pin_scripts_dir {
            ensure_under_cwd(&scripts_dir)?;
        }
        let missing: Vec<String> = [DOCTOR, PDF_TEXT, DOCX_TEXT, DOCX_ANNOTATE]
            .iter()
            .map(|s| scripts_dir.join(s))
            .filter(|p| !p.is_file())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            bail!("missing helper scripts: {}", missing.join(", "));
        }

        Ok(Self {
            cfg: cfg.clone(),
            scripts_dir,
            python_exe: home_relative(cfg.engine.python_exe.trim()),
        })
    }

    fn call<I: Serialize, O: DeserializeOwned>(&self, script: &str, request: &I) -> Result<O> {
        let path = self.scripts_dir.join(script);
        let limit = match self.cfg.engine.script_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        debug!(script, timeout = ?limit, "calling helper");

        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(&path)
            .envs(&self.cfg.engine.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .with_context(|| format!("starting {} {}", self.python_exe.display(), path.display()))?;

        let payload = serde_json::to_vec(request)?;
        match child.stdin.take() {
            Some(mut stdin) => stdin
                .write_all(&payload)
                .with_context(|| format!("writing request to {script}"))?,
            None => bail!("{script}: stdin not captured"),
        }

        let output = collect(child, limit).with_context(|| format!("running {script}"))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            bail!("{script} exited with {}: {}", output.status, stderr.trim());
        }
        if self.cfg.debug.keep_python_stderr && !stderr.trim().is_empty() {
            debug!(script, stderr = %stderr.trim(), "helper stderr");
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("{script} returned invalid JSON"))
    }

    fn extract(&self, script: &str, input: &Path) -> Result<ExtractOut> {
        let req = ExtractIn {
            input_path: input.display().to_string(),
        };
        let out: ExtractOut = self.call(script, &req)?;
        if !out.ok {
            let reason = out.error.as_deref().unwrap_or("extraction failed");
            bail!("{reason}: {}", input.display());
        }
        for w in &out.warnings {
            warn!(input = %input.display(), script, "{w}");
        }
        Ok(out)
    }
}

impl DocumentEngine for PythonEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        self.call(DOCTOR, &serde_json::json!({ "cmd": "doctor" }))
    }

    fn extract_pdf_text(&self, input: &Path) -> Result<ExtractOut> {
        self.extract(PDF_TEXT, input)
    }

    fn extract_docx_text(&self, input: &Path) -> Result<ExtractOut> {
        self.extract(DOCX_TEXT, input)
    }

    fn annotate_docx(
        &self,
        input: &Path,
        output: &Path,
        annotations: &[Annotation],
    ) -> Result<AnnotateOut> {
        let req = AnnotateIn {
            input_path: input.display().to_string(),
            output_path: output.display().to_string(),
            annotations: annotations.to_vec(),
        };
        let out: AnnotateOut = self.call(DOCX_ANNOTATE, &req)?;
        if !out.ok {
            bail!(
                "{}",
                out.error.as_deref().unwrap_or("docx annotation failed")
            );
        }
        Ok(out)
    }
}

fn ensure_under_cwd(dir: &Path) -> Result<()> {
    let cwd = std::env::current_dir().context("resolving working directory")?;
    let canon = dir
        .canonicalize()
        .with_context(|| format!("resolving scripts_dir {}", dir.display()))?;
    if !canon.starts_with(&cwd) {
        bail!(
            "scripts_dir {} is outside the working directory (security.pin_scripts_dir)",
            canon.display()
        );
    }
    Ok(())
}

fn home_relative(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn joined(handle: JoinHandle<std::io::Result<Vec<u8>>>, name: &str) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| anyhow!("{name} reader panicked"))?
        .with_context(|| format!("reading {name}"))
}

/// Waits for `child`, killing it once `limit` passes. Both pipes are read on
/// their own threads while waiting so a full pipe buffer cannot stall it.
fn collect(mut child: Child, limit: Option<Duration>) -> Result<Output> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let (status, timed_out) = loop {
        if let Some(status) = child.try_wait().context("polling helper")? {
            break (status, false);
        }
        if limit.is_some_and(|l| started.elapsed() > l) {
            warn!(elapsed = ?started.elapsed(), "helper timed out; killing");
            let _ = child.kill();
            break (child.wait().context("reaping helper")?, true);
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let output = Output {
        status,
        stdout: joined(stdout, "stdout")?,
        stderr: joined(stderr, "stderr")?,
    };
    if timed_out {
        bail!(
            "timed out after {:?}; stderr: {}",
            limit.unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_left_alone() {
        assert_eq!(home_relative("python3"), PathBuf::from("python3"));
        assert_eq!(home_relative("/usr/bin/python3"), PathBuf::from("/usr/bin/python3"));
    }

    #[test]
    fn missing_scripts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.paths.scripts_dir = dir.path().display().to_string();
        cfg.security.pin_scripts_dir = false;
        let err = PythonEngine::new(&cfg).err().unwrap();
        assert!(err.to_string().contains("docx_annotate.py"));
    }
}
