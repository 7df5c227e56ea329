use crate::{
    catalog::RequirementCatalog,
    chunking::ChunkPlan,
    classifier::DocumentClassifier,
    config::Config,
    engine::{DocumentEngine, python::PythonEngine},
    pipeline::{InputFormat, Pipeline},
    provider::{self, AzureSettings},
    util::{ensure_dir, file_name_of, hash_file, looks_like_url, now_rfc3339, sha256_hex},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "adgm-check")]
#[command(about = "ADGM compliance review: reference knowledge base + document checklist + issue report")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./adgm-check.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the document engine and the model provider.
    Doctor {},
    /// Print the configured process checklists.
    Catalog {},
    Classify {
        #[arg(long)]
        input: PathBuf,
    },
    /// Show how reference texts would be split for the knowledge base.
    Chunks {
        #[arg(long, num_args = 1.., required = true)]
        reference: Vec<PathBuf>,
    },
    Review {
        #[arg(long, num_args = 1..)]
        reference: Vec<PathBuf>,
        #[arg(long, num_args = 1..)]
        document: Vec<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = Config::load(&cfg_path)?;

    match &args.cmd {
        Command::Doctor {} => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            doctor(&cfg)
        }
        Command::Catalog {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            catalog(&cfg)
        }
        Command::Classify { input } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            classify(&cfg, input)
        }
        Command::Chunks { reference } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            chunks(&cfg, reference)
        }
        Command::Review {
            reference,
            document,
            out_dir,
        } => review(&args, &cfg, reference, document, out_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> PathBuf {
    if let Some(p) = user {
        return p.to_path_buf();
    }
    let default = PathBuf::from("adgm-check.toml");
    if default.exists() {
        default
    } else {
        PathBuf::from("adgm-check.example.toml")
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = match PythonEngine::new(cfg).and_then(|e| e.doctor()) {
        Ok(diag) => serde_json::to_value(diag)?,
        Err(err) => serde_json::json!({ "ok": false, "error": format!("{err:#}") }),
    };

    let provider = match cfg.provider.kind.as_str() {
        "offline" => serde_json::json!({ "kind": "offline", "ok": true, "completer": false }),
        kind => match AzureSettings::from_env(&cfg.provider) {
            Ok(s) => serde_json::json!({
                "kind": kind,
                "ok": true,
                "completer": true,
                "api_base": s.api_base,
                "chat_deployment": s.chat_deployment,
                "embedding_deployment": s.embedding_deployment,
            }),
            Err(err) => serde_json::json!({ "kind": kind, "ok": false, "error": format!("{err:#}") }),
        },
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "engine": engine,
            "provider": provider,
        }))?
    );
    Ok(())
}

fn catalog(cfg: &Config) -> Result<()> {
    let catalog = RequirementCatalog::from_config(cfg);
    let processes: Vec<_> = catalog.processes().collect();
    println!("{}", serde_json::to_string_pretty(&processes)?);
    Ok(())
}

fn classify(cfg: &Config, input: &Path) -> Result<()> {
    validate_input(cfg, input)?;
    let pipeline = Pipeline::new(cfg, PythonEngine::new(cfg)?);
    let text = pipeline.load_text(input)?;
    let result = DocumentClassifier::from_config(cfg)?.classify(&text);
    let catalog = RequirementCatalog::from_config(cfg);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "classification": result,
            "process": result.document_type().and_then(|t| catalog.process_for(t)),
        }))?
    );
    Ok(())
}

fn chunks(cfg: &Config, references: &[PathBuf]) -> Result<()> {
    let pipeline = Pipeline::new(cfg, PythonEngine::new(cfg)?);
    let mut plans = Vec::with_capacity(references.len());
    for path in references {
        validate_input(cfg, path)?;
        let text = pipeline.load_text(path)?;
        plans.push(ChunkPlan::from_text(&cfg.chunking, &file_name_of(path), &text));
    }
    println!("{}", serde_json::to_string_pretty(&plans)?);
    Ok(())
}

fn review(
    args: &Args,
    cfg: &Config,
    references: &[PathBuf],
    documents: &[PathBuf],
    out_override: Option<&Path>,
) -> Result<()> {
    for input in references.iter().chain(documents) {
        validate_input(cfg, input)?;
    }

    let cfg_norm = cfg.normalized_for_hash();
    let mut id_source = sha256_hex(cfg_norm.as_bytes());
    for (tag, inputs) in [("ref", references), ("doc", documents)] {
        for input in inputs {
            let h = hash_file(cfg, input)
                .with_context(|| format!("hashing input: {}", input.display()))?;
            id_source.push_str(&format!(":{tag}:{h}"));
        }
    }
    let job_id = sha256_hex(id_source.as_bytes());

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let job_dir = out_root.join(&job_id);

    if job_dir.exists() && !cfg.global.resume {
        return Err(anyhow!(
            "job_dir already exists and resume=false: {}",
            job_dir.display()
        ));
    }

    ensure_dir(&job_dir)?;
    ensure_dir(&job_dir.join("final"))?;
    ensure_dir(&job_dir.join("logs"))?;

    let log_path = resolve_log_path(cfg, Some(&job_dir));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!(
        job_id = %job_id,
        references = references.len(),
        documents = documents.len(),
        "job started out={}",
        job_dir.display()
    );

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(job_dir.join("effective-config.toml"), raw)?;
    }

    let caps = provider::from_config(cfg).context("initializing model provider")?;
    let pipeline = Pipeline::new(cfg, PythonEngine::new(cfg)?);

    let started = now_rfc3339();
    let result = pipeline.run_job(caps, references, documents, &job_dir)?;

    let report_path = job_dir.join("final").join(&cfg.output.report_filename);
    if cfg.output.write_report_json {
        std::fs::write(&report_path, result.report.to_json_pretty()?)?;
    }

    if cfg.output.write_diagnostics_json {
        std::fs::write(
            job_dir.join("final").join(&cfg.output.diagnostics_filename),
            serde_json::to_string_pretty(&result.diagnostics)?,
        )?;
    }

    if cfg.output.write_index_json {
        let index = serde_json::json!({
            "job_id": job_id,
            "job_name": cfg.global.job_name,
            "started": started,
            "finished": now_rfc3339(),
            "references": references.iter().map(|p| file_name_of(p)).collect::<Vec<_>>(),
            "documents": documents.iter().map(|p| file_name_of(p)).collect::<Vec<_>>(),
            "report": format!("final/{}", cfg.output.report_filename),
            "diagnostics": format!("final/{}", cfg.output.diagnostics_filename),
            "reviewed": result.reviewed,
        });
        std::fs::write(job_dir.join("index.json"), serde_json::to_string_pretty(&index)?)?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "job_id": job_id,
                "job_dir": job_dir,
                "process": result.report.process,
                "documents_uploaded": result.report.documents_uploaded,
                "missing_document": result.report.missing_document,
                "issues_found": result.report.issues_found.len(),
                "status": "ok"
            }))?
        );
    }

    Ok(())
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    if InputFormat::of(input).is_none() {
        return Err(anyhow!(
            "unsupported input (expected .pdf, .docx, .txt or .md): {}",
            input.display()
        ));
    }

    Ok(())
}

fn resolve_log_path(cfg: &Config, job_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(job_dir) = job_dir {
        return Some(job_dir.join("logs").join("adgm-check.log"));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("adgm-check.log"))
}
