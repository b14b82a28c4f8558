use anyhow::anyhow;
use anyhow::Context;
use clap::ArgGroup;
use clap::Parser;
use resolve_js::DefaultExtension;
use resolve_js::Diagnostic;
use resolve_js::ImportMap;
use resolve_js::Resolver;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use url::Url;

#[derive(Parser)]
#[command(author, version, about = "Resolve module specifiers through an import map")]
#[command(group(ArgGroup::new("extension").args(["default_extension", "infer_extension"])))]
struct Cli {
  /// Specifiers to resolve.
  specifiers: Vec<String>,

  /// Import map file. Its location is the base its entries are resolved against.
  #[arg(long)]
  import_map: Option<PathBuf>,

  /// Base URL for the import map and for specifiers without a referrer. Defaults to the current
  /// directory.
  #[arg(long)]
  base_url: Option<Url>,

  /// URL of the importing module. Defaults to the base URL.
  #[arg(long)]
  referrer: Option<Url>,

  /// Extension appended to resolved URLs that have none (e.g. `.js`).
  #[arg(long)]
  default_extension: Option<String>,

  /// Append the referrer's extension to resolved URLs that have none.
  #[arg(long)]
  infer_extension: bool,

  /// Print the normalized import map.
  #[arg(long)]
  print_map: bool,

  /// Emit JSON instead of text.
  #[arg(long)]
  json: bool,

  /// Emit tracing events (JSON) to stderr.
  #[arg(long)]
  trace: bool,
}

#[derive(Serialize)]
struct ResolutionJson<'a> {
  specifier: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

#[derive(Serialize)]
struct DiagnosticJson<'a> {
  code: &'a str,
  severity: &'a str,
  message: &'a str,
  path: &'a str,
  notes: &'a [String],
}

impl<'a> From<&'a Diagnostic> for DiagnosticJson<'a> {
  fn from(diagnostic: &'a Diagnostic) -> Self {
    Self {
      code: diagnostic.code,
      severity: diagnostic.severity.as_str(),
      message: &diagnostic.message,
      path: &diagnostic.path,
      notes: &diagnostic.notes,
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.trace);
  match run(&cli) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(enabled: bool) {
  if !enabled {
    return;
  }
  let _ = tracing_subscriber::fmt()
    .with_span_events(FmtSpan::CLOSE)
    .with_max_level(Level::DEBUG)
    .json()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .try_init();
}

fn current_dir_url() -> anyhow::Result<Url> {
  let dir = std::env::current_dir().context("failed to read the current directory")?;
  Url::from_directory_path(&dir).map_err(|()| anyhow!("{} is not an absolute path", dir.display()))
}

fn file_url(path: &Path) -> anyhow::Result<Url> {
  let canonical =
    fs::canonicalize(path).with_context(|| format!("failed to read {}", path.display()))?;
  Url::from_file_path(&canonical)
    .map_err(|()| anyhow!("{} is not an absolute path", canonical.display()))
}

fn default_extension(cli: &Cli) -> DefaultExtension {
  match &cli.default_extension {
    Some(ext) if !ext.is_empty() => DefaultExtension::Fixed(ext.clone()),
    _ if cli.infer_extension => DefaultExtension::InferFromReferrer,
    _ => DefaultExtension::Disabled,
  }
}

/// Returns whether every specifier resolved.
fn run(cli: &Cli) -> anyhow::Result<bool> {
  let base_url = match &cli.base_url {
    Some(url) => url.clone(),
    None => current_dir_url()?,
  };
  let referrer = cli.referrer.clone().unwrap_or_else(|| base_url.clone());

  let mut resolver = Resolver::new().with_default_extension(default_extension(cli));
  let mut diagnostics = Vec::new();
  if let Some(path) = &cli.import_map {
    let text =
      fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let map_url = match &cli.base_url {
      Some(url) => url.clone(),
      None => file_url(path)?,
    };
    let normalized = ImportMap::from_json(&text, &map_url)
      .with_context(|| format!("invalid import map {}", path.display()))?;
    tracing::debug!(map = %map_url, dropped = normalized.diagnostics.len(), "loaded import map");
    diagnostics = normalized.diagnostics;
    resolver = resolver.with_import_map(normalized.import_map);
  }

  if cli.json {
    let rendered: Vec<DiagnosticJson> = diagnostics.iter().map(DiagnosticJson::from).collect();
    if !rendered.is_empty() {
      eprintln!("{}", serde_json::to_string(&rendered)?);
    }
  } else {
    for diagnostic in &diagnostics {
      eprintln!("{diagnostic}");
    }
  }

  if cli.print_map {
    let document = resolver
      .import_map()
      .map(|map| map.to_document(None))
      .unwrap_or_else(|| ImportMap::default().to_document(None));
    println!("{}", serde_json::to_string_pretty(&document)?);
  }

  let mut ok = true;
  let mut results = Vec::with_capacity(cli.specifiers.len());
  for specifier in &cli.specifiers {
    let resolved = resolver.resolve(specifier, Some(&referrer));
    if let Err(err) = &resolved {
      tracing::debug!(%specifier, error = %err, "unresolved");
      ok = false;
    }
    results.push((specifier.as_str(), resolved));
  }

  if cli.json {
    let rendered: Vec<ResolutionJson> = results
      .iter()
      .map(|&(specifier, ref resolved)| match resolved {
        Ok(url) => ResolutionJson {
          specifier,
          url: Some(url.to_string()),
          error: None,
        },
        Err(err) => ResolutionJson {
          specifier,
          url: None,
          error: Some(err.to_string()),
        },
      })
      .collect();
    println!("{}", serde_json::to_string_pretty(&rendered)?);
  } else {
    for (specifier, resolved) in &results {
      match resolved {
        Ok(url) => println!("{specifier} -> {url}"),
        Err(err) => eprintln!("error: {err}"),
      }
    }
  }

  Ok(ok)
}
