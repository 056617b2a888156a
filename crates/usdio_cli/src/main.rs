// usdio: inspect, import and convert USD stages.
//
//   usdio inspect <file.usda> [--json]
//   usdio import <file.usda> [--params import.json] [--background]
//   usdio convert <in.usda> <out.usda> [--import-params import.json] [--export-params export.json]

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use usdio_core::scene::Scene;
use usdio_core::usd::{PrimId, Stage};
use usdio_io::{
    export_usd, import_usd, spawn_import, ExportParams, ImportParams, JobOutcome, JobState, ReportLevel,
};

const USAGE: &str = "usage:
  usdio inspect <file> [--json]
  usdio import <file> [--params <import.json>] [--background]
  usdio convert <in> <out> [--import-params <import.json>] [--export-params <export.json>]";

/// Positional arguments and `--flag [value]` options.
struct Args {
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

impl Args {
    fn parse(raw: impl Iterator<Item = String>, valued: &[&str]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut options = Vec::new();
        let mut raw = raw.peekable();
        while let Some(arg) = raw.next() {
            if let Some(name) = arg.strip_prefix("--") {
                let value = if valued.contains(&name) {
                    Some(raw.next().with_context(|| format!("--{} needs a value", name))?)
                } else {
                    None
                };
                options.push((name.to_string(), value));
            } else {
                positional.push(arg);
            }
        }
        Ok(Self { positional, options })
    }

    fn flag(&self, name: &str) -> bool {
        self.options.iter().any(|(n, _)| n == name)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    fn path(&self, index: usize, what: &str) -> Result<PathBuf> {
        match self.positional.get(index) {
            Some(p) => Ok(PathBuf::from(p)),
            None => bail!("missing {}\n{}", what, USAGE),
        }
    }
}

fn load_import_params(path: Option<&str>) -> Result<ImportParams> {
    match path {
        Some(p) => ImportParams::from_json_file(p).with_context(|| format!("loading import params {}", p)),
        None => Ok(ImportParams::default()),
    }
}

fn load_export_params(path: Option<&str>) -> Result<ExportParams> {
    match path {
        Some(p) => ExportParams::from_json_file(p).with_context(|| format!("loading export params {}", p)),
        None => Ok(ExportParams::default()),
    }
}

fn print_prim(stage: &Stage, id: PrimId, depth: usize) {
    let prim = stage.prim(id);
    let type_name = if prim.type_name.is_empty() { "-" } else { prim.type_name.as_str() };
    let mut flags = String::new();
    if prim.metadata.instanceable == Some(true) {
        flags.push_str(" [instanceable]");
    }
    if !prim.is_active() {
        flags.push_str(" [inactive]");
    }
    println!(
        "{}{} {} ({}){}",
        "  ".repeat(depth),
        prim.specifier.keyword(),
        prim.name,
        type_name,
        flags
    );
    for &child in &prim.children {
        print_prim(stage, child, depth + 1);
    }
}

fn inspect(args: &Args) -> Result<bool> {
    let path = args.path(0, "input file")?;
    let stage = Stage::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let meta = &stage.metadata;

    if args.flag("json") {
        let prims: Vec<serde_json::Value> = stage
            .traverse()
            .into_iter()
            .map(|id| {
                let prim = stage.prim(id);
                serde_json::json!({ "path": prim.path.as_str(), "type": prim.type_name })
            })
            .collect();
        let summary = serde_json::json!({
            "file": path.display().to_string(),
            "upAxis": stage.up_axis().letter(),
            "metersPerUnit": meta.meters_per_unit,
            "startTimeCode": meta.start_time_code,
            "endTimeCode": meta.end_time_code,
            "defaultPrim": meta.default_prim,
            "prims": prims,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(true);
    }

    println!("{}", path.display());
    println!("  upAxis: {}", stage.up_axis().letter());
    if let Some(mpu) = meta.meters_per_unit {
        println!("  metersPerUnit: {}", mpu);
    }
    if let (Some(start), Some(end)) = (meta.start_time_code, meta.end_time_code) {
        println!("  time codes: {} - {}", start, end);
    }
    if let Some(default_prim) = &meta.default_prim {
        println!("  defaultPrim: {}", default_prim);
    }
    println!("  {} prims\n", stage.prim_count());
    for &root in stage.root_prims() {
        print_prim(&stage, root, 0);
    }
    Ok(true)
}

fn print_outcome(what: &str, outcome: &JobOutcome) {
    for report in &outcome.reports {
        let level = match report.level {
            ReportLevel::Info => "info",
            ReportLevel::Warning => "warning",
            ReportLevel::Error => "error",
        };
        println!("[{}] {}", level, report.message);
    }
    match (&outcome.state, &outcome.error) {
        (JobState::Finished, _) => println!("{} finished", what),
        (state, Some(e)) => eprintln!("{} {:?}: {}", what, state, e),
        (state, None) => eprintln!("{} {:?}", what, state),
    }
}

fn print_scene(scene: &Scene) {
    println!("\n{} objects:", scene.object_count());
    for (_, object) in scene.objects() {
        let parent = object
            .parent
            .and_then(|p| scene.object(p))
            .map(|p| p.name.as_str())
            .unwrap_or("-");
        println!("  {} ({}) parent: {}", object.name, object.data.kind_name(), parent);
    }
    println!("\ncollections:");
    for (_, collection) in scene.collections() {
        let hidden = if collection.hidden { " [hidden]" } else { "" };
        println!("  {} ({} objects){}", collection.name, collection.objects.len(), hidden);
    }
}

fn scene_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Scene".to_string())
}

fn import(args: &Args) -> Result<bool> {
    let path = args.path(0, "input file")?;
    let params = load_import_params(args.value("params"))?;
    let mut scene = Scene::new(scene_name(&path));

    let outcome = if args.flag("background") {
        let handle = spawn_import(scene, path.clone(), params).context("starting import worker")?;
        while !handle.is_finished() {
            log::debug!("Import progress {:.0}%", handle.progress() * 100.0);
            thread::sleep(Duration::from_millis(50));
        }
        let (imported, outcome) = handle.wait().context("import worker")?;
        scene = imported;
        outcome
    } else {
        import_usd(&mut scene, &path, &params)
    };

    print_outcome("import", &outcome);
    if outcome.success {
        print_scene(&scene);
    }
    Ok(outcome.success)
}

fn convert(args: &Args) -> Result<bool> {
    let input = args.path(0, "input file")?;
    let output = args.path(1, "output file")?;
    let import_params = load_import_params(args.value("import-params"))?;
    let export_params = load_export_params(args.value("export-params"))?;

    let mut scene = Scene::new(scene_name(&input));
    let outcome = import_usd(&mut scene, &input, &import_params);
    print_outcome("import", &outcome);
    if !outcome.success {
        return Ok(false);
    }

    let outcome = export_usd(&mut scene, &output, &export_params);
    print_outcome("export", &outcome);
    Ok(outcome.success)
}

fn run() -> Result<bool> {
    let mut raw = env::args().skip(1);
    let Some(command) = raw.next() else {
        bail!("{}", USAGE);
    };
    match command.as_str() {
        "inspect" => inspect(&Args::parse(raw, &[])?),
        "import" => import(&Args::parse(raw, &["params"])?),
        "convert" => convert(&Args::parse(raw, &["import-params", "export-params"])?),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(true)
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str], valued: &[&str]) -> Args {
        Args::parse(list.iter().map(|s| s.to_string()), valued).unwrap()
    }

    #[test]
    fn test_parse_args() {
        let a = args(&["in.usda", "--background", "--params", "p.json"], &["params"]);
        assert_eq!(a.positional, vec!["in.usda".to_string()]);
        assert!(a.flag("background"));
        assert_eq!(a.value("params"), Some("p.json"));
        assert!(a.value("background").is_none());
    }

    #[test]
    fn test_missing_option_value() {
        assert!(Args::parse(["--params".to_string()].into_iter(), &["params"]).is_err());
    }

    #[test]
    fn test_missing_positional() {
        let a = args(&[], &[]);
        assert!(a.path(0, "input file").is_err());
    }
}
