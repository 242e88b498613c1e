//! `eryn` — compiles and renders eryn templates from the command line.
//!
//! Thin binary over `eryn-core`/`eryn-compiler`/`eryn-render`/`eryn-eval`:
//! parsing arguments, wiring up logging, and delegating straight into those
//! crates. No logic lives here that the library crates don't already own.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use eryn_compiler::{compile, CompilerOptions, Marker};
use eryn_core::buffer::ConstBuffer;
use eryn_eval::{EvalState, Evaluator, Value};
use eryn_render::{Engine, RenderOptions};

#[derive(Debug, Parser)]
#[command(name = "eryn", version, about = "Compile and render eryn templates", long_about = None)]
struct Opt {
    /// Increase verbosity (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode; overrides verbosity.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    /// Force colored output on or off.
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a template source file to OSH bytecode.
    Compile {
        /// Source file to compile (`-` for stdin).
        input: PathBuf,
        /// Output `.osh` file (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the OSH bytes to `<input>.osh` alongside the source.
        #[arg(long)]
        debug: bool,
    },

    /// Render a template against a JSON context file.
    Render {
        /// Template source file to compile and render.
        template: PathBuf,
        /// JSON file supplying the render context; defaults to `{}`.
        #[arg(long)]
        context: Option<PathBuf>,
        /// Output file (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Evaluate expressions in `strict` mode instead of `normal`.
        #[arg(long)]
        strict: bool,
    },

    /// Print a human-readable listing of an OSH file's pairs.
    Disasm {
        /// Compiled `.osh` file to disassemble.
        input: PathBuf,
    },
}

fn init_telemetry(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn init_color(choice: ColorChoice) {
    match choice {
        ColorChoice::Auto => {}
        ColorChoice::Always => {
            std::env::set_var("CLICOLOR_FORCE", "1");
            std::env::remove_var("NO_COLOR");
        }
        ColorChoice::Never => {
            std::env::set_var("NO_COLOR", "1");
            std::env::remove_var("CLICOLOR_FORCE");
        }
    }
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> Result<()> {
    let opt = Opt::parse();
    init_color(opt.color);
    init_telemetry(opt.verbose, opt.quiet);

    match opt.cmd {
        Command::Compile { input, output, debug } => run_compile(&input, output.as_deref(), debug),
        Command::Render { template, context, output, strict } => run_render(&template, context.as_deref(), output.as_deref(), strict),
        Command::Disasm { input } => run_disasm(&input),
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).context("reading stdin")?;
        Ok(buf)
    } else {
        fs::read(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => fs::write(path, bytes).with_context(|| format!("writing {}", path.display())),
        None => io::stdout().write_all(bytes).context("writing to stdout"),
    }
}

fn run_compile(input: &Path, output: Option<&Path>, debug: bool) -> Result<()> {
    let source = read_input(input)?;
    let origin = input.to_string_lossy().into_owned();
    let options = CompilerOptions {
        debug_dump_osh: debug,
        working_dir: input.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        ..CompilerOptions::default()
    };

    let osh = compile(&source, origin.clone(), &options).map_err(|e| anyhow::anyhow!("{e}")).with_context(|| format!("compiling {origin}"))?;

    let out = output.map(PathBuf::from).or_else(|| (input.as_os_str() != "-").then(|| input.with_extension("osh")));
    write_output(out.as_deref(), &osh)
}

fn run_render(template: &Path, context: Option<&Path>, output: Option<&Path>, strict: bool) -> Result<()> {
    let context_value: Value = match context {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display()))?;
            Value::from(json)
        }
        None => Value::object(),
    };

    let mut compiler_options = CompilerOptions::default();
    if let Some(parent) = template.parent() {
        compiler_options.working_dir = parent.to_path_buf();
    }
    let render_options = RenderOptions::default();
    let mut engine = Engine::new(compiler_options, render_options);

    let source = read_input(template)?;
    let origin = template.file_name().map_or_else(|| template.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned());
    engine.compile(&source, origin.clone()).map_err(|e| anyhow::anyhow!("{e}")).with_context(|| format!("compiling {origin}"))?;

    let evaluator = if strict { Evaluator::strict() } else { Evaluator::normal() };
    let mut bridge = EvalState::new(evaluator, context_value, Value::object());

    let rendered = engine.render(&origin, &mut bridge).map_err(|e| anyhow::anyhow!("{e}")).with_context(|| format!("rendering {origin}"))?;
    write_output(output, &rendered)
}

fn run_disasm(input: &Path) -> Result<()> {
    let osh = read_input(input)?;
    let buf = ConstBuffer::new(&osh);
    let mut offset = 0;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "{:>6}  {:<4}  {:>8}  {:>8}  name", "offset", "mark", "name_len", "value_len")?;
    while offset < buf.end() {
        let (name, value, next) = buf.read_pair(offset).map_err(|e| anyhow::anyhow!("{e}")).with_context(|| format!("decoding pair at offset {offset}"))?;
        let marker = name.first().copied().unwrap_or(0);
        let label = marker_label(marker);
        let name_text = String::from_utf8_lossy(&name[1.min(name.len())..]);
        writeln!(out, "{offset:>6}  {label:<4}  {:>8}  {:>8}  {name_text}", name.len(), value.len())?;
        offset = next;
    }
    Ok(())
}

fn marker_label(marker: u8) -> &'static str {
    match marker {
        Marker::PLAINTEXT => "p",
        Marker::NORMAL => "t",
        Marker::VOID => "v",
        Marker::CONDITIONAL => "?",
        Marker::ELSE_CONDITIONAL => "e",
        Marker::ELSE => "E",
        Marker::LOOP_FORWARD => "@",
        Marker::LOOP_REVERSE => "~",
        Marker::COMPONENT => "%",
        Marker::CONDITIONAL_END => "C",
        Marker::LOOP_END => "L",
        Marker::COMPONENT_END => "M",
        _ => "?!",
    }
}
