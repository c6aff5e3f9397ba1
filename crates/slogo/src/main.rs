use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use slogo::{Config, Interpreter};

#[derive(Parser, Debug)]
struct Args {
    /// The program to run.
    input: PathBuf,

    /// Language of the instruction names: English, French, or a rule file.
    #[clap(short, long, default_value = "English")]
    language: String,

    /// More languages to accept alongside the main one.
    #[clap(long)]
    also: Vec<String>,

    /// Rule set for token kinds.
    #[clap(long, default_value = "Syntax")]
    syntax: String,

    /// Number of turtles to start with.
    #[clap(short, long, default_value_t = 1)]
    turtles: usize,

    /// Maximum nesting of procedure calls.
    #[clap(long, default_value_t = 256)]
    max_depth: usize,

    /// Maximum nesting of expressions in the program text.
    #[clap(long, default_value_t = slogo::parse::DEFAULT_MAX_NESTING)]
    max_nesting: usize,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to open input file {}", args.input.display()))?;

    let config = Config {
        language: args.language,
        syntax: args.syntax,
        turtles: args.turtles,
        max_depth: args.max_depth,
        max_nesting: args.max_nesting,
    };
    let mut interp = Interpreter::new(config).context("failed to load rule sets")?;
    for lang in &args.also {
        interp
            .add_language(lang)
            .with_context(|| format!("failed to load language {lang}"))?;
    }
    interp
        .symbols
        .register(|vars| log::debug!("{} variables defined", vars.len()));

    let value = interp
        .run(&input)
        .map_err(|e| anyhow!("{}: {e}", args.input.display()))?;

    println!("result: {value}");
    for t in interp.turtles.iter() {
        println!(
            "turtle {}: at ({:.2}, {:.2}) heading {:.2}, pen {}{}{}",
            t.id(),
            t.position.x,
            t.position.y,
            t.heading_degrees(),
            if t.pen_down { "down" } else { "up" },
            if t.visible { "" } else { ", hidden" },
            if t.moved() { ", moved" } else { "" },
        );
    }
    print!("{}", interp.symbols);
    Ok(())
}
