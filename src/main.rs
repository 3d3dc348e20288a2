use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::debug;

use py2c::driver;
use py2c::{Translator, TranslatorOptions};

#[derive(Parser, Debug)]
#[command(name = "py2c", version, about = "Translate a small Python subset into C")]
struct Cli {
    /// Python source file ('-' or omitted reads stdin)
    input: Option<PathBuf>,

    /// C output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Spaces per indentation level in the generated C
    #[arg(long, default_value_t = 4)]
    indent_width: usize,

    /// Do not declare assigned variables at the top of main
    #[arg(long, default_value_t = false)]
    no_declarations: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    debug!("{cli:?}");

    let translator = Translator::new(TranslatorOptions {
        indent_width: cli.indent_width,
        declare_variables: !cli.no_declarations,
    });

    match (&cli.input, &cli.output) {
        (Some(input), Some(output)) if input.as_os_str() != "-" => {
            driver::translate_file(input, output, &translator)
        }
        _ => {
            let source = driver::read_source(cli.input.as_deref())?;
            let c_source = translator.translate_source(&source)?;
            driver::write_output(cli.output.as_deref(), &c_source)
        }
    }
}
