use anyhow::{anyhow, Context, Result};
use commonsense::{
    analysis::analyze_company,
    core::config::AnalysisConfig,
    edgar::{
        facts::statement_facts,
        parsing::{extract_section, flatten_html},
        report::FormType,
    },
};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "commonsense-cli", about = "Common-size, flux, ratios and MD&A from SEC filings")]
enum Command {
    /// Build statement tables, common-size, flux and ratios from a company-facts JSON file
    Analyze {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        /// Directory to write one CSV per table; prints a summary when omitted
        #[structopt(long, parse(from_os_str))]
        out_dir: Option<PathBuf>,
    },
    /// Extract the MD&A section from a filing document (HTML or plain text)
    Mdna {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        /// Form type, e.g. 10-K, 10-Q or 20-F
        #[structopt(long, default_value = "10-K")]
        form: String,
        /// Treat the input as plain text instead of HTML
        #[structopt(long)]
        text: bool,
    },
}

fn analyze(input: &Path, out_dir: Option<&Path>, config: &AnalysisConfig) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let facts = statement_facts(&raw, &config.statement_tags)?;
    if facts.is_empty() {
        return Err(anyhow!("No statement facts found in {}", input.display()));
    }
    let analysis = analyze_company(&facts, config);

    match out_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            for (name, table) in analysis.tables() {
                let path = dir.join(format!("{}.csv", name));
                let writer = BufWriter::new(File::create(&path)?);
                table.write_csv(writer)?;
                println!("Wrote {}", path.display());
            }
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for (name, table) in analysis.tables() {
                writeln!(
                    out,
                    "{}: {} periods x {} columns",
                    name,
                    table.num_rows(),
                    table.num_columns()
                )?;
            }
            writeln!(out)?;
            analysis.ratios.write_csv(&mut out)?;
        }
    }
    Ok(())
}

fn mdna(input: &Path, form: &str, plain_text: bool, config: &AnalysisConfig) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let text = if plain_text { raw } else { flatten_html(&raw) };
    let form: FormType = form.parse().map_err(|e: String| anyhow!(e))?;

    let section = extract_section(&text, &form, &config.narrative)
        .filter(|section| !section.is_empty())
        .ok_or_else(|| anyhow!("No {} MD&A section found in {}", form, input.display()))?;
    log::info!(
        "Extracted {} section at {}..{}",
        form,
        section.start_offset,
        section.end_offset
    );
    println!("{}", section.cleaned_text);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let command = Command::from_args();
    let config = AnalysisConfig::from_env()?;

    match command {
        Command::Analyze { input, out_dir } => analyze(&input, out_dir.as_deref(), &config),
        Command::Mdna { input, form, text } => mdna(&input, &form, text, &config),
    }
}
