use anyhow::Context;
use clap::Parser;

use coderunner::config::CliArgs;
use coderunner::runner::{ExecutionRequest, create_code_runner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().context("Failed to load configuration")?;

    let language = config
        .languages
        .iter()
        .find(|l| l.name == cli.language)
        .with_context(|| format!("Language '{}' is not configured", cli.language))?;

    let source_code = std::fs::read_to_string(&cli.source_path)
        .with_context(|| format!("Failed to read source file {}", cli.source_path))?;

    let runner = create_code_runner(&config.image)?;
    let request = ExecutionRequest {
        source_code,
        image_tag: language.tag.clone(),
        filename: language.file_name.clone(),
        compile_command: language.compile_command.clone(),
        run_command: language.run_command.clone(),
    };

    let results = runner.run(&request).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}
