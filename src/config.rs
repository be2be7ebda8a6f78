use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "coderunner", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,

    /// Name of the configured language to judge the submission as
    #[arg(long = "language", short = 'l')]
    pub language: String,

    /// Path to the submitted source file
    pub source_path: String,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> std::io::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    /// Base image every language tag is appended to
    pub image: String,
    pub languages: Vec<LanguageConfig>,
}

#[derive(Deserialize, Debug)]
pub struct LanguageConfig {
    pub name: String,
    /// Image tag selecting this language's toolchain
    pub tag: String,
    /// Filename the source is injected as inside the workspace
    pub file_name: String,
    /// Shell fragment for the compile step; blank means no compile step
    #[serde(default)]
    pub compile_command: String,
    /// Shell fragment for the run step
    pub run_command: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.image, "odanado/os-command-injection");
        assert_eq!(config.languages[0].name, "bash");
        assert_eq!(config.languages[0].file_name, "Main.sh");
        assert!(config.languages[0].compile_command.contains("tr -d"));
    }

    #[test]
    fn missing_compile_command_defaults_to_blank() {
        let config: LanguageConfig = serde_json::from_str(
            r#"{ "name": "python", "tag": "py3", "file_name": "main.py",
                 "run_command": "python3 main.py" }"#,
        )
        .unwrap();
        assert_eq!(config.compile_command, "");
    }
}
