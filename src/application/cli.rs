#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::env;
use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;
use crate::domain::models::ScenarioTopic;
use crate::infrastructure::backends::BackendManager;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

/// Directory the JSON debug log is written to when `RUST_LOG` mentions osce.
pub fn debug_log_dir() -> path::PathBuf {
    if let Ok(dir) = env::var("OSCE_LOG_DIR") {
        return path::PathBuf::from(dir);
    }

    return dirs::cache_dir()
        .unwrap_or_else(|| return env::temp_dir())
        .join("osce");
}

fn format_topics() -> String {
    return ScenarioTopic::all()
        .iter()
        .map(|topic| {
            return format!("- {:<20} {}", topic.to_string(), topic.label());
        })
        .collect::<Vec<String>>()
        .join("\n");
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!(
        "Created default config file at {}",
        config_file_path.display()
    );
    return Ok(());
}

fn doctor_step(step: u32, text: &str) {
    println!("{}", Paint::green(format!("STEP {step}: {text}")));
}

fn doctor_failure(step: u32, text: &str) -> String {
    return format!("STEP {step}: {text}");
}

/// Settings the doctor command inspects, resolved once from the loaded config.
pub struct DoctorChecks {
    pub config_file: String,
    pub backend: BackendName,
    pub token: String,
    pub model: String,
}

impl DoctorChecks {
    pub fn from_config() -> Result<DoctorChecks> {
        return Ok(DoctorChecks {
            config_file: Config::get(ConfigKey::ConfigFile),
            backend: BackendName::parse(Config::get(ConfigKey::Backend))?,
            token: Config::get(ConfigKey::GeminiToken),
            model: Config::get(ConfigKey::Model),
        });
    }
}

/// Walks through everything a consultation needs before the first request,
/// stopping at the first step that fails. Passed steps go to `report`.
pub async fn run_doctor<B, R>(checks: DoctorChecks, build_backend: B, mut report: R) -> Result<()>
where
    B: FnOnce(BackendName) -> Result<BackendBox>,
    R: FnMut(u32, &str),
{
    let config_file = &checks.config_file;
    if path::Path::new(config_file).exists() {
        report(1, &format!("Loaded config file {config_file}"));
    } else {
        report(
            1,
            &format!("No config file at {config_file}, using defaults and environment"),
        );
    }

    let backend = checks.backend;
    if backend == BackendName::Gemini {
        if checks.token.is_empty() {
            bail!(doctor_failure(
                2,
                "GEMINI_API_KEY not found. Set it in your environment, a .env file in the working directory, or as gemini-token in the config file."
            ));
        }
        let prefix = checks.token.chars().take(5).collect::<String>();
        report(2, &format!("API key found, starts with {prefix}..."));
    } else {
        report(2, &format!("Backend {backend} does not need an API key"));
    }

    let backend_box = match build_backend(backend) {
        Ok(backend_box) => backend_box,
        Err(err) => bail!(doctor_failure(
            3,
            &format!("Failed to set up the {backend} backend: {err}")
        )),
    };
    report(3, &format!("Backend {backend} initialized"));

    let model = &checks.model;
    if let Err(err) = backend_box.health_check().await {
        bail!(doctor_failure(
            4,
            &format!("Backend is set up but model {model} could not be reached. This often means the API key is invalid, region restricted, or lacks access to the model: {err}")
        ));
    }
    report(
        4,
        &format!("Successfully accessed model {model}. The connection is good!"),
    );

    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    let mut cmd = Command::new("debug");
    cmd = cmd.about("Debug helpers for the simulator")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running with environment variable RUST_LOG=osce")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );

    return cmd;
}

fn arg_backend() -> Arg {
    return Arg::new(ConfigKey::Backend.to_string())
        .short('b')
        .long(ConfigKey::Backend.to_string())
        .env("OSCE_BACKEND")
        .num_args(1)
        .help(format!(
            "The model service playing the patient. [default: {}]",
            Config::default(ConfigKey::Backend)
        ))
        .value_parser(PossibleValuesParser::new(BackendName::VARIANTS))
        .global(true);
}

fn arg_backend_health_check_timeout() -> Arg {
    return Arg::new(ConfigKey::BackendHealthCheckTimeout.to_string())
        .long(ConfigKey::BackendHealthCheckTimeout.to_string())
        .env("OSCE_BACKEND_HEALTH_CHECK_TIMEOUT")
        .num_args(1)
        .help(
            format!("Time to wait in milliseconds before timing out when doing a healthcheck for a backend. [default: {}]", Config::default(ConfigKey::BackendHealthCheckTimeout)),
        )
        .global(true);
}

fn arg_model() -> Arg {
    return Arg::new(ConfigKey::Model.to_string())
        .short('m')
        .long(ConfigKey::Model.to_string())
        .env("OSCE_MODEL")
        .num_args(1)
        .help(format!(
            "Model name on the backend. [default: {}]",
            Config::default(ConfigKey::Model)
        ))
        .global(true);
}

fn arg_topic() -> Arg {
    return Arg::new(ConfigKey::Topic.to_string())
        .short('t')
        .long(ConfigKey::Topic.to_string())
        .env("OSCE_TOPIC")
        .num_args(1)
        .help("Scenario topic for the consultation. Prompts with a menu when not set.")
        .value_parser(PossibleValuesParser::new(ScenarioTopic::VARIANTS))
        .global(true);
}

fn subcommand_consult() -> Command {
    return Command::new("consult").about("Start a new consultation. This is the default command.");
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    let topics_text = format!(
        "{}\n{}",
        Paint::new("SCENARIO TOPICS:").underline().bold(),
        format_topics()
    );

    return Command::new("osce")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(topics_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_consult())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .subcommand(
            Command::new("doctor")
                .about("Checks the API key, backend and model access step by step."),
        )
        .subcommand(Command::new("topics").about("List all scenario topics."))
        .arg(arg_backend())
        .arg(arg_backend_health_check_timeout())
        .arg(arg_model())
        .arg(arg_topic())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("OSCE_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::GeminiToken.to_string())
                .long(ConfigKey::GeminiToken.to_string())
                .env("GEMINI_API_KEY")
                .hide_env_values(true)
                .num_args(1)
                .help("Google Gemini API key when using the Gemini backend.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::GeminiURL.to_string())
                .long(ConfigKey::GeminiURL.to_string())
                .env("OSCE_GEMINI_URL")
                .num_args(1)
                .help(format!("Gemini API URL when using the Gemini backend. [default: {}]", Config::default(ConfigKey::GeminiURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OllamaURL.to_string())
                .long(ConfigKey::OllamaURL.to_string())
                .env("OSCE_OLLAMA_URL")
                .num_args(1)
                .help(format!("Ollama API URL when using the Ollama backend. [default: {}]", Config::default(ConfigKey::OllamaURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::PromptsDir.to_string())
                .short('p')
                .long(ConfigKey::PromptsDir.to_string())
                .env("OSCE_PROMPTS_DIR")
                .num_args(1)
                .help(format!("Directory holding patient_system_instruction.txt and feedback_prompt.txt. [default: {}]", Config::default(ConfigKey::PromptsDir)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::MaxRetries.to_string())
                .long(ConfigKey::MaxRetries.to_string())
                .env("OSCE_MAX_RETRIES")
                .num_args(1)
                .help(format!("Attempts made for the feedback request while the model service is overloaded. [default: {}]", Config::default(ConfigKey::MaxRetries)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::RetryInitialDelay.to_string())
                .long(ConfigKey::RetryInitialDelay.to_string())
                .env("OSCE_RETRY_INITIAL_DELAY")
                .num_args(1)
                .help(format!("Delay in milliseconds before the first retry. Doubles on every retry. [default: {}]", Config::default(ConfigKey::RetryInitialDelay)))
                .global(true),
        );
}

pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            match debug_matches.subcommand() {
                Some(("log-path", _)) => {
                    let log_path = debug_log_dir().join("debug.log");
                    println!("{}", log_path.display());
                }
                Some(("enum-config", _)) => {
                    let res = ConfigKey::VARIANTS.join("\n");
                    println!("{}", res);
                }
                _ => {
                    subcommand_debug().print_long_help()?;
                }
            }

            return Ok(false);
        }
        Some(("consult", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("doctor", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            run_doctor(DoctorChecks::from_config()?, BackendManager::get, doctor_step).await?;
            return Ok(false);
        }
        Some(("topics", _)) => {
            println!("{}", format_topics());
            return Ok(false);
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(true);
}
