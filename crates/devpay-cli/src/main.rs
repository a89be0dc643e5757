mod display;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use devpay_core::config::DEFAULT_CONFIG_PATH;
use devpay_core::{CategoricalField, ModelConfig, PipelineError, ProfileRequest, SalaryInput};
use devpay_model::{guardrail, train};
use devpay_store::{ArtifactStore, read_survey};

#[derive(Parser, Debug)]
#[command(name = "devpay", version, about = "Developer salary model: train, predict, inspect")]
struct Cli {
    /// Model configuration file (JSON).
    #[arg(long, global = true, env = "DEVPAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the model on a survey file and write the artifacts
    Train {
        /// Survey CSV or Parquet file
        data: PathBuf,
        /// Artifact directory (overrides training.artifact_dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Predict an annual salary in USD for one profile
    Predict {
        #[command(flatten)]
        models: ModelsArg,
        #[command(flatten)]
        profile: ProfileArgs,
        /// Read the whole request as JSON instead of flags
        #[arg(long, conflicts_with = "country")]
        json: Option<String>,
    },
    /// List the valid values of each categorical field
    Categories {
        #[command(flatten)]
        models: ModelsArg,
        /// Only this field (column or request name)
        #[arg(long)]
        field: Option<CategoricalField>,
    },
    /// Check that the loaded model reacts to its inputs
    Diagnose {
        #[command(flatten)]
        models: ModelsArg,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Per-category quality check from cross-validated predictions
    Guardrail {
        /// Survey CSV or Parquet file
        data: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ModelsArg {
    /// Artifact directory (defaults to training.artifact_dir)
    #[arg(long, env = "DEVPAY_MODELS")]
    models: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long, default_value = "United States of America")]
    country: String,
    #[arg(long, default_value_t = 5.0)]
    years_code: f64,
    #[arg(long, default_value_t = 3.0)]
    work_exp: f64,
    #[arg(long, default_value = "Bachelor's degree (B.A., B.S., B.Eng., etc.)")]
    education_level: String,
    #[arg(long, default_value = "Developer, full-stack")]
    dev_type: String,
    #[arg(long, default_value = "Software Development")]
    industry: String,
    #[arg(long, default_value = "25-34 years old")]
    age: String,
    #[arg(long, default_value = "Individual contributor")]
    ic_or_pm: String,
}

impl From<ProfileArgs> for ProfileRequest {
    fn from(p: ProfileArgs) -> Self {
        Self {
            country: p.country,
            years_code: p.years_code,
            work_exp: p.work_exp,
            education_level: p.education_level,
            dev_type: p.dev_type,
            industry: p.industry,
            age: p.age,
            ic_or_pm: p.ic_or_pm,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    info!("devpay v{}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Train { data, output } => cmd_train(&config, &data, output),
        Command::Predict {
            models,
            profile,
            json,
        } => {
            let request = match json {
                Some(text) => serde_json::from_str(&text).context("parsing --json request")?,
                None => ProfileRequest::from(profile),
            };
            cmd_predict(&config, models, request)
        }
        Command::Categories { models, field } => cmd_categories(&config, models, field),
        Command::Diagnose { models, profile } => cmd_diagnose(&config, models, profile.into()),
        Command::Guardrail { data } => cmd_guardrail(&config, &data),
    }
}

fn load_config(path: &Path) -> anyhow::Result<ModelConfig> {
    let config = ModelConfig::load(path)?;
    if config.training.verbose {
        info!(path = %path.display(), "configuration loaded");
    }
    Ok(config)
}

fn store(config: &ModelConfig, models: Option<PathBuf>) -> ArtifactStore {
    ArtifactStore::new(models.unwrap_or_else(|| config.training.artifact_dir.clone()))
}

fn load_predictor(config: &ModelConfig, models: ModelsArg) -> anyhow::Result<devpay_model::Predictor> {
    let store = store(config, models.models);
    let predictor = store
        .load_predictor(&config.features.cardinality.other_category)
        .with_context(|| format!("loading artifacts from {}", store.dir().display()))?;
    Ok(predictor)
}

/// Point request errors at the value listing; deployment errors pass through.
fn rejected(err: PipelineError) -> anyhow::Error {
    if err.is_user_error() {
        anyhow::Error::new(err).context("request rejected; run `devpay categories` to list accepted values")
    } else {
        err.into()
    }
}

// ── Commands ──

fn cmd_train(config: &ModelConfig, data: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let rows = read_survey(data).with_context(|| format!("reading {}", data.display()))?;
    let outcome = train(rows, config)?;
    display::print_training_report(&outcome.report, &outcome.artifact.cv);

    let store = store(config, output);
    store.save(&outcome).context("saving artifacts")?;
    println!("Artifacts written to {}", store.dir().display());
    Ok(())
}

fn cmd_predict(config: &ModelConfig, models: ModelsArg, request: ProfileRequest) -> anyhow::Result<()> {
    let predictor = load_predictor(config, models)?;
    let country = request.country.clone();
    let input = SalaryInput::new(request).map_err(rejected)?;
    let salary = predictor.predict(&input).map_err(rejected)?;
    let local = predictor.local_currency(&country, salary);
    if local.is_none() {
        warn!(country = %country, "no currency rate for country");
    }
    display::print_prediction(salary, local.as_ref());
    Ok(())
}

fn cmd_categories(
    config: &ModelConfig,
    models: ModelsArg,
    field: Option<CategoricalField>,
) -> anyhow::Result<()> {
    let store = store(config, models.models);
    let vocabulary = store.load_vocabulary()?;
    let fields = match field {
        Some(f) => vec![f],
        None => CategoricalField::ALL.to_vec(),
    };
    for f in fields {
        display::print_values(f, vocabulary.values(f));
    }
    Ok(())
}

fn cmd_diagnose(config: &ModelConfig, models: ModelsArg, request: ProfileRequest) -> anyhow::Result<()> {
    let predictor = load_predictor(config, models)?;
    let input = SalaryInput::new(request).map_err(rejected)?;
    let diagnosis = predictor.diagnose(&input)?;
    let row = predictor.encode(&input)?;
    display::print_diagnosis(&diagnosis, &row)?;
    if !diagnosis.is_sensitive() {
        bail!("model is insensitive to at least one input; check the encoding pipeline");
    }
    Ok(())
}

fn cmd_guardrail(config: &ModelConfig, data: &Path) -> anyhow::Result<()> {
    let rows = read_survey(data).with_context(|| format!("reading {}", data.display()))?;
    let report = guardrail::evaluate(rows, config)?;
    display::print_guardrail_report(&report, &config.guardrails);
    if !report.passed() {
        bail!("{} guardrail violation(s)", report.violations.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn predict_flags_default_to_reference_profile() {
        let cli = Cli::try_parse_from(["devpay", "predict", "--country", "Germany", "--years-code", "12"]).unwrap();
        let Command::Predict { profile, json, .. } = cli.command else {
            panic!("expected predict");
        };
        assert!(json.is_none());
        let request = ProfileRequest::from(profile);
        assert_eq!(request.country, "Germany");
        assert_eq!(request.years_code, 12.0);
        assert_eq!(request.ic_or_pm, "Individual contributor");
    }

    #[test]
    fn categories_field_parses_either_name() {
        for name in ["EdLevel", "education_level"] {
            let cli = Cli::try_parse_from(["devpay", "categories", "--field", name]).unwrap();
            assert!(matches!(
                cli.command,
                Command::Categories { field: Some(CategoricalField::EdLevel), .. }
            ));
        }
        assert!(Cli::try_parse_from(["devpay", "categories", "--field", "Salary"]).is_err());
    }

    #[test]
    fn request_errors_point_at_categories() {
        let err = rejected(PipelineError::InvalidNumericRange {
            field: "years_code",
            value: -1.0,
        });
        assert!(err.to_string().contains("devpay categories"), "{err}");
        assert!(format!("{err:#}").contains("years_code"), "{err:#}");

        let err = rejected(PipelineError::SchemaMismatch("stale vocabulary".into()));
        assert!(!err.to_string().contains("devpay categories"), "{err}");
    }
}
