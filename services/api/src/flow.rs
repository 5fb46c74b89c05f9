use clap::Args;
use orryin::config::AppConfig;
use orryin::error::AppError;
use orryin::telemetry;
use orryin::workflows::onboarding::FlowProfileInput;

use crate::infra::build_services;

#[derive(Args, Debug, Default)]
pub(crate) struct FlowArgs {
    /// Applicant name; split on the first space into first and last name
    #[arg(long)]
    pub(crate) name: Option<String>,
    /// Email for the new user. A unique address is generated when omitted.
    #[arg(long)]
    pub(crate) email: Option<String>,
    /// ISO 3166-1 alpha-3 country code
    #[arg(long)]
    pub(crate) country: Option<String>,
}

impl From<FlowArgs> for FlowProfileInput {
    fn from(args: FlowArgs) -> Self {
        FlowProfileInput {
            name: args.name,
            email: args.email,
            country: args.country,
        }
    }
}

/// Runs one onboarding flow and prints the snapshot as JSON.
pub(crate) async fn run_flow(args: FlowArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let services = build_services(&config).await?;
    let snapshot = services.flow.run_full_flow(args.into()).await?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
