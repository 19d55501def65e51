//! Built-in tools for the weather and onboarding agents.

pub mod ask_location;
pub mod company_enrichment;
pub mod end_onboarding;
pub mod fetch_weather;
pub mod profile_persistence;

use std::sync::Arc;

pub use ask_location::AskLocationTool;
pub use company_enrichment::{CompanyEnricher, CompanyEnrichmentTool, EnrichmentResult, HttpEnricher, VerifiedCompany};
pub use end_onboarding::EndOnboardingTool;
pub use fetch_weather::{FetchWeatherTool, OpenMeteo, WeatherReport, WeatherSource};
pub use profile_persistence::ProfilePersistenceTool;

use crate::profile::ProfileService;
use crate::tools::{ToolError, ToolRegistry};

/// External services the built-in tools talk to.
#[derive(Clone)]
pub struct BuiltinDeps {
    pub weather: Arc<dyn WeatherSource>,
    pub enricher: Arc<dyn CompanyEnricher>,
    pub profiles: ProfileService,
}

/// Register every built-in tool.
pub fn register_builtins(registry: &ToolRegistry, deps: BuiltinDeps) -> Result<(), ToolError> {
    registry.register(Arc::new(AskLocationTool))?;
    registry.register(Arc::new(FetchWeatherTool::new(deps.weather)))?;
    registry.register(Arc::new(CompanyEnrichmentTool::new(deps.enricher)))?;
    registry.register(Arc::new(ProfilePersistenceTool::new(deps.profiles)))?;
    registry.register(Arc::new(EndOnboardingTool))?;
    tracing::info!("Registered {} built-in tools", registry.count());
    Ok(())
}
