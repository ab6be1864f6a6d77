//! CLI runner - executes the export

use crate::cli::commands::Cli;
use crate::config::ExportConfig;
use crate::credential::{CredentialProvider, EnvProvider, PromptProvider};
use crate::engine::FetchEngine;
use crate::error::Result;
use crate::http::HttpClient;
use crate::output::CsvExporter;
use crate::window::TimeWindow;
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
    provider: Option<Box<dyn CredentialProvider>>,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            provider: None,
        }
    }

    /// Use `provider` instead of the one selected by the flags
    #[must_use]
    pub fn with_credential_provider(mut self, provider: Box<dyn CredentialProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Run the export, returning the number of records written.
    ///
    /// Nothing is written when any page fails; the output file is only
    /// touched once every record is in memory.
    pub async fn run(&self) -> Result<usize> {
        let config = self.resolve_config()?;
        let credential = match &self.provider {
            Some(provider) => provider.credential().await?,
            None => self.default_provider().credential().await?,
        };

        let window = TimeWindow::trailing();
        info!(
            from = %window.start_param(),
            to = %window.end_param(),
            "Listing converged recordings"
        );

        let client = HttpClient::with_config(config.http_config())?;
        let engine = FetchEngine::new(client, config.paginator(), config.fetch_config())
            .with_decoder(Box::new(config.decoder()));

        let result = engine.fetch_all(&credential, &window).await?;
        let stats = result.stats();
        if stats.duplicate_ids > 0 {
            info!(
                duplicates = stats.duplicate_ids,
                "Some record ids appeared more than once; all rows were kept"
            );
        }

        let exporter = CsvExporter::with_options(config.export_options());
        let written = exporter.export(&result, &config.output.path)?;

        info!(
            records = written,
            pages = stats.pages,
            throttled = stats.throttled,
            retried = stats.retried,
            duration_ms = stats.duration_ms,
            "Export complete: {}",
            config.output.path.display()
        );
        Ok(written)
    }

    /// Load the config file (if any) and apply command-line overrides
    pub fn resolve_config(&self) -> Result<ExportConfig> {
        let mut config = match &self.cli.config {
            Some(path) => {
                debug!(path = %path.display(), "Loading config");
                ExportConfig::load(path)?
            }
            None => ExportConfig::default(),
        };

        if let Some(output) = &self.cli.output {
            config.output.path = output.clone();
        }
        if let Some(base_url) = &self.cli.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(page_size) = self.cli.page_size {
            config.page_size = page_size;
        }
        let columns: Vec<String> = self
            .cli
            .columns
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if !columns.is_empty() {
            config.output.pinned_columns = columns;
        }

        config.validate()?;
        Ok(config)
    }

    fn default_provider(&self) -> Box<dyn CredentialProvider> {
        match &self.cli.token_env {
            Some(var) => Box::new(EnvProvider::new(var.clone())),
            None => Box::new(PromptProvider::default()),
        }
    }
}
