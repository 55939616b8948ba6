use std::path::Path;

use anyhow::{bail, Result};

use agrispectral::config::AppConfig;
use agrispectral::data::export::{export_csv, export_parquet};
use agrispectral::data::loader::FileSource;
use agrispectral::data::source::SampleSource;
use agrispectral::data::synthetic::SyntheticSource;
use agrispectral::session::Session;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: AppConfig,

    /// Current analytics session (None only if the last load failed).
    pub session: Option<Session>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Show the spectral signature of every visible sample, not only the
    /// selected one.
    pub overlay_all: bool,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            session: None,
            status_message: None,
            overlay_all: false,
        }
    }

    /// Replace the session with one started from `source`.
    pub fn load_source(&mut self, source: &dyn SampleSource) {
        match Session::start(source, &self.config.pipeline) {
            Ok(session) => {
                self.session = Some(session);
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to load {}: {e:#}", source.describe());
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    pub fn load_synthetic(&mut self) {
        let source = SyntheticSource::new(&self.config.synthetic);
        self.load_source(&source);
    }

    pub fn load_path(&mut self, path: &Path) {
        let source = FileSource::new(path, self.config.emulation);
        self.load_source(&source);
    }

    /// Export the session's sample table; format by extension.
    pub fn export(&mut self, path: &Path) {
        match self.try_export(path) {
            Ok(()) => self.status_message = Some(format!("Exported to {}", path.display())),
            Err(e) => {
                log::error!("Export failed: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    fn try_export(&self, path: &Path) -> Result<()> {
        let Some(session) = &self.session else {
            bail!("nothing to export");
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => export_csv(path, session),
            "parquet" | "pq" => export_parquet(path, session),
            other => bail!("Unsupported export extension: .{other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_load_replaces_session() {
        let mut state = AppState::new(AppConfig::default());
        state.load_synthetic();
        assert_eq!(state.session.as_ref().map(|s| s.samples().len()), Some(100));
        assert!(state.status_message.is_none());
    }

    #[test]
    fn failed_load_keeps_previous_session() {
        let mut state = AppState::new(AppConfig::default());
        state.load_synthetic();
        state.load_path(Path::new("/definitely/missing.json"));
        assert!(state.session.is_some());
        assert!(state.status_message.as_deref().unwrap_or("").starts_with("Error"));
    }

    #[test]
    fn export_rejects_unknown_extension() {
        let mut state = AppState::new(AppConfig::default());
        state.load_synthetic();
        let path = std::env::temp_dir().join("agrispectral_state_export.xlsx");
        state.export(&path);
        assert!(state
            .status_message
            .as_deref()
            .unwrap_or("")
            .contains("Unsupported"));
    }
}
