//! ExportTranscript handler.
//!
//! Renders the session into the downloadable document and hands it to the
//! configured storage. Available from the moment the reflection is
//! submitted, whether or not the evaluation has arrived.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::ports::{ExportError, ExportStorage, ExportedDocument, SavedExport, TranscriptExporter};

use super::SharedSession;

/// Handler for transcript exports.
#[derive(Clone)]
pub struct ExportTranscriptHandler {
    exporter: Arc<dyn TranscriptExporter>,
    storage: Arc<dyn ExportStorage>,
}

impl ExportTranscriptHandler {
    pub fn new(exporter: Arc<dyn TranscriptExporter>, storage: Arc<dyn ExportStorage>) -> Self {
        Self { exporter, storage }
    }

    /// Renders the document without saving it.
    pub async fn render(
        &self,
        session: &SharedSession,
        generated_on: NaiveDate,
    ) -> Result<ExportedDocument, ExportError> {
        let session = session.lock().await;
        self.exporter.export(&session, generated_on)
    }

    /// Renders and saves the document.
    pub async fn handle(
        &self,
        session: &SharedSession,
        generated_on: NaiveDate,
    ) -> Result<SavedExport, ExportError> {
        let document = self.render(session, generated_on).await?;

        match self.storage.save(&document).await {
            Ok(saved) => {
                tracing::info!(
                    filename = %document.filename,
                    path = %saved.path.display(),
                    "Transcript exported"
                );
                Ok(saved)
            }
            Err(err) => {
                tracing::error!(
                    filename = %document.filename,
                    error = %err,
                    "Failed to save transcript export"
                );
                Err(err.into())
            }
        }
    }
}
