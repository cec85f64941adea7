//! Pagination engines: turn one standalone part document into a paginated PDF.
//!
//! Two strategies share one seam. [`LayoutEngine`] places text by coordinates in process and
//! needs nothing installed. [`CommandEngine`] hands the assembled HTML to an external renderer,
//! such as a headless browser, which paginates it by the CSS page rules.

use crate::config::{EngineConfig, PressConfig};
use crate::model::{Book, BookPart, PartContent};
use crate::pdf::{document_to_bytes, PdfRenderer};
use crate::PressError;
use log::{debug, info};
use std::fs;
use std::process::Command;

/// Everything an engine may need to paginate one part.
pub struct PartDocument<'a> {
    pub book: &'a Book,
    pub part: &'a BookPart,
    pub content: &'a PartContent,
    /// Output of [`crate::assemble::Assembler::assemble_part`].
    pub html: &'a str,
}

pub trait PaginationEngine {
    /// Short name, folded into artifact keys so a change of engine re-renders parts.
    fn name(&self) -> &str;

    fn paginate(&self, document: &PartDocument<'_>) -> Result<Vec<u8>, PressError>;
}

/// In-process engine placing text by manual coordinates.
pub struct LayoutEngine {
    config: PressConfig,
}

impl LayoutEngine {
    pub fn new(config: &PressConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl PaginationEngine for LayoutEngine {
    fn name(&self) -> &str {
        "layout"
    }

    fn paginate(&self, document: &PartDocument<'_>) -> Result<Vec<u8>, PressError> {
        let mut doc = PdfRenderer::new(&self.config).render_content(
            document.book,
            document.part,
            document.content,
        )?;
        doc.compress();
        document_to_bytes(&mut doc)
    }
}

/// External HTML-to-PDF command.
///
/// Arguments may contain `{input}` (path of the HTML file) and `{output}` (path the PDF must be
/// written to); both are substituted before the command runs.
pub struct CommandEngine {
    command: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }

    /// Paginates a complete HTML document.
    pub fn paginate_html(&self, html: &str) -> Result<Vec<u8>, PressError> {
        let workdir = tempfile::tempdir().map_err(|e| {
            PressError::engine_error(format!("creating a working directory: {}", e), None)
        })?;
        let input = workdir.path().join("document.html");
        let output = workdir.path().join("document.pdf");
        fs::write(&input, html).map_err(|e| {
            PressError::engine_error(format!("writing {}: {}", input.display(), e), None)
        })?;

        let input_arg = input.display().to_string();
        let output_arg = output.display().to_string();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input_arg)
                    .replace("{output}", &output_arg)
            })
            .collect();
        debug!("running {} {:?}", self.command, args);

        let result = Command::new(&self.command).args(&args).output().map_err(|e| {
            PressError::engine_error(
                format!("could not start {:?}: {}", self.command, e),
                Some(format!(
                    "Install {} or set [engine] command in the configuration",
                    self.command
                )),
            )
        })?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PressError::engine_error(
                format!(
                    "{} exited with {}: {}",
                    self.command,
                    result.status,
                    stderr.trim()
                ),
                None,
            ));
        }

        let bytes = fs::read(&output).map_err(|e| {
            PressError::engine_error(
                format!("{} produced no output file: {}", self.command, e),
                Some("Check that the arguments pass {output} where the PDF is written".to_string()),
            )
        })?;
        if bytes.is_empty() {
            return Err(PressError::engine_error(
                format!("{} wrote an empty PDF", self.command),
                None,
            ));
        }
        info!("{} produced {} bytes", self.command, bytes.len());
        Ok(bytes)
    }
}

impl PaginationEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.command
    }

    fn paginate(&self, document: &PartDocument<'_>) -> Result<Vec<u8>, PressError> {
        self.paginate_html(document.html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartType;

    fn paginate_with(engine: &dyn PaginationEngine) -> Result<Vec<u8>, PressError> {
        let book = Book {
            id: "b".to_string(),
            title: "T".to_string(),
            ..Default::default()
        };
        let part = BookPart::new(0, PartType::ChapterTitle, r#"{"title":"One"}"#);
        let content = part.decode();
        engine.paginate(&PartDocument {
            book: &book,
            part: &part,
            content: &content,
            html: "<!DOCTYPE html><html><body>One</body></html>",
        })
    }

    #[test]
    fn test_layout_engine_produces_pdf() {
        let engine = LayoutEngine::new(&PressConfig::default());
        let bytes = paginate_with(&engine).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(engine.name(), "layout");
    }

    #[test]
    fn test_missing_command_is_an_engine_error() {
        let engine = CommandEngine::new(&EngineConfig {
            command: "bookpress-no-such-renderer".to_string(),
            args: vec!["{input}".to_string()],
        });
        let err = paginate_with(&engine).unwrap_err();
        assert!(matches!(err, PressError::Engine { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_placeholders_are_substituted() {
        let engine = CommandEngine::new(&EngineConfig {
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "cp \"$0\" \"$1\"".to_string(),
                "{input}".to_string(),
                "{output}".to_string(),
            ],
        });
        let bytes = paginate_with(&engine).unwrap();
        assert_eq!(bytes, b"<!DOCTYPE html><html><body>One</body></html>");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_reports_exit_status() {
        let engine = CommandEngine::new(&EngineConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()],
        });
        let err = paginate_with(&engine).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
