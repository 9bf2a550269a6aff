//! Registry to document linearization

use chrono::NaiveDateTime;
use ede_artifact::{
    Annotation, AnnotationKind, Artifact, ArtifactKey, ArtifactPayload, ArtifactRegistry,
};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::document::{
    truncation_note, Block, Report, ReportSection, ReportSettings, TextBlock, KEY_VALUE_HEADER,
};
use crate::error::{ReportError, ReportResult};
use crate::html::render_html;
use crate::scale::{dimensions, fit_width};

/// Keep the last artifact per key, in first-seen key order
#[must_use]
pub fn dedupe_last_wins<'a, I>(artifacts: I) -> Vec<&'a Artifact>
where
    I: IntoIterator<Item = &'a Artifact>,
{
    let mut by_key: IndexMap<&ArtifactKey, &Artifact> = IndexMap::new();
    for artifact in artifacts {
        by_key.insert(artifact.key(), artifact);
    }
    by_key.into_values().collect()
}

/// Builds reports from a registry
#[derive(Debug, Clone, Default)]
pub struct ReportAssembler {
    settings: ReportSettings,
}

impl ReportAssembler {
    /// Create assembler with layout settings
    #[must_use]
    pub fn new(settings: ReportSettings) -> Self {
        Self { settings }
    }

    /// Layout settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Linearize the registry into a document model.
    ///
    /// # Errors
    ///
    /// [`ReportError::EmptyReport`] when nothing is registered.
    pub fn assemble(
        &self,
        registry: &ArtifactRegistry,
        question: Option<&str>,
        generated_at: NaiveDateTime,
    ) -> ReportResult<Report> {
        if registry.is_empty() {
            return Err(ReportError::EmptyReport);
        }

        let sections: Vec<ReportSection> = dedupe_last_wins(registry.iter())
            .into_iter()
            .map(|artifact| self.section(artifact, &registry.get_annotations(artifact.key())))
            .collect();

        debug!(sections = sections.len(), "assembled report");
        Ok(Report {
            title: self.settings.title.clone(),
            generated_at,
            question: question
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            sections,
        })
    }

    /// Assemble and render to document bytes.
    ///
    /// # Errors
    ///
    /// [`ReportError::EmptyReport`] when nothing is registered.
    pub fn build_report(
        &self,
        registry: &ArtifactRegistry,
        question: Option<&str>,
        generated_at: NaiveDateTime,
    ) -> ReportResult<Vec<u8>> {
        let report = self.assemble(registry, question, generated_at)?;
        let html = render_html(&report);
        info!(
            sections = report.sections.len(),
            bytes = html.len(),
            "report built"
        );
        Ok(html.into_bytes())
    }

    fn section(&self, artifact: &Artifact, annotations: &[&Annotation]) -> ReportSection {
        ReportSection {
            key: artifact.key().clone(),
            title: artifact.title().to_string(),
            body: self.body(artifact),
            texts: self.texts(annotations),
        }
    }

    fn body(&self, artifact: &Artifact) -> Block {
        let mut block = self.payload_block(artifact);
        if let (Block::Table { header, rows }, Some(omitted)) =
            (&mut block, artifact.metadata().truncated_rows)
        {
            let mut note = vec![truncation_note(omitted)];
            note.resize(header.len().max(1), String::new());
            rows.push(note);
        }
        block
    }

    fn payload_block(&self, artifact: &Artifact) -> Block {
        match artifact.payload() {
            ArtifactPayload::Image { bytes, mime } => {
                if bytes.is_empty() {
                    return Block::ImageMissing;
                }
                let Some((w, h)) = dimensions(bytes) else {
                    warn!(key = %artifact.key(), "unreadable image bytes");
                    return Block::ImageMissing;
                };
                let (width, height) = fit_width(w, h, self.settings.max_image_width_px);
                Block::Image {
                    bytes: bytes.clone(),
                    mime: mime.clone(),
                    width,
                    height,
                }
            }
            ArtifactPayload::KeyValueTable { rows } => Block::Table {
                header: KEY_VALUE_HEADER.iter().map(ToString::to_string).collect(),
                rows: rows
                    .iter()
                    .map(|(k, v)| vec![k.clone(), v.clone()])
                    .collect(),
            },
            ArtifactPayload::RowTable { columns, rows } => {
                let width = columns.len();
                let rows = rows
                    .iter()
                    .map(|row| {
                        let mut row = row.clone();
                        row.resize(width, String::new());
                        row
                    })
                    .collect();
                Block::Table {
                    header: columns.clone(),
                    rows,
                }
            }
        }
    }

    fn texts(&self, annotations: &[&Annotation]) -> Vec<TextBlock> {
        let find = |kind: AnnotationKind| annotations.iter().find(|a| a.kind() == kind);
        let mut texts = Vec::with_capacity(3);

        for kind in [AnnotationKind::Note, AnnotationKind::Legend] {
            if let Some(a) = find(kind).filter(|a| !a.is_blank()) {
                texts.push(TextBlock {
                    kind,
                    label: a.label().to_string(),
                    text: a.text().to_string(),
                    placeholder: false,
                });
            }
        }

        let feedback = find(AnnotationKind::Feedback);
        let label = feedback.map_or(AnnotationKind::Feedback.default_label(), |a| a.label());
        let block = match feedback.filter(|a| !a.is_blank()) {
            Some(a) => TextBlock {
                kind: AnnotationKind::Feedback,
                label: label.to_string(),
                text: a.text().to_string(),
                placeholder: false,
            },
            None => TextBlock {
                kind: AnnotationKind::Feedback,
                label: label.to_string(),
                text: self.settings.placeholder.clone(),
                placeholder: true,
            },
        };
        texts.push(block);
        texts
    }
}
