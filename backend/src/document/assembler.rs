use crate::document::page_image::{prepare_for_pdf, PreparedImage};
use crate::error::AssemblyError;
use crate::scanner::pairing::PagePair;
use genpdf::elements::{Break, Image as PdfImage, PageBreak, Paragraph};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Style, StyledString};
use genpdf::{Alignment, Document, PaperSize, SimplePageDecorator};
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

const MARGIN_MM: f64 = 10.0;
const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
/// Room kept above the image for the caption line and its spacing.
const CAPTION_BLOCK_MM: f64 = 20.0;
const CAPTION_FONT_SIZE: u8 = 12;
const FALLBACK_FONT: &str = "LiberationSans";

/// Renders paired page images into a single A4 PDF, one PDF page per side.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    font_dir: PathBuf,
    font_family: String,
}

impl DocumentAssembler {
    pub fn new(font_dir: impl Into<PathBuf>, font_family: impl Into<String>) -> Self {
        Self {
            font_dir: font_dir.into(),
            font_family: font_family.into(),
        }
    }

    /// Writes `pairs` to `output`, which must not exist yet.
    ///
    /// Each present side becomes one page: a bold `Page <n> - Front|Back`
    /// caption, then the image across the full printable width. Intermediate
    /// image files are gone when this returns, and so is `output` if rendering
    /// failed part way.
    pub fn assemble(
        &self,
        pairs: &[PagePair<Vec<u8>>],
        output: &Path,
        title: &str,
    ) -> Result<(), AssemblyError> {
        if pairs.is_empty() {
            return Err(AssemblyError::NothingToRender);
        }

        let mut doc = self.configure_document(title)?;
        // Keep temporary image files alive until rendering finishes.
        let mut temp_files: Vec<PreparedImage> = Vec::new();

        let max_width_mm = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
        let max_height_mm = PAGE_HEIGHT_MM - 2.0 * MARGIN_MM - CAPTION_BLOCK_MM;

        let mut first_page = true;
        for (index, pair) in pairs.iter().enumerate() {
            for (side, bytes) in pair.sides() {
                if !first_page {
                    doc.push(PageBreak::new());
                }
                first_page = false;

                let mut caption = Paragraph::new("");
                caption.push(StyledString::new(
                    format!("Page {} - {}", index + 1, side.label()),
                    Style::new().bold().with_font_size(CAPTION_FONT_SIZE),
                ));
                doc.push(caption);
                doc.push(Break::new(1));

                let prepared = prepare_for_pdf(bytes, max_width_mm, max_height_mm)?;
                let mut img = PdfImage::from_path(prepared.file.path())
                    .map_err(|e| AssemblyError::Render(e.to_string()))?;
                img.set_dpi(prepared.dpi);
                img.set_alignment(Alignment::Center);
                doc.push(img);
                temp_files.push(prepared);
            }
        }

        let mut out_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(output)?;
        let rendered = doc.render(&mut out_file);
        drop(out_file);

        if let Err(e) = rendered {
            if let Err(rm) = fs::remove_file(output) {
                warn!("Failed to remove partial PDF {}: {}", output.display(), rm);
            }
            return Err(AssemblyError::Render(e.to_string()));
        }

        debug!(
            "Rendered {} page image(s) into {}",
            temp_files.len(),
            output.display()
        );
        // temp_files dropped and cleaned up here
        Ok(())
    }

    fn configure_document(&self, title: &str) -> Result<Document, AssemblyError> {
        let font_family = self.load_font()?;
        let mut doc = Document::new(font_family);
        doc.set_title(title);
        doc.set_paper_size(PaperSize::A4);

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(MARGIN_MM as i32);
        doc.set_page_decorator(decorator);
        Ok(doc)
    }

    /// Tries the configured family first, then LiberationSans from the same
    /// directory.
    fn load_font(&self) -> Result<FontFamily<FontData>, AssemblyError> {
        match genpdf::fonts::from_files(&self.font_dir, &self.font_family, None) {
            Ok(family) => Ok(family),
            Err(first) => genpdf::fonts::from_files(&self.font_dir, FALLBACK_FONT, None).map_err(
                |_| {
                    AssemblyError::Font(format!(
                        "{} in {}: {}",
                        self.font_family,
                        self.font_dir.display(),
                        first
                    ))
                },
            ),
        }
    }
}
