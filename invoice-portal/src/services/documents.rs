//! Invoice and quotation documents: template rendering and PDF conversion.

use askama::Template;
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::Invoice;
use crate::services::amount_words::{amount_in_words, CurrencyLabels};
use crate::services::metrics::DOCUMENTS_RENDERED;
use crate::services::money::format_money;

/// Which printed form of an invoice record to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    Quotation,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Quotation => "quotation",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "Tax Invoice",
            DocumentKind::Quotation => "Quotation",
        }
    }

    /// Download name, e.g. `invoice_REF-001.pdf`. Characters outside
    /// `[A-Za-z0-9._-]` are replaced so the name is a valid header value.
    pub fn filename(&self, reference_no: &str) -> String {
        let safe: String = reference_no
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}.pdf", self.as_str(), safe)
    }
}

/// Everything a document template needs.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub company_name: String,
    pub invoice: Invoice,
    pub amount: String,
    pub vat_amount: String,
    pub total_with_vat: String,
    pub amount_in_words: String,
    pub currency: String,
    pub issued_on: String,
    pub address_lines: Vec<String>,
    pub description_lines: Vec<String>,
}

fn text_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl DocumentContext {
    pub fn new(invoice: Invoice, company_name: &str, labels: &CurrencyLabels) -> Self {
        let total: Decimal = invoice.total_with_vat();
        Self {
            company_name: company_name.to_string(),
            amount: format_money(invoice.amount),
            vat_amount: format_money(invoice.vat_amount()),
            total_with_vat: format_money(total),
            amount_in_words: amount_in_words(total, labels),
            currency: labels.major.clone(),
            issued_on: invoice.date.format("%d %B %Y").to_string(),
            address_lines: text_lines(&invoice.address),
            description_lines: text_lines(&invoice.work_description),
            invoice,
        }
    }
}

#[derive(Template)]
#[template(path = "documents/invoice.html")]
struct InvoiceDocumentTemplate<'a> {
    doc: &'a DocumentContext,
}

#[derive(Template)]
#[template(path = "documents/quotation.html")]
struct QuotationDocumentTemplate<'a> {
    doc: &'a DocumentContext,
}

/// Render the markup for `kind`.
pub fn render_markup(kind: DocumentKind, doc: &DocumentContext) -> Result<String, askama::Error> {
    match kind {
        DocumentKind::Invoice => InvoiceDocumentTemplate { doc }.render(),
        DocumentKind::Quotation => QuotationDocumentTemplate { doc }.render(),
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("PDF engine error: {0}")]
    Engine(String),
    #[error("PDF output error: {0}")]
    Output(String),
}

/// Turns rendered markup into PDF bytes.
pub trait PdfConverter: Send + Sync {
    fn convert(&self, title: &str, markup: &str) -> Result<Vec<u8>, ConversionError>;
}

/// A finished document ready to be sent.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Render `invoice` as `kind` and convert it to PDF. Conversion runs on the
/// blocking pool.
pub async fn render_document(
    kind: DocumentKind,
    invoice: Invoice,
    company_name: &str,
    labels: &CurrencyLabels,
    converter: Arc<dyn PdfConverter>,
) -> Result<RenderedDocument, AppError> {
    let filename = kind.filename(&invoice.reference_no);
    let invoice_id = invoice.id;
    let context = DocumentContext::new(invoice, company_name, labels);
    let markup = render_markup(kind, &context)?;

    let title = format!("{} {}", kind.title(), context.invoice.invoice_number);
    let result = tokio::task::spawn_blocking(move || converter.convert(&title, &markup))
        .await
        .map_err(|e| AppError::DocumentError(anyhow::anyhow!("Conversion task failed: {}", e)))?;

    match result {
        Ok(bytes) => {
            DOCUMENTS_RENDERED
                .with_label_values(&[kind.as_str(), "ok"])
                .inc();
            tracing::info!(
                invoice_id = invoice_id,
                kind = kind.as_str(),
                size = bytes.len(),
                "Document rendered"
            );
            Ok(RenderedDocument { filename, bytes })
        }
        Err(e) => {
            DOCUMENTS_RENDERED
                .with_label_values(&[kind.as_str(), "error"])
                .inc();
            Err(AppError::DocumentError(anyhow::Error::new(e)))
        }
    }
}

// -------------------------------------------------------------------------
// Markup layout
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LineStyle {
    Normal,
    Bold,
    Heading,
    Rule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupLine {
    pub text: String,
    pub style: LineStyle,
}

const BLOCK_TAGS: [&str; 17] = [
    "p", "div", "br", "tr", "li", "ul", "ol", "table", "thead", "tbody", "section", "header",
    "footer", "h1", "h2", "h3", "h4",
];
const SKIPPED_TAGS: [&str; 4] = ["style", "script", "title", "head"];

#[derive(Default)]
struct LayoutState {
    lines: Vec<MarkupLine>,
    current: String,
    style: Option<LineStyle>,
    bold_depth: usize,
    heading_depth: usize,
    skip_depth: usize,
    cell_open: bool,
}

impl LayoutState {
    fn active_style(&self) -> LineStyle {
        if self.heading_depth > 0 {
            LineStyle::Heading
        } else if self.bold_depth > 0 {
            LineStyle::Bold
        } else {
            LineStyle::Normal
        }
    }

    fn push_text(&mut self, text: &str) {
        let leading_space = text.starts_with(char::is_whitespace);
        for (i, word) in text.split_whitespace().enumerate() {
            if self.cell_open && !self.current.is_empty() {
                self.current.truncate(self.current.trim_end().len());
                self.current.push_str("    ");
            } else if (i > 0 || leading_space)
                && !self.current.is_empty()
                && !self.current.ends_with(' ')
            {
                self.current.push(' ');
            }
            self.cell_open = false;
            self.current.push_str(word);
            let active = self.active_style();
            self.style = Some(self.style.map_or(active, |s| s.max(active)));
        }
        if text.ends_with(char::is_whitespace) && !self.current.is_empty() {
            self.current.push(' ');
        }
    }

    fn flush(&mut self) {
        let text = self.current.trim().to_string();
        if !text.is_empty() {
            self.lines.push(MarkupLine {
                text,
                style: self.style.unwrap_or(LineStyle::Normal),
            });
        }
        self.current.clear();
        self.style = None;
        self.cell_open = false;
    }
}

/// Flatten rendered HTML into styled text lines. Block elements start new
/// lines, table cells are spaced apart, `hr` becomes a rule, and the
/// contents of `head`, `style` and `script` are dropped.
///
/// Only meant for the markup of `templates/documents/`: a tag ends at the
/// first `>`, so those templates must not put `>` inside attribute values.
/// Record fields are escaped by askama and never form tags.
pub fn layout_markup(markup: &str) -> Vec<MarkupLine> {
    let mut state = LayoutState::default();
    let mut rest = markup;

    while let Some(open) = rest.find('<') {
        let (text, after) = rest.split_at(open);
        if state.skip_depth == 0 {
            state.push_text(&decode_entities(text));
        }

        let Some(close) = after.find('>') else {
            rest = "";
            break;
        };
        let raw_tag = &after[1..close];
        rest = &after[close + 1..];

        if raw_tag.starts_with('!') {
            continue;
        }

        let closing = raw_tag.starts_with('/');
        let name: String = raw_tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if SKIPPED_TAGS.contains(&name.as_str()) {
            if closing {
                state.skip_depth = state.skip_depth.saturating_sub(1);
            } else if !raw_tag.ends_with('/') {
                state.skip_depth += 1;
            }
            continue;
        }
        if state.skip_depth > 0 {
            continue;
        }

        match name.as_str() {
            "hr" => {
                state.flush();
                state.lines.push(MarkupLine {
                    text: String::new(),
                    style: LineStyle::Rule,
                });
            }
            "td" | "th" => {
                if !closing {
                    state.cell_open = true;
                }
                if name == "th" {
                    adjust(&mut state.bold_depth, closing);
                }
            }
            "strong" | "b" => adjust(&mut state.bold_depth, closing),
            _ => {}
        }

        if BLOCK_TAGS.contains(&name.as_str()) {
            state.flush();
            if matches!(name.as_str(), "h1" | "h2" | "h3" | "h4") {
                adjust(&mut state.heading_depth, closing);
            }
        }
    }

    if state.skip_depth == 0 {
        state.push_text(&decode_entities(rest));
    }
    state.flush();
    state.lines
}

fn adjust(depth: &mut usize, closing: bool) {
    if closing {
        *depth = depth.saturating_sub(1);
    } else {
        *depth += 1;
    }
}

/// Decode the entities the template engine emits when escaping.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Split `text` into chunks of at most `width` characters on word boundaries.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
        while current.chars().count() > width {
            let head: String = current.chars().take(width).collect();
            let tail: String = current.chars().skip(width).collect();
            lines.push(head);
            current = tail;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

// -------------------------------------------------------------------------
// printpdf converter
// -------------------------------------------------------------------------

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;

/// Characters the built-in faces can encode beyond printable ASCII and
/// Latin-1 (the Windows-1252 additions).
const WINANSI_EXTRA: &str = "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ";

/// Whether the built-in Helvetica faces (WinAnsi encoding) can show `c`.
pub fn winansi_encodable(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{A0}'..='\u{FF}') || WINANSI_EXTRA.contains(c)
}

/// Number of characters in `text` the built-in faces would replace.
pub fn unsupported_chars(text: &str) -> usize {
    text.chars().filter(|c| !winansi_encodable(*c)).count()
}

/// A4 text-flow converter backed by `printpdf`. Uses the built-in
/// Helvetica faces unless a TrueType font is supplied.
#[derive(Debug, Default, Clone)]
pub struct PrintPdfConverter {
    font: Option<Arc<Vec<u8>>>,
}

impl PrintPdfConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set all text in the given TrueType font, for scripts outside WinAnsi
    /// such as Arabic names and addresses.
    pub fn with_font(font: Vec<u8>) -> Self {
        Self {
            font: Some(Arc::new(font)),
        }
    }

    pub fn from_font_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::with_font(std::fs::read(path)?))
    }

    pub fn has_external_font(&self) -> bool {
        self.font.is_some()
    }
}

struct Cursor {
    layer: PdfLayerReference,
    y: f32,
}

impl PdfConverter for PrintPdfConverter {
    fn convert(&self, title: &str, markup: &str) -> Result<Vec<u8>, ConversionError> {
        let lines = layout_markup(markup);

        let (doc, page1, layer1) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let (regular, bold) = match &self.font {
            Some(font) => {
                let face = doc
                    .add_external_font(font.as_slice())
                    .map_err(|e| ConversionError::Engine(format!("Invalid font: {}", e)))?;
                (face.clone(), face)
            }
            None => {
                let replaced: usize = lines.iter().map(|line| unsupported_chars(&line.text)).sum();
                if replaced > 0 {
                    tracing::warn!(
                        document = %title,
                        characters = replaced,
                        "Built-in PDF font cannot encode some characters; set DOCUMENT_FONT_PATH to a Unicode TrueType font"
                    );
                }
                let regular = doc
                    .add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(|e| ConversionError::Engine(e.to_string()))?;
                let bold = doc
                    .add_builtin_font(BuiltinFont::HelveticaBold)
                    .map_err(|e| ConversionError::Engine(e.to_string()))?;
                (regular, bold)
            }
        };

        let mut cursor = Cursor {
            layer: doc.get_page(page1).get_layer(layer1),
            y: PAGE_HEIGHT - MARGIN,
        };

        for line in &lines {
            let (font, size, height, width): (&IndirectFontRef, f32, f32, usize) = match line.style
            {
                LineStyle::Heading => (&bold, 16.0, 9.0, 55),
                LineStyle::Bold => (&bold, 10.0, 5.5, 95),
                LineStyle::Normal => (&regular, 10.0, 5.5, 95),
                LineStyle::Rule => (&regular, 10.0, 4.0, 0),
            };

            if line.style == LineStyle::Rule {
                ensure_room(&doc, &mut cursor, height);
                let y = cursor.y + 1.5;
                cursor.layer.add_line(Line {
                    points: vec![
                        (Point::new(Mm(MARGIN), Mm(y)), false),
                        (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
                    ],
                    is_closed: false,
                });
                cursor.y -= height;
                continue;
            }

            for chunk in wrap_text(&line.text, width) {
                ensure_room(&doc, &mut cursor, height);
                cursor
                    .layer
                    .use_text(chunk, size, Mm(MARGIN), Mm(cursor.y), font);
                cursor.y -= height;
            }
        }

        let mut writer = BufWriter::new(Vec::<u8>::new());
        doc.save(&mut writer)
            .map_err(|e| ConversionError::Output(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| ConversionError::Output(e.to_string()))
    }
}

fn ensure_room(doc: &printpdf::PdfDocumentReference, cursor: &mut Cursor, height: f32) {
    if cursor.y - height < MARGIN {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        cursor.layer = doc.get_page(page).get_layer(layer);
        cursor.y = PAGE_HEIGHT - MARGIN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::str::FromStr;

    fn invoice() -> Invoice {
        Invoice {
            id: 7,
            invoice_number: 10004,
            client_name: "Al Noor & Sons".to_string(),
            reference_no: "Q/2026 #7".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            subject: "Office fit-out".to_string(),
            address: "Warehouse 4\nAl Quoz".to_string(),
            mobile_number: "+971 50 000 0000".to_string(),
            amount: Decimal::from_str("1000.00").unwrap(),
            work_description: "Gypsum partitions and paint".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn filenames_follow_kind_and_reference() {
        assert_eq!(DocumentKind::Invoice.filename("REF-001"), "invoice_REF-001.pdf");
        assert_eq!(
            DocumentKind::Quotation.filename("Q/2026 #7"),
            "quotation_Q_2026__7.pdf"
        );
    }

    #[test]
    fn context_carries_vat_figures_and_words() {
        let ctx = DocumentContext::new(invoice(), "Acme", &CurrencyLabels::default());
        assert_eq!(ctx.amount, "1000.00");
        assert_eq!(ctx.vat_amount, "50.00");
        assert_eq!(ctx.total_with_vat, "1050.00");
        assert_eq!(ctx.amount_in_words, "One Thousand Fifty Dirhams Only");
        assert_eq!(ctx.issued_on, "01 October 2026");
        assert_eq!(ctx.address_lines, vec!["Warehouse 4", "Al Quoz"]);
    }

    #[test]
    fn templates_differ_by_kind() {
        let ctx = DocumentContext::new(invoice(), "Acme", &CurrencyLabels::default());
        let invoice_html = render_markup(DocumentKind::Invoice, &ctx).unwrap();
        let quotation_html = render_markup(DocumentKind::Quotation, &ctx).unwrap();

        assert!(invoice_html.contains("TAX INVOICE"));
        assert!(quotation_html.contains("QUOTATION"));
        assert!(invoice_html.contains("Al Noor &amp; Sons"));
        assert!(invoice_html.contains("1050.00"));
        assert!(quotation_html.contains("One Thousand Fifty Dirhams Only"));
    }

    #[test]
    fn layout_splits_blocks_and_styles_headings() {
        let lines = layout_markup(
            "<html><head><title>x</title><style>p { color: red; }</style></head>\
             <body><h1>Tax Invoice</h1><p>Client: <strong>Acme</strong></p><hr>\
             <table><tr><th>Amount</th><td>1000.00</td></tr></table></body></html>",
        );

        assert_eq!(
            lines,
            vec![
                MarkupLine { text: "Tax Invoice".to_string(), style: LineStyle::Heading },
                MarkupLine { text: "Client: Acme".to_string(), style: LineStyle::Bold },
                MarkupLine { text: String::new(), style: LineStyle::Rule },
                MarkupLine { text: "Amount    1000.00".to_string(), style: LineStyle::Bold },
            ]
        );
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(
            decode_entities("Al Noor &amp; Sons &lt;LLC&gt; &#x27;A&#39; &quot;B&quot; & co"),
            "Al Noor & Sons <LLC> 'A' \"B\" & co"
        );
    }

    #[test]
    fn wrap_breaks_on_words_and_splits_long_tokens() {
        assert_eq!(wrap_text("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert!(wrap_text("", 10).is_empty());
    }

    #[test]
    fn printpdf_converter_emits_pdf_bytes() {
        let ctx = DocumentContext::new(invoice(), "Acme", &CurrencyLabels::default());
        let markup = render_markup(DocumentKind::Invoice, &ctx).unwrap();
        let bytes = PrintPdfConverter::new()
            .convert("Tax Invoice 10004", &markup)
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_markup_flows_onto_more_pages() {
        let body: String = (0..200).map(|i| format!("<p>Line {}</p>", i)).collect();
        let bytes = PrintPdfConverter::new().convert("Long", &body).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn escaped_fields_survive_layout_as_text() {
        let mut record = invoice();
        record.client_name = "A > B <script>x</script>".to_string();
        let ctx = DocumentContext::new(record, "Acme", &CurrencyLabels::default());
        let markup = render_markup(DocumentKind::Invoice, &ctx).unwrap();

        let lines = layout_markup(&markup);
        assert!(lines
            .iter()
            .any(|line| line.text.contains("A > B <script>x</script>")));
    }

    #[test]
    fn winansi_coverage() {
        assert!(winansi_encodable('A'));
        assert!(winansi_encodable('é'));
        assert!(winansi_encodable('€'));
        assert!(!winansi_encodable('ش'));
        assert_eq!(unsupported_chars("Dubai"), 0);
        assert_eq!(unsupported_chars("شركة Acme"), 4);
    }

    #[test]
    fn non_latin_text_still_converts_with_builtin_font() {
        let bytes = PrintPdfConverter::new()
            .convert("Invoice", "<p>العميل: شركة النور</p>")
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn font_choice() {
        assert!(!PrintPdfConverter::new().has_external_font());
        assert!(PrintPdfConverter::with_font(vec![0; 4]).has_external_font());
        assert!(PrintPdfConverter::from_font_file(Path::new("/nonexistent/font.ttf")).is_err());
    }

    struct FailingConverter;

    impl PdfConverter for FailingConverter {
        fn convert(&self, _title: &str, _markup: &str) -> Result<Vec<u8>, ConversionError> {
            Err(ConversionError::Engine("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn conversion_failure_becomes_document_error() {
        let result = render_document(
            DocumentKind::Quotation,
            invoice(),
            "Acme",
            &CurrencyLabels::default(),
            Arc::new(FailingConverter),
        )
        .await;

        assert!(matches!(result, Err(AppError::DocumentError(_))));
    }

    #[tokio::test]
    async fn render_document_names_the_file() {
        let rendered = render_document(
            DocumentKind::Invoice,
            invoice(),
            "Acme",
            &CurrencyLabels::default(),
            Arc::new(PrintPdfConverter::new()),
        )
        .await
        .unwrap();

        assert_eq!(rendered.filename, "invoice_Q_2026__7.pdf");
        assert!(rendered.bytes.starts_with(b"%PDF"));
    }
}
