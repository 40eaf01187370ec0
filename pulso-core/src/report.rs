//! Clinician PDF exports.
//!
//! Two layouts:
//! - **chat history**: one row per message: date, actor, wrapped text
//! - **patient summary**: biometrics, recent health logs, last nutrition plan
//!
//! Both return the PDF bytes; nothing is written server-side.

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use std::io::BufWriter;

use crate::error::PulsoError;
use crate::models::patient::filename_slug;
use crate::models::{ChatMessage, ChatRole, HealthLog, Patient};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;
const LEFT: f32 = 15.0;
const LINE: f32 = 4.5;

const COL_DATE: f32 = LEFT;
const COL_ACTOR: f32 = 52.0;
const COL_MESSAGE: f32 = 75.0;
const MESSAGE_WRAP: usize = 70;

pub fn chat_report_filename(patient_name: &str) -> String {
    format!("chat_history_{}.pdf", filename_slug(patient_name))
}

pub fn patient_report_filename(patient_name: &str) -> String {
    format!("patient_report_{}.pdf", filename_slug(patient_name))
}

fn pdf_err(context: &str, e: impl std::fmt::Display) -> PulsoError {
    PulsoError::Report(format!("PDF {} error: {}", context, e))
}

/// Cursor over a growing A4 document; starts a new page when a block would
/// run past the bottom margin.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, PulsoError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| pdf_err("font", e))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| pdf_err("font", e))?;

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: TOP,
            pages: 1,
        })
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed >= BOTTOM {
            return;
        }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Layer {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP;
    }

    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn heading(&mut self, text: &str) {
        self.ensure_space(10.0);
        self.text(text, 11.0, LEFT, true);
        self.y -= 6.0;
    }

    fn line(&mut self, text: &str) {
        self.ensure_space(LINE);
        self.text(text, 9.0, LEFT + 5.0, false);
        self.y -= LINE;
    }

    fn paragraph(&mut self, text: &str, width: usize) {
        for l in wrap_text(text, width) {
            self.line(&l);
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn finish(self) -> Result<Vec<u8>, PulsoError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc.save(&mut buf).map_err(|e| pdf_err("save", e))?;
        buf.into_inner().map_err(|e| pdf_err("buffer", e))
    }
}

/// Greedy word wrap on character count. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for raw_line in text.lines() {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
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
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

fn actor_label(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "Patient",
        ChatRole::Assistant => "Assistant",
    }
}

/// Chat transcript as a three-column table.
pub fn render_chat_report(
    patient: &Patient,
    messages: &[ChatMessage],
) -> Result<Vec<u8>, PulsoError> {
    let title = format!("Chat history - {}", patient.name);
    let mut w = PageWriter::new(&title)?;

    w.text(&title, 14.0, LEFT, true);
    w.gap(7.0);
    w.text(
        &format!("{} messages", messages.len()),
        9.0,
        LEFT,
        false,
    );
    w.gap(8.0);

    let header = |w: &mut PageWriter| {
        w.text("Date", 10.0, COL_DATE, true);
        w.text("Actor", 10.0, COL_ACTOR, true);
        w.text("Message", 10.0, COL_MESSAGE, true);
        w.gap(6.0);
    };
    header(&mut w);

    for m in messages {
        let lines = wrap_text(&m.message, MESSAGE_WRAP);
        let height = LINE * lines.len().max(1) as f32 + 2.0;
        let page_before = w.pages;
        w.ensure_space(height);
        if w.pages != page_before {
            header(&mut w);
        }

        w.text(
            &m.created_at.format("%Y-%m-%d %H:%M").to_string(),
            8.0,
            COL_DATE,
            false,
        );
        w.text(actor_label(m.role), 8.0, COL_ACTOR, false);
        for l in &lines {
            w.text(l, 8.0, COL_MESSAGE, false);
            w.gap(LINE);
        }
        if lines.is_empty() {
            w.gap(LINE);
        }
        w.gap(2.0);
    }

    w.finish()
}

fn field(label: &str, value: Option<String>) -> String {
    format!("{}: {}", label, value.unwrap_or_else(|| "-".to_string()))
}

/// Biometrics, health-log table and the last nutrition plan.
pub fn render_patient_report(
    patient: &Patient,
    health_logs: &[HealthLog],
    nutrition_plan: Option<&ChatMessage>,
) -> Result<Vec<u8>, PulsoError> {
    let title = format!("Patient report - {}", patient.name);
    let mut w = PageWriter::new(&title)?;

    w.text(&title, 14.0, LEFT, true);
    w.gap(10.0);

    w.heading("PATIENT");
    w.line(&field("Name", Some(patient.name.clone())));
    w.line(&field("Age", patient.age.map(|a| a.to_string())));
    w.line(&field("Height (cm)", patient.height.map(|h| format!("{:.0}", h))));
    w.line(&field("Gender", patient.gender.clone()));
    w.line(&field("Activity", patient.activity.clone()));
    w.line(&field("Diet", patient.diet_type.clone()));
    w.line(&field("Allergies", patient.allergies.clone()));
    w.line(&field("Health goal", patient.health_goal.clone()));

    let latest = health_logs.last();
    w.line(&field("Latest weight (kg)", latest.map(|h| format!("{:.1}", h.weight))));
    w.line(&field("Latest stress (1-10)", latest.map(|h| h.stress_level.to_string())));
    w.gap(4.0);

    w.heading("HEALTH LOG");
    if health_logs.is_empty() {
        w.line("No entries recorded.");
    } else {
        w.ensure_space(LINE);
        w.text("Date", 9.0, LEFT + 5.0, true);
        w.text("Weight (kg)", 9.0, 70.0, true);
        w.text("Stress", 9.0, 110.0, true);
        w.gap(LINE);
        for h in health_logs {
            w.ensure_space(LINE);
            w.text(&h.created_at.format("%Y-%m-%d").to_string(), 9.0, LEFT + 5.0, false);
            w.text(&format!("{:.1}", h.weight), 9.0, 70.0, false);
            w.text(&h.stress_level.to_string(), 9.0, 110.0, false);
            w.gap(LINE);
        }
    }
    w.gap(4.0);

    w.heading("LAST NUTRITION PLAN");
    match nutrition_plan {
        Some(plan) => {
            w.line(&format!("From {}", plan.created_at.format("%Y-%m-%d %H:%M")));
            w.gap(1.0);
            w.paragraph(&plan.message, 90);
        }
        None => w.line("No nutrition plan found in the conversation."),
    }

    w.finish()
}
