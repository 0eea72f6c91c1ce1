//! Shared fixtures: synthetic PDFs and a scripted model client.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use pdfknow::{ModelCallError, ModelClient, ModelRequest};

/// One positioned line of text. `y` is the PDF baseline (origin bottom-left).
#[derive(Debug, Clone, Copy)]
pub struct Line {
    pub text: &'static str,
    pub size: f32,
    pub x: f32,
    pub y: f32,
    pub bold: bool,
}

pub fn line(text: &'static str, size: f32, x: f32, y: f32) -> Line {
    Line {
        text,
        size,
        x,
        y,
        bold: false,
    }
}

pub fn bold(text: &'static str, size: f32, x: f32, y: f32) -> Line {
    Line {
        text,
        size,
        x,
        y,
        bold: true,
    }
}

/// A page of a synthetic document.
#[derive(Debug, Clone)]
pub enum PageSpec {
    Text(Vec<Line>),
    /// A page whose content entry is not a stream.
    Broken,
}

/// Build a US Letter PDF in memory.
pub fn build_pdf(pages: &[PageSpec], title: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut page_ids = Vec::new();
    for page in pages {
        let contents: Object = match page {
            PageSpec::Text(lines) => {
                let mut operations = Vec::new();
                for l in lines {
                    let font = if l.bold { "F2" } else { "F1" };
                    operations.push(Operation::new("BT", vec![]));
                    operations.push(Operation::new(
                        "Tf",
                        vec![Object::Name(font.as_bytes().to_vec()), Object::Real(l.size)],
                    ));
                    operations.push(Operation::new(
                        "Td",
                        vec![Object::Real(l.x), Object::Real(l.y)],
                    ));
                    operations.push(Operation::new("Tj", vec![Object::string_literal(l.text)]));
                    operations.push(Operation::new("ET", vec![]));
                }
                let content = Content { operations };
                let bytes = content.encode().expect("encode content");
                doc.add_object(Stream::new(dictionary! {}, bytes)).into()
            }
            PageSpec::Broken => Object::Integer(7),
        };

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => resources_id,
            "Contents" => contents,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<Object>>(),
            "Count" => page_ids.len() as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Author" => Object::string_literal("Research Office"),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save pdf");
    buf
}

/// Three pages: a numbered heading, a two-column table, a footnote.
pub fn report_pdf() -> Vec<u8> {
    build_pdf(
        &[
            PageSpec::Text(vec![
                line("1. Introduction", 18.0, 72.0, 700.0),
                line("This report covers the annual results.", 12.0, 72.0, 660.0),
                line("Revenue grew in every region.", 12.0, 72.0, 640.0),
            ]),
            PageSpec::Text(vec![
                line("Results by region are shown below.", 12.0, 72.0, 700.0),
                line("Region", 12.0, 72.0, 600.0),
                line("Revenue", 12.0, 250.0, 600.0),
                line("North", 12.0, 72.0, 580.0),
                line("120", 12.0, 250.0, 580.0),
                line("South", 12.0, 72.0, 560.0),
                line("95", 12.0, 250.0, 560.0),
            ]),
            PageSpec::Text(vec![
                line("The outlook remains positive.", 12.0, 72.0, 700.0),
                // top edge at y = 720 from the top of the page
                line("1. See appendix", 8.0, 72.0, 65.6),
            ]),
        ],
        Some("Annual Report"),
    )
}

/// A model client that replays canned replies and records prompts.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelCallError>>>,
    fallback: String,
    delay: Duration,
    pub prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    /// Replies in order; once exhausted every call gets `fallback`.
    pub fn new(replies: Vec<Result<String, ModelCallError>>, fallback: &str) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: fallback.to_string(),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::new(Vec::new(), reply)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

impl ModelClient for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// A well-formed answer covering every detailed-mode category.
pub const FULL_ANSWER: &str = r#"{
  "concepts": ["Regional revenue analysis"],
  "methodology": ["Compare revenue by region year over year"],
  "case_studies": [],
  "data_points": ["North revenue 120", "South revenue 95"],
  "risks": [],
  "best_practices": [],
  "detailed_info": ["Report covers one fiscal year"]
}"#;
