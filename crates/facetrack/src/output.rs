use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use facetrack_expression::{UnifiedEye, UnifiedExpressionFrame};
use serde::Serialize;

pub const FRAME_SCHEMA_ID: &str = "https://schemas.facetrack.dev/cli/v1/unified-frame.schema.json";

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    schema_id: &'a str,
    sequence: u64,
    timestamp: String,
    #[serde(flatten)]
    frame: &'a UnifiedExpressionFrame,
}

pub fn print_frame(frame: &UnifiedExpressionFrame, sequence: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                schema_id: FRAME_SCHEMA_ID,
                sequence,
                timestamp: now_unix_millis(),
                frame,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut eyes = Table::new();
            eyes.load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "EYE", "GAZE X", "GAZE Y", "OPENNESS", "SQUEEZE", "WIDEN", "BROW IN", "BROW OUT",
                ]);
            for (name, eye) in [
                ("left", &frame.eyes.left),
                ("right", &frame.eyes.right),
                ("combined", &frame.eyes.combined),
            ] {
                eyes.add_row(eye_row(name, eye));
            }
            println!("frame #{sequence}");
            println!("{eyes}");

            let active: Vec<_> = frame.shapes.iter().filter(|(_, v)| *v != 0.0).collect();
            if !active.is_empty() {
                let mut shapes = Table::new();
                shapes
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["SHAPE", "VALUE"]);
                for (shape, value) in active {
                    shapes.add_row(vec![shape.to_string(), format!("{value:.3}")]);
                }
                println!("{shapes}");
            }
        }
        OutputFormat::Pretty => {
            let eyes = &frame.eyes;
            let active: Vec<String> = frame
                .shapes
                .iter()
                .filter(|(_, v)| *v != 0.0)
                .map(|(shape, v)| format!("{shape}={v:.3}"))
                .collect();
            println!(
                "#{sequence} open L={:.3} R={:.3} gaze=({:.3}, {:.3}) shapes=[{}]",
                eyes.left.openness,
                eyes.right.openness,
                eyes.combined.gaze.x,
                eyes.combined.gaze.y,
                active.join(" ")
            );
        }
        OutputFormat::Raw => {
            let eyes = &frame.eyes;
            let mut fields = vec![
                eyes.left.openness,
                eyes.right.openness,
                eyes.combined.gaze.x,
                eyes.combined.gaze.y,
            ];
            fields.extend(frame.shapes.iter().map(|(_, v)| v));
            let line: Vec<String> = fields.iter().map(|v| v.to_string()).collect();
            println!("{}", line.join("\t"));
        }
    }
}

fn eye_row(name: &str, eye: &UnifiedEye) -> Vec<String> {
    vec![
        name.to_string(),
        format!("{:.3}", eye.gaze.x),
        format!("{:.3}", eye.gaze.y),
        format!("{:.3}", eye.openness),
        format!("{:.3}", eye.squeeze),
        format!("{:.3}", eye.widen),
        format!("{:.3}", eye.brow.inner_up),
        format!("{:.3}", eye.brow.outer_up),
    ]
}

/// Print a serializable report as a single JSON line.
pub fn print_json_line<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
