use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use facetrack_frame::Channel;
use serde::Serialize;

use crate::cmd::ChannelsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json_line, OutputFormat};

#[derive(Debug, Serialize)]
struct ChannelEntry {
    index: usize,
    name: &'static str,
    byte_offset: usize,
}

#[derive(Debug, Serialize)]
struct ChannelsOutput {
    schema_id: &'static str,
    frame_size: usize,
    channels: Vec<ChannelEntry>,
}

pub fn run(_args: ChannelsArgs, format: OutputFormat) -> CliResult<i32> {
    let output = ChannelsOutput {
        schema_id: "https://schemas.facetrack.dev/cli/v1/channels.schema.json",
        frame_size: facetrack_frame::FRAME_SIZE,
        channels: Channel::ALL
            .iter()
            .map(|channel| ChannelEntry {
                index: channel.index(),
                name: channel.name(),
                byte_offset: channel.byte_offset(),
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => print_json_line(&output),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INDEX", "CHANNEL", "OFFSET"]);
            for entry in &output.channels {
                table.add_row(vec![
                    entry.index.to_string(),
                    entry.name.to_string(),
                    entry.byte_offset.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in &output.channels {
                println!("{:>2}  {:<24} +{}", entry.index, entry.name, entry.byte_offset);
            }
        }
        OutputFormat::Raw => {
            for entry in &output.channels {
                println!("{}", entry.name);
            }
        }
    }

    Ok(SUCCESS)
}
