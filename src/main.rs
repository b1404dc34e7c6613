mod commands;
mod logs;
mod settings;

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "inky", version, about = "Render images for an e-paper display")]
struct Args {
	/// Device settings file
	#[arg(long, default_value = "device.json")]
	config: PathBuf,

	/// Also append log output to this file
	#[arg(long, value_name = "FILE")]
	dump_logs: Option<PathBuf>,

	#[arg(short, long)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Show a local image file or an http(s) URL
	Show { source: String },

	/// Screenshot an HTML file at the display resolution and show it
	Html { page: PathBuf },

	/// Composite overlays onto a base image and show the result
	Compose {
		base: String,

		/// `path[:position[:opacity]]`, applied in order
		#[arg(long = "overlay", value_parser = commands::parse_overlay_arg)]
		overlays: Vec<commands::OverlayArg>,

		/// Resize every overlay to this fraction of the base width
		#[arg(long)]
		scale: Option<f32>,
	},

	/// Fit an image inside the display over a blurred copy of itself and show it
	Pad { source: String },

	/// Print the SHA-256 hash of an image's pixels
	Hash { source: String },

	/// Print the effective settings as JSON
	Config,

	/// Clear the panel and put it to sleep
	Shutdown,
}

fn main() -> ExitCode {
	let args = Args::parse();

	logs::init(args.verbose, args.dump_logs.as_deref());

	match commands::run(&args.config, args.command, &mut std::io::stdout().lock()) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			log::error!("{err:#}");
			ExitCode::FAILURE
		}
	}
}
