use std::path::PathBuf;

use clap::{Args, Subcommand};
use mapposter_theme::{
    hex_to_rgb, palette_placeholder, palette_prompt_template, parse_palette_block,
    parse_single_color, HexColor,
};

use crate::theme_cmd::read_text_input;

#[derive(Args, Debug, Clone)]
pub struct ColorArgs {
    #[command(subcommand)]
    pub command: ColorCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ColorCommand {
    /// Show the RGB components of a hex color.
    Hex { hex: String },
    /// Convert `L, C, H` or `oklch(L C H)` to hex.
    Oklch { text: String },
    /// Parse a pasted palette block (`-` for stdin).
    Palette { file: PathBuf },
    /// Print the instructions for generating a palette with an assistant.
    Prompt {
        /// Also print an example palette block.
        #[arg(long, default_value_t = false)]
        example: bool,
    },
}

pub fn run_color_command(command: ColorCommand) -> Result<(), String> {
    match command {
        ColorCommand::Hex { hex } => {
            let (r, g, b) = hex_to_rgb(&hex).map_err(|error| error.to_string())?;
            println!("{}  rgb({r}, {g}, {b})", HexColor::from_rgb(r, g, b));
        }
        ColorCommand::Oklch { text } => {
            let oklch = parse_single_color(&text).map_err(|error| error.to_string())?;
            println!("{}", oklch.to_hex());
        }
        ColorCommand::Palette { file } => {
            let text = read_text_input(&file)?;
            let assignments = parse_palette_block(&text).map_err(|error| error.to_string())?;
            for (role, color) in assignments {
                println!("{:<18} {color}", role.label());
            }
        }
        ColorCommand::Prompt { example } => {
            println!("{}", palette_prompt_template());
            if example {
                println!();
                println!("{}", palette_placeholder());
            }
        }
    }
    Ok(())
}
