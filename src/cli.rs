use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::theme::{resolve_theme, theme_by_name};

#[derive(Parser, Debug)]
#[command(name = "asciifog", version, about = "Drifting ASCII fog in the terminal")]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    /// settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// write logs to this file
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// color preset: default, catppuccin-mocha, catppuccin-latte, dracula, nord, gruvbox, tokyo-night
    #[arg(long, global = true)]
    pub theme: Option<String>,

    /// characters from blank to dense, e.g. " .:-=+*#%@"
    #[arg(long, global = true)]
    pub palette: Option<String>,

    /// RNG seed for a reproducible animation
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// number of blobs
    #[arg(long, global = true)]
    pub blobs: Option<usize>,

    /// target frames per second
    #[arg(long, global = true)]
    pub fps: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// animate in the terminal (default)
    Run,
    /// render one frame headlessly to a PNG
    Snapshot {
        /// logical width in pixels
        #[arg(long, default_value_t = 960)]
        width: u32,
        /// logical height in pixels
        #[arg(long, default_value_t = 540)]
        height: u32,
        /// device pixel scale
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        /// simulated milliseconds before capture
        #[arg(long, default_value_t = 4000.0)]
        time_ms: f64,
        #[arg(long, short, default_value = "asciifog.png")]
        out: PathBuf,
    },
    /// write the settings file with current values
    InitConfig {
        /// replace an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Overrides {
    /// Layer flags over file settings. A theme flag wins over file colors; a theme from
    /// the file only applies when the file has no custom colors.
    pub fn apply(&self, settings: &mut Settings) {
        match &self.theme {
            Some(name) => theme_by_name(name).apply(settings),
            None => resolve_theme(settings),
        }
        if let Some(p) = &self.palette {
            settings.characters = p.clone();
        }
        if let Some(seed) = self.seed {
            settings.seed = Some(seed);
        }
        if let Some(n) = self.blobs {
            settings.blob.count = n;
        }
        if let Some(fps) = self.fps {
            settings.performance.target_fps = fps;
            // frame interval follows the new rate
            settings.animation.frame_interval = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run() {
        let cli = Cli::try_parse_from(["asciifog"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.overrides.theme.is_none());
    }

    #[test]
    fn snapshot_flags() {
        let cli = Cli::try_parse_from([
            "asciifog", "snapshot", "--width", "320", "--time-ms", "500", "-o", "x.png", "--seed", "9",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Snapshot { width, height, time_ms, out, .. }) => {
                assert_eq!((width, height), (320, 540));
                assert_eq!(time_ms, 500.0);
                assert_eq!(out, PathBuf::from("x.png"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cli.overrides.seed, Some(9));
    }

    #[test]
    fn overrides_layer_on_settings() {
        let cli = Cli::try_parse_from([
            "asciifog", "--theme", "dracula", "--palette", " .o", "--blobs", "3", "--fps", "30",
        ])
        .unwrap();
        let mut s = Settings::default();
        s.colors.primary = "#123456".into();
        cli.overrides.apply(&mut s);

        assert_eq!(s.colors.primary, "#bd93f9");
        assert_eq!(s.characters, " .o");
        assert_eq!(s.blob.count, 3);
        let s = s.sanitized();
        assert_eq!(s.frame_interval(), 33.0);
    }

    #[test]
    fn file_theme_applies_without_flag() {
        let mut s = Settings::default();
        s.theme = Some("gruvbox".into());
        Overrides::default().apply(&mut s);
        assert_eq!(s.colors.background, "#282828");
    }
}
