use std::path::PathBuf;

use chaoslens_core::SystemKind;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Headless renderer for fractals and chaotic dynamical systems.
///
/// Renders arbitrarily large screenshots tile by tile and manages saved views.
#[derive(Debug, Parser)]
#[command(name = "chaoslens", version, about, long_about = None)]
pub struct Cli {
    /// Settings file (JSON); missing fields and a missing file use defaults
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a screenshot to a PNG file
    Capture(CaptureArgs),

    /// List, save or remove saved views
    Views {
        #[command(subcommand)]
        action: ViewsAction,
    },
}

/// Location overrides shared by `capture` and `views save`.
#[derive(Debug, Default, Args)]
pub struct LocationArgs {
    /// Model-space span of the shorter image side (decimal string)
    #[arg(long, allow_hyphen_values = true)]
    pub zoom: Option<String>,

    /// Model-space x of the image center (decimal string)
    #[arg(long, allow_hyphen_values = true)]
    pub center_x: Option<String>,

    /// Model-space y of the image center (decimal string)
    #[arg(long, allow_hyphen_values = true)]
    pub center_y: Option<String>,
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// System to render
    #[arg(long, value_parser = parse_system)]
    pub system: Option<SystemKind>,

    /// Output width in pixels
    #[arg(long)]
    pub width: Option<u64>,

    /// Output height in pixels
    #[arg(long)]
    pub height: Option<u64>,

    /// Edge length of the offscreen tile surface
    #[arg(long)]
    pub tile_size: Option<u32>,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Start from a saved view (location flags still override it)
    #[arg(long)]
    pub view: Option<String>,

    /// Output file; defaults to a timestamped name in the screenshot directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Rendering backend
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    pub backend: Backend,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// GPU when one is available, otherwise the CPU backend
    Auto,
    Gpu,
    /// CPU backend with a coordinate test pattern or plain escape-time coloring
    Reference,
}

#[derive(Debug, Subcommand)]
pub enum ViewsAction {
    List,
    /// Save a location under a name (empty for a generated name)
    Save {
        name: String,
        #[command(flatten)]
        location: LocationArgs,
    },
    Remove {
        name: String,
    },
}

fn parse_system(s: &str) -> Result<SystemKind, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn capture_flags_parse() {
        let cli = Cli::try_parse_from([
            "chaoslens",
            "capture",
            "--system",
            "double-pendulum",
            "--width",
            "5000",
            "--height",
            "5000",
            "--tile-size",
            "2048",
            "--center-x",
            "-0.75",
            "--zoom",
            "1e-20",
            "--backend",
            "reference",
        ])
        .unwrap();

        let Command::Capture(args) = cli.command else {
            panic!("expected capture");
        };
        assert_eq!(args.system, Some(SystemKind::DoublePendulum));
        assert_eq!(args.width, Some(5000));
        assert_eq!(args.tile_size, Some(2048));
        assert_eq!(args.location.center_x.as_deref(), Some("-0.75"));
        assert_eq!(args.location.zoom.as_deref(), Some("1e-20"));
        assert_eq!(args.backend, Backend::Reference);
    }

    #[test]
    fn unknown_system_is_rejected() {
        assert!(Cli::try_parse_from(["chaoslens", "capture", "--system", "lorenz"]).is_err());
    }

    #[test]
    fn views_subcommands_parse() {
        let cli = Cli::try_parse_from(["chaoslens", "-s", "cfg.json", "views", "remove", "home"]).unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("cfg.json")));
        assert!(matches!(
            cli.command,
            Command::Views {
                action: ViewsAction::Remove { ref name }
            } if name == "home"
        ));
    }
}
