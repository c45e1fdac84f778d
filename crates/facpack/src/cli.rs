use std::io;
use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor::{BrightBlue, White, Yellow};
use clap::{Parser, ValueEnum};
use clap_complete::Generator;
use clap_complete::shells::{Bash, Elvish, Fish, PowerShell, Zsh};
use clap_complete_nushell::Nushell;
use facpack_export::VersionPolicy;
use facpack_mod::AccurateVersion;
use strum::Display;

/// Styling for [`clap`]'s CLI interface.
const STYLES: Styles = Styles::styled()
    .usage(Yellow.on_default().bold())
    .literal(BrightBlue.on_default().bold())
    .placeholder(White.on_default().bold())
    .header(Yellow.on_default().bold());

#[derive(Parser, Debug)]
#[command(version, author, about, styles(STYLES))]
pub struct Options {
    /// How results are printed to stdout.
    #[arg(long, global = true, value_enum, default_value_t)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Display, ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Yaml,
    Json,
}

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Export modpacks of a library into a package.
    #[command(arg_required_else_help = true)]
    Export {
        /// Root directory of the library.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Where to write the package.
        #[arg(short, long)]
        output: PathBuf,

        /// Ship the files of every exported mod inside the package.
        #[arg(long)]
        include: bool,

        /// Let importers download a newer release than the exported one.
        #[arg(long)]
        download_newer: bool,

        /// Which release importers should pick.
        #[arg(long, default_value_t = VersionPolicy::NewestVersion)]
        mode: VersionPolicy,

        /// Export the settings attached to each modpack.
        #[arg(long)]
        settings: bool,

        /// Overwrite `output` without asking.
        #[arg(short, long)]
        yes: bool,

        /// Names of the modpacks to export.
        #[arg(required = true)]
        modpacks: Vec<String>,
    },

    /// Recreate the modpacks of a package (or bare export file) in a library.
    #[command(arg_required_else_help = true)]
    Import {
        /// Root directory of the library.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Write the resulting modpacks back to `modpacks.yml`.
        #[arg(long)]
        save: bool,

        /// The package or export file to import.
        file: PathBuf,
    },

    /// Read and write the game's binary settings files.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Work out how to update a game installation.
    Update {
        #[command(subcommand)]
        action: UpdateAction,
    },

    /// Generate shell completions for this tool.
    Completions {
        /// Which shell to generate completions for.
        #[arg(short, long, value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum SettingsAction {
    /// Decode a settings file and print it as JSON.
    Decode {
        /// The `mod-settings.dat` to read.
        file: PathBuf,
    },

    /// Encode JSON into a settings file.
    Encode {
        /// JSON file to read, `-` for stdin.
        json: PathBuf,

        /// Where to write the settings file.
        #[arg(short, long)]
        output: PathBuf,

        /// The game version stamped into the file.
        #[arg(long, default_value = "1.1.0.0")]
        game_version: AccurateVersion,
    },

    /// Show the settings of a library, grouped by load time.
    Show {
        /// Root directory of the library.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum UpdateAction {
    /// List every version reachable from the current one.
    Targets {
        /// The version that is installed and being updated.
        #[arg(long)]
        current: AccurateVersion,

        /// Every other installed version.
        #[arg(long)]
        installed: Vec<AccurateVersion>,

        /// JSON file listing the published update packages.
        #[arg(long)]
        steps: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
#[expect(clippy::enum_variant_names, reason = "PowerShell is a proper name")]
pub enum Shell {
    Bash,
    Elvish,
    Fish,
    PowerShell,
    Zsh,
    Nushell,
}

impl Generator for Shell {
    fn file_name(&self, name: &str) -> String {
        match self {
            Self::Bash => Bash.file_name(name),
            Self::Elvish => Elvish.file_name(name),
            Self::Fish => Fish.file_name(name),
            Self::PowerShell => PowerShell.file_name(name),
            Self::Zsh => Zsh.file_name(name),
            Self::Nushell => Nushell.file_name(name),
        }
    }

    fn generate(&self, cmd: &clap::Command, buf: &mut dyn io::Write) {
        match self {
            Self::Bash => Bash.generate(cmd, buf),
            Self::Elvish => Elvish.generate(cmd, buf),
            Self::Fish => Fish.generate(cmd, buf),
            Self::PowerShell => PowerShell.generate(cmd, buf),
            Self::Zsh => Zsh.generate(cmd, buf),
            Self::Nushell => Nushell.generate(cmd, buf),
        }
    }
}
