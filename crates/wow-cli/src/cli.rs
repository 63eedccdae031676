use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use wow_core::MasteryGroup;

#[derive(Parser)]
#[command(name = "wow")]
#[command(about = "Save short sentences and track how well you remember them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding guest notes (defaults to the platform data dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub guest_dir: Option<PathBuf>,

    /// CLI profile name for backend and session configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage notes
    Notes {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Manage the sentences of a note
    #[command(alias = "s")]
    Sentences {
        #[command(subcommand)]
        command: SentenceCommands,
    },
    /// Import a sentence file as a new guest note (signed out only)
    Import {
        /// JSON file to import (`-` reads stdin)
        path: PathBuf,
    },
    /// Export a guest note's sentences as JSON
    Export {
        /// Note ID or unique ID prefix
        note: String,
        /// Output path (defaults to sentences-export-YYYY-MM-DD.json)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Write to stdout instead of a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
    /// Sign in with an emailed magic link
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Upload guest notes to the signed-in account
    Migrate,
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// List guest notes, then one page of online notes
    List {
        /// Zero-based page of online notes
        #[arg(long, default_value = "0")]
        page: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a note with its sentence counts
    Show {
        /// Note ID or unique ID prefix
        note: String,
    },
    /// Create a note (online when signed in)
    #[command(alias = "new")]
    Add {
        /// Note title
        title: Vec<String>,
        /// Make the note visible to everyone (online notes only)
        #[arg(long)]
        public: bool,
    },
    /// Rename a note
    Rename {
        /// Note ID or unique ID prefix
        note: String,
        /// New title
        title: Vec<String>,
    },
    /// Change who can see an online note
    Visibility {
        /// Note ID or unique ID prefix
        note: String,
        #[arg(value_enum)]
        visibility: Visibility,
    },
    /// Delete a note and its sentences
    Delete {
        /// Note ID or unique ID prefix
        note: String,
    },
}

#[derive(Subcommand)]
pub enum SentenceCommands {
    /// List a note's sentences, most recently updated first
    List {
        /// Note ID or unique ID prefix
        note: String,
        /// Which tab to show
        #[arg(long, value_enum, default_value_t = Tab::Learning)]
        tab: Tab,
        /// Load pages up to this zero-based page
        #[arg(long, default_value = "0")]
        page: usize,
        /// Load every page
        #[arg(long, conflicts_with = "page")]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scroll through a note's sentences page by page
    Browse {
        /// Note ID or unique ID prefix
        note: String,
        /// Tab to start on
        #[arg(long, value_enum, default_value_t = Tab::Learning)]
        tab: Tab,
    },
    /// Add a sentence to a note
    #[command(alias = "new")]
    Add {
        /// Note ID or unique ID prefix
        note: String,
        /// Sentence text
        title: Vec<String>,
        /// Optional explanation or translation
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Edit a sentence's text and description
    Edit {
        /// Sentence ID
        id: String,
        /// New sentence text
        #[arg(long)]
        title: String,
        /// New description (omit to clear)
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Raise a sentence's mastery level by one
    LevelUp {
        /// Sentence ID
        id: String,
    },
    /// Send a sentence back to the first level
    Reset {
        /// Sentence ID
        id: String,
    },
    /// Delete a sentence
    Delete {
        /// Sentence ID
        id: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Tab {
    Learning,
    Mastered,
}

impl From<Tab> for MasteryGroup {
    fn from(tab: Tab) -> Self {
        match tab {
            Tab::Learning => Self::Learning,
            Tab::Mastered => Self::Mastered,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Where magic links should send the browser
        #[arg(long, value_name = "URL")]
        redirect_url: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Email a magic sign-in link
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Override the profile's redirect URL
        #[arg(long, value_name = "URL")]
        redirect_to: Option<String>,
    },
    /// Finish sign-in with the link's redirect URL or its code
    Callback {
        /// Redirect URL from the email link, or the bare code
        url_or_code: String,
    },
    /// Show auth status for profile
    Status,
    /// Sign out and clear the stored session
    Logout,
}
