use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "freqctl",
    version,
    arg_required_else_help = true,
    about = "search and table admin client for the inventory backend",
    long_about = "freqctl composes structured search queries from filter fragments and drives the inventory backend's search, table and index API.\n\nExamples:\n  freqctl search 'type:server AND os:linux'\n  freqctl filter 'type:server' --column City --value 'New York'\n  freqctl table server --limit 50 --match '^srv'\n  freqctl shortcut filter servers 'os:linux'\n\nTip: Use --config to persist the backend URL and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        global = true,
        help_heading = "Output",
        help = "Write results to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format (text, json or html)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.freqctl/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "sf",
        visible_alias = "shortcuts-file",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to the shortcuts file (defaults to ~/.freqctl/shortcuts.yml)."
    )]
    pub shortcuts_file: Option<String>,

    #[arg(
        short = 'u',
        long = "u",
        visible_alias = "base-url",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Backend base URL (e.g. http://localhost:8080/)."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a structured query against the search index.
    Search(SearchArgs),

    /// Show the fragments a query is made of.
    Split {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Merge a filter fragment into a query and print the result.
    Filter(FilterArgs),

    /// Check whether a query already contains a fragment.
    Contains {
        #[arg(value_name = "FRAGMENT")]
        fragment: String,
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// List rows of a table.
    Table(TableArgs),

    /// Show row counts for several tables.
    Tables(TablesArgs),

    /// Show a single row.
    Row(RowRef),

    /// Insert a row.
    Create(CreateArgs),

    /// Update columns of an existing row.
    Update(UpdateArgs),

    /// Delete a row.
    Delete(RowRef),

    /// Rebuild the search index and wait for it to finish.
    Reindex(ReindexArgs),

    /// Show the current index progress.
    Progress,

    /// Manage saved shortcut queries.
    #[command(subcommand)]
    Shortcut(ShortcutCommand),

    /// Write a commented default config file if none exists.
    Init,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(value_name = "QUERY")]
    pub query: Vec<String>,

    #[arg(
        short = 'f',
        long = "filter",
        value_name = "FRAGMENT",
        action = ArgAction::Append,
        help = "Merge a filter fragment into the query before searching (repeatable)."
    )]
    pub filters: Vec<String>,

    #[arg(
        long = "nw",
        visible_alias = "no-wildcard",
        help = "Send plain terms as typed, without the prefix wildcard."
    )]
    pub no_wildcard: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,

    #[arg(value_name = "FRAGMENT", required_unless_present = "value")]
    pub fragment: Option<String>,

    #[arg(
        long = "col",
        visible_alias = "column",
        value_name = "COLUMN",
        requires = "value",
        help = "Column for a quick filter (column:value)."
    )]
    pub column: Option<String>,

    #[arg(
        long = "val",
        visible_alias = "value",
        value_name = "VALUE",
        conflicts_with = "fragment",
        help = "Cell value for a quick filter."
    )]
    pub value: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TableArgs {
    #[arg(value_name = "TABLE")]
    pub table: String,

    #[arg(
        short = 'l',
        long = "limit",
        value_name = "N",
        help = "Maximum number of rows (1-500)."
    )]
    pub limit: Option<usize>,

    #[arg(
        short = 'm',
        long = "match",
        value_name = "REGEX",
        help = "Only show rows with a cell matching this regex."
    )]
    pub matcher: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TablesArgs {
    #[arg(
        long = "only",
        value_name = "TABLES",
        help = "Comma-separated tables to count (defaults to all)."
    )]
    pub only: Option<String>,

    #[arg(
        short = 'l',
        long = "limit",
        value_name = "N",
        help = "Maximum rows fetched per table (1-500)."
    )]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct RowRef {
    #[arg(value_name = "TABLE")]
    pub table: String,
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(value_name = "TABLE")]
    pub table: String,

    #[arg(
        short = 's',
        long = "set",
        value_name = "COLUMN=VALUE",
        action = ArgAction::Append,
        required = true,
        help = "Column value (repeatable); null, true/false and numbers are typed."
    )]
    pub set: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[arg(value_name = "TABLE")]
    pub table: String,
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(
        short = 's',
        long = "set",
        value_name = "COLUMN=VALUE",
        action = ArgAction::Append,
        required = true,
        help = "Column value (repeatable); null, true/false and numbers are typed."
    )]
    pub set: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ReindexArgs {
    #[arg(
        long = "nowait",
        visible_alias = "no-wait",
        help = "Trigger the rebuild and return immediately."
    )]
    pub no_wait: bool,

    #[arg(
        long = "pi",
        visible_alias = "poll-interval",
        value_name = "MILLIS",
        help = "Progress poll interval in milliseconds."
    )]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ShortcutCommand {
    /// List shortcuts with their labels and queries.
    List,

    /// Show one shortcut.
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Replace a shortcut's query.
    Set {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Change a shortcut's label.
    Rename {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(value_name = "LABEL")]
        label: String,
    },

    /// Merge a filter fragment into a shortcut's query.
    Filter {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(value_name = "FRAGMENT")]
        fragment: String,
    },

    /// Search with a shortcut's query.
    Run {
        #[arg(value_name = "ID")]
        id: String,

        #[arg(
            long = "nw",
            visible_alias = "no-wildcard",
            help = "Send plain terms as typed, without the prefix wildcard."
        )]
        no_wildcard: bool,
    },
}
