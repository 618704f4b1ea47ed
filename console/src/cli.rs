//! Command-line definitions.

use admin_console_client::people::{NewPerson, PeopleQuery, PersonUpdate, SortOrder};
use clap::{Args, Parser, Subcommand};

/// Admin console command line.
#[derive(Parser, Debug)]
#[command(name = "admin-console", version, about = "Admin console API client")]
pub struct Cli {
    /// API origin, overriding `ADMIN_CONSOLE_API_ORIGIN`.
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Log in; prompts for a verification code when one is required.
    Login {
        /// Account email.
        #[arg(long)]
        email: String,
        /// Account password.
        #[arg(long)]
        password: String,
        /// Two-factor code, if already known.
        #[arg(long)]
        code: Option<String>,
    },
    /// Log out and forget the stored token.
    Logout,
    /// Show the logged-in user.
    Me,
    /// Refresh the access token.
    Refresh,
    /// Create an account.
    Register {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Account email.
        #[arg(long)]
        email: String,
        /// Account password.
        #[arg(long)]
        password: String,
    },
    /// Manage people.
    #[command(subcommand)]
    People(PeopleCommand),
    /// Geographic and currency lookups.
    #[command(subcommand)]
    World(WorldCommand),
    /// Show the dashboard overview.
    Dashboard,
}

/// People commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum PeopleCommand {
    /// List people.
    List(ListArgs),
    /// Show one person.
    Show {
        /// Person identifier.
        id: u64,
    },
    /// Create a person.
    Create(CreateArgs),
    /// Update a person.
    Update {
        /// Person identifier.
        id: u64,
        /// Fields to change.
        #[command(flatten)]
        fields: UpdateArgs,
    },
    /// Delete a person.
    Delete {
        /// Person identifier.
        id: u64,
    },
}

/// World lookup commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum WorldCommand {
    /// List countries.
    Countries,
    /// List the states of a country.
    States {
        /// Country identifier.
        country_id: u64,
    },
    /// List the cities of a state.
    Cities {
        /// State identifier.
        state_id: u64,
    },
    /// List currencies.
    Currencies {
        /// Only currencies used by this country.
        #[arg(long)]
        country_id: Option<u64>,
    },
}

/// Filters for `people list`.
#[derive(Args, Debug, Default, PartialEq, Eq)]
pub struct ListArgs {
    /// Free-text search.
    #[arg(long)]
    pub q: Option<String>,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub citizenship_no: Option<String>,
    #[arg(long)]
    pub country_id: Option<u64>,
    #[arg(long)]
    pub state_id: Option<u64>,
    #[arg(long)]
    pub city_id: Option<u64>,
    #[arg(long)]
    pub currency_id: Option<u64>,
    #[arg(long)]
    pub age_min: Option<u32>,
    #[arg(long)]
    pub age_max: Option<u32>,
    /// Sort field (`id`, `created_at`, `last_name`, `age`); prefix `-` for descending.
    #[arg(long, value_parser = parse_sort, allow_hyphen_values = true)]
    pub sort: Option<SortOrder>,
    #[arg(long)]
    pub per_page: Option<u32>,
    #[arg(long)]
    pub page: Option<u32>,
}

impl From<ListArgs> for PeopleQuery {
    fn from(args: ListArgs) -> Self {
        Self {
            q: args.q,
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            citizenship_no: args.citizenship_no,
            country_id: args.country_id,
            state_id: args.state_id,
            city_id: args.city_id,
            currency_id: args.currency_id,
            age_min: args.age_min,
            age_max: args.age_max,
            sort: args.sort,
            per_page: args.per_page,
            page: args.page,
        }
    }
}

/// Fields for `people create`.
#[derive(Args, Debug, PartialEq, Eq)]
pub struct CreateArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub age: Option<u32>,
    #[arg(long)]
    pub citizenship_no: String,
    #[arg(long)]
    pub country_id: u64,
    #[arg(long)]
    pub state_id: Option<u64>,
    #[arg(long)]
    pub city_id: Option<u64>,
    #[arg(long)]
    pub currency_id: Option<u64>,
}

impl From<CreateArgs> for NewPerson {
    fn from(args: CreateArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            age: args.age,
            citizenship_no: args.citizenship_no,
            country_id: args.country_id,
            state_id: args.state_id,
            city_id: args.city_id,
            currency_id: args.currency_id,
        }
    }
}

/// Fields for `people update`; omitted flags are left unchanged.
#[derive(Args, Debug, Default, PartialEq, Eq)]
pub struct UpdateArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub age: Option<u32>,
    #[arg(long)]
    pub citizenship_no: Option<String>,
    #[arg(long)]
    pub country_id: Option<u64>,
    #[arg(long)]
    pub state_id: Option<u64>,
    #[arg(long)]
    pub city_id: Option<u64>,
    #[arg(long)]
    pub currency_id: Option<u64>,
}

impl From<UpdateArgs> for PersonUpdate {
    fn from(args: UpdateArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            age: args.age,
            citizenship_no: args.citizenship_no,
            country_id: args.country_id,
            state_id: args.state_id,
            city_id: args.city_id,
            currency_id: args.currency_id,
        }
    }
}

fn parse_sort(value: &str) -> Result<SortOrder, String> {
    SortOrder::parse(value).ok_or_else(|| {
        format!("unknown sort field '{value}' (expected id, created_at, last_name or age)")
    })
}
