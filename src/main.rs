//! meli-etl - Mercado Livre seller analytics CLI

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meli_etl::api::{self, SearchQuery};
use meli_etl::auth;
use meli_etl::config::Settings;
use meli_etl::pipeline::EtlOptions;
use meli_etl::validation::DEFAULT_MAX_ATTEMPTS;

#[derive(Parser)]
#[command(name = "meli-etl")]
#[command(about = "Mercado Livre API client and seller ETL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize the application, or finish authorization with a code
    Login {
        /// Authorization code from the redirect
        #[arg(long)]
        code: Option<String>,
    },

    /// Remove the stored token
    Logout,

    /// Show current authentication status
    Status,

    /// Refresh the access token now
    Refresh,

    /// Show the token owner (verify auth works)
    Whoami,

    /// Show a user profile
    User {
        /// User id, or "me"
        user_id: String,

        /// Comma-separated attribute filter
        #[arg(short, long)]
        attributes: Option<String>,
    },

    /// List a seller's items
    Items {
        /// Seller id (defaults to the token owner)
        #[arg(short, long)]
        seller: Option<String>,

        #[arg(short, long, default_value = "50")]
        limit: u32,

        /// Listing status: active, paused, closed
        #[arg(long, default_value = "active")]
        status: String,
    },

    /// Show one item
    Item {
        item_id: String,

        /// Include the description
        #[arg(short, long)]
        description: bool,

        /// Include reviews
        #[arg(short, long)]
        reviews: bool,

        /// Include up to N questions
        #[arg(short, long)]
        questions: Option<u32>,
    },

    /// Search a site
    Search {
        /// Free-text query
        query: Option<String>,

        #[arg(long, default_value = "MLB")]
        site: String,

        #[arg(short, long)]
        seller: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long, default_value = "50")]
        limit: u32,

        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// List a seller's orders as normalized rows
    Orders {
        /// Seller id (defaults to the token owner)
        #[arg(short, long)]
        seller: Option<String>,

        /// Page size
        #[arg(short, long, default_value = "50")]
        limit: u32,

        /// Keep polling until no new orders appear
        #[arg(long)]
        all: bool,

        /// Earliest creation date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        from: Option<String>,

        /// Latest creation date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        to: Option<String>,
    },

    /// List top-level categories of a site
    Categories {
        #[arg(long, default_value = "MLB")]
        site: String,
    },

    /// Show a category
    Category {
        category_id: String,

        /// Show the category's attributes instead
        #[arg(short, long)]
        attributes: bool,
    },

    /// Show trending searches
    Trends {
        #[arg(long, default_value = "MLB")]
        site: String,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// List listing types of a site
    ListingTypes {
        #[arg(long, default_value = "MLB")]
        site: String,
    },

    /// List listing exposures of a site
    Exposures {
        #[arg(long, default_value = "MLB")]
        site: String,
    },

    /// Show a size grid
    SizeGrid {
        grid_id: String,

        /// Show the grid's rows instead
        #[arg(short, long)]
        rows: bool,
    },

    /// Validate a draft listing (JSON file)
    Validate {
        file: PathBuf,

        /// Patch fixable problems and resubmit
        #[arg(short, long)]
        fix: bool,

        /// Maximum validation attempts when fixing
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        attempts: usize,
    },

    /// List sellers with listings in a category
    Sellers {
        category: String,

        #[arg(long, default_value = "MLB")]
        site: String,

        /// Stop after this many sellers
        #[arg(short, long, default_value = "10")]
        max: usize,
    },

    /// Extract, enrich and write sellers' items as JSON lines
    Etl {
        /// Seller id, repeatable (defaults to the token owner)
        #[arg(short, long)]
        seller: Vec<String>,

        #[arg(short, long, default_value = "50")]
        limit: u32,

        /// Skip item descriptions
        #[arg(long)]
        no_descriptions: bool,

        /// Include item reviews
        #[arg(long)]
        reviews: bool,

        /// Append to this file instead of writing to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays JSON
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Login { code } => {
            tracing::info!("Starting authorization flow...");
            auth::login(&settings, code.as_deref()).await?;
        }
        Commands::Logout => {
            auth::logout(&settings).await?;
        }
        Commands::Status => {
            auth::status(&settings).await?;
        }
        Commands::Refresh => {
            auth::force_refresh(&settings).await?;
        }
        Commands::Whoami => {
            api::whoami(&settings).await?;
        }
        Commands::User {
            user_id,
            attributes,
        } => {
            api::user(&settings, &user_id, attributes.as_deref()).await?;
        }
        Commands::Items {
            seller,
            limit,
            status,
        } => {
            api::items(&settings, seller.as_deref(), limit, &status).await?;
        }
        Commands::Item {
            item_id,
            description,
            reviews,
            questions,
        } => {
            api::item(&settings, &item_id, description, reviews, questions).await?;
        }
        Commands::Search {
            query,
            site,
            seller,
            category,
            limit,
            offset,
        } => {
            let q = SearchQuery {
                query: query.as_deref(),
                seller_id: seller.as_deref(),
                category: category.as_deref(),
                limit,
                offset,
                ..SearchQuery::new(&site)
            };
            api::search(&settings, &q).await?;
        }
        Commands::Orders {
            seller,
            limit,
            all,
            from,
            to,
        } => {
            let start = from.as_deref().map(|s| api::parse_bound(s, false)).transpose()?;
            let end = to.as_deref().map(|s| api::parse_bound(s, true)).transpose()?;
            tracing::info!("Fetching orders...");
            api::orders(&settings, seller.as_deref(), limit, all, start, end).await?;
        }
        Commands::Categories { site } => {
            api::categories(&settings, &site).await?;
        }
        Commands::Category {
            category_id,
            attributes,
        } => {
            api::category(&settings, &category_id, attributes).await?;
        }
        Commands::Trends { site, category } => {
            api::trends(&settings, &site, category.as_deref()).await?;
        }
        Commands::ListingTypes { site } => {
            api::listing_types(&settings, &site).await?;
        }
        Commands::Exposures { site } => {
            api::exposures(&settings, &site).await?;
        }
        Commands::SizeGrid { grid_id, rows } => {
            api::size_grid(&settings, &grid_id, rows).await?;
        }
        Commands::Validate {
            file,
            fix,
            attempts,
        } => {
            tracing::info!("Validating draft...");
            api::validate(&settings, &file, fix, attempts).await?;
        }
        Commands::Sellers {
            category,
            site,
            max,
        } => {
            api::sellers(&settings, &site, &category, max).await?;
        }
        Commands::Etl {
            seller,
            limit,
            no_descriptions,
            reviews,
            output,
        } => {
            let opts = EtlOptions {
                limit,
                with_descriptions: !no_descriptions,
                with_reviews: reviews,
            };
            api::etl(&settings, &seller, &opts, output.as_deref()).await?;
        }
    }

    Ok(())
}
